//! Renewable change notification.
//!
//! A [`ChangeSource`] hands out the [`ChangeSignal`] for the current
//! generation. Triggering the source installs a fresh signal and then fires
//! the previous one, so a consumer woken by a signal always finds the next
//! generation's signal already in place when it re-acquires.
//!
//! A fired signal stays fired. Consumers that want to hear about every
//! change re-acquire after each notification, or use [`on_change`] which
//! does that for them.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::trace;

type Callback = Box<dyn FnOnce() + Send + 'static>;

struct SignalState {
    generation: u64,
    fired: AtomicBool,
    callbacks: Mutex<Vec<Callback>>,
    notify: Notify,
}

impl SignalState {
    fn new(generation: u64) -> Self {
        Self {
            generation,
            fired: AtomicBool::new(false),
            callbacks: Mutex::new(Vec::new()),
            notify: Notify::new(),
        }
    }
}

/// One-shot change notification for a single configuration generation.
///
/// Cheap to clone; clones observe the same underlying flag.
#[derive(Clone)]
pub struct ChangeSignal {
    state: Arc<SignalState>,
}

impl ChangeSignal {
    /// A signal with no source behind it. It never fires.
    ///
    /// Used by providers whose data is fixed after construction.
    pub fn never() -> Self {
        Self {
            state: Arc::new(SignalState::new(0)),
        }
    }

    /// Generation this signal belongs to.
    pub fn generation(&self) -> u64 {
        self.state.generation
    }

    /// Whether this generation has been superseded.
    pub fn has_changed(&self) -> bool {
        self.state.fired.load(Ordering::Acquire)
    }

    /// Register a callback to run when this signal fires.
    ///
    /// Runs immediately on the calling thread if the signal has already fired.
    /// Callbacks run on the thread that triggers the change and must not block.
    pub fn register<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut callbacks = self.state.callbacks.lock();
            if !self.has_changed() {
                callbacks.push(Box::new(callback));
                return;
            }
        }
        callback();
    }

    /// Wait until this signal fires.
    pub async fn changed(&self) {
        let notified = self.state.notify.notified();
        tokio::pin!(notified);
        // Register interest before checking the flag so a concurrent fire
        // cannot slip between the check and the await.
        notified.as_mut().enable();
        if self.has_changed() {
            return;
        }
        notified.await;
    }

    /// Whether two handles refer to the same generation's signal.
    pub fn same_signal(&self, other: &ChangeSignal) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Mark as fired and run registered callbacks. Returns `false` if it
    /// had already fired.
    fn fire(&self) -> bool {
        if self.state.fired.swap(true, Ordering::AcqRel) {
            return false;
        }

        let callbacks = std::mem::take(&mut *self.state.callbacks.lock());
        trace!(
            generation = self.state.generation,
            callbacks = callbacks.len(),
            "Firing change signal"
        );
        for callback in callbacks {
            callback();
        }
        self.state.notify.notify_waiters();
        true
    }
}

impl fmt::Debug for ChangeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeSignal")
            .field("generation", &self.generation())
            .field("fired", &self.has_changed())
            .finish()
    }
}

/// Owner side of a renewable [`ChangeSignal`].
pub struct ChangeSource {
    current: ArcSwap<SignalState>,
    trigger_lock: Mutex<()>,
}

impl ChangeSource {
    /// Create a source at generation 0.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(SignalState::new(0)),
            trigger_lock: Mutex::new(()),
        }
    }

    /// Signal for the current generation.
    pub fn signal(&self) -> ChangeSignal {
        ChangeSignal {
            state: self.current.load_full(),
        }
    }

    /// Current generation number.
    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }

    /// Start a new generation and fire the signal of the previous one.
    ///
    /// Returns the new generation number.
    pub fn trigger(&self) -> u64 {
        let (previous, generation) = {
            let _guard = self.trigger_lock.lock();
            let generation = self.current.load().generation + 1;
            let previous = self.current.swap(Arc::new(SignalState::new(generation)));
            (previous, generation)
        };

        // Fired outside the lock: callbacks may trigger other sources.
        ChangeSignal { state: previous }.fire();
        generation
    }
}

impl Default for ChangeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChangeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeSource")
            .field("generation", &self.generation())
            .finish()
    }
}

/// Handle for a subscription created by [`on_change`].
///
/// Dropping the handle leaves the subscription running; call
/// [`ChangeSubscription::cancel`] to stop it.
#[derive(Debug, Clone)]
pub struct ChangeSubscription {
    active: Arc<AtomicBool>,
}

impl ChangeSubscription {
    /// Stop invoking the consumer. The callback already registered on the
    /// current signal becomes a no-op.
    pub fn cancel(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

struct Watch<P, C> {
    producer: P,
    consumer: C,
    active: Arc<AtomicBool>,
}

/// Invoke `consumer` on every change reported by the signals `producer`
/// returns.
///
/// The next signal is acquired before the consumer runs, so a change made
/// from inside the consumer is still observed.
pub fn on_change<P, C>(producer: P, consumer: C) -> ChangeSubscription
where
    P: Fn() -> ChangeSignal + Send + Sync + 'static,
    C: Fn() + Send + Sync + 'static,
{
    let active = Arc::new(AtomicBool::new(true));
    let watch = Arc::new(Watch {
        producer,
        consumer,
        active: Arc::clone(&active),
    });
    let signal = (watch.producer)();
    arm(watch, signal);
    ChangeSubscription { active }
}

fn arm<P, C>(watch: Arc<Watch<P, C>>, signal: ChangeSignal)
where
    P: Fn() -> ChangeSignal + Send + Sync + 'static,
    C: Fn() + Send + Sync + 'static,
{
    signal.register(move || {
        if !watch.active.load(Ordering::Acquire) {
            return;
        }
        let next = (watch.producer)();
        (watch.consumer)();
        arm(watch, next);
    });
}
