//! Shared building blocks for Certward crates.
//!
//! - [`ids`]: identifier newtypes
//! - [`change`]: renewable change signals for live reconfiguration
//! - `logging`: tracing subscriber setup (`runtime` feature)

pub mod change;
pub mod ids;
#[cfg(feature = "runtime")]
pub mod logging;

pub use change::{on_change, ChangeSignal, ChangeSource, ChangeSubscription};
pub use ids::{AccountId, InvalidAccountId};
#[cfg(feature = "runtime")]
pub use logging::{init_logging, LogFormat};
