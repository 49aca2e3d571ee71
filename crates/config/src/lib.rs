//! Certward configuration
//!
//! Configuration is a stack of [`ConfigurationProvider`]s aggregated by a
//! [`ConfigurationManager`]. Keys are `:`-delimited paths compared
//! case-insensitively, e.g. `Certward:DomainNames:0`.
//!
//! - [`MemoryConfigSource`]: fixed entries, typically parsed from a KDL file
//! - [`DynamicConfigSource`]: a domain list the host replaces at runtime
//! - [`AcmeSettings`]: typed view of one ACME section
//!
//! # Live domain changes
//!
//! ```
//! use std::sync::Arc;
//! use certward_config::{ConfigurationManager, DynamicConfigSource};
//!
//! let manager = ConfigurationManager::new();
//! let domains = Arc::new(DynamicConfigSource::new());
//! manager.add_provider(domains.clone());
//!
//! let signal = manager.change_signal();
//! domains.set_addresses(["example.com", "www.example.com"]);
//!
//! assert!(signal.has_changed());
//! assert_eq!(manager.get_list("Certward:DomainNames").len(), 2);
//! ```

pub mod data;
pub mod dynamic;
pub mod error;
pub mod kdl;
pub mod manager;
pub mod provider;
pub mod settings;

pub use data::{combine_key, ConfigData, KEY_DELIMITER};
pub use dynamic::{DynamicConfigSource, DEFAULT_SECTION, DOMAIN_NAMES_KEY};
pub use error::ConfigError;
pub use crate::kdl::{load_kdl_file, parse_kdl_config};
pub use manager::ConfigurationManager;
pub use provider::{ConfigurationProvider, MemoryConfigSource};
pub use settings::{AcmeSettings, LETS_ENCRYPT_PRODUCTION, LETS_ENCRYPT_STAGING};
