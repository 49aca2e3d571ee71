//! KDL configuration files.
//!
//! A file is flattened into a [`MemoryConfigSource`]:
//!
//! ```kdl
//! certward {
//!     directory-url "https://acme-staging-v02.api.letsencrypt.org/directory"
//!     storage-root "/var/lib/certward"
//!     domain-names "example.com" "www.example.com"
//! }
//! ```
//!
//! yields `Certward:DirectoryUrl`, `Certward:StorageRoot`,
//! `Certward:DomainNames:0` and `Certward:DomainNames:1`. Lists can also be
//! written as child blocks of `-` nodes.

mod flatten;

pub use flatten::{key_segment, value_to_string};

use std::path::Path;

use anyhow::{Context, Result};
use ::kdl::KdlDocument;
use tracing::{debug, trace};

use crate::data::ConfigData;
use crate::provider::MemoryConfigSource;

/// Parse KDL text into a configuration source named `name`.
pub fn parse_kdl_config(name: &str, content: &str) -> Result<MemoryConfigSource> {
    trace!(source = %name, "Parsing KDL configuration");

    let doc: KdlDocument = content
        .parse()
        .map_err(|e| anyhow::anyhow!("Failed to parse KDL configuration '{}': {}", name, e))?;

    let mut data = ConfigData::new();
    flatten::flatten_document(&doc, "", &mut data);

    debug!(source = %name, entries = data.len(), "Parsed KDL configuration");
    Ok(MemoryConfigSource::new(name, data))
}

/// Read and parse a KDL configuration file.
pub fn load_kdl_file(path: impl AsRef<Path>) -> Result<MemoryConfigSource> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
    parse_kdl_config(&path.display().to_string(), &content)
}
