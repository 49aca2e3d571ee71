//! Certificate authority identity.
//!
//! Accounts are only valid at the authority that issued them, so storage is
//! partitioned by the authority's directory URL: its host (with a
//! non-default port) followed by its decoded path segments.

use std::path::PathBuf;

use certward_config::AcmeSettings;
use url::Url;

use crate::error::StoreError;

/// Anything that knows which ACME directory it talks to.
pub trait CertificateAuthorityConfiguration: Send + Sync {
    fn directory_url(&self) -> &Url;
}

impl CertificateAuthorityConfiguration for Url {
    fn directory_url(&self) -> &Url {
        self
    }
}

impl CertificateAuthorityConfiguration for AcmeSettings {
    fn directory_url(&self) -> &Url {
        &self.directory_url
    }
}

/// Host and path of an authority's directory endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthorityEndpoint {
    host: String,
    path: String,
}

impl AuthorityEndpoint {
    /// Derive the endpoint identity from a directory URL.
    ///
    /// The host keeps an explicit port when it differs from the scheme
    /// default. The path is percent-decoded and loses its leading `/`.
    pub fn from_directory_url(url: &Url) -> Result<Self, StoreError> {
        let invalid = |reason: &str| StoreError::InvalidAuthority {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let host = url.host_str().ok_or_else(|| invalid("URL has no host"))?;
        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        let decoded = urlencoding::decode(url.path())
            .map_err(|_| invalid("path is not valid UTF-8 after decoding"))?;
        let path = decoded.strip_prefix('/').unwrap_or(&*decoded).to_string();

        if path.split('/').any(|segment| segment == "." || segment == "..") {
            return Err(invalid("path contains relative segments"));
        }

        Ok(Self { host, path })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Decoded path without its leading separator.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Relative directory `<host>/<path segments...>`.
    pub fn relative_dir(&self) -> PathBuf {
        let mut dir = PathBuf::from(&self.host);
        for segment in self.path.split('/').filter(|s| !s.is_empty()) {
            dir.push(segment);
        }
        dir
    }
}
