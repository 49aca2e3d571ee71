//! Typed ACME settings read from a [`ConfigurationManager`].

use std::path::PathBuf;

use tracing::trace;
use url::Url;

use crate::data::combine_key;
use crate::dynamic::DOMAIN_NAMES_KEY;
use crate::error::ConfigError;
use crate::manager::ConfigurationManager;

/// Let's Encrypt production directory.
pub const LETS_ENCRYPT_PRODUCTION: &str = "https://acme-v02.api.letsencrypt.org/directory";

/// Let's Encrypt staging directory.
pub const LETS_ENCRYPT_STAGING: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

/// Settings for one ACME section of the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcmeSettings {
    /// Directory endpoint of the certificate authority
    pub directory_url: Url,
    /// Root for persisted state; `None` means the program's base directory
    pub storage_root: Option<PathBuf>,
    /// Domains to manage, in configured order
    pub domain_names: Vec<String>,
    /// Contact address registered with the authority
    pub email_address: Option<String>,
}

impl AcmeSettings {
    /// Read the settings under `section`.
    ///
    /// `DirectoryUrl` wins over `UseStagingServer`; with neither set the
    /// Let's Encrypt production directory is used. Domain names are returned
    /// as configured, without validation.
    pub fn from_configuration(
        config: &ConfigurationManager,
        section: &str,
    ) -> Result<Self, ConfigError> {
        let key = |name: &str| combine_key([section, name]);

        let directory_url = match config.try_get(&key("DirectoryUrl")) {
            Some(value) => parse_directory_url(&key("DirectoryUrl"), &value)?,
            None => {
                let staging_key = key("UseStagingServer");
                let staging = match config.try_get(&staging_key) {
                    Some(value) => parse_bool(&staging_key, &value)?,
                    None => false,
                };
                let default = if staging {
                    LETS_ENCRYPT_STAGING
                } else {
                    LETS_ENCRYPT_PRODUCTION
                };
                parse_directory_url(&staging_key, default)?
            }
        };

        let storage_root = config
            .try_get(&key("StorageRoot"))
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        let email_address = config
            .try_get(&key("EmailAddress"))
            .filter(|value| !value.is_empty());

        let domains_key = key(DOMAIN_NAMES_KEY);
        let mut domain_names = config.get_list(&domains_key);
        if domain_names.is_empty() {
            // A single-valued list is written as a plain key.
            domain_names.extend(config.try_get(&domains_key));
        }

        let settings = Self {
            directory_url,
            storage_root,
            domain_names,
            email_address,
        };

        trace!(
            section = %section,
            directory_url = %settings.directory_url,
            domains = settings.domain_names.len(),
            "Read ACME settings"
        );

        Ok(settings)
    }
}

fn parse_directory_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
        key: key.to_string(),
        value: value.to_string(),
        source,
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ConfigError::UnsupportedScheme(value.to_string())),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
