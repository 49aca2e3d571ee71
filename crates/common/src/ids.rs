//! Type-safe identifier newtypes for Certward.
//!
//! Keeps account identifiers from being mixed up with arbitrary strings such
//! as domain names or configuration keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Reasons an identifier cannot be used as a file-name stem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidAccountId {
    #[error("account id is empty")]
    Empty,

    #[error("account id '{0}' contains a path separator")]
    PathSeparator(String),

    #[error("account id '{0}' is a relative path component")]
    RelativeComponent(String),
}

/// Account identifier.
///
/// Issued by the registration flow and used verbatim as the stem of the
/// account file name, so it has to be a single path component.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Check that the id can be used as a file name inside a single directory.
    ///
    /// Nothing is rewritten here; a bad id is rejected as-is.
    pub fn check_file_safe(&self) -> Result<(), InvalidAccountId> {
        if self.0.is_empty() {
            return Err(InvalidAccountId::Empty);
        }
        if self.0.contains(['/', '\\']) {
            return Err(InvalidAccountId::PathSeparator(self.0.clone()));
        }
        if self.0 == "." || self.0 == ".." {
            return Err(InvalidAccountId::RelativeComponent(self.0.clone()));
        }
        Ok(())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
