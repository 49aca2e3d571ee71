//! Persisted ACME account record.

use std::fmt;

use certward_common::AccountId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// An account registered with a certificate authority.
///
/// Only `id` matters to the stores; it names the account file. Properties
/// this type does not know about are kept in `extra` and written back
/// unchanged.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    /// Identifier, used as the account file stem
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: AccountId,

    /// Contact addresses registered with the authority
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub email_addresses: Vec<String>,

    /// Account URL (`kid`) assigned by the authority
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_url: Option<String>,

    /// Account private key, base64 in JSON
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Vec::is_empty")]
    pub private_key: Vec<u8>,

    /// When the account was registered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Authority-specific properties carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AccountRecord {
    pub fn new(id: impl Into<AccountId>) -> Self {
        Self {
            id: id.into(),
            email_addresses: Vec::new(),
            account_url: None,
            private_key: Vec::new(),
            created_at: None,
            extra: Map::new(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email_addresses.push(email.into());
        self
    }

    pub fn with_account_url(mut self, url: impl Into<String>) -> Self {
        self.account_url = Some(url.into());
        self
    }

    pub fn with_private_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.private_key = key.into();
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// File name of this account inside an account directory.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.id)
    }
}

// Key material stays out of logs.
impl fmt::Debug for AccountRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountRecord")
            .field("id", &self.id)
            .field("email_addresses", &self.email_addresses)
            .field("account_url", &self.account_url)
            .field("private_key", &format_args!("<{} bytes>", self.private_key.len()))
            .field("created_at", &self.created_at)
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Older account files carry a numeric id.
fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<AccountId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => AccountId::new(s),
        RawId::Number(n) => AccountId::new(n.to_string()),
    })
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
