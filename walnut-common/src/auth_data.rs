//! # Key-Based Auth Data
//!
//! Issued API-key credentials, each bound to an authentication method by
//! numeric reference. `name` and `apiKey` are required.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::record::JsonRecord;

/// API-key credential record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KeyBasedAuthData {
    pub id: i64,
    pub name: String,
    pub api_key: String,
    pub meta: String,
    #[serde(rename = "authMethodID")]
    pub auth_method_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KeyBasedAuthData {
    /// Builds an unsaved credential; id and timestamps are assigned on create.
    pub fn new(name: impl Into<String>, api_key: impl Into<String>, auth_method_id: i64) -> Self {
        KeyBasedAuthData {
            name: name.into(),
            api_key: api_key.into(),
            auth_method_id,
            ..Default::default()
        }
    }

    /// Checks the required fields.
    pub fn validate(&self) -> ModelResult<()> {
        if self.name.is_empty() {
            return Err(ModelError::Validation("name is required".to_string()));
        }
        if self.api_key.is_empty() {
            return Err(ModelError::Validation("apiKey is required".to_string()));
        }
        Ok(())
    }
}

/// Collection wrapper serialized as `{"items": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBasedAuthDataItems {
    pub items: Vec<KeyBasedAuthData>,
}

impl JsonRecord for KeyBasedAuthData {}
impl JsonRecord for KeyBasedAuthDataItems {}
