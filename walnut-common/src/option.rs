//! # Configuration Options
//!
//! One row per configuration key. Options are written by the persistence
//! layer and mirrored into the key-value store; the driver never mutates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::JsonRecord;

/// Key/value configuration pair.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigOption {
    pub id: i64,
    pub key: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConfigOption {
    /// Builds an unsaved option; id and timestamps are assigned on create.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        ConfigOption {
            key: key.into(),
            value: value.into(),
            ..Default::default()
        }
    }
}

/// Collection wrapper serialized as `{"options": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub options: Vec<ConfigOption>,
}

impl JsonRecord for ConfigOption {}
impl JsonRecord for Options {}
