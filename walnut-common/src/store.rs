//! # Persistence Boundary
//!
//! Purpose: Describe the CRUD surface the relational store exposes for the
//! persisted entities, and provide an in-memory implementation of it.
//!
//! ## Usage
//!
//! - Services depend on `KeyBasedAuthDataStore` / `OptionStore` rather than a
//!   concrete database.
//! - `MemoryStore` keeps everything in process; it backs tests and embedded
//!   setups where no SQL database is configured.
//!
//! ## Design Principles
//!
//! 1. **Hard Deletes**: `delete_by_id` removes the row outright.
//! 2. **Store-Owned Metadata**: ids and timestamps are assigned on create.
//! 3. **Read-Mostly Locking**: lookups take the read lock only.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;

use crate::auth_data::KeyBasedAuthData;
use crate::error::{ModelError, ModelResult};
use crate::option::ConfigOption;

/// CRUD boundary for API-key credentials.
pub trait KeyBasedAuthDataStore: Send + Sync {
    /// Validates and inserts a credential, returning it with id and timestamps set.
    fn create(&self, data: KeyBasedAuthData) -> ModelResult<KeyBasedAuthData>;

    /// Looks a credential up by its API key.
    fn get_by_api_key(&self, api_key: &str) -> Option<KeyBasedAuthData>;

    /// Removes a credential by id. Returns true when a row was removed.
    fn delete_by_id(&self, id: i64) -> bool;
}

/// CRUD boundary for configuration options.
pub trait OptionStore: Send + Sync {
    /// Inserts an option, returning it with id and timestamps set.
    fn create(&self, option: ConfigOption) -> ModelResult<ConfigOption>;

    /// Looks an option up by key.
    fn get_by_key(&self, key: &str) -> Option<ConfigOption>;

    /// Replaces the value of an existing option and refreshes `updated_at`.
    fn update(&self, option: ConfigOption) -> ModelResult<ConfigOption>;

    /// Removes an option by key. Returns true when a row was removed.
    fn delete_by_key(&self, key: &str) -> bool;
}

/// In-memory implementation of both persistence traits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    credential_seq: AtomicI64,
    option_seq: AtomicI64,
    credentials: RwLock<HashMap<i64, KeyBasedAuthData>>,
    options: RwLock<HashMap<String, ConfigOption>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn next_id(seq: &AtomicI64) -> i64 {
    seq.fetch_add(1, Ordering::Relaxed) + 1
}

impl KeyBasedAuthDataStore for MemoryStore {
    fn create(&self, mut data: KeyBasedAuthData) -> ModelResult<KeyBasedAuthData> {
        data.validate()?;
        let mut credentials = self.credentials.write();
        if credentials.values().any(|item| item.api_key == data.api_key) {
            return Err(ModelError::Validation("apiKey already exists".to_string()));
        }
        let now = Utc::now();
        data.id = next_id(&self.credential_seq);
        data.created_at = now;
        data.updated_at = now;
        credentials.insert(data.id, data.clone());
        debug!(id = data.id, name = %data.name, "created key based auth data");
        Ok(data)
    }

    fn get_by_api_key(&self, api_key: &str) -> Option<KeyBasedAuthData> {
        self.credentials
            .read()
            .values()
            .find(|item| item.api_key == api_key)
            .cloned()
    }

    fn delete_by_id(&self, id: i64) -> bool {
        let removed = self.credentials.write().remove(&id).is_some();
        debug!(id, removed, "deleted key based auth data");
        removed
    }
}

impl OptionStore for MemoryStore {
    fn create(&self, mut option: ConfigOption) -> ModelResult<ConfigOption> {
        if option.key.is_empty() {
            return Err(ModelError::Validation("key is required".to_string()));
        }
        let mut options = self.options.write();
        if options.contains_key(&option.key) {
            return Err(ModelError::Validation(format!("option {} already exists", option.key)));
        }
        let now = Utc::now();
        option.id = next_id(&self.option_seq);
        option.created_at = now;
        option.updated_at = now;
        options.insert(option.key.clone(), option.clone());
        debug!(id = option.id, key = %option.key, "created option");
        Ok(option)
    }

    fn get_by_key(&self, key: &str) -> Option<ConfigOption> {
        self.options.read().get(key).cloned()
    }

    fn update(&self, option: ConfigOption) -> ModelResult<ConfigOption> {
        let mut options = self.options.write();
        let Some(stored) = options.get_mut(&option.key) else {
            let reason = format!("option {} does not exist", option.key);
            return Err(ModelError::Validation(reason));
        };
        stored.value = option.value;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    fn delete_by_key(&self, key: &str) -> bool {
        self.options.write().remove(key).is_some()
    }
}
