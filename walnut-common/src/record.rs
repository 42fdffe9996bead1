//! # JSON Records
//!
//! Purpose: Give every persisted entity the same JSON round trip.
//!
//! `load_from_json` updates the record in place: fields present in the input
//! overwrite the current value, fields that are absent or `null` keep it.
//! `to_json` always emits every field.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::ModelResult;

/// Structured text round trip for persisted entities.
pub trait JsonRecord: Serialize + DeserializeOwned + Sized {
    /// Overlays the JSON object in `data` onto this record.
    fn load_from_json(&mut self, data: &[u8]) -> ModelResult<()> {
        let incoming: Value = serde_json::from_slice(data)?;
        let mut current = serde_json::to_value(&*self)?;
        overlay(&mut current, incoming);
        *self = serde_json::from_value(current)?;
        Ok(())
    }

    /// Serializes the record with all of its fields.
    fn to_json(&self) -> ModelResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn overlay(current: &mut Value, incoming: Value) {
    match (current, incoming) {
        (Value::Object(current), Value::Object(incoming)) => {
            for (field, value) in incoming {
                if !value.is_null() {
                    current.insert(field, value);
                }
            }
        }
        // Non-object input is left to `from_value` to reject or accept.
        (current, incoming) => *current = incoming,
    }
}
