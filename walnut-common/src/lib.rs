// walnut-common - Shared records and error kinds for Walnut
//
// This crate defines the persisted entities, their JSON form and the
// persistence boundary used next to the key-value driver

pub mod auth_data;
pub mod error;
pub mod option;
pub mod record;
pub mod store;

// Re-export for convenience
pub use auth_data::*;
pub use error::*;
pub use option::*;
pub use record::*;
pub use store::*;
