//! Common types for the shopping cart administration backend.
//!
//! Entities, statuses and view models shared by the persistence, payment,
//! core and service crates live here so every layer agrees on one shape.

/// API types for HTTP error responses.
pub mod api;
/// Category entity and its view models.
pub mod category;
/// Validation summary produced by request binding.
pub mod model_state;
/// Order header, order detail and customer records.
pub mod order;
/// Self-registering implementation registry.
pub mod registry;
/// Redacting wrapper for provider credentials.
pub mod secret_string;
/// Storage collections and the persisted entity contract.
pub mod storage;
/// Configuration schema validation for implementation sub-tables.
pub mod validation;

pub use api::*;
pub use category::*;
pub use model_state::ModelState;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use storage::*;
pub use validation::*;
