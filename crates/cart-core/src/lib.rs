//! Core of the shopping cart administration backend.
//!
//! Holds the category lifecycle, the order state machine with its refund
//! side effect, order detail retrieval, and the validation gate every
//! mutating operation passes first. Persistence and payment are reached
//! only through the [`UnitOfWork`](cart_storage::UnitOfWork) and
//! [`RefundService`](cart_payment::RefundService) seams, so the handlers
//! run unchanged against mocks in tests.

pub mod builder;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod state;
pub mod validation;

#[cfg(test)]
pub(crate) mod mocks;

pub use builder::{AdminBuilder, AdminFactories, BuilderError};
pub use engine::AdminEngine;
pub use error::AdminError;
pub use handlers::{CategoryHandler, OrderHandler};
pub use state::OrderStateMachine;
