//! Request handlers for the admin operations.
//!
//! Each handler works on the unit of work it was created with, so one
//! handler instance serves exactly one request.

pub mod category;
pub mod order;

pub use category::CategoryHandler;
pub use order::OrderHandler;
