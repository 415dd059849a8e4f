//! Order lifecycle management.

pub mod order;

pub use order::OrderStateMachine;
