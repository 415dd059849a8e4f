//! Errors surfaced by admin operations.

use cart_payment::RefundError;
use cart_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdminError {
	/// The submitted view model failed validation; nothing was written.
	#[error("Model is invalid")]
	InvalidModel,
	/// The addressed record does not exist. The message is shown verbatim.
	#[error("{0}")]
	NotFound(String),
	/// The payment provider failed or timed out.
	#[error("External service error: {0}")]
	ExternalService(String),
	#[error("Persistence error: {0}")]
	Persistence(String),
}

impl From<StorageError> for AdminError {
	fn from(err: StorageError) -> Self {
		AdminError::Persistence(err.to_string())
	}
}

impl From<RefundError> for AdminError {
	fn from(err: RefundError) -> Self {
		AdminError::ExternalService(err.to_string())
	}
}
