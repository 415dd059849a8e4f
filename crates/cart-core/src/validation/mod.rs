//! Validation gate shared by the mutating operations.

use crate::error::AdminError;
use cart_types::ModelState;

/// Fails with [`AdminError::InvalidModel`] unless `model_state` is valid.
///
/// Callers run this before touching any repository.
pub fn ensure_valid(model_state: &ModelState) -> Result<(), AdminError> {
	if model_state.is_valid() {
		return Ok(());
	}
	tracing::debug!(errors = model_state.error_count(), "Rejected invalid model");
	Err(AdminError::InvalidModel)
}
