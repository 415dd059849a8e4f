//! Admin API endpoints.

pub mod category;
pub mod order;

use cart_core::AdminError;
use cart_types::{APIError, ModelState};

/// Maps a core error to its HTTP shape. Field errors of `model_state` are
/// attached to validation failures.
pub fn api_error(err: AdminError, model_state: Option<&ModelState>) -> APIError {
	match err {
		AdminError::InvalidModel => APIError::BadRequest {
			error_type: "INVALID_MODEL".to_string(),
			message: AdminError::InvalidModel.to_string(),
			details: model_state.and_then(|state| serde_json::to_value(state).ok()),
		},
		AdminError::NotFound(message) => APIError::NotFound {
			error_type: "NOT_FOUND".to_string(),
			message,
		},
		AdminError::ExternalService(message) => APIError::BadGateway {
			error_type: "PAYMENT_PROVIDER_ERROR".to_string(),
			message,
		},
		AdminError::Persistence(message) => APIError::InternalServerError {
			error_type: "PERSISTENCE_ERROR".to_string(),
			message,
		},
	}
}
