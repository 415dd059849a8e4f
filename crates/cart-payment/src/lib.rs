//! Refund gateway for the shopping cart admin backend.
//!
//! Cancelling an order whose payment was captured returns the money through
//! an external payment provider. Providers implement [`RefundInterface`];
//! the [`RefundService`] bounds every call with a timeout so a slow provider
//! cannot hold a request open indefinitely.

use async_trait::async_trait;
use cart_types::{ConfigSchema, ImplementationRegistry};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod mock;
	pub mod stripe;
}

/// Errors that can occur while requesting a refund.
#[derive(Debug, Error)]
pub enum RefundError {
	/// The provider could not be reached.
	#[error("Network error: {0}")]
	Network(String),
	/// The provider rejected the refund.
	#[error("Provider error: {0}")]
	Provider(String),
	#[error("Refund timed out after {0:?}")]
	Timeout(Duration),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Why a payment is returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundReason {
	#[default]
	RequestedByCustomer,
	Duplicate,
	Fraudulent,
}

impl RefundReason {
	/// Wire name understood by payment providers.
	pub fn as_str(&self) -> &'static str {
		match self {
			RefundReason::RequestedByCustomer => "requested_by_customer",
			RefundReason::Duplicate => "duplicate",
			RefundReason::Fraudulent => "fraudulent",
		}
	}
}

impl fmt::Display for RefundReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Full refund of one captured payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
	/// Provider reference of the captured payment.
	pub payment_intent_id: String,
	pub reason: RefundReason,
	/// Requests sharing a key refund at most once; repeats return the
	/// first outcome.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub idempotency_key: Option<String>,
}

impl RefundRequest {
	/// Refund requested on behalf of the customer.
	pub fn requested_by_customer(payment_intent_id: impl Into<String>) -> Self {
		Self {
			payment_intent_id: payment_intent_id.into(),
			reason: RefundReason::RequestedByCustomer,
			idempotency_key: None,
		}
	}

	pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
		self.idempotency_key = Some(key.into());
		self
	}
}

/// What the provider reported back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundResult {
	pub refund_id: String,
	pub status: String,
	/// Refunded amount in the smallest currency unit, when reported.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub amount: Option<i64>,
}

/// Interface every refund provider implements.
#[async_trait]
pub trait RefundInterface: Send + Sync {
	/// Schema the provider's configuration table is validated against.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Requests a refund. Success means the provider accepted it, or that
	/// an earlier request with the same idempotency key already did.
	async fn create_refund(&self, request: &RefundRequest) -> Result<RefundResult, RefundError>;
}

/// Builds a provider from its configuration table.
pub type RefundFactory = fn(&toml::Value) -> Result<Box<dyn RefundInterface>, RefundError>;

pub trait RefundRegistry: ImplementationRegistry<Factory = RefundFactory> {}

/// Every refund provider this crate ships, by configuration name.
pub fn get_all_implementations() -> Vec<(&'static str, RefundFactory)> {
	use implementations::{mock, stripe};

	vec![
		(mock::Registry::NAME, mock::Registry::factory()),
		(stripe::Registry::NAME, stripe::Registry::factory()),
	]
}

/// Calls the configured provider with a bounded wait.
pub struct RefundService {
	provider: Arc<dyn RefundInterface>,
	timeout: Duration,
}

impl RefundService {
	pub fn new(provider: Arc<dyn RefundInterface>, timeout: Duration) -> Self {
		Self { provider, timeout }
	}

	/// Requests a refund, failing with [`RefundError::Timeout`] when the
	/// provider does not answer in time.
	pub async fn create_refund(&self, request: &RefundRequest) -> Result<RefundResult, RefundError> {
		tracing::info!(
			payment_intent_id = %request.payment_intent_id,
			reason = %request.reason,
			idempotency_key = request.idempotency_key.as_deref().unwrap_or_default(),
			"Requesting refund"
		);

		let result = tokio::time::timeout(self.timeout, self.provider.create_refund(request))
			.await
			.map_err(|_| RefundError::Timeout(self.timeout))
			.and_then(|result| result);

		match &result {
			Ok(refund) => tracing::info!(
				refund_id = %refund.refund_id,
				status = %refund.status,
				"Refund accepted"
			),
			Err(e) => tracing::warn!(
				payment_intent_id = %request.payment_intent_id,
				error = %e,
				"Refund failed"
			),
		}
		result
	}
}
