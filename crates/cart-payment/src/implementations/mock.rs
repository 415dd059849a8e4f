//! Refund provider that never leaves the process.
//!
//! Accepts every refund unless configured to fail, and remembers what it
//! was asked. Honors idempotency keys the way a real provider does, so a
//! repeated key answers with the original refund. Used for local
//! development and tests.

use crate::{
	RefundError, RefundFactory, RefundInterface, RefundRegistry, RefundRequest, RefundResult,
};
use async_trait::async_trait;
use cart_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockRefundConfig {
	/// Reject every refund with a provider error.
	#[serde(default)]
	pub fail: bool,
	/// Artificial latency before answering.
	#[serde(default)]
	pub delay_ms: u64,
}

pub struct MockRefundSchema;

impl ConfigSchema for MockRefundSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![],
			vec![
				Field::new("fail", FieldType::Boolean),
				Field::new(
					"delay_ms",
					FieldType::Integer {
						min: Some(0),
						max: Some(60_000),
					},
				),
			],
		)
		.validate(config)
	}
}

#[derive(Default)]
struct Ledger {
	requests: Vec<RefundRequest>,
	issued: Vec<RefundResult>,
	/// Idempotency key to index into `issued`.
	by_key: HashMap<String, usize>,
}

pub struct MockRefundProvider {
	config: MockRefundConfig,
	ledger: Mutex<Ledger>,
}

impl MockRefundProvider {
	pub fn new(config: MockRefundConfig) -> Self {
		Self {
			config,
			ledger: Mutex::new(Ledger::default()),
		}
	}

	/// Requests received so far, oldest first.
	pub async fn requests(&self) -> Vec<RefundRequest> {
		self.ledger.lock().await.requests.clone()
	}

	/// Number of distinct refunds actually issued.
	pub async fn refunds_issued(&self) -> usize {
		self.ledger.lock().await.issued.len()
	}
}

#[async_trait]
impl RefundInterface for MockRefundProvider {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MockRefundSchema)
	}

	async fn create_refund(&self, request: &RefundRequest) -> Result<RefundResult, RefundError> {
		self.ledger.lock().await.requests.push(request.clone());

		if self.config.delay_ms > 0 {
			tokio::time::sleep(Duration::from_millis(self.config.delay_ms)).await;
		}

		if self.config.fail {
			return Err(RefundError::Provider(format!(
				"Refund of {} declined by mock provider",
				request.payment_intent_id
			)));
		}

		let mut ledger = self.ledger.lock().await;
		if let Some(key) = &request.idempotency_key {
			if let Some(&index) = ledger.by_key.get(key) {
				return Ok(ledger.issued[index].clone());
			}
		}

		let refund = RefundResult {
			refund_id: format!("re_mock_{}", ledger.issued.len() + 1),
			status: "succeeded".to_string(),
			amount: None,
		};
		ledger.issued.push(refund.clone());
		if let Some(key) = &request.idempotency_key {
			let index = ledger.issued.len() - 1;
			ledger.by_key.insert(key.clone(), index);
		}
		Ok(refund)
	}
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "mock";
	type Factory = RefundFactory;

	fn factory() -> Self::Factory {
		|config: &toml::Value| -> Result<Box<dyn RefundInterface>, RefundError> {
			MockRefundSchema
				.validate(config)
				.map_err(|e| RefundError::Configuration(e.to_string()))?;
			let mock_config: MockRefundConfig = config
				.clone()
				.try_into()
				.map_err(|e| RefundError::Configuration(format!("Invalid mock config: {}", e)))?;
			Ok(Box::new(MockRefundProvider::new(mock_config)))
		}
	}
}

impl RefundRegistry for Registry {}
