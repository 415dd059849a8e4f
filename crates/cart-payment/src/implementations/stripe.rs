//! Stripe refund provider.
//!
//! Issues `POST /v1/refunds` against the Stripe API with the secret key as
//! bearer token. The full captured amount is refunded. The request's
//! idempotency key travels as `Idempotency-Key`, and a charge Stripe
//! reports as already refunded counts as refunded.

use crate::{
	RefundError, RefundFactory, RefundInterface, RefundRegistry, RefundRequest, RefundResult,
};
use async_trait::async_trait;
use cart_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, SecretString, ValidationError,
};
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://api.stripe.com";
const ALREADY_REFUNDED: &str = "charge_already_refunded";

#[derive(Debug, Clone, Deserialize)]
pub struct StripeConfig {
	pub api_key: SecretString,
	#[serde(default = "default_base_url")]
	pub base_url: String,
}

fn default_base_url() -> String {
	DEFAULT_BASE_URL.to_string()
}

pub struct StripeSchema;

impl ConfigSchema for StripeSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(
			vec![Field::new("api_key", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(key) if !key.trim().is_empty() => Ok(()),
					_ => Err("api_key cannot be empty".to_string()),
				}
			})],
			vec![Field::new("base_url", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
						Ok(())
					},
					_ => Err("base_url must be an http(s) URL".to_string()),
				}
			})],
		)
		.validate(config)
	}
}

#[derive(Debug, Deserialize)]
struct StripeRefund {
	id: String,
	status: String,
	#[serde(default)]
	amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
	error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
	#[serde(default)]
	code: Option<String>,
	#[serde(default)]
	message: Option<String>,
}

/// Interprets a non-success answer. A charge that was refunded earlier,
/// for example by an attempt whose outcome was lost, is not a failure.
fn refund_failure(
	status: reqwest::StatusCode,
	body: Option<StripeErrorBody>,
	request: &RefundRequest,
) -> Result<RefundResult, RefundError> {
	let (code, message) = match body {
		Some(body) => (body.error.code, body.error.message.unwrap_or_default()),
		None => (None, String::new()),
	};

	if code.as_deref() == Some(ALREADY_REFUNDED) {
		tracing::info!(
			payment_intent_id = %request.payment_intent_id,
			"Charge was already refunded"
		);
		return Ok(RefundResult {
			refund_id: request.payment_intent_id.clone(),
			status: "already_refunded".to_string(),
			amount: None,
		});
	}

	Err(RefundError::Provider(format!(
		"Stripe returned {}: {}",
		status, message
	)))
}

pub struct StripeRefundProvider {
	client: reqwest::Client,
	config: StripeConfig,
}

impl StripeRefundProvider {
	pub fn new(config: StripeConfig) -> Self {
		Self {
			client: reqwest::Client::new(),
			config,
		}
	}

	fn refunds_url(&self) -> String {
		format!("{}/v1/refunds", self.config.base_url.trim_end_matches('/'))
	}

	fn refund_request(&self, request: &RefundRequest) -> reqwest::RequestBuilder {
		let form = [
			("payment_intent", request.payment_intent_id.as_str()),
			("reason", request.reason.as_str()),
		];

		let builder = self
			.client
			.post(self.refunds_url())
			.bearer_auth(self.config.api_key.expose_secret())
			.form(&form);
		match &request.idempotency_key {
			Some(key) => builder.header("Idempotency-Key", key),
			None => builder,
		}
	}
}

#[async_trait]
impl RefundInterface for StripeRefundProvider {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(StripeSchema)
	}

	async fn create_refund(&self, request: &RefundRequest) -> Result<RefundResult, RefundError> {
		let response = self
			.refund_request(request)
			.send()
			.await
			.map_err(|e| RefundError::Network(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			let body = response.json::<StripeErrorBody>().await.ok();
			return refund_failure(status, body, request);
		}

		let refund: StripeRefund = response
			.json()
			.await
			.map_err(|e| RefundError::Provider(format!("Malformed refund response: {}", e)))?;

		Ok(RefundResult {
			refund_id: refund.id,
			status: refund.status,
			amount: refund.amount,
		})
	}
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "stripe";
	type Factory = RefundFactory;

	fn factory() -> Self::Factory {
		|config: &toml::Value| -> Result<Box<dyn RefundInterface>, RefundError> {
			StripeSchema
				.validate(config)
				.map_err(|e| RefundError::Configuration(e.to_string()))?;
			let stripe_config: StripeConfig = config
				.clone()
				.try_into()
				.map_err(|e| RefundError::Configuration(format!("Invalid stripe config: {}", e)))?;
			Ok(Box::new(StripeRefundProvider::new(stripe_config)))
		}
	}
}

impl RefundRegistry for Registry {}
