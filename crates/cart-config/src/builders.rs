//! Builder for test and development configurations.

use crate::{ApiConfig, Config, PaymentConfig, ServiceConfig, StorageConfig};
use std::collections::HashMap;

/// Fluent builder producing a `Config` backed by the memory storage and
/// the mock refund provider unless told otherwise.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	service_id: String,
	storage_primary: String,
	storage_implementations: HashMap<String, toml::Value>,
	cleanup_interval_seconds: u64,
	payment_primary: String,
	payment_implementations: HashMap<String, toml::Value>,
	refund_timeout_seconds: u64,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	pub fn new() -> Self {
		let empty = || toml::Value::Table(toml::map::Map::new());
		Self {
			service_id: "test-cart-admin".to_string(),
			storage_primary: "memory".to_string(),
			storage_implementations: HashMap::from([("memory".to_string(), empty())]),
			cleanup_interval_seconds: 60,
			payment_primary: "mock".to_string(),
			payment_implementations: HashMap::from([("mock".to_string(), empty())]),
			refund_timeout_seconds: 5,
			api: None,
		}
	}

	pub fn service_id(mut self, id: impl Into<String>) -> Self {
		self.service_id = id.into();
		self
	}

	/// Registers a storage implementation and makes it primary.
	pub fn storage(mut self, name: impl Into<String>, config: toml::Value) -> Self {
		let name = name.into();
		self.storage_implementations.insert(name.clone(), config);
		self.storage_primary = name;
		self
	}

	/// Registers a refund implementation and makes it primary.
	pub fn payment(mut self, name: impl Into<String>, config: toml::Value) -> Self {
		let name = name.into();
		self.payment_implementations.insert(name.clone(), config);
		self.payment_primary = name;
		self
	}

	pub fn refund_timeout_seconds(mut self, seconds: u64) -> Self {
		self.refund_timeout_seconds = seconds;
		self
	}

	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	pub fn build(self) -> Config {
		Config {
			service: ServiceConfig {
				id: self.service_id,
			},
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations: self.storage_implementations,
				cleanup_interval_seconds: self.cleanup_interval_seconds,
			},
			payment: PaymentConfig {
				primary: self.payment_primary,
				implementations: self.payment_implementations,
				refund_timeout_seconds: self.refund_timeout_seconds,
			},
			api: self.api,
		}
	}
}
