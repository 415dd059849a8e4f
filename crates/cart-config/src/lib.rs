//! Configuration for the shopping cart admin service.
//!
//! Configuration is TOML. String values may reference environment variables
//! as `${NAME}` or `${NAME:-default}`, which keeps provider keys out of the
//! file itself.
//!
//! ## Modular Configuration Support
//!
//! - Use `include = ["storage.toml", "payment.toml"]` to pull in other files
//! - Each top-level section must be unique across all files

mod loader;

#[cfg(any(test, feature = "testing"))]
pub mod builders;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("Configuration error: {0}")]
	Parse(String),
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message, drop the echoed input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Top-level configuration of the admin service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	pub service: ServiceConfig,
	pub storage: StorageConfig,
	pub payment: PaymentConfig,
	pub api: Option<ApiConfig>,
}

/// Identity of this service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
	/// Identifier used in logs.
	pub id: String,
}

/// Persistence backend selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Interval in seconds between sweeps of expired records.
	#[serde(default = "default_cleanup_interval_seconds")]
	pub cleanup_interval_seconds: u64,
}

fn default_cleanup_interval_seconds() -> u64 {
	3600
}

/// Refund provider selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentConfig {
	/// Which refund implementation to use.
	pub primary: String,
	/// Map of refund implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Upper bound for a single refund call. Must stay below the API
	/// request timeout so a cancellation can commit after its refund.
	#[serde(default = "default_refund_timeout_seconds")]
	pub refund_timeout_seconds: u64,
}

fn default_refund_timeout_seconds() -> u64 {
	20
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default)]
	pub enabled: bool,
	#[serde(default = "default_api_host")]
	pub host: String,
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Request timeout in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// Maximum request body size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	pub cors: Option<CorsConfig>,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	/// Allowed origins; `*` allows any.
	pub allowed_origins: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	5000
}

fn default_api_timeout() -> u64 {
	30
}

fn default_max_request_size() -> usize {
	1024 * 1024 // 1MB
}

/// Replaces `${VAR}` and `${VAR:-default}` with environment values.
///
/// Input is capped at 1MB so the regex cannot be fed pathological text.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};

		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last..full_match.start()]);
		result.push_str(&value);
		last = full_match.end();
	}
	result.push_str(&input[last..]);

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Parses text whose environment references were already substituted.
	pub(crate) fn parse_resolved(text: &str) -> Result<Self, ConfigError> {
		let config: Config = toml::from_str(text)?;
		config.validate()?;
		Ok(config)
	}

	/// Checks cross-field rules that serde cannot express.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.service.id.is_empty() {
			return Err(ConfigError::Validation("Service ID cannot be empty".into()));
		}

		if self.storage.implementations.is_empty() {
			return Err(ConfigError::Validation(
				"At least one storage implementation must be configured".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}
		if self.storage.cleanup_interval_seconds == 0
			|| self.storage.cleanup_interval_seconds > 86400
		{
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds must be between 1 and 86400".into(),
			));
		}

		if !self
			.payment
			.implementations
			.contains_key(&self.payment.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary payment '{}' not found in implementations",
				self.payment.primary
			)));
		}
		if self.payment.refund_timeout_seconds == 0 {
			return Err(ConfigError::Validation(
				"Payment refund_timeout_seconds must be greater than 0".into(),
			));
		}

		if let Some(api) = self.api.as_ref().filter(|api| api.enabled) {
			if api.port == 0 {
				return Err(ConfigError::Validation("API port cannot be 0".into()));
			}
			if api.timeout_seconds == 0 {
				return Err(ConfigError::Validation(
					"API timeout_seconds must be greater than 0".into(),
				));
			}
			if self.payment.refund_timeout_seconds >= api.timeout_seconds {
				return Err(ConfigError::Validation(format!(
					"Payment refund_timeout_seconds ({}) must be less than API timeout_seconds ({})",
					self.payment.refund_timeout_seconds, api.timeout_seconds
				)));
			}
		}

		Ok(())
	}
}

/// Parses, resolves environment variables and validates in one step.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Config::parse_resolved(&resolve_env_vars(s)?)
	}
}
