//! Builds an [`AdminEngine`] from configuration.
//!
//! Storage backends and refund providers are created through factory
//! functions keyed by the implementation names used in the configuration,
//! then the configured primary of each is wired into the engine.

use crate::engine::AdminEngine;
use cart_config::Config;
use cart_payment::{RefundError, RefundFactory, RefundInterface, RefundService};
use cart_storage::{StorageError, StorageFactory, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while assembling the engine.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
}

/// Factory functions for each pluggable component, by implementation name.
pub struct AdminFactories<SF, RF> {
	pub storage_factories: HashMap<String, SF>,
	pub refund_factories: HashMap<String, RF>,
}

impl AdminFactories<StorageFactory, RefundFactory> {
	/// Every implementation shipped by the storage and payment crates.
	pub fn with_all_implementations() -> Self {
		Self {
			storage_factories: cart_storage::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
			refund_factories: cart_payment::get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		}
	}
}

pub struct AdminBuilder {
	config: Config,
}

impl AdminBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	pub async fn build<SF, RF>(
		self,
		factories: AdminFactories<SF, RF>,
	) -> Result<AdminEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
		RF: Fn(&toml::Value) -> Result<Box<dyn RefundInterface>, RefundError>,
	{
		// Create storage implementations
		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			let Some(factory) = factories.storage_factories.get(name) else {
				tracing::warn!(component = "storage", implementation = %name, "Unknown implementation, skipped");
				continue;
			};
			match factory(config) {
				Ok(implementation) => {
					storage_impls.insert(name.clone(), implementation);
					let is_primary = &self.config.storage.primary == name;
					tracing::info!(component = "storage", implementation = %name, enabled = %is_primary, "Loaded");
				},
				Err(e) => {
					tracing::error!(
						component = "storage",
						implementation = %name,
						error = %e,
						"Failed to create storage implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create storage implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		let primary_storage = &self.config.storage.primary;
		let storage_backend = storage_impls.remove(primary_storage).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary storage '{}' failed to load or has invalid configuration",
				primary_storage
			))
		})?;
		let storage = Arc::new(StorageService::new(storage_backend));

		// Create refund implementations
		let mut refund_impls: HashMap<String, Arc<dyn RefundInterface>> = HashMap::new();
		for (name, config) in &self.config.payment.implementations {
			let Some(factory) = factories.refund_factories.get(name) else {
				tracing::warn!(component = "payment", implementation = %name, "Unknown implementation, skipped");
				continue;
			};
			match factory(config) {
				Ok(implementation) => {
					refund_impls.insert(name.clone(), Arc::from(implementation));
					let is_primary = &self.config.payment.primary == name;
					tracing::info!(component = "payment", implementation = %name, enabled = %is_primary, "Loaded");
				},
				Err(e) => {
					tracing::error!(
						component = "payment",
						implementation = %name,
						error = %e,
						"Failed to create refund implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create refund implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		let primary_payment = &self.config.payment.primary;
		let provider = refund_impls.remove(primary_payment).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary payment '{}' failed to load or has invalid configuration",
				primary_payment
			))
		})?;
		let refunds = Arc::new(RefundService::new(
			provider,
			Duration::from_secs(self.config.payment.refund_timeout_seconds),
		));

		Ok(AdminEngine::new(self.config, storage, refunds))
	}
}
