//! Admin engine that owns the long-lived services.
//!
//! Storage and the refund service live for the whole process. Every
//! request gets its own unit of work and handlers built on it.

use crate::handlers::{CategoryHandler, OrderHandler};
use cart_config::Config;
use cart_payment::RefundService;
use cart_storage::{StorageService, StoreUnitOfWork, UnitOfWork};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct AdminEngine {
	config: Config,
	storage: Arc<StorageService>,
	refunds: Arc<RefundService>,
}

impl AdminEngine {
	pub fn new(config: Config, storage: Arc<StorageService>, refunds: Arc<RefundService>) -> Self {
		Self {
			config,
			storage,
			refunds,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	/// Fresh unit of work with nothing staged.
	pub fn unit_of_work(&self) -> Arc<dyn UnitOfWork> {
		Arc::new(StoreUnitOfWork::new(self.storage.clone()))
	}

	pub fn categories(&self) -> CategoryHandler {
		CategoryHandler::new(self.unit_of_work())
	}

	pub fn orders(&self) -> OrderHandler {
		OrderHandler::new(self.unit_of_work(), self.refunds.clone())
	}

	/// Periodically removes expired records from storage.
	pub fn spawn_storage_cleanup(&self) -> JoinHandle<()> {
		let storage = self.storage.clone();
		let interval = Duration::from_secs(self.config.storage.cleanup_interval_seconds);

		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			// First tick completes immediately
			ticker.tick().await;
			loop {
				ticker.tick().await;
				match storage.cleanup_expired().await {
					Ok(0) => {},
					Ok(removed) => {
						tracing::info!(component = "storage", removed, "Cleaned up expired records")
					},
					Err(e) => {
						tracing::warn!(component = "storage", error = %e, "Storage cleanup failed")
					},
				}
			}
		})
	}
}
