//! Persistence gateway for the shopping cart admin backend.
//!
//! Two layers live here. The low layer is a byte-oriented key-value
//! [`StorageInterface`] with memory and file backends, wrapped by the typed
//! [`StorageService`]. On top of it sit the per-entity [`Repository`]
//! contracts and the [`UnitOfWork`] that groups them behind one commit.

use async_trait::async_trait;
use cart_types::{ConfigSchema, ImplementationRegistry};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use thiserror::Error;

pub mod repository;
pub mod unit_of_work;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

pub use repository::{Filter, OrderHeaderRepository, Repository, UnitOfWork};
pub use unit_of_work::StoreUnitOfWork;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	#[error("Not found")]
	NotFound,
	#[error("Already exists: {0}")]
	AlreadyExists(String),
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Backend error: {0}")]
	Backend(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Low-level interface every storage backend implements.
///
/// Keys have the form `namespace:id`.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes with optional time-to-live.
	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError>;

	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Lists the live keys starting with `prefix`.
	async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Removes expired entries and returns how many were removed.
	/// Backends without expiry keep the default.
	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		Ok(0)
	}
}

/// Builds a backend from its configuration table.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Every storage implementation this crate ships, by configuration name.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
	]
}

fn make_key(namespace: &str, id: &str) -> String {
	format!("{}:{}", namespace, id)
}

/// Typed JSON access on top of a storage backend.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Serializes `data` and stores it under `namespace:id`, creating or
	/// overwriting.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend
			.set_bytes(&make_key(namespace, id), bytes, None)
			.await
	}

	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&make_key(namespace, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Retrieves every value of a namespace.
	///
	/// Entries removed between listing and reading are skipped.
	pub async fn retrieve_all<T: DeserializeOwned>(
		&self,
		namespace: &str,
	) -> Result<Vec<T>, StorageError> {
		let prefix = make_key(namespace, "");
		let mut values = Vec::new();
		for key in self.backend.keys(&prefix).await? {
			match self.backend.get_bytes(&key).await {
				Ok(bytes) => values.push(
					serde_json::from_slice(&bytes)
						.map_err(|e| StorageError::Serialization(e.to_string()))?,
				),
				Err(StorageError::NotFound) => continue,
				Err(e) => return Err(e),
			}
		}
		Ok(values)
	}

	/// Ids present in a namespace.
	pub async fn ids(&self, namespace: &str) -> Result<Vec<String>, StorageError> {
		let prefix = make_key(namespace, "");
		Ok(self
			.backend
			.keys(&prefix)
			.await?
			.into_iter()
			.filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
			.collect())
	}

	pub async fn remove(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&make_key(namespace, id)).await
	}

	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&make_key(namespace, id)).await
	}

	/// Removes expired entries; a no-op for backends without TTL.
	pub async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		self.backend.cleanup_expired().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::memory::MemoryStorage;
	use cart_types::Category;

	fn service() -> StorageService {
		StorageService::new(Box::new(MemoryStorage::new()))
	}

	#[tokio::test]
	async fn test_store_and_retrieve_typed() {
		let storage = service();
		let category = Category {
			id: 7,
			name: "Toys".to_string(),
		};
		storage.store("categories", "7", &category).await.unwrap();

		let loaded: Category = storage.retrieve("categories", "7").await.unwrap();
		assert_eq!(loaded, category);
	}

	#[tokio::test]
	async fn test_retrieve_all_is_namespaced() {
		let storage = service();
		for id in 1..=3 {
			let category = Category {
				id,
				name: format!("c{}", id),
			};
			storage
				.store("categories", &id.to_string(), &category)
				.await
				.unwrap();
		}
		storage.store("customers", "1", &"someone").await.unwrap();

		let all: Vec<Category> = storage.retrieve_all("categories").await.unwrap();
		assert_eq!(all.len(), 3);

		let mut ids = storage.ids("categories").await.unwrap();
		ids.sort();
		assert_eq!(ids, vec!["1", "2", "3"]);
	}
}
