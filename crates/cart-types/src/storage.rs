//! Storage-related types for the administration backend.

use serde::{de::DeserializeOwned, Serialize};
use std::str::FromStr;

/// Storage collections, one per entity type.
///
/// Variant order is the order a commit writes collections in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StorageKey {
	Categories,
	OrderHeaders,
	OrderDetails,
	Customers,
}

impl StorageKey {
	/// Returns the namespace used to prefix keys of this collection.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Categories => "categories",
			StorageKey::OrderHeaders => "order_headers",
			StorageKey::OrderDetails => "order_details",
			StorageKey::Customers => "customers",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Categories,
			Self::OrderHeaders,
			Self::OrderDetails,
			Self::Customers,
		]
		.into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all().find(|key| key.as_str() == s).ok_or(())
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}

/// A record persisted through a repository.
///
/// Ids are integers; zero means the record was never stored and the
/// repository assigns the next free id on commit.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
	/// Collection the entity lives in.
	const KEY: StorageKey;

	fn id(&self) -> i32;

	/// Clears navigation properties that are loaded on demand and must not
	/// be written back.
	fn detach_navigation(&mut self) {}
}
