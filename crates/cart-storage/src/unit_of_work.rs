//! Unit of work backed by a [`StorageService`].
//!
//! Repositories append to a shared list of pending writes. `save` first
//! resolves the whole list against the committed state (id assignment,
//! existence checks, status patches) and only then writes, so a list that
//! fails to resolve leaves persistence untouched.
//!
//! The backends have no multi-key transactions. Resolved records are
//! written one at a time, ordered by collection and then id, and a backend
//! error stops the commit with the earlier records already written.

use crate::repository::{Filter, OrderHeaderRepository, Repository, UnitOfWork};
use crate::{StorageError, StorageService};
use async_trait::async_trait;
use cart_types::{
	Category, Customer, Entity, OrderDetail, OrderHeader, OrderStatus, PaymentStatus, StorageKey,
	INCLUDE_CUSTOMER,
};
use serde_json::Value;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

enum PendingWrite {
	Put {
		key: StorageKey,
		id: i32,
		data: Value,
		insert: bool,
	},
	Delete {
		key: StorageKey,
		id: i32,
	},
	Status {
		id: i32,
		order_status: OrderStatus,
		payment_status: Option<PaymentStatus>,
	},
}

type Pending = Arc<Mutex<Vec<PendingWrite>>>;

fn poisoned<E>(_: E) -> StorageError {
	StorageError::Backend("Pending write list is poisoned".into())
}

fn stage(pending: &Pending, write: PendingWrite) -> Result<(), StorageError> {
	pending.lock().map_err(poisoned)?.push(write);
	Ok(())
}

fn to_value<T: serde::Serialize>(entity: &T) -> Result<Value, StorageError> {
	serde_json::to_value(entity).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn unknown_include(key: StorageKey, include: &str) -> StorageError {
	StorageError::Backend(format!(
		"Unknown include path '{}' for {}",
		include,
		key.as_str()
	))
}

/// Generic repository over one collection of the storage service.
pub struct StoreRepository<T> {
	storage: Arc<StorageService>,
	pending: Pending,
	_entity: PhantomData<fn() -> T>,
}

impl<T: Entity> StoreRepository<T> {
	fn new(storage: Arc<StorageService>, pending: Pending) -> Self {
		Self {
			storage,
			pending,
			_entity: PhantomData,
		}
	}

	async fn load_all(&self) -> Result<Vec<T>, StorageError> {
		let mut entities: Vec<T> = self.storage.retrieve_all(T::KEY.as_str()).await?;
		entities.sort_by_key(|entity| entity.id());
		Ok(entities)
	}

	fn stage_put(&self, entity: &T, insert: bool) -> Result<(), StorageError> {
		stage(
			&self.pending,
			PendingWrite::Put {
				key: T::KEY,
				id: entity.id(),
				data: to_value(entity)?,
				insert,
			},
		)
	}
}

#[async_trait]
impl<T: Entity> Repository<T> for StoreRepository<T> {
	async fn get_all(&self, include: Option<&'static str>) -> Result<Vec<T>, StorageError> {
		if let Some(include) = include {
			return Err(unknown_include(T::KEY, include));
		}
		self.load_all().await
	}

	async fn get_one(
		&self,
		filter: &Filter<T>,
		include: Option<&'static str>,
	) -> Result<Option<T>, StorageError> {
		Ok(self
			.get_all(include)
			.await?
			.into_iter()
			.find(|entity| filter.matches(entity)))
	}

	fn add(&self, entity: T) -> Result<(), StorageError> {
		self.stage_put(&entity, true)
	}

	fn update(&self, entity: T) -> Result<(), StorageError> {
		self.stage_put(&entity, false)
	}

	fn delete(&self, entity: T) -> Result<(), StorageError> {
		stage(
			&self.pending,
			PendingWrite::Delete {
				key: T::KEY,
				id: entity.id(),
			},
		)
	}
}

/// Order header repository; understands the `customer` include.
pub struct StoreOrderHeaderRepository {
	inner: StoreRepository<OrderHeader>,
}

impl StoreOrderHeaderRepository {
	async fn attach_customer(&self, header: &mut OrderHeader) -> Result<(), StorageError> {
		header.customer = match self
			.inner
			.storage
			.retrieve::<Customer>(StorageKey::Customers.as_str(), &header.customer_ref)
			.await
		{
			Ok(customer) => Some(customer),
			Err(StorageError::NotFound) => None,
			Err(e) => return Err(e),
		};
		Ok(())
	}
}

#[async_trait]
impl Repository<OrderHeader> for StoreOrderHeaderRepository {
	async fn get_all(
		&self,
		include: Option<&'static str>,
	) -> Result<Vec<OrderHeader>, StorageError> {
		let mut headers = self.inner.load_all().await?;
		match include {
			None => {},
			Some(INCLUDE_CUSTOMER) => {
				for header in headers.iter_mut() {
					self.attach_customer(header).await?;
				}
			},
			Some(other) => return Err(unknown_include(StorageKey::OrderHeaders, other)),
		}
		Ok(headers)
	}

	async fn get_one(
		&self,
		filter: &Filter<OrderHeader>,
		include: Option<&'static str>,
	) -> Result<Option<OrderHeader>, StorageError> {
		if let Some(other) = include.filter(|include| *include != INCLUDE_CUSTOMER) {
			return Err(unknown_include(StorageKey::OrderHeaders, other));
		}
		let Some(mut header) = self
			.inner
			.load_all()
			.await?
			.into_iter()
			.find(|header| filter.matches(header))
		else {
			return Ok(None);
		};
		if include.is_some() {
			self.attach_customer(&mut header).await?;
		}
		Ok(Some(header))
	}

	fn add(&self, mut entity: OrderHeader) -> Result<(), StorageError> {
		entity.detach_navigation();
		self.inner.add(entity)
	}

	fn update(&self, mut entity: OrderHeader) -> Result<(), StorageError> {
		entity.detach_navigation();
		self.inner.update(entity)
	}

	fn delete(&self, entity: OrderHeader) -> Result<(), StorageError> {
		self.inner.delete(entity)
	}
}

impl OrderHeaderRepository for StoreOrderHeaderRepository {
	fn update_status(
		&self,
		id: i32,
		order_status: OrderStatus,
		payment_status: Option<PaymentStatus>,
	) -> Result<(), StorageError> {
		stage(
			&self.inner.pending,
			PendingWrite::Status {
				id,
				order_status,
				payment_status,
			},
		)
	}
}

/// Resolved state of the records touched by a commit. `None` marks a
/// deletion.
type Overlay = HashMap<(StorageKey, i32), Option<Value>>;

/// Unit of work over a [`StorageService`]; one per request.
pub struct StoreUnitOfWork {
	storage: Arc<StorageService>,
	pending: Pending,
	category: Arc<StoreRepository<Category>>,
	order_header: Arc<StoreOrderHeaderRepository>,
	order_detail: Arc<StoreRepository<OrderDetail>>,
}

impl StoreUnitOfWork {
	pub fn new(storage: Arc<StorageService>) -> Self {
		let pending: Pending = Arc::new(Mutex::new(Vec::new()));
		Self {
			category: Arc::new(StoreRepository::new(storage.clone(), pending.clone())),
			order_header: Arc::new(StoreOrderHeaderRepository {
				inner: StoreRepository::new(storage.clone(), pending.clone()),
			}),
			order_detail: Arc::new(StoreRepository::new(storage.clone(), pending.clone())),
			storage,
			pending,
		}
	}

	fn take_pending(&self) -> Result<Vec<PendingWrite>, StorageError> {
		let mut pending = self.pending.lock().map_err(poisoned)?;
		Ok(std::mem::take(&mut *pending))
	}

	async fn current(
		&self,
		key: StorageKey,
		id: i32,
		overlay: &Overlay,
	) -> Result<Option<Value>, StorageError> {
		if let Some(resolved) = overlay.get(&(key, id)) {
			return Ok(resolved.clone());
		}
		match self
			.storage
			.retrieve::<Value>(key.as_str(), &id.to_string())
			.await
		{
			Ok(value) => Ok(Some(value)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	async fn exists(&self, key: StorageKey, id: i32, overlay: &Overlay) -> Result<bool, StorageError> {
		match overlay.get(&(key, id)) {
			Some(resolved) => Ok(resolved.is_some()),
			None => self.storage.exists(key.as_str(), &id.to_string()).await,
		}
	}

	async fn next_id(
		&self,
		key: StorageKey,
		next_ids: &mut HashMap<StorageKey, i32>,
		overlay: &Overlay,
	) -> Result<i32, StorageError> {
		let mut next = match next_ids.get(&key) {
			Some(next) => *next,
			None => {
				let stored_max = self
					.storage
					.ids(key.as_str())
					.await?
					.iter()
					.filter_map(|id| id.parse::<i32>().ok())
					.max()
					.unwrap_or(0);
				let staged_max = overlay
					.keys()
					.filter(|(k, _)| *k == key)
					.map(|(_, id)| *id)
					.max()
					.unwrap_or(0);
				stored_max.max(staged_max) + 1
			},
		};
		while overlay.contains_key(&(key, next)) {
			next += 1;
		}
		next_ids.insert(key, next + 1);
		Ok(next)
	}

	async fn resolve(&self, writes: Vec<PendingWrite>) -> Result<Overlay, StorageError> {
		let mut overlay = Overlay::new();
		let mut next_ids = HashMap::new();

		for write in writes {
			match write {
				PendingWrite::Put {
					key,
					id,
					mut data,
					insert,
				} => {
					let id = if insert && id == 0 {
						let id = self.next_id(key, &mut next_ids, &overlay).await?;
						data.as_object_mut()
							.ok_or_else(|| {
								StorageError::Serialization(format!(
									"Record for {} is not an object",
									key.as_str()
								))
							})?
							.insert("id".to_string(), Value::from(id));
						id
					} else {
						let exists = self.exists(key, id, &overlay).await?;
						if insert && exists {
							return Err(StorageError::AlreadyExists(format!(
								"{}:{}",
								key.as_str(),
								id
							)));
						}
						if !insert && !exists {
							return Err(StorageError::NotFound);
						}
						id
					};
					overlay.insert((key, id), Some(data));
				},
				PendingWrite::Delete { key, id } => {
					if !self.exists(key, id, &overlay).await? {
						return Err(StorageError::NotFound);
					}
					overlay.insert((key, id), None);
				},
				PendingWrite::Status {
					id,
					order_status,
					payment_status,
				} => {
					let key = StorageKey::OrderHeaders;
					let value = self
						.current(key, id, &overlay)
						.await?
						.ok_or(StorageError::NotFound)?;
					let mut header: OrderHeader = serde_json::from_value(value)
						.map_err(|e| StorageError::Serialization(e.to_string()))?;
					header.order_status = order_status;
					if let Some(payment_status) = payment_status {
						header.payment_status = payment_status;
					}
					overlay.insert((key, id), Some(to_value(&header)?));
				},
			}
		}

		Ok(overlay)
	}
}

#[async_trait]
impl UnitOfWork for StoreUnitOfWork {
	fn category(&self) -> Arc<dyn Repository<Category>> {
		self.category.clone()
	}

	fn order_header(&self) -> Arc<dyn OrderHeaderRepository> {
		self.order_header.clone()
	}

	fn order_detail(&self) -> Arc<dyn Repository<OrderDetail>> {
		self.order_detail.clone()
	}

	/// Staged writes are consumed whether or not the commit succeeds.
	async fn save(&self) -> Result<(), StorageError> {
		let writes = self.take_pending()?;
		if writes.is_empty() {
			return Ok(());
		}
		let staged = writes.len();

		let mut records: Vec<_> = self.resolve(writes).await?.into_iter().collect();
		records.sort_by_key(|(record, _)| *record);
		let total = records.len();

		for (written, ((key, id), value)) in records.into_iter().enumerate() {
			let id = id.to_string();
			let result = match value {
				Some(value) => self.storage.store(key.as_str(), &id, &value).await,
				None => self.storage.remove(key.as_str(), &id).await,
			};
			if let Err(e) = result {
				tracing::warn!(
					written,
					total,
					key = %key.as_str(),
					id = %id,
					error = %e,
					"Commit stopped part way"
				);
				return Err(e);
			}
		}

		tracing::debug!(staged, records = total, "Committed unit of work");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::memory::MemoryStorage;
	use crate::StorageInterface;
	use cart_types::ConfigSchema;
	use chrono::Utc;

	fn storage() -> Arc<StorageService> {
		Arc::new(StorageService::new(Box::new(MemoryStorage::new())))
	}

	fn category(id: i32, name: &str) -> Category {
		Category {
			id,
			name: name.to_string(),
		}
	}

	fn header(id: i32) -> OrderHeader {
		OrderHeader {
			id,
			customer_ref: "cust-1".to_string(),
			order_date: Utc::now(),
			order_status: OrderStatus::Approved,
			payment_status: PaymentStatus::Approved,
			..Default::default()
		}
	}

	#[tokio::test]
	async fn test_writes_are_invisible_until_save() {
		let uow = StoreUnitOfWork::new(storage());
		uow.category().add(category(0, "Books")).unwrap();

		assert!(uow.category().get_all(None).await.unwrap().is_empty());

		uow.save().await.unwrap();
		let all = uow.category().get_all(None).await.unwrap();
		assert_eq!(all, vec![category(1, "Books")]);
	}

	#[tokio::test]
	async fn test_new_records_get_consecutive_ids() {
		let storage = storage();
		storage
			.store("categories", "4", &category(4, "Garden"))
			.await
			.unwrap();

		let uow = StoreUnitOfWork::new(storage);
		uow.category().add(category(0, "Books")).unwrap();
		uow.category().add(category(0, "Toys")).unwrap();
		uow.save().await.unwrap();

		let names: Vec<(i32, String)> = uow
			.category()
			.get_all(None)
			.await
			.unwrap()
			.into_iter()
			.map(|c| (c.id, c.name))
			.collect();
		assert_eq!(
			names,
			vec![
				(4, "Garden".to_string()),
				(5, "Books".to_string()),
				(6, "Toys".to_string())
			]
		);
	}

	/// Memory backend that refuses writes to one key.
	struct RejectingStorage {
		inner: MemoryStorage,
		rejected_key: &'static str,
	}

	#[async_trait]
	impl StorageInterface for RejectingStorage {
		async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
			self.inner.get_bytes(key).await
		}

		async fn set_bytes(
			&self,
			key: &str,
			value: Vec<u8>,
			ttl: Option<std::time::Duration>,
		) -> Result<(), StorageError> {
			if key == self.rejected_key {
				return Err(StorageError::Backend("disk full".into()));
			}
			self.inner.set_bytes(key, value, ttl).await
		}

		async fn delete(&self, key: &str) -> Result<(), StorageError> {
			self.inner.delete(key).await
		}

		async fn exists(&self, key: &str) -> Result<bool, StorageError> {
			self.inner.exists(key).await
		}

		async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
			self.inner.keys(prefix).await
		}

		fn config_schema(&self) -> Box<dyn ConfigSchema> {
			self.inner.config_schema()
		}
	}

	#[tokio::test]
	async fn test_backend_failure_stops_commit_in_collection_order() {
		let storage = Arc::new(StorageService::new(Box::new(RejectingStorage {
			inner: MemoryStorage::new(),
			rejected_key: "order_headers:5",
		})));
		let uow = StoreUnitOfWork::new(storage.clone());

		// Staged out of collection order on purpose
		uow.order_detail()
			.add(OrderDetail {
				id: 0,
				order_header_id: 5,
				product_id: 1,
				count: 2,
				price: 4.0,
			})
			.unwrap();
		uow.order_header().add(header(5)).unwrap();
		uow.category().add(category(0, "Books")).unwrap();

		let result = uow.save().await;
		assert!(matches!(result, Err(StorageError::Backend(msg)) if msg == "disk full"));

		// Categories come first and were written; nothing after the header was
		assert_eq!(storage.ids("categories").await.unwrap(), vec!["1"]);
		assert!(!storage.exists("order_headers", "5").await.unwrap());
		assert!(storage.ids("order_details").await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_unresolvable_commit_writes_nothing() {
		let uow = StoreUnitOfWork::new(storage());
		uow.category().add(category(0, "Books")).unwrap();
		uow.category().update(category(42, "Missing")).unwrap();

		let result = uow.save().await;
		assert!(matches!(result, Err(StorageError::NotFound)));
		assert!(uow.category().get_all(None).await.unwrap().is_empty());

		// The failed batch is not replayed by a later save
		uow.save().await.unwrap();
		assert!(uow.category().get_all(None).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_delete_requires_existing_record() {
		let storage = storage();
		storage
			.store("categories", "1", &category(1, "Books"))
			.await
			.unwrap();
		let uow = StoreUnitOfWork::new(storage);

		uow.category().delete(category(1, "Books")).unwrap();
		uow.save().await.unwrap();
		assert!(uow.category().get_all(None).await.unwrap().is_empty());

		uow.category().delete(category(1, "Books")).unwrap();
		assert!(matches!(uow.save().await, Err(StorageError::NotFound)));
	}

	#[tokio::test]
	async fn test_status_update_keeps_payment_status_when_absent() {
		let storage = storage();
		storage.store("order_headers", "3", &header(3)).await.unwrap();
		let uow = StoreUnitOfWork::new(storage);

		uow.order_header()
			.update_status(3, OrderStatus::Processing, None)
			.unwrap();
		uow.save().await.unwrap();

		let stored = uow
			.order_header()
			.get_one(&Filter::by_id(3), None)
			.await
			.unwrap()
			.unwrap();
		assert_eq!(stored.order_status, OrderStatus::Processing);
		assert_eq!(stored.payment_status, PaymentStatus::Approved);

		uow.order_header()
			.update_status(3, OrderStatus::Cancelled, Some(PaymentStatus::Refunded))
			.unwrap();
		uow.save().await.unwrap();
		let stored = uow
			.order_header()
			.get_one(&Filter::by_id(3), None)
			.await
			.unwrap()
			.unwrap();
		assert_eq!(stored.order_status, OrderStatus::Cancelled);
		assert_eq!(stored.payment_status, PaymentStatus::Refunded);
	}

	#[tokio::test]
	async fn test_status_update_of_missing_order_fails() {
		let uow = StoreUnitOfWork::new(storage());
		uow.order_header()
			.update_status(8, OrderStatus::Processing, None)
			.unwrap();
		assert!(matches!(uow.save().await, Err(StorageError::NotFound)));
	}

	#[tokio::test]
	async fn test_customer_include_is_loaded_and_not_persisted() {
		let storage = storage();
		storage.store("order_headers", "1", &header(1)).await.unwrap();
		storage
			.store(
				"customers",
				"cust-1",
				&Customer {
					id: "cust-1".to_string(),
					name: "Ada".to_string(),
					email: "ada@example.com".to_string(),
					phone: None,
				},
			)
			.await
			.unwrap();
		let uow = StoreUnitOfWork::new(storage.clone());

		let loaded = uow
			.order_header()
			.get_one(&Filter::by_id(1), Some(INCLUDE_CUSTOMER))
			.await
			.unwrap()
			.unwrap();
		assert_eq!(loaded.customer.as_ref().unwrap().name, "Ada");

		let plain = uow
			.order_header()
			.get_one(&Filter::by_id(1), None)
			.await
			.unwrap()
			.unwrap();
		assert!(plain.customer.is_none());

		uow.order_header().update(loaded).unwrap();
		uow.save().await.unwrap();
		let raw: Value = storage.retrieve("order_headers", "1").await.unwrap();
		assert!(raw.get("customer").is_none());
	}

	#[tokio::test]
	async fn test_unknown_include_is_rejected() {
		let uow = StoreUnitOfWork::new(storage());
		assert!(uow.category().get_all(Some("products")).await.is_err());
		assert!(uow
			.order_header()
			.get_all(Some("products"))
			.await
			.is_err());
	}

	#[tokio::test]
	async fn test_insert_with_taken_id_is_rejected() {
		let storage = storage();
		storage
			.store("categories", "2", &category(2, "Books"))
			.await
			.unwrap();
		let uow = StoreUnitOfWork::new(storage);

		uow.category().add(category(2, "Toys")).unwrap();
		assert!(matches!(
			uow.save().await,
			Err(StorageError::AlreadyExists(_))
		));
	}
}
