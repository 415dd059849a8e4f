//! Repository and unit-of-work contracts used by the admin handlers.
//!
//! Reads go straight to persistence. Writes are only staged by the
//! repositories and become visible once the owning [`UnitOfWork`] saves.

use crate::StorageError;
use async_trait::async_trait;
use cart_types::{Category, Entity, OrderDetail, OrderHeader, OrderStatus, PaymentStatus};
use std::fmt;
use std::sync::Arc;

/// Predicate used to select a single record.
///
/// Carries a description next to the closure so that logs and test
/// expectations can tell filters apart.
pub struct Filter<T> {
	description: String,
	predicate: Box<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T> Filter<T> {
	pub fn new(
		description: impl Into<String>,
		predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
	) -> Self {
		Self {
			description: description.into(),
			predicate: Box::new(predicate),
		}
	}

	pub fn matches(&self, entity: &T) -> bool {
		(self.predicate)(entity)
	}

	pub fn description(&self) -> &str {
		&self.description
	}
}

impl<T: Entity> Filter<T> {
	/// Selects the record whose id equals `id`.
	pub fn by_id(id: i32) -> Self {
		Self::new(format!("id == {}", id), move |entity: &T| entity.id() == id)
	}
}

impl<T> fmt::Debug for Filter<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Filter")
			.field("description", &self.description)
			.finish()
	}
}

/// Per-entity access to persistence.
///
/// `include` names a navigation property to load eagerly. Repositories
/// reject include paths they do not know.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
	async fn get_all(&self, include: Option<&'static str>) -> Result<Vec<T>, StorageError>;

	/// First record matching `filter`, or `None`.
	async fn get_one(
		&self,
		filter: &Filter<T>,
		include: Option<&'static str>,
	) -> Result<Option<T>, StorageError>;

	/// Stages an insert. An id of zero gets the next free id on commit.
	fn add(&self, entity: T) -> Result<(), StorageError>;

	/// Stages a full overwrite of an existing record.
	fn update(&self, entity: T) -> Result<(), StorageError>;

	/// Stages removal of an existing record.
	fn delete(&self, entity: T) -> Result<(), StorageError>;
}

/// Order header repository with the status-only update the workflow uses.
pub trait OrderHeaderRepository: Repository<OrderHeader> {
	/// Stages a status change for order `id`.
	///
	/// `payment_status` of `None` leaves the stored payment status alone.
	fn update_status(
		&self,
		id: i32,
		order_status: OrderStatus,
		payment_status: Option<PaymentStatus>,
	) -> Result<(), StorageError>;
}

/// Groups the repositories of one request behind a single commit.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
	fn category(&self) -> Arc<dyn Repository<Category>>;

	fn order_header(&self) -> Arc<dyn OrderHeaderRepository>;

	fn order_detail(&self) -> Arc<dyn Repository<OrderDetail>>;

	/// Applies every staged write.
	///
	/// A write that cannot be resolved (missing record, taken id) fails the
	/// commit before anything is written. A backend failure while writing
	/// can leave the records ahead of it written.
	async fn save(&self) -> Result<(), StorageError>;
}
