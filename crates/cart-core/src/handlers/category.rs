//! Category create, read, update and delete.

use crate::error::AdminError;
use crate::validation::ensure_valid;
use cart_storage::{Filter, UnitOfWork};
use cart_types::{Category, CategoryVM, ModelState};
use std::sync::Arc;
use tracing::instrument;

const CATEGORY_NOT_FOUND: &str = "Category not found";

pub struct CategoryHandler {
	uow: Arc<dyn UnitOfWork>,
}

impl CategoryHandler {
	pub fn new(uow: Arc<dyn UnitOfWork>) -> Self {
		Self { uow }
	}

	pub async fn get_all(&self) -> Result<Vec<Category>, AdminError> {
		Ok(self.uow.category().get_all(None).await?)
	}

	/// Returns `None` when no category has `id`.
	pub async fn get_by_id(&self, id: i32) -> Result<Option<Category>, AdminError> {
		Ok(self
			.uow
			.category()
			.get_one(&Filter::by_id(id), None)
			.await?)
	}

	/// Inserts the category when its id is zero, otherwise replaces the
	/// stored one.
	#[instrument(skip_all, fields(category_id = %vm.category.id))]
	pub async fn create_or_update(
		&self,
		model_state: &ModelState,
		vm: CategoryVM,
	) -> Result<(), AdminError> {
		ensure_valid(model_state)?;

		let category = vm.category;
		let created = category.is_new();
		if created {
			self.uow.category().add(category)?;
		} else {
			self.uow.category().update(category)?;
		}
		self.uow.save().await?;

		tracing::info!(created, "Category saved");
		Ok(())
	}

	#[instrument(skip_all, fields(category_id = %id))]
	pub async fn delete(&self, id: i32) -> Result<(), AdminError> {
		let category = self
			.uow
			.category()
			.get_one(&Filter::by_id(id), None)
			.await?
			.ok_or_else(|| AdminError::NotFound(CATEGORY_NOT_FOUND.to_string()))?;

		self.uow.category().delete(category)?;
		self.uow.save().await?;

		tracing::info!("Category deleted");
		Ok(())
	}
}
