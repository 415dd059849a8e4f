//! Category endpoints.

use super::api_error;
use cart_core::AdminEngine;
use cart_types::{APIError, CategoriesVM, Category, CategoryVM, ModelState};
use tracing::warn;

pub async fn list_categories(engine: &AdminEngine) -> Result<CategoriesVM, APIError> {
	let categories = engine
		.categories()
		.get_all()
		.await
		.map_err(|e| api_error(e, None))?;
	Ok(CategoriesVM { categories })
}

/// A missing category is not an error; the body is `null`.
pub async fn get_category(engine: &AdminEngine, id: i32) -> Result<Option<Category>, APIError> {
	engine
		.categories()
		.get_by_id(id)
		.await
		.map_err(|e| api_error(e, None))
}

pub async fn upsert_category(engine: &AdminEngine, vm: CategoryVM) -> Result<(), APIError> {
	let model_state = ModelState::from_model(&vm);
	engine
		.categories()
		.create_or_update(&model_state, vm)
		.await
		.map_err(|e| {
			warn!("Category save rejected: {}", e);
			api_error(e, Some(&model_state))
		})
}

pub async fn delete_category(engine: &AdminEngine, id: i32) -> Result<(), APIError> {
	engine.categories().delete(id).await.map_err(|e| {
		warn!(category_id = id, "Category delete failed: {}", e);
		api_error(e, None)
	})
}
