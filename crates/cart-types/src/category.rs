//! Category records and the view models that carry them.

use crate::{Entity, StorageKey};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A product category.
///
/// An `id` of zero marks a category that has not been persisted yet;
/// any other value addresses an existing row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Category {
	#[serde(default)]
	pub id: i32,
	#[validate(length(min = 1, max = 50, message = "Name must be between 1 and 50 characters"))]
	pub name: String,
}

impl Category {
	/// True when the category still has to be inserted.
	pub fn is_new(&self) -> bool {
		self.id == 0
	}
}

impl Entity for Category {
	const KEY: StorageKey = StorageKey::Categories;

	fn id(&self) -> i32 {
		self.id
	}
}

/// Form model submitted to create or update a single category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CategoryVM {
	#[validate(nested)]
	pub category: Category,
}

/// Listing of every category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoriesVM {
	pub categories: Vec<Category>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_empty_name_fails_validation() {
		let vm = CategoryVM {
			category: Category {
				id: 0,
				name: String::new(),
			},
		};
		assert!(vm.validate().is_err());
	}

	#[test]
	fn test_named_category_passes_validation() {
		let vm = CategoryVM {
			category: Category {
				id: 3,
				name: "Books".to_string(),
			},
		};
		assert!(vm.validate().is_ok());
		assert!(!vm.category.is_new());
	}

	#[test]
	fn test_missing_id_deserializes_as_new() {
		let category: Category = serde_json::from_str(r#"{"name":"Garden"}"#).unwrap();
		assert!(category.is_new());
	}
}
