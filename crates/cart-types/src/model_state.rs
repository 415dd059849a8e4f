//! Validation summary collected while binding a submitted view model.
//!
//! Mutating operations consult [`ModelState::is_valid`] before touching
//! persistence. The summary is purely structural: it records which fields
//! failed and why, and nothing about business rules.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

/// Field name to error messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelState {
	errors: BTreeMap<String, Vec<String>>,
}

impl ModelState {
	pub fn new() -> Self {
		Self::default()
	}

	/// Validates `model` and records every failing field.
	pub fn from_model<T: Validate>(model: &T) -> Self {
		match model.validate() {
			Ok(()) => Self::new(),
			Err(errors) => Self::from(errors),
		}
	}

	/// Records an error against `field`.
	pub fn add_model_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
		self.errors
			.entry(field.into())
			.or_default()
			.push(message.into());
	}

	/// True iff no field error has been recorded.
	pub fn is_valid(&self) -> bool {
		self.errors.is_empty()
	}

	pub fn errors(&self) -> &BTreeMap<String, Vec<String>> {
		&self.errors
	}

	pub fn error_count(&self) -> usize {
		self.errors.values().map(Vec::len).sum()
	}

	fn collect(&mut self, prefix: Option<&str>, errors: &ValidationErrors) {
		for (field, kind) in errors.errors() {
			let name = match prefix {
				Some(prefix) => format!("{}.{}", prefix, field),
				None => field.to_string(),
			};
			match kind {
				ValidationErrorsKind::Field(list) => {
					for error in list {
						self.add_model_error(name.clone(), describe(error));
					}
				},
				ValidationErrorsKind::Struct(inner) => self.collect(Some(&name), inner),
				ValidationErrorsKind::List(items) => {
					for (index, inner) in items {
						self.collect(Some(&format!("{}[{}]", name, index)), inner);
					}
				},
			}
		}
	}
}

fn describe(error: &ValidationError) -> String {
	match &error.message {
		Some(message) => message.to_string(),
		None => format!("Validation failed: {}", error.code),
	}
}

impl From<ValidationErrors> for ModelState {
	fn from(errors: ValidationErrors) -> Self {
		let mut state = Self::new();
		state.collect(None, &errors);
		state
	}
}
