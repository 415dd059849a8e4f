//! Schema checks for implementation-specific configuration tables.
//!
//! Each storage or payment implementation receives its own raw TOML table.
//! Implementations describe the fields they understand with a [`Schema`]
//! and reject malformed tables before they are used.

use thiserror::Error;

/// Errors produced while checking a configuration table.
#[derive(Debug, Error)]
pub enum ValidationError {
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
}

/// Expected type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// Integer with inclusive bounds.
	Integer { min: Option<i64>, max: Option<i64> },
	Boolean,
	/// Nested table checked against its own schema.
	Table(Schema),
}

/// Extra check run after the type matched.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A named field of a [`Schema`].
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	/// Attaches a custom check returning an error message on failure.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		check_type(&self.name, value, &self.field_type)?;
		if let Some(validator) = &self.validator {
			validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			})?;
		}
		Ok(())
	}
}

/// Required and optional fields of a configuration table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Checks `config`, failing on the first missing or malformed field.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config.as_table().ok_or_else(|| ValidationError::TypeMismatch {
			field: "root".to_string(),
			expected: "table".to_string(),
			actual: config.type_str().to_string(),
		})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			field.check(value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(value)?;
			}
		}

		Ok(())
	}
}

fn mismatch(field: &str, expected: &str, value: &toml::Value) -> ValidationError {
	ValidationError::TypeMismatch {
		field: field.to_string(),
		expected: expected.to_string(),
		actual: value.type_str().to_string(),
	}
}

fn check_type(
	field_name: &str,
	value: &toml::Value,
	expected_type: &FieldType,
) -> Result<(), ValidationError> {
	match expected_type {
		FieldType::String if !value.is_str() => Err(mismatch(field_name, "string", value)),
		FieldType::Boolean if !value.is_bool() => Err(mismatch(field_name, "boolean", value)),
		FieldType::String | FieldType::Boolean => Ok(()),
		FieldType::Integer { min, max } => {
			let int_val = value
				.as_integer()
				.ok_or_else(|| mismatch(field_name, "integer", value))?;
			if min.is_some_and(|min| int_val < min) || max.is_some_and(|max| int_val > max) {
				return Err(ValidationError::InvalidValue {
					field: field_name.to_string(),
					message: format!("Value {} is outside {:?}..={:?}", int_val, min, max),
				});
			}
			Ok(())
		},
		FieldType::Table(schema) => schema.validate(value).map_err(|e| match e {
			ValidationError::MissingField(f) => {
				ValidationError::MissingField(format!("{}.{}", field_name, f))
			},
			ValidationError::InvalidValue { field, message } => ValidationError::InvalidValue {
				field: format!("{}.{}", field_name, field),
				message,
			},
			ValidationError::TypeMismatch {
				field,
				expected,
				actual,
			} => ValidationError::TypeMismatch {
				field: format!("{}.{}", field_name, field),
				expected,
				actual,
			},
		}),
	}
}

/// Configuration schema of a pluggable implementation.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}
