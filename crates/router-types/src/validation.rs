//! Schema validation for implementation-specific TOML configuration.
//!
//! Every source adapter, storage backend and settlement implementation takes
//! a free-form `toml::Value`. Each publishes a [`ConfigSchema`] so the config
//! loader can reject a bad table before anything is constructed.

use alloy_primitives::{Address, U256};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
	/// A required key is absent from the table.
	#[error("Missing required field: {0}")]
	MissingField(String),
	/// The value has the right type but fails a range or custom check.
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	/// The value is of the wrong TOML type.
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
}

/// Type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	String,
	Integer { min: Option<i64>, max: Option<i64> },
	Boolean,
	/// Non-negative integer amount, as a TOML integer or a decimal / `0x`
	/// string for values beyond `i64`.
	Amount,
	/// 20-byte hex address.
	Address,
	Array(Box<FieldType>),
	Table(Schema),
}

pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

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

	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}
}

/// Required and optional fields of one table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| ValidationError::TypeMismatch {
				field: "root".to_string(),
				expected: "table".to_string(),
				actual: config.type_str().to_string(),
			})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			check_field(field, value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				check_field(field, value)?;
			}
		}

		Ok(())
	}
}

fn check_field(field: &Field, value: &toml::Value) -> Result<(), ValidationError> {
	validate_field_type(&field.name, value, &field.field_type)?;
	if let Some(validator) = &field.validator {
		validator(value).map_err(|message| ValidationError::InvalidValue {
			field: field.name.clone(),
			message,
		})?;
	}
	Ok(())
}

/// Reads an amount field as written in TOML: integer, decimal string or hex
/// string.
pub fn parse_amount(value: &toml::Value) -> Result<U256, String> {
	match value {
		toml::Value::Integer(n) if *n >= 0 => Ok(U256::from(*n as u64)),
		toml::Value::Integer(n) => Err(format!("amount {} is negative", n)),
		toml::Value::String(s) => U256::from_str(s).map_err(|e| format!("'{}': {}", s, e)),
		other => Err(format!("expected amount, got {}", other.type_str())),
	}
}

fn mismatch(field: &str, expected: &str, value: &toml::Value) -> ValidationError {
	ValidationError::TypeMismatch {
		field: field.to_string(),
		expected: expected.to_string(),
		actual: value.type_str().to_string(),
	}
}

fn validate_field_type(
	field_name: &str,
	value: &toml::Value,
	expected_type: &FieldType,
) -> Result<(), ValidationError> {
	match expected_type {
		FieldType::String => {
			if !value.is_str() {
				return Err(mismatch(field_name, "string", value));
			}
		}
		FieldType::Integer { min, max } => {
			let int_val = value
				.as_integer()
				.ok_or_else(|| mismatch(field_name, "integer", value))?;

			if let Some(min_val) = min {
				if int_val < *min_val {
					return Err(ValidationError::InvalidValue {
						field: field_name.to_string(),
						message: format!("Value {} is less than minimum {}", int_val, min_val),
					});
				}
			}

			if let Some(max_val) = max {
				if int_val > *max_val {
					return Err(ValidationError::InvalidValue {
						field: field_name.to_string(),
						message: format!("Value {} is greater than maximum {}", int_val, max_val),
					});
				}
			}
		}
		FieldType::Boolean => {
			if !value.is_bool() {
				return Err(mismatch(field_name, "boolean", value));
			}
		}
		FieldType::Amount => {
			if !(value.is_integer() || value.is_str()) {
				return Err(mismatch(field_name, "amount", value));
			}
			parse_amount(value).map_err(|message| ValidationError::InvalidValue {
				field: field_name.to_string(),
				message,
			})?;
		}
		FieldType::Address => {
			let text = value
				.as_str()
				.ok_or_else(|| mismatch(field_name, "address", value))?;
			Address::from_str(text).map_err(|e| ValidationError::InvalidValue {
				field: field_name.to_string(),
				message: e.to_string(),
			})?;
		}
		FieldType::Array(inner_type) => {
			let array = value
				.as_array()
				.ok_or_else(|| mismatch(field_name, "array", value))?;

			for (i, item) in array.iter().enumerate() {
				validate_field_type(&format!("{}[{}]", field_name, i), item, inner_type)?;
			}
		}
		FieldType::Table(schema) => {
			schema.validate(value).map_err(|e| match e {
				ValidationError::MissingField(f) => {
					ValidationError::MissingField(format!("{}.{}", field_name, f))
				}
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
				other => other,
			})?;
		}
	}

	Ok(())
}

/// Implemented by anything configured from a TOML table.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn schema() -> Schema {
		Schema::new(
			vec![
				Field::new("gas", FieldType::Integer { min: Some(0), max: None }),
				Field::new(
					"pairs",
					FieldType::Array(Box::new(FieldType::Table(Schema::new(
						vec![
							Field::new("from", FieldType::Address),
							Field::new("points", FieldType::Array(Box::new(FieldType::Amount))),
						],
						vec![],
					)))),
				),
			],
			vec![Field::new("kind", FieldType::String).with_validator(|v| {
				match v.as_str() {
					Some("constant-product") | Some("stable-swap") => Ok(()),
					_ => Err("unknown kind".to_string()),
				}
			})],
		)
	}

	#[test]
	fn test_valid_config() {
		let config: toml::Value = toml::from_str(
			r#"
gas = 60000
kind = "stable-swap"
[[pairs]]
from = "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE"
points = [1, "1000000000000000000000", "0x10"]
"#,
		)
		.unwrap();
		assert!(schema().validate(&config).is_ok());
	}

	#[test]
	fn test_nested_errors_are_prefixed() {
		let config: toml::Value = toml::from_str(
			r#"
gas = 1
[[pairs]]
from = "not-an-address"
points = []
"#,
		)
		.unwrap();
		match schema().validate(&config) {
			Err(ValidationError::InvalidValue { field, .. }) => assert_eq!(field, "pairs[0].from"),
			other => panic!("unexpected {:?}", other),
		}
	}

	#[test]
	fn test_missing_and_custom_validator() {
		let missing: toml::Value = toml::from_str("pairs = []").unwrap();
		assert!(matches!(
			schema().validate(&missing),
			Err(ValidationError::MissingField(f)) if f == "gas"
		));

		let bad_kind: toml::Value = toml::from_str("gas = 1\npairs = []\nkind = \"x\"").unwrap();
		assert!(matches!(
			schema().validate(&bad_kind),
			Err(ValidationError::InvalidValue { field, .. }) if field == "kind"
		));
	}

	#[test]
	fn test_parse_amount_forms() {
		assert_eq!(parse_amount(&toml::Value::Integer(5)), Ok(U256::from(5)));
		assert_eq!(
			parse_amount(&toml::Value::String("0x10".into())),
			Ok(U256::from(16))
		);
		assert!(parse_amount(&toml::Value::Integer(-1)).is_err());
		assert!(parse_amount(&toml::Value::Boolean(true)).is_err());
	}
}
