#![forbid(unsafe_code)]

use crate::{SchemaError, validate_identifier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use time::OffsetDateTime;

/// Semantic type of a declared field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Boolean,
    Timestamp,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Timestamp => "timestamp",
        }
    }

    /// Declared column type. Booleans are stored as 0/1 and timestamps as
    /// unix nanoseconds; the distinct names keep a type change visible to the
    /// layout check on reopen.
    pub fn sql_type(self) -> &'static str {
        match self {
            FieldType::String => "TEXT",
            FieldType::Integer => "INTEGER",
            FieldType::Boolean => "BOOLEAN",
            FieldType::Timestamp => "TIMESTAMP",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One positional field value. `Null` is accepted for every field type.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Boolean(bool),
    Timestamp(OffsetDateTime),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Text(_) => "string",
            Value::Integer(_) => "integer",
            Value::Boolean(_) => "boolean",
            Value::Timestamp(_) => "timestamp",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn matches(&self, field_type: FieldType) -> bool {
        matches!(
            (self, field_type),
            (Value::Null, _)
                | (Value::Text(_), FieldType::String)
                | (Value::Integer(_), FieldType::Integer)
                | (Value::Boolean(_), FieldType::Boolean)
                | (Value::Timestamp(_), FieldType::Timestamp)
        )
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<OffsetDateTime> for Value {
    fn from(value: OffsetDateTime) -> Self {
        Value::Timestamp(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDef {
    name: String,
    field_type: FieldType,
}

impl FieldDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }
}

/// Ordered `(name, type)` list for one node role.
///
/// Declaration order is the binding order for both inserts and row
/// materialization, so reordering fields changes the physical contract.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchemaDescriptor {
    fields: Vec<FieldDef>,
}

impl SchemaDescriptor {
    pub fn try_new(pairs: &[(&str, FieldType)]) -> Result<Self, SchemaError> {
        let mut seen = BTreeSet::new();
        let mut fields = Vec::with_capacity(pairs.len());
        for (name, field_type) in pairs {
            validate_identifier(name)?;
            if !seen.insert(*name) {
                return Err(SchemaError::DuplicateField((*name).to_string()));
            }
            fields.push(FieldDef {
                name: (*name).to_string(),
                field_type: *field_type,
            });
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    /// Checks arity and per-position type of a value row.
    pub fn check(&self, values: &[Value]) -> Result<(), SchemaError> {
        if values.len() != self.fields.len() {
            return Err(SchemaError::ArityMismatch {
                expected: self.fields.len(),
                actual: values.len(),
            });
        }
        for (field, value) in self.fields.iter().zip(values) {
            if !value.matches(field.field_type) {
                return Err(SchemaError::TypeMismatch {
                    field: field.name.clone(),
                    expected: field.field_type,
                    actual: value.type_name(),
                });
            }
        }
        Ok(())
    }
}
