#![forbid(unsafe_code)]

use crate::{FieldType, SchemaError, Value};
use std::vec::IntoIter;
use time::OffsetDateTime;

/// Sequential, type-checked reader over one materialized row.
///
/// Constructors read fields in declaration order and call [`RowReader::finish`]
/// to reject rows carrying extra values.
#[derive(Debug)]
pub struct RowReader {
    values: IntoIter<Value>,
    position: usize,
    total: usize,
}

impl RowReader {
    pub fn new(values: Vec<Value>) -> Self {
        let total = values.len();
        Self {
            values: values.into_iter(),
            position: 0,
            total,
        }
    }

    pub fn remaining(&self) -> usize {
        self.total - self.position
    }

    fn next(&mut self, expected: FieldType) -> Result<Value, SchemaError> {
        let value = self.values.next().ok_or(SchemaError::ArityMismatch {
            expected: self.position + 1,
            actual: self.total,
        })?;
        self.position += 1;
        if !value.matches(expected) {
            return Err(SchemaError::TypeMismatch {
                field: format!("#{}", self.position - 1),
                expected,
                actual: value.type_name(),
            });
        }
        Ok(value)
    }

    pub fn text(&mut self) -> Result<Option<String>, SchemaError> {
        match self.next(FieldType::String)? {
            Value::Text(value) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    pub fn integer(&mut self) -> Result<Option<i64>, SchemaError> {
        match self.next(FieldType::Integer)? {
            Value::Integer(value) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    pub fn boolean(&mut self) -> Result<Option<bool>, SchemaError> {
        match self.next(FieldType::Boolean)? {
            Value::Boolean(value) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    pub fn timestamp(&mut self) -> Result<Option<OffsetDateTime>, SchemaError> {
        match self.next(FieldType::Timestamp)? {
            Value::Timestamp(value) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    pub fn finish(self) -> Result<(), SchemaError> {
        if self.position != self.total {
            return Err(SchemaError::ArityMismatch {
                expected: self.position,
                actual: self.total,
            });
        }
        Ok(())
    }
}
