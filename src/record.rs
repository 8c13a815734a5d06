//! Record module: holds the field values of one dataset row.
//!
//! This module provides the Record type. Reads are untyped; typed writes go through
//! [`Record::set`], which checks the value against the schema.

use crate::codec;
use crate::schema::FieldSchema;
use crate::types::Value;
use crate::{QueryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    values: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// Writes a value after checking it conforms to the field's declared type.
    /// `Null` clears a cell and is accepted for every type.
    pub fn set(&mut self, field: &str, value: Value, schema: &FieldSchema) -> Result<()> {
        match schema.get(field) {
            Some(f) => {
                if codec::conforms(f.data_type, &value) {
                    self.values.insert(field.to_string(), value);
                    Ok(())
                } else {
                    Err(QueryError::TypeMismatch {
                        field: field.to_string(),
                        expected: f.data_type.to_string(),
                        actual: value.kind(),
                    })
                }
            }
            None => Err(QueryError::FieldNotFound(field.to_string())),
        }
    }

    /// Writes without any schema check.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub(crate) fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.values.get_mut(field)
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
