//! Schema module: defines the field registry for filters.
//!
//! This module provides the Field and FieldSchema types and a builder for defining the
//! available fields. After construction the schema only grows through [`FieldSchema::add_field`].

use crate::types::DataType;
use crate::{QueryError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

static WORD_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^\w|[A-Z]|\b\w)").expect("static regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

/// A field of the record schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FieldRepr", into = "FieldRepr")]
pub struct Field {
    /// Unique, stable identifier used by rules and records.
    pub name: String,
    /// Display only.
    pub label: String,
    pub data_type: DataType,
}

impl Field {
    pub fn new(name: impl Into<String>, label: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            data_type,
        }
    }
}

// Wire shape used by the editor: `{ name, label, dataType, elementType? }`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldRepr {
    name: String,
    #[serde(default)]
    label: String,
    data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    element_type: Option<String>,
}

impl TryFrom<FieldRepr> for Field {
    type Error = String;

    fn try_from(repr: FieldRepr) -> std::result::Result<Self, Self::Error> {
        let data_type = DataType::from_names(&repr.data_type, repr.element_type.as_deref())
            .ok_or_else(|| {
                format!(
                    "unrecognized data type '{}' for field '{}'",
                    repr.data_type, repr.name
                )
            })?;
        let label = if repr.label.is_empty() {
            repr.name.clone()
        } else {
            repr.label
        };
        Ok(Field {
            name: repr.name,
            label,
            data_type,
        })
    }
}

impl From<Field> for FieldRepr {
    fn from(field: Field) -> Self {
        FieldRepr {
            element_type: field.data_type.element_type().map(|e| e.name().to_string()),
            data_type: field.data_type.name().to_string(),
            name: field.name,
            label: field.label,
        }
    }
}

/// Ordered, name-indexed set of fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Field>", into = "Vec<Field>")]
pub struct FieldSchema {
    fields: Vec<Field>,
    field_ids: HashMap<String, usize>, // name -> position
}

impl FieldSchema {
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.field_ids.get(name).map(|&id| &self.fields[id])
    }

    pub fn data_type(&self, name: &str) -> Option<DataType> {
        self.get(name).map(|f| f.data_type)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Get the position of a field, if it exists.
    pub fn field_id(&self, name: &str) -> Option<usize> {
        self.field_ids.get(name).copied()
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Appends a field. Names are unique; an existing name is rejected.
    pub fn insert(&mut self, field: Field) -> Result<&Field> {
        if field.name.is_empty() {
            return Err(QueryError::EmptyFieldName);
        }
        if self.field_ids.contains_key(&field.name) {
            return Err(QueryError::DuplicateField(field.name));
        }
        let id = self.fields.len();
        self.field_ids.insert(field.name.clone(), id);
        self.fields.push(field);
        Ok(&self.fields[id])
    }

    /// Creates a field from a free-text column title, the way the column editor does:
    /// the name is the camelCased title and the label is the title with a capital first letter.
    pub fn add_field(&mut self, title: &str, data_type: DataType) -> Result<&Field> {
        let name = camel_case(title);
        if name.is_empty() {
            return Err(QueryError::EmptyFieldName);
        }
        self.insert(Field::new(name, capitalize(title), data_type))
    }
}

impl From<Vec<Field>> for FieldSchema {
    fn from(fields: Vec<Field>) -> Self {
        let mut builder = FieldSchemaBuilder::new();
        for field in fields {
            builder = builder.with(field);
        }
        builder.build()
    }
}

impl From<FieldSchema> for Vec<Field> {
    fn from(schema: FieldSchema) -> Self {
        schema.fields
    }
}

#[derive(Debug, Default)]
pub struct FieldSchemaBuilder {
    fields: Vec<Field>,
}

impl FieldSchemaBuilder {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn field(self, name: impl Into<String>, label: impl Into<String>, data_type: DataType) -> Self {
        self.with(Field::new(name, label, data_type))
    }

    /// Adds a field; a repeated name replaces the earlier definition in place.
    pub fn with(mut self, field: Field) -> Self {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }

    pub fn build(self) -> FieldSchema {
        let field_ids = self
            .fields
            .iter()
            .enumerate()
            .map(|(id, f)| (f.name.clone(), id))
            .collect();
        FieldSchema {
            fields: self.fields,
            field_ids,
        }
    }
}

/// `"first seen at"` -> `"firstSeenAt"`.
pub fn camel_case(title: &str) -> String {
    let title = title.trim();
    let cased = WORD_START.replace_all(title, |caps: &regex::Captures<'_>| {
        let m = caps.get(0).map(|m| (m.start(), m.as_str())).unwrap_or((0, ""));
        if m.0 == 0 {
            m.1.to_lowercase()
        } else {
            m.1.to_uppercase()
        }
    });
    WHITESPACE.replace_all(&cased, "").into_owned()
}

fn capitalize(title: &str) -> String {
    let title = title.trim();
    let mut chars = title.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
