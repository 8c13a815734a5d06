//! Dataset module: the record set a query runs over, and the session that ties a
//! dataset to a query.
//!
//! Edits are keyed by row index and field name. Array cells are edited item by item with
//! raw text parsed through the [`codec`] for the column's element type.

use crate::codec;
use crate::compiler::SqlCompiler;
use crate::evaluator::{EvalMode, Evaluator};
use crate::query::Query;
use crate::record::Record;
use crate::schema::{Field, FieldSchema};
use crate::types::{DataType, ElementType, Value};
use crate::{QueryError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    schema: FieldSchema,
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(schema: FieldSchema, records: Vec<Record>) -> Self {
        for (row, record) in records.iter().enumerate() {
            for name in record.values().keys() {
                if schema.get(name).is_none() {
                    warn!(row, field = %name, "record field is not in the schema");
                }
            }
        }
        Self { schema, records }
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record(&self, row: usize) -> Option<&Record> {
        self.records.get(row)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Appends a column built from a free-text title and fills every row with the
    /// type's default value.
    pub fn add_field(&mut self, title: &str, data_type: DataType) -> Result<&Field> {
        self.add_field_on(title, data_type, codec::today())
    }

    /// Like [`Dataset::add_field`], with the date used for date defaults pinned.
    pub fn add_field_on(&mut self, title: &str, data_type: DataType, today: NaiveDate) -> Result<&Field> {
        let name = self.schema.add_field(title, data_type)?.name.clone();
        let default = codec::default_for(data_type, today);
        for record in &mut self.records {
            record.insert(name.clone(), default.clone());
        }
        debug!(field = %name, data_type = %data_type, rows = self.records.len(), "added field");
        self.schema
            .get(&name)
            .ok_or(QueryError::FieldNotFound(name))
    }

    /// Overwrites one cell. The value must conform to the field's type; `Null` clears the cell.
    pub fn edit_cell(&mut self, row: usize, field: &str, value: Value) -> Result<()> {
        let len = self.records.len();
        let record = self
            .records
            .get_mut(row)
            .ok_or(QueryError::RowIndexOutOfRange { index: row, len })?;
        record.set(field, value, &self.schema)
    }

    /// Parses `raw` for the column's element type and appends it to the array cell.
    pub fn add_array_item(&mut self, row: usize, field: &str, raw: &str) -> Result<()> {
        let (element_type, items) = array_cell(&self.schema, &mut self.records, row, field)?;
        items.push(parse_item(raw, element_type));
        Ok(())
    }

    /// Replaces one item of an array cell with `raw` parsed for the element type.
    pub fn edit_array_item(&mut self, row: usize, field: &str, item: usize, raw: &str) -> Result<()> {
        let (element_type, items) = array_cell(&self.schema, &mut self.records, row, field)?;
        let len = items.len();
        let slot = items
            .get_mut(item)
            .ok_or(QueryError::ArrayIndexOutOfRange { index: item, len })?;
        *slot = parse_item(raw, element_type);
        Ok(())
    }

    /// Removes one item of an array cell and returns it.
    pub fn delete_array_item(&mut self, row: usize, field: &str, item: usize) -> Result<Value> {
        let (_, items) = array_cell(&self.schema, &mut self.records, row, field)?;
        if item >= items.len() {
            return Err(QueryError::ArrayIndexOutOfRange {
                index: item,
                len: items.len(),
            });
        }
        Ok(items.remove(item))
    }

    /// Records matching `query` and `search`, in row order.
    pub fn filter(&self, query: &Query, search: &str, mode: EvalMode) -> Vec<&Record> {
        Evaluator::new(&self.schema)
            .with_mode(mode)
            .filter_all(&self.records, query, search)
    }
}

// Boolean items only accept the exact text "true".
fn parse_item(raw: &str, element_type: ElementType) -> Value {
    match element_type {
        ElementType::Boolean => Value::Bool(raw == "true"),
        other => codec::parse_element(raw, other),
    }
}

fn array_cell<'r>(
    schema: &FieldSchema,
    records: &'r mut [Record],
    row: usize,
    field: &str,
) -> Result<(ElementType, &'r mut Vec<Value>)> {
    let data_type = schema
        .data_type(field)
        .ok_or_else(|| QueryError::FieldNotFound(field.to_string()))?;
    let element_type = data_type
        .element_type()
        .ok_or_else(|| QueryError::NotAnArray(field.to_string()))?;
    let len = records.len();
    let record = records
        .get_mut(row)
        .ok_or(QueryError::RowIndexOutOfRange { index: row, len })?;
    if record.get(field).map_or(true, Value::is_null) {
        record.insert(field, Value::Array(Vec::new()));
    }
    let cell = record
        .get_mut(field)
        .ok_or_else(|| QueryError::FieldNotFound(field.to_string()))?;
    if !matches!(cell, Value::Array(_)) {
        // a stray scalar becomes the first item
        let scalar = std::mem::take(cell);
        *cell = Value::Array(vec![scalar]);
    }
    match cell {
        Value::Array(items) => Ok((element_type, items)),
        _ => Err(QueryError::NotAnArray(field.to_string())),
    }
}

/// One query session: a dataset, the query being edited, the free-text search and the
/// evaluation mode. Both outputs are recomputed from the current snapshot on every call.
#[derive(Debug, Clone, Default)]
pub struct QuerySession {
    dataset: Dataset,
    query: Query,
    search: String,
    mode: EvalMode,
}

impl QuerySession {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            query: Query::new(),
            search: String::new(),
            mode: EvalMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: EvalMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn dataset_mut(&mut self) -> &mut Dataset {
        &mut self.dataset
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn set_query(&mut self, query: Query) {
        self.query = query;
    }

    /// Applies one structural edit. On error the current query is left untouched.
    ///
    /// ```
    /// use rulegrid::{Dataset, QuerySession};
    ///
    /// let mut session = QuerySession::new(Dataset::default());
    /// session.update(|q| Ok(q.add_group())).unwrap();
    /// assert_eq!(session.query().groups().len(), 2);
    /// assert!(session.update(|q| q.delete_group(5)).is_err());
    /// ```
    pub fn update<F>(&mut self, edit: F) -> Result<()>
    where
        F: FnOnce(&Query) -> Result<Query>,
    {
        self.query = edit(&self.query)?;
        Ok(())
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
    }

    pub fn mode(&self) -> EvalMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: EvalMode) {
        self.mode = mode;
    }

    pub fn compiled_sql(&self) -> String {
        SqlCompiler::new(self.dataset.schema()).compile(&self.query)
    }

    pub fn visible_records(&self) -> Vec<&Record> {
        self.dataset.filter(&self.query, &self.search, self.mode)
    }

    /// Row indices of the visible records, for edits keyed by row.
    pub fn visible_rows(&self) -> Vec<usize> {
        Evaluator::new(self.dataset.schema())
            .with_mode(self.mode)
            .filter_indices(self.dataset.records(), &self.query, &self.search)
    }
}
