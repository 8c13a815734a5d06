//! Session configuration: the schema and records a query session starts from.
//!
//! ```
//! use rulegrid::SessionConfig;
//!
//! let config = SessionConfig::from_json(r#"{
//!     "fields": [
//!         {"name": "age", "label": "Age", "dataType": "number"},
//!         {"name": "tags", "label": "Tags", "dataType": "array", "elementType": "string"}
//!     ],
//!     "records": [{"age": 30, "tags": ["a"]}],
//!     "mode": "strict"
//! }"#).unwrap();
//! let session = config.into_session();
//! assert_eq!(session.visible_records().len(), 1);
//! ```

use crate::dataset::{Dataset, QuerySession};
use crate::evaluator::EvalMode;
use crate::record::Record;
use crate::schema::FieldSchema;
use crate::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub fields: FieldSchema,
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default)]
    pub mode: EvalMode,
    /// Initial free-text search.
    #[serde(default)]
    pub search: String,
}

impl SessionConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn dataset(&self) -> Dataset {
        Dataset::new(self.fields.clone(), self.records.clone())
    }

    pub fn into_session(self) -> QuerySession {
        let mut session = QuerySession::new(Dataset::new(self.fields, self.records)).with_mode(self.mode);
        session.set_search(self.search);
        session
    }
}
