use serde::{Serialize, Deserialize};
use std::collections::HashMap;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(pub u64);

impl DocId {
    pub fn new(id: u64) -> Self {
        DocId(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for DocId {
    fn from(id: u64) -> Self {
        DocId(id)
    }
}

/// A stored, sortable slot value. This is deliberately flatter than the
/// concrete field types `schema::specification_t` recognizes (keyword vs.
/// string vs. text vs. uuid all still end up `Text`, positive/integer/float
/// still end up `Integer`/`Number`): the richer typing lives one layer up,
/// in the schema and indexing pipeline, which decide how a `serde_json::Value`
/// maps down onto one of these slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Date(DateTime<Utc>),
    Boolean(bool),
    /// Whole-number slot, kept distinct from `Number` so integer/positive
    /// fields sort and range-filter without float rounding.
    Integer(i64),
    /// Serialized geo value (EWKT-ish: `SRID=4326;POINT(lon lat)` or an HTM
    /// trixel range list). Opaque at this layer; `indexing::geo` owns the
    /// format.
    Geo(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub fields: HashMap<String, FieldValue>,
}

impl Document {
    pub fn new(id: DocId) -> Self {
        Document {
            id,
            fields: HashMap::new(),
        }
    }

    pub fn add_field(&mut self, name: String, value: FieldValue) {
        self.fields.insert(name, value);
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}