use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::TdeError;
use crate::persist::{Persistence, ROWS_KEY};

// A cell value. Fields are schema free, a row can hold strings and
// numbers side by side. Absence is modeled as a missing key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Num(f64),
    Str(String),
}

impl Value {
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Num(n) => Some(*n),
            Value::Str(_) => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_num().is_some()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Num(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

// One record of the table. `id`, `name` and `email` are guaranteed to
// exist as keys, everything else is dynamic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    fields: BTreeMap<String, Value>,
}

impl Row {
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("id".to_string(), Value::Str(id.into()));
        fields.insert("name".to_string(), Value::Str(name.into()));
        fields.insert("email".to_string(), Value::Str(email.into()));
        Row { fields }
    }

    // Callers are responsible for the id/name/email keys being present.
    pub fn from_fields(fields: BTreeMap<String, Value>) -> Self {
        Row { fields }
    }

    pub fn id(&self) -> &str {
        match self.fields.get("id") {
            Some(Value::Str(s)) => s,
            _ => "",
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.values()
    }
}

// Build a fresh row id from the wall clock and a per-batch index.
pub fn synthesize_id(index: usize) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("{}-{}", millis, index)
}

// The ordered row collection. Every mutation writes the full snapshot
// back to the persistence adapter before it returns.
pub struct RowStore {
    rows: Vec<Row>,
    store: Box<dyn Persistence>,
}

impl RowStore {
    pub fn init(store: Box<dyn Persistence>) -> Self {
        let rows = match store.get(ROWS_KEY) {
            Some(json) => match serde_json::from_str::<Vec<Row>>(&json) {
                Ok(rows) => {
                    info!("Loaded {} rows from persistence", rows.len());
                    rows
                }
                Err(e) => {
                    warn!("Corrupt row snapshot ({}), using defaults", e);
                    Self::default_rows()
                }
            },
            None => {
                info!("No row snapshot found, using defaults");
                Self::default_rows()
            }
        };
        RowStore { rows, store }
    }

    pub fn default_rows() -> Vec<Row> {
        let mut alice = Row::new("1", "Alice Johnson", "alice@example.com");
        alice.set("age", Value::Int(34));
        alice.set("role", Value::from("Admin"));
        let mut bob = Row::new("2", "Bob Smith", "bob@example.com");
        bob.set("age", Value::Int(29));
        bob.set("role", Value::from("Editor"));
        let mut carol = Row::new("3", "Carol Diaz", "carol@example.com");
        carol.set("age", Value::Int(41));
        carol.set("role", Value::from("Viewer"));
        vec![alice, bob, carol]
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    // Overwrites the whole collection. Id uniqueness is the callers
    // responsibility, no validation happens here.
    pub fn replace_all(&mut self, rows: Vec<Row>) -> Result<(), TdeError> {
        self.rows = rows;
        debug!("Replaced row collection, {} rows", self.rows.len());
        self.persist()
    }

    // Replaces the row with a matching id in place. Unknown ids are a
    // no-op, the row is not inserted. Persists either way.
    pub fn update(&mut self, row: Row) -> Result<(), TdeError> {
        match self.rows.iter().position(|r| r.id() == row.id()) {
            Some(pos) => {
                self.rows[pos] = row;
            }
            None => {
                debug!("Update for unknown id {:?} ignored", row.id());
            }
        }
        self.persist()
    }

    // Idempotent, deleting an absent id leaves the collection as is.
    pub fn delete(&mut self, id: &str) -> Result<(), TdeError> {
        let before = self.rows.len();
        self.rows.retain(|r| r.id() != id);
        if self.rows.len() != before {
            debug!("Deleted row {}", id);
        }
        self.persist()
    }

    fn persist(&mut self) -> Result<(), TdeError> {
        let json = serde_json::to_string(&self.rows)?;
        self.store.set(ROWS_KEY, &json)
    }
}
