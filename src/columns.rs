use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::TdeError;
use crate::persist::{COLUMNS_KEY, Persistence};

// Metadata of one display column. The position inside the registry is
// the display order, there is no separate order field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub key: String,
    pub label: String,
    pub visible: bool,
}

impl ColumnDef {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        ColumnDef {
            key: key.into(),
            label: label.into(),
            visible: true,
        }
    }
}

// The ordered column list. Same persist-on-mutate contract as the
// RowStore.
pub struct ColumnRegistry {
    columns: Vec<ColumnDef>,
    store: Box<dyn Persistence>,
}

impl ColumnRegistry {
    pub fn init(store: Box<dyn Persistence>) -> Self {
        let columns = match store.get(COLUMNS_KEY) {
            Some(json) => match serde_json::from_str::<Vec<ColumnDef>>(&json) {
                Ok(columns) => {
                    info!("Loaded {} columns from persistence", columns.len());
                    columns
                }
                Err(e) => {
                    warn!("Corrupt column snapshot ({}), using defaults", e);
                    Self::default_columns()
                }
            },
            None => {
                info!("No column snapshot found, using defaults");
                Self::default_columns()
            }
        };
        ColumnRegistry { columns, store }
    }

    pub fn default_columns() -> Vec<ColumnDef> {
        vec![
            ColumnDef::new("id", "ID"),
            ColumnDef::new("name", "Name"),
            ColumnDef::new("email", "Email"),
            ColumnDef::new("age", "Age"),
            ColumnDef::new("role", "Role"),
        ]
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    // Keys of the visible columns, in display order.
    pub fn visible_keys(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.visible)
            .map(|c| c.key.clone())
            .collect()
    }

    // Flips visibility of the matching column, unknown keys are a no-op.
    pub fn toggle_visibility(&mut self, key: &str) -> Result<(), TdeError> {
        match self.columns.iter_mut().find(|c| c.key == key) {
            Some(column) => {
                column.visible = !column.visible;
                debug!("Column {} visible: {}", key, column.visible);
                self.persist()
            }
            None => {
                debug!("Toggle for unknown column {:?} ignored", key);
                Ok(())
            }
        }
    }

    // Appends to the end of the order. Duplicate keys are rejected.
    pub fn add(&mut self, def: ColumnDef) -> Result<(), TdeError> {
        if self.columns.iter().any(|c| c.key == def.key) {
            warn!("Column key {:?} already registered, ignoring add", def.key);
            return Ok(());
        }
        self.columns.push(def);
        self.persist()
    }

    // Replaces the ordered list verbatim. Used by the presentation layer
    // to realize a column move, no permutation check happens here.
    pub fn reorder(&mut self, new_order: Vec<ColumnDef>) -> Result<(), TdeError> {
        self.columns = new_order;
        self.persist()
    }

    fn persist(&mut self) -> Result<(), TdeError> {
        let json = serde_json::to_string(&self.columns)?;
        self.store.set(COLUMNS_KEY, &json)
    }
}
