//! Schema graph: all tables of a database, connected.
//!
//! Construction is two-pass:
//! 1. every table builds its own field list from its declaration
//! 2. `connect` resolves each foreign key's target table and attaches the
//!    reverse relation to it
//!
//! Once connected, table schemas are frozen behind `Arc`.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::{StoreError, StoreResult};

use super::table::{Relation, TableSchema};
use super::types::SchemaDefinition;

/// Connected, immutable table schemas
#[derive(Debug, Clone)]
pub struct SchemaGraph {
    tables: BTreeMap<String, Arc<TableSchema>>,
    order: Vec<String>,
}

impl SchemaGraph {
    /// Build and connect every table of `definition`
    pub fn build(definition: &SchemaDefinition) -> StoreResult<Self> {
        if definition.tables.is_empty() {
            return Err(StoreError::argument("schema declares no tables"));
        }

        let mut tables = Vec::with_capacity(definition.tables.len());
        for (name, def) in &definition.tables {
            if tables.iter().any(|t: &TableSchema| t.name() == name) {
                return Err(StoreError::argument(format!("table '{}' declared twice", name)));
            }
            tables.push(TableSchema::from_def(name, def)?);
        }

        Self::connect(tables)
    }

    /// Pass 2: resolve references and populate reverse relations
    pub fn connect(mut tables: Vec<TableSchema>) -> StoreResult<Self> {
        let mut relations: BTreeMap<String, Vec<Relation>> = BTreeMap::new();

        for table in &tables {
            for field in table.foreign_key_fields() {
                let Some(fk) = field.foreign() else {
                    continue;
                };

                if !tables.iter().any(|t| t.name() == fk.references) {
                    return Err(StoreError::schema(
                        table.name(),
                        format!(
                            "field '{}' references unknown table '{}'",
                            field.name(),
                            fk.references
                        ),
                    ));
                }

                relations
                    .entry(fk.references.clone())
                    .or_default()
                    .push(Relation {
                        name: fk.relation_name.clone(),
                        table: table.name().to_string(),
                        field: field.name().to_string(),
                        field_name: field.field_name().to_string(),
                        unique: fk.unique,
                        cascade: fk.cascade,
                    });
            }
        }

        for table in &mut tables {
            let incoming = relations.remove(table.name()).unwrap_or_default();
            table.connect(incoming);
        }

        let order = tables.iter().map(|t| t.name().to_string()).collect();
        let tables = tables
            .into_iter()
            .map(|t| (t.name().to_string(), Arc::new(t)))
            .collect();

        Ok(Self { tables, order })
    }

    pub fn table(&self, name: &str) -> Option<&Arc<TableSchema>> {
        self.tables.get(name)
    }

    /// Like `table`, failing with a lookup error for unknown names
    pub fn require_table(&self, name: &str) -> StoreResult<&Arc<TableSchema>> {
        self.tables
            .get(name)
            .ok_or_else(|| StoreError::lookup(name, "unknown table"))
    }

    /// Tables in declaration order
    pub fn tables(&self) -> impl Iterator<Item = &Arc<TableSchema>> {
        self.order.iter().filter_map(|name| self.tables.get(name))
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
