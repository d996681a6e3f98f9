//! Per-table accessor tables
//!
//! Each table gets one `RecordType`, built when the database is created,
//! mapping property names to an `Accessor` strategy. Records dispatch
//! through it; nothing is generated per schema.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::{StoreError, StoreResult};
use crate::schema::{SchemaGraph, TableSchema};

/// Property names records reserve for themselves
pub const RESERVED: &[&str] = &["id", "table", "value", "_cache"];

/// How a record property is read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accessor {
    /// Plain row field, read live on every access
    Attribute { field: String },
    /// Foreign key resolving to a row of `target`
    ForeignKey { field: String, target: String },
    /// Reverse relation over a unique foreign key: at most one row
    UniqueRelation { table: String, field: String },
    /// Reverse relation: every row of `table` whose `field` holds the id
    RelationSet { table: String, field: String },
}

/// Accessor table of one schema table
#[derive(Debug, Clone)]
pub struct RecordType {
    table: String,
    accessors: BTreeMap<String, Accessor>,
    order: Vec<String>,
}

impl RecordType {
    /// Build the accessor table, rejecting reserved and duplicate names
    pub fn build(schema: &TableSchema) -> StoreResult<Self> {
        let mut kind = Self {
            table: schema.name().to_string(),
            accessors: BTreeMap::new(),
            order: Vec::new(),
        };

        for field in schema.fields() {
            let prop = field.prop_name();
            if prop == "id" && field.is_pk() {
                // served by `Record::id`
                continue;
            }

            let accessor = match field.references() {
                Some(target) => Accessor::ForeignKey {
                    field: field.field_name().to_string(),
                    target: target.to_string(),
                },
                None => Accessor::Attribute {
                    field: field.field_name().to_string(),
                },
            };
            kind.define(prop, accessor)?;
        }

        for relation in schema.relations() {
            let Some(name) = relation.name.as_deref() else {
                continue;
            };

            let accessor = if relation.unique {
                Accessor::UniqueRelation {
                    table: relation.table.clone(),
                    field: relation.field.clone(),
                }
            } else {
                Accessor::RelationSet {
                    table: relation.table.clone(),
                    field: relation.field.clone(),
                }
            };
            kind.define(name, accessor)?;
        }

        Ok(kind)
    }

    fn define(&mut self, prop: &str, accessor: Accessor) -> StoreResult<()> {
        if RESERVED.contains(&prop) {
            return Err(StoreError::schema(
                &self.table,
                format!("property '{}' collides with a reserved name", prop),
            ));
        }
        if self.accessors.contains_key(prop) {
            return Err(StoreError::schema(
                &self.table,
                format!("property '{}' is defined twice", prop),
            ));
        }

        self.accessors.insert(prop.to_string(), accessor);
        self.order.push(prop.to_string());
        Ok(())
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn accessor(&self, prop: &str) -> Option<&Accessor> {
        self.accessors.get(prop)
    }

    /// Property names in declaration order: fields, then relations
    pub fn props(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

/// Record types of every table of a database
#[derive(Debug, Clone, Default)]
pub struct RecordFactory {
    types: BTreeMap<String, Arc<RecordType>>,
}

impl RecordFactory {
    pub fn build(graph: &SchemaGraph) -> StoreResult<Self> {
        let mut types = BTreeMap::new();
        for schema in graph.tables() {
            types.insert(schema.name().to_string(), Arc::new(RecordType::build(schema)?));
        }
        Ok(Self { types })
    }

    pub fn get(&self, table: &str) -> StoreResult<&Arc<RecordType>> {
        self.types
            .get(table)
            .ok_or_else(|| StoreError::lookup(table, "no record type for table"))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
