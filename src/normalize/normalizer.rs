//! Recursive normalization of nested input into per-table rows

use serde_json::Value;
use tracing::trace;

use crate::config::DatabaseOptions;
use crate::errors::{StoreError, StoreResult};
use crate::schema::{Relation, SchemaGraph, TableSchema};
use crate::value::{json_type_name, Row};

use super::context::NormalizeContext;
use super::infer::infer_relations;

/// Whether a missing primary key may be generated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    /// Insert path: the key generator is consulted for keyless rows
    Generate,
    /// Update path: every row must carry its key
    Require,
}

/// Flattens nested rows of one table into a `NormalizeContext`
#[derive(Debug, Clone, Copy)]
pub struct Normalizer<'a> {
    graph: &'a SchemaGraph,
    options: &'a DatabaseOptions,
}

impl<'a> Normalizer<'a> {
    pub fn new(graph: &'a SchemaGraph, options: &'a DatabaseOptions) -> Self {
        Self { graph, options }
    }

    /// Normalize `data` (one row or an array of rows) into `table`.
    ///
    /// Rows of every table reached through foreign keys or nested relations
    /// land in `ctx`. Returns the primary keys of the top-level rows, in
    /// input order.
    pub fn normalize(
        &self,
        table: &str,
        data: Value,
        ctx: &mut NormalizeContext,
        mode: KeyMode,
    ) -> StoreResult<Vec<String>> {
        let schema = self.graph.require_table(table)?;

        let items = match data {
            Value::Array(items) => items,
            other => vec![other],
        };

        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            ctx.enter(schema.name(), self.options.config.max_depth)?;
            let result = self.normalize_row(schema, item, ctx, mode);
            ctx.leave();
            ids.push(result?);
        }

        Ok(ids)
    }

    fn normalize_row(
        &self,
        schema: &TableSchema,
        item: Value,
        ctx: &mut NormalizeContext,
        mode: KeyMode,
    ) -> StoreResult<String> {
        let table = schema.name();

        let mut row = match item {
            Value::Object(row) => row,
            other => {
                return Err(StoreError::normalization(
                    table,
                    format!("expected an object row, got {}", json_type_name(&other)),
                ));
            }
        };

        if let Some(hook) = self.options.normalize_hook(table) {
            row = hook(row, ctx)?;
        }

        for field in schema.fields() {
            if let Some(computed) = field.computed() {
                let value = computed.compute(&row);
                row.insert(field.field_name().to_string(), value);
            }
        }

        // Embedded rows first: a key composed from foreign keys needs them
        // resolved to ids.
        self.resolve_embedded(schema, &mut row, ctx, mode)?;

        let id = self.resolve_primary_key(schema, &mut row, mode)?;

        let mut nested: Vec<(&Relation, Value)> = Vec::new();
        for relation in schema.relations() {
            let Some(name) = relation.name.as_deref() else {
                continue;
            };
            if let Some(value) = row.remove(name) {
                nested.push((relation, value));
            }
        }

        let out = ctx.table_mut(table);
        if out.by_id.contains_key(&id) {
            out.unindex(&id);
        }
        out.put(&id, row);

        let merged = out.by_id.get(&id).cloned().unwrap_or_default();
        for fk in schema.get_foreign_keys(&merged) {
            if let Some(value) = fk.value {
                out.index(table, fk.field, fk.unique, value, &id)?;
            }
        }

        trace!(table, id = %id, nested = nested.len(), "normalized row");

        for (relation, value) in nested {
            if value.is_null() {
                continue;
            }
            let children = infer_relations(
                self.graph,
                relation,
                &id,
                value,
                self.options.config.scalar_relation,
            )?;
            self.normalize(&relation.table, Value::Array(children), ctx, mode)?;
        }

        Ok(id)
    }

    /// Replace embedded objects under foreign keys with the primary key of
    /// the row they normalize to
    fn resolve_embedded(
        &self,
        schema: &TableSchema,
        row: &mut Row,
        ctx: &mut NormalizeContext,
        mode: KeyMode,
    ) -> StoreResult<()> {
        for field in schema.foreign_key_fields() {
            let Some(target) = field.references() else {
                continue;
            };

            let embedded = match row.get(field.field_name()) {
                Some(Value::Object(_)) | Some(Value::Array(_)) => row.remove(field.field_name()),
                _ => None,
            };
            let Some(embedded) = embedded else {
                continue;
            };

            let mut ids = self.normalize(target, embedded, ctx, mode)?;
            if ids.len() != 1 {
                return Err(StoreError::normalization(
                    schema.name(),
                    format!(
                        "array given where scalar row expected for '{}' ({} rows)",
                        field.name(),
                        ids.len()
                    ),
                ));
            }

            let id = ids.remove(0);
            row.insert(field.field_name().to_string(), Value::String(id));
        }

        Ok(())
    }

    fn resolve_primary_key(
        &self,
        schema: &TableSchema,
        row: &mut Row,
        mode: KeyMode,
    ) -> StoreResult<String> {
        let separator = &self.options.config.key_separator;
        if let Some(id) = schema.get_primary_key(row, separator) {
            return Ok(id);
        }

        if mode == KeyMode::Generate {
            if let Some(generate) = self.options.key_generator() {
                if let Some(id) = generate(schema.name(), row) {
                    if let Some(field) = schema.single_key_field() {
                        row.insert(field.to_string(), Value::String(id.clone()));
                    }
                    return Ok(id);
                }
            }
        }

        Err(StoreError::missing_primary_key(schema.name()))
    }
}
