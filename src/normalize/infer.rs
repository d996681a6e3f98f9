//! Owner id inference for nested relation values
//!
//! Shared by the normalizer (children nested under a relation name) and by
//! relation-set mutations (`RelationMut::add`).

use serde_json::{Map, Value};

use crate::config::ScalarRelation;
use crate::errors::{StoreError, StoreResult};
use crate::schema::{Relation, SchemaGraph};
use crate::value::json_type_name;

/// Fill the owner's id into every child of `relation`.
///
/// `data` is a single child or an array of children. Objects get the
/// relation's foreign key set to `owner_id`. Scalars are promoted to rows
/// first: to `{<other fk>: value}` when the related table has exactly one
/// other foreign key (a join table), otherwise according to `policy`.
pub fn infer_relations(
    graph: &SchemaGraph,
    relation: &Relation,
    owner_id: &str,
    data: Value,
    policy: ScalarRelation,
) -> StoreResult<Vec<Value>> {
    let child = graph.require_table(&relation.table)?;

    let items = match data {
        Value::Array(items) => items,
        other => vec![other],
    };

    let mut children = Vec::with_capacity(items.len());
    for item in items {
        let mut row = match item {
            Value::Object(row) => row,
            scalar @ (Value::String(_) | Value::Number(_)) => {
                let others: Vec<_> = child
                    .foreign_key_fields()
                    .filter(|f| f.name() != relation.field)
                    .collect();

                let key_field = match (others.as_slice(), policy) {
                    ([other], _) => other.field_name().to_string(),
                    (_, ScalarRelation::PrimaryKey) => {
                        child.single_key_field().unwrap_or("id").to_string()
                    }
                    (_, ScalarRelation::Reject) => {
                        return Err(StoreError::normalization(
                            child.name(),
                            format!(
                                "cannot infer which field scalar {} of relation '{}' fills",
                                scalar,
                                relation.name.as_deref().unwrap_or(&relation.field)
                            ),
                        ));
                    }
                };

                let mut row = Map::new();
                row.insert(key_field, scalar);
                row
            }
            other => {
                return Err(StoreError::normalization(
                    child.name(),
                    format!("nested relation value must be an object or id, got {}", json_type_name(&other)),
                ));
            }
        };

        row.insert(relation.field_name.clone(), Value::String(owner_id.to_string()));
        children.push(Value::Object(row));
    }

    Ok(children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, SchemaDefinition, TableDef};
    use serde_json::json;

    fn graph() -> SchemaGraph {
        SchemaGraph::build(
            &SchemaDefinition::new()
                .table("User", TableDef::new().field("id", FieldDef::primary_key()))
                .table("Tag", TableDef::new().field("id", FieldDef::primary_key()))
                .table(
                    "Post",
                    TableDef::new()
                        .field("id", FieldDef::primary_key())
                        .field("author", FieldDef::references("User").relation_name("posts")),
                )
                .table(
                    "UserTag",
                    TableDef::new()
                        .field("user", FieldDef::references("User").relation_name("tags"))
                        .field("tag", FieldDef::references("Tag")),
                ),
        )
        .unwrap()
    }

    fn relation(graph: &SchemaGraph, table: &str, name: &str) -> Relation {
        graph.table(table).unwrap().relation(name).unwrap().clone()
    }

    #[test]
    fn test_objects_get_owner() {
        let graph = graph();
        let posts = relation(&graph, "User", "posts");

        let children =
            infer_relations(&graph, &posts, "u1", json!([{"id": "p1"}]), ScalarRelation::PrimaryKey)
                .unwrap();
        assert_eq!(children, vec![json!({"id": "p1", "author": "u1"})]);
    }

    #[test]
    fn test_scalar_into_join_table() {
        let graph = graph();
        let tags = relation(&graph, "User", "tags");

        let children =
            infer_relations(&graph, &tags, "u1", json!(["t1", "t2"]), ScalarRelation::PrimaryKey)
                .unwrap();
        assert_eq!(
            children,
            vec![json!({"tag": "t1", "user": "u1"}), json!({"tag": "t2", "user": "u1"})]
        );
    }

    #[test]
    fn test_ambiguous_scalar_uses_primary_key() {
        let graph = graph();
        // Post has no other foreign key to fill, so the scalar is its id
        let posts = relation(&graph, "User", "posts");

        let children =
            infer_relations(&graph, &posts, "u1", json!("p9"), ScalarRelation::PrimaryKey).unwrap();
        assert_eq!(children, vec![json!({"id": "p9", "author": "u1"})]);
    }

    #[test]
    fn test_ambiguous_scalar_rejected() {
        let graph = graph();
        let posts = relation(&graph, "User", "posts");

        let err = infer_relations(&graph, &posts, "u1", json!("p9"), ScalarRelation::Reject)
            .unwrap_err();
        assert_eq!(err.code(), "NORMDB_NORMALIZATION_FAILED");
    }

    #[test]
    fn test_invalid_child() {
        let graph = graph();
        let posts = relation(&graph, "User", "posts");

        assert!(infer_relations(&graph, &posts, "u1", json!([true]), ScalarRelation::PrimaryKey)
            .is_err());
    }
}
