//! Reducer Flow Tests
//!
//! A database turns actions into new snapshots:
//! - `reduce` runs one reducer in a fresh session and commits
//! - `combine_reducers` runs several in order over one session
//! - snapshots serialize and load back unchanged

use normdb::{
    create_database, Database, DatabaseOptions, DatabaseState, Reducer, SchemaDefinition,
    Session, StoreError, StoreResult,
};
use serde_json::{json, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn database() -> Database {
    let schema = SchemaDefinition::from_json(&json!({
        "User": {"id": {"pk": true}, "name": {}, "postCount": {}},
        "Post": {
            "id": {"pk": true},
            "title": {},
            "author": {"references": "User", "relationName": "posts", "cascade": true}
        }
    }))
    .unwrap();
    create_database(&schema, DatabaseOptions::default()).unwrap()
}

/// Action: `{"type": ..., "payload": ...}`
fn action(kind: &str, payload: Value) -> Value {
    json!({"type": kind, "payload": payload})
}

fn posts_reducer(session: &mut Session, action: &Value) -> StoreResult<()> {
    let payload = action["payload"].clone();
    match action["type"].as_str() {
        Some("posts/add") => session.upsert("Post", payload).map(|_| ()),
        Some("posts/remove") => session.delete("Post", payload).map(|_| ()),
        _ => Ok(()),
    }
}

/// Keeps `postCount` in step with the posts written before it
fn count_reducer(session: &mut Session, _action: &Value) -> StoreResult<()> {
    let counts: Vec<(String, usize)> = session
        .ids("User")?
        .into_iter()
        .map(|id| {
            let count = session.get_index("Post", "author", &id).map(|ids| ids.len());
            count.map(|count| (id, count))
        })
        .collect::<StoreResult<_>>()?;

    for (id, count) in counts {
        session.update("User", json!({"id": id, "postCount": count}))?;
    }
    Ok(())
}

fn combined(db: &Database) -> impl Fn(&DatabaseState, &Value) -> StoreResult<DatabaseState> {
    let reducers: Vec<Reducer<Value>> = vec![Box::new(posts_reducer), Box::new(count_reducer)];
    db.combine_reducers(reducers)
}

// =============================================================================
// Reducer Tests
// =============================================================================

/// Reducers run in order and see each other's writes.
#[test]
fn test_combined_reducers_run_in_order() {
    let db = database();
    let reduce = combined(&db);

    let state = reduce(
        &db.initial_state(),
        &action("posts/add", json!([
            {"id": "p1", "author": {"id": "u1", "name": "Ann"}},
            {"id": "p2", "author": "u1"}
        ])),
    )
    .unwrap();
    assert_eq!(state.get("User").unwrap().get("u1").unwrap()["postCount"], 2);

    let state = reduce(&state, &action("posts/remove", json!("p1"))).unwrap();
    assert_eq!(state.get("User").unwrap().get("u1").unwrap()["postCount"], 1);
    assert_eq!(state.get("Post").unwrap().len(), 1);
}

/// An action no reducer handles returns the same snapshot.
#[test]
fn test_unhandled_action_keeps_state() {
    let db = database();
    let reduce = combined(&db);
    let state = reduce(&db.initial_state(), &action("posts/add", json!({"id": "p1", "author": "u1"}))).unwrap();

    let next = reduce(&state, &action("noop", Value::Null)).unwrap();
    assert_eq!(next, state);
    assert!(next.shares_table(&state, "Post"));
    assert!(next.shares_table(&state, "User"));
}

/// A failing reducer yields an error and no new snapshot.
#[test]
fn test_failing_reducer() {
    let db = database();
    let state = db.initial_state();

    let failing: Reducer<Value> = Box::new(
        |_session: &mut Session, _action: &Value| -> StoreResult<()> {
            Err(StoreError::argument("rejected"))
        },
    );
    let reducers: Vec<Reducer<Value>> = vec![Box::new(posts_reducer), failing];
    let reduce = db.combine_reducers(reducers);

    let err = reduce(&state, &action("posts/add", json!({"id": "p1"}))).unwrap_err();
    assert_eq!(err.code(), "NORMDB_ARGUMENT_INVALID");
    assert!(state.get("Post").unwrap().is_empty());
}

/// `reduce` commits a single reducer.
#[test]
fn test_reduce_single() {
    let db = database();
    let state = db
        .reduce(&db.initial_state(), &json!({"id": "u1", "name": "Ann"}), |session, user| {
            session.insert("User", user.clone()).map(|_| ())
        })
        .unwrap();

    let session = db.select_tables(&state);
    let user = session.record("User", "u1").unwrap().unwrap();
    assert_eq!(user.attr("name").unwrap(), "Ann");
    assert!(user.relation("posts").unwrap().is_empty());
}

// =============================================================================
// Snapshot Tests
// =============================================================================

/// Every table is present and empty in the initial state.
#[test]
fn test_initial_state() {
    let db = database();
    let state = db.initial_state();

    assert_eq!(state.len(), 2);
    let json = serde_json::to_value(&state).unwrap();
    assert_eq!(json["Post"]["ids"], json!([]));
    assert_eq!(json["Post"]["byId"], json!({}));
    assert_eq!(json["Post"]["indexes"]["author"]["values"], json!({}));
}

/// A committed snapshot written to disk loads back equal and usable.
#[test]
fn test_snapshot_persists() {
    let db = database();
    let reduce = combined(&db);
    let state = reduce(
        &db.initial_state(),
        &action("posts/add", json!({"id": "p1", "title": "a", "author": {"id": "u1"}})),
    )
    .unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, serde_json::to_string_pretty(&state).unwrap()).unwrap();

    let loaded: DatabaseState = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(loaded, state);

    let next = reduce(&loaded, &action("posts/remove", json!({"id": "p1"}))).unwrap();
    assert!(next.get("Post").unwrap().is_empty());
    assert_eq!(next.get("User").unwrap().get("u1").unwrap()["postCount"], 0);
}
