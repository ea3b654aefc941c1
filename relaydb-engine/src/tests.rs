// Engine-level tests: build a tree, run it against a recording backend,
// and check the assembled response, rather than unit-testing the tree
// builder/executor/resolver/assembler in isolation. Permission is granted
// unconditionally via a `DbRoot::All` grant so the tests exercise fan-out,
// reference resolution, and assembly rather than the auth layer (already
// covered elsewhere).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use relaydb_admin::{AccessDb, AppInfo, AuthStatus, DbRoot, MetadataStore, Snapshot, TableMeta};
use relaydb_base::{Error, Map, Result, Value};
use relaydb_eval::DefaultGateEvaluator;
use relaydb_lang::Unit;
use relaydb_net::{BackendAddress, Deadline};
use relaydb_txn::{TransInfo, TxClient};

use crate::{run_request, BackendDriver, BackendRequest, BackendResponse, DefaultRelationRecognizer, ExecCtx};

const APPID: u64 = 1;
const DB_ID: i64 = 1;

fn metadata_with_tables(names: &[&str]) -> MetadataStore {
    let store = MetadataStore::new();
    let mut snapshot = Snapshot::default();

    let mut app_info = AppInfo {
        appid: APPID,
        ..Default::default()
    };
    app_info.access_db.insert(
        DB_ID,
        AccessDb {
            db_id: DB_ID,
            root: DbRoot::All,
            ops: Default::default(),
            status: AuthStatus::Normal,
        },
    );
    snapshot.app_info.insert(APPID, app_info);

    for (i, name) in names.iter().enumerate() {
        let table_id = i as i64 + 1;
        snapshot.tables.insert(
            table_id,
            TableMeta {
                id: table_id,
                db_id: DB_ID,
                name: name.to_string(),
                namespace: None,
                address: relaydb_test::test_address(),
            },
        );
    }

    store.swap(snapshot);
    store
}

fn unit(name: &str) -> Unit {
    Unit {
        name: name.to_string(),
        op: "find".to_string(),
        ..Default::default()
    }
}

fn obj(pairs: Vec<(&str, Value)>) -> Value {
    let mut m = Map::new();
    for (k, v) in pairs {
        m.insert(k.to_string(), v);
    }
    Value::Object(m)
}

/// Returns canned rows per table name and records what each `comments`
/// call saw in its resolved `where`, so tests can assert on row-local
/// reference resolution without a real backend.
struct RecordingBackend {
    orders_calls: AtomicUsize,
    comment_wheres: Mutex<Vec<Value>>,
}

impl RecordingBackend {
    fn new() -> RecordingBackend {
        RecordingBackend {
            orders_calls: AtomicUsize::new(0),
            comment_wheres: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl BackendDriver for RecordingBackend {
    async fn call(
        &self,
        request: &BackendRequest,
        _address: &BackendAddress,
        _trans: Option<&Arc<TransInfo>>,
    ) -> Result<BackendResponse> {
        let result = match request.table.as_str() {
            "users" => Value::Array(vec![
                obj(vec![("id", Value::Int(1)), ("name", Value::Str("alice".into()))]),
                obj(vec![("id", Value::Int(2)), ("name", Value::Str("bob".into()))]),
            ]),
            "orders" => {
                let i = self.orders_calls.fetch_add(1, Ordering::SeqCst) as i64;
                obj(vec![("order_id", Value::Int(100 + i * 100))])
            }
            "comments" => {
                self.comment_wheres
                    .lock()
                    .unwrap()
                    .push(request.resolved_where.clone().unwrap_or(Value::Null));
                obj(vec![("comment_id", Value::Int(900))])
            }
            other => panic!("unexpected table in test backend: {other}"),
        };

        Ok(BackendResponse {
            result: Some(result),
            detail: Default::default(),
            is_nil: false,
        })
    }

    async fn open_tx(&self, _address: &BackendAddress) -> Result<Arc<dyn TxClient>> {
        Err(Error::other("RecordingBackend does not support transactions"))
    }
}

fn ectx<'a>(
    metadata: &'a MetadataStore,
    backend: &'a RecordingBackend,
    gate: &'a DefaultGateEvaluator,
    relation: &'a DefaultRelationRecognizer,
    header: &'a relaydb_net::RequestHeader,
) -> ExecCtx<'a, RecordingBackend, DefaultGateEvaluator, DefaultRelationRecognizer> {
    ExecCtx {
        metadata,
        backend,
        gate,
        relation,
        header,
        deadline: Deadline::after(Duration::from_secs(5)),
    }
}

#[tokio::test]
async fn compound_sub_query_nests_every_child_under_its_own_key() {
    let metadata = metadata_with_tables(&["users", "orders", "comments"]);
    let backend = RecordingBackend::new();
    let gate = DefaultGateEvaluator;
    let relation = DefaultRelationRecognizer;
    let header = relaydb_test::test_header(APPID);
    let ectx = ectx(&metadata, &backend, &gate, &relation, &header);

    let root = Unit {
        sub: vec![unit("orders"), unit("comments")],
        ..unit("users")
    };

    let result = run_request(vec![root], &header, &ectx).await.unwrap();

    let rows = result
        .as_map()
        .and_then(|m| m.get("users"))
        .and_then(Value::as_map)
        .and_then(|m| m.get("data"))
        .and_then(Value::as_array)
        .expect("users.data should be an array");

    assert_eq!(rows.len(), 2, "one row per user, not flattened or dropped");
    for row in rows {
        let row = row.as_map().expect("each row should be an object");
        assert!(
            row.contains_key("orders"),
            "row is missing its orders child: {row:?}"
        );
        assert!(
            row.contains_key("comments"),
            "row is missing its comments child — a second sub: child must not be \
             silently dropped: {row:?}"
        );
    }
}

#[tokio::test]
async fn row_local_sibling_reference_resolves_within_its_own_fanned_out_row() {
    let metadata = metadata_with_tables(&["users", "orders", "comments"]);
    let backend = RecordingBackend::new();
    let gate = DefaultGateEvaluator;
    let relation = DefaultRelationRecognizer;
    let header = relaydb_test::test_header(APPID);
    let ectx = ectx(&metadata, &backend, &gate, &relation, &header);

    let mut comments_unit = unit("comments");
    comments_unit
        .where_
        .insert("@orders.order_id".to_string(), Value::Null);

    let root = Unit {
        sub: vec![unit("orders"), comments_unit],
        ..unit("users")
    };

    run_request(vec![root], &header, &ectx).await.unwrap();

    let seen = backend.comment_wheres.lock().unwrap();
    assert_eq!(seen.len(), 2, "one comments call per fanned-out row");
    assert_eq!(
        seen[0].as_map().and_then(|m| m.get("orders.order_id")),
        Some(&Value::Int(100)),
        "alice's comments should see alice's own order, not bob's"
    );
    assert_eq!(
        seen[1].as_map().and_then(|m| m.get("orders.order_id")),
        Some(&Value::Int(200)),
        "bob's comments should see bob's own order, not alice's"
    );
}

struct AddressRecordingBackend {
    seen_target: Mutex<Option<String>>,
}

#[async_trait]
impl BackendDriver for AddressRecordingBackend {
    async fn call(
        &self,
        _request: &BackendRequest,
        address: &BackendAddress,
        _trans: Option<&Arc<TransInfo>>,
    ) -> Result<BackendResponse> {
        *self.seen_target.lock().unwrap() = Some(address.target.clone());
        Ok(BackendResponse {
            result: Some(Value::Null),
            detail: Default::default(),
            is_nil: false,
        })
    }

    async fn open_tx(&self, _address: &BackendAddress) -> Result<Arc<dyn TxClient>> {
        Err(Error::other("AddressRecordingBackend does not support transactions"))
    }
}

#[tokio::test]
async fn address_override_redirects_a_node_to_a_different_backend() {
    let metadata = metadata_with_tables(&["users"]);
    let backend = AddressRecordingBackend {
        seen_target: Mutex::new(None),
    };
    let gate = DefaultGateEvaluator;
    let relation = DefaultRelationRecognizer;
    let header = relaydb_test::test_header(APPID);
    let ectx = ExecCtx {
        metadata: &metadata,
        backend: &backend,
        gate: &gate,
        relation: &relation,
        header: &header,
        deadline: Deadline::after(Duration::from_secs(5)),
    };

    let mut tree = crate::build_tree(vec![unit("users")], &header, &metadata).unwrap();
    let root = tree.roots[0];
    let mut overridden = relaydb_test::test_address();
    overridden.target = "10.0.0.9:3306".to_string();
    tree.get_mut(root).address_override = Some(overridden);

    crate::execute_request(&mut tree, &ectx).await.unwrap();

    assert_eq!(
        backend.seen_target.lock().unwrap().as_deref(),
        Some("10.0.0.9:3306"),
        "a node's address_override should win over the table's configured default"
    );
}

/// A panicking backend proves `execute_ordinary`'s guard around
/// `query_node` contains the panic to this one node rather than unwinding
/// the whole request.
struct PanicBackend;

#[async_trait]
impl BackendDriver for PanicBackend {
    async fn call(
        &self,
        request: &BackendRequest,
        _address: &BackendAddress,
        _trans: Option<&Arc<TransInfo>>,
    ) -> Result<BackendResponse> {
        if request.table == "orders" {
            panic!("boom");
        }
        Ok(BackendResponse {
            result: Some(obj(vec![("id", Value::Int(1))])),
            detail: Default::default(),
            is_nil: false,
        })
    }

    async fn open_tx(&self, _address: &BackendAddress) -> Result<Arc<dyn TxClient>> {
        Err(Error::other("PanicBackend does not support transactions"))
    }
}

#[tokio::test]
async fn a_panicking_node_fails_only_itself_not_the_whole_request() {
    let metadata = metadata_with_tables(&["users", "orders"]);
    let backend = PanicBackend;
    let gate = DefaultGateEvaluator;
    let relation = DefaultRelationRecognizer;
    let header = relaydb_test::test_header(APPID);
    let ectx = ExecCtx {
        metadata: &metadata,
        backend: &backend,
        gate: &gate,
        relation: &relation,
        header: &header,
        deadline: Deadline::after(Duration::from_secs(5)),
    };

    let units = vec![unit("users"), unit("orders")];

    let result = run_request(units, &header, &ectx).await.unwrap();
    let out = result.as_map().expect("parallel result is an object");

    let data = out
        .get("data")
        .and_then(Value::as_map)
        .expect("data object present");
    assert_eq!(data.get("users"), Some(&obj(vec![("id", Value::Int(1))])));

    let errors = out
        .get("error")
        .and_then(Value::as_map)
        .expect("error object present");
    let orders_error = errors.get("orders").and_then(|v| match v {
        Value::Str(s) => Some(s.as_str()),
        _ => None,
    });
    assert!(
        orders_error.is_some_and(|s| s.contains("panicked")),
        "orders' panic should surface as this node's error, not abort the run: {errors:?}"
    );
}
