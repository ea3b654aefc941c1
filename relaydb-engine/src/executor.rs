// Executor and per-node query: walks the execution tree built by the tree
// builder, running each node's permission-check / reference-resolution /
// plugin-chain / backend-call pipeline and fanning out sub-queries and
// transaction sibling chains.

use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use relaydb_admin::MetadataStore;
use relaydb_auth::{permission_check, table_verify, PermissionRequest};
use relaydb_base::{Error, Map, Result, Value};
use relaydb_eval::{run_defer, run_list, GateContext, GateEvaluator, PluginChain, PluginContext};
use relaydb_lang::{arg_has_referer, referer_param, Op};
use relaydb_net::{Deadline, RequestHeader};
use relaydb_txn::TransInfo;

use crate::backend::{BackendDriver, BackendRequest, BackendResponse};
use crate::resolver::{resolve_referer, RelationRecognizer, Resolved};
use crate::substitute::{substitute_args, substitute_map};
use crate::tree::{Detail, ExecutionTree, Finished, NodeId};

/// Everything a node's query step needs that isn't already on the tree.
pub struct ExecCtx<'a, B: BackendDriver, G: GateEvaluator, R: RelationRecognizer> {
    pub metadata: &'a MetadataStore,
    pub backend: &'a B,
    pub gate: &'a G,
    pub relation: &'a R,
    pub header: &'a RequestHeader,
    pub deadline: Deadline,
}

impl<'a, B: BackendDriver, G: GateEvaluator, R: RelationRecognizer> ExecCtx<'a, B, G, R> {
    fn appid(&self) -> u64 {
        self.header.appid
    }

    /// A stable per-request admission key for gray-scale gating, derived
    /// from the request id.
    fn gray_scale_key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.header.request_id.hash(&mut hasher);
        hasher.finish()
    }
}

/// Runs the whole tree to completion. Errors are recorded on individual
/// nodes rather than aborting the walk; this only returns `Err` for
/// conditions the tree itself cannot recover from.
pub async fn execute_request<B, G, R>(
    tree: &mut ExecutionTree,
    ectx: &ExecCtx<'_, B, G, R>,
) -> Result<()>
where
    B: BackendDriver,
    G: GateEvaluator,
    R: RelationRecognizer,
{
    let start = tree.roots.first().copied();
    execute_chain(tree, start, ectx).await?;
    Ok(())
}

/// Runs one sibling chain starting at `start`, returning the ids visited in
/// order (used by the transaction head to locate the error that triggered a
/// rollback, if any).
async fn execute_chain<B, G, R>(
    tree: &mut ExecutionTree,
    start: Option<NodeId>,
    ectx: &ExecCtx<'_, B, G, R>,
) -> Result<Vec<NodeId>>
where
    B: BackendDriver,
    G: GateEvaluator,
    R: RelationRecognizer,
{
    let mut visited = Vec::new();
    let mut current = start;

    while let Some(id) = current {
        execute_node(tree, id, ectx).await?;
        visited.push(id);
        current = advance(tree, id);
    }

    Ok(visited)
}

/// Advance to `Next`, materializing a fresh per-instance node when the
/// chain being walked is itself a sub-query fan-out row (so sibling state
/// doesn't leak across rows), otherwise reusing the shared logical `Next`
/// node directly.
fn advance(tree: &mut ExecutionTree, id: NodeId) -> Option<NodeId> {
    let node = tree.get(id);
    let is_sub = node.is_sub;
    let parent = node.parent;
    let parent_ret = node.parent_ret.clone();
    let in_trans = node.in_trans;
    let trans_info = node.trans_info.clone();

    let real = tree.real_id(id);
    let real_next = tree.get(real).next?;

    let next_id = if is_sub {
        let inst = tree.push_instance(real_next, true);
        let n = tree.get_mut(inst);
        n.parent = parent;
        n.parent_ret = parent_ret;
        // Instance nodes are materialized fresh per row/chain walk, so
        // unlike logical nodes (wired in `build_siblings`) their `last`
        // pointer has to be set here, not at build time, or the resolver's
        // backward walk sees `None` and ascends past the row immediately.
        n.last = Some(id);
        inst
    } else {
        real_next
    };

    let n = tree.get_mut(next_id);
    n.in_trans = in_trans;
    n.trans_info = trans_info;

    Some(next_id)
}

async fn execute_node<B, G, R>(
    tree: &mut ExecutionTree,
    id: NodeId,
    ectx: &ExecCtx<'_, B, G, R>,
) -> Result<()>
where
    B: BackendDriver,
    G: GateEvaluator,
    R: RelationRecognizer,
{
    let real = tree.real_id(id);
    if tree.get(real).trans_chain.is_some() {
        execute_transaction_head(tree, id, ectx).await
    } else {
        execute_ordinary(tree, id, ectx).await
    }
}

/// Entering a transaction-head node always allocates a fresh `TransInfo`,
/// runs the `trans` sibling chain under it, then finalizes (commit or
/// rollback) every backend the chain enrolled.
async fn execute_transaction_head<B, G, R>(
    tree: &mut ExecutionTree,
    id: NodeId,
    ectx: &ExecCtx<'_, B, G, R>,
) -> Result<()>
where
    B: BackendDriver,
    G: GateEvaluator,
    R: RelationRecognizer,
{
    let real = tree.real_id(id);
    let head_real = tree
        .get(real)
        .trans_chain
        .expect("execute_transaction_head called on a non-head node");

    let is_sub = tree.get(id).is_sub;
    let parent = tree.get(id).parent;
    let parent_ret = tree.get(id).parent_ret.clone();

    let first = if is_sub {
        let inst = tree.push_instance(head_real, true);
        let n = tree.get_mut(inst);
        n.parent = parent;
        n.parent_ret = parent_ret;
        inst
    } else {
        head_real
    };

    let trans_info = TransInfo::new();
    {
        let n = tree.get_mut(first);
        n.in_trans = true;
        n.trans_info = Some(trans_info.clone());
    }

    let visited = Box::pin(execute_chain(tree, Some(first), ectx)).await?;
    let head_error = visited.iter().find_map(|n| tree.get(*n).error.clone());

    tree.get_mut(id).finished = Finished::Finished;
    if let Err(e) = trans_info.finalize(head_error).await {
        tree.get_mut(id).error = Some(e);
    }

    Ok(())
}

/// Run the per-node query, then fan out `Sub` over the result rows if the
/// node succeeded with a non-nil result.
async fn execute_ordinary<B, G, R>(
    tree: &mut ExecutionTree,
    id: NodeId,
    ectx: &ExecCtx<'_, B, G, R>,
) -> Result<()>
where
    B: BackendDriver,
    G: GateEvaluator,
    R: RelationRecognizer,
{
    let real = tree.real_id(id);
    let in_trans = tree.get(id).in_trans;
    let trans_info = tree.get(id).trans_info.clone();

    if in_trans {
        if let Some(ti) = &trans_info {
            if ti.is_rollback() {
                tree.get_mut(id).finished = Finished::RolledBackSkipped;
                return Ok(());
            }
        }
    }

    // Permission checks, reference substitution, and the backend call all
    // run inside `query_node`; a panic in any of them is caught here and
    // turned into this one node's error instead of unwinding the whole
    // tree walk (and every sibling along with it). Plugin invocations get
    // the same treatment via `tokio::spawn` in relaydb-eval's dispatch,
    // which `query_node` itself can't use directly: it borrows `tree` and
    // `ectx`, neither of which is `'static`.
    let guarded = catch_unwind_future(Box::pin(query_node(tree, id, ectx))).await;
    match guarded {
        Ok(Ok(outcome)) => {
            let n = tree.get_mut(id);
            n.result = outcome.result;
            n.detail = outcome.detail;
            n.is_nil = outcome.is_nil;
        }
        Ok(Err(e)) => {
            if in_trans {
                if let Some(ti) = &trans_info {
                    ti.set_rollback();
                }
            }
            tree.get_mut(id).error = Some(e);
        }
        Err(payload) => {
            let path = tree.property(id).path.clone();
            let e = Error::Panic(format!("node {path} panicked: {}", panic_message(&payload)));
            if in_trans {
                if let Some(ti) = &trans_info {
                    ti.set_rollback();
                }
            }
            tree.get_mut(id).error = Some(e);
        }
    }
    tree.get_mut(id).finished = Finished::Finished;

    let real_sub = tree.get(real).sub;
    let node = tree.get(id);
    let succeeded = node.error.is_none() && !node.is_nil;

    if let (Some(sub_real), true) = (real_sub, succeeded) {
        let rows = tree
            .get(id)
            .result
            .clone()
            .unwrap_or(Value::Null)
            .into_rows();
        tree.get_mut(id).has_sub = true;

        for row in rows {
            let inst = tree.push_instance(sub_real, true);
            {
                let n = tree.get_mut(inst);
                n.parent = Some(id);
                n.parent_ret = Some(row);
                n.in_trans = in_trans;
                n.trans_info = trans_info.clone();
            }
            // A `sub:` block may list more than one child (a sibling
            // chain at the logical level, linked via `.next`/`.last`); the
            // full per-row chain has to be kept, not just the head, or
            // every child after the first silently disappears from both
            // reference resolution and the assembled response.
            let chain = Box::pin(execute_chain(tree, Some(inst), ectx)).await?;
            tree.get_mut(id).sub_query.extend(chain);
        }
    }

    Ok(())
}

/// Wraps a pinned, boxed future so a panic during any of its polls is
/// caught instead of unwinding through the caller. `Pin<Box<F>>` is always
/// `Unpin` regardless of `F`, so this doesn't need the future itself to be
/// `Unpin` or `'static` — unlike `tokio::spawn`, it never leaves the
/// current task, so borrows like `query_node`'s `&ExecutionTree` are fine.
fn catch_unwind_future<F: Future>(fut: Pin<Box<F>>) -> CatchUnwind<Pin<Box<F>>> {
    CatchUnwind { inner: fut }
}

struct CatchUnwind<F> {
    inner: F,
}

impl<F: Future + Unpin> Future for CatchUnwind<F> {
    type Output = std::thread::Result<F::Output>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let inner = &mut self.inner;
        match std::panic::catch_unwind(AssertUnwindSafe(|| Pin::new(inner).poll(cx))) {
            Ok(Poll::Ready(v)) => Poll::Ready(Ok(v)),
            Ok(Poll::Pending) => Poll::Pending,
            Err(payload) => Poll::Ready(Err(payload)),
        }
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

struct QueryOutcome {
    result: Option<Value>,
    detail: Detail,
    is_nil: bool,
}

fn nil_outcome() -> QueryOutcome {
    QueryOutcome {
        result: None,
        detail: Detail::default(),
        is_nil: true,
    }
}

/// Per-node query: pre-permission check, reference resolution, plugin
/// chain, backend call, in that order.
async fn query_node<B, G, R>(
    tree: &ExecutionTree,
    id: NodeId,
    ectx: &ExecCtx<'_, B, G, R>,
) -> Result<QueryOutcome>
where
    B: BackendDriver,
    G: GateEvaluator,
    R: RelationRecognizer,
{
    let property = tree.property(id).clone();
    let real = tree.real_id(id);
    let unit = tree.get(real).unit.clone();
    let appid = ectx.appid();

    let snapshot = ectx.metadata.load();
    let app_info = snapshot
        .app_info
        .get(&appid)
        .ok_or(Error::NotFindAppid { appid })?;

    let raw_query = if unit.query.is_empty() {
        None
    } else {
        Some(unit.query.as_str())
    };

    permission_check(
        app_info,
        &PermissionRequest {
            path: &property.path,
            appid,
            db_id: property.db_id,
            table_id: property.table_id,
            op: property.op,
            name: &property.name,
            is_recheck: false,
            raw_query,
        },
    )?;

    let where_ = match substitute_map(tree, id, ectx.relation, &unit.where_)? {
        Some(m) => m,
        None => return Ok(nil_outcome()),
    };
    let having = match substitute_map(tree, id, ectx.relation, &unit.having)? {
        Some(m) => m,
        None => return Ok(nil_outcome()),
    };
    let data = match substitute_map(tree, id, ectx.relation, &unit.data)? {
        Some(m) => m,
        None => return Ok(nil_outcome()),
    };
    let mut datas = Vec::with_capacity(unit.datas.len());
    for d in &unit.datas {
        match substitute_map(tree, id, ectx.relation, d)? {
            Some(m) => datas.push(m),
            None => return Ok(nil_outcome()),
        }
    }
    let args = match substitute_args(tree, id, &unit.args, &unit.field, &unit.data_type)? {
        Some(a) => a,
        None => return Ok(nil_outcome()),
    };
    let key = if arg_has_referer(&unit.key) {
        match resolve_referer(tree, id, referer_param(&unit.key))? {
            Resolved::Value(v) => Some(v),
            Resolved::Nil => return Ok(nil_outcome()),
        }
    } else if unit.key.is_empty() {
        None
    } else {
        Some(Value::Str(unit.key.clone()))
    };

    let chain = snapshot
        .plugins
        .get(&property.table_id)
        .cloned()
        .unwrap_or_else(|| Arc::new(PluginChain::default()));

    let mut req_value = request_value(&property, &where_, &having, &data, &datas, &key, &args);
    let mut rsp_value = Value::Null;
    let mut extend = unit.extend.clone();

    let plugin_ctx = PluginContext {
        request_id: ectx.header.request_id.clone(),
        trace_id: ectx.header.trace_id.clone(),
        appid,
        deadline: ectx.deadline,
    };
    let gray_scale_key = ectx.gray_scale_key();
    let gate_ctx_for = |extend: &Map| GateContext {
        request_source: ectx.header.caller.as_str(),
        op_type: property.op.as_str(),
        appid,
        gray_scale_key,
        extend: extend.clone(),
    };

    let short_circuit = run_list(
        &chain.pre,
        ectx.gate,
        &gate_ctx_for(&extend),
        &plugin_ctx,
        &mut req_value,
        &mut rsp_value,
        &mut extend,
    )
    .await?;

    if !short_circuit {
        recheck_permission_if_mutated(app_info, &property, &req_value, raw_query)?;

        let verify_rule = app_info
            .table_ops(property.table_id)
            .map(|t| t.verify_rule.as_str())
            .unwrap_or("");
        table_verify(&property.path, appid, &property.tables, verify_rule)?;

        let table_meta = snapshot.tables.get(&property.table_id);
        let address = match (&tree.get(id).address_override, table_meta) {
            (Some(over), Some(meta)) => over.merge_defaults(&meta.address),
            (Some(over), None) => over.clone(),
            (None, Some(meta)) => meta.address.clone(),
            (None, None) => {
                return Err(Error::NotFindName {
                    path: property.path.clone(),
                    name: property.name.clone(),
                })
            }
        };

        let backend_request = BackendRequest {
            op: property.op,
            table: property.tables.join(","),
            unit: unit.clone(),
            resolved_where: Some(Value::Object(where_)),
            resolved_having: Some(Value::Object(having)),
            resolved_data: Some(Value::Object(data)),
            resolved_datas: Some(Value::Array(datas.into_iter().map(Value::Object).collect())),
            resolved_key: key,
            resolved_args: args,
        };

        let trans_info = tree.get(id).trans_info.clone();
        let response = ectx
            .backend
            .call(&backend_request, &address, trans_info.as_ref())
            .await?;
        rsp_value = response_to_value(response);

        run_list(
            &chain.post,
            ectx.gate,
            &gate_ctx_for(&extend),
            &plugin_ctx,
            &mut req_value,
            &mut rsp_value,
            &mut extend,
        )
        .await?;
    }

    run_defer(
        &chain.defer,
        ectx.gate,
        &gate_ctx_for(&extend),
        &plugin_ctx,
        &mut req_value,
        &mut rsp_value,
        &mut extend,
    )
    .await;

    Ok(outcome_from_response(&rsp_value))
}

/// Re-checks permission with `is_recheck = true` if a pre-plugin changed
/// `req`'s `op`/`query` fields, since a plugin can widen what a unit asks
/// for beyond what was originally granted.
fn recheck_permission_if_mutated(
    app_info: &relaydb_admin::AppInfo,
    property: &crate::tree::Property,
    req_value: &Value,
    original_raw_query: Option<&str>,
) -> Result<()> {
    let Value::Object(m) = req_value else {
        return Ok(());
    };

    let mutated_op = match m.get("op") {
        Some(Value::Str(s)) if s.as_str() != property.op.as_str() => Some(s.parse::<Op>()?),
        _ => None,
    };
    let mutated_query = match m.get("query") {
        Some(Value::Str(s)) if Some(s.as_str()) != original_raw_query && !s.is_empty() => {
            Some(s.as_str())
        }
        _ => None,
    };

    if mutated_op.is_none() && mutated_query.is_none() {
        return Ok(());
    }

    permission_check(
        app_info,
        &PermissionRequest {
            path: &property.path,
            appid: app_info.appid,
            db_id: property.db_id,
            table_id: property.table_id,
            op: mutated_op.unwrap_or(property.op),
            name: &property.name,
            is_recheck: true,
            raw_query: mutated_query.or(original_raw_query),
        },
    )
}

fn request_value(
    property: &crate::tree::Property,
    where_: &Map,
    having: &Map,
    data: &Map,
    datas: &[Map],
    key: &Option<Value>,
    args: &[Value],
) -> Value {
    let mut m = Map::new();
    m.insert("op".to_string(), Value::Str(property.op.as_str().to_string()));
    m.insert("table".to_string(), Value::Str(property.tables.join(",")));
    m.insert("where".to_string(), Value::Object(where_.clone()));
    m.insert("having".to_string(), Value::Object(having.clone()));
    m.insert("data".to_string(), Value::Object(data.clone()));
    m.insert(
        "datas".to_string(),
        Value::Array(datas.iter().cloned().map(Value::Object).collect()),
    );
    if let Some(k) = key {
        m.insert("key".to_string(), k.clone());
    }
    m.insert("args".to_string(), Value::Array(args.to_vec()));
    Value::Object(m)
}

fn response_to_value(response: BackendResponse) -> Value {
    let mut m = Map::new();
    m.insert(
        "result".to_string(),
        response.result.unwrap_or(Value::Null),
    );
    m.insert("is_nil".to_string(), Value::Bool(response.is_nil));
    if response.detail.is_present() {
        let mut d = Map::new();
        d.insert("size".to_string(), Value::Int(response.detail.size as i64));
        if let Some(scroll) = response.detail.scroll {
            d.insert("scroll".to_string(), scroll);
        }
        if let Some(total) = response.detail.total {
            d.insert("total".to_string(), Value::UInt(total));
        }
        for (k, v) in response.detail.extras {
            d.insert(k, v);
        }
        m.insert("detail".to_string(), Value::Object(d));
    }
    Value::Object(m)
}

fn outcome_from_response(rsp: &Value) -> QueryOutcome {
    let Value::Object(m) = rsp else {
        return QueryOutcome {
            result: None,
            detail: Detail::default(),
            is_nil: false,
        };
    };

    let is_nil = matches!(m.get("is_nil"), Some(Value::Bool(true)));
    let result = m.get("result").cloned();
    let detail = match m.get("detail") {
        Some(Value::Object(d)) => Detail {
            size: match d.get("size") {
                Some(Value::Int(i)) => *i as u64,
                _ => 0,
            },
            scroll: d.get("scroll").cloned(),
            total: match d.get("total") {
                Some(Value::UInt(u)) => Some(*u),
                Some(Value::Int(i)) => Some(*i as u64),
                _ => None,
            },
            extras: d
                .iter()
                .filter(|(k, _)| k.as_str() != "size" && k.as_str() != "scroll" && k.as_str() != "total")
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        },
        _ => Detail::default(),
    };

    QueryOutcome {
        result,
        detail,
        is_nil,
    }
}
