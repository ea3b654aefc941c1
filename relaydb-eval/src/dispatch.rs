// Plugin chain execution order: pre list (short-circuit aware) -> backend
// call -> post list (short-circuit aware) -> defer list (unconditional,
// result-discarding).

use relaydb_base::{Error, Map, Result, Value};

use crate::chain::ResolvedPluginEntry;
use crate::gate::{GateContext, GateEvaluator};
use crate::plugin::PluginContext;

/// Outcome of running a pre/post list: `true` means short-circuit.
pub async fn run_list<G: GateEvaluator>(
    entries: &[ResolvedPluginEntry],
    gate: &G,
    gate_ctx: &GateContext<'_>,
    ctx: &PluginContext,
    req: &mut Value,
    rsp: &mut Value,
    extend: &mut Map,
) -> Result<bool> {
    for entry in entries {
        if !gate.should_run(&entry.schedule, gate_ctx) {
            continue;
        }

        if entry.schedule.r#async {
            spawn_async(entry, ctx, req, rsp, extend);
            continue;
        }

        match invoke_guarded(entry, ctx, req, rsp, extend).await {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(e) if entry.schedule.skip_error => {
                tracing::warn!(target: "relaydb", plugin_id = entry.id, error = %e, "plugin error skipped");
            }
            Err(e) => return Err(e),
        }
    }

    Ok(false)
}

/// Defer plugins always run, in order, and never influence the node's
/// response; failures are logged only.
pub async fn run_defer<G: GateEvaluator>(
    entries: &[ResolvedPluginEntry],
    gate: &G,
    gate_ctx: &GateContext<'_>,
    ctx: &PluginContext,
    req: &mut Value,
    rsp: &mut Value,
    extend: &mut Map,
) {
    for entry in entries {
        if !gate.should_run(&entry.schedule, gate_ctx) {
            continue;
        }

        if entry.schedule.r#async {
            spawn_async(entry, ctx, req, rsp, extend);
            continue;
        }

        if let Err(e) = invoke_guarded(entry, ctx, req, rsp, extend).await {
            tracing::warn!(target: "relaydb", plugin_id = entry.id, error = %e, "defer plugin error");
        }
    }
}

/// Runs one plugin inside its own task so a panic surfaces as a `JoinError`
/// rather than taking down the node, without needing a dedicated
/// catch-unwind dependency.
async fn invoke_guarded(
    entry: &ResolvedPluginEntry,
    ctx: &PluginContext,
    req: &mut Value,
    rsp: &mut Value,
    extend: &mut Map,
) -> Result<bool> {
    let plugin = entry.plugin.clone();
    let config = entry.config.clone();
    let mut req_copy = req.clone();
    let mut rsp_copy = rsp.clone();
    let mut extend_copy = extend.clone();
    let ctx = PluginContext {
        request_id: ctx.request_id.clone(),
        trace_id: ctx.trace_id.clone(),
        appid: ctx.appid,
        deadline: ctx.deadline,
    };

    let result = tokio::spawn(async move {
        let r = plugin
            .handle(&ctx, &mut req_copy, &mut rsp_copy, &mut extend_copy, &config)
            .await;
        (r, req_copy, rsp_copy, extend_copy)
    })
    .await;

    match result {
        Ok((Ok(short_circuit), new_req, new_rsp, new_extend)) => {
            *req = new_req;
            *rsp = new_rsp;
            *extend = new_extend;
            Ok(short_circuit)
        }
        Ok((Err(e), ..)) => Err(e),
        Err(join_err) if join_err.is_panic() => {
            Err(Error::Panic(format!("plugin {} panicked", entry.id)))
        }
        Err(join_err) => Err(Error::PluginExec(join_err.to_string())),
    }
}

/// Fire-and-forget dispatch under an independent deadline. Deep-copies
/// request/response/extend so the async task shares no mutable state with
/// the synchronous path.
fn spawn_async(
    entry: &ResolvedPluginEntry,
    ctx: &PluginContext,
    req: &Value,
    rsp: &Value,
    extend: &Map,
) {
    let plugin = entry.plugin.clone();
    let config = entry.config.clone();
    let mut req_copy = req.clone();
    let mut rsp_copy = rsp.clone();
    let mut extend_copy = extend.clone();
    let timeout = entry.schedule.timeout();
    let async_ctx = PluginContext {
        request_id: ctx.request_id.clone(),
        trace_id: ctx.trace_id.clone(),
        appid: ctx.appid,
        deadline: relaydb_net::Deadline::derive_independent(timeout),
    };
    let plugin_id = entry.id;
    let skip_error = entry.schedule.skip_error;

    tokio::spawn(async move {
        let run = plugin.handle(&async_ctx, &mut req_copy, &mut rsp_copy, &mut extend_copy, &config);
        match tokio::time::timeout(timeout, run).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) if !skip_error => {
                tracing::error!(target: "relaydb", plugin_id, error = %e, "async plugin error");
            }
            Ok(Err(_)) => {}
            Err(_) => {
                tracing::warn!(target: "relaydb", plugin_id, "async plugin timed out");
            }
        }
    });
}
