// Plugin contract: a handler invoked at a node's pre/post/defer point,
// able to mutate the in-flight request/response and short-circuit the
// rest of the chain.

use async_trait::async_trait;
use relaydb_base::{Map, Result, Value};
use relaydb_net::Deadline;

/// Ambient context handed to every plugin invocation. Async invocations get
/// their own `Deadline`, independent of the request's.
pub struct PluginContext {
    pub request_id: String,
    pub trace_id: String,
    pub appid: u64,
    pub deadline: Deadline,
}

#[async_trait]
pub trait Plugin: Send + Sync {
    /// Returns `Ok(true)` to short-circuit: the caller skips downstream
    /// pre-plugins, the backend call, and post-plugins, returning the
    /// current response as-is.
    async fn handle(
        &self,
        ctx: &PluginContext,
        req: &mut Value,
        rsp: &mut Value,
        extend: &mut Map,
        config: &Map,
    ) -> Result<bool>;
}

pub fn request_header<'a>(extend: &'a Map) -> Option<&'a Value> {
    extend.get("request_header")
}
