// A recording `Plugin` whose behavior (short-circuit / mutate / fail /
// sleep) is configured per-instance, used by relaydb-engine's and relaydb's
// plugin-dispatch tests. Grounded in `plugin/plugin.go`'s `Plugin` interface
// (mirrored as `relaydb_eval::Plugin`).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relaydb_base::{Error, Map, Result, Value};
use relaydb_eval::{Plugin, PluginContext};

#[derive(Default)]
pub struct PluginCall {
    pub invocations: AtomicUsize,
}

/// Configurable fake plugin: set the fields before wiring it into a chain,
/// then inspect `calls` afterward.
pub struct FakePlugin {
    pub calls: Arc<PluginCall>,
    pub short_circuit: bool,
    pub fail: bool,
    pub sleep: Option<Duration>,
    pub set_extend: Option<(String, Value)>,
}

impl FakePlugin {
    pub fn new(calls: Arc<PluginCall>) -> FakePlugin {
        FakePlugin {
            calls,
            short_circuit: false,
            fail: false,
            sleep: None,
            set_extend: None,
        }
    }
}

#[async_trait]
impl Plugin for FakePlugin {
    async fn handle(
        &self,
        _ctx: &PluginContext,
        _req: &mut Value,
        _rsp: &mut Value,
        extend: &mut Map,
        _config: &Map,
    ) -> Result<bool> {
        self.calls.invocations.fetch_add(1, Ordering::SeqCst);

        if let Some(sleep) = self.sleep {
            tokio::time::sleep(sleep).await;
        }

        if self.fail {
            return Err(Error::other("fake plugin failure"));
        }

        if let Some((key, value)) = &self.set_extend {
            extend.insert(key.clone(), value.clone());
        }

        Ok(self.short_circuit)
    }
}
