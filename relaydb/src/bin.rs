// Binary entry point: loads config, initializes structured logging, and
// starts the process-global resources a `Server` needs. Wiring a concrete
// `BackendDriver` against a real backend is an external collaborator, so
// this binary starts with a driver stub that errors on every call rather
// than pretending to talk to a database.

use std::sync::Arc;

use async_trait::async_trait;
use relaydb_admin::ServerConfig;
use relaydb_base::{Error, Result};
use relaydb_engine::{BackendDriver, BackendRequest, BackendResponse, DefaultRelationRecognizer};
use relaydb_eval::DefaultGateEvaluator;
use relaydb_net::BackendAddress;
use relaydb_txn::{TransInfo, TxClient};

struct UnconfiguredBackend;

#[async_trait]
impl BackendDriver for UnconfiguredBackend {
    async fn call(
        &self,
        _request: &BackendRequest,
        _address: &BackendAddress,
        _trans: Option<&Arc<TransInfo>>,
    ) -> Result<BackendResponse> {
        Err(Error::other(
            "no backend driver configured: wire a concrete BackendDriver before serving traffic",
        ))
    }

    async fn open_tx(&self, _address: &BackendAddress) -> Result<Arc<dyn TxClient>> {
        Err(Error::other("no backend driver configured"))
    }
}

fn load_config() -> ServerConfig {
    let path = std::env::args().nth(1);
    match path {
        Some(path) => match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(target: "relaydb", path, error = %e, "failed to parse config, using defaults");
                    ServerConfig::default()
                }
            },
            Err(e) => {
                tracing::warn!(target: "relaydb", path, error = %e, "failed to read config, using defaults");
                ServerConfig::default()
            }
        },
        None => ServerConfig::default(),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = load_config();
    tracing::info!(target: "relaydb", listen_addr = %config.listen_addr, "starting relaydb");

    let server = relaydb::Server::new(
        config,
        UnconfiguredBackend,
        DefaultGateEvaluator,
        DefaultRelationRecognizer,
    );

    let dedup = Arc::new(server.dedup);
    let _clear_loop = relaydb_admin::spawn_clear_loop(dedup);

    tracing::info!(target: "relaydb", "ready");
    std::future::pending::<()>().await;
}
