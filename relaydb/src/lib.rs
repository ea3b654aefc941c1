// The top-level facade: a `Server` collects the process-global resources
// (metadata snapshot, config, dedup guard) and the pluggable collaborators
// (backend driver, gate evaluator, relation recognizer) a request needs,
// and turns an already-decoded unit list plus header into an assembled
// response. Wire framing and HTTP decoding remain out of scope; this is
// the contract a front end calls into once it has done that decoding.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use relaydb_admin::{DedupGuard, Fingerprint, MetadataStore, ServerConfig, Snapshot};
use relaydb_base::{Error, Result, Value};
use relaydb_engine::{BackendDriver, ExecCtx, RelationRecognizer};
use relaydb_eval::GateEvaluator;
use relaydb_lang::Unit;
use relaydb_net::{Deadline, RequestHeader};

/// Everything a running replica needs to answer requests, generalized
/// over the engine's pluggable collaborators.
pub struct Server<B, G, R> {
    pub config: ServerConfig,
    pub metadata: MetadataStore,
    pub dedup: DedupGuard,
    backend: B,
    gate: G,
    relation: R,
}

impl<B, G, R> Server<B, G, R>
where
    B: BackendDriver,
    G: GateEvaluator,
    R: RelationRecognizer,
{
    pub fn new(config: ServerConfig, backend: B, gate: G, relation: R) -> Server<B, G, R> {
        Server {
            config,
            metadata: MetadataStore::new(),
            dedup: DedupGuard::new(),
            backend,
            gate,
            relation,
        }
    }

    /// Runs one request end to end: admits it past the dedup guard, builds
    /// the execution tree, walks it, and assembles the response.
    pub async fn handle_request(&self, units: Vec<Unit>, header: &RequestHeader) -> Result<Value> {
        if !self.dedup.admit(fingerprint(header)) {
            return Err(Error::DuplicateRequest);
        }

        let deadline = Deadline::after(request_timeout(&self.config, header));
        let ectx = ExecCtx {
            metadata: &self.metadata,
            backend: &self.backend,
            gate: &self.gate,
            relation: &self.relation,
            header,
            deadline,
        };

        relaydb_engine::run_request(units, header, &ectx).await
    }

    /// Installs a freshly synchronized metadata snapshot. The background
    /// synchronization task itself, which would poll the source of truth,
    /// is an external collaborator.
    pub fn refresh_metadata(&self, snapshot: Snapshot) {
        self.metadata.swap(snapshot);
    }
}

fn request_timeout(config: &ServerConfig, header: &RequestHeader) -> Duration {
    if header.timeout_ms <= 0 {
        config.default_timeout
    } else {
        Duration::from_millis(header.timeout_ms as u64)
    }
}

/// Hashes `auth_rand` down to the `u64` a `Fingerprint` keys on; the wire
/// value is a string, the dedup set only needs it distinct.
fn fingerprint(header: &RequestHeader) -> Fingerprint {
    let mut hasher = DefaultHasher::new();
    header.auth_rand.hash(&mut hasher);
    Fingerprint {
        timestamp: header.timestamp,
        ip: header.ip.clone(),
        auth_rand: hasher.finish(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use relaydb_eval::DefaultGateEvaluator;
    use relaydb_engine::{BackendRequest, BackendResponse, DefaultRelationRecognizer};
    use relaydb_net::BackendAddress;
    use relaydb_txn::{TransInfo, TxClient};
    use std::sync::Arc;

    struct NilBackend;

    #[async_trait::async_trait]
    impl BackendDriver for NilBackend {
        async fn call(
            &self,
            _request: &BackendRequest,
            _address: &BackendAddress,
            _trans: Option<&Arc<TransInfo>>,
        ) -> Result<BackendResponse> {
            Ok(BackendResponse {
                result: None,
                detail: Default::default(),
                is_nil: true,
            })
        }

        async fn open_tx(&self, _address: &BackendAddress) -> Result<Arc<dyn TxClient>> {
            Err(Error::other("NilBackend does not support transactions"))
        }
    }

    fn server() -> Server<NilBackend, DefaultGateEvaluator, DefaultRelationRecognizer> {
        Server::new(
            ServerConfig::default(),
            NilBackend,
            DefaultGateEvaluator,
            DefaultRelationRecognizer,
        )
    }

    #[tokio::test]
    async fn duplicate_request_is_rejected() {
        let server = server();
        let h = relaydb_test::test_header(1);
        let units = vec![Unit {
            name: "users".to_string(),
            ..Default::default()
        }];

        let first = server.handle_request(units.clone(), &h).await;
        assert!(first.is_err());
        assert!(!matches!(first.unwrap_err(), Error::DuplicateRequest));

        let second = server.handle_request(units, &h).await;
        assert!(matches!(second.unwrap_err(), Error::DuplicateRequest));
    }

    #[test]
    fn request_timeout_falls_back_to_config_default() {
        let config = ServerConfig::default();
        let mut h = relaydb_test::test_header(1);
        h.timeout_ms = 0;
        assert_eq!(request_timeout(&config, &h), config.default_timeout);
    }
}
