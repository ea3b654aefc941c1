// Shared test fixtures: a fake `TxClient`, a fake `Plugin`, and small
// builders for the ambient net types every other crate's tests construct by
// hand otherwise, collected into one shared crate so `relaydb-engine` and
// `relaydb` don't each reinvent it.

mod address;
mod plugin;
mod tx_client;

pub use address::{test_address, test_descriptor};
pub use plugin::{FakePlugin, PluginCall};
pub use tx_client::{FakeTxClient, TxClientCalls};

use relaydb_net::{QueryMode, RequestHeader};

/// A `RequestHeader` with arbitrary-but-fixed fields, for tests that don't
/// care about the specific values.
pub fn test_header(appid: u64) -> RequestHeader {
    RequestHeader {
        request_id: "req-1".to_string(),
        trace_id: "trace-1".to_string(),
        timestamp: 0,
        timeout_ms: 1000,
        caller: "test".to_string(),
        appid,
        ip: "127.0.0.1".to_string(),
        auth_rand: "0".to_string(),
        query_mode: QueryMode::Single,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn header_fixture_carries_appid() {
        let h = test_header(42);
        assert_eq!(h.appid, 42);
    }

    #[tokio::test]
    async fn fake_tx_client_records_commit() {
        use relaydb_txn::TxClient;

        let calls = Arc::new(TxClientCalls::default());
        let client = FakeTxClient::new(calls.clone());
        client.commit().await.unwrap();
        assert_eq!(calls.commits.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fake_plugin_records_invocation() {
        use relaydb_eval::Plugin;

        let calls = Arc::new(PluginCall::default());
        let plugin = FakePlugin::new(calls.clone());
        let ctx = relaydb_eval::PluginContext {
            request_id: "r".to_string(),
            trace_id: "t".to_string(),
            appid: 1,
            deadline: relaydb_net::Deadline::after(std::time::Duration::from_secs(1)),
        };
        let mut req = relaydb_base::Value::Null;
        let mut rsp = relaydb_base::Value::Null;
        let mut extend = relaydb_base::Map::new();
        let config = relaydb_base::Map::new();
        let short_circuit = plugin
            .handle(&ctx, &mut req, &mut rsp, &mut extend, &config)
            .await
            .unwrap();
        assert!(!short_circuit);
        assert_eq!(calls.invocations.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
