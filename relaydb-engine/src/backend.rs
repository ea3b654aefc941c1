// The external collaborator that actually talks to MySQL/Postgres/etc.
// The engine only needs the contract: given a resolved request, address,
// and optional transaction context, produce a result.

use async_trait::async_trait;
use std::sync::Arc;

use relaydb_base::{Result, Value};
use relaydb_lang::{Op, Unit};
use relaydb_net::BackendAddress;
use relaydb_txn::TransInfo;

use crate::tree::Detail;

/// A unit with its reference-resolved fields substituted in: the source
/// `Unit` plus a resolved copy of its `where`/`having`/`data`/`datas`/
/// `key`/`args` fields.
pub struct BackendRequest {
    pub op: Op,
    pub table: String,
    pub unit: Arc<Unit>,
    pub resolved_where: Option<Value>,
    pub resolved_having: Option<Value>,
    pub resolved_data: Option<Value>,
    pub resolved_datas: Option<Value>,
    pub resolved_key: Option<Value>,
    pub resolved_args: Vec<Value>,
}

pub struct BackendResponse {
    pub result: Option<Value>,
    pub detail: Detail,
    pub is_nil: bool,
}

#[async_trait]
pub trait BackendDriver: Send + Sync {
    async fn call(
        &self,
        request: &BackendRequest,
        address: &BackendAddress,
        trans: Option<&Arc<TransInfo>>,
    ) -> Result<BackendResponse>;

    /// Open a transactional session on `address`, to be enrolled in a
    /// `TransInfo` via `TransInfo::get_or_open_tx_client`.
    async fn open_tx(&self, address: &BackendAddress) -> Result<Arc<dyn relaydb_txn::TxClient>>;
}
