// TxClient: an open transactional session on a single backend. The
// concrete backend driver is an external collaborator; only the contract
// is specified here.

use async_trait::async_trait;
use relaydb_base::Result;

#[async_trait]
pub trait TxClient: Send + Sync {
    async fn commit(&self) -> Result<()>;
    async fn rollback(&self) -> Result<()>;
    async fn close(&self) -> Result<()>;
}
