// A recording, optionally-failing `TxClient`, shared so engine-level tests
// can assert commit/rollback counts without redefining it per crate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use relaydb_base::{Error, Result};
use relaydb_txn::TxClient;

#[derive(Default)]
pub struct TxClientCalls {
    pub commits: AtomicUsize,
    pub rollbacks: AtomicUsize,
    pub closes: AtomicUsize,
}

pub struct FakeTxClient {
    calls: Arc<TxClientCalls>,
    fail_commit: bool,
    fail_rollback: bool,
}

impl FakeTxClient {
    pub fn new(calls: Arc<TxClientCalls>) -> FakeTxClient {
        FakeTxClient {
            calls,
            fail_commit: false,
            fail_rollback: false,
        }
    }

    pub fn failing_commit(calls: Arc<TxClientCalls>) -> FakeTxClient {
        FakeTxClient {
            calls,
            fail_commit: true,
            fail_rollback: false,
        }
    }

    pub fn failing_rollback(calls: Arc<TxClientCalls>) -> FakeTxClient {
        FakeTxClient {
            calls,
            fail_commit: false,
            fail_rollback: true,
        }
    }
}

#[async_trait]
impl TxClient for FakeTxClient {
    async fn commit(&self) -> Result<()> {
        self.calls.commits.fetch_add(1, Ordering::SeqCst);
        if self.fail_commit {
            return Err(Error::other("fake commit failure"));
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.calls.rollbacks.fetch_add(1, Ordering::SeqCst);
        if self.fail_rollback {
            return Err(Error::other("fake rollback failure"));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
