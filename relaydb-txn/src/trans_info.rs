// TransInfo: shared per-transaction bookkeeping. All
// sibling nodes within one `trans` share the same TransInfo; nested
// sub-query instances of a transactional node share their parent's
// TransInfo, unless that sub-tree is itself a per-row fan-out from a
// transactional parent, in which case the executor allocates a fresh one
// per row (that allocation decision lives in relaydb-engine, which holds
// the tree; this crate only holds the bookkeeping once allocated).

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use relaydb_base::{Error, Result};
use relaydb_net::BackendDescriptor;

use crate::client::TxClient;

#[derive(Default)]
pub struct TransInfo {
    /// Monotonic: once true, all further nodes in the group are skipped.
    rollback: AtomicBool,
    /// Ordered set of backends that enrolled, insertion order preserved so
    /// finalize observes them in the order they first participated.
    dbs: Mutex<Vec<BackendDescriptor>>,
    clients: Mutex<HashMap<BackendDescriptor, Arc<dyn TxClient>>>,
}

impl TransInfo {
    pub fn new() -> Arc<TransInfo> {
        Arc::new(TransInfo::default())
    }

    pub fn is_rollback(&self) -> bool {
        self.rollback.load(Ordering::SeqCst)
    }

    pub fn set_rollback(&self) {
        self.rollback.store(true, Ordering::SeqCst);
    }

    /// The backends enrolled so far, in enrollment order.
    pub fn enrolled(&self) -> Vec<BackendDescriptor> {
        self.dbs.lock().clone()
    }

    /// Lazily open a transaction on `descriptor` via `open`, reusing the
    /// existing client for every subsequent node in this TransInfo that
    /// targets the same backend.
    pub async fn get_or_open_tx_client<F, Fut>(
        &self,
        descriptor: BackendDescriptor,
        open: F,
    ) -> Result<Arc<dyn TxClient>>
    where
        F: FnOnce(BackendDescriptor) -> Fut,
        Fut: Future<Output = Result<Arc<dyn TxClient>>>,
    {
        if let Some(existing) = self.clients.lock().get(&descriptor) {
            return Ok(existing.clone());
        }

        let client = open(descriptor.clone()).await?;

        let mut clients = self.clients.lock();
        // Another concurrent caller may have opened one first; keep
        // whichever arrived first so there is exactly one live client per
        // backend for the life of this TransInfo.
        let winner = clients.entry(descriptor.clone()).or_insert(client).clone();
        drop(clients);

        let mut dbs = self.dbs.lock();
        if !dbs.contains(&descriptor) {
            dbs.push(descriptor);
        }

        Ok(winner)
    }

    /// Commit (or, if `Rollback` was set, roll back) every enrolled
    /// TxClient, folding any finalize error into `head_error` while
    /// preserving the earlier error's message. Returns the (possibly
    /// finalize-wrapped) error to attach to the transaction head node, or
    /// `Ok(())` if nothing went wrong.
    pub async fn finalize(&self, head_error: Option<Error>) -> std::result::Result<(), Error> {
        let rollback = self.is_rollback();
        let dbs = self.enrolled();
        let clients = self.clients.lock().clone();

        let mut error = head_error;

        for descriptor in &dbs {
            let Some(client) = clients.get(descriptor) else {
                continue;
            };

            let result = if rollback {
                client.rollback().await
            } else {
                client.commit().await
            };

            if let Err(finalize_err) = result {
                error = Some(match error {
                    Some(prev) => prev.with_finalize_error(finalize_err),
                    None => Error::other(finalize_err.to_string()),
                });
            }
        }

        self.reset();

        match error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Release the TxClient table once the transaction's sibling chain has
    /// fully finished.
    pub fn reset(&self) {
        self.clients.lock().clear();
        self.dbs.lock().clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use relaydb_net::BackendKind;
    use std::sync::atomic::{AtomicUsize, Ordering as O};

    struct FakeClient {
        commits: Arc<AtomicUsize>,
        rollbacks: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl TxClient for FakeClient {
        async fn commit(&self) -> Result<()> {
            self.commits.fetch_add(1, O::SeqCst);
            Ok(())
        }
        async fn rollback(&self) -> Result<()> {
            self.rollbacks.fetch_add(1, O::SeqCst);
            Ok(())
        }
        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn descriptor(name: &str) -> BackendDescriptor {
        BackendDescriptor {
            kind: BackendKind::Mysql,
            address: name.to_string(),
            database: "app".to_string(),
        }
    }

    #[tokio::test]
    async fn same_backend_reuses_client() {
        let info = TransInfo::new();
        let opens = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let opens = opens.clone();
            info.get_or_open_tx_client(descriptor("a"), move |_| {
                opens.fetch_add(1, O::SeqCst);
                async move {
                    Ok(Arc::new(FakeClient {
                        commits: Arc::new(AtomicUsize::new(0)),
                        rollbacks: Arc::new(AtomicUsize::new(0)),
                    }) as Arc<dyn TxClient>)
                }
            })
            .await
            .unwrap();
        }

        assert_eq!(opens.load(O::SeqCst), 1);
    }

    #[tokio::test]
    async fn finalize_commits_when_not_rolled_back() {
        let info = TransInfo::new();
        let commits = Arc::new(AtomicUsize::new(0));
        let rollbacks = Arc::new(AtomicUsize::new(0));
        let client = Arc::new(FakeClient {
            commits: commits.clone(),
            rollbacks: rollbacks.clone(),
        });

        info.get_or_open_tx_client(descriptor("a"), |_| async move {
            Ok(client as Arc<dyn TxClient>)
        })
        .await
        .unwrap();

        info.finalize(None).await.unwrap();
        assert_eq!(commits.load(O::SeqCst), 1);
        assert_eq!(rollbacks.load(O::SeqCst), 0);
        assert!(info.enrolled().is_empty());
    }

    #[tokio::test]
    async fn finalize_rolls_back_every_enrolled_backend() {
        let info = TransInfo::new();
        let commits = Arc::new(AtomicUsize::new(0));
        let rollbacks = Arc::new(AtomicUsize::new(0));

        for name in ["a", "b"] {
            let client = Arc::new(FakeClient {
                commits: commits.clone(),
                rollbacks: rollbacks.clone(),
            });
            info.get_or_open_tx_client(descriptor(name), |_| async move {
                Ok(client as Arc<dyn TxClient>)
            })
            .await
            .unwrap();
        }

        info.set_rollback();
        info.finalize(Some(Error::other("B failed"))).await.unwrap_err();
        assert_eq!(rollbacks.load(O::SeqCst), 2);
        assert_eq!(commits.load(O::SeqCst), 0);
    }
}
