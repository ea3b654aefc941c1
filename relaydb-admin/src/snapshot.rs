// Process-global metadata, atomically swapped on refresh: the metadata
// tables are process-global, and a background synchronization task
// periodically refreshes them from the source of truth. `arc-swap` gives
// every reader a lock-free, always-consistent snapshot rather than holding
// a `RwLock` read guard across a whole request.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::metadata::{AppInfo, DbMeta, TableMeta};
use relaydb_eval::PluginChain;

#[derive(Default)]
pub struct Snapshot {
    pub dbs: HashMap<i64, DbMeta>,
    pub tables: HashMap<i64, TableMeta>,
    pub app_info: HashMap<u64, AppInfo>,
    /// Per-table ordered pre/post/defer chain, keyed by table id.
    pub plugins: HashMap<i64, Arc<PluginChain>>,
}

pub struct MetadataStore {
    current: ArcSwap<Snapshot>,
}

impl Default for MetadataStore {
    fn default() -> Self {
        MetadataStore {
            current: ArcSwap::from_pointee(Snapshot::default()),
        }
    }
}

impl MetadataStore {
    pub fn new() -> MetadataStore {
        MetadataStore::default()
    }

    pub fn load(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Install a freshly synchronized snapshot, atomically visible to every
    /// in-flight request that loads it from here on.
    pub fn swap(&self, snapshot: Snapshot) {
        self.current.store(Arc::new(snapshot));
    }

    pub fn find_table(&self, name: &str, namespace: Option<&str>) -> Option<TableMeta> {
        let snapshot = self.load();
        let mut matches = snapshot
            .tables
            .values()
            .filter(|t| t.name == name && t.namespace.as_deref() == namespace);
        matches.next().cloned()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use relaydb_net::BackendKind;
    use std::time::Duration;

    fn test_address() -> relaydb_net::BackendAddress {
        relaydb_net::BackendAddress {
            kind: BackendKind::Mysql,
            version: "8.0".to_string(),
            network: "tcp".to_string(),
            target: "127.0.0.1:3306".to_string(),
            database: "app".to_string(),
            read_timeout: Duration::from_millis(200),
            write_timeout: Duration::from_millis(200),
            warn_timeout: Duration::from_millis(100),
        }
    }

    #[test]
    fn swap_is_visible_to_new_loads() {
        let store = MetadataStore::new();
        assert!(store.load().tables.is_empty());

        let mut snapshot = Snapshot::default();
        snapshot.tables.insert(
            1,
            TableMeta {
                id: 1,
                db_id: 1,
                name: "users".to_string(),
                namespace: None,
                address: test_address(),
            },
        );
        store.swap(snapshot);

        assert_eq!(store.load().tables.len(), 1);
        assert!(store.find_table("users", None).is_some());
    }
}
