// Backend address/identity types. The concrete backend drivers are an
// external collaborator; this crate only carries the identity the
// transaction coordinator keys TxClients on: a stable backend descriptor
// (backend type + address + database name), not a driver pointer identity.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    Mysql,
    Postgres,
    ClickHouse,
    Redis,
    Elasticsearch,
    Other(String),
}

/// A resolved, connectable backend address, as carried on table metadata
/// and as a plugin may redirect it mid-request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackendAddress {
    pub kind: BackendKind,
    pub version: String,
    pub network: String,
    pub target: String,
    pub database: String,
    #[serde(with = "duration_ms")]
    pub read_timeout: Duration,
    #[serde(with = "duration_ms")]
    pub write_timeout: Duration,
    #[serde(with = "duration_ms")]
    pub warn_timeout: Duration,
}

impl BackendAddress {
    /// A plugin-supplied override address inherits any zero timeout from
    /// the address it is replacing.
    pub fn merge_defaults(&self, original: &BackendAddress) -> BackendAddress {
        let mut merged = self.clone();
        if merged.write_timeout.is_zero() {
            merged.write_timeout = original.write_timeout;
        }
        if merged.read_timeout.is_zero() {
            merged.read_timeout = original.read_timeout;
        }
        if merged.warn_timeout.is_zero() {
            merged.warn_timeout = original.warn_timeout;
        }
        merged
    }

    pub fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor {
            kind: self.kind.clone(),
            address: format!("{}:{}", self.network, self.target),
            database: self.database.clone(),
        }
    }
}

/// Stable identity a `TxClient` is indexed by in `TransInfo`. Two units
/// touching the same backend+database inside one
/// transaction must resolve to the same descriptor so they share a client.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BackendDescriptor {
    pub kind: BackendKind,
    pub address: String,
    pub database: String,
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(d)?;
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn addr(write_ms: u64) -> BackendAddress {
        BackendAddress {
            kind: BackendKind::Mysql,
            version: "8.0".into(),
            network: "tcp".into(),
            target: "127.0.0.1:3306".into(),
            database: "app".into(),
            read_timeout: Duration::from_millis(200),
            write_timeout: Duration::from_millis(write_ms),
            warn_timeout: Duration::from_millis(100),
        }
    }

    #[test]
    fn zero_timeout_inherits_from_original() {
        let original = addr(500);
        let plugin_override = addr(0);
        let merged = plugin_override.merge_defaults(&original);
        assert_eq!(merged.write_timeout, Duration::from_millis(500));
    }

    #[test]
    fn nonzero_timeout_is_kept() {
        let original = addr(500);
        let plugin_override = addr(50);
        let merged = plugin_override.merge_defaults(&original);
        assert_eq!(merged.write_timeout, Duration::from_millis(50));
    }

    #[test]
    fn descriptor_identifies_same_backend() {
        let a = addr(500).descriptor();
        let b = addr(0).descriptor();
        assert_eq!(a, b);
    }
}
