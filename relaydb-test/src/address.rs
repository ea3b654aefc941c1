use std::time::Duration;

use relaydb_net::{BackendAddress, BackendDescriptor, BackendKind};

/// A connectable-looking MySQL address with non-zero timeouts, for tests
/// that need a `BackendAddress` but don't care about its specific values.
pub fn test_address() -> BackendAddress {
    BackendAddress {
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

pub fn test_descriptor(name: &str) -> BackendDescriptor {
    BackendDescriptor {
        kind: BackendKind::Mysql,
        address: name.to_string(),
        database: "app".to_string(),
    }
}
