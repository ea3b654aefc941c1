// Server-wide configuration, refreshed the same way as the metadata
// snapshot.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: String,
    #[serde(with = "duration_ms")]
    pub default_timeout: Duration,
    #[serde(with = "duration_ms")]
    pub metadata_sync_interval: Duration,
    pub enforce_signature: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_addr: "0.0.0.0:8080".to_string(),
            default_timeout: Duration::from_secs(5),
            metadata_sync_interval: Duration::from_secs(2),
            enforce_signature: false,
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
