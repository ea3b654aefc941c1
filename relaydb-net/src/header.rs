// Request header and query-mode types a decoded-off-the-wire request
// carries. Frame parsing itself is out of scope; only the resulting data
// types live here.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum QueryMode {
    Single,
    Parallel,
    Compound,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestHeader {
    pub request_id: String,
    pub trace_id: String,
    pub timestamp: i64,
    pub timeout_ms: i64,
    pub caller: String,
    pub appid: u64,
    pub ip: String,
    pub auth_rand: String,
    pub query_mode: QueryMode,
}
