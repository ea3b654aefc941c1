// Transaction coordination for multi-backend requests.
//
// A `trans` block in a request groups a set of sibling nodes that must
// commit or roll back together. Each node that touches a backend enrolls
// a `TxClient` into the group's `TransInfo`, keyed by `BackendDescriptor`
// rather than by driver identity, so two nodes addressing the same
// database share one open transaction. If any node in the group fails,
// `TransInfo::set_rollback` is called and every enrolled backend is rolled
// back instead of committed once the group finishes.

mod client;
mod trans_info;

pub use client::TxClient;
pub use trans_info::TransInfo;
