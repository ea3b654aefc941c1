// The request-execution engine: builds an execution tree from
// a flat unit array, runs it to completion against a backend driver, and
// assembles the final response. Ties together relaydb-auth (permission and
// table-verify policy), relaydb-eval (the plugin chain), relaydb-txn (the
// transaction coordinator) and an engine-supplied `BackendDriver`.

mod assembler;
mod backend;
mod builder;
mod executor;
mod resolver;
mod substitute;
mod tree;
#[cfg(test)]
mod tests;

pub use assembler::{assemble, derive_mode, AssemblyMode};
pub use backend::{BackendDriver, BackendRequest, BackendResponse};
pub use builder::build_tree;
pub use executor::{execute_request, ExecCtx};
pub use resolver::{resolve_referer, DefaultRelationRecognizer, RelationRecognizer, Resolved};
pub use substitute::{substitute_args, substitute_map};
pub use tree::{Detail, ExecutionTree, Finished, Node, NodeId, Property};

use relaydb_base::Result;
use relaydb_eval::GateEvaluator;
use relaydb_lang::Unit;
use relaydb_net::RequestHeader;

/// Builds the tree and runs it to completion, returning the assembled
/// response.
pub async fn run_request<B, G, R>(
    units: Vec<Unit>,
    header: &RequestHeader,
    ectx: &ExecCtx<'_, B, G, R>,
) -> Result<relaydb_base::Value>
where
    B: BackendDriver,
    G: GateEvaluator,
    R: RelationRecognizer,
{
    let mut tree = build_tree(units, header, ectx.metadata)?;
    execute_request(&mut tree, ectx).await?;
    Ok(assemble(&tree, &tree.roots.clone()))
}
