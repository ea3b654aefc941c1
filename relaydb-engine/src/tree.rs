// Execution tree: an arena of `Node`s addressed by `NodeId`, rather than a
// pointer graph, to keep logical/instance sharing safe without
// `Rc`/`unsafe`. A *logical* node owns a `Property`; an *instance* node
// carries a `real` pointer back to the logical node whose
// `Property`/`Unit`/`sub`/`next` it shares, created either for sub-fan-out
// rows or for per-row transaction isolation.

use std::sync::Arc;

use relaydb_base::Value;
use relaydb_lang::{Op, Unit};
use relaydb_net::BackendAddress;
use relaydb_txn::TransInfo;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(pub usize);

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Finished {
    NotFinished,
    Finished,
    RolledBackSkipped,
}

/// Identity resolved at tree-build time; shared by every instance of a
/// logical node.
#[derive(Clone, Debug)]
pub struct Property {
    pub name: String,
    pub alias: Option<String>,
    pub key: String,
    pub path: String,
    pub op: Op,
    pub db_id: i64,
    pub tables: Vec<String>,
    pub table_id: i64,
}

#[derive(Clone, Debug, Default)]
pub struct Detail {
    pub size: u64,
    pub scroll: Option<Value>,
    pub extras: relaydb_base::Map,
    pub total: Option<u64>,
}

impl Detail {
    /// Detail-presence test: any of size>0, scroll set, or non-empty
    /// extras.
    pub fn is_present(&self) -> bool {
        self.size > 0 || self.scroll.is_some() || !self.extras.is_empty()
    }
}

pub struct Node {
    pub unit: Arc<Unit>,
    /// `None` means this node IS the logical template.
    pub real: Option<NodeId>,
    pub property: Option<Property>,

    pub parent: Option<NodeId>,
    pub last: Option<NodeId>,
    pub next: Option<NodeId>,
    pub sub: Option<NodeId>,
    /// Head of the `trans` sibling chain, for a transaction-head node (a
    /// unit with `len(trans) > 1` produces one). `None` for an ordinary
    /// node.
    pub trans_chain: Option<NodeId>,

    pub is_sub: bool,
    pub in_trans: bool,
    pub trans_info: Option<Arc<TransInfo>>,
    pub address_override: Option<BackendAddress>,

    pub result: Option<Value>,
    pub detail: Detail,
    pub is_nil: bool,
    pub error: Option<relaydb_base::Error>,
    pub finished: Finished,
    pub has_sub: bool,
    pub sub_query: Vec<NodeId>,
    pub parent_ret: Option<Value>,
}

impl Node {
    fn new(unit: Arc<Unit>, property: Option<Property>) -> Node {
        Node {
            unit,
            real: None,
            property,
            parent: None,
            last: None,
            next: None,
            sub: None,
            trans_chain: None,
            is_sub: false,
            in_trans: false,
            trans_info: None,
            address_override: None,
            result: None,
            detail: Detail::default(),
            is_nil: false,
            error: None,
            finished: Finished::NotFinished,
            has_sub: false,
            sub_query: Vec::new(),
            parent_ret: None,
        }
    }
}

#[derive(Default)]
pub struct ExecutionTree {
    nodes: Vec<Node>,
    pub roots: Vec<NodeId>,
}

impl ExecutionTree {
    pub fn new() -> ExecutionTree {
        ExecutionTree::default()
    }

    pub fn push_logical(&mut self, unit: Arc<Unit>, property: Property) -> NodeId {
        self.nodes.push(Node::new(unit, Some(property)));
        NodeId(self.nodes.len() - 1)
    }

    /// Spawns an instance node sharing `real`'s `Property`/`Unit`/`sub`.
    pub fn push_instance(&mut self, real: NodeId, is_sub: bool) -> NodeId {
        let unit = self.nodes[real.0].unit.clone();
        let mut node = Node::new(unit, None);
        node.real = Some(real);
        node.is_sub = is_sub;
        node.sub = self.nodes[real.0].sub;
        node.trans_chain = self.nodes[real.0].trans_chain;
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Resolves to the logical node this id's `real` pointer shares, or
    /// `id` itself if it already is the logical node.
    pub fn real_id(&self, id: NodeId) -> NodeId {
        self.nodes[id.0].real.unwrap_or(id)
    }

    pub fn property(&self, id: NodeId) -> &Property {
        let real = self.real_id(id);
        self.nodes[real.0]
            .property
            .as_ref()
            .expect("logical node always carries a property")
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
