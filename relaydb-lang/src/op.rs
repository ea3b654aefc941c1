// The operation vocabulary a Unit can carry.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use relaydb_base::{err, Result};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Op {
    Find,
    FindAll,
    Insert,
    Update,
    Replace,
    Delete,
    Create,
    Drop,
    /// A raw backend query string (`unit.query` non-empty) rather than one
    /// of the structured ops above.
    Query,
}

impl Op {
    pub fn is_ddl(self) -> bool {
        matches!(self, Op::Create | Op::Drop)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Op::Find => "find",
            Op::FindAll => "find_all",
            Op::Insert => "insert",
            Op::Update => "update",
            Op::Replace => "replace",
            Op::Delete => "delete",
            Op::Create => "create",
            Op::Drop => "drop",
            Op::Query => "query",
        }
    }

    /// Whether this op, by nature, returns a set of rows rather than a
    /// single row — `find_all` is the structural analogue of `realNode.IsArray()`.
    pub fn is_array(self) -> bool {
        matches!(self, Op::FindAll)
    }
}

impl FromStr for Op {
    type Err = relaydb_base::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "find" => Ok(Op::Find),
            "find_all" => Ok(Op::FindAll),
            "insert" => Ok(Op::Insert),
            "update" => Ok(Op::Update),
            "replace" => Ok(Op::Replace),
            "delete" => Ok(Op::Delete),
            "create" => Ok(Op::Create),
            "drop" => Ok(Op::Drop),
            other => Err(err(format!("unknown op: {other}"))),
        }
    }
}
