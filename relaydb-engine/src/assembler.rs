// Result assembler: decides Single/Parallel/Compound by counting
// top-level units and detecting any `sub`, then shapes the response
// accordingly.

use relaydb_base::{Map, Value};

use crate::tree::{ExecutionTree, NodeId};

const ERROR_MESSAGE_LIMIT: usize = 5000;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AssemblyMode {
    Single,
    Parallel,
    Compound,
}

/// Derives the mode from the tree shape.
pub fn derive_mode(tree: &ExecutionTree, roots: &[NodeId]) -> AssemblyMode {
    if roots.iter().any(|r| any_sub(tree, *r)) {
        return AssemblyMode::Compound;
    }
    if roots.len() > 1 {
        AssemblyMode::Parallel
    } else {
        AssemblyMode::Single
    }
}

fn any_sub(tree: &ExecutionTree, id: NodeId) -> bool {
    let real = tree.real_id(id);
    tree.get(real).sub.is_some()
}

fn truncate_error(message: &str) -> String {
    if message.len() > ERROR_MESSAGE_LIMIT {
        message.chars().take(ERROR_MESSAGE_LIMIT).collect()
    } else {
        message.to_string()
    }
}

pub fn assemble(tree: &ExecutionTree, roots: &[NodeId]) -> Value {
    match derive_mode(tree, roots) {
        AssemblyMode::Single => assemble_single(tree, roots[0]),
        AssemblyMode::Parallel => assemble_parallel(tree, roots),
        AssemblyMode::Compound => {
            let mut out = Map::new();
            for id in roots {
                out.insert(tree.property(*id).key.clone(), assemble_compound(tree, *id));
            }
            Value::Object(out)
        }
    }
}

fn assemble_single(tree: &ExecutionTree, id: NodeId) -> Value {
    let node = tree.get(id);

    if let Some(err) = &node.error {
        return Value::Str(truncate_error(&err.to_string()));
    }

    let data = node.result.clone().unwrap_or(Value::Null);

    if node.detail.is_present() {
        let mut wrapped = Map::new();
        wrapped.insert("data".to_string(), data);
        wrapped.insert("detail".to_string(), detail_value(node));
        Value::Object(wrapped)
    } else {
        data
    }
}

fn assemble_parallel(tree: &ExecutionTree, roots: &[NodeId]) -> Value {
    let mut data = Map::new();
    let mut is_nil = Map::new();
    let mut errors = Map::new();

    for id in roots {
        let node = tree.get(*id);
        let key = tree.property(*id).key.clone();

        is_nil.insert(key.clone(), Value::Bool(node.is_nil));

        if let Some(err) = &node.error {
            errors.insert(key.clone(), Value::Str(truncate_error(&err.to_string())));
        }
        data.insert(key, node.result.clone().unwrap_or(Value::Null));
    }

    let mut out = Map::new();
    out.insert("data".to_string(), Value::Object(data));
    out.insert("is_nil".to_string(), Value::Object(is_nil));
    out.insert("error".to_string(), Value::Object(errors));
    Value::Object(out)
}

fn assemble_compound(tree: &ExecutionTree, id: NodeId) -> Value {
    let node = tree.get(id);
    let real = tree.real_id(id);

    let mut out = Map::new();

    if node.is_nil {
        out.insert("is_nil".to_string(), Value::Bool(true));
    }
    if let Some(err) = &node.error {
        out.insert(
            "error".to_string(),
            Value::Str(truncate_error(&err.to_string())),
        );
    }
    if node.detail.is_present() {
        out.insert("detail".to_string(), detail_value(node));
    }

    if node.has_sub {
        // `sub_query` is flat: every child in the `sub:` sibling chain,
        // for every fanned-out row, one after another. A row's children
        // are a contiguous run the width of that chain, so group by that
        // width before merging each row.
        let width = tree.get(real).sub.map(|c| sibling_chain_len(tree, c)).unwrap_or(1).max(1);
        let rows: Vec<Value> = node
            .sub_query
            .chunks(width)
            .map(|chunk| merge_parent_ret(tree, chunk))
            .collect();
        out.insert("data".to_string(), Value::Array(rows));
    } else if tree.get(real).sub.is_some() {
        // Transaction-head-style recursive compound: descend into the
        // chain even though this particular node produced no sub rows.
        out.insert("data".to_string(), node.result.clone().unwrap_or(Value::Null));
    } else {
        out.insert("data".to_string(), node.result.clone().unwrap_or(Value::Null));
    }

    Value::Object(out)
}

/// Counts the `sub:` sibling chain starting at `start`, walking the
/// logical `.next` pointers wired at build time (stable across every
/// fanned-out row, unlike the per-row instance ids in `sub_query`).
fn sibling_chain_len(tree: &ExecutionTree, start: NodeId) -> usize {
    let mut n = 1;
    let mut cur = tree.get(start).next;
    while let Some(next) = cur {
        n += 1;
        cur = tree.get(next).next;
    }
    n
}

/// One fanned-out row: the parent row's own columns (`ParentRet`), plus
/// each child's recursive compound result nested under that child's own
/// property key — e.g. a `users` row with a `sub: [{name: orders}]` child
/// gets an `"orders"` key, not its fields flattened into the row.
fn merge_parent_ret(tree: &ExecutionTree, chunk: &[NodeId]) -> Value {
    let parent_ret = chunk.first().and_then(|id| tree.get(*id).parent_ret.clone());
    let mut parent_cols = match parent_ret {
        Some(Value::Object(m)) => m,
        _ => Map::new(),
    };

    for &child_id in chunk {
        let key = tree.property(child_id).key.clone();
        parent_cols.insert(key, assemble_compound(tree, child_id));
    }

    Value::Object(parent_cols)
}

fn detail_value(node: &crate::tree::Node) -> Value {
    let mut m = Map::new();
    m.insert("size".to_string(), Value::Int(node.detail.size as i64));
    if let Some(scroll) = &node.detail.scroll {
        m.insert("scroll".to_string(), scroll.clone());
    }
    if let Some(total) = node.detail.total {
        m.insert("total".to_string(), Value::UInt(total));
    }
    for (k, v) in &node.detail.extras {
        m.insert(k.clone(), v.clone());
    }
    Value::Object(m)
}
