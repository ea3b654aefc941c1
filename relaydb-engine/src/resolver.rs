// Reference resolution, via a backward-walk-then-ascend lookup: references
// are resolved by walking the tree at resolution time rather than through a
// precomputed index, which is what makes a reference to a node that hasn't
// executed yet surface as a runtime `NotExecuted` instead of a build-time
// error.

use relaydb_base::{Error, Result, Value};
use relaydb_lang::{path_and_field, resolve_reference_path};

use crate::tree::{ExecutionTree, Finished, NodeId};

/// Default relational-operator recognizer: the usual `"or"`/`"and"` keys,
/// matched case-insensitively.
pub trait RelationRecognizer {
    fn is_relation(&self, key: &str) -> bool;
}

pub struct DefaultRelationRecognizer;

impl RelationRecognizer for DefaultRelationRecognizer {
    fn is_relation(&self, key: &str) -> bool {
        let k = key.trim().to_ascii_lowercase();
        k == "or" || k == "and"
    }
}

/// Outcome of resolving one `@{...}` reference.
pub enum Resolved {
    Value(Value),
    /// The referenced node produced no rows; the caller short-circuits with
    /// `IsNil = true` rather than continuing to execute.
    Nil,
}

pub fn resolve_referer(tree: &ExecutionTree, from: NodeId, referer: &str) -> Result<Resolved> {
    let reference = path_and_field(referer);
    let current_path = tree.property(from).path.clone();
    let target_path = resolve_reference_path(&current_path, &reference.path);

    let outcome = find_node(tree, from, &target_path)?;

    let value = match outcome {
        Lookup::NotFound => return Err(Error::RefererNotFound(target_path)),
        Lookup::Exact { node: m, via_child_ascent } => {
            let node = tree.get(m);
            if node.error.is_some() {
                return Err(Error::RefererUnitFailed(target_path));
            }
            if node.finished == Finished::NotFinished {
                return Err(Error::RefererNotExecuted(target_path));
            }
            if node.is_nil {
                return Ok(Resolved::Nil);
            }

            if via_child_ascent {
                node_value_for_ascent(tree, m)
            } else if node.has_sub {
                collect_sub_query_rets(tree, m)
            } else {
                node.result.clone().unwrap_or(Value::Null)
            }
        }
        Lookup::BeneathFanOut { node: m, suffix } => descend_sub_query(tree, m, &suffix)?,
    };

    if reference.field.is_empty() {
        Ok(Resolved::Value(value))
    } else {
        field_access(&value, &reference.field).map(Resolved::Value)
    }
}

/// `m`'s own `ParentRet`, used when the reference was reached by ascending
/// one step from a direct descendant.
fn node_value_for_ascent(tree: &ExecutionTree, m: NodeId) -> Value {
    tree.get(m).parent_ret.clone().unwrap_or(Value::Null)
}

fn collect_sub_query_rets(tree: &ExecutionTree, m: NodeId) -> Value {
    let rets: Vec<Value> = tree
        .get(m)
        .sub_query
        .iter()
        .filter_map(|id| tree.get(*id).parent_ret.clone())
        .collect();

    match rets.len() {
        1 => rets.into_iter().next().unwrap(),
        _ => Value::Array(rets),
    }
}

enum Lookup {
    NotFound,
    Exact { node: NodeId, via_child_ascent: bool },
    /// `target_path` lives beneath a visited sub-fan-out node; `suffix` is
    /// the remaining path segments to match inside its `sub_query`.
    BeneathFanOut { node: NodeId, suffix: Vec<String> },
}

/// Walks backward via `last`, then ascends via `parent`, comparing each
/// visited node's logical path to `target_path`.
fn find_node(tree: &ExecutionTree, from: NodeId, target_path: &str) -> Result<Lookup> {
    let mut cursor = from;
    let mut ascended_directly_from_start = true;

    loop {
        let node = tree.get(cursor);

        if let Some(last) = node.last {
            cursor = last;
            ascended_directly_from_start = false;
        } else {
            match node.parent {
                Some(parent) => {
                    let via_direct_ascent = ascended_directly_from_start;
                    cursor = parent;
                    if tree.property(cursor).path == target_path {
                        return Ok(Lookup::Exact {
                            node: cursor,
                            via_child_ascent: via_direct_ascent,
                        });
                    }
                    if tree.get(cursor).has_sub {
                        if let Some(suffix) = strict_suffix(&tree.property(cursor).path, target_path) {
                            return Ok(Lookup::BeneathFanOut { node: cursor, suffix });
                        }
                    }
                    ascended_directly_from_start = false;
                    continue;
                }
                None => return Ok(Lookup::NotFound),
            }
        }

        if tree.property(cursor).path == target_path {
            return Ok(Lookup::Exact {
                node: cursor,
                via_child_ascent: false,
            });
        }
        if tree.get(cursor).has_sub {
            if let Some(suffix) = strict_suffix(&tree.property(cursor).path, target_path) {
                return Ok(Lookup::BeneathFanOut { node: cursor, suffix });
            }
        }
    }
}

/// If `target` is `base` plus one or more additional `/`-separated
/// segments, returns those segments; otherwise `None`.
fn strict_suffix(base: &str, target: &str) -> Option<Vec<String>> {
    let rest = target.strip_prefix(base)?.strip_prefix('/')?;
    if rest.is_empty() {
        return None;
    }
    Some(rest.split('/').map(str::to_string).collect())
}

/// Descends into `m`'s sub-instances, matching each remaining path segment
/// against the instance's own key, and concatenates leaf values collected
/// from every matching sub-instance.
fn descend_sub_query(tree: &ExecutionTree, m: NodeId, suffix: &[String]) -> Result<Value> {
    let mut collected = Vec::new();
    for sub in &tree.get(m).sub_query {
        if suffix[0] == tree.property(*sub).key {
            if suffix.len() == 1 {
                collected.push(tree.get(*sub).result.clone().unwrap_or(Value::Null));
            } else {
                collected.push(descend_sub_query(tree, *sub, &suffix[1..])?);
            }
        }
    }

    if collected.is_empty() {
        return Err(Error::RefererNotFound(suffix.join("/")));
    }

    Ok(if collected.len() == 1 {
        collected.into_iter().next().unwrap()
    } else {
        Value::Array(collected)
    })
}

fn field_access(value: &Value, field: &str) -> Result<Value> {
    match value {
        Value::Object(map) => map
            .get(field)
            .cloned()
            .ok_or(Error::RefererFieldNotExist),
        Value::Array(items) => {
            let collected: Result<Vec<Value>> = items
                .iter()
                .map(|item| field_access(item, field))
                .collect();
            collected.map(Value::Array)
        }
        _ => Err(Error::RefererResultType),
    }
}
