// Rewrites `where`/`having`/`data`/`datas`/`key`/`args` with reference
// literals resolved: a recursive map-walk generalized over the engine's
// `RelationRecognizer`.

use relaydb_base::{DataType, Map, Result, Value};
use relaydb_lang::{arg_has_referer, map_has_referer, remove_comments};

use crate::resolver::{resolve_referer, RelationRecognizer, Resolved};
use crate::tree::{ExecutionTree, NodeId};

/// `Ok(None)` signals a short-circuit: some referenced node was `IsNil`, so
/// the caller should skip executing and mark itself `IsNil` too.
pub fn substitute_map<R: RelationRecognizer>(
    tree: &ExecutionTree,
    from: NodeId,
    relation: &R,
    map: &Map,
) -> Result<Option<Map>> {
    if !map_has_referer(map) {
        return Ok(Some(map.clone()));
    }

    let mut out = Map::new();

    for (key, value) in map {
        let stripped_key = remove_comments(key);

        if let Some(referer) = stripped_key.strip_prefix('@') {
            match resolve_referer(tree, from, referer)? {
                Resolved::Nil => return Ok(None),
                Resolved::Value(v) => {
                    out.insert(referer.to_string(), v);
                    continue;
                }
            }
        }

        if relation.is_relation(&stripped_key) {
            if let Value::Array(items) = value {
                let mut resolved_items = Vec::with_capacity(items.len());
                for item in items {
                    if let Value::Object(m) = item {
                        match substitute_map(tree, from, relation, m)? {
                            Some(resolved) => resolved_items.push(Value::Object(resolved)),
                            None => return Ok(None),
                        }
                    } else {
                        resolved_items.push(item.clone());
                    }
                }
                out.insert(key.clone(), Value::Array(resolved_items));
                continue;
            }
        }

        if let Value::Str(s) = value {
            if value_looks_like_referer(s) {
                match resolve_referer(tree, from, &s[2..s.len() - 1])? {
                    Resolved::Nil => return Ok(None),
                    Resolved::Value(v) => {
                        out.insert(key.clone(), v);
                        continue;
                    }
                }
            }
        }

        out.insert(key.clone(), value.clone());
    }

    Ok(Some(out))
}

fn value_looks_like_referer(s: &str) -> bool {
    let trimmed = s.trim();
    trimmed.len() > 4 && trimmed.starts_with("@{") && trimmed.ends_with('}')
}

/// `args[]` substitution: matching entries are replaced by reference; the
/// rest are coerced per `data_type`.
pub fn substitute_args(
    tree: &ExecutionTree,
    from: NodeId,
    args: &[Value],
    field_order: &[String],
    data_type: &indexmap::IndexMap<String, DataType>,
) -> Result<Option<Vec<Value>>> {
    let mut out = Vec::with_capacity(args.len());

    for (i, arg) in args.iter().enumerate() {
        if let Value::Str(s) = arg {
            if arg_has_referer(s) {
                match resolve_referer(tree, from, &s[2..s.len() - 1])? {
                    Resolved::Nil => return Ok(None),
                    Resolved::Value(v) => {
                        out.push(v);
                        continue;
                    }
                }
            }
        }

        let coerced = match field_order.get(i).and_then(|f| data_type.get(f)) {
            Some(ty) => arg.coerce(*ty)?,
            None => arg.clone(),
        };
        out.push(coerced);
    }

    Ok(Some(out))
}
