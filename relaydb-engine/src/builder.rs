// Tree builder: turns the flat unit array plus the request header into an
// `ExecutionTree` via a recursive tree-construction pass.

use std::collections::HashSet;
use std::sync::Arc;

use relaydb_admin::MetadataStore;
use relaydb_base::{Error, Map, Result, Value};
use relaydb_lang::{parse_name_alias, split_namespace, Op, Unit};
use relaydb_net::RequestHeader;

use crate::tree::{ExecutionTree, NodeId, Property};

pub fn build_tree(
    units: Vec<Unit>,
    header: &RequestHeader,
    metadata: &MetadataStore,
) -> Result<ExecutionTree> {
    let mut tree = ExecutionTree::new();
    let roots = build_siblings(&mut tree, units, None, "", header, metadata)?;
    tree.roots = roots;
    Ok(tree)
}

fn build_siblings(
    tree: &mut ExecutionTree,
    units: Vec<Unit>,
    parent: Option<NodeId>,
    parent_path: &str,
    header: &RequestHeader,
    metadata: &MetadataStore,
) -> Result<Vec<NodeId>> {
    let mut seen_keys = HashSet::new();
    let mut ids = Vec::with_capacity(units.len());
    let mut last: Option<NodeId> = None;

    for unit in units {
        if unit.name.trim().is_empty() {
            return Err(Error::UnitNameEmpty);
        }

        let (name_part, alias) = parse_name_alias(&unit.name);
        let key = alias.unwrap_or_else(|| name_part.clone());

        if !seen_keys.insert(key.clone()) {
            return Err(Error::RepeatNameAlias {
                path: format!("{parent_path}/{key}"),
            });
        }

        // `resolve_reference_path` always returns a `/`-prefixed absolute
        // path, so a root unit's own path has to start with `/` too or no
        // reference could ever resolve to it. `format!` with an empty
        // `parent_path` already yields exactly that (`"/key"`); non-root
        // calls pass a `parent_path` that already starts with `/`.
        let path = format!("{parent_path}/{key}");

        if !unit.trans.is_empty() && !unit.sub.is_empty() {
            return Err(Error::TransAndSub);
        }

        // A transaction-head unit carries no operation of its own; only
        // its `trans` children do.
        let op: Op = if unit.trans.len() > 1 {
            Op::Find
        } else {
            unit.op.parse()?
        };
        let (db_id, table_id, tables) = resolve_name(&path, &name_part, &unit, metadata)?;

        let mut unit = unit;
        stamp_request_header(&mut unit.extend, header);
        let unit = Arc::new(unit);

        let property = Property {
            name: name_part,
            alias,
            key: key.clone(),
            path: path.clone(),
            op,
            db_id,
            tables,
            table_id,
        };

        let id = if unit.trans.len() == 1 {
            // A single-member transaction is meaningless; collapse to a
            // plain node.
            build_node(tree, unit.trans[0].clone(), property, parent, &path, header, metadata)?
        } else if unit.trans.len() > 1 {
            build_transaction_head(tree, &unit, property, parent, &path, header, metadata)?
        } else {
            build_plain_node(tree, unit.clone(), property, parent, &path, header, metadata)?
        };

        if let Some(last_id) = last {
            tree.get_mut(last_id).next = Some(id);
            tree.get_mut(id).last = Some(last_id);
        }
        tree.get_mut(id).parent = parent;

        last = Some(id);
        ids.push(id);
    }

    Ok(ids)
}

fn build_node(
    tree: &mut ExecutionTree,
    unit: Unit,
    property: Property,
    parent: Option<NodeId>,
    path: &str,
    header: &RequestHeader,
    metadata: &MetadataStore,
) -> Result<NodeId> {
    build_plain_node(tree, Arc::new(unit), property, parent, path, header, metadata)
}

fn build_plain_node(
    tree: &mut ExecutionTree,
    unit: Arc<Unit>,
    property: Property,
    parent: Option<NodeId>,
    path: &str,
    header: &RequestHeader,
    metadata: &MetadataStore,
) -> Result<NodeId> {
    let sub_units = unit.sub.clone();
    let id = tree.push_logical(unit, property);
    tree.get_mut(id).parent = parent;

    if !sub_units.is_empty() {
        let sub_roots = build_siblings(tree, sub_units, Some(id), path, header, metadata)?;
        if let Some(first) = sub_roots.first() {
            tree.get_mut(id).sub = Some(*first);
        }
    }

    Ok(id)
}

fn build_transaction_head(
    tree: &mut ExecutionTree,
    unit: &Arc<Unit>,
    property: Property,
    parent: Option<NodeId>,
    path: &str,
    header: &RequestHeader,
    metadata: &MetadataStore,
) -> Result<NodeId> {
    for child in &unit.trans {
        if !child.trans.is_empty() {
            return Err(Error::SameTransaction);
        }
    }

    let head_unit = Arc::new(Unit {
        op: "find".to_string(),
        ..(**unit).clone()
    });
    let id = tree.push_logical(head_unit, property);
    tree.get_mut(id).parent = parent;

    let chain_roots = build_siblings(tree, unit.trans.clone(), parent, path, header, metadata)?;
    if let Some(first) = chain_roots.first() {
        tree.get_mut(id).trans_chain = Some(*first);
    }

    Ok(id)
}

fn stamp_request_header(extend: &mut Map, header: &RequestHeader) {
    let mut snapshot = Map::new();
    snapshot.insert("request_id".to_string(), Value::Str(header.request_id.clone()));
    snapshot.insert("trace_id".to_string(), Value::Str(header.trace_id.clone()));
    snapshot.insert("timestamp".to_string(), Value::Int(header.timestamp));
    snapshot.insert("timeout_ms".to_string(), Value::Int(header.timeout_ms as i64));
    snapshot.insert("caller".to_string(), Value::Str(header.caller.clone()));
    snapshot.insert("appid".to_string(), Value::UInt(header.appid));
    snapshot.insert("ip".to_string(), Value::Str(header.ip.clone()));
    extend.insert("request_header".to_string(), Value::Object(snapshot));
}

fn resolve_name(
    path: &str,
    name: &str,
    unit: &Unit,
    metadata: &MetadataStore,
) -> Result<(i64, i64, Vec<String>)> {
    let (namespace, bare) = split_namespace(name);

    let snapshot = metadata.load();
    let matches: Vec<_> = snapshot
        .tables
        .values()
        .filter(|t| t.name == bare && t.namespace.as_deref() == namespace)
        .collect();

    let table = match matches.as_slice() {
        [] => {
            return Err(Error::NotFindName {
                path: path.to_string(),
                name: name.to_string(),
            })
        }
        [one] => *one,
        _ => {
            return Err(Error::NameAmbiguity {
                path: path.to_string(),
                name: name.to_string(),
            })
        }
    };

    let tables = if unit.shard.is_empty() {
        vec![table.name.clone()]
    } else {
        unit.shard.clone()
    };

    Ok((table.db_id, table.id, tables))
}
