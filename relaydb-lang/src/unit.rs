// Unit: one declarative operation description submitted by the client.
// Every `map<string, any>` field is a `relaydb_base::Map`; scalar values
// are `relaydb_base::Value`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use relaydb_base::{DataType, Map, Value};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Unit {
    /// `table`, `db.table`, or `name as alias`.
    pub name: String,
    pub op: String,

    #[serde(default)]
    pub where_: Map,
    #[serde(default)]
    pub having: Map,
    #[serde(default)]
    pub data: Map,
    #[serde(default)]
    pub datas: Vec<Map>,

    #[serde(default)]
    pub column: Vec<String>,
    #[serde(default)]
    pub group: Vec<String>,
    #[serde(default)]
    pub order: Vec<String>,
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub from: i64,
    #[serde(default)]
    pub join: Vec<Join>,
    #[serde(default)]
    pub scroll: Option<String>,

    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub field: Vec<String>,
    #[serde(default)]
    pub bytes: Vec<u8>,
    #[serde(default)]
    pub val: Option<Value>,

    #[serde(default)]
    pub params: Vec<Value>,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub args: Vec<Value>,

    /// Overrides the physical table(s) resolved from `name`.
    #[serde(default)]
    pub shard: Vec<String>,
    /// field -> coercion target, applied to untouched `args`/`data` entries.
    #[serde(default)]
    pub data_type: IndexMap<String, DataType>,
    /// Client-passed per-request state; the tree builder also stashes a
    /// `RequestHeader` snapshot into this under `"request_header"`.
    #[serde(default)]
    pub extend: Map,

    #[serde(default)]
    pub sub: Vec<Unit>,
    #[serde(default)]
    pub trans: Vec<Unit>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Join {
    pub name: String,
    pub on: Map,
}

impl Unit {
    pub fn has_referer(&self) -> bool {
        map_has_referer(&self.where_)
            || map_has_referer(&self.having)
            || map_has_referer(&self.data)
            || self.datas.iter().any(map_has_referer)
            || self.args.iter().any(value_has_referer)
            || arg_has_referer(&self.key)
    }
}

/// A map key's first non-comment character is `@` -> its value is a
/// reference string.
pub fn map_has_referer(data: &Map) -> bool {
    for (k, v) in data {
        let nk = remove_comments(k);
        if nk.starts_with('@') {
            return true;
        }
        if let Value::Object(m) = v {
            if map_has_referer(m) {
                return true;
            }
        }
    }
    false
}

fn value_has_referer(v: &Value) -> bool {
    match v {
        Value::Str(s) => arg_has_referer(s),
        _ => false,
    }
}

/// A bare string arg is a reference iff it is exactly `@{...}` (after
/// trimming whitespace); a shorter string can never be one.
pub fn arg_has_referer(arg: &str) -> bool {
    let arg = arg.trim();
    let l = arg.len();
    l > 4 && &arg[..2] == "@{" && &arg[l - 1..] == "}"
}

pub fn referer_param(arg: &str) -> &str {
    let arg = arg.trim();
    &arg[2..arg.len() - 1]
}

/// Strip a leading `//`-delimited inline comment segment from a map key,
/// mirroring `util.RemoveComments`. Only the leading single-line form is
/// recognized; multi-line/`/* */` comments are out of scope.
pub fn remove_comments(key: &str) -> &str {
    if let Some(rest) = key.strip_prefix("//") {
        if let Some(end) = rest.find("//") {
            return &rest[end + 2..];
        }
        return rest;
    }
    key
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn detects_bare_referer() {
        assert!(arg_has_referer("@{../users.id}"));
        assert!(!arg_has_referer("@{x}"));
        assert!(!arg_has_referer("plain"));
    }

    #[test]
    fn strips_leading_comment() {
        assert_eq!(remove_comments("//note//@user_id"), "@user_id");
        assert_eq!(remove_comments("@user_id"), "@user_id");
    }

    #[test]
    fn detects_map_referer_at_top_level() {
        let mut m = Map::new();
        m.insert("@user_id".to_string(), Value::Str("@{../users.id}".into()));
        assert!(map_has_referer(&m));
    }
}
