// The self-describing value container every Unit field (`where`, `data`,
// `args`, ...) is ultimately made of: an explicit enum of variants (null,
// bool, int, uint, float, string, bytes, time, array, object). `Map` is
// order-preserving (`IndexMap`) so assembled responses surface
// client-supplied keys in the order they arrived, the way a JSON object
// printer would.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::{err, Error, Result};

pub type Map = IndexMap<String, Value>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(OrderedFloat<f64>),
    Str(String),
    Bytes(Vec<u8>),
    Time(DateTime<Utc>),
    Array(Vec<Value>),
    Object(Map),
}

/// `data_type` coercion target, mirrors `util.GetDataByType`/`FormatData`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Int,
    UInt,
    Float,
    Str,
    Bytes,
    Time,
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Object(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Normalize a single-row-or-array result to an ordered sequence of
    /// rows, the way the executor must before fanning a sub-query out:
    /// single-row operations wrap in a one-element sequence.
    pub fn into_rows(self) -> Vec<Value> {
        match self {
            Value::Array(rows) => rows,
            other => vec![other],
        }
    }

    /// Coerce this value to the requested wire type, for `args[]` entries
    /// and `data`/`datas` fields a reference did not already replace.
    pub fn coerce(&self, ty: DataType) -> Result<Value> {
        match ty {
            DataType::Bool => self.as_bool().map(Value::Bool),
            DataType::Int => self.as_i64().map(Value::Int),
            DataType::UInt => self.as_u64().map(Value::UInt),
            DataType::Float => self.as_f64().map(|f| Value::Float(OrderedFloat(f))),
            DataType::Str => Ok(Value::Str(self.to_display_string())),
            DataType::Bytes => self.as_bytes().map(|b| Value::Bytes(b.to_vec())),
            DataType::Time => self.as_time().map(Value::Time),
        }
    }

    fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            Value::Str(s) => s
                .parse()
                .map_err(|_| err(format!("cannot coerce {s:?} to bool"))),
            other => Err(err(format!("cannot coerce {other:?} to bool"))),
        }
    }

    fn as_i64(&self) -> Result<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            Value::UInt(u) => i64::try_from(*u).map_err(|e| err(e.to_string())),
            Value::Float(f) => Ok(f.0 as i64),
            Value::Str(s) => s
                .parse()
                .map_err(|_| err(format!("cannot coerce {s:?} to int"))),
            other => Err(err(format!("cannot coerce {other:?} to int"))),
        }
    }

    fn as_u64(&self) -> Result<u64> {
        match self {
            Value::UInt(u) => Ok(*u),
            Value::Int(i) => u64::try_from(*i).map_err(|e| err(e.to_string())),
            Value::Str(s) => s
                .parse()
                .map_err(|_| err(format!("cannot coerce {s:?} to uint"))),
            other => Err(err(format!("cannot coerce {other:?} to uint"))),
        }
    }

    fn as_f64(&self) -> Result<f64> {
        match self {
            Value::Float(f) => Ok(f.0),
            Value::Int(i) => Ok(*i as f64),
            Value::UInt(u) => Ok(*u as f64),
            Value::Str(s) => s
                .parse()
                .map_err(|_| err(format!("cannot coerce {s:?} to float"))),
            other => Err(err(format!("cannot coerce {other:?} to float"))),
        }
    }

    fn as_bytes(&self) -> Result<&[u8]> {
        match self {
            Value::Bytes(b) => Ok(b),
            Value::Str(s) => Ok(s.as_bytes()),
            other => Err(err(format!("cannot coerce {other:?} to bytes"))),
        }
    }

    fn as_time(&self) -> Result<DateTime<Utc>> {
        match self {
            Value::Time(t) => Ok(*t),
            Value::Str(s) => DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| err(e.to_string())),
            other => Err(err(format!("cannot coerce {other:?} to time"))),
        }
    }

    pub fn to_display_string(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::UInt(u) => u.to_string(),
            Value::Float(f) => f.0.to_string(),
            Value::Bool(b) => b.to_string(),
            other => format!("{other:?}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn single_row_wraps_in_one_element_sequence() {
        let row = Value::Object(Map::new());
        assert_eq!(row.clone().into_rows(), vec![row]);
    }

    #[test]
    fn array_stays_as_is() {
        let rows = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(rows.clone().into_rows(), vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn coerce_str_to_int() {
        let v = Value::Str("42".to_string());
        assert_eq!(v.coerce(DataType::Int).unwrap(), Value::Int(42));
    }

    #[test]
    fn coerce_failure_is_an_error() {
        let v = Value::Str("not a number".to_string());
        assert!(v.coerce(DataType::Int).is_err());
    }
}
