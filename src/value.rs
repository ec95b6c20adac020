//! Tagged representation of the merged inventory parameter tree.
//!
//! The class-hierarchy evaluator (out of scope, see [`crate::inventory`]) hands back an
//! arbitrarily nested map/list/scalar tree. Rather than consume it as `serde_json::Value`
//! or `serde_yaml::Value` directly everywhere, the core pins it to this crate's own
//! [`Value`] so accessors can return a typed, crate-local error instead of leaking a
//! third-party value type through every public signature (per the design note on
//! modelling the dynamic parameter tree as a tagged value type).

use indexmap::IndexMap;

use crate::error::{Error, Result};

/// One node of the merged inventory tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// Walk a dotted key path (`"parameters.components.argocd.url"`) and return the node
    /// at that path, or [`Error::NotFound`] if any segment is absent.
    pub fn get_at(&self, path: &str) -> Result<&Value> {
        let mut node = self;
        for segment in path.split('.') {
            let map = node
                .as_map()
                .ok_or_else(|| Error::TypeMismatch {
                    key: path.to_string(),
                    expected: "map",
                    actual: node.type_name(),
                })?;
            node = map.get(segment).ok_or_else(|| Error::NotFound(path.to_string()))?;
        }
        Ok(node)
    }

    /// Like [`Value::get_at`] but returns `None` (rather than erroring) on a missing key,
    /// still erroring on a type mismatch along the path.
    pub fn get_at_opt(&self, path: &str) -> Result<Option<&Value>> {
        match self.get_at(path) {
            Ok(v) => Ok(Some(v)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn get_string_at(&self, path: &str) -> Result<&str> {
        let node = self.get_at(path)?;
        node.as_str().ok_or_else(|| Error::TypeMismatch {
            key: path.to_string(),
            expected: "string",
            actual: node.type_name(),
        })
    }

    pub fn get_string_at_opt(&self, path: &str) -> Result<Option<&str>> {
        match self.get_at_opt(path)? {
            None => Ok(None),
            Some(node) => node
                .as_str()
                .map(Some)
                .ok_or_else(|| Error::TypeMismatch {
                    key: path.to_string(),
                    expected: "string",
                    actual: node.type_name(),
                }),
        }
    }

    pub fn get_map_at(&self, path: &str) -> Result<&IndexMap<String, Value>> {
        let node = self.get_at(path)?;
        node.as_map().ok_or_else(|| Error::TypeMismatch {
            key: path.to_string(),
            expected: "map",
            actual: node.type_name(),
        })
    }

    pub fn get_list_at(&self, path: &str) -> Result<&[Value]> {
        let node = self.get_at(path)?;
        node.as_list().ok_or_else(|| Error::TypeMismatch {
            key: path.to_string(),
            expected: "list",
            actual: node.type_name(),
        })
    }

    /// Recursively visit every leaf (non-`Map`/non-`List`) value, calling `visit` with the
    /// slash-joined path (`"/parameters/foo/0/bar"`) built up so far. Used by the
    /// secret-reference builder's recursive search.
    pub fn walk_leaves<'a>(&'a self, visit: &mut impl FnMut(&str, &'a Value)) {
        fn go<'a>(prefix: &str, node: &'a Value, visit: &mut impl FnMut(&str, &'a Value)) {
            match node {
                Value::Map(m) => {
                    for (k, v) in m {
                        go(&format!("{prefix}/{k}"), v, visit);
                    }
                }
                Value::List(l) => {
                    for (i, v) in l.iter().enumerate() {
                        go(&format!("{prefix}/{i}"), v, visit);
                    }
                }
                leaf => visit(prefix, leaf),
            }
        }
        go("", self, visit);
    }
}

impl From<serde_yaml::Value> for Value {
    fn from(v: serde_yaml::Value) -> Self {
        match v {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or_default())
                }
            }
            serde_yaml::Value::String(s) => Value::String(s),
            serde_yaml::Value::Sequence(s) => Value::List(s.into_iter().map(Value::from).collect()),
            serde_yaml::Value::Mapping(m) => Value::Map(
                m.into_iter()
                    .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), Value::from(v))))
                    .collect(),
            ),
            serde_yaml::Value::Tagged(t) => Value::from(t.value),
        }
    }
}

impl From<&Value> for serde_yaml::Value {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => serde_yaml::Value::Null,
            Value::Bool(b) => serde_yaml::Value::Bool(*b),
            Value::Int(i) => serde_yaml::Value::Number((*i).into()),
            Value::Float(f) => serde_yaml::Value::Number((*f).into()),
            Value::String(s) => serde_yaml::Value::String(s.clone()),
            Value::List(l) => serde_yaml::Value::Sequence(l.iter().map(serde_yaml::Value::from).collect()),
            Value::Map(m) => serde_yaml::Value::Mapping(m.iter().map(|(k, v)| (serde_yaml::Value::String(k.clone()), serde_yaml::Value::from(v))).collect()),
        }
    }
}
