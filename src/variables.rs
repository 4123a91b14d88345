//! # Variable Store
//!
//! Variables are named, arbitrarily nested YAML values. A layer declares them
//! either as an explicit list of `{name, value}` records or as a plain
//! mapping; both shapes decode to the same [`Variables`] value.
//!
//! ```yaml
//! variables:
//!   - name: image
//!     value: {repository: nginx, tag: "1.25"}
//! ```
//!
//! is equivalent to
//!
//! ```yaml
//! variables:
//!   image: {repository: nginx, tag: "1.25"}
//! ```
//!
//! ## Dotted paths
//!
//! Lookups and overlays address nested locations with dotted paths. Each
//! segment is a mapping key, or a list index when the current value is a
//! sequence (`containers.0.image`). A path that walks off the data is simply
//! "not found" for lookups.
//!
//! ## Overlay
//!
//! Layers are folded oldest ancestor first. An incoming variable whose name
//! matches an existing top-level variable replaces it; an incoming name with
//! dots (`image.tag`) replaces only that nested location and leaves siblings
//! alone. Pre-existing names keep their position and new names are appended.

use std::slice;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result};

/// A single named variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

impl Variable {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// An ordered set of variables with unique top-level names once overlaid.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Variables(Vec<Variable>);

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Variable> {
        self.0.iter()
    }

    /// Resolve a dotted path.
    ///
    /// A variable whose name is exactly `path` wins; otherwise the first
    /// segment selects the top-level variable and the remaining segments walk
    /// into its value.
    pub fn get(&self, path: &str) -> Option<&Value> {
        if let Some(variable) = self.0.iter().find(|v| v.name == path) {
            return Some(&variable.value);
        }
        let (head, rest) = path.split_once('.')?;
        let variable = self.0.iter().find(|v| v.name == head)?;
        lookup(&variable.value, rest)
    }

    /// Merge incoming variables into the store.
    ///
    /// # Errors
    ///
    /// Returns `Error::Variable` when a dotted name walks through a scalar or
    /// indexes past the end of an existing list.
    pub fn overlay<I>(&mut self, incoming: I) -> Result<()>
    where
        I: IntoIterator<Item = Variable>,
    {
        for Variable { name, value } in incoming {
            if let Some(position) = self.position(&name) {
                self.0[position].value = value;
                continue;
            }

            let Some((head, rest)) = name.split_once('.') else {
                self.0.push(Variable { name, value });
                continue;
            };

            match self.position(head) {
                Some(position) => {
                    let slot = navigate(&mut self.0[position].value, rest, &name)?;
                    *slot = value;
                }
                None => {
                    let mut nested = Value::Null;
                    *navigate(&mut nested, rest, &name)? = value;
                    self.0.push(Variable {
                        name: head.to_string(),
                        value: nested,
                    });
                }
            }
        }
        Ok(())
    }

    /// Snapshot the store as a plain mapping of name to value.
    pub fn to_mapping(&self) -> Mapping {
        self.0
            .iter()
            .map(|v| (Value::String(v.name.clone()), v.value.clone()))
            .collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|v| v.name == name)
    }
}

impl FromIterator<Variable> for Variables {
    fn from_iter<T: IntoIterator<Item = Variable>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Variables {
    type Item = Variable;
    type IntoIter = std::vec::IntoIter<Variable>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Variables {
    type Item = &'a Variable;
    type IntoIter = slice::Iter<'a, Variable>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for Variables {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape {
            Records(Vec<Variable>),
            Mapping(Mapping),
            Empty(()),
        }

        match Shape::deserialize(deserializer)? {
            Shape::Records(records) => Ok(Variables(records)),
            Shape::Mapping(mapping) => mapping
                .into_iter()
                .map(|(key, value)| {
                    let name = key_name(&key).ok_or_else(|| {
                        D::Error::custom(format!("variable names must be scalars, got {:?}", key))
                    })?;
                    Ok(Variable { name, value })
                })
                .collect(),
            Shape::Empty(()) => Ok(Variables::default()),
        }
    }
}

/// Walk a dotted path into a value.
///
/// Mapping segments match string keys, or scalar keys rendered as strings
/// (`1: x` answers to `"1"`). Sequence segments must parse as an index in
/// range; anything else is "not found".
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, step)
}

fn step<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Mapping(map) => map.get(segment).or_else(|| {
            map.iter()
                .find(|(key, _)| key_name(key).as_deref() == Some(segment))
                .map(|(_, v)| v)
        }),
        Value::Sequence(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        Value::Tagged(tagged) => step(&tagged.value, segment),
        _ => None,
    }
}

/// Navigate to `path` inside `value`, creating mapping keys that do not exist.
fn navigate<'a>(value: &'a mut Value, path: &str, name: &str) -> Result<&'a mut Value> {
    let mut current = value;
    for segment in path.split('.') {
        if current.is_null() {
            *current = Value::Mapping(Mapping::new());
        }
        current = match current {
            Value::Tagged(tagged) => navigate(&mut tagged.value, segment, name)?,
            Value::Mapping(map) => map
                .entry(Value::String(segment.to_string()))
                .or_insert(Value::Null),
            Value::Sequence(items) => {
                let len = items.len();
                let index = segment.parse::<usize>().map_err(|_| Error::Variable {
                    name: name.to_string(),
                    message: format!("'{}' is not a list index", segment),
                })?;
                items.get_mut(index).ok_or_else(|| Error::Variable {
                    name: name.to_string(),
                    message: format!("index {} out of range for list of length {}", index, len),
                })?
            }
            _ => {
                return Err(Error::Variable {
                    name: name.to_string(),
                    message: format!("cannot set '{}' inside a scalar value", segment),
                })
            }
        };
    }
    Ok(current)
}

fn key_name(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    fn store(text: &str) -> Variables {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_decode_records_and_mapping_are_equal() {
        let records = store(
            r#"
- name: replicas
  value: 3
- name: image
  value:
    repository: nginx
    tag: "1.25"
"#,
        );
        let mapping = store(
            r#"
replicas: 3
image:
  repository: nginx
  tag: "1.25"
"#,
        );
        assert_eq!(records, mapping);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_decode_null_is_empty() {
        let vars = store("~");
        assert!(vars.is_empty());
    }

    #[test]
    fn test_decode_record_without_value_is_null() {
        let vars = store("- name: flag\n");
        assert_eq!(vars.get("flag"), Some(&Value::Null));
    }

    #[test]
    fn test_decode_numeric_mapping_keys_become_names() {
        let vars = store("8080: http\ntrue: yes\n");
        assert_eq!(vars.get("8080"), Some(&yaml("http")));
        assert_eq!(vars.get("true"), Some(&yaml("yes")));
    }

    #[test]
    fn test_decode_rejects_scalar() {
        let result: std::result::Result<Variables, _> = serde_yaml::from_str("just-a-string");
        assert!(result.is_err());
    }

    #[test]
    fn test_get_nested_mapping_and_list() {
        let vars = store(
            r#"
app:
  ports: [80, 443]
  labels:
    tier: web
"#,
        );
        assert_eq!(vars.get("app.labels.tier"), Some(&yaml("web")));
        assert_eq!(vars.get("app.ports.1"), Some(&yaml("443")));
        assert_eq!(vars.get("app.ports.2"), None);
        assert_eq!(vars.get("app.ports.-1"), None);
        assert_eq!(vars.get("app.ports.first"), None);
        assert_eq!(vars.get("app.labels.tier.deeper"), None);
        assert_eq!(vars.get("missing"), None);
    }

    #[test]
    fn test_get_prefers_exact_dotted_name() {
        let vars: Variables = vec![
            Variable::new("a.b", "exact"),
            Variable::new("a", yaml("{b: nested}")),
        ]
        .into_iter()
        .collect();
        assert_eq!(vars.get("a.b"), Some(&yaml("exact")));
    }

    #[test]
    fn test_overlay_replaces_and_appends_in_order() {
        let mut vars = store("first: 1\nsecond: 2\n");
        vars.overlay(store("second: 20\nthird: 3\n")).unwrap();

        let names: Vec<&str> = vars.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
        assert_eq!(vars.get("second"), Some(&yaml("20")));
    }

    #[test]
    fn test_overlay_more_specific_layer_wins() {
        let mut vars = Variables::new();
        vars.overlay(store("env: base\n")).unwrap();
        vars.overlay(store("env: prod\n")).unwrap();
        assert_eq!(vars.get("env"), Some(&yaml("prod")));
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn test_overlay_dotted_name_keeps_siblings() {
        let mut vars = store("parent:\n  child: Y\n  sibling: Z\n");
        vars.overlay(vec![Variable::new("parent.child", "X")]).unwrap();
        assert_eq!(vars.get("parent"), Some(&yaml("{child: X, sibling: Z}")));
    }

    #[test]
    fn test_overlay_dotted_name_into_list_element() {
        let mut vars = store("hosts:\n  - name: a\n  - name: b\n");
        vars.overlay(vec![Variable::new("hosts.1.name", "c")])
            .unwrap();
        assert_eq!(vars.get("hosts"), Some(&yaml("[{name: a}, {name: c}]")));
    }

    #[test]
    fn test_overlay_dotted_name_creates_missing_keys() {
        let mut vars = store("image:\n  repository: nginx\n");
        vars.overlay(vec![Variable::new("image.pull.policy", "Always")])
            .unwrap();
        assert_eq!(vars.get("image.pull.policy"), Some(&yaml("Always")));
        assert_eq!(vars.get("image.repository"), Some(&yaml("nginx")));
    }

    #[test]
    fn test_overlay_dotted_name_without_parent_appends_nested() {
        let mut vars = store("a: 1\n");
        vars.overlay(vec![Variable::new("db.host", "localhost")])
            .unwrap();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars.get("db"), Some(&yaml("{host: localhost}")));
    }

    #[test]
    fn test_overlay_through_scalar_fails() {
        let mut vars = store("port: 443\n");
        let err = vars
            .overlay(vec![Variable::new("port.number", 8443)])
            .unwrap_err();
        assert!(matches!(err, Error::Variable { ref name, .. } if name == "port.number"));
    }

    #[test]
    fn test_overlay_out_of_range_index_fails() {
        let mut vars = store("hosts: [a]\n");
        let err = vars
            .overlay(vec![Variable::new("hosts.3", "d")])
            .unwrap_err();
        assert!(format!("{}", err).contains("out of range"));
    }

    #[test]
    fn test_to_mapping_keeps_order() {
        let vars = store("z: 1\na: 2\n");
        let keys: Vec<Value> = vars.to_mapping().keys().cloned().collect();
        assert_eq!(keys, vec![yaml("z"), yaml("a")]);
    }

    #[test]
    fn test_lookup_on_plain_value() {
        let root = yaml("sha: {cfg: abc}\nlist: [[1, 2]]\n");
        assert_eq!(lookup(&root, "sha.cfg"), Some(&yaml("abc")));
        assert_eq!(lookup(&root, "list.0.1"), Some(&yaml("2")));
        assert_eq!(lookup(&root, "sha.other"), None);
    }
}
