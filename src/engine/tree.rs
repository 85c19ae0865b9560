use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use serde_json::{json, Map, Value};
use crate::{Error, Result};

type Getter = Box<dyn Fn() -> Value + Send + Sync>;
type Setter = Box<dyn Fn(Value) + Send + Sync>;

/// A leaf whose value is read and written through bound functions.
///
/// The getter is invoked on every read so the leaf always reflects live
/// state; the setter owns its own validation and may silently reject a
/// value it does not accept. A leaf with no setter is read-only. A leaf
/// with no getter is an action leaf: setting it triggers a side effect
/// and reads render as null.
pub struct BoundLeaf {
    getter: Option<Getter>,
    setter: Option<Setter>,
}

impl BoundLeaf {
    pub fn new<G, S>(getter: G, setter: S) -> Self
    where
        G: Fn() -> Value + Send + Sync + 'static,
        S: Fn(Value) + Send + Sync + 'static,
    {
        Self {
            getter: Some(Box::new(getter)),
            setter: Some(Box::new(setter)),
        }
    }

    pub fn read_only<G>(getter: G) -> Self
    where
        G: Fn() -> Value + Send + Sync + 'static,
    {
        Self {
            getter: Some(Box::new(getter)),
            setter: None,
        }
    }

    pub fn action<S>(setter: S) -> Self
    where
        S: Fn(Value) + Send + Sync + 'static,
    {
        Self {
            getter: None,
            setter: Some(Box::new(setter)),
        }
    }

    fn read(&self) -> Value {
        self.getter.as_ref().map(|g| g()).unwrap_or(Value::Null)
    }
}

/// A node in the parameter tree.
pub enum Node {
    /// A stored scalar value.
    Leaf(Value),
    /// A leaf dispatching reads and writes through bound functions.
    Bound(BoundLeaf),
    /// A composite of named children.
    Branch(BTreeMap<String, Node>),
    /// A nested tree shared with another owner, keeping its own mutability.
    SubTree(Arc<RwLock<ParameterTree>>),
}

impl Node {
    /// Builds a node from a JSON value: objects become branches, everything
    /// else a stored leaf.
    pub fn from_value(value: Value) -> Node {
        match value {
            Value::Object(map) => Node::Branch(
                map.into_iter()
                    .map(|(key, val)| (key, Node::from_value(val)))
                    .collect(),
            ),
            other => Node::Leaf(other),
        }
    }
}

/// A path-addressable tree of parameters.
///
/// Paths are `/`-delimited; the empty path addresses the root. A mutable
/// tree accepts unknown keys on set (free-form metadata); a fixed tree
/// rejects them with [`Error::PathNotFound`].
pub struct ParameterTree {
    root: Node,
    mutable: bool,
}

impl ParameterTree {
    /// Creates a fixed-structure tree. Structure and bindings are final.
    pub fn new(root: Node) -> Self {
        Self {
            root,
            mutable: false,
        }
    }

    /// Creates a free-form tree seeded from a mapping. Unknown keys may be
    /// added at runtime via set.
    pub fn new_mutable(seed: Map<String, Value>) -> Self {
        Self {
            root: Node::from_value(Value::Object(seed)),
            mutable: true,
        }
    }

    /// Resolves `path` and returns the value or rendered subtree.
    ///
    /// Composites render as nested objects, bound leaves through their
    /// getter, action leaves as null. With `with_metadata`, each leaf
    /// renders as an object carrying its value, writeability and type.
    pub fn get(&self, path: &str, with_metadata: bool) -> Result<Value> {
        let segments = split_path(path);
        get_node(&self.root, &segments, with_metadata, path)
    }

    /// Resolves `path` and applies `value` to the node found there.
    pub fn set(&mut self, path: &str, value: Value) -> Result<()> {
        let segments = split_path(path);
        let mutable = self.mutable;
        set_node(&mut self.root, &segments, value, mutable, path)
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn get_node(node: &Node, segments: &[&str], with_metadata: bool, full_path: &str) -> Result<Value> {
    match node {
        Node::SubTree(tree) => {
            let tree = tree.read().unwrap();
            get_node(&tree.root, segments, with_metadata, full_path)
        }
        _ if segments.is_empty() => Ok(render(node, with_metadata)),
        Node::Branch(children) => match children.get(segments[0]) {
            Some(child) => get_node(child, &segments[1..], with_metadata, full_path),
            None => Err(Error::PathNotFound(full_path.to_string())),
        },
        _ => Err(Error::PathNotFound(full_path.to_string())),
    }
}

fn render(node: &Node, with_metadata: bool) -> Value {
    match node {
        Node::Leaf(value) => {
            if with_metadata {
                annotate(value.clone(), true)
            } else {
                value.clone()
            }
        }
        Node::Bound(leaf) => {
            let value = leaf.read();
            if with_metadata {
                annotate(value, leaf.setter.is_some())
            } else {
                value
            }
        }
        Node::Branch(children) => Value::Object(
            children
                .iter()
                .map(|(key, child)| (key.clone(), render(child, with_metadata)))
                .collect(),
        ),
        Node::SubTree(tree) => render(&tree.read().unwrap().root, with_metadata),
    }
}

fn annotate(value: Value, writeable: bool) -> Value {
    let type_name = type_name(&value);
    json!({ "value": value, "writeable": writeable, "type": type_name })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn set_node(
    node: &mut Node,
    segments: &[&str],
    value: Value,
    mutable: bool,
    full_path: &str,
) -> Result<()> {
    match node {
        Node::SubTree(tree) => {
            let mut tree = tree.write().unwrap();
            let mutable = tree.mutable;
            set_node(&mut tree.root, segments, value, mutable, full_path)
        }
        _ if segments.is_empty() => assign(node, value, mutable, full_path),
        Node::Branch(children) => {
            if let Some(child) = children.get_mut(segments[0]) {
                set_node(child, &segments[1..], value, mutable, full_path)
            } else if mutable {
                children.insert(
                    segments[0].to_string(),
                    branch_for_path(&segments[1..], value),
                );
                Ok(())
            } else {
                Err(Error::PathNotFound(full_path.to_string()))
            }
        }
        _ => Err(Error::PathNotFound(full_path.to_string())),
    }
}

/// Builds the chain of branches for a not-yet-existing path in a mutable tree.
fn branch_for_path(segments: &[&str], value: Value) -> Node {
    match segments.split_first() {
        None => Node::from_value(value),
        Some((head, rest)) => {
            let mut children = BTreeMap::new();
            children.insert(head.to_string(), branch_for_path(rest, value));
            Node::Branch(children)
        }
    }
}

fn assign(node: &mut Node, value: Value, mutable: bool, full_path: &str) -> Result<()> {
    match node {
        Node::Leaf(current) => {
            if !mutable {
                if value.is_object() {
                    return Err(Error::TypeMismatch(
                        full_path.to_string(),
                        "mapping supplied for a scalar parameter".to_string(),
                    ));
                }
                if !same_kind(current, &value) {
                    return Err(Error::TypeMismatch(
                        full_path.to_string(),
                        format!("expected {}, got {}", type_name(current), type_name(&value)),
                    ));
                }
                *current = value;
                return Ok(());
            }
        }
        Node::Bound(leaf) => {
            return match &leaf.setter {
                Some(setter) => {
                    setter(value);
                    Ok(())
                }
                None => Err(Error::ReadOnly(full_path.to_string())),
            };
        }
        Node::Branch(children) => {
            let entries = match value {
                Value::Object(map) => map,
                other => {
                    return Err(Error::TypeMismatch(
                        full_path.to_string(),
                        format!("expected a mapping, got {}", type_name(&other)),
                    ))
                }
            };
            for (key, val) in entries {
                if let Some(child) = children.get_mut(&key) {
                    set_node(child, &[], val, mutable, full_path)?;
                } else if mutable {
                    children.insert(key, Node::from_value(val));
                } else {
                    return Err(Error::PathNotFound(join_path(full_path, &key)));
                }
            }
            return Ok(());
        }
        Node::SubTree(tree) => {
            let mut tree = tree.write().unwrap();
            let mutable = tree.mutable;
            return set_node(&mut tree.root, &[], value, mutable, full_path);
        }
    }
    // Free-form leaf: replace unconditionally; a mapping becomes a branch.
    *node = Node::from_value(value);
    Ok(())
}

fn same_kind(current: &Value, incoming: &Value) -> bool {
    use Value::*;
    matches!(
        (current, incoming),
        (Null, Null)
            | (Bool(_), Bool(_))
            | (Number(_), Number(_))
            | (String(_), String(_))
            | (Array(_), Array(_))
    )
}

fn join_path(base: &str, key: &str) -> String {
    let base = base.trim_matches('/');
    if base.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", base, key)
    }
}
