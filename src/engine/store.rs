use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use serde_json::{json, Map, Value};
use crate::engine::tree::{BoundLeaf, Node, ParameterTree};
use crate::engine::writer::{FileTarget, MetadataWriter};
use crate::{ParameterAccess, Result};

/// Default target file name used when none is configured.
pub const DEFAULT_FILE_NAME: &str = "test_0001.h5";

/// File name suffixes accepted by the `file` parameter.
const FILE_SUFFIXES: [&str; 2] = [".h5", ".hdf5"];

/// The metadata store: a fixed parameter tree over the target file fields,
/// a free-form `metadata` subtree, and a `write` action leaf that merges
/// the metadata into the target file.
///
/// Tree layout:
/// - `name`: service identifier (string)
/// - `file`: target file name; only `.h5`/`.hdf5` names are accepted
/// - `file_dir`: target directory, unvalidated
/// - `metadata`: free-form nested metadata, growable at runtime
/// - `write`: action leaf triggering persistence
pub struct MetadataStore {
    tree: RwLock<ParameterTree>,
}

impl MetadataStore {
    /// Builds the store with the given target file name and initial
    /// metadata seed. Bindings are established once, here, and never
    /// change for the life of the store.
    pub fn new(file_name: &str, metadata_seed: Map<String, Value>) -> Self {
        let target = Arc::new(RwLock::new(FileTarget::new(file_name)));
        let metadata = Arc::new(RwLock::new(ParameterTree::new_mutable(metadata_seed)));
        let writer = MetadataWriter::new(target.clone(), metadata.clone());

        let mut root = BTreeMap::new();
        root.insert(
            "name".to_string(),
            Node::Leaf(json!("metadata writer")),
        );
        root.insert(
            "file".to_string(),
            Node::Bound(BoundLeaf::new(
                {
                    let target = target.clone();
                    move || json!(target.read().unwrap().file_name)
                },
                {
                    let target = target.clone();
                    // The file need not exist yet; only the suffix is checked.
                    move |value| {
                        if let Some(name) = value.as_str() {
                            if FILE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
                                target.write().unwrap().file_name = name.to_string();
                            }
                        }
                    }
                },
            )),
        );
        root.insert(
            "file_dir".to_string(),
            Node::Bound(BoundLeaf::new(
                {
                    let target = target.clone();
                    move || json!(target.read().unwrap().file_dir)
                },
                {
                    let target = target.clone();
                    move |value| {
                        if let Some(dir) = value.as_str() {
                            target.write().unwrap().file_dir = dir.to_string();
                        }
                    }
                },
            )),
        );
        root.insert("metadata".to_string(), Node::SubTree(metadata));
        root.insert(
            "write".to_string(),
            Node::Bound(BoundLeaf::action(move |_| writer.write())),
        );

        Self {
            tree: RwLock::new(ParameterTree::new(Node::Branch(root))),
        }
    }
}

impl ParameterAccess for MetadataStore {
    fn get(&self, path: &str, with_metadata: bool) -> Result<Value> {
        self.tree.read().unwrap().get(path, with_metadata)
    }

    fn set(&self, path: &str, value: Value) -> Result<()> {
        self.tree.write().unwrap().set(path, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::datafile::DataFile;
    use crate::Error;
    use tempfile::tempdir;

    #[test]
    fn test_initial_tree() {
        let store = MetadataStore::new(DEFAULT_FILE_NAME, Map::new());
        assert_eq!(store.get("file", false).unwrap(), json!("test_0001.h5"));
        assert_eq!(store.get("file_dir", false).unwrap(), json!(""));
        assert_eq!(store.get("metadata", false).unwrap(), json!({}));
        assert_eq!(store.get("write", false).unwrap(), Value::Null);
    }

    #[test]
    fn test_file_name_suffix_validation() {
        let store = MetadataStore::new(DEFAULT_FILE_NAME, Map::new());

        store.set("file", json!("run_0002.hdf5")).unwrap();
        assert_eq!(store.get("file", false).unwrap(), json!("run_0002.hdf5"));

        // A rejected name leaves the prior one untouched, without erroring.
        store.set("file", json!("foo.txt")).unwrap();
        assert_eq!(store.get("file", false).unwrap(), json!("run_0002.hdf5"));
    }

    #[test]
    fn test_file_dir_is_unvalidated() {
        let store = MetadataStore::new(DEFAULT_FILE_NAME, Map::new());
        store.set("file_dir", json!("/does/not/exist/yet")).unwrap();
        assert_eq!(store.get("file_dir", false).unwrap(), json!("/does/not/exist/yet"));
    }

    #[test]
    fn test_metadata_grows_at_runtime() {
        let store = MetadataStore::new(DEFAULT_FILE_NAME, Map::new());
        store
            .set("metadata", json!({ "x": 5, "y": { "z": "ok" } }))
            .unwrap();
        store.set("metadata/y/z", json!("updated")).unwrap();

        assert_eq!(
            store.get("metadata", false).unwrap(),
            json!({ "x": 5, "y": { "z": "updated" } })
        );
    }

    #[test]
    fn test_metadata_rejects_scalar() {
        let store = MetadataStore::new(DEFAULT_FILE_NAME, Map::new());
        let res = store.set("metadata", json!(5));
        assert!(matches!(res, Err(Error::TypeMismatch(_, _))));
    }

    #[test]
    fn test_fixed_structure_rejects_unknown_key() {
        let store = MetadataStore::new(DEFAULT_FILE_NAME, Map::new());
        let res = store.set("not_a_parameter", json!(1));
        assert!(matches!(res, Err(Error::PathNotFound(_))));
    }

    #[test]
    fn test_write_action_persists_metadata() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_FILE_NAME);
        DataFile::create(&path).unwrap().close().unwrap();

        let seed = json!({ "a": { "b": 1 } }).as_object().cloned().unwrap();
        let store = MetadataStore::new(DEFAULT_FILE_NAME, seed);
        store
            .set("file_dir", json!(dir.path().to_string_lossy()))
            .unwrap();
        store.set("write", Value::Null).unwrap();

        let file = DataFile::open(&path).unwrap();
        assert_eq!(file.root()["metadata"]["a"]["b"], json!(1));
    }

    #[test]
    fn test_write_failure_is_silent() {
        let dir = tempdir().unwrap();
        let store = MetadataStore::new(DEFAULT_FILE_NAME, Map::new());
        store
            .set("file_dir", json!(dir.path().to_string_lossy()))
            .unwrap();
        // Target file was never created: the trigger still succeeds.
        store.set("write", Value::Null).unwrap();
    }
}
