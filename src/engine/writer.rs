use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use serde_json::{Map, Value};
use log::{debug, error};
use crate::engine::datafile::{DataFile, Group};
use crate::engine::tree::ParameterTree;
use crate::Result;

/// The location of the target data file, shared between the store's bound
/// leaves and the writer.
pub struct FileTarget {
    pub file_name: String,
    pub file_dir: String,
}

impl FileTarget {
    pub fn new(file_name: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            file_dir: String::new(),
        }
    }

    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.file_dir).join(&self.file_name)
    }
}

/// Merges the metadata subtree into the target file's group hierarchy.
///
/// The merge is idempotent. Groups are created on first use and reused
/// afterwards, and attributes of the same name are overwritten. Content
/// outside the `metadata` group is left untouched.
pub struct MetadataWriter {
    target: Arc<RwLock<FileTarget>>,
    metadata: Arc<RwLock<ParameterTree>>,
}

impl MetadataWriter {
    pub fn new(target: Arc<RwLock<FileTarget>>, metadata: Arc<RwLock<ParameterTree>>) -> Self {
        Self { target, metadata }
    }

    /// Writes the current metadata to the target file.
    ///
    /// Best-effort: any failure is logged and contained, so the caller
    /// always returns normally. A later write starts again from scratch.
    pub fn write(&self) {
        let file_path = self.target.read().unwrap().path();
        debug!("opening metadata target {}", file_path.display());

        let mut file = match DataFile::open(&file_path) {
            Ok(file) => file,
            Err(err) => {
                error!("failed to open {}: {}", file_path.display(), err);
                return;
            }
        };

        if let Err(err) = self.merge_into(&mut file) {
            error!("failed to merge metadata into {}: {}", file_path.display(), err);
            return;
        }

        if let Err(err) = file.close() {
            error!("failed to flush {}: {}", file_path.display(), err);
        }
    }

    fn merge_into(&self, file: &mut DataFile) -> Result<()> {
        let snapshot = self.metadata.read().unwrap().get("", false)?;
        let entries = snapshot.as_object().cloned().unwrap_or_default();

        let mut root = file.root_group();
        let mut group = root.create_or_get_group("metadata")?;
        merge(&entries, &mut group)
    }
}

/// Recursively merges a metadata mapping into a group: nested mappings
/// become (or reuse) subgroups, scalars become attributes.
fn merge(metadata: &Map<String, Value>, group: &mut Group<'_>) -> Result<()> {
    for (key, value) in metadata {
        match value {
            Value::Object(nested) => {
                debug!("creating metadata subgroup {}", key);
                let mut subgroup = group.create_or_get_group(key)?;
                merge(nested, &mut subgroup)?;
            }
            scalar => {
                debug!("writing metadata attribute {}", key);
                group.set_attribute(key, scalar.clone());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn writer_for(dir: &std::path::Path, seed: Value) -> MetadataWriter {
        let target = Arc::new(RwLock::new(FileTarget::new("test_0001.h5")));
        target.write().unwrap().file_dir = dir.to_string_lossy().to_string();

        let seed = seed.as_object().cloned().unwrap_or_default();
        let metadata = Arc::new(RwLock::new(ParameterTree::new_mutable(seed)));
        MetadataWriter::new(target, metadata)
    }

    fn read_back(dir: &std::path::Path) -> Value {
        let file = DataFile::open(dir.join("test_0001.h5")).unwrap();
        Value::Object(file.root().clone())
    }

    #[test]
    fn test_metadata_roundtrip() {
        let dir = tempdir().unwrap();
        DataFile::create(dir.path().join("test_0001.h5")).unwrap().close().unwrap();

        let writer = writer_for(dir.path(), json!({ "a": { "b": 1 } }));
        writer.write();

        assert_eq!(read_back(dir.path())["metadata"]["a"]["b"], json!(1));
    }

    #[test]
    fn test_write_is_idempotent() {
        let dir = tempdir().unwrap();
        DataFile::create(dir.path().join("test_0001.h5")).unwrap().close().unwrap();

        let writer = writer_for(dir.path(), json!({ "x": 5, "y": { "z": "ok" } }));
        writer.write();
        let first = read_back(dir.path());
        writer.write();
        let second = read_back(dir.path());

        assert_eq!(first, second);
        assert_eq!(second["metadata"], json!({ "x": 5, "y": { "z": "ok" } }));
    }

    #[test]
    fn test_merge_preserves_unrelated_groups() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test_0001.h5");

        let mut file = DataFile::create(&path).unwrap();
        let mut root = file.root_group();
        root.create_or_get_group("primary_data")
            .unwrap()
            .set_attribute("frames", json!(2048));
        file.close().unwrap();

        let writer = writer_for(dir.path(), json!({ "sample": "protein" }));
        writer.write();

        let contents = read_back(dir.path());
        assert_eq!(contents["primary_data"]["frames"], json!(2048));
        assert_eq!(contents["metadata"]["sample"], json!("protein"));
    }

    #[test]
    fn test_rewrite_updates_in_place() {
        let dir = tempdir().unwrap();
        DataFile::create(dir.path().join("test_0001.h5")).unwrap().close().unwrap();

        let target = Arc::new(RwLock::new(FileTarget::new("test_0001.h5")));
        target.write().unwrap().file_dir = dir.path().to_string_lossy().to_string();
        let metadata = Arc::new(RwLock::new(ParameterTree::new_mutable(
            json!({ "x": 5, "y": { "z": "ok" } }).as_object().cloned().unwrap(),
        )));
        let writer = MetadataWriter::new(target, metadata.clone());

        writer.write();
        metadata.write().unwrap().set("y/z", json!("updated")).unwrap();
        writer.write();

        let contents = read_back(dir.path());
        assert_eq!(contents["metadata"]["y"], json!({ "z": "updated" }));
    }

    #[test]
    fn test_missing_file_is_contained() {
        let dir = tempdir().unwrap();
        // No data file was ever created; the write is logged and dropped.
        let writer = writer_for(dir.path(), json!({ "a": 1 }));
        writer.write();

        assert!(!dir.path().join("test_0001.h5").exists());
    }
}
