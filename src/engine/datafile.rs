use std::fs;
use std::path::{Path, PathBuf};
use serde_json::{Map, Value};
use crate::{Error, Result};

/// A structured data file: a hierarchy of named groups, each carrying
/// scalar attributes and nested subgroups.
///
/// The document is held in memory between [`DataFile::open`] and
/// [`DataFile::close`]; `close` serializes it back to disk with an atomic
/// "write-then-rename" so a crash mid-flush never corrupts the file.
pub struct DataFile {
    path: PathBuf,
    root: Map<String, Value>,
}

impl DataFile {
    /// Opens an existing file for read-write.
    ///
    /// Fails if the file does not exist; creating the file is the
    /// responsibility of whoever owns its primary data.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let content = fs::read(&path)?;
        let root = if content.iter().all(|b| b.is_ascii_whitespace()) {
            Map::new()
        } else {
            serde_json::from_slice(&content)?
        };
        Ok(Self { path, root })
    }

    /// Creates a new empty file, truncating any existing content.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::write(&path, b"{}")?;
        Ok(Self {
            path,
            root: Map::new(),
        })
    }

    /// The root group of the document.
    pub fn root_group(&mut self) -> Group<'_> {
        Group(&mut self.root)
    }

    /// Read-only view of the document root.
    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    /// Serializes the document and atomically replaces the on-disk file.
    pub fn close(self) -> Result<()> {
        let temp_path = self.path.with_extension("tmp");
        let bytes = serde_json::to_vec_pretty(&self.root)?;
        fs::write(&temp_path, bytes)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

/// A named container inside a [`DataFile`], holding scalar attributes and
/// nested subgroups.
pub struct Group<'a>(&'a mut Map<String, Value>);

impl<'a> Group<'a> {
    /// Creates the named subgroup, or fetches it if it already exists.
    ///
    /// Idempotent from the caller's view; fails only when the name is
    /// already taken by a scalar attribute.
    pub fn create_or_get_group(&mut self, name: &str) -> Result<Group<'_>> {
        let entry = self
            .0
            .entry(name.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        match entry {
            Value::Object(map) => Ok(Group(map)),
            _ => Err(Error::Internal(format!(
                "'{}' already exists as an attribute",
                name
            ))),
        }
    }

    /// Attaches a scalar attribute, overwriting any prior value of the name.
    pub fn set_attribute(&mut self, name: &str, value: Value) {
        self.0.insert(name.to_string(), value);
    }

    /// Returns the named attribute, if present.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_object())
    }

    /// Returns the named subgroup, if present.
    pub fn group(&mut self, name: &str) -> Option<Group<'_>> {
        self.0.get_mut(name).and_then(|v| v.as_object_mut()).map(Group)
    }

    /// The names of all attributes and subgroups in this group.
    pub fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_open_missing_file_fails() {
        let dir = tempdir().unwrap();
        let res = DataFile::open(dir.path().join("absent.h5"));
        assert!(matches!(res, Err(Error::Io(_))));
    }

    #[test]
    fn test_create_open_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.h5");

        let mut file = DataFile::create(&path).unwrap();
        let mut root = file.root_group();
        let mut group = root.create_or_get_group("scan").unwrap();
        group.set_attribute("points", json!(100));
        file.close().unwrap();

        let file = DataFile::open(&path).unwrap();
        assert_eq!(file.root()["scan"]["points"], json!(100));
    }

    #[test]
    fn test_atomic_rename() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.h5");

        DataFile::create(&path).unwrap().close().unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("run.tmp").exists());
    }

    #[test]
    fn test_create_or_get_group_reuses() {
        let dir = tempdir().unwrap();
        let mut file = DataFile::create(dir.path().join("run.h5")).unwrap();

        let mut root = file.root_group();
        root.create_or_get_group("scan")
            .unwrap()
            .set_attribute("points", json!(100));
        // Second create must fetch the same group, not replace it.
        let mut again = root.create_or_get_group("scan").unwrap();
        again.set_attribute("dwell", json!(0.5));

        assert_eq!(again.attribute("points"), Some(&json!(100)));
        assert_eq!(again.attribute("dwell"), Some(&json!(0.5)));
    }

    #[test]
    fn test_group_name_taken_by_attribute() {
        let dir = tempdir().unwrap();
        let mut file = DataFile::create(dir.path().join("run.h5")).unwrap();

        let mut root = file.root_group();
        root.set_attribute("scan", json!("not a group"));
        let res = root.create_or_get_group("scan");
        assert!(matches!(res, Err(Error::Internal(_))));
    }

    #[test]
    fn test_attribute_overwrite() {
        let dir = tempdir().unwrap();
        let mut file = DataFile::create(dir.path().join("run.h5")).unwrap();

        let mut root = file.root_group();
        root.set_attribute("operator", json!("alice"));
        root.set_attribute("operator", json!("bob"));
        assert_eq!(root.attribute("operator"), Some(&json!("bob")));
        assert_eq!(root.keys().len(), 1);
    }
}
