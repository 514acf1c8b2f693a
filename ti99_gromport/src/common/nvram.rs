//! Storage of battery backed and persistent cartridge memory.
//!
//! Files are raw memory dumps stored in `<directory>/<system_name>/<file>`.
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NvramStore {
    directory: PathBuf,
    system_name: String,
}

impl NvramStore {
    pub fn new(directory: impl Into<PathBuf>, system_name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            system_name: system_name.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn system_name(&self) -> &str {
        &self.system_name
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.directory.join(&self.system_name).join(file)
    }

    /// Returns `length` bytes of `file`. Short files are padded with zeros, a missing file
    /// yields `None`.
    pub fn load(&self, file: &str, length: usize) -> Result<Option<Vec<u8>>> {
        let path = self.path(file);
        let mut contents = match std::fs::read(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("Cannot read {}", path.display()))
            }
        };
        contents.resize(length, 0);
        Ok(Some(contents))
    }

    /// Like `load`, but a missing file is replaced by `length` bytes of `fill`.
    pub fn load_or_fill(&self, file: &str, length: usize, fill: u8) -> Result<Vec<u8>> {
        Ok(self
            .load(file, length)?
            .unwrap_or_else(|| vec![fill; length]))
    }

    pub fn save(&self, file: &str, contents: &[u8]) -> Result<()> {
        write_file(&self.path(file), contents)
    }
}

/// Writes `contents` to `path`, creating parent directories as needed.
pub fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create directory {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("Cannot write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_and_padded() {
        let dir = tempfile::tempdir().unwrap();
        let store = NvramStore::new(dir.path(), "ti99_4a");
        assert_eq!(store.load("missing.nv", 4).unwrap(), None);
        assert_eq!(store.load_or_fill("missing.nv", 2, 0xFF).unwrap(), vec![0xFF, 0xFF]);

        store.save("short.nv", &[1, 2]).unwrap();
        assert!(dir.path().join("ti99_4a").join("short.nv").exists());
        assert_eq!(store.load("short.nv", 4).unwrap(), Some(vec![1, 2, 0, 0]));
        assert_eq!(store.load("short.nv", 1).unwrap(), Some(vec![1]));
    }
}
