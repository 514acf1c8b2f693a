use std::path::Path;
use std::path::PathBuf;

use anyhow::Result;

use crate::common::nvram::write_file;

/// A named memory resource of an RPK package, bound to one socket of the board.
///
/// Sockets with a backing path are persistent RAM: their contents are written back when the
/// package is closed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpkSocket {
    id: String,
    contents: Vec<u8>,
    backing_path: Option<PathBuf>,
}

impl RpkSocket {
    pub fn new(id: impl Into<String>, contents: Vec<u8>, backing_path: Option<PathBuf>) -> Self {
        Self {
            id: id.into(),
            contents,
            backing_path,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    pub fn is_persistent(&self) -> bool {
        self.backing_path.is_some()
    }

    pub fn backing_path(&self) -> Option<&Path> {
        self.backing_path.as_deref()
    }

    /// Overwrites the contents. The socket keeps its length, extra bytes are dropped.
    pub fn set_contents(&mut self, contents: &[u8]) {
        let length = contents.len().min(self.contents.len());
        self.contents[..length].copy_from_slice(&contents[..length]);
    }

    /// Writes persistent contents to the backing file. Empty sockets are not written.
    pub fn flush(&self) -> Result<()> {
        match &self.backing_path {
            Some(path) if !self.contents.is_empty() => {
                log::debug!(
                    target: "rpk",
                    "Saving {} ({} bytes) to {}",
                    self.id,
                    self.contents.len(),
                    path.display()
                );
                write_file(path, &self.contents)
            }
            _ => Ok(()),
        }
    }
}
