// Virtual File System (VFS)
// The hierarchical tree every machine instruction and console verb works on.
// Ambient OS access is strictly forbidden here.

use serde::Serialize;
use thiserror::Error;

mod memory;

pub use memory::MemoryFs;

/// Operations against the directory addressed by the working path.
pub trait Vfs {
    fn mkdir(&mut self, name: &str) -> Result<(), VfsError>;
    /// `".."` pops one segment and never fails, even at the root.
    fn cd(&mut self, name: &str) -> Result<(), VfsError>;
    fn ls(&self) -> Result<Vec<DirEntry>, VfsError>;
    /// Creates the file or overwrites it in place.
    fn write(&mut self, name: &str, content: &str) -> Result<(), VfsError>;
    fn read(&self, name: &str) -> Result<String, VfsError>;
    fn rm(&mut self, name: &str) -> Result<(), VfsError>;
    /// Segments from the root to the current directory.
    fn cwd(&self) -> &[String];

    fn pwd(&self) -> String {
        format!("/{}", self.cwd().join("/"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VfsError {
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("no such file or directory: {0}")]
    NotFound(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("is a directory: {0}")]
    IsADirectory(String),
    #[error("invalid name: {0:?}")]
    InvalidName(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Directory,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub name: String,
    pub kind: NodeKind,
}

impl std::fmt::Display for DirEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            NodeKind::Directory => write!(f, "[DIR] {}", self.name),
            NodeKind::File => write!(f, "{}", self.name),
        }
    }
}
