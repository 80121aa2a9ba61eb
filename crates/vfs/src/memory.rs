use crate::{DirEntry, NodeKind, Vfs, VfsError};

/// In-memory tree. Each directory owns its children, so removing an entry
/// drops the whole subtree with it.
#[derive(Debug, Default)]
pub struct MemoryFs {
    root: Directory,
    cwd: Vec<String>,
}

#[derive(Debug)]
enum Node {
    Dir(Directory),
    File(String),
}

// Vec keeps insertion order for `ls`; directories stay small enough that a
// linear scan beats hashing.
#[derive(Debug, Default)]
struct Directory {
    entries: Vec<(String, Node)>,
}

impl Directory {
    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n == name)
    }

    fn get(&self, name: &str) -> Option<&Node> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, node)| node)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, node)| node)
    }
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> Result<&Directory, VfsError> {
        let mut dir = &self.root;
        for segment in &self.cwd {
            dir = match dir.get(segment) {
                Some(Node::Dir(child)) => child,
                Some(Node::File(_)) => return Err(VfsError::NotADirectory(segment.clone())),
                None => return Err(VfsError::NotFound(segment.clone())),
            };
        }
        Ok(dir)
    }

    fn current_mut(&mut self) -> Result<&mut Directory, VfsError> {
        let mut dir = &mut self.root;
        for segment in &self.cwd {
            dir = match dir.get_mut(segment) {
                Some(Node::Dir(child)) => child,
                Some(Node::File(_)) => return Err(VfsError::NotADirectory(segment.clone())),
                None => return Err(VfsError::NotFound(segment.clone())),
            };
        }
        Ok(dir)
    }
}

fn check_name(name: &str) -> Result<(), VfsError> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(VfsError::InvalidName(name.to_string()));
    }
    Ok(())
}

impl Vfs for MemoryFs {
    fn mkdir(&mut self, name: &str) -> Result<(), VfsError> {
        check_name(name)?;
        let dir = self.current_mut()?;
        if dir.position(name).is_some() {
            return Err(VfsError::AlreadyExists(name.to_string()));
        }
        dir.entries.push((name.to_string(), Node::Dir(Directory::default())));
        Ok(())
    }

    fn cd(&mut self, name: &str) -> Result<(), VfsError> {
        match name {
            ".." => {
                self.cwd.pop();
                return Ok(());
            }
            "." => return Ok(()),
            _ => check_name(name)?,
        }
        match self.current()?.get(name) {
            Some(Node::Dir(_)) => {
                self.cwd.push(name.to_string());
                Ok(())
            }
            Some(Node::File(_)) => Err(VfsError::NotADirectory(name.to_string())),
            None => Err(VfsError::NotFound(name.to_string())),
        }
    }

    fn ls(&self) -> Result<Vec<DirEntry>, VfsError> {
        let dir = self.current()?;
        Ok(dir
            .entries
            .iter()
            .map(|(name, node)| DirEntry {
                name: name.clone(),
                kind: match node {
                    Node::Dir(_) => NodeKind::Directory,
                    Node::File(_) => NodeKind::File,
                },
            })
            .collect())
    }

    fn write(&mut self, name: &str, content: &str) -> Result<(), VfsError> {
        check_name(name)?;
        let dir = self.current_mut()?;
        let node = Node::File(content.to_string());
        match dir.position(name) {
            Some(i) => dir.entries[i].1 = node,
            None => dir.entries.push((name.to_string(), node)),
        }
        Ok(())
    }

    fn read(&self, name: &str) -> Result<String, VfsError> {
        match self.current()?.get(name) {
            Some(Node::File(content)) => Ok(content.clone()),
            Some(Node::Dir(_)) => Err(VfsError::IsADirectory(name.to_string())),
            None => Err(VfsError::NotFound(name.to_string())),
        }
    }

    fn rm(&mut self, name: &str) -> Result<(), VfsError> {
        let dir = self.current_mut()?;
        let i = dir
            .position(name)
            .ok_or_else(|| VfsError::NotFound(name.to_string()))?;
        // Dropping the node frees a removed directory's whole subtree.
        drop(dir.entries.remove(i));
        Ok(())
    }

    fn cwd(&self) -> &[String] {
        &self.cwd
    }
}
