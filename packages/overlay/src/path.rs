use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// An overlay-relative file path, `/`-separated regardless of platform.
///
/// The same logical path names at most one file in each tree; resolution
/// picks the overlay copy when both exist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalPath(String);

impl LogicalPath {
    pub fn new(path: impl AsRef<str>) -> Self {
        let normalized = path
            .as_ref()
            .replace('\\', "/")
            .trim_start_matches('/')
            .to_string();
        Self(normalized)
    }

    /// Build from a `walk` result (a relative physical path)
    pub fn from_relative(path: &Path) -> Self {
        Self::new(path.to_string_lossy())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final component, e.g. `fighter.entity`
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Final component without its extension, e.g. `fighter`
    pub fn file_stem(&self) -> &str {
        let name = self.file_name();
        name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name)
    }

    /// Containing directory, `""` at the top level
    pub fn parent_dir(&self) -> &str {
        self.0.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }

    /// Sibling path with a different file name
    pub fn with_file_name(&self, name: &str) -> LogicalPath {
        let dir = self.parent_dir();
        if dir.is_empty() {
            LogicalPath::new(name)
        } else {
            LogicalPath::new(format!("{}/{}", dir, name))
        }
    }

    pub fn starts_with_dir(&self, dir: &str) -> bool {
        self.0.starts_with(dir) && self.0[dir.len()..].starts_with('/')
    }

    /// Physical location under the given tree root
    pub fn to_physical(&self, root: &Path) -> PathBuf {
        let mut physical = root.to_path_buf();
        for component in self.0.split('/') {
            physical.push(component);
        }
        physical
    }
}

impl fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LogicalPath {
    fn from(path: &str) -> Self {
        LogicalPath::new(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        assert_eq!(
            LogicalPath::new("\\entities\\fighter.entity").as_str(),
            "entities/fighter.entity"
        );
        assert_eq!(LogicalPath::new("/a/b"), LogicalPath::new("a/b"));
    }

    #[test]
    fn test_components() {
        let path = LogicalPath::new("entities/fighter.entity");
        assert_eq!(path.file_name(), "fighter.entity");
        assert_eq!(path.file_stem(), "fighter");
        assert_eq!(path.parent_dir(), "entities");
        assert!(path.starts_with_dir("entities"));
        assert!(!path.starts_with_dir("entit"));
        assert_eq!(
            path.with_file_name("bomber.entity").as_str(),
            "entities/bomber.entity"
        );
    }

    #[test]
    fn test_to_physical() {
        let path = LogicalPath::new("entities/fighter.entity");
        assert_eq!(
            path.to_physical(Path::new("/base")),
            PathBuf::from("/base/entities/fighter.entity")
        );
    }
}
