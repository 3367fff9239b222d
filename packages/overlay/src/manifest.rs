use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use modforge_common::FileSystem;

use crate::path::LogicalPath;

/// Manifest file name, stored at the mod root
pub const MANIFEST_FILE: &str = ".modforge-manifest.json";

/// The set of overlay files the mod declares as its own.
///
/// Shadow overrides of base files may legitimately exist unmanifested; a
/// manifested file missing from disk (or vice versa for non-shadow files)
/// is an inconsistency surfaced as a warning, never a load failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    files: BTreeSet<String>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(fs: &dyn FileSystem, mod_root: &Path) -> Result<Self, std::io::Error> {
        let path = mod_root.join(MANIFEST_FILE);
        if !fs.exists(&path) {
            return Ok(Self::new());
        }
        let text = fs.read_to_string(&path)?;
        serde_json::from_str(&text)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }

    pub fn save(&self, fs: &dyn FileSystem, mod_root: &Path) -> Result<(), std::io::Error> {
        let mut text = serde_json::to_string_pretty(self)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        text.push('\n');
        fs.write(&mod_root.join(MANIFEST_FILE), &text)
    }

    pub fn contains(&self, path: &LogicalPath) -> bool {
        self.files.contains(path.as_str())
    }

    pub fn insert(&mut self, path: &LogicalPath) -> bool {
        self.files.insert(path.as_str().to_string())
    }

    pub fn remove(&mut self, path: &LogicalPath) -> bool {
        self.files.remove(path.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = LogicalPath> + '_ {
        self.files.iter().map(|entry| LogicalPath::new(entry))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// One manifest/disk disagreement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestIssue {
    /// Physically present in the overlay tree but not listed
    Unlisted(LogicalPath),
    /// Listed but missing from the overlay tree
    MissingOnDisk(LogicalPath),
}

#[cfg(test)]
mod tests {
    use super::*;
    use modforge_common::MockFileSystem;

    #[test]
    fn test_load_missing_manifest_is_empty() {
        let fs = MockFileSystem::new();
        let manifest = Manifest::load(&fs, Path::new("/mod")).unwrap();
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let fs = MockFileSystem::new();
        let mut manifest = Manifest::new();
        manifest.insert(&LogicalPath::new("entities/bomber.entity"));
        manifest.insert(&LogicalPath::new("entities/ace.entity"));
        manifest.save(&fs, Path::new("/mod")).unwrap();

        let loaded = Manifest::load(&fs, Path::new("/mod")).unwrap();
        assert_eq!(loaded, manifest);
        // entries come back sorted
        let entries: Vec<LogicalPath> = loaded.iter().collect();
        assert_eq!(entries[0], LogicalPath::new("entities/ace.entity"));
    }
}
