use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use modforge_common::{FileSystem, RealFileSystem};

use crate::category::DataCategory;
use crate::manifest::{Manifest, ManifestIssue, MANIFEST_FILE};
use crate::path::LogicalPath;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("'{path}' exists in neither the base dataset nor the overlay")]
    NotFound { path: LogicalPath },

    #[error("'{path}' already exists in the overlay")]
    NameCollision { path: LogicalPath },

    #[error("io error on '{path}': {source}")]
    Io {
        path: LogicalPath,
        source: std::io::Error,
    },

    #[error("failed to read manifest: {0}")]
    Manifest(std::io::Error),
}

/// Which tree a resolved file came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Base,
    Overlay,
}

/// Result of resolving one logical path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub physical: PathBuf,
    pub origin: Origin,
}

/// Raw text of both layers of one logical path
#[derive(Debug, Clone, Default)]
pub struct LayeredText {
    pub base: Option<String>,
    pub overlay: Option<String>,
}

/// Read side of the merged base/overlay namespace, plus the tracked write
/// operations (`copy_from_base`, overlay writes) that maintain the manifest.
///
/// Read methods take `&self` and may be shared across every open document
/// of a session; writes require `&mut self` and are serialized by the
/// single-writer session that owns the resolver.
pub struct OverlayResolver {
    base_root: PathBuf,
    mod_root: PathBuf,
    manifest: Manifest,
    fs: Box<dyn FileSystem>,
}

impl OverlayResolver {
    pub fn open(base_root: impl Into<PathBuf>, mod_root: impl Into<PathBuf>) -> Result<Self, OverlayError> {
        Self::with_filesystem(base_root, mod_root, Box::new(RealFileSystem))
    }

    pub fn with_filesystem(
        base_root: impl Into<PathBuf>,
        mod_root: impl Into<PathBuf>,
        fs: Box<dyn FileSystem>,
    ) -> Result<Self, OverlayError> {
        let base_root = base_root.into();
        let mod_root = mod_root.into();
        let manifest = Manifest::load(fs.as_ref(), &mod_root).map_err(OverlayError::Manifest)?;
        debug!(
            base = %base_root.display(),
            overlay = %mod_root.display(),
            manifested = manifest.len(),
            "overlay resolver opened"
        );
        Ok(Self {
            base_root,
            mod_root,
            manifest,
            fs,
        })
    }

    pub fn base_root(&self) -> &Path {
        &self.base_root
    }

    pub fn mod_root(&self) -> &Path {
        &self.mod_root
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    fn base_physical(&self, path: &LogicalPath) -> PathBuf {
        path.to_physical(&self.base_root)
    }

    fn overlay_physical(&self, path: &LogicalPath) -> PathBuf {
        path.to_physical(&self.mod_root)
    }

    /// Resolve a logical path to its effective physical file.
    /// The overlay copy shadows the base copy.
    pub fn resolve(&self, path: &LogicalPath) -> Result<Resolved, OverlayError> {
        let overlay = self.overlay_physical(path);
        if self.fs.exists(&overlay) {
            return Ok(Resolved {
                physical: overlay,
                origin: Origin::Overlay,
            });
        }
        let base = self.base_physical(path);
        if self.fs.exists(&base) {
            return Ok(Resolved {
                physical: base,
                origin: Origin::Base,
            });
        }
        Err(OverlayError::NotFound { path: path.clone() })
    }

    /// Raw text of both layers; `NotFound` when neither tree has the path.
    pub fn read_layers(&self, path: &LogicalPath) -> Result<LayeredText, OverlayError> {
        let read = |physical: PathBuf| -> Result<Option<String>, OverlayError> {
            if self.fs.exists(&physical) {
                self.fs
                    .read_to_string(&physical)
                    .map(Some)
                    .map_err(|source| OverlayError::Io {
                        path: path.clone(),
                        source,
                    })
            } else {
                Ok(None)
            }
        };

        let layers = LayeredText {
            base: read(self.base_physical(path))?,
            overlay: read(self.overlay_physical(path))?,
        };
        if layers.base.is_none() && layers.overlay.is_none() {
            return Err(OverlayError::NotFound { path: path.clone() });
        }
        Ok(layers)
    }

    /// Effective text of a logical path (overlay copy wins)
    pub fn read(&self, path: &LogicalPath) -> Result<String, OverlayError> {
        let layers = self.read_layers(path)?;
        Ok(layers.overlay.or(layers.base).expect("read_layers returned a layer"))
    }

    /// All logical paths of one data category, across both trees,
    /// deduplicated and sorted.
    pub fn list(&self, category: DataCategory) -> Result<Vec<LogicalPath>, OverlayError> {
        let dir = category.dir();
        let mut paths = Vec::new();
        for root in [&self.base_root, &self.mod_root] {
            let category_root = root.join(dir);
            let files = self
                .fs
                .walk(&category_root)
                .map_err(|source| OverlayError::Io {
                    path: LogicalPath::new(dir),
                    source,
                })?;
            for relative in files {
                paths.push(LogicalPath::new(format!(
                    "{}/{}",
                    dir,
                    LogicalPath::from_relative(&relative)
                )));
            }
        }
        paths.sort();
        paths.dedup();
        Ok(paths)
    }

    /// Copy a file into the overlay.
    ///
    /// Without a rename the copy shadows the base file under the identical
    /// name; `add_to_manifest` controls registration. With a rename a new
    /// overlay file is created and always registered; a name already taken
    /// in the overlay is a `NameCollision`.
    pub fn copy_from_base(
        &mut self,
        path: &LogicalPath,
        new_name: Option<&str>,
        add_to_manifest: bool,
    ) -> Result<LogicalPath, OverlayError> {
        let contents = self.read(path)?;

        let target = match new_name {
            None => path.clone(),
            Some(name) => {
                let target = path.with_file_name(name);
                if self.fs.exists(&self.overlay_physical(&target)) {
                    return Err(OverlayError::NameCollision { path: target });
                }
                target
            }
        };

        self.fs
            .write(&self.overlay_physical(&target), &contents)
            .map_err(|source| OverlayError::Io {
                path: target.clone(),
                source,
            })?;

        if add_to_manifest || new_name.is_some() {
            self.manifest.insert(&target);
            self.save_manifest()?;
        }

        debug!(source = %path, target = %target, manifested = add_to_manifest || new_name.is_some(), "copied into overlay");
        Ok(target)
    }

    /// Write overlay file contents (the document save path)
    pub fn write_overlay(&mut self, path: &LogicalPath, contents: &str) -> Result<(), OverlayError> {
        self.fs
            .write(&self.overlay_physical(path), contents)
            .map_err(|source| OverlayError::Io {
                path: path.clone(),
                source,
            })
    }

    /// Delete the overlay copy of a path, letting the base copy show
    /// through again, and drop any manifest entry for it.
    pub fn remove_overlay_file(&mut self, path: &LogicalPath) -> Result<(), OverlayError> {
        let physical = self.overlay_physical(path);
        if self.fs.exists(&physical) {
            self.fs
                .remove_file(&physical)
                .map_err(|source| OverlayError::Io {
                    path: path.clone(),
                    source,
                })?;
        }
        if self.manifest.remove(path) {
            self.save_manifest()?;
        }
        Ok(())
    }

    pub fn overlay_exists(&self, path: &LogicalPath) -> bool {
        self.fs.exists(&self.overlay_physical(path))
    }

    /// Compare the manifest against the overlay tree. Disagreements are
    /// warnings for the caller to surface, never load failures.
    pub fn verify_manifest(&self) -> Result<Vec<ManifestIssue>, OverlayError> {
        let mut issues = Vec::new();

        let on_disk = self
            .fs
            .walk(&self.mod_root)
            .map_err(|source| OverlayError::Io {
                path: LogicalPath::new(""),
                source,
            })?;
        let on_disk: Vec<LogicalPath> = on_disk
            .iter()
            .map(|relative| LogicalPath::from_relative(relative))
            .filter(|path| path.as_str() != MANIFEST_FILE)
            .collect();

        for path in &on_disk {
            // Shadow overrides of base files are legitimately unmanifested.
            if !self.manifest.contains(path) && !self.fs.exists(&self.base_physical(path)) {
                warn!(path = %path, "overlay file not listed in manifest");
                issues.push(ManifestIssue::Unlisted(path.clone()));
            }
        }
        for path in self.manifest.iter() {
            if !on_disk.contains(&path) {
                warn!(path = %path, "manifested file missing on disk");
                issues.push(ManifestIssue::MissingOnDisk(path));
            }
        }
        Ok(issues)
    }

    fn save_manifest(&self) -> Result<(), OverlayError> {
        self.manifest
            .save(self.fs.as_ref(), &self.mod_root)
            .map_err(OverlayError::Manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modforge_common::MockFileSystem;

    fn resolver() -> OverlayResolver {
        let fs = MockFileSystem::new();
        fs.add_file("/base/entities/fighter.entity", r#"{"hull": 100}"#);
        fs.add_file("/base/entities/cruiser.entity", r#"{"hull": 800}"#);
        fs.add_file("/mod/entities/fighter.entity", r#"{"hull": 120}"#);
        OverlayResolver::with_filesystem("/base", "/mod", Box::new(fs)).unwrap()
    }

    #[test]
    fn test_overlay_shadows_base() {
        let resolver = resolver();
        let resolved = resolver
            .resolve(&LogicalPath::new("entities/fighter.entity"))
            .unwrap();
        assert_eq!(resolved.origin, Origin::Overlay);

        let resolved = resolver
            .resolve(&LogicalPath::new("entities/cruiser.entity"))
            .unwrap();
        assert_eq!(resolved.origin, Origin::Base);
    }

    #[test]
    fn test_missing_everywhere_is_not_found() {
        let resolver = resolver();
        let err = resolver
            .resolve(&LogicalPath::new("entities/ghost.entity"))
            .unwrap_err();
        assert!(matches!(err, OverlayError::NotFound { .. }));
    }

    #[test]
    fn test_read_layers() {
        let resolver = resolver();
        let layers = resolver
            .read_layers(&LogicalPath::new("entities/fighter.entity"))
            .unwrap();
        assert_eq!(layers.base.as_deref(), Some(r#"{"hull": 100}"#));
        assert_eq!(layers.overlay.as_deref(), Some(r#"{"hull": 120}"#));

        let layers = resolver
            .read_layers(&LogicalPath::new("entities/cruiser.entity"))
            .unwrap();
        assert!(layers.overlay.is_none());
    }

    #[test]
    fn test_list_unions_both_trees() {
        let resolver = resolver();
        let listed = resolver.list(DataCategory::Entities).unwrap();
        assert_eq!(
            listed,
            vec![
                LogicalPath::new("entities/cruiser.entity"),
                LogicalPath::new("entities/fighter.entity"),
            ]
        );
    }

    #[test]
    fn test_shadow_copy_stays_unmanifested() {
        let mut resolver = resolver();
        let target = resolver
            .copy_from_base(&LogicalPath::new("entities/cruiser.entity"), None, false)
            .unwrap();
        assert_eq!(target, LogicalPath::new("entities/cruiser.entity"));
        assert!(resolver.overlay_exists(&target));
        assert!(!resolver.manifest().contains(&target));
    }

    #[test]
    fn test_renamed_copy_is_manifested_and_base_untouched() {
        let mut resolver = resolver();
        let target = resolver
            .copy_from_base(
                &LogicalPath::new("entities/cruiser.entity"),
                Some("heavy_cruiser.entity"),
                true,
            )
            .unwrap();
        assert_eq!(target, LogicalPath::new("entities/heavy_cruiser.entity"));
        assert!(resolver.manifest().contains(&target));
        // original base copy still resolves from the base tree
        let original = resolver
            .resolve(&LogicalPath::new("entities/cruiser.entity"))
            .unwrap();
        assert_eq!(original.origin, Origin::Base);
    }

    #[test]
    fn test_rename_collision() {
        let mut resolver = resolver();
        let err = resolver
            .copy_from_base(
                &LogicalPath::new("entities/cruiser.entity"),
                Some("fighter.entity"),
                true,
            )
            .unwrap_err();
        assert!(matches!(err, OverlayError::NameCollision { .. }));
    }

    #[test]
    fn test_verify_manifest_reports_both_directions() {
        let fs = MockFileSystem::new();
        fs.add_file("/base/entities/fighter.entity", "{}");
        // shadow override: unmanifested but fine
        fs.add_file("/mod/entities/fighter.entity", "{}");
        // new file, never manifested
        fs.add_file("/mod/entities/rogue.entity", "{}");
        fs.add_file(
            "/mod/.modforge-manifest.json",
            r#"{"files": ["entities/lost.entity"]}"#,
        );

        let resolver = OverlayResolver::with_filesystem("/base", "/mod", Box::new(fs)).unwrap();
        let issues = resolver.verify_manifest().unwrap();
        assert!(issues.contains(&ManifestIssue::Unlisted(LogicalPath::new(
            "entities/rogue.entity"
        ))));
        assert!(issues.contains(&ManifestIssue::MissingOnDisk(LogicalPath::new(
            "entities/lost.entity"
        ))));
        assert_eq!(issues.len(), 2);
    }
}
