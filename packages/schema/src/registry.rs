use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use modforge_common::FileSystem;

use crate::node::SchemaNode;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("no schema registered for kind '{kind}'")]
    SchemaMissing { kind: String },

    #[error("failed to read schema file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid schema file {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

/// All schema definitions for one session, loaded once and read-only for
/// the process lifetime. Safe to share across open documents.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, SchemaNode>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` schema in a directory; the file stem names the
    /// entity kind it describes (`unit.json` describes kind `unit`).
    pub fn load_dir(fs: &dyn FileSystem, schema_root: &Path) -> Result<Self, SchemaError> {
        let mut schemas = HashMap::new();

        let files = fs.walk(schema_root).map_err(|source| SchemaError::Io {
            path: schema_root.to_path_buf(),
            source,
        })?;

        for relative in files {
            if relative.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(kind) = relative.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let path = schema_root.join(&relative);
            let text = fs
                .read_to_string(&path)
                .map_err(|source| SchemaError::Io {
                    path: path.clone(),
                    source,
                })?;
            let schema: SchemaNode =
                serde_json::from_str(&text).map_err(|err| SchemaError::Invalid {
                    path: path.clone(),
                    message: err.to_string(),
                })?;

            debug!(kind, file = %relative.display(), "loaded schema");
            schemas.insert(kind.to_string(), schema);
        }

        info!(count = schemas.len(), "schema registry initialized");
        Ok(Self { schemas })
    }

    /// Register a schema directly (tests, embedded defaults)
    pub fn insert(&mut self, kind: impl Into<String>, schema: SchemaNode) {
        self.schemas.insert(kind.into(), schema);
    }

    pub fn schema(&self, kind: &str) -> Result<&SchemaNode, SchemaError> {
        self.schemas.get(kind).ok_or_else(|| SchemaError::SchemaMissing {
            kind: kind.to_string(),
        })
    }

    /// Like `schema`, but degrading: absent kinds yield `None` so the
    /// document still loads as descriptor-less editable values.
    pub fn schema_opt(&self, kind: &str) -> Option<&SchemaNode> {
        self.schemas.get(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(|kind| kind.as_str())
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modforge_common::MockFileSystem;

    #[test]
    fn test_load_dir_names_kinds_by_stem() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/schemas/unit.json",
            r#"{"kind": "object", "members": [{"name": "hull", "schema": {"kind": "number"}}]}"#,
        );
        fs.add_file("/schemas/notes.txt", "ignored");

        let registry = SchemaRegistry::load_dir(&fs, Path::new("/schemas")).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.schema("unit").is_ok());
    }

    #[test]
    fn test_missing_kind_is_schema_missing() {
        let registry = SchemaRegistry::new();
        let err = registry.schema("research_subject").unwrap_err();
        assert!(matches!(err, SchemaError::SchemaMissing { .. }));
        assert!(registry.schema_opt("research_subject").is_none());
    }

    #[test]
    fn test_invalid_schema_file_is_reported() {
        let fs = MockFileSystem::new();
        fs.add_file("/schemas/unit.json", "{\"kind\": ");

        let err = SchemaRegistry::load_dir(&fs, Path::new("/schemas")).unwrap_err();
        assert!(matches!(err, SchemaError::Invalid { .. }));
    }
}
