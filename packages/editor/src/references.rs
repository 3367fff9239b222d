//! Reference classification and resolution.
//!
//! `classify` is a pure function of the descriptor: what a string leaf
//! *means* is declared by the schema, never guessed from its content.
//! Resolution queries the overlay namespace for candidates of that kind;
//! a value with no matching candidate is an unresolved reference — the
//! kind still holds, the candidate list is just empty.

use tracing::warn;

use modforge_data::parse_document;
use modforge_overlay::{DataCategory, LogicalPath, OverlayResolver};
use modforge_schema::{PropertyDescriptor, ReferenceKind};

use crate::errors::EditorError;

/// One resolvable target for a reference kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceTarget {
    pub kind: ReferenceKind,
    /// Entity id, localization key, or overlay-relative path
    pub name: String,
    /// The file the candidate lives in, where that is meaningful
    pub source: Option<LogicalPath>,
}

/// The declared reference kind of a described property.
/// Pure: identical descriptors always classify identically.
pub fn classify(descriptor: &PropertyDescriptor) -> Option<ReferenceKind> {
    descriptor.reference
}

/// Every candidate target of one reference kind
pub fn candidates(
    resolver: &OverlayResolver,
    kind: ReferenceKind,
) -> Result<Vec<ReferenceTarget>, EditorError> {
    match kind {
        ReferenceKind::Entity => stems(resolver, DataCategory::Entities, kind),
        ReferenceKind::Texture => stems(resolver, DataCategory::Textures, kind),
        ReferenceKind::Sound => stems(resolver, DataCategory::Sounds, kind),
        ReferenceKind::Localization => localization_keys(resolver),
        ReferenceKind::File => {
            let mut targets = Vec::new();
            for category in DataCategory::ALL {
                for path in resolver.list(category)? {
                    targets.push(ReferenceTarget {
                        kind,
                        name: path.as_str().to_string(),
                        source: Some(path),
                    });
                }
            }
            Ok(targets)
        }
    }
}

/// Candidates matching one raw value; empty means unresolved, not failed
pub fn resolve(
    resolver: &OverlayResolver,
    kind: ReferenceKind,
    raw: &str,
) -> Result<Vec<ReferenceTarget>, EditorError> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let mut targets = candidates(resolver, kind)?;
    targets.retain(|target| target.name == raw);
    Ok(targets)
}

fn stems(
    resolver: &OverlayResolver,
    category: DataCategory,
    kind: ReferenceKind,
) -> Result<Vec<ReferenceTarget>, EditorError> {
    Ok(resolver
        .list(category)?
        .into_iter()
        .map(|path| ReferenceTarget {
            kind,
            name: path.file_stem().to_string(),
            source: Some(path),
        })
        .collect())
}

/// Keys of the merged localization tables; overlay keys shadow base keys.
fn localization_keys(resolver: &OverlayResolver) -> Result<Vec<ReferenceTarget>, EditorError> {
    let mut targets: Vec<ReferenceTarget> = Vec::new();

    for file in resolver.list(DataCategory::Localization)? {
        let layers = resolver.read_layers(&file)?;
        // overlay first so its keys take the slot for this file
        for text in [layers.overlay.as_deref(), layers.base.as_deref()]
            .into_iter()
            .flatten()
        {
            let value = match parse_document(text) {
                Ok(value) => value,
                Err(err) => {
                    warn!(%file, %err, "localization file failed to parse; skipping layer");
                    continue;
                }
            };
            let Some(members) = value.as_object() else {
                warn!(%file, "localization file is not a key table; skipping layer");
                continue;
            };
            for (key, _) in members {
                if !targets.iter().any(|target| &target.name == key) {
                    targets.push(ReferenceTarget {
                        kind: ReferenceKind::Localization,
                        name: key.clone(),
                        source: Some(file.clone()),
                    });
                }
            }
        }
    }

    targets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use modforge_common::MockFileSystem;
    use modforge_schema::{SchemaKind, SchemaNode};

    fn resolver() -> OverlayResolver {
        let fs = MockFileSystem::new();
        fs.add_file("/base/entities/fighter.entity", "{}");
        fs.add_file("/base/entities/cruiser.entity", "{}");
        fs.add_file("/mod/entities/bomber.entity", "{}");
        fs.add_file("/base/textures/hull_plating.png", "");
        fs.add_file(
            "/base/localized_text/en.localized_text",
            r#"{"unit.fighter.name": "Fighter", "unit.cruiser.name": "Cruiser"}"#,
        );
        fs.add_file(
            "/mod/localized_text/en.localized_text",
            r#"{"unit.bomber.name": "Bomber"}"#,
        );
        OverlayResolver::with_filesystem("/base", "/mod", Box::new(fs)).unwrap()
    }

    #[test]
    fn test_classify_is_schema_driven() {
        let mut schema = SchemaNode::new(SchemaKind::String);
        schema.reference = Some(ReferenceKind::Entity);
        let descriptor = PropertyDescriptor::for_node(&schema);
        assert_eq!(classify(&descriptor), Some(ReferenceKind::Entity));
        // and repeatable
        assert_eq!(classify(&descriptor), Some(ReferenceKind::Entity));

        let plain = PropertyDescriptor::for_node(&SchemaNode::new(SchemaKind::String));
        assert_eq!(classify(&plain), None);
    }

    #[test]
    fn test_entity_candidates_cover_both_trees() {
        let resolver = resolver();
        let found = candidates(&resolver, ReferenceKind::Entity).unwrap();
        let names: Vec<&str> = found.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["bomber", "cruiser", "fighter"]);
    }

    #[test]
    fn test_localization_keys_merge_layers() {
        let resolver = resolver();
        let found = candidates(&resolver, ReferenceKind::Localization).unwrap();
        let names: Vec<&str> = found.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["unit.bomber.name", "unit.cruiser.name", "unit.fighter.name"]
        );
    }

    #[test]
    fn test_unmatched_value_resolves_to_nothing() {
        let resolver = resolver();
        let found = resolve(&resolver, ReferenceKind::Entity, "battleship").unwrap();
        assert!(found.is_empty());

        let found = resolve(&resolver, ReferenceKind::Entity, "bomber").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].source,
            Some(LogicalPath::new("entities/bomber.entity"))
        );
    }
}
