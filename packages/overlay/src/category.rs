use serde::{Deserialize, Serialize};

/// The data categories a mod is organized into, one directory each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataCategory {
    Entities,
    Research,
    Uniforms,
    Localization,
    Textures,
    Sounds,
}

impl DataCategory {
    pub const ALL: [DataCategory; 6] = [
        DataCategory::Entities,
        DataCategory::Research,
        DataCategory::Uniforms,
        DataCategory::Localization,
        DataCategory::Textures,
        DataCategory::Sounds,
    ];

    /// Directory name under both the base and overlay roots
    pub fn dir(&self) -> &'static str {
        match self {
            DataCategory::Entities => "entities",
            DataCategory::Research => "research",
            DataCategory::Uniforms => "uniforms",
            DataCategory::Localization => "localized_text",
            DataCategory::Textures => "textures",
            DataCategory::Sounds => "sounds",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_dirs_are_distinct() {
        let mut dirs: Vec<&str> = DataCategory::ALL.iter().map(|c| c.dir()).collect();
        dirs.sort();
        dirs.dedup();
        assert_eq!(dirs.len(), DataCategory::ALL.len());
    }
}
