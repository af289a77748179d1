use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{read_json, LoadError};

/// Names the generated code is written against.
///
/// Every field has a default, so a settings file only lists what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranspilerSettings {
    /// Parameter of the exported function that receives the table items.
    pub items_alias: String,
    pub enums_alias: String,
    pub stdlib_alias: String,
    pub global_alias: String,
    /// Handle passed to object-instantiation primitives.
    pub player_alias: String,
    /// Stdlib primitives that turn a name into a live reference.
    pub get_ref: Vec<String>,
    /// Stdlib primitives that instantiate host objects.
    pub create_object: Vec<String>,
    /// Primitives that execute script text in the caller's scope.
    pub execute_global: Vec<String>,
    /// Stdlib primitive that reads a text resource.
    pub get_text_file: String,
}

impl Default for TranspilerSettings {
    fn default() -> Self {
        Self {
            items_alias: "items".to_string(),
            enums_alias: "__enums".to_string(),
            stdlib_alias: "__stdlib".to_string(),
            global_alias: "__global".to_string(),
            player_alias: "__player".to_string(),
            get_ref: vec!["GetRef".to_string()],
            create_object: vec!["CreateObject".to_string()],
            execute_global: vec![
                "ExecuteGlobal".to_string(),
                "Execute".to_string(),
                "Eval".to_string(),
            ],
            get_text_file: "GetTextFile".to_string(),
        }
    }
}

impl TranspilerSettings {
    pub fn is_get_ref(&self, name: &str) -> bool {
        contains_name(&self.get_ref, name)
    }

    pub fn is_create_object(&self, name: &str) -> bool {
        contains_name(&self.create_object, name)
    }

    pub fn is_execute_global(&self, name: &str) -> bool {
        contains_name(&self.execute_global, name)
    }

    pub fn is_get_text_file(&self, name: &str) -> bool {
        self.get_text_file.eq_ignore_ascii_case(name)
    }
}

fn contains_name(names: &[String], name: &str) -> bool {
    names.iter().any(|n| n.eq_ignore_ascii_case(name))
}

/// Load settings from a JSON file.
pub fn load_settings(path: &Path) -> Result<TranspilerSettings, LoadError> {
    let settings = read_json::<TranspilerSettings>(path)?;
    tracing::debug!("loaded transpiler settings from {}", path.display());
    Ok(settings)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"items_alias": "table", "execute_global": ["ExecuteGlobal"]}"#).unwrap();

        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.items_alias, "table");
        assert_eq!(settings.enums_alias, "__enums");
        assert!(settings.is_execute_global("executeglobal"));
        assert!(!settings.is_execute_global("Eval"));
    }

    #[test]
    fn primitive_names_match_case_insensitively() {
        let settings = TranspilerSettings::default();
        assert!(settings.is_get_ref("getref"));
        assert!(settings.is_create_object("CREATEOBJECT"));
        assert!(settings.is_get_text_file("gettextfile"));
    }
}
