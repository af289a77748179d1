//! Host API namespaces.
//!
//! The runtime exposes four flat namespaces to table scripts: table items,
//! enum constants, the standard library and the remaining global API. Script
//! identifiers match them case-insensitively and are rewritten to the
//! canonical casing the host defines.

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{read_json, LoadError};

/// A case-insensitive lookup table.
pub trait Namespace {
    /// Canonical casing of `name`, if defined here.
    fn resolve(&self, name: &str) -> Option<&str>;

    /// Names nested under a resolved entry (an item's methods, an enum's
    /// members, ...).
    fn member_namespace(&self, canonical: &str) -> Option<&dyn Namespace>;

    /// Canonical casing of `member` on the entry `name`.
    fn resolve_property(&self, name: &str, member: &str) -> Option<&str> {
        self.member_namespace(name)?.resolve(member)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameEntry {
    pub canonical: String,
    pub members: NameTable,
}

/// [`Namespace`] backed by an insertion-ordered map keyed by lower-cased name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "IndexMap<String, Vec<String>>")]
pub struct NameTable {
    entries: IndexMap<String, NameEntry>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table of names without members.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for name in names {
            table.insert(name, Self::new());
        }
        table
    }

    pub fn insert(&mut self, canonical: impl Into<String>, members: NameTable) -> &mut Self {
        let canonical = canonical.into();
        self.entries
            .insert(canonical.to_ascii_lowercase(), NameEntry { canonical, members });
        self
    }

    pub fn get(&self, name: &str) -> Option<&NameEntry> {
        self.entries.get(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Namespace for NameTable {
    fn resolve(&self, name: &str) -> Option<&str> {
        self.get(name).map(|e| e.canonical.as_str())
    }

    fn member_namespace(&self, canonical: &str) -> Option<&dyn Namespace> {
        self.get(canonical).map(|e| &e.members as &dyn Namespace)
    }
}

impl From<IndexMap<String, Vec<String>>> for NameTable {
    fn from(map: IndexMap<String, Vec<String>>) -> Self {
        let mut table = Self::new();
        for (name, members) in map {
            table.insert(name, Self::from_names(members));
        }
        table
    }
}

/// The namespaces in resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceKind {
    Items,
    Enums,
    Stdlib,
    Global,
}

impl NamespaceKind {
    pub const PRIORITY: [NamespaceKind; 4] = [
        NamespaceKind::Items,
        NamespaceKind::Enums,
        NamespaceKind::Stdlib,
        NamespaceKind::Global,
    ];
}

/// Snapshot of the host API a script is transpiled against.
///
/// JSON shape: `{"items": {"BallRelease": ["CreateBall", "KickBall"]},
/// "enums": {...}, "stdlib": {...}, "global": {...}}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HostApi {
    pub items: NameTable,
    pub enums: NameTable,
    pub stdlib: NameTable,
    pub global: NameTable,
}

impl HostApi {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let api: HostApi = read_json(path)?;
        tracing::debug!(
            items = api.items.len(),
            enums = api.enums.len(),
            stdlib = api.stdlib.len(),
            global = api.global.len(),
            "loaded host API from {}",
            path.display()
        );
        Ok(api)
    }

    pub fn namespace(&self, kind: NamespaceKind) -> &NameTable {
        match kind {
            NamespaceKind::Items => &self.items,
            NamespaceKind::Enums => &self.enums,
            NamespaceKind::Stdlib => &self.stdlib,
            NamespaceKind::Global => &self.global,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn resolves_case_insensitively() {
        let mut items = NameTable::new();
        items.insert("BallRelease", NameTable::from_names(["CreateBall", "KickBall"]));

        assert_eq!(items.resolve("ballrelease"), Some("BallRelease"));
        assert_eq!(items.resolve_property("BALLRELEASE", "createball"), Some("CreateBall"));
        assert_eq!(items.resolve_property("BallRelease", "Missing"), None);
        assert_eq!(items.resolve("Plunger"), None);
    }

    #[test]
    fn parses_snapshot_json() {
        let api = HostApi::from_json(
            r#"{"items": {"BallRelease": ["CreateBall"]}, "enums": {"ImageAlignment": ["ImageAlignWorld"]}}"#,
        )
        .unwrap();
        assert_eq!(api.items.resolve("ballRelease"), Some("BallRelease"));
        assert_eq!(
            api.namespace(NamespaceKind::Enums).resolve_property("imagealignment", "IMAGEALIGNWORLD"),
            Some("ImageAlignWorld")
        );
        assert!(api.stdlib.is_empty());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.json");
        std::fs::write(&path, r#"{"stdlib": {"GetRef": [], "Math": ["Sqr"]}}"#).unwrap();
        let api = HostApi::load(&path).unwrap();
        assert_eq!(api.stdlib.len(), 2);
        assert_eq!(api.stdlib.resolve("math"), Some("Math"));
    }
}
