//! Alias table
//!
//! Maps alternate tokens to canonical command names. Pure data, no I/O.

use std::collections::BTreeMap;

/// Alias -> canonical command name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: BTreeMap<String, String>,
}

/// Outcome of trying to add an alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasInsert {
    /// The alias is new
    Added,

    /// The alias already pointed at the same canonical name
    Unchanged,

    /// The alias already points elsewhere; the table was not modified
    Conflict { existing: String },
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `alias -> canonical`, refusing to repoint an existing alias
    pub fn insert(&mut self, alias: &str, canonical: &str) -> AliasInsert {
        match self.entries.get(alias) {
            Some(existing) if existing == canonical => AliasInsert::Unchanged,
            Some(existing) => AliasInsert::Conflict {
                existing: existing.clone(),
            },
            None => {
                self.entries.insert(alias.to_string(), canonical.to_string());
                AliasInsert::Added
            }
        }
    }

    /// Canonical name for an alias
    pub fn canonical(&self, alias: &str) -> Option<&str> {
        self.entries.get(alias).map(String::as_str)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.entries.contains_key(alias)
    }

    /// All aliases of `canonical`, sorted lexicographically
    pub fn aliases_for(&self, canonical: &str) -> Vec<&str> {
        // BTreeMap iteration is already key-ordered
        self.entries
            .iter()
            .filter(|(_, target)| target.as_str() == canonical)
            .map(|(alias, _)| alias.as_str())
            .collect()
    }

    /// Iterates `(alias, canonical)` pairs in alias order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(a, c)| (a.as_str(), c.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_lookup() {
        let mut table = AliasTable::new();
        assert_eq!(table.insert("g", "git"), AliasInsert::Added);

        assert_eq!(table.canonical("g"), Some("git"));
        assert_eq!(table.canonical("git"), None);
        assert!(table.contains("g"));
    }

    #[test]
    fn same_target_is_idempotent() {
        let mut table = AliasTable::new();
        table.insert("g", "git");

        assert_eq!(table.insert("g", "git"), AliasInsert::Unchanged);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn repointing_is_refused() {
        let mut table = AliasTable::new();
        table.insert("d", "dev");

        let result = table.insert("d", "deploy");
        assert_eq!(
            result,
            AliasInsert::Conflict {
                existing: "dev".to_string()
            }
        );
        assert_eq!(table.canonical("d"), Some("dev"));
    }

    #[test]
    fn aliases_are_sorted() {
        let mut table = AliasTable::new();
        table.insert("development", "dev");
        table.insert("d", "dev");
        table.insert("g", "git");

        assert_eq!(table.aliases_for("dev"), vec!["d", "development"]);
        assert_eq!(table.aliases_for("git"), vec!["g"]);
        assert!(table.aliases_for("utils").is_empty());
    }
}
