//! The managed-interface mapping.
//!
//! Loaded once at startup from `<interface>:<table id>` entries and never
//! mutated afterwards. Table ids double as rule priorities, so they must be
//! unique across entries.

use std::collections::HashMap;

use thiserror::Error;

/// Lowest table id accepted for a managed interface.
pub const TABLE_ID_MIN: u32 = 1000;
/// First table id above the accepted range.
pub const TABLE_ID_MAX: u32 = 30000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("malformed mapping entry {0:?}, expected <interface>:<table id>")]
    Malformed(String),
    #[error("table id {id:?} in mapping entry {entry:?} is not a number")]
    InvalidTableId { entry: String, id: String },
    #[error("table id {id} in mapping entry {entry:?} is outside [1000, 30000)")]
    TableIdOutOfRange { entry: String, id: u32 },
    #[error("interface {0:?} is mapped twice")]
    DuplicateInterface(String),
    #[error("table id {table} is mapped to both {existing:?} and {interface:?}")]
    DuplicateTable { table: u32, existing: String, interface: String },
}

/// Interface name → custom table id.
#[derive(Debug, Clone, Default)]
pub struct Mapping {
    tables: HashMap<String, u32>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse entries like `eno1:2000` and build the mapping.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, MappingError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut mapping = Self::new();
        for entry in entries {
            mapping.insert(entry.as_ref())?;
        }
        Ok(mapping)
    }

    /// Parse and add one entry. The entry may be quoted; it is split on the
    /// last colon so interface names containing colons survive.
    pub fn insert(&mut self, entry: &str) -> Result<(), MappingError> {
        let trimmed = strip_quotes(entry.trim());

        let Some((name, id)) = trimmed.rsplit_once(':') else {
            return Err(MappingError::Malformed(entry.to_string()));
        };
        if name.is_empty() || id.is_empty() {
            return Err(MappingError::Malformed(entry.to_string()));
        }

        let table: u32 = id.parse().map_err(|_| MappingError::InvalidTableId {
            entry: entry.to_string(),
            id: id.to_string(),
        })?;
        if !(TABLE_ID_MIN..TABLE_ID_MAX).contains(&table) {
            return Err(MappingError::TableIdOutOfRange { entry: entry.to_string(), id: table });
        }

        if self.tables.contains_key(name) {
            return Err(MappingError::DuplicateInterface(name.to_string()));
        }
        if let Some((existing, _)) = self.tables.iter().find(|(_, t)| **t == table) {
            return Err(MappingError::DuplicateTable {
                table,
                existing: existing.clone(),
                interface: name.to_string(),
            });
        }

        self.tables.insert(name.to_string(), table);
        Ok(())
    }

    /// The custom table for a managed interface, `None` if unmanaged.
    pub fn table_for(&self, interface: &str) -> Option<u32> {
        self.tables.get(interface).copied()
    }

    /// Whether `table` is one of the managed custom tables.
    pub fn contains_table(&self, table: u32) -> bool {
        self.tables.values().any(|t| *t == table)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.tables.iter().map(|(name, table)| (name.as_str(), *table))
    }
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_range_boundaries() {
        let mut mapping = Mapping::new();
        mapping.insert("eno1:1000").unwrap();
        mapping.insert("eno2:29999").unwrap();
        assert_eq!(mapping.table_for("eno1"), Some(1000));
        assert_eq!(mapping.table_for("eno2"), Some(29999));
    }

    #[test]
    fn rejects_out_of_range_ids() {
        let mut mapping = Mapping::new();
        assert!(matches!(
            mapping.insert("eno1:999"),
            Err(MappingError::TableIdOutOfRange { id: 999, .. })
        ));
        assert!(matches!(
            mapping.insert("eno1:30000"),
            Err(MappingError::TableIdOutOfRange { id: 30000, .. })
        ));
    }

    #[test]
    fn rejects_garbage() {
        let mut mapping = Mapping::new();
        assert!(matches!(mapping.insert("eno1"), Err(MappingError::Malformed(_))));
        assert!(matches!(mapping.insert(":2000"), Err(MappingError::Malformed(_))));
        assert!(matches!(mapping.insert("eno1:"), Err(MappingError::Malformed(_))));
        assert!(matches!(mapping.insert("eno1:abc"), Err(MappingError::InvalidTableId { .. })));
    }

    #[test]
    fn splits_on_the_last_colon() {
        let mut mapping = Mapping::new();
        mapping.insert("vlan:7:2000").unwrap();
        assert_eq!(mapping.table_for("vlan:7"), Some(2000));
    }

    #[test]
    fn strips_surrounding_quotes() {
        let mut mapping = Mapping::new();
        mapping.insert("\"eno1:2000\"").unwrap();
        mapping.insert("'eno2:3000'").unwrap();
        assert_eq!(mapping.table_for("eno1"), Some(2000));
        assert_eq!(mapping.table_for("eno2"), Some(3000));
    }

    #[test]
    fn rejects_duplicates() {
        let mut mapping = Mapping::new();
        mapping.insert("eno1:2000").unwrap();
        assert!(matches!(
            mapping.insert("eno1:3000"),
            Err(MappingError::DuplicateInterface(_))
        ));
        assert!(matches!(
            mapping.insert("eno2:2000"),
            Err(MappingError::DuplicateTable { table: 2000, .. })
        ));
    }

    #[test]
    fn lookups() {
        let mapping = Mapping::from_entries(["eno1:2000", "eno2:3000"]).unwrap();
        assert_eq!(mapping.len(), 2);
        assert!(mapping.contains_table(2000));
        assert!(mapping.contains_table(3000));
        assert!(!mapping.contains_table(2001));
        assert_eq!(mapping.table_for("eno3"), None);
    }
}
