//! Immutable structured reference data.
//!
//! A [`DatasetSnapshot`] is built once at startup and shared read-only by
//! every request. Keys and alias entries are normalized when the snapshot is
//! built so resolution only ever compares canonical forms.

use super::normalize::{NormalizedQuery, normalize};
use crate::core::error::DomainError;
use crate::intent::EntityType;
use crate::retrieval::Citation;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// One row of a structured table, e.g. a per-locality rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub entity_type: EntityType,
    /// Canonical key in `Locality, CODE` form.
    pub key: String,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    /// Raw table row the fields were extracted from.
    #[serde(default)]
    pub source_excerpt: Option<String>,
    #[serde(default)]
    pub citation: Option<Citation>,
    /// Marks the entry returned when a region has no closer match.
    #[serde(default)]
    pub representative: bool,
    #[serde(default)]
    pub note: Option<String>,
}

impl DatasetRecord {
    pub fn new(entity_type: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            entity_type: EntityType::new(entity_type),
            key: key.into(),
            fields: BTreeMap::new(),
            source_excerpt: None,
            citation: None,
            representative: false,
            note: None,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.source_excerpt = Some(excerpt.into());
        self
    }

    pub fn with_citation(mut self, citation: Citation) -> Self {
        self.citation = Some(citation);
        self
    }

    pub fn as_representative(mut self) -> Self {
        self.representative = true;
        self
    }
}

/// A record together with its normalized key.
#[derive(Debug, Clone)]
pub struct TableEntry {
    pub record: DatasetRecord,
    pub normalized: NormalizedQuery,
}

impl TableEntry {
    pub fn canonical_key(&self) -> &str {
        &self.normalized.canonical
    }
}

/// All records of one entity type.
#[derive(Debug, Clone, Default)]
pub struct DatasetTable {
    entries: Vec<TableEntry>,
    exact: HashMap<String, usize>,
    representatives: BTreeMap<String, usize>,
}

impl DatasetTable {
    fn insert(&mut self, record: DatasetRecord) -> Result<(), DomainError> {
        let normalized = normalize(&record.key);
        if normalized.is_empty() {
            return Err(DomainError::InvalidDataset(format!(
                "record key '{}' normalizes to nothing",
                record.key
            )));
        }
        if self.exact.contains_key(&normalized.canonical) {
            return Err(DomainError::InvalidDataset(format!(
                "duplicate key '{}' in {}",
                normalized.canonical, record.entity_type
            )));
        }
        if record.representative {
            let Some(scope) = normalized.scope.clone() else {
                return Err(DomainError::InvalidDataset(format!(
                    "representative '{}' has no region",
                    record.key
                )));
            };
            if self.representatives.contains_key(&scope) {
                return Err(DomainError::InvalidDataset(format!(
                    "second representative for {} in {}",
                    scope, record.entity_type
                )));
            }
            self.representatives.insert(scope, self.entries.len());
        }
        self.exact
            .insert(normalized.canonical.clone(), self.entries.len());
        self.entries.push(TableEntry { record, normalized });
        Ok(())
    }

    pub fn get(&self, canonical: &str) -> Option<&TableEntry> {
        self.exact.get(canonical).map(|&i| &self.entries[i])
    }

    pub fn representative(&self, scope: &str) -> Option<&TableEntry> {
        self.representatives.get(scope).map(|&i| &self.entries[i])
    }

    /// Entries in load order, optionally restricted to one region.
    pub fn entries_in<'a, 's>(
        &'a self,
        scope: Option<&'s str>,
    ) -> impl Iterator<Item = &'a TableEntry> + use<'a, 's> {
        self.entries
            .iter()
            .filter(move |e| scope.is_none() || e.normalized.scope.as_deref() == scope)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Static alias substitutions, e.g. a county to its representative city.
#[derive(Debug, Clone, Default)]
pub struct AliasMap {
    entries: Vec<(NormalizedQuery, String)>,
    index: HashMap<String, usize>,
}

impl AliasMap {
    pub fn new<I, K, V>(pairs: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut map = Self::default();
        for (from, to) in pairs {
            let from = normalize(from.as_ref());
            let to = normalize(to.as_ref());
            if from.is_empty() || to.is_empty() {
                return Err(DomainError::InvalidDataset(
                    "alias with empty side".to_string(),
                ));
            }
            if map.index.contains_key(&from.canonical) {
                return Err(DomainError::InvalidDataset(format!(
                    "duplicate alias '{}'",
                    from.canonical
                )));
            }
            map.index.insert(from.canonical.clone(), map.entries.len());
            map.entries.push((from, to.canonical));
        }
        Ok(map)
    }

    /// Canonical target for a normalized input.
    ///
    /// A scoped input must hit an alias key exactly. An unscoped input also
    /// matches a scoped key whose locality is identical, provided exactly one
    /// key qualifies.
    pub fn resolve(&self, query: &NormalizedQuery) -> Option<&str> {
        if let Some(&i) = self.index.get(&query.canonical) {
            return Some(&self.entries[i].1);
        }
        if query.scope.is_some() {
            return None;
        }
        let locality = query.locality.as_deref()?;
        let mut hits = self
            .entries
            .iter()
            .filter(|(from, _)| from.locality.as_deref() == Some(locality));
        match (hits.next(), hits.next()) {
            (Some((_, target)), None) => Some(target),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Load-once reference data shared by all requests.
#[derive(Debug, Clone, Default)]
pub struct DatasetSnapshot {
    tables: BTreeMap<EntityType, DatasetTable>,
    aliases: AliasMap,
}

impl DatasetSnapshot {
    pub fn new(
        records: impl IntoIterator<Item = DatasetRecord>,
        aliases: AliasMap,
    ) -> Result<Self, DomainError> {
        let mut tables: BTreeMap<EntityType, DatasetTable> = BTreeMap::new();
        for record in records {
            tables
                .entry(record.entity_type.clone())
                .or_default()
                .insert(record)?;
        }
        Ok(Self { tables, aliases })
    }

    pub fn table(&self, entity_type: &EntityType) -> Option<&DatasetTable> {
        self.tables.get(entity_type)
    }

    pub fn aliases(&self) -> &AliasMap {
        &self.aliases
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> {
        self.tables.keys()
    }

    pub fn record_count(&self) -> usize {
        self.tables.values().map(DatasetTable::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate(key: &str) -> DatasetRecord {
        DatasetRecord::new("location_rate", key)
    }

    #[test]
    fn test_keys_normalized_on_load() {
        let snapshot =
            DatasetSnapshot::new(vec![rate("denver,  colorado")], AliasMap::default()).unwrap();
        let table = snapshot.table(&EntityType::new("location_rate")).unwrap();
        assert!(table.get("Denver, CO").is_some());
        assert_eq!(snapshot.record_count(), 1);
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let result = DatasetSnapshot::new(
            vec![rate("Denver, CO"), rate("DENVER, colorado")],
            AliasMap::default(),
        );
        assert!(matches!(result, Err(DomainError::InvalidDataset(_))));
    }

    #[test]
    fn test_same_key_allowed_across_entity_types() {
        let result = DatasetSnapshot::new(
            vec![rate("Denver, CO"), DatasetRecord::new("mileage", "Denver, CO")],
            AliasMap::default(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_representative_rules() {
        let unscoped = DatasetSnapshot::new(
            vec![rate("Standard Rate").as_representative()],
            AliasMap::default(),
        );
        assert!(unscoped.is_err());

        let twice = DatasetSnapshot::new(
            vec![
                rate("Denver, CO").as_representative(),
                rate("Aspen, CO").as_representative(),
            ],
            AliasMap::default(),
        );
        assert!(twice.is_err());

        let ok = DatasetSnapshot::new(
            vec![rate("Denver, CO").as_representative(), rate("Aspen, CO")],
            AliasMap::default(),
        )
        .unwrap();
        let table = ok.table(&EntityType::new("location_rate")).unwrap();
        assert_eq!(table.representative("CO").unwrap().canonical_key(), "Denver, CO");
        assert!(table.representative("WY").is_none());
    }

    #[test]
    fn test_entries_in_scope() {
        let snapshot = DatasetSnapshot::new(
            vec![rate("Denver, CO"), rate("Cheyenne, WY"), rate("Aspen, CO")],
            AliasMap::default(),
        )
        .unwrap();
        let table = snapshot.table(&EntityType::new("location_rate")).unwrap();
        let co: Vec<_> = table.entries_in(Some("CO")).map(|e| e.canonical_key()).collect();
        assert_eq!(co, vec!["Denver, CO", "Aspen, CO"]);
        assert_eq!(table.entries_in(None).count(), 3);
    }

    #[test]
    fn test_alias_exact_and_unique_locality() {
        let aliases = AliasMap::new([
            ("Arapahoe County, CO", "Aurora, CO"),
            ("Jefferson County, CO", "Golden, CO"),
            ("Jefferson County, KY", "Louisville, KY"),
        ])
        .unwrap();
        assert_eq!(aliases.resolve(&normalize("arapahoe county, colorado")), Some("Aurora, CO"));
        assert_eq!(aliases.resolve(&normalize("Arapahoe County")), Some("Aurora, CO"));
        // Ambiguous without a region.
        assert_eq!(aliases.resolve(&normalize("Jefferson County")), None);
        // Scoped inputs never cross regions.
        assert_eq!(aliases.resolve(&normalize("Arapahoe County, WY")), None);
    }

    #[test]
    fn test_alias_duplicates_rejected() {
        let result = AliasMap::new([("Arapahoe County, CO", "Aurora, CO"), ("arapahoe county, co", "Denver, CO")]);
        assert!(result.is_err());
    }
}
