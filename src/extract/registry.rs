//! Deduplicating id -> entity registry.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::types::{Entity, EntityKind};

/// Number of leaders listed per kind in registry statistics.
pub const TOP_PER_KIND: usize = 10;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityRegistry {
    entities: HashMap<String, Entity>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityFrequency {
    pub id: String,
    pub frequency: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryStatistics {
    pub total_entities: usize,
    pub by_kind: BTreeMap<EntityKind, usize>,
    pub top_code_identifiers: Vec<EntityFrequency>,
    pub top_concepts: Vec<EntityFrequency>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `entity` into the registry. Returns `true` if the id was new.
    pub fn register(&mut self, entity: Entity) -> bool {
        match self.entities.get_mut(&entity.id) {
            Some(existing) => {
                existing.merge(&entity);
                false
            }
            None => {
                self.entities.insert(entity.id.clone(), entity);
                true
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// All entities ordered by id.
    pub fn entities(&self) -> Vec<&Entity> {
        let mut all: Vec<&Entity> = self.entities.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Entities of one kind ordered by id.
    pub fn by_kind(&self, kind: EntityKind) -> Vec<&Entity> {
        let mut found: Vec<&Entity> = self.entities.values().filter(|e| e.kind == kind).collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }

    /// Most frequent entities: frequency descending, ties by id ascending.
    pub fn top_entities(&self, kind: Option<EntityKind>, limit: usize) -> Vec<&Entity> {
        let mut ranked: Vec<&Entity> = self
            .entities
            .values()
            .filter(|e| kind.map_or(true, |k| e.kind == k))
            .collect();
        ranked.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.id.cmp(&b.id)));
        ranked.truncate(limit);
        ranked
    }

    pub fn statistics(&self) -> RegistryStatistics {
        let mut by_kind = BTreeMap::new();
        for entity in self.entities.values() {
            *by_kind.entry(entity.kind).or_insert(0) += 1;
        }

        let leaders = |kind: EntityKind| -> Vec<EntityFrequency> {
            self.top_entities(Some(kind), TOP_PER_KIND)
                .into_iter()
                .map(|e| EntityFrequency {
                    id: e.id.clone(),
                    frequency: e.frequency,
                })
                .collect()
        };

        RegistryStatistics {
            total_entities: self.entities.len(),
            by_kind,
            top_code_identifiers: leaders(EntityKind::CodeIdentifier),
            top_concepts: leaders(EntityKind::Concept),
        }
    }
}

impl FromIterator<Entity> for EntityRegistry {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        let mut registry = Self::new();
        for entity in iter {
            registry.register(entity);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: &str, kind: EntityKind, frequency: u64, source: &str) -> Entity {
        Entity::new(id, kind, id)
            .with_frequency(frequency)
            .with_source(source)
    }

    #[test]
    fn test_register_merges_repeat() {
        let mut registry = EntityRegistry::new();
        assert!(registry.register(entity("AC-2", EntityKind::CodeIdentifier, 2, "d1")));
        assert!(!registry.register(entity("AC-2", EntityKind::CodeIdentifier, 1, "d2")));

        let merged = registry.get("AC-2").unwrap();
        assert_eq!(merged.frequency, 3);
        assert_eq!(merged.source_documents.len(), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_top_entities_order_is_frequency_then_id() {
        let registry: EntityRegistry = vec![
            entity("SI-4", EntityKind::CodeIdentifier, 3, "d1"),
            entity("AC-2", EntityKind::CodeIdentifier, 5, "d1"),
            entity("AU-6", EntityKind::CodeIdentifier, 3, "d1"),
            entity("IA-5", EntityKind::CodeIdentifier, 3, "d1"),
            entity("mfa", EntityKind::Concept, 9, "d1"),
        ]
        .into_iter()
        .collect();

        let ids: Vec<&str> = registry
            .top_entities(Some(EntityKind::CodeIdentifier), 10)
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, vec!["AC-2", "AU-6", "IA-5", "SI-4"]);

        let ids: Vec<&str> = registry
            .top_entities(None, 3)
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, vec!["mfa", "AC-2", "AU-6"]);
    }

    #[test]
    fn test_statistics() {
        let registry: EntityRegistry = vec![
            entity("AC-2", EntityKind::CodeIdentifier, 2, "d1"),
            entity("mfa", EntityKind::Concept, 1, "d1"),
            entity("SP-800-53", EntityKind::Publication, 1, "d1"),
        ]
        .into_iter()
        .collect();

        let stats = registry.statistics();
        assert_eq!(stats.total_entities, 3);
        assert_eq!(stats.by_kind[&EntityKind::Publication], 1);
        assert_eq!(stats.top_code_identifiers[0].id, "AC-2");
        assert_eq!(stats.top_concepts[0].frequency, 1);
    }
}
