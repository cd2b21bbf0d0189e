use std::collections::HashMap;

use crate::types::{AppError, CorpusDocument, Entity, EntityKind, Result};

use super::concepts::{display_name, ConceptDictionary};
use super::patterns::{find_code_identifiers, find_publications};
use super::registry::{EntityRegistry, RegistryStatistics};

/// Recognises typed entities in text and keeps a running registry of them.
#[derive(Debug, Clone, Default)]
pub struct EntityExtractor {
    concepts: ConceptDictionary,
    registry: EntityRegistry,
}

impl EntityExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concepts(concepts: ConceptDictionary) -> Self {
        Self {
            concepts,
            registry: EntityRegistry::new(),
        }
    }

    /// Resume from a previously built registry.
    pub fn with_registry(concepts: ConceptDictionary, registry: EntityRegistry) -> Self {
        Self { concepts, registry }
    }

    pub fn concepts(&self) -> &ConceptDictionary {
        &self.concepts
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn into_registry(self) -> EntityRegistry {
        self.registry
    }

    /// Extract entities from `text` and merge them into the registry.
    ///
    /// `kinds = None` extracts every recognisable kind.
    pub fn extract(
        &mut self,
        text: &str,
        source_id: &str,
        kinds: Option<&[EntityKind]>,
    ) -> Result<Vec<Entity>> {
        let entities = self.scan(text, source_id, kinds)?;
        for entity in &entities {
            self.registry.register(entity.clone());
        }
        Ok(entities)
    }

    /// Merge an already scanned entity into the registry.
    pub fn register(&mut self, entity: Entity) -> bool {
        self.registry.register(entity)
    }

    /// Recognise entities without touching the registry.
    ///
    /// Each id appears at most once in the result; its frequency is the number
    /// of times it was observed in `text`. Order: code identifiers, then
    /// publications, then concepts, each in order of first appearance.
    pub fn scan(
        &self,
        text: &str,
        source_id: &str,
        kinds: Option<&[EntityKind]>,
    ) -> Result<Vec<Entity>> {
        let kinds = kinds.unwrap_or(&EntityKind::EXTRACTABLE);
        if let Some(kind) = kinds.iter().find(|k| !k.is_extractable()) {
            return Err(AppError::Input(format!(
                "Entity kind '{}' cannot be extracted from text",
                kind
            )));
        }

        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut extracted = Vec::new();

        if kinds.contains(&EntityKind::CodeIdentifier) {
            extracted.extend(self.scan_code_identifiers(text, source_id));
        }

        if kinds.contains(&EntityKind::Publication) {
            extracted.extend(self.scan_publications(text, source_id));
        }

        if kinds.contains(&EntityKind::Concept) {
            extracted.extend(self.scan_concepts(text, source_id));
        }

        Ok(extracted)
    }

    /// Extract from each document in turn, returning per-document entity lists.
    ///
    /// Documents with an empty id are skipped and logged.
    pub fn extract_from_corpus(
        &mut self,
        documents: &[CorpusDocument],
    ) -> Vec<(String, Vec<Entity>)> {
        let mut corpus_entities = Vec::with_capacity(documents.len());

        for doc in documents {
            if doc.id.trim().is_empty() {
                tracing::warn!("Skipping corpus entry with empty id");
                continue;
            }
            match self.extract(&doc.text, &doc.id, None) {
                Ok(entities) => corpus_entities.push((doc.id.clone(), entities)),
                Err(e) => tracing::warn!(doc = %doc.id, error = %e, "Extraction failed"),
            }
        }

        tracing::info!(
            entities = self.registry.len(),
            documents = documents.len(),
            "Extracted entities from corpus"
        );
        corpus_entities
    }

    pub fn get_entity(&self, id: &str) -> Option<&Entity> {
        self.registry.get(id)
    }

    pub fn top_entities(&self, kind: Option<EntityKind>, limit: usize) -> Vec<&Entity> {
        self.registry.top_entities(kind, limit)
    }

    pub fn statistics(&self) -> RegistryStatistics {
        self.registry.statistics()
    }

    fn scan_code_identifiers(&self, text: &str, source_id: &str) -> Vec<Entity> {
        let mut order: Vec<String> = Vec::new();
        let mut found: HashMap<String, Entity> = HashMap::new();

        for m in find_code_identifiers(text) {
            if let Some(existing) = found.get_mut(&m.id) {
                existing.frequency += 1;
                continue;
            }

            let base = format!("{}-{}", m.family, m.number);
            let name = match &m.enhancement {
                Some(enh) => format!("Control {} Enhancement {}", base, enh),
                None => format!("Control {}", base),
            };

            let mut entity = Entity::new(&m.id, EntityKind::CodeIdentifier, name)
                .with_frequency(1)
                .with_source(source_id)
                .with_property("family", m.family.as_str())
                .with_property("number", m.number.as_str());
            if let Some(enh) = &m.enhancement {
                entity = entity.with_property("enhancement", enh.as_str());
            }

            order.push(m.id.clone());
            found.insert(m.id, entity);
        }

        order
            .into_iter()
            .filter_map(|id| found.remove(&id))
            .collect()
    }

    fn scan_publications(&self, text: &str, source_id: &str) -> Vec<Entity> {
        let mut order: Vec<String> = Vec::new();
        let mut found: HashMap<String, Entity> = HashMap::new();

        for code in find_publications(text) {
            let id = format!("SP-{}", code);
            if let Some(existing) = found.get_mut(&id) {
                existing.frequency += 1;
                continue;
            }

            let entity = Entity::new(&id, EntityKind::Publication, format!("SP {}", code))
                .with_frequency(1)
                .with_source(source_id)
                .with_property("publication_number", code.as_str());

            order.push(id.clone());
            found.insert(id, entity);
        }

        order
            .into_iter()
            .filter_map(|id| found.remove(&id))
            .collect()
    }

    fn scan_concepts(&self, text: &str, source_id: &str) -> Vec<Entity> {
        let text_lower = text.to_lowercase();

        self.concepts
            .iter()
            .filter_map(|(concept_id, triggers)| {
                let matched = self.concepts.matches(concept_id, &text_lower);
                if matched.is_empty() {
                    return None;
                }

                Some(
                    Entity::new(concept_id, EntityKind::Concept, display_name(concept_id))
                        .with_aliases(triggers.iter().cloned())
                        .with_frequency(matched.len() as u64)
                        .with_source(source_id)
                        .with_property("matched_keywords", matched),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(entities: &[Entity]) -> Vec<&str> {
        entities.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_scenario_code_and_publication() {
        let mut extractor = EntityExtractor::new();
        let entities = extractor
            .extract(
                "AC-2 requires periodic review. Publication SP-800-53 describes AC-2.",
                "d1",
                None,
            )
            .unwrap();

        assert_eq!(ids(&entities), vec!["AC-2", "SP-800-53"]);
        assert_eq!(entities[0].kind, EntityKind::CodeIdentifier);
        assert_eq!(entities[0].frequency, 2);
        assert_eq!(entities[0].property_str("family"), Some("AC"));
        assert_eq!(entities[1].kind, EntityKind::Publication);
    }

    #[test]
    fn test_same_entity_from_two_documents() {
        let mut extractor = EntityExtractor::new();
        extractor.extract("AC-2 and AC-2 again", "d1", None).unwrap();
        extractor.extract("only AC-2", "d2", None).unwrap();

        let entity = extractor.get_entity("AC-2").unwrap();
        assert_eq!(entity.frequency, 3);
        assert_eq!(
            entity.source_documents.iter().collect::<Vec<_>>(),
            vec!["d1", "d2"]
        );
    }

    #[test]
    fn test_first_seen_name_is_kept() {
        let mut extractor = EntityExtractor::new();
        extractor.extract("enable MFA", "d1", None).unwrap();
        extractor
            .extract("multi-factor authentication and 2fa", "d2", None)
            .unwrap();

        let mfa = extractor.get_entity("mfa").unwrap();
        assert_eq!(mfa.name, "Mfa");
        assert_eq!(mfa.frequency, 3);
        assert_eq!(mfa.properties["matched_keywords"], serde_json::json!(["mfa"]));
        assert!(mfa.aliases.contains("two-factor"));
    }

    #[test]
    fn test_kind_filter() {
        let extractor = EntityExtractor::new();
        let text = "AC-2 uses encryption per NIST SP 800-57";
        let only_concepts = extractor
            .scan(text, "d1", Some(&[EntityKind::Concept]))
            .unwrap();
        assert_eq!(ids(&only_concepts), vec!["encryption"]);

        let only_pubs = extractor
            .scan(text, "d1", Some(&[EntityKind::Publication]))
            .unwrap();
        assert_eq!(ids(&only_pubs), vec!["SP-800-57"]);
    }

    #[test]
    fn test_family_kind_is_a_configuration_error() {
        let extractor = EntityExtractor::new();
        let result = extractor.scan("AC-2", "d1", Some(&[EntityKind::SynthesizedFamily]));
        assert!(matches!(result, Err(AppError::Input(_))));
    }

    #[test]
    fn test_empty_and_malformed_input() {
        let mut extractor = EntityExtractor::new();
        assert!(extractor.extract("", "d1", None).unwrap().is_empty());
        assert!(extractor.extract("   \n\t", "d1", None).unwrap().is_empty());
        assert!(extractor.extract("-- ((( )))", "d1", None).unwrap().is_empty());
        assert!(extractor.registry().is_empty());
    }

    #[test]
    fn test_scan_does_not_register() {
        let extractor = EntityExtractor::new();
        let found = extractor.scan("What about AC-2?", "query", None).unwrap();
        assert_eq!(ids(&found), vec!["AC-2"]);
        assert!(extractor.registry().is_empty());
    }

    #[test]
    fn test_enhancement_entity() {
        let extractor = EntityExtractor::new();
        let found = extractor.scan("IA-5(1) and IA-5", "d1", None).unwrap();
        assert_eq!(ids(&found), vec!["IA-5(1)", "IA-5"]);
        assert_eq!(found[0].property_str("enhancement"), Some("1"));
        assert_eq!(found[0].name, "Control IA-5 Enhancement 1");
        assert!(found[1].property_str("enhancement").is_none());
    }

    #[test]
    fn test_extract_from_corpus_skips_empty_ids() {
        let mut extractor = EntityExtractor::new();
        let docs = vec![
            CorpusDocument::new("d1", "AC-2"),
            CorpusDocument::new("", "AU-6"),
        ];
        let per_doc = extractor.extract_from_corpus(&docs);
        assert_eq!(per_doc.len(), 1);
        assert!(extractor.get_entity("AU-6").is_none());
    }

    #[test]
    fn test_top_entities_contract() {
        let mut extractor = EntityExtractor::new();
        extractor.extract("SI-4 AU-6 AC-2 AC-2", "d1", None).unwrap();
        let top: Vec<&str> = extractor
            .top_entities(Some(EntityKind::CodeIdentifier), 3)
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(top, vec!["AC-2", "AU-6", "SI-4"]);
    }
}
