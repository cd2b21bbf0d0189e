use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::error::{AppError, Result};

/// Free-form attribute map carried by entities, nodes and edges.
///
/// Values are JSON so nested maps, lists and numbers survive persistence
/// without a language-specific encoding.
pub type Properties = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Family token + number + optional enhancement, e.g. `AC-2(1)`.
    CodeIdentifier,
    /// Formal publication reference, e.g. `SP-800-53`.
    Publication,
    /// Dictionary concept matched by trigger phrases.
    Concept,
    /// Parent node grouping code identifiers that share a family prefix.
    SynthesizedFamily,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::CodeIdentifier,
        EntityKind::Publication,
        EntityKind::Concept,
        EntityKind::SynthesizedFamily,
    ];

    /// Kinds that can be recognised directly in text.
    pub const EXTRACTABLE: [EntityKind; 3] = [
        EntityKind::CodeIdentifier,
        EntityKind::Publication,
        EntityKind::Concept,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeIdentifier => "code_identifier",
            Self::Publication => "publication",
            Self::Concept => "concept",
            Self::SynthesizedFamily => "synthesized_family",
        }
    }

    pub fn is_extractable(&self) -> bool {
        !matches!(self, Self::SynthesizedFamily)
    }
}

impl std::str::FromStr for EntityKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "code_identifier" | "code-identifier" | "code" | "control" => Ok(Self::CodeIdentifier),
            "publication" | "pub" => Ok(Self::Publication),
            "concept" => Ok(Self::Concept),
            "synthesized_family" | "synthesized-family" | "family" => Ok(Self::SynthesizedFamily),
            _ => Err(AppError::Input(format!("Unknown entity kind: {}", s))),
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub id: String,
    pub kind: EntityKind,
    pub name: String,

    #[serde(default)]
    pub aliases: BTreeSet<String>,

    #[serde(default)]
    pub properties: Properties,

    #[serde(default)]
    pub frequency: u64,

    #[serde(default)]
    pub source_documents: BTreeSet<String>,
}

impl Entity {
    pub fn new(id: impl Into<String>, kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            aliases: BTreeSet::new(),
            properties: Properties::new(),
            frequency: 0,
            source_documents: BTreeSet::new(),
        }
    }

    pub fn with_frequency(mut self, frequency: u64) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_documents.insert(source_id.into());
        self
    }

    pub fn with_property(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    /// Fold a repeat observation into this entity.
    ///
    /// Frequency is summed and sources unioned; name, aliases and existing
    /// property values stay as first seen.
    pub fn merge(&mut self, other: &Entity) {
        self.frequency += other.frequency;
        self.source_documents
            .extend(other.source_documents.iter().cloned());
        for (key, value) in &other.properties {
            self.properties
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    /// Property lookup as a string slice.
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }
}

/// One corpus entry handed to the graph builder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CorpusDocument {
    pub id: String,
    pub text: String,
}

impl CorpusDocument {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_entity_kind_from_str() {
        assert_eq!(
            EntityKind::from_str("control").unwrap(),
            EntityKind::CodeIdentifier
        );
        assert_eq!(
            EntityKind::from_str("Publication").unwrap(),
            EntityKind::Publication
        );
        assert_eq!(
            EntityKind::from_str("family").unwrap(),
            EntityKind::SynthesizedFamily
        );
        assert!(matches!(
            EntityKind::from_str("person"),
            Err(AppError::Input(_))
        ));
    }

    #[test]
    fn test_merge_keeps_first_name_and_unions_sources() {
        let mut first = Entity::new("AC-2", EntityKind::CodeIdentifier, "Control AC-2")
            .with_frequency(2)
            .with_source("d1")
            .with_property("family", "AC");
        let second = Entity::new("AC-2", EntityKind::CodeIdentifier, "something else")
            .with_frequency(3)
            .with_source("d2")
            .with_source("d1")
            .with_property("family", "XX")
            .with_property("number", "2");

        first.merge(&second);

        assert_eq!(first.name, "Control AC-2");
        assert_eq!(first.frequency, 5);
        assert_eq!(
            first.source_documents.iter().collect::<Vec<_>>(),
            vec!["d1", "d2"]
        );
        assert_eq!(first.property_str("family"), Some("AC"));
        assert_eq!(first.property_str("number"), Some("2"));
    }
}
