//! Concept dictionary: concept id -> trigger phrases.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::types::{AppError, Result};

/// Default concept table.
///
/// Triggers are matched as case-insensitive substrings, so very short
/// triggers are kept out of this table.
const DEFAULT_CONCEPTS: &[(&str, &[&str])] = &[
    (
        "mfa",
        &["multi-factor authentication", "mfa", "2fa", "two-factor"],
    ),
    (
        "encryption",
        &["encrypt", "encrypted", "cipher", "aes-", "rsa key"],
    ),
    ("zero-trust", &["zero trust", "zero-trust", "never trust always verify"]),
    (
        "identity",
        &["digital identity", "authentication", "identity verification"],
    ),
    (
        "privacy",
        &["data privacy", "pii", "personal information", "gdpr"],
    ),
    (
        "access-control",
        &["access control", "authorization", "rbac", "abac"],
    ),
    ("audit", &["audit log", "logging", "monitoring", "siem"]),
    (
        "incident-response",
        &["incident response", "breach response"],
    ),
    (
        "risk-management",
        &["risk assessment", "risk analysis", "threat modeling"],
    ),
    (
        "supply-chain",
        &["supply chain security", "sbom", "vendor risk"],
    ),
];

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ConceptDictionary {
    concepts: BTreeMap<String, Vec<String>>,
}

impl Default for ConceptDictionary {
    fn default() -> Self {
        let concepts = DEFAULT_CONCEPTS
            .iter()
            .map(|(id, triggers)| {
                (
                    id.to_string(),
                    triggers.iter().map(|t| t.to_string()).collect(),
                )
            })
            .collect();
        Self { concepts }
    }
}

impl ConceptDictionary {
    /// Build a dictionary, lowercasing triggers.
    ///
    /// An empty table or a concept with no triggers is rejected.
    pub fn new(concepts: BTreeMap<String, Vec<String>>) -> Result<Self> {
        if concepts.is_empty() {
            return Err(AppError::Input("Concept dictionary is empty".to_string()));
        }

        let mut normalized = BTreeMap::new();
        for (id, triggers) in concepts {
            let id = id.trim().to_string();
            let triggers: Vec<String> = triggers
                .iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect();
            if id.is_empty() || triggers.is_empty() {
                return Err(AppError::Input(format!(
                    "Concept '{}' has no trigger phrases",
                    id
                )));
            }
            normalized.insert(id, triggers);
        }

        Ok(Self {
            concepts: normalized,
        })
    }

    /// Load a `{"concept-id": ["trigger", ...]}` JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let concepts: BTreeMap<String, Vec<String>> = serde_json::from_str(&raw)
            .map_err(|e| AppError::Input(format!("Invalid concept dictionary: {}", e)))?;
        Self::new(concepts)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.concepts
            .iter()
            .map(|(id, triggers)| (id.as_str(), triggers.as_slice()))
    }

    pub fn triggers(&self, concept_id: &str) -> Option<&[String]> {
        self.concepts.get(concept_id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    /// Trigger phrases of `concept_id` found in `lowercase_text`, in table order.
    pub fn matches<'a>(&'a self, concept_id: &str, lowercase_text: &str) -> Vec<&'a str> {
        self.concepts
            .get(concept_id)
            .map(|triggers| {
                triggers
                    .iter()
                    .filter(|t| lowercase_text.contains(t.as_str()))
                    .map(String::as_str)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// `access-control` -> `Access Control`.
pub fn display_name(concept_id: &str) -> String {
    concept_id
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
