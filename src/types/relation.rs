use serde::{Deserialize, Serialize};

use super::entity::Properties;
use super::error::{AppError, Result};

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    CoOccurrence,
    Hierarchy,
    Semantic,
    Temporal,
}

impl RelationKind {
    pub const ALL: [RelationKind; 4] = [
        RelationKind::CoOccurrence,
        RelationKind::Hierarchy,
        RelationKind::Semantic,
        RelationKind::Temporal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CoOccurrence => "co_occurrence",
            Self::Hierarchy => "hierarchy",
            Self::Semantic => "semantic",
            Self::Temporal => "temporal",
        }
    }

    /// Whether edges of this kind are materialised in both directions.
    pub fn is_symmetric(&self) -> bool {
        matches!(self, Self::CoOccurrence)
    }
}

impl std::str::FromStr for RelationKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "co_occurrence" | "co-occurrence" | "cooccurrence" => Ok(Self::CoOccurrence),
            "hierarchy" | "contains" => Ok(Self::Hierarchy),
            "semantic" => Ok(Self::Semantic),
            "temporal" => Ok(Self::Temporal),
            _ => Err(AppError::Input(format!("Unknown relation kind: {}", s))),
        }
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Typed, weighted directed edge between two entity ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Relation {
    pub source: String,
    pub target: String,
    pub kind: RelationKind,

    #[serde(default = "default_weight")]
    pub weight: f64,

    #[serde(default)]
    pub properties: Properties,
}

impl Relation {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: RelationKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            weight: default_weight(),
            properties: Properties::new(),
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_property(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_relation_kind_from_str() {
        assert_eq!(
            RelationKind::from_str("co-occurrence").unwrap(),
            RelationKind::CoOccurrence
        );
        assert_eq!(
            RelationKind::from_str("HIERARCHY").unwrap(),
            RelationKind::Hierarchy
        );
        assert!(matches!(
            RelationKind::from_str("knows"),
            Err(AppError::Input(_))
        ));
    }

    #[test]
    fn test_relation_kind_serde_names() {
        let json = serde_json::to_string(&RelationKind::CoOccurrence).unwrap();
        assert_eq!(json, "\"co_occurrence\"");
        for kind in RelationKind::ALL {
            assert_eq!(RelationKind::from_str(kind.as_str()).unwrap(), kind);
        }
    }
}
