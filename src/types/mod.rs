pub mod entity;
pub mod error;
pub mod relation;
pub mod search;

pub use entity::{CorpusDocument, Entity, EntityKind, Properties};
pub use error::{AppError, Result};
pub use relation::{Relation, RelationKind};
pub use search::{
    GraphSignal, Origin, Passage, PassageMetadata, QueryDiagnostics, QueryOutcome, QueryStage,
    RetrievedPassage,
};
