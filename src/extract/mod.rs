//! Entity recognition
//!
//! - `patterns`: regex recognisers for code identifiers and publications
//! - `concepts`: configurable concept dictionary
//! - `registry`: deduplicating id -> entity map
//! - `extractor`: ties the recognisers to the registry

pub mod concepts;
pub mod extractor;
pub mod patterns;
pub mod registry;

pub use concepts::ConceptDictionary;
pub use extractor::EntityExtractor;
pub use registry::{EntityFrequency, EntityRegistry, RegistryStatistics};
