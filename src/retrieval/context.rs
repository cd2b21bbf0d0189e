use std::fmt::Write;

use crate::types::{Origin, RetrievedPassage};

/// Citation header for the `number`-th passage.
///
/// `[3] (graph via AC-2) source=sp800-53.pdf location=12`
pub fn citation(number: usize, passage: &RetrievedPassage) -> String {
    let origin = match (&passage.origin, &passage.entity_id) {
        (Origin::Graph, Some(entity)) => format!("graph via {}", entity),
        (origin, _) => origin.to_string(),
    };
    let meta = &passage.passage.metadata;
    format!(
        "[{}] ({}) source={} location={}",
        number,
        origin,
        if meta.source.is_empty() { "Unknown" } else { &meta.source },
        meta.location.as_deref().unwrap_or("N/A")
    )
}

/// Render passages as numbered citation blocks, numbering from 1 in the
/// order given.
pub fn render_context<'a>(passages: impl IntoIterator<Item = &'a RetrievedPassage>) -> String {
    let mut context = String::new();
    for (i, passage) in passages.into_iter().enumerate() {
        // writing to a String cannot fail
        let _ = write!(
            context,
            "{}\n{}\n\n",
            citation(i + 1, passage),
            passage.passage.text
        );
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Passage, PassageMetadata};

    #[test]
    fn test_render_numbers_in_order() {
        let passages = vec![
            RetrievedPassage::vector(Passage::new(
                "AC-2 account management",
                PassageMetadata::new("sp800-53.pdf", Some("12".to_string())),
            )),
            RetrievedPassage::graph(
                Passage::new("Family overview", PassageMetadata::new("", None)),
                "FAMILY-AC",
            ),
        ];

        let context = render_context(&passages);
        assert_eq!(
            context,
            "[1] (vector) source=sp800-53.pdf location=12\nAC-2 account management\n\n\
             [2] (graph via FAMILY-AC) source=Unknown location=N/A\nFamily overview\n\n"
        );
        assert!(render_context(std::iter::empty()).is_empty());
    }
}
