//! Recognisers for identifier-shaped entities.

use once_cell::sync::Lazy;
use regex::Regex;

/// Two-letter family, dash, number, optional `(n)` enhancement.
///
/// The enhancement may be separated by one space so that detached markers
/// (`AC-2 (1)`) are seen and then rejected by the literal re-check.
pub static CODE_IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?P<family>[A-Z]{2})-(?P<number>\d+)\b(?:\s?\((?P<enhancement>\d+)\))?")
        .expect("code identifier pattern is valid")
});

/// `SP` prefix (optionally preceded by `NIST`) followed by a series-number code.
pub static PUBLICATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:(?i:nist)\s+)?SP[\s-](?P<code>\d{3}-\d+[A-Z]?(?:r\d+)?)\b")
        .expect("publication pattern is valid")
});

/// A recognised code identifier, after the literal re-check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeMatch {
    pub id: String,
    pub family: String,
    pub number: String,
    pub enhancement: Option<String>,
}

/// Find code identifiers in `text`, in order of appearance (repeats included).
///
/// A composed `FAMILY-N(E)` is only returned when that exact string occurs in
/// `text`; otherwise the bare `FAMILY-N` is used. Matches immediately followed
/// by `-<digit>` belong to a longer publication code and are dropped.
pub fn find_code_identifiers(text: &str) -> Vec<CodeMatch> {
    let mut found = Vec::new();

    for caps in CODE_IDENTIFIER.captures_iter(text) {
        let (Some(family), Some(number)) = (caps.name("family"), caps.name("number")) else {
            continue;
        };

        if continues_as_publication(&text[number.end()..]) {
            continue;
        }

        let base = format!("{}-{}", family.as_str(), number.as_str());
        let enhancement = caps.name("enhancement").map(|m| m.as_str().to_string());

        let (id, enhancement) = match enhancement {
            Some(enh) => {
                let composed = format!("{}({})", base, enh);
                if text.contains(&composed) {
                    (composed, Some(enh))
                } else {
                    (base, None)
                }
            }
            None => (base, None),
        };

        if !text.contains(&id) {
            continue;
        }

        found.push(CodeMatch {
            id,
            family: family.as_str().to_string(),
            number: number.as_str().to_string(),
            enhancement,
        });
    }

    found
}

/// Find publication codes in `text`, in order of appearance (repeats included).
pub fn find_publications(text: &str) -> Vec<String> {
    PUBLICATION
        .captures_iter(text)
        .filter_map(|caps| caps.name("code").map(|m| m.as_str().to_string()))
        .collect()
}

fn continues_as_publication(rest: &str) -> bool {
    let mut chars = rest.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some('-'), Some(c)) if c.is_ascii_digit()
    )
}
