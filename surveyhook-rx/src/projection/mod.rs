//! Projection of an open-ended answer set onto the mirror's fixed columns
//!
//! The column catalog is data: an ordered list of `{column, rule}` entries
//! evaluated by one generic matcher. Order is precedence - the first entry
//! whose rule matches wins - so overlapping keyword sets resolve the same
//! way on every delivery.

pub mod catalog;
mod classifier;

pub use catalog::{CatalogEntry, CATALOG, CATCH_ALL_SLOTS, CATCH_ALL_TRIGGER};
pub use classifier::{match_catalog, Classification, Classifier, MatchOutcome, Question};

/// Keyword rule over a question's label and reference string
///
/// Fragments are lowercase; matching is case-insensitive and anchored at
/// the start of a word, so `city` finds "City" and "cities" but not
/// "capacity".
#[derive(Debug, Clone, Copy)]
pub enum MatchRule {
    /// At least one fragment is present
    AnyOf(&'static [&'static str]),
    /// Every fragment is present
    AllOf(&'static [&'static str]),
    /// At least one sub-rule matches
    Any(&'static [MatchRule]),
    /// Every sub-rule matches
    All(&'static [MatchRule]),
}

impl MatchRule {
    pub fn matches(&self, haystack: &Haystack) -> bool {
        match self {
            MatchRule::AnyOf(fragments) => fragments.iter().any(|f| haystack.contains(f)),
            MatchRule::AllOf(fragments) => {
                !fragments.is_empty() && fragments.iter().all(|f| haystack.contains(f))
            }
            MatchRule::Any(rules) => rules.iter().any(|r| r.matches(haystack)),
            MatchRule::All(rules) => !rules.is_empty() && rules.iter().all(|r| r.matches(haystack)),
        }
    }

    /// Every fragment reachable from this rule
    pub fn fragments(&self) -> Vec<&'static str> {
        match self {
            MatchRule::AnyOf(fragments) | MatchRule::AllOf(fragments) => fragments.to_vec(),
            MatchRule::Any(rules) | MatchRule::All(rules) => {
                rules.iter().flat_map(MatchRule::fragments).collect()
            }
        }
    }
}

/// Normalized text a rule is matched against
///
/// Both the label and the schema reference are searched. References are
/// machine-ish (`investment_budget`), so `_` and `-` read as spaces.
#[derive(Debug, Clone)]
pub struct Haystack {
    label: String,
    reference: String,
}

impl Haystack {
    pub fn new(label: &str, reference: Option<&str>) -> Self {
        let reference = reference
            .unwrap_or_default()
            .to_lowercase()
            .replace(['_', '-'], " ");
        Self {
            label: label.to_lowercase(),
            reference,
        }
    }

    pub fn contains(&self, fragment: &str) -> bool {
        starts_word(&self.label, fragment) || starts_word(&self.reference, fragment)
    }
}

/// `fragment` occurs in `text` beginning at a word boundary
fn starts_word(text: &str, fragment: &str) -> bool {
    if fragment.is_empty() {
        return false;
    }
    text.match_indices(fragment).any(|(start, _)| {
        text[..start]
            .chars()
            .next_back()
            .map_or(true, |prev| !prev.is_alphanumeric())
    })
}
