//! Column catalog for the survey mirror table
//!
//! Precedence is the order of [`CATALOG`]:
//! - Topic elaboration entries ("tell us more about X") come before the
//!   plain topic entries, otherwise the plain `invest` rule would swallow
//!   every investment follow-up.
//! - `Target Location` comes before `Investment Range`, so a label that
//!   mentions both ("Preferred investment location") is a location.
//! - `Experience Level` comes before the generic "how much" of
//!   `Investment Range` ("How much experience do you have?").
//! - Contact details come first. `Full Name` needs a name phrase, not the
//!   bare word "name", which also shows up in "business name".
//!
//! Adding a column means adding an entry here; the matcher never changes.

use super::MatchRule;

/// One target column and the rule that selects it
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub column: &'static str,
    pub rule: MatchRule,
}

const ELABORATION: MatchRule = MatchRule::AnyOf(&[
    "tell us more",
    "more about",
    "elaborate",
    "describe",
    "details",
]);

const INVESTMENT_TOPIC: MatchRule = MatchRule::AnyOf(&["invest", "budget", "capital"]);

const LOCATION_TOPIC: MatchRule = MatchRule::AnyOf(&[
    "location",
    "city",
    "region",
    "neighborhood",
    "neighbourhood",
    "target market",
]);

const TIMELINE_TOPIC: MatchRule = MatchRule::AnyOf(&["timeline", "timeframe", "time frame"]);

/// Ordered column catalog - first match wins
pub static CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        column: "Full Name",
        rule: MatchRule::AnyOf(&[
            "full name",
            "your name",
            "first and last name",
            "first & last name",
        ]),
    },
    CatalogEntry {
        column: "Email Address",
        rule: MatchRule::AnyOf(&["email", "e-mail"]),
    },
    CatalogEntry {
        column: "Phone Number",
        rule: MatchRule::AnyOf(&["phone", "mobile number", "telephone"]),
    },
    CatalogEntry {
        column: "Company",
        rule: MatchRule::AnyOf(&[
            "company",
            "organization",
            "organisation",
            "business name",
            "employer",
        ]),
    },
    CatalogEntry {
        column: "Job Title",
        rule: MatchRule::AnyOf(&["job title", "your role", "occupation"]),
    },
    CatalogEntry {
        column: "Investment Details",
        rule: MatchRule::All(&[ELABORATION, INVESTMENT_TOPIC]),
    },
    CatalogEntry {
        column: "Location Details",
        rule: MatchRule::All(&[ELABORATION, LOCATION_TOPIC]),
    },
    CatalogEntry {
        column: "Timeline Details",
        rule: MatchRule::All(&[ELABORATION, TIMELINE_TOPIC]),
    },
    CatalogEntry {
        column: "Target Location",
        rule: MatchRule::Any(&[LOCATION_TOPIC, MatchRule::AnyOf(&["where would you"])]),
    },
    CatalogEntry {
        column: "Experience Level",
        rule: MatchRule::AnyOf(&["experience", "first time", "first-time"]),
    },
    CatalogEntry {
        column: "Investment Range",
        rule: MatchRule::Any(&[
            INVESTMENT_TOPIC,
            MatchRule::AnyOf(&["price range", "how much"]),
        ]),
    },
    CatalogEntry {
        column: "Timeline",
        rule: MatchRule::Any(&[TIMELINE_TOPIC, MatchRule::AnyOf(&["how soon", "when are you"])]),
    },
    CatalogEntry {
        column: "Property Type",
        rule: MatchRule::AnyOf(&[
            "property type",
            "type of property",
            "kind of property",
            "asset class",
        ]),
    },
    CatalogEntry {
        column: "Financing",
        rule: MatchRule::AnyOf(&[
            "financing",
            "mortgage",
            "pre-approved",
            "preapproved",
            "cash buyer",
        ]),
    },
    CatalogEntry {
        column: "Referral Source",
        rule: MatchRule::AnyOf(&["hear about", "referral", "referred", "how did you find"]),
    },
    CatalogEntry {
        column: "Contact Preference",
        rule: MatchRule::AnyOf(&[
            "contact method",
            "best way to reach",
            "preferred contact",
            "contact preference",
        ]),
    },
    CatalogEntry {
        column: "Marketing Consent",
        rule: MatchRule::AnyOf(&["consent", "opt in", "opt-in", "newsletter", "agree to"]),
    },
];

/// Labels that mark an open "anything else?" question
pub const CATCH_ALL_TRIGGER: MatchRule = MatchRule::AnyOf(&[
    "anything else",
    "additional",
    "comment",
    "other thoughts",
    "tell us more",
    "more about",
    "elaborate",
    "describe",
    "share",
    "notes",
]);

/// Generic columns for unclassified elaboration questions, filled in order
pub const CATCH_ALL_SLOTS: [&str; 3] = [
    "Additional Notes 1",
    "Additional Notes 2",
    "Additional Notes 3",
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_columns_are_unique() {
        let mut seen = HashSet::new();
        for entry in CATALOG {
            assert!(seen.insert(entry.column), "duplicate column {}", entry.column);
        }
        for slot in CATCH_ALL_SLOTS {
            assert!(seen.insert(slot), "catch-all slot {} collides", slot);
        }
    }

    #[test]
    fn test_fragments_are_lowercase_and_non_empty() {
        let rules = CATALOG
            .iter()
            .map(|e| e.rule)
            .chain(std::iter::once(CATCH_ALL_TRIGGER));
        for rule in rules {
            for fragment in rule.fragments() {
                assert!(!fragment.trim().is_empty());
                assert_eq!(fragment, fragment.to_lowercase(), "fragment {:?}", fragment);
            }
        }
    }

    #[test]
    fn test_metadata_columns_not_in_catalog() {
        let reserved = ["Submission ID", "Submitted At", "Form Title", "Status"];
        for entry in CATALOG {
            assert!(!reserved.contains(&entry.column));
        }
    }

    fn column_for(label: &str) -> Option<&'static str> {
        let haystack = crate::projection::Haystack::new(label, None);
        CATALOG
            .iter()
            .find(|entry| entry.rule.matches(&haystack))
            .map(|entry| entry.column)
    }

    #[test]
    fn test_marketing_is_not_a_location() {
        assert_eq!(
            column_for("Do you agree to receive our marketing newsletter?"),
            Some("Marketing Consent")
        );
        assert_eq!(column_for("What is your target market?"), Some("Target Location"));
    }

    #[test]
    fn test_experience_beats_generic_how_much() {
        assert_eq!(
            column_for("How much real estate experience do you have?"),
            Some("Experience Level")
        );
        assert_eq!(column_for("How much are you looking to spend?"), Some("Investment Range"));
    }

    #[test]
    fn test_city_inside_other_words_is_ignored() {
        assert_eq!(column_for("What seating capacity do you need?"), None);
        assert_eq!(column_for("Which city are you targeting?"), Some("Target Location"));
    }
}
