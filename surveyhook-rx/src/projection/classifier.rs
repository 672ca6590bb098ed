//! Per-event question classifier

use surveyhook_common::models::AnswerKind;

use super::{CatalogEntry, Haystack, MatchRule, CATALOG, CATCH_ALL_SLOTS, CATCH_ALL_TRIGGER};

const EMAIL_COLUMN: &str = "Email Address";
const PHONE_COLUMN: &str = "Phone Number";

/// What the classifier knows about one question
#[derive(Debug, Clone, Copy)]
pub struct Question<'a> {
    pub label: &'a str,
    pub reference: Option<&'a str>,
    pub kind: &'a AnswerKind,
}

/// How a column was (or was not) chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// A catalog entry matched
    Catalog,
    /// No entry matched; the answer kind implied the column
    KindHint,
    /// No entry matched; the value's shape implied the column
    ValueHint,
    /// Assigned the next free catch-all slot
    CatchAll { slot: usize },
    /// Catch-all question, but every slot is taken
    Overflow,
    /// Nothing applies
    Unmapped,
}

/// Classifier verdict for one question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub column: Option<&'static str>,
    pub outcome: MatchOutcome,
}

impl Classification {
    fn mapped(column: &'static str, outcome: MatchOutcome) -> Self {
        Self {
            column: Some(column),
            outcome,
        }
    }

    fn unmapped(outcome: MatchOutcome) -> Self {
        Self {
            column: None,
            outcome,
        }
    }

    pub fn is_mapped(&self) -> bool {
        self.column.is_some()
    }
}

/// First catalog column whose rule matches
pub fn match_catalog(catalog: &[CatalogEntry], haystack: &Haystack) -> Option<&'static str> {
    catalog
        .iter()
        .find(|entry| entry.rule.matches(haystack))
        .map(|entry| entry.column)
}

/// Classifies the questions of one event
///
/// Holds the catch-all slot cursor, so a fresh classifier is needed per
/// event. Slots are handed out in encounter order and never reused.
#[derive(Debug, Clone)]
pub struct Classifier {
    catalog: &'static [CatalogEntry],
    trigger: MatchRule,
    slots: &'static [&'static str],
    next_slot: usize,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    /// Classifier over the built-in catalog
    pub fn new() -> Self {
        Self::with_catalog(CATALOG, CATCH_ALL_TRIGGER, &CATCH_ALL_SLOTS)
    }

    pub fn with_catalog(
        catalog: &'static [CatalogEntry],
        trigger: MatchRule,
        slots: &'static [&'static str],
    ) -> Self {
        Self {
            catalog,
            trigger,
            slots,
            next_slot: 0,
        }
    }

    /// Catch-all slots still free in this event
    pub fn remaining_slots(&self) -> usize {
        self.slots.len().saturating_sub(self.next_slot)
    }

    /// Pick the target column for one question
    ///
    /// Order: catalog, kind hint, value hint, catch-all. Answers of
    /// unrecognized kinds are never projected.
    pub fn classify(&mut self, question: &Question<'_>, value: &str) -> Classification {
        if !question.kind.is_recognized() {
            return Classification::unmapped(MatchOutcome::Unmapped);
        }

        let haystack = Haystack::new(question.label, question.reference);

        if let Some(column) = match_catalog(self.catalog, &haystack) {
            return Classification::mapped(column, MatchOutcome::Catalog);
        }

        match question.kind {
            AnswerKind::Email => return Classification::mapped(EMAIL_COLUMN, MatchOutcome::KindHint),
            AnswerKind::PhoneNumber => {
                return Classification::mapped(PHONE_COLUMN, MatchOutcome::KindHint)
            }
            _ => {}
        }

        if looks_like_email(value) {
            return Classification::mapped(EMAIL_COLUMN, MatchOutcome::ValueHint);
        }

        if self.trigger.matches(&haystack) {
            return match self.slots.get(self.next_slot) {
                Some(column) => {
                    let slot = self.next_slot;
                    self.next_slot += 1;
                    Classification::mapped(column, MatchOutcome::CatchAll { slot })
                }
                None => Classification::unmapped(MatchOutcome::Overflow),
            };
        }

        Classification::unmapped(MatchOutcome::Unmapped)
    }
}

/// `local@domain.tld` with no whitespace
fn looks_like_email(value: &str) -> bool {
    let value = value.trim();
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}
