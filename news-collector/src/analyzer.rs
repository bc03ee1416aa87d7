//! Lightweight text analysis used to vet and enrich extracted articles.

use crate::types::{EntitySpan, TextAnalyze};
use regex::Regex;

const MONTHS: &[&str] = &[
    "January", "February", "March", "April", "May", "June", "July", "August",
    "September", "October", "November", "December",
];
const WEEKDAYS: &[&str] = &[
    "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
];
const ORG_SUFFIXES: &[&str] = &[
    "Inc", "Corp", "Corporation", "Ltd", "LLC", "Company", "Co", "Group", "Bank",
    "University", "Agency", "Association", "Party", "Council", "Committee", "Ministry",
];
const PERSON_TITLES: &[&str] = &["Mr", "Mrs", "Ms", "Dr", "Sen", "Rep", "Gov", "President", "Prof"];
const PLACE_CUES: &[&str] = &["in", "at", "from", "to", "near"];
const STOP_CAPITALS: &[&str] = &[
    "The", "A", "An", "This", "That", "These", "Those", "It", "He", "She", "They", "We", "I",
    "But", "And", "Or", "If", "In", "On", "At", "For", "As", "By", "With", "From", "To",
];

/// Rule based analyzer: regex tokenizer plus capitalised-span entities.
///
/// Build one at startup and share it; the compiled patterns are the only
/// state.
#[derive(Debug, Clone)]
pub struct RuleTextAnalyzer {
    token: Regex,
    span: Regex,
}

impl RuleTextAnalyzer {
    pub fn new() -> Self {
        Self {
            // words (with inner apostrophes/hyphens), numbers, or single symbols
            token: Regex::new(r"[\p{L}\p{N}]+(?:['’\-][\p{L}\p{N}]+)*|[^\s\p{L}\p{N}]").unwrap(),
            span: Regex::new(r"\b\p{Lu}[\p{L}\-’']*(?:[ \t]+\p{Lu}[\p{L}\-’']*)*").unwrap(),
        }
    }

    fn label(&self, span: &str, preceding: &str) -> Option<&'static str> {
        let words: Vec<&str> = span.split_whitespace().collect();
        let first = *words.first()?;
        let last = *words.last()?;

        if MONTHS.contains(&first) || WEEKDAYS.contains(&first) {
            return Some("DATE");
        }
        if ORG_SUFFIXES.contains(&last) || words.iter().all(|w| w.len() > 1 && w.chars().all(char::is_uppercase)) {
            return Some("ORG");
        }
        if PERSON_TITLES.contains(&first) {
            return Some("PERSON");
        }
        let previous_word = preceding
            .split_whitespace()
            .last()
            .map(|w| w.to_lowercase())
            .unwrap_or_default();
        if PLACE_CUES.contains(&previous_word.as_str()) {
            return Some("GPE");
        }
        if words.len() >= 2 {
            return Some("PERSON");
        }
        Some("MISC")
    }
}

impl Default for RuleTextAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextAnalyze for RuleTextAnalyzer {
    fn token_count(&self, text: &str) -> usize {
        self.token.find_iter(text).count()
    }

    fn entities(&self, text: &str) -> Vec<EntitySpan> {
        let mut spans = Vec::new();

        for m in self.span.find_iter(text) {
            let preceding = &text[..m.start()];
            let at_sentence_start = preceding
                .trim_end()
                .chars()
                .last()
                .map_or(true, |c| matches!(c, '.' | '!' | '?' | '"' | '“'));

            let mut span = m.as_str().to_string();
            // Drop a leading capitalised function word ("The", "In", ...).
            if let Some((head, rest)) = span.split_once(char::is_whitespace) {
                if STOP_CAPITALS.contains(&head) {
                    span = rest.trim_start().to_string();
                }
            }
            if span.is_empty() || STOP_CAPITALS.contains(&span.as_str()) {
                continue;
            }
            // A lone capitalised word opening a sentence is usually just grammar.
            if at_sentence_start && !span.contains(char::is_whitespace) {
                continue;
            }

            if let Some(label) = self.label(&span, preceding) {
                spans.push(EntitySpan {
                    text: span,
                    label: label.to_string(),
                });
            }
        }

        spans
    }
}
