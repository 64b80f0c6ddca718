//! Lexical entity extraction.
//!
//! Entities are extracted from keyword tables, not from a model: the matcher
//! is deterministic and cheap enough to run on every request before any tier
//! is selected. Values are normalized lowercase; the map holds at most one
//! value per kind.

use ekimate_core::{EntityKind, EntityMap};

/// Stations and places a player can ask to reach.
const DESTINATIONS: &[&str] = &[
    "odawara",
    "tokyo",
    "shinjuku",
    "shibuya",
    "ueno",
    "yokohama",
    "akihabara",
    "kyoto",
    "osaka",
    "nagoya",
];

/// Ticket categories. Multi-word entries are matched as substrings.
const TICKET_TYPES: &[&str] = &[
    "one-way",
    "one way",
    "round-trip",
    "round trip",
    "express",
    "local",
    "reserved",
    "unreserved",
];

/// Grammar particles and patterns. Single-letter/short particles collide
/// with common English words, so these only match when quoted or preceded
/// by the word "particle".
const GRAMMAR_POINTS: &[&str] = &[
    "wa", "ga", "wo", "o", "ni", "de", "e", "no", "ka", "made", "kara", "desu", "masu",
];

/// Station fixtures a player can ask about.
const LOCATION_REFS: &[&str] = &[
    "ticket machine",
    "ticket gate",
    "ticket office",
    "information desk",
    "platform",
    "entrance",
    "exit",
    "gate",
    "stairs",
    "escalator",
    "map",
];

/// Deterministic keyword-table entity matcher.
#[derive(Debug, Default, Clone)]
pub struct EntityMatcher;

impl EntityMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Extract all entities from the request text.
    pub fn extract(&self, text: &str) -> EntityMap {
        let lower = text.to_lowercase();
        let tokens: Vec<&str> = tokenize(&lower);
        let mut entities = EntityMap::new();

        for dest in DESTINATIONS {
            if tokens.contains(dest) {
                entities.insert(EntityKind::Destination, (*dest).to_string());
                break;
            }
        }

        for ticket in TICKET_TYPES {
            if lower.contains(ticket) {
                // Normalize spaced variants to the hyphenated form.
                let value = ticket.replace(' ', "-");
                entities.insert(EntityKind::TicketType, value);
                break;
            }
        }

        // Multi-word fixtures are listed first so they win over their
        // substrings ("ticket gate" before "gate").
        for loc in LOCATION_REFS {
            if lower.contains(loc) {
                entities.insert(EntityKind::LocationRef, (*loc).to_string());
                break;
            }
        }

        if let Some(point) = self.grammar_point(&lower, &tokens) {
            entities.insert(EntityKind::GrammarPoint, point);
        }

        if let Some(word) = self.vocab_word(&lower, &tokens) {
            // A quoted particle is a grammar question, not a vocab one.
            if entities.get(&EntityKind::GrammarPoint) != Some(&word) {
                entities.insert(EntityKind::VocabWord, word);
            }
        }

        entities
    }

    /// A grammar particle, if quoted or named after the word "particle".
    fn grammar_point(&self, lower: &str, tokens: &[&str]) -> Option<String> {
        if let Some(pos) = tokens.iter().position(|t| *t == "particle") {
            if let Some(next) = tokens.get(pos + 1) {
                if GRAMMAR_POINTS.contains(next) {
                    return Some((*next).to_string());
                }
            }
        }

        for quoted in quoted_spans(lower) {
            if GRAMMAR_POINTS.contains(&quoted) {
                return Some(quoted.to_string());
            }
        }

        None
    }

    /// The word being asked about: a quoted span, or the X in
    /// "what does X mean" / "how do i say X".
    fn vocab_word(&self, lower: &str, tokens: &[&str]) -> Option<String> {
        for quoted in quoted_spans(lower) {
            if !quoted.is_empty() {
                return Some(quoted.to_string());
            }
        }

        // "what does kippu mean"
        if let Some(pos) = tokens.iter().position(|t| *t == "does") {
            if tokens.get(pos + 2) == Some(&"mean") {
                return tokens.get(pos + 1).map(|t| (*t).to_string());
            }
        }

        // "how do i say ticket" — capture the trailing word
        if lower.contains("how do i say") || lower.contains("how to say") {
            if let Some(last) = tokens.last() {
                if *last != "say" {
                    return Some((*last).to_string());
                }
            }
        }

        None
    }
}

/// Split on non-alphanumeric boundaries, keeping hyphens inside tokens.
fn tokenize(lower: &str) -> Vec<&str> {
    lower
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|t| !t.is_empty())
        .collect()
}

/// Contents of single- or double-quoted spans, in order of appearance.
/// An apostrophe flanked by letters is a contraction, not a quote, and
/// never opens or closes a span.
fn quoted_spans(lower: &str) -> Vec<&str> {
    let bytes = lower.as_bytes();
    let mut spans = Vec::new();
    for quote in ['\'', '"'] {
        let mut open: Option<usize> = None;
        for (i, c) in lower.char_indices() {
            if c != quote {
                continue;
            }
            if quote == '\''
                && i > 0
                && bytes[i - 1].is_ascii_alphanumeric()
                && bytes.get(i + 1).is_some_and(|b| b.is_ascii_alphanumeric())
            {
                continue;
            }
            match open.take() {
                None => open = Some(i),
                Some(start) => {
                    let inner = lower[start + 1..i].trim();
                    if !inner.is_empty() {
                        spans.push(inner);
                    }
                }
            }
        }
    }
    spans
}
