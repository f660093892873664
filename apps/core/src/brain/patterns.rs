//! Lexical analysis of user messages: request type, formality, length
//! preference and keyword extraction. Single-pass substring and regex checks,
//! no weighting.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::InputPatterns;

/// Cues for a prose-style answer. Checked first.
const PARAGRAPH_CUES: &[&str] = &["paragraph", "write", "describe", "tell me about", "essay"];
/// Cues for a list/step-style answer.
const STRUCTURED_CUES: &[&str] = &["explain", "list", "break down", "steps", "outline"];
/// Greeting smalltalk. Substring matches on purpose, like the cue sets above.
const CASUAL_CUES: &[&str] = &["hi", "hello", "thanks", "how are you"];

const FORMAL_CUES: &[&str] = &["please", "could you", "would you", "kindly", "sir", "madam"];
const INFORMAL_CUES: &[&str] = &["hey", "yo", "sup", "what's up", "cool", "awesome"];

/// Words too generic to be useful topics.
const KEYWORD_STOPWORDS: &[&str] = &[
    "the", "and", "you", "for", "are", "with", "can", "about", "what", "how", "that", "this",
];

/// Cap on extracted keywords per message.
pub const MAX_KEYWORDS: usize = 10;

static KEYWORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-zA-Z]{3,}\b").expect("Invalid regex: keyword pattern"));

/// Classifies one message into request-type, formality and length buckets and
/// extracts its keywords.
pub fn analyze_patterns(text: &str) -> InputPatterns {
    let lowered = text.to_lowercase();

    let request_type = if contains_any(&lowered, PARAGRAPH_CUES) {
        "paragraph"
    } else if contains_any(&lowered, STRUCTURED_CUES) {
        "structured"
    } else if contains_any(&lowered, CASUAL_CUES) {
        "casual"
    } else {
        "mixed"
    };

    let formality_level = if contains_any(&lowered, FORMAL_CUES) {
        "formal"
    } else if contains_any(&lowered, INFORMAL_CUES) {
        "casual"
    } else {
        "neutral"
    };

    let char_count = text.chars().count();
    let length_preference = if char_count < 20 {
        "short"
    } else if char_count > 100 {
        "detailed"
    } else {
        "medium"
    };

    InputPatterns {
        request_type: request_type.to_string(),
        formality_level: formality_level.to_string(),
        length_preference: length_preference.to_string(),
        keywords: extract_keywords(text),
    }
}

/// Alphabetic tokens of 3+ characters, stopwords removed, first
/// `MAX_KEYWORDS` in order of appearance. Repeats are kept so the topic
/// aggregation sees real frequencies.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    KEYWORD_RE
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .filter(|word| !KEYWORD_STOPWORDS.contains(&word.as_str()))
        .take(MAX_KEYWORDS)
        .collect()
}

fn contains_any(lowered: &str, cues: &[&str]) -> bool {
    cues.iter().any(|cue| lowered.contains(cue))
}
