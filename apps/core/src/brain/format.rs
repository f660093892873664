//! Shape classification of generated responses. A pure function of the text,
//! used both for preference learning and for feedback context.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::ResponseFormat;

static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*[-•*]").expect("Invalid regex: bullet pattern"));
static NUMBERING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*\d+\.").expect("Invalid regex: numbering pattern"));
static SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*.*\*\*").expect("Invalid regex: section pattern"));

/// Classifies the shape of a response.
///
/// `format_type` is "structured" when bold section markers pair with a listing
/// style, "paragraph" when none of the structural markers appear at all, and
/// "mixed" otherwise. Emojis are reported but never change the format type.
pub fn detect_response_format(text: &str) -> ResponseFormat {
    let has_bullets = BULLET_RE.is_match(text);
    let has_numbering = NUMBERING_RE.is_match(text);
    let has_sections = SECTION_RE.is_match(text);
    let has_emojis = contains_emoji(text);

    let format_type = if has_sections && (has_bullets || has_numbering) {
        "structured"
    } else if !has_bullets && !has_numbering && !has_sections {
        "paragraph"
    } else {
        "mixed"
    };

    ResponseFormat {
        has_bullets,
        has_numbering,
        has_sections,
        has_emojis,
        format_type: format_type.to_string(),
    }
}

fn contains_emoji(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c,
            '\u{1F600}'..='\u{1F64F}'
                | '\u{1F300}'..='\u{1F5FF}'
                | '\u{1F680}'..='\u{1F6FF}'
                | '\u{1F1E0}'..='\u{1F1FF}')
    })
}
