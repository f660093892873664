//! Majority-vote aggregation of session preferences over a recent window.

use std::collections::BTreeMap;

use crate::models::Interaction;

/// Keywords kept per session, most frequent first.
pub const MAX_TOPICS: usize = 10;

/// Aggregated preferences for one session. The caller bounds the window,
/// normally to the five most recent interactions.
#[derive(Debug, Clone, PartialEq)]
pub struct PreferenceSnapshot {
    pub preferred_format: String,
    pub formality_level: String,
    pub preferred_length: String,
    pub topics_of_interest: Vec<String>,
}

impl Default for PreferenceSnapshot {
    fn default() -> Self {
        Self {
            preferred_format: "neutral".to_string(),
            formality_level: "neutral".to_string(),
            preferred_length: "medium".to_string(),
            topics_of_interest: Vec::new(),
        }
    }
}

/// Re-derives session preferences from the interactions in the window.
/// An empty window yields the neutral defaults.
pub fn aggregate_preferences(recent: &[Interaction]) -> PreferenceSnapshot {
    if recent.is_empty() {
        return PreferenceSnapshot::default();
    }

    let mut format_votes: BTreeMap<&str, usize> = BTreeMap::new();
    let mut formality_votes: BTreeMap<&str, usize> = BTreeMap::new();
    let mut length_votes: BTreeMap<&str, usize> = BTreeMap::new();
    let mut topic_counts: BTreeMap<&str, usize> = BTreeMap::new();

    for interaction in recent {
        let patterns = &interaction.input_patterns.0;
        *format_votes
            .entry(patterns.request_type.as_str())
            .or_default() += 1;
        *formality_votes
            .entry(patterns.formality_level.as_str())
            .or_default() += 1;
        *length_votes
            .entry(patterns.length_preference.as_str())
            .or_default() += 1;
        for keyword in &patterns.keywords {
            *topic_counts.entry(keyword.as_str()).or_default() += 1;
        }
    }

    PreferenceSnapshot {
        preferred_format: majority(&format_votes, "neutral"),
        formality_level: majority(&formality_votes, "neutral"),
        preferred_length: majority(&length_votes, "medium"),
        topics_of_interest: top_topics(&topic_counts),
    }
}

/// Winner of a vote map. Iteration is in key order, so with a strict
/// comparison a tie goes to the lexicographically smallest label.
fn majority(votes: &BTreeMap<&str, usize>, default: &str) -> String {
    let mut winner = default;
    let mut best = 0usize;
    for (&label, &count) in votes {
        if count > best {
            winner = label;
            best = count;
        }
    }
    winner.to_string()
}

/// Most frequent keywords, ties alphabetical, capped at [`MAX_TOPICS`].
fn top_topics(counts: &BTreeMap<&str, usize>) -> Vec<String> {
    let mut ranked: Vec<(&str, usize)> = counts.iter().map(|(&word, &n)| (word, n)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(MAX_TOPICS)
        .map(|(word, _)| word.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InputPatterns, InputType, ResponseFormat};
    use sqlx::types::Json;

    fn interaction_with(
        request_type: &str,
        formality: &str,
        length: &str,
        keywords: &[&str],
    ) -> Interaction {
        Interaction {
            id: "test-interaction".to_string(),
            session_id: "abc12345".to_string(),
            input_type: InputType::Text,
            user_input: String::new(),
            bot_response: String::new(),
            language_code: None,
            language_name: None,
            timestamp: 0,
            input_patterns: Json(InputPatterns {
                request_type: request_type.to_string(),
                formality_level: formality.to_string(),
                length_preference: length.to_string(),
                keywords: keywords.iter().map(|s| s.to_string()).collect(),
            }),
            response_format: Json(ResponseFormat {
                has_bullets: false,
                has_numbering: false,
                has_sections: false,
                has_emojis: false,
                format_type: "paragraph".to_string(),
            }),
            response_length: 0,
            feedback: None,
        }
    }

    #[test]
    fn empty_window_yields_defaults() {
        let snapshot = aggregate_preferences(&[]);
        assert_eq!(snapshot, PreferenceSnapshot::default());
    }

    #[test]
    fn majority_vote_wins() {
        let window = vec![
            interaction_with("structured", "formal", "short", &[]),
            interaction_with("structured", "casual", "short", &[]),
            interaction_with("structured", "casual", "detailed", &[]),
            interaction_with("paragraph", "casual", "short", &[]),
        ];

        let snapshot = aggregate_preferences(&window);

        assert_eq!(snapshot.preferred_format, "structured");
        assert_eq!(snapshot.formality_level, "casual");
        assert_eq!(snapshot.preferred_length, "short");
    }

    #[test]
    fn ties_break_to_smallest_label() {
        let window = vec![
            interaction_with("structured", "formal", "detailed", &[]),
            interaction_with("casual", "casual", "short", &[]),
        ];

        let snapshot = aggregate_preferences(&window);

        assert_eq!(snapshot.preferred_format, "casual");
        assert_eq!(snapshot.formality_level, "casual");
        assert_eq!(snapshot.preferred_length, "detailed");
    }

    #[test]
    fn topics_ranked_by_count_then_alphabetical() {
        let window = vec![
            interaction_with("neutral", "neutral", "medium", &["karma", "dharma"]),
            interaction_with("neutral", "neutral", "medium", &["karma", "arjuna"]),
        ];

        let snapshot = aggregate_preferences(&window);

        assert_eq!(snapshot.topics_of_interest, vec!["karma", "arjuna", "dharma"]);
    }

    #[test]
    fn topics_capped_at_ten() {
        let keywords: Vec<String> = (0..12).map(|i| format!("topic{i:02}")).collect();
        let refs: Vec<&str> = keywords.iter().map(String::as_str).collect();
        let window = vec![interaction_with("neutral", "neutral", "medium", &refs)];

        let snapshot = aggregate_preferences(&window);

        assert_eq!(snapshot.topics_of_interest.len(), MAX_TOPICS);
        assert_eq!(snapshot.topics_of_interest[0], "topic00");
    }
}
