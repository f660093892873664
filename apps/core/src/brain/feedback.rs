//! Feedback-driven preference updates and the effectiveness estimate.

use chrono::Utc;

use crate::models::{
    FeedbackHistoryEntry, FeedbackRecord, FeedbackType, Interaction, InteractionContext,
    LearnedPreference, LearningEffectiveness,
};

/// Feedback history entries kept per session, oldest evicted.
pub const MAX_FEEDBACK_HISTORY: usize = 20;

/// Below this many recent records the effectiveness estimate is withheld.
pub const MIN_RECORDS_FOR_EFFECTIVENESS: usize = 10;

/// Applies one feedback event to the session's learned preferences.
///
/// Corrective labels rewrite the matching preference field; `thumbs_up`
/// reinforces the response's own format; `thumbs_down` and `off_topic` are
/// logged without a field change. Every event lands in the bounded history
/// and bumps the feedback counter.
pub fn apply_feedback(
    prefs: &mut LearnedPreference,
    feedback_type: FeedbackType,
    interaction: &Interaction,
) {
    let patterns = &interaction.input_patterns.0;
    let format = &interaction.response_format.0;

    match feedback_type {
        FeedbackType::FormatMismatch => {
            prefs.preferred_format = patterns.request_type.clone();
        }
        FeedbackType::TooLong => {
            prefs.preferred_length = "short".to_string();
        }
        FeedbackType::TooShort => {
            prefs.preferred_length = "detailed".to_string();
        }
        FeedbackType::ThumbsUp => {
            prefs.preferred_format = format.format_type.clone();
        }
        FeedbackType::ThumbsDown | FeedbackType::OffTopic => {}
    }

    let history = &mut prefs.feedback_history.0;
    history.push(FeedbackHistoryEntry {
        feedback_type,
        timestamp: Utc::now(),
        interaction_context: InteractionContext {
            request_type: patterns.request_type.clone(),
            response_format: format.format_type.clone(),
            response_length: interaction.response_length,
        },
    });
    if history.len() > MAX_FEEDBACK_HISTORY {
        let excess = history.len() - MAX_FEEDBACK_HISTORY;
        history.drain(..excess);
    }

    prefs.total_feedback_count += 1;
    prefs.last_updated = Utc::now().timestamp();
}

/// Template suggestions persisted alongside each feedback record. Consumed by
/// the analytics endpoint, not by the learner itself.
pub fn improvement_suggestions(
    feedback_type: FeedbackType,
    interaction: &Interaction,
) -> Vec<String> {
    match feedback_type {
        FeedbackType::FormatMismatch => vec![
            format!(
                "User requested {} format but got different format",
                interaction.input_patterns.0.request_type
            ),
            "Improve format detection and matching".to_string(),
        ],
        FeedbackType::TooLong => vec![
            format!(
                "Response was {} chars - user prefers shorter responses",
                interaction.response_length
            ),
            "Reduce response length for this user".to_string(),
        ],
        FeedbackType::TooShort => vec![
            format!(
                "Response was {} chars - user wants more detail",
                interaction.response_length
            ),
            "Increase response depth for this user".to_string(),
        ],
        FeedbackType::OffTopic => vec![
            "Improve topic relevance detection".to_string(),
            "Better analyze user intent and stay focused".to_string(),
        ],
        FeedbackType::ThumbsUp => vec![
            "This response format and style worked well".to_string(),
            "Reinforce similar patterns for this user".to_string(),
        ],
        FeedbackType::ThumbsDown => vec![
            "General dissatisfaction - analyze all aspects".to_string(),
            "Review format, tone, and content relevance".to_string(),
        ],
    }
}

/// Estimates how well the learning loop is doing from the most recent
/// feedback records (the caller passes at most 50, newest first).
///
/// `thumbs_up` counts as positive; `thumbs_down`, `format_mismatch` and
/// `off_topic` as negative; the length labels count as neither.
pub fn calculate_effectiveness(records: &[FeedbackRecord]) -> LearningEffectiveness {
    if records.len() < MIN_RECORDS_FOR_EFFECTIVENESS {
        return LearningEffectiveness::Insufficient {
            status: "Insufficient data for effectiveness calculation".to_string(),
        };
    }

    let positive = records
        .iter()
        .filter(|r| r.feedback_type == FeedbackType::ThumbsUp)
        .count();
    let negative = records
        .iter()
        .filter(|r| {
            matches!(
                r.feedback_type,
                FeedbackType::ThumbsDown | FeedbackType::FormatMismatch | FeedbackType::OffTopic
            )
        })
        .count();

    let total = positive + negative;
    if total == 0 {
        return LearningEffectiveness::Insufficient {
            status: "No explicit positive/negative feedback received".to_string(),
        };
    }

    let ratio = positive as f64 / total as f64;
    let improvement_status = if ratio > 0.7 {
        "improving"
    } else {
        "needs_improvement"
    };

    LearningEffectiveness::Report {
        effectiveness_percentage: (ratio * 1000.0).round() / 10.0,
        recent_feedback_analyzed: records.len(),
        positive_feedback: positive,
        negative_feedback: negative,
        improvement_status: improvement_status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InputPatterns, InputType, ResponseFormat};
    use sqlx::types::Json;

    fn interaction(request_type: &str, format_type: &str, response_length: i64) -> Interaction {
        Interaction {
            id: "test-interaction".to_string(),
            session_id: "abc12345".to_string(),
            input_type: InputType::Text,
            user_input: "tell me about karna".to_string(),
            bot_response: "Karna was the son of Surya.".to_string(),
            language_code: None,
            language_name: None,
            timestamp: 0,
            input_patterns: Json(InputPatterns {
                request_type: request_type.to_string(),
                formality_level: "neutral".to_string(),
                length_preference: "medium".to_string(),
                keywords: vec!["karna".to_string()],
            }),
            response_format: Json(ResponseFormat {
                has_bullets: false,
                has_numbering: false,
                has_sections: false,
                has_emojis: false,
                format_type: format_type.to_string(),
            }),
            response_length,
            feedback: None,
        }
    }

    fn record(feedback_type: FeedbackType) -> FeedbackRecord {
        FeedbackRecord {
            id: 0,
            interaction_id: "test-interaction".to_string(),
            session_id: "abc12345".to_string(),
            feedback_type,
            feedback_text: None,
            user_input: String::new(),
            bot_response: String::new(),
            input_patterns: Json(InputPatterns {
                request_type: "neutral".to_string(),
                formality_level: "neutral".to_string(),
                length_preference: "medium".to_string(),
                keywords: Vec::new(),
            }),
            response_format: Json(ResponseFormat {
                has_bullets: false,
                has_numbering: false,
                has_sections: false,
                has_emojis: false,
                format_type: "paragraph".to_string(),
            }),
            improvement_suggestions: Json(Vec::new()),
            timestamp: 0,
        }
    }

    #[test]
    fn too_long_prefers_short() {
        let mut prefs = LearnedPreference::new("abc12345");
        apply_feedback(&mut prefs, FeedbackType::TooLong, &interaction("neutral", "paragraph", 900));
        assert_eq!(prefs.preferred_length, "short");
        assert_eq!(prefs.total_feedback_count, 1);
    }

    #[test]
    fn too_short_prefers_detailed() {
        let mut prefs = LearnedPreference::new("abc12345");
        apply_feedback(&mut prefs, FeedbackType::TooShort, &interaction("neutral", "paragraph", 40));
        assert_eq!(prefs.preferred_length, "detailed");
    }

    #[test]
    fn format_mismatch_adopts_requested_format() {
        let mut prefs = LearnedPreference::new("abc12345");
        apply_feedback(
            &mut prefs,
            FeedbackType::FormatMismatch,
            &interaction("structured", "paragraph", 200),
        );
        assert_eq!(prefs.preferred_format, "structured");
    }

    #[test]
    fn thumbs_up_reinforces_delivered_format() {
        let mut prefs = LearnedPreference::new("abc12345");
        apply_feedback(
            &mut prefs,
            FeedbackType::ThumbsUp,
            &interaction("neutral", "structured", 200),
        );
        assert_eq!(prefs.preferred_format, "structured");
    }

    #[test]
    fn thumbs_down_only_logs() {
        let mut prefs = LearnedPreference::new("abc12345");
        apply_feedback(
            &mut prefs,
            FeedbackType::ThumbsDown,
            &interaction("structured", "paragraph", 200),
        );
        assert_eq!(prefs.preferred_format, "neutral");
        assert_eq!(prefs.preferred_length, "medium");
        assert_eq!(prefs.feedback_history.0.len(), 1);
        assert_eq!(prefs.total_feedback_count, 1);
    }

    #[test]
    fn history_bounded_at_twenty_oldest_evicted() {
        let mut prefs = LearnedPreference::new("abc12345");
        for n in 0..25 {
            apply_feedback(
                &mut prefs,
                FeedbackType::ThumbsDown,
                &interaction("neutral", "paragraph", n),
            );
        }
        assert_eq!(prefs.feedback_history.0.len(), MAX_FEEDBACK_HISTORY);
        assert_eq!(prefs.feedback_history.0[0].interaction_context.response_length, 5);
        assert_eq!(prefs.feedback_history.0[19].interaction_context.response_length, 24);
        assert_eq!(prefs.total_feedback_count, 25);
    }

    #[test]
    fn suggestions_carry_interaction_details() {
        let long = improvement_suggestions(FeedbackType::TooLong, &interaction("neutral", "paragraph", 1234));
        assert_eq!(
            long[0],
            "Response was 1234 chars - user prefers shorter responses"
        );

        let mismatch =
            improvement_suggestions(FeedbackType::FormatMismatch, &interaction("structured", "paragraph", 10));
        assert_eq!(
            mismatch[0],
            "User requested structured format but got different format"
        );
    }

    #[test]
    fn effectiveness_needs_ten_records() {
        let records: Vec<FeedbackRecord> = (0..9).map(|_| record(FeedbackType::ThumbsUp)).collect();
        assert_eq!(
            calculate_effectiveness(&records),
            LearningEffectiveness::Insufficient {
                status: "Insufficient data for effectiveness calculation".to_string()
            }
        );
    }

    #[test]
    fn effectiveness_needs_signed_feedback() {
        let records: Vec<FeedbackRecord> = (0..12).map(|_| record(FeedbackType::TooLong)).collect();
        assert_eq!(
            calculate_effectiveness(&records),
            LearningEffectiveness::Insufficient {
                status: "No explicit positive/negative feedback received".to_string()
            }
        );
    }

    #[test]
    fn effectiveness_ratio_and_status() {
        let mut records: Vec<FeedbackRecord> =
            (0..8).map(|_| record(FeedbackType::ThumbsUp)).collect();
        records.push(record(FeedbackType::ThumbsDown));
        records.push(record(FeedbackType::OffTopic));

        match calculate_effectiveness(&records) {
            LearningEffectiveness::Report {
                effectiveness_percentage,
                recent_feedback_analyzed,
                positive_feedback,
                negative_feedback,
                improvement_status,
            } => {
                assert_eq!(effectiveness_percentage, 80.0);
                assert_eq!(recent_feedback_analyzed, 10);
                assert_eq!(positive_feedback, 8);
                assert_eq!(negative_feedback, 2);
                assert_eq!(improvement_status, "improving");
            }
            other => panic!("expected a report, got {other:?}"),
        }
    }

    #[test]
    fn even_split_needs_improvement() {
        let mut records: Vec<FeedbackRecord> =
            (0..5).map(|_| record(FeedbackType::ThumbsUp)).collect();
        records.extend((0..5).map(|_| record(FeedbackType::FormatMismatch)));

        match calculate_effectiveness(&records) {
            LearningEffectiveness::Report {
                effectiveness_percentage,
                improvement_status,
                ..
            } => {
                assert_eq!(effectiveness_percentage, 50.0);
                assert_eq!(improvement_status, "needs_improvement");
            }
            other => panic!("expected a report, got {other:?}"),
        }
    }
}
