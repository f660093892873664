use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::HashMap;
use validator::Validate;

/// The kind of input the user submitted.
///
/// `Voice` survives in stored history from earlier deployments; no
/// transcription endpoint exists in this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum InputType {
    Text,
    Image,
    Voice,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Text => "text",
            InputType::Image => "image",
            InputType::Voice => "voice",
        }
    }
}

/// The closed set of feedback labels a client can attach to an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum FeedbackType {
    ThumbsUp,
    ThumbsDown,
    FormatMismatch,
    TooLong,
    TooShort,
    OffTopic,
}

impl FeedbackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::ThumbsUp => "thumbs_up",
            FeedbackType::ThumbsDown => "thumbs_down",
            FeedbackType::FormatMismatch => "format_mismatch",
            FeedbackType::TooLong => "too_long",
            FeedbackType::TooShort => "too_short",
            FeedbackType::OffTopic => "off_topic",
        }
    }
}

/// Lexical cues extracted from one user message.
///
/// The category fields hold open string labels rather than enums: the same
/// slot can later receive values from a different classifier (see
/// `LearnedPreference::preferred_format`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputPatterns {
    /// "paragraph" | "structured" | "casual" | "mixed".
    pub request_type: String,
    /// "formal" | "casual" | "neutral".
    pub formality_level: String,
    /// "short" | "medium" | "detailed", by character count.
    pub length_preference: String,
    /// Up to 10 alphabetic keywords in order of appearance.
    pub keywords: Vec<String>,
}

/// Shape classification of a generated response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFormat {
    pub has_bullets: bool,
    pub has_numbering: bool,
    pub has_sections: bool,
    pub has_emojis: bool,
    /// "structured" | "paragraph" | "mixed".
    pub format_type: String,
}

/// Feedback attached to an interaction after the fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionFeedback {
    pub feedback_type: FeedbackType,
    pub feedback_text: Option<String>,
    pub feedback_timestamp: DateTime<Utc>,
}

/// One request/response exchange. Immutable once stored, except for the
/// `feedback` column which is attached later by the feedback endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Interaction {
    /// UUID, or `{session_id}_{unix_seconds}` when stored in memory-only mode.
    pub id: String,
    /// The 8-character session token this exchange belongs to.
    pub session_id: String,
    pub input_type: InputType,
    pub user_input: String,
    pub bot_response: String,
    /// Detected language code when detection was confident enough to show.
    pub language_code: Option<String>,
    /// Human-readable name for `language_code`.
    pub language_name: Option<String>,
    /// Unix timestamp (seconds) of when the exchange was stored.
    pub timestamp: i64,
    /// Lexical analysis of the user input, captured at store time.
    pub input_patterns: Json<InputPatterns>,
    /// Shape analysis of the generated response, captured at store time.
    pub response_format: Json<ResponseFormat>,
    /// Response length in characters.
    pub response_length: i64,
    pub feedback: Option<Json<InteractionFeedback>>,
}

/// One retrieved chunk of the epic corpus with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgePassage {
    pub content: String,
    /// Corpus tag, e.g. "mahabharata" or "ramayana".
    pub source: String,
    pub score: f32,
}

/// One entry of a session's bounded feedback history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackHistoryEntry {
    pub feedback_type: FeedbackType,
    pub timestamp: DateTime<Utc>,
    pub interaction_context: InteractionContext,
}

/// What the interaction looked like when the feedback arrived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionContext {
    pub request_type: String,
    pub response_format: String,
    pub response_length: i64,
}

/// Per-session aggregate inferred from recent interactions and feedback.
/// One row per session, upserted after each interaction and feedback event.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LearnedPreference {
    pub session_id: String,
    pub preferred_format: String,
    pub formality_level: String,
    pub preferred_length: String,
    /// Top keyword topics across the recent interaction window.
    pub topics_of_interest: Json<Vec<String>>,
    /// Bounded to the most recent 20 entries, oldest evicted.
    pub feedback_history: Json<Vec<FeedbackHistoryEntry>>,
    pub interaction_count: i64,
    pub total_feedback_count: i64,
    /// Unix timestamp (seconds) of the last update.
    pub last_updated: i64,
}

impl LearnedPreference {
    /// A fresh row with the classifier defaults, before any learning.
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            preferred_format: "neutral".to_string(),
            formality_level: "neutral".to_string(),
            preferred_length: "medium".to_string(),
            topics_of_interest: Json(Vec::new()),
            feedback_history: Json(Vec::new()),
            interaction_count: 0,
            total_feedback_count: 0,
            last_updated: Utc::now().timestamp(),
        }
    }
}

/// Append-only record of one feedback event, kept for analytics.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeedbackRecord {
    pub id: i64,
    pub interaction_id: String,
    pub session_id: String,
    pub feedback_type: FeedbackType,
    pub feedback_text: Option<String>,
    pub user_input: String,
    pub bot_response: String,
    pub input_patterns: Json<InputPatterns>,
    pub response_format: Json<ResponseFormat>,
    /// Template suggestion strings keyed off the feedback type.
    pub improvement_suggestions: Json<Vec<String>>,
    /// Unix timestamp (seconds) of when the feedback arrived.
    pub timestamp: i64,
}

/// Derived per-session summary used by the history endpoint.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SessionSummary {
    pub session_id: String,
    pub first_message: String,
    pub message_count: i64,
    pub latest_timestamp: i64,
}

// --- HTTP request bodies ---

/// Body of `POST /chat`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(max = 5000, message = "Message too long (max 5000 characters)"))]
    pub message: String,
    pub session_id: Option<String>,
}

impl ChatRequest {
    /// The message with surrounding whitespace and injection-prone characters
    /// (`< > " ' ;`) removed.
    pub fn sanitized_message(&self) -> String {
        sanitize_message(&self.message)
    }
}

/// Strips `< > " ' ;` and trims. Shared by the chat and image endpoints.
pub fn sanitize_message(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '<' | '>' | '"' | '\'' | ';'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// True for session ids matching `^[a-zA-Z0-9-]+$`.
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Generates a fresh 8-character session token (UUIDv4 prefix).
pub fn generate_session_id() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}

/// Body of `POST /feedback`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FeedbackRequest {
    #[validate(length(min = 1))]
    pub interaction_id: String,
    #[validate(length(min = 1))]
    pub session_id: String,
    pub feedback_type: FeedbackType,
    pub feedback_text: Option<String>,
}

// --- HTTP response bodies ---

/// Body of a successful `POST /chat` or `POST /image-chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub interaction_id: String,
    /// "factual" | "guidance" | "general".
    pub intent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackResponse {
    pub success: bool,
    pub message: String,
    pub feedback_type: FeedbackType,
}

/// Outcome of the delete endpoints. `success: false` carries the not-found
/// message rather than an HTTP error, matching the persisted API contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteOutcome {
    pub success: bool,
    pub message: String,
}

impl DeleteOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn missing(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// One session in the grouped history listing.
#[derive(Debug, Clone, Serialize)]
pub struct SessionHistory {
    pub session_id: String,
    /// First message truncated to 50 characters.
    pub session_title: String,
    pub message_count: i64,
    /// RFC 3339 timestamp of the latest interaction.
    pub latest_timestamp: String,
    pub messages: Vec<Interaction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub sessions: Vec<SessionHistory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// "durable" | "memory_only".
    pub storage: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RootResponse {
    pub message: String,
    pub docs: String,
}

/// Body of `GET /test-gemini`.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResponse {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

/// Body of `GET /learning-analytics`.
#[derive(Debug, Clone, Serialize)]
pub struct LearningAnalytics {
    pub learning_stats: LearningStats,
    pub feedback_breakdown: HashMap<String, i64>,
    pub user_preference_trends: PreferenceTrends,
    pub learning_effectiveness: LearningEffectiveness,
}

#[derive(Debug, Clone, Serialize)]
pub struct LearningStats {
    pub sessions_with_learning_data: i64,
    pub total_feedback_received: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreferenceTrends {
    pub format_preferences: HashMap<String, i64>,
    pub formality_preferences: HashMap<String, i64>,
}

/// Result of the effectiveness estimator: a numeric report only when enough
/// qualifying feedback exists, otherwise a status string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LearningEffectiveness {
    Insufficient {
        status: String,
    },
    Report {
        effectiveness_percentage: f64,
        recent_feedback_analyzed: usize,
        positive_feedback: usize,
        negative_feedback: usize,
        improvement_status: String,
    },
}
