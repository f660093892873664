//! Request handlers. Each one validates its input, then hands off to the
//! supervisor or the store and serializes the outcome.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Multipart, Path, State};
use axum::Json;
use tracing::{info, warn};

use crate::brain::calculate_effectiveness;
use crate::config::{ALLOWED_IMAGE_TYPES, GENERATION_MODEL, MAX_CAPTION_LENGTH, MAX_MESSAGE_LENGTH};
use crate::error::AppError;
use crate::http::AppContext;
use crate::models::{
    generate_session_id, is_valid_session_id, sanitize_message, ChatRequest, ChatResponse,
    DeleteOutcome, FeedbackRequest, FeedbackResponse, HealthResponse, HistoryResponse,
    LearningAnalytics, LearningStats, PreferenceTrends, ProbeResponse, RootResponse,
    SessionHistory,
};

/// How many sessions the grouped history listing returns.
const HISTORY_SESSION_LIMIT: usize = 20;
/// How many recent feedback records feed the effectiveness estimate.
const EFFECTIVENESS_SAMPLE: usize = 50;
/// Maximum characters of the first message used as a session title.
const SESSION_TITLE_CHARS: usize = 50;

const UNSUPPORTED_TYPE_MESSAGE: &str = "Unsupported file type. Use JPEG, PNG, GIF, or WebP";

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "AI Guru Multibot API is running".to_string(),
        docs: "/health".to_string(),
    })
}

pub async fn health(State(context): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        storage: context.store.mode().as_str().to_string(),
        model: GENERATION_MODEL.to_string(),
    })
}

pub async fn chat(
    State(context): State<AppContext>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    check_rate_limit(&context, &addr).await?;

    if request.message.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(AppError::Validation(
            "Message too long (max 5000 characters)".to_string(),
        ));
    }
    let message = request.sanitized_message();
    if message.is_empty() {
        return Err(AppError::Validation("Message cannot be empty".to_string()));
    }
    let session_id = resolve_session_id(request.session_id.as_deref())?;

    let response = context.supervisor.process_chat(session_id, message).await?;
    Ok(Json(response))
}

pub async fn image_chat(
    State(context): State<AppContext>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut multipart: Multipart,
) -> Result<Json<ChatResponse>, AppError> {
    check_rate_limit(&context, &addr).await?;

    let mut image_bytes: Option<Vec<u8>> = None;
    let mut declared_mime: Option<String> = None;
    let mut caption = String::new();
    let mut session_field: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed form data: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                declared_mime = field.content_type().map(|m| m.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read image: {}", e)))?;
                image_bytes = Some(data.to_vec());
            }
            "text" => {
                caption = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read text: {}", e)))?;
            }
            "session_id" => {
                session_field = Some(field.text().await.map_err(|e| {
                    AppError::Validation(format!("Failed to read session_id: {}", e))
                })?);
            }
            _ => {}
        }
    }

    let image_bytes =
        image_bytes.ok_or_else(|| AppError::Validation("Image file is required".to_string()))?;

    if image_bytes.len() > context.settings.max_file_size {
        return Err(AppError::PayloadTooLarge(
            "File too large. Max size: 10MB".to_string(),
        ));
    }

    // Both the declared type and the sniffed magic bytes must be an allowed
    // image format. A PDF renamed to .png fails the sniff.
    let mime_type = declared_mime.unwrap_or_default();
    if !ALLOWED_IMAGE_TYPES.contains(&mime_type.as_str()) {
        return Err(AppError::UnsupportedMediaType(
            UNSUPPORTED_TYPE_MESSAGE.to_string(),
        ));
    }
    if let Some(kind) = infer::get(&image_bytes) {
        if !ALLOWED_IMAGE_TYPES.contains(&kind.mime_type()) {
            return Err(AppError::UnsupportedMediaType(
                UNSUPPORTED_TYPE_MESSAGE.to_string(),
            ));
        }
    }

    let caption = sanitize_message(&caption);
    if caption.chars().count() > MAX_CAPTION_LENGTH {
        return Err(AppError::Validation(
            "Description too long (max 1000 characters)".to_string(),
        ));
    }
    let caption = if caption.is_empty() {
        "Describe this image.".to_string()
    } else {
        caption
    };

    let session_id = resolve_session_id(session_field.as_deref())?;
    info!(
        size = image_bytes.len(),
        mime = %mime_type,
        "Processing image chat upload"
    );

    let response = context
        .supervisor
        .process_image_chat(session_id, caption, image_bytes, mime_type)
        .await?;
    Ok(Json(response))
}

pub async fn feedback(
    State(context): State<AppContext>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, AppError> {
    check_rate_limit(&context, &addr).await?;

    if request.interaction_id.trim().is_empty() || request.session_id.trim().is_empty() {
        return Err(AppError::Validation(
            "interaction_id and session_id are required".to_string(),
        ));
    }

    let response = context
        .supervisor
        .process_feedback(
            request.interaction_id,
            request.session_id,
            request.feedback_type,
            request.feedback_text,
        )
        .await?;
    Ok(Json(response))
}

pub async fn chat_history(
    State(context): State<AppContext>,
) -> Result<Json<HistoryResponse>, AppError> {
    if !context.store.is_durable() {
        return Ok(Json(HistoryResponse {
            sessions: Vec::new(),
            status: Some(
                "Database unavailable - using temporary session storage".to_string(),
            ),
        }));
    }

    let summaries = context.store.session_summaries(HISTORY_SESSION_LIMIT).await?;
    let mut sessions = Vec::with_capacity(summaries.len());
    for summary in summaries {
        let messages = context.store.session_messages(&summary.session_id).await?;
        sessions.push(SessionHistory {
            session_id: summary.session_id,
            session_title: session_title(&summary.first_message),
            message_count: summary.message_count,
            latest_timestamp: format_timestamp(summary.latest_timestamp),
            messages,
        });
    }

    Ok(Json(HistoryResponse {
        sessions,
        status: None,
    }))
}

pub async fn delete_all_history(
    State(context): State<AppContext>,
) -> Result<Json<DeleteOutcome>, AppError> {
    let deleted = context.store.delete_all_history().await?;
    info!(deleted, "Cleared chat history");
    Ok(Json(DeleteOutcome::ok(format!(
        "Deleted {} chat history entries",
        deleted
    ))))
}

pub async fn delete_interaction(
    State(context): State<AppContext>,
    Path(interaction_id): Path<String>,
) -> Result<Json<DeleteOutcome>, AppError> {
    let deleted = context.store.delete_interaction(&interaction_id).await?;
    if deleted == 0 {
        return Ok(Json(DeleteOutcome::missing("Chat history not found")));
    }
    Ok(Json(DeleteOutcome::ok("Chat history deleted successfully")))
}

pub async fn delete_session(
    State(context): State<AppContext>,
    Path(session_id): Path<String>,
) -> Result<Json<DeleteOutcome>, AppError> {
    let removed = context.store.delete_session(&session_id).await?;
    if removed == 0 {
        return Ok(Json(DeleteOutcome::missing("Session not found")));
    }
    Ok(Json(DeleteOutcome::ok(format!(
        "Session deleted successfully. {} messages removed.",
        removed
    ))))
}

pub async fn learning_analytics(
    State(context): State<AppContext>,
) -> Result<Json<LearningAnalytics>, AppError> {
    let sessions_with_learning_data = context.store.count_learning_sessions().await?;
    let total_feedback_received = context.store.count_feedback_records().await?;
    let feedback_breakdown = counts_to_map(context.store.feedback_breakdown().await?);
    let format_preferences = counts_to_map(context.store.format_preference_counts().await?);
    let formality_preferences = counts_to_map(context.store.formality_preference_counts().await?);
    let records = context
        .store
        .recent_feedback_records(EFFECTIVENESS_SAMPLE)
        .await?;

    Ok(Json(LearningAnalytics {
        learning_stats: LearningStats {
            sessions_with_learning_data,
            total_feedback_received,
        },
        feedback_breakdown,
        user_preference_trends: PreferenceTrends {
            format_preferences,
            formality_preferences,
        },
        learning_effectiveness: calculate_effectiveness(&records),
    }))
}

pub async fn test_gemini(State(context): State<AppContext>) -> Json<ProbeResponse> {
    if !context.settings.api_key_configured() {
        return Json(ProbeResponse {
            status: "error".to_string(),
            message: "Gemini API key not configured".to_string(),
            response: None,
        });
    }

    match context.supervisor.probe_generation().await {
        Ok(text) => Json(ProbeResponse {
            status: "success".to_string(),
            message: "Gemini API working".to_string(),
            response: Some(text),
        }),
        Err(e) => Json(ProbeResponse {
            status: "error".to_string(),
            message: format!("Gemini API error: {}", e),
            response: None,
        }),
    }
}

async fn check_rate_limit(context: &AppContext, addr: &SocketAddr) -> Result<(), AppError> {
    let mut limiter = context.rate_limiter.lock().await;
    if limiter.allow(&addr.ip().to_string()) {
        Ok(())
    } else {
        warn!(client = %addr.ip(), "Rate limit hit");
        Err(AppError::RateLimited)
    }
}

/// Uses the provided session id when valid, otherwise mints a fresh one.
fn resolve_session_id(provided: Option<&str>) -> Result<String, AppError> {
    match provided {
        Some(id) if !id.trim().is_empty() => {
            if is_valid_session_id(id) {
                Ok(id.to_string())
            } else {
                Err(AppError::Validation("Invalid session ID format".to_string()))
            }
        }
        _ => Ok(generate_session_id()),
    }
}

fn session_title(first_message: &str) -> String {
    if first_message.chars().count() > SESSION_TITLE_CHARS {
        let prefix: String = first_message.chars().take(SESSION_TITLE_CHARS).collect();
        format!("{}...", prefix)
    } else {
        first_message.to_string()
    }
}

fn format_timestamp(epoch_secs: i64) -> String {
    chrono::DateTime::from_timestamp(epoch_secs, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

fn counts_to_map(counts: Vec<(String, i64)>) -> HashMap<String, i64> {
    counts.into_iter().collect()
}
