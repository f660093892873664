//! HTTP surface of the backend: shared application state and the axum router.
//!
//! Handlers stay thin. Validation and rate limiting happen here; everything
//! that touches a model or the knowledge base goes through the supervisor.

pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tokio::sync::Mutex;

use crate::actors::SupervisorHandle;
use crate::config::{Settings, RATE_LIMIT_MAX_REQUESTS, RATE_LIMIT_WINDOW_SECS};
use crate::rate_limiter::RateLimiter;
use crate::store::Store;

/// State shared by every handler. Built once in `main`, cloned per request.
#[derive(Clone)]
pub struct AppContext {
    pub settings: Arc<Settings>,
    pub store: Store,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
    pub supervisor: SupervisorHandle,
}

impl AppContext {
    pub fn new(settings: Settings, store: Store, supervisor: SupervisorHandle) -> Self {
        AppContext {
            settings: Arc::new(settings),
            store,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
                RATE_LIMIT_MAX_REQUESTS,
                Duration::from_secs(RATE_LIMIT_WINDOW_SECS),
            ))),
            supervisor,
        }
    }
}

/// Builds the API router over the shared context.
pub fn router(context: AppContext) -> Router {
    // Leave headroom above the image cap so oversized uploads reach our own
    // 413 message instead of axum's generic body limit error.
    let body_limit = context.settings.max_file_size + 1024 * 1024;

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/chat", post(handlers::chat))
        .route("/image-chat", post(handlers::image_chat))
        .route("/feedback", post(handlers::feedback))
        .route(
            "/chat-history",
            get(handlers::chat_history).delete(handlers::delete_all_history),
        )
        .route(
            "/chat-history/{interaction_id}",
            delete(handlers::delete_interaction),
        )
        .route("/session/{session_id}", delete(handlers::delete_session))
        .route("/learning-analytics", get(handlers::learning_analytics))
        .route("/test-gemini", get(handlers::test_gemini))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(context)
}
