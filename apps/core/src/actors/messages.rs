use serde::Serialize;
use tokio::sync::oneshot;

use crate::models::{ChatResponse, FeedbackResponse, FeedbackType, KnowledgePassage};

/// Defines errors that can occur within the actor system.
#[derive(Debug, thiserror::Error, Serialize, Clone)]
pub enum ActorError {
    /// An error originating from the generation actor.
    #[error("Generation request failed: {0}")]
    Generation(String),
    /// An error originating from the knowledge actor.
    #[error("Knowledge request failed: {0}")]
    Knowledge(String),
    /// A generic internal error within an actor.
    #[error("Internal system error: {0}")]
    Internal(String),
    /// An error indicating that an actor operation timed out.
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl From<tokio::time::error::Elapsed> for ActorError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        ActorError::Timeout(format!("Actor operation timed out: {}", err))
    }
}

// Re-export AppError for convenience
pub use crate::error::AppError;

/// Messages that can be sent to the `GeminiActor`.
#[derive(Debug)]
pub enum GenerationMessage {
    /// A request to generate a text response for a fully assembled prompt.
    Generate {
        prompt: String,
        /// A channel to send the final `String` result back.
        responder: oneshot::Sender<Result<String, AppError>>,
    },
    /// A request to describe an image, guided by a prompt.
    GenerateVision {
        prompt: String,
        image_bytes: Vec<u8>,
        mime_type: String,
        responder: oneshot::Sender<Result<String, AppError>>,
    },
    /// A connectivity probe ("Say hello") against the upstream API.
    Probe {
        responder: oneshot::Sender<Result<String, AppError>>,
    },
}

/// Messages that can be sent to the `KnowledgeActor`.
#[derive(Debug)]
pub enum KnowledgeMessage {
    /// A request to chunk, embed and append content to the epic corpus.
    Ingest {
        content: String,
        /// Corpus tag, e.g. "mahabharata".
        source: String,
        /// A channel to send the stored chunk count back.
        responder: oneshot::Sender<Result<usize, AppError>>,
    },
    /// A request to retrieve the passages closest to a query.
    Search {
        query: String,
        limit: usize,
        responder: oneshot::Sender<Result<Vec<KnowledgePassage>, AppError>>,
    },
}

/// Messages that can be sent to the `SupervisorActor`.
#[derive(Debug)]
pub enum SupervisorMessage {
    /// A request to run the full chat flow for one user message.
    ProcessChat {
        session_id: String,
        message: String,
        responder: oneshot::Sender<Result<ChatResponse, AppError>>,
    },
    /// A request to run the image analysis flow.
    ProcessImageChat {
        session_id: String,
        caption: String,
        image_bytes: Vec<u8>,
        mime_type: String,
        responder: oneshot::Sender<Result<ChatResponse, AppError>>,
    },
    /// A request to apply feedback to a stored interaction.
    ProcessFeedback {
        interaction_id: String,
        session_id: String,
        feedback_type: FeedbackType,
        feedback_text: Option<String>,
        responder: oneshot::Sender<Result<FeedbackResponse, AppError>>,
    },
    /// A request to ingest a document into the knowledge base.
    IngestKnowledge {
        content: String,
        source: String,
        responder: oneshot::Sender<Result<usize, AppError>>,
    },
    /// A request to probe the upstream generation API.
    ProbeGeneration {
        responder: oneshot::Sender<Result<String, AppError>>,
    },
}
