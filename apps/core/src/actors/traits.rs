use crate::actors::messages::AppError;
use crate::models::KnowledgePassage;
use async_trait::async_trait;

/// Defines the public interface for a text/vision generation actor.
///
/// This trait abstracts the specific model backend, so the supervisor can be
/// exercised against a mock in tests.
#[async_trait]
pub trait GenerationActor: Send + Sync + 'static {
    /// Generates a complete text response for a fully assembled prompt.
    async fn generate(&self, prompt: String) -> Result<String, AppError>;

    /// Describes an image, guided by a prompt.
    async fn generate_vision(
        &self,
        prompt: String,
        image_bytes: Vec<u8>,
        mime_type: String,
    ) -> Result<String, AppError>;

    /// Sends a minimal probe request to verify upstream connectivity.
    async fn probe(&self) -> Result<String, AppError>;
}

/// Defines the public interface for the knowledge-base actor.
///
/// This trait abstracts embedding and vector search over the epic corpus.
#[async_trait]
pub trait KnowledgeActor: Send + Sync + 'static {
    /// Chunks, embeds and appends content; returns the stored chunk count.
    async fn ingest(&self, content: String, source: String) -> Result<usize, AppError>;

    /// Returns the passages closest to the query.
    async fn search(&self, query: String, limit: usize)
        -> Result<Vec<KnowledgePassage>, AppError>;
}
