//! Actor layer: message-passing workers owning the external resources.
//!
//! The generation actor owns the upstream HTTP client, the knowledge actor
//! owns the embedding model and the vector store, and the supervisor
//! orchestrates both together with the interaction store. Each actor is an
//! mpsc receive loop behind a cloneable handle.

pub mod gemini;
pub mod knowledge;
pub mod messages;
pub mod supervisor;
pub mod traits;

pub use supervisor::SupervisorHandle;
