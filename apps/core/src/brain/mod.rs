//! # Brain Module
//!
//! Fast, non-LLM analysis that runs BEFORE any model call to enrich
//! context and route the request.
//!
//! ## Components
//! - `language`: script-priority + statistical language detection
//! - `patterns`: lexical cue extraction from user input
//! - `format`: shape classification of generated responses
//! - `preferences`: majority-vote preference aggregation
//! - `feedback`: feedback-driven learning and effectiveness estimate
//! - `intent`: regex intent routing (factual / guidance / general)

pub mod feedback;
pub mod format;
pub mod intent;
pub mod language;
pub mod patterns;
pub mod preferences;

// Re-export main types for convenience
pub use feedback::{apply_feedback, calculate_effectiveness, improvement_suggestions};
pub use format::detect_response_format;
pub use intent::{classify_intent, Intent};
pub use language::{detect_indic_script, detect_language, language_name, LanguageDetection};
pub use patterns::{analyze_patterns, extract_keywords};
pub use preferences::{aggregate_preferences, PreferenceSnapshot};
