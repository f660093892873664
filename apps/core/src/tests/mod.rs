//! Test Module
//!
//! Cross-module test suite for the AI Guru Multibot backend.
//!
//! ## Test Categories
//! - `brain_tests`: language detection, pattern analysis and prompt composition as one pipeline
//! - `database_tests`: chat history, preference and feedback CRUD against scratch SQLite files
//! - `store_tests`: storage facade behavior in durable and memory-only modes
//! - `actor_tests`: Gemini actor concurrency and error surfacing against a mocked upstream
//! - `supervisor_tests`: chat and feedback orchestration over mock actors and a durable store
//! - `http_tests`: end-to-end API tests over a bound server
