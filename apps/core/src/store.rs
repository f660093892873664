//! Storage facade over SQLite with an in-memory fallback.
//!
//! When the database cannot be opened at startup the service keeps serving
//! from process memory; the active mode is explicit state, surfaced by
//! `/health`, never inferred from a missing pool.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use sqlx::types::Json;
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::database;
use crate::error::AppError;
use crate::models::{
    FeedbackRecord, FeedbackType, Interaction, InteractionFeedback, LearnedPreference,
    SessionSummary,
};

/// Where interactions are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    Durable,
    MemoryOnly,
}

impl StorageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageMode::Durable => "durable",
            StorageMode::MemoryOnly => "memory_only",
        }
    }
}

#[derive(Default)]
struct MemoryStore {
    /// Insertion order doubles as timestamp order.
    interactions: Vec<Interaction>,
    preferences: HashMap<String, LearnedPreference>,
    feedback: Vec<FeedbackRecord>,
    next_feedback_id: i64,
}

#[derive(Clone)]
enum Backend {
    Durable(SqlitePool),
    Memory(Arc<Mutex<MemoryStore>>),
}

/// Cloneable handle to the active storage backend.
#[derive(Clone)]
pub struct Store {
    backend: Backend,
}

impl Store {
    pub fn durable(pool: SqlitePool) -> Self {
        Self {
            backend: Backend::Durable(pool),
        }
    }

    pub fn memory_only() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(Mutex::new(MemoryStore::default()))),
        }
    }

    pub fn mode(&self) -> StorageMode {
        match &self.backend {
            Backend::Durable(_) => StorageMode::Durable,
            Backend::Memory(_) => StorageMode::MemoryOnly,
        }
    }

    pub fn is_durable(&self) -> bool {
        self.mode() == StorageMode::Durable
    }

    /// Persists an interaction and returns it as stored. Memory-only mode
    /// replaces the id with `{session_id}_{unix_seconds}`.
    pub async fn store_interaction(
        &self,
        mut interaction: Interaction,
    ) -> Result<Interaction, AppError> {
        match &self.backend {
            Backend::Durable(pool) => {
                database::insert_interaction(pool, &interaction).await?;
                Ok(interaction)
            }
            Backend::Memory(mem) => {
                interaction.id =
                    format!("{}_{}", interaction.session_id, Utc::now().timestamp());
                let mut mem = mem.lock().await;
                mem.interactions.push(interaction.clone());
                Ok(interaction)
            }
        }
    }

    pub async fn get_interaction(
        &self,
        interaction_id: &str,
    ) -> Result<Option<Interaction>, AppError> {
        match &self.backend {
            Backend::Durable(pool) => {
                Ok(database::get_interaction(pool, interaction_id).await?)
            }
            Backend::Memory(mem) => {
                let mem = mem.lock().await;
                Ok(mem
                    .interactions
                    .iter()
                    .find(|i| i.id == interaction_id)
                    .cloned())
            }
        }
    }

    /// Most recent interactions for a session, newest first.
    pub async fn recent_interactions(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<Interaction>, AppError> {
        match &self.backend {
            Backend::Durable(pool) => {
                Ok(database::get_recent_interactions(pool, session_id, limit as i64).await?)
            }
            Backend::Memory(mem) => {
                let mem = mem.lock().await;
                let mut recent: Vec<Interaction> = mem
                    .interactions
                    .iter()
                    .filter(|i| i.session_id == session_id)
                    .cloned()
                    .collect();
                recent.reverse();
                recent.truncate(limit);
                Ok(recent)
            }
        }
    }

    /// All interactions of a session, oldest first.
    pub async fn session_messages(&self, session_id: &str) -> Result<Vec<Interaction>, AppError> {
        match &self.backend {
            Backend::Durable(pool) => {
                Ok(database::get_session_messages(pool, session_id).await?)
            }
            Backend::Memory(mem) => {
                let mem = mem.lock().await;
                Ok(mem
                    .interactions
                    .iter()
                    .filter(|i| i.session_id == session_id)
                    .cloned()
                    .collect())
            }
        }
    }

    pub async fn session_summaries(&self, limit: usize) -> Result<Vec<SessionSummary>, AppError> {
        match &self.backend {
            Backend::Durable(pool) => {
                Ok(database::get_session_summaries(pool, limit as i64).await?)
            }
            Backend::Memory(mem) => {
                let mem = mem.lock().await;
                let mut grouped: HashMap<&str, (i64, i64, &str)> = HashMap::new();
                for interaction in &mem.interactions {
                    let entry = grouped
                        .entry(interaction.session_id.as_str())
                        .or_insert((0, interaction.timestamp, interaction.user_input.as_str()));
                    entry.0 += 1;
                    if interaction.timestamp > entry.1 {
                        entry.1 = interaction.timestamp;
                    }
                }
                let mut summaries: Vec<SessionSummary> = grouped
                    .into_iter()
                    .map(|(session_id, (count, latest, first))| SessionSummary {
                        session_id: session_id.to_string(),
                        first_message: first.to_string(),
                        message_count: count,
                        latest_timestamp: latest,
                    })
                    .collect();
                summaries.sort_by(|a, b| b.latest_timestamp.cmp(&a.latest_timestamp));
                summaries.truncate(limit);
                Ok(summaries)
            }
        }
    }

    /// Attaches feedback to a stored interaction. Returns false when the
    /// interaction does not exist.
    pub async fn update_interaction_feedback(
        &self,
        interaction_id: &str,
        feedback: &InteractionFeedback,
    ) -> Result<bool, AppError> {
        match &self.backend {
            Backend::Durable(pool) => {
                Ok(database::update_interaction_feedback(pool, interaction_id, feedback).await?)
            }
            Backend::Memory(mem) => {
                let mut mem = mem.lock().await;
                match mem
                    .interactions
                    .iter_mut()
                    .find(|i| i.id == interaction_id)
                {
                    Some(interaction) => {
                        interaction.feedback = Some(Json(feedback.clone()));
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
        }
    }

    pub async fn delete_all_history(&self) -> Result<u64, AppError> {
        match &self.backend {
            Backend::Durable(pool) => Ok(database::delete_all_interactions(pool).await?),
            Backend::Memory(mem) => {
                let mut mem = mem.lock().await;
                let removed = mem.interactions.len() as u64;
                mem.interactions.clear();
                Ok(removed)
            }
        }
    }

    pub async fn delete_interaction(&self, interaction_id: &str) -> Result<u64, AppError> {
        match &self.backend {
            Backend::Durable(pool) => {
                Ok(database::delete_interaction(pool, interaction_id).await?)
            }
            Backend::Memory(mem) => {
                let mut mem = mem.lock().await;
                let before = mem.interactions.len();
                mem.interactions.retain(|i| i.id != interaction_id);
                Ok((before - mem.interactions.len()) as u64)
            }
        }
    }

    /// Removes a session's interactions and learned preferences; returns the
    /// number of interactions removed.
    pub async fn delete_session(&self, session_id: &str) -> Result<u64, AppError> {
        match &self.backend {
            Backend::Durable(pool) => Ok(database::delete_session(pool, session_id).await?),
            Backend::Memory(mem) => {
                let mut mem = mem.lock().await;
                let before = mem.interactions.len();
                mem.interactions.retain(|i| i.session_id != session_id);
                mem.preferences.remove(session_id);
                Ok((before - mem.interactions.len()) as u64)
            }
        }
    }

    pub async fn learned_preference(
        &self,
        session_id: &str,
    ) -> Result<Option<LearnedPreference>, AppError> {
        match &self.backend {
            Backend::Durable(pool) => {
                Ok(database::get_learned_preference(pool, session_id).await?)
            }
            Backend::Memory(mem) => {
                let mem = mem.lock().await;
                Ok(mem.preferences.get(session_id).cloned())
            }
        }
    }

    pub async fn upsert_learned_preference(
        &self,
        prefs: &LearnedPreference,
    ) -> Result<(), AppError> {
        match &self.backend {
            Backend::Durable(pool) => {
                database::upsert_learned_preference(pool, prefs).await?;
                Ok(())
            }
            Backend::Memory(mem) => {
                let mut mem = mem.lock().await;
                mem.preferences
                    .insert(prefs.session_id.clone(), prefs.clone());
                Ok(())
            }
        }
    }

    pub async fn insert_feedback_record(
        &self,
        interaction: &Interaction,
        feedback_type: FeedbackType,
        feedback_text: Option<&str>,
        improvement_suggestions: Vec<String>,
    ) -> Result<FeedbackRecord, AppError> {
        match &self.backend {
            Backend::Durable(pool) => Ok(database::insert_feedback_record(
                pool,
                interaction,
                feedback_type,
                feedback_text,
                improvement_suggestions,
            )
            .await?),
            Backend::Memory(mem) => {
                let mut mem = mem.lock().await;
                mem.next_feedback_id += 1;
                let record = FeedbackRecord {
                    id: mem.next_feedback_id,
                    interaction_id: interaction.id.clone(),
                    session_id: interaction.session_id.clone(),
                    feedback_type,
                    feedback_text: feedback_text.map(str::to_string),
                    user_input: interaction.user_input.clone(),
                    bot_response: interaction.bot_response.clone(),
                    input_patterns: interaction.input_patterns.clone(),
                    response_format: interaction.response_format.clone(),
                    improvement_suggestions: Json(improvement_suggestions),
                    timestamp: Utc::now().timestamp(),
                };
                mem.feedback.push(record.clone());
                Ok(record)
            }
        }
    }

    /// Most recent feedback records across all sessions, newest first.
    pub async fn recent_feedback_records(
        &self,
        limit: usize,
    ) -> Result<Vec<FeedbackRecord>, AppError> {
        match &self.backend {
            Backend::Durable(pool) => {
                Ok(database::get_recent_feedback_records(pool, limit as i64).await?)
            }
            Backend::Memory(mem) => {
                let mem = mem.lock().await;
                let mut records: Vec<FeedbackRecord> = mem.feedback.clone();
                records.reverse();
                records.truncate(limit);
                Ok(records)
            }
        }
    }

    // --- Analytics counts ---

    pub async fn count_learning_sessions(&self) -> Result<i64, AppError> {
        match &self.backend {
            Backend::Durable(pool) => Ok(database::count_learning_sessions(pool).await?),
            Backend::Memory(mem) => Ok(mem.lock().await.preferences.len() as i64),
        }
    }

    pub async fn count_feedback_records(&self) -> Result<i64, AppError> {
        match &self.backend {
            Backend::Durable(pool) => Ok(database::count_feedback_records(pool).await?),
            Backend::Memory(mem) => Ok(mem.lock().await.feedback.len() as i64),
        }
    }

    pub async fn feedback_breakdown(&self) -> Result<Vec<(String, i64)>, AppError> {
        match &self.backend {
            Backend::Durable(pool) => Ok(database::feedback_breakdown(pool).await?),
            Backend::Memory(mem) => {
                let mem = mem.lock().await;
                let mut counts: HashMap<&str, i64> = HashMap::new();
                for record in &mem.feedback {
                    *counts.entry(record.feedback_type.as_str()).or_default() += 1;
                }
                Ok(sorted_counts(counts))
            }
        }
    }

    pub async fn format_preference_counts(&self) -> Result<Vec<(String, i64)>, AppError> {
        match &self.backend {
            Backend::Durable(pool) => Ok(database::format_preference_counts(pool).await?),
            Backend::Memory(mem) => {
                let mem = mem.lock().await;
                let mut counts: HashMap<&str, i64> = HashMap::new();
                for prefs in mem.preferences.values() {
                    *counts.entry(prefs.preferred_format.as_str()).or_default() += 1;
                }
                Ok(sorted_counts(counts))
            }
        }
    }

    pub async fn formality_preference_counts(&self) -> Result<Vec<(String, i64)>, AppError> {
        match &self.backend {
            Backend::Durable(pool) => Ok(database::formality_preference_counts(pool).await?),
            Backend::Memory(mem) => {
                let mem = mem.lock().await;
                let mut counts: HashMap<&str, i64> = HashMap::new();
                for prefs in mem.preferences.values() {
                    *counts.entry(prefs.formality_level.as_str()).or_default() += 1;
                }
                Ok(sorted_counts(counts))
            }
        }
    }
}

fn sorted_counts(counts: HashMap<&str, i64>) -> Vec<(String, i64)> {
    let mut rows: Vec<(String, i64)> = counts
        .into_iter()
        .map(|(label, n)| (label.to_string(), n))
        .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    rows
}
