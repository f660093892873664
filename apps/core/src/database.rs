use crate::models::{
    FeedbackRecord, FeedbackType, Interaction, InteractionFeedback, LearnedPreference,
    SessionSummary,
};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::types::Json;
use std::str::FromStr;
use tracing::info;

pub async fn init_db(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    info!("Initializing database at: {}", database_url);

    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    // Schema is applied in place; all timestamps are Unix seconds, JSON
    // columns hold the serde form of the matching model type.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chat_history (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            input_type TEXT NOT NULL,
            user_input TEXT NOT NULL,
            bot_response TEXT NOT NULL,
            language_code TEXT,
            language_name TEXT,
            timestamp INTEGER NOT NULL,
            input_patterns JSON NOT NULL,
            response_format JSON NOT NULL,
            response_length INTEGER NOT NULL,
            feedback JSON
        );
        CREATE TABLE IF NOT EXISTS learned_patterns (
            session_id TEXT PRIMARY KEY,
            preferred_format TEXT NOT NULL,
            formality_level TEXT NOT NULL,
            preferred_length TEXT NOT NULL,
            topics_of_interest JSON NOT NULL,
            feedback_history JSON NOT NULL,
            interaction_count INTEGER NOT NULL,
            total_feedback_count INTEGER NOT NULL,
            last_updated INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS user_feedback (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            interaction_id TEXT NOT NULL,
            session_id TEXT NOT NULL,
            feedback_type TEXT NOT NULL,
            feedback_text TEXT,
            user_input TEXT NOT NULL,
            bot_response TEXT NOT NULL,
            input_patterns JSON NOT NULL,
            response_format JSON NOT NULL,
            improvement_suggestions JSON NOT NULL,
            timestamp INTEGER NOT NULL
        );
        "#,
    )
    .execute(&pool)
    .await?;

    info!("Database initialized and schema applied.");

    Ok(pool)
}

// --- Chat history CRUD ---

pub async fn insert_interaction(
    pool: &SqlitePool,
    interaction: &Interaction,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO chat_history (id, session_id, input_type, user_input, bot_response,
            language_code, language_name, timestamp, input_patterns, response_format,
            response_length, feedback)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&interaction.id)
    .bind(&interaction.session_id)
    .bind(interaction.input_type)
    .bind(&interaction.user_input)
    .bind(&interaction.bot_response)
    .bind(&interaction.language_code)
    .bind(&interaction.language_name)
    .bind(interaction.timestamp)
    .bind(&interaction.input_patterns)
    .bind(&interaction.response_format)
    .bind(interaction.response_length)
    .bind(&interaction.feedback)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_interaction(
    pool: &SqlitePool,
    interaction_id: &str,
) -> Result<Option<Interaction>, sqlx::Error> {
    sqlx::query_as::<_, Interaction>(
        r#"
        SELECT id, session_id, input_type, user_input, bot_response, language_code,
            language_name, timestamp, input_patterns, response_format, response_length, feedback
        FROM chat_history
        WHERE id = ?
        "#,
    )
    .bind(interaction_id)
    .fetch_optional(pool)
    .await
}

/// Most recent interactions for a session, newest first. Ties on the
/// one-second timestamp resolution fall back to insertion order.
pub async fn get_recent_interactions(
    pool: &SqlitePool,
    session_id: &str,
    limit: i64,
) -> Result<Vec<Interaction>, sqlx::Error> {
    sqlx::query_as::<_, Interaction>(
        r#"
        SELECT id, session_id, input_type, user_input, bot_response, language_code,
            language_name, timestamp, input_patterns, response_format, response_length, feedback
        FROM chat_history
        WHERE session_id = ?
        ORDER BY timestamp DESC, rowid DESC
        LIMIT ?
        "#,
    )
    .bind(session_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn get_session_messages(
    pool: &SqlitePool,
    session_id: &str,
) -> Result<Vec<Interaction>, sqlx::Error> {
    sqlx::query_as::<_, Interaction>(
        r#"
        SELECT id, session_id, input_type, user_input, bot_response, language_code,
            language_name, timestamp, input_patterns, response_format, response_length, feedback
        FROM chat_history
        WHERE session_id = ?
        ORDER BY timestamp ASC, rowid ASC
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await
}

/// Sessions grouped with their first message and latest activity, newest
/// activity first.
pub async fn get_session_summaries(
    pool: &SqlitePool,
    limit: i64,
) -> Result<Vec<SessionSummary>, sqlx::Error> {
    sqlx::query_as::<_, SessionSummary>(
        r#"
        SELECT c.session_id,
            (SELECT f.user_input FROM chat_history f
             WHERE f.session_id = c.session_id
             ORDER BY f.timestamp ASC, f.rowid ASC
             LIMIT 1) AS first_message,
            COUNT(*) AS message_count,
            MAX(c.timestamp) AS latest_timestamp
        FROM chat_history c
        GROUP BY c.session_id
        ORDER BY latest_timestamp DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn update_interaction_feedback(
    pool: &SqlitePool,
    interaction_id: &str,
    feedback: &InteractionFeedback,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE chat_history SET feedback = ? WHERE id = ?")
        .bind(Json(feedback))
        .bind(interaction_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_all_interactions(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM chat_history").execute(pool).await?;
    Ok(result.rows_affected())
}

pub async fn delete_interaction(
    pool: &SqlitePool,
    interaction_id: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM chat_history WHERE id = ?")
        .bind(interaction_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Deletes a session's interactions and its learned preferences. Returns the
/// number of interactions removed.
pub async fn delete_session(pool: &SqlitePool, session_id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM chat_history WHERE session_id = ?")
        .bind(session_id)
        .execute(pool)
        .await?;

    sqlx::query("DELETE FROM learned_patterns WHERE session_id = ?")
        .bind(session_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

// --- Learned patterns ---

pub async fn get_learned_preference(
    pool: &SqlitePool,
    session_id: &str,
) -> Result<Option<LearnedPreference>, sqlx::Error> {
    sqlx::query_as::<_, LearnedPreference>(
        r#"
        SELECT session_id, preferred_format, formality_level, preferred_length,
            topics_of_interest, feedback_history, interaction_count, total_feedback_count,
            last_updated
        FROM learned_patterns
        WHERE session_id = ?
        "#,
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await
}

pub async fn upsert_learned_preference(
    pool: &SqlitePool,
    prefs: &LearnedPreference,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO learned_patterns (session_id, preferred_format, formality_level,
            preferred_length, topics_of_interest, feedback_history, interaction_count,
            total_feedback_count, last_updated)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(session_id) DO UPDATE SET
            preferred_format = excluded.preferred_format,
            formality_level = excluded.formality_level,
            preferred_length = excluded.preferred_length,
            topics_of_interest = excluded.topics_of_interest,
            feedback_history = excluded.feedback_history,
            interaction_count = excluded.interaction_count,
            total_feedback_count = excluded.total_feedback_count,
            last_updated = excluded.last_updated
        "#,
    )
    .bind(&prefs.session_id)
    .bind(&prefs.preferred_format)
    .bind(&prefs.formality_level)
    .bind(&prefs.preferred_length)
    .bind(&prefs.topics_of_interest)
    .bind(&prefs.feedback_history)
    .bind(prefs.interaction_count)
    .bind(prefs.total_feedback_count)
    .bind(prefs.last_updated)
    .execute(pool)
    .await?;

    Ok(())
}

// --- Feedback records ---

pub async fn insert_feedback_record(
    pool: &SqlitePool,
    interaction: &Interaction,
    feedback_type: FeedbackType,
    feedback_text: Option<&str>,
    improvement_suggestions: Vec<String>,
) -> Result<FeedbackRecord, sqlx::Error> {
    let timestamp = Utc::now().timestamp();

    sqlx::query_as::<_, FeedbackRecord>(
        r#"
        INSERT INTO user_feedback (interaction_id, session_id, feedback_type, feedback_text,
            user_input, bot_response, input_patterns, response_format,
            improvement_suggestions, timestamp)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id, interaction_id, session_id, feedback_type, feedback_text, user_input,
            bot_response, input_patterns, response_format, improvement_suggestions, timestamp
        "#,
    )
    .bind(&interaction.id)
    .bind(&interaction.session_id)
    .bind(feedback_type)
    .bind(feedback_text)
    .bind(&interaction.user_input)
    .bind(&interaction.bot_response)
    .bind(&interaction.input_patterns)
    .bind(&interaction.response_format)
    .bind(Json(improvement_suggestions))
    .bind(timestamp)
    .fetch_one(pool)
    .await
}

pub async fn get_recent_feedback_records(
    pool: &SqlitePool,
    limit: i64,
) -> Result<Vec<FeedbackRecord>, sqlx::Error> {
    sqlx::query_as::<_, FeedbackRecord>(
        r#"
        SELECT id, interaction_id, session_id, feedback_type, feedback_text, user_input,
            bot_response, input_patterns, response_format, improvement_suggestions, timestamp
        FROM user_feedback
        ORDER BY timestamp DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

// --- Analytics ---

pub async fn count_learning_sessions(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM learned_patterns")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

pub async fn count_feedback_records(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM user_feedback")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}

pub async fn feedback_breakdown(pool: &SqlitePool) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT feedback_type, COUNT(*)
        FROM user_feedback
        GROUP BY feedback_type
        ORDER BY feedback_type
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn format_preference_counts(pool: &SqlitePool) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT preferred_format, COUNT(*)
        FROM learned_patterns
        GROUP BY preferred_format
        ORDER BY preferred_format
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn formality_preference_counts(
    pool: &SqlitePool,
) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (String, i64)>(
        r#"
        SELECT formality_level, COUNT(*)
        FROM learned_patterns
        GROUP BY formality_level
        ORDER BY formality_level
        "#,
    )
    .fetch_all(pool)
    .await
}
