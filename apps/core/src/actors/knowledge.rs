use crate::actors::messages::{ActorError, AppError, KnowledgeMessage};
use crate::actors::traits::KnowledgeActor;
use crate::models::KnowledgePassage;
use arrow::array::{
    Array, FixedSizeListBuilder, Float32Array, Float32Builder, RecordBatch, RecordBatchIterator,
    StringArray, StringBuilder,
};
use arrow::datatypes::{DataType, Field, Schema};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use futures::TryStreamExt;
use lancedb::{
    connect,
    query::{ExecutableQuery, QueryBase},
    Connection,
};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

/// Words per corpus chunk. Epic texts are long-form prose, so chunks are cut
/// on whitespace rather than lines.
const CHUNK_WORDS: usize = 400;

/// AllMiniLML6V2 output dimension.
const EMBEDDING_DIM: usize = 384;

const TABLE_NAME: &str = "epic_texts";

/// A handle to the `KnowledgeActor`.
///
/// Public, cloneable interface for sending messages to the running knowledge
/// actor, which owns the embedding model and the vector store for the epic
/// corpus.
#[derive(Clone)]
pub struct KnowledgeActorHandle {
    sender: mpsc::Sender<KnowledgeMessage>,
}

impl KnowledgeActorHandle {
    /// Creates a new `KnowledgeActor` and returns a handle to it.
    ///
    /// # Arguments
    ///
    /// * `db_path` - Directory holding the LanceDB vector store.
    /// * `model_cache_dir` - Local cache for the downloaded embedding model.
    /// * `seed_dir` - Optional directory of `.txt` corpus files ingested on
    ///   first start, when the table does not exist yet. The file stem becomes
    ///   the passage source tag.
    pub fn new(db_path: PathBuf, model_cache_dir: PathBuf, seed_dir: Option<PathBuf>) -> Self {
        let (sender, receiver) = mpsc::channel(32);
        let actor = KnowledgeActorRunner::new(receiver, db_path, model_cache_dir, seed_dir);
        tokio::spawn(async move { actor.run().await });
        Self { sender }
    }
}

#[async_trait]
impl KnowledgeActor for KnowledgeActorHandle {
    async fn ingest(&self, content: String, source: String) -> Result<usize, AppError> {
        let (send, recv) = oneshot::channel();
        let msg = KnowledgeMessage::Ingest {
            content,
            source,
            responder: send,
        };
        self.sender.send(msg).await.map_err(|_| {
            AppError::Actor(ActorError::Knowledge("Knowledge actor closed".to_string()))
        })?;
        Ok(recv.await.map_err(|_| {
            AppError::Actor(ActorError::Knowledge(
                "Knowledge actor failed to respond".to_string(),
            ))
        })??)
    }

    async fn search(
        &self,
        query: String,
        limit: usize,
    ) -> Result<Vec<KnowledgePassage>, AppError> {
        let (send, recv) = oneshot::channel();
        let msg = KnowledgeMessage::Search {
            query,
            limit,
            responder: send,
        };
        self.sender.send(msg).await.map_err(|_| {
            AppError::Actor(ActorError::Knowledge("Knowledge actor closed".to_string()))
        })?;
        Ok(recv.await.map_err(|_| {
            AppError::Actor(ActorError::Knowledge(
                "Knowledge actor failed to respond".to_string(),
            ))
        })??)
    }
}

// --- Actor Runner (Internal Logic) ---

struct KnowledgeActorRunner {
    receiver: mpsc::Receiver<KnowledgeMessage>,
    embedding_model: Option<TextEmbedding>,
    embedding_cache: LruCache<String, Vec<f32>>,
    db_connection: Option<Connection>,
    db_path: PathBuf,
    model_cache_dir: PathBuf,
    seed_dir: Option<PathBuf>,
}

impl KnowledgeActorRunner {
    const CACHE_SIZE: NonZeroUsize = match NonZeroUsize::new(1000) {
        Some(size) => size,
        None => panic!("Cache size must be non-zero"),
    };

    fn new(
        receiver: mpsc::Receiver<KnowledgeMessage>,
        db_path: PathBuf,
        model_cache_dir: PathBuf,
        seed_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            receiver,
            embedding_model: None,
            embedding_cache: LruCache::new(Self::CACHE_SIZE),
            db_connection: None,
            db_path,
            model_cache_dir,
            seed_dir,
        }
    }

    async fn run(mut self) {
        info!("KnowledgeActor started");

        let mut options = InitOptions::new(EmbeddingModel::AllMiniLML6V2);
        options.show_download_progress = false;
        options.cache_dir = self.model_cache_dir.clone();

        match TextEmbedding::try_new(options) {
            Ok(model) => {
                info!("Embedding model loaded successfully");
                self.embedding_model = Some(model);
            }
            Err(e) => error!("Failed to load embedding model: {}", e),
        }

        if let Err(e) = std::fs::create_dir_all(&self.db_path) {
            error!("Failed to create vector store directory at {:?}: {}", self.db_path, e);
        }

        let db_path_str = match self.db_path.to_str() {
            Some(s) => s,
            None => {
                error!("Failed to convert vector store path to string: {:?}", self.db_path);
                return;
            }
        };

        match connect(db_path_str).execute().await {
            Ok(conn) => {
                info!("Connected to LanceDB at {:?}", self.db_path);
                self.db_connection = Some(conn);
            }
            Err(e) => error!("Failed to connect to LanceDB: {}", e),
        }

        self.seed_corpus_if_missing().await;

        while let Some(msg) = self.receiver.recv().await {
            self.handle_message(msg).await;
        }
        info!("KnowledgeActor stopped");
    }

    async fn handle_message(&mut self, msg: KnowledgeMessage) {
        match msg {
            KnowledgeMessage::Ingest {
                content,
                source,
                responder,
            } => {
                let result = self.ingest_text(content, source).await;
                if responder.send(result.map_err(AppError::from)).is_err() {
                    warn!("Failed to send ingest response (channel closed)");
                }
            }
            KnowledgeMessage::Search {
                query,
                limit,
                responder,
            } => {
                let result = self.search_corpus(query, limit).await;
                if responder.send(result.map_err(AppError::from)).is_err() {
                    warn!("Failed to send search response (channel closed)");
                }
            }
        }
    }

    /// Ingests every `.txt` file under the seed directory, but only when the
    /// corpus table does not exist yet. Re-seeding an existing table would
    /// duplicate the epics.
    async fn seed_corpus_if_missing(&mut self) {
        let Some(seed_dir) = self.seed_dir.clone() else {
            return;
        };
        let Some(conn) = self.db_connection.as_ref() else {
            return;
        };

        let table_exists = match conn.table_names().execute().await {
            Ok(names) => names.contains(&TABLE_NAME.to_string()),
            Err(e) => {
                error!("Failed to list tables while seeding: {}", e);
                return;
            }
        };
        if table_exists {
            info!("Corpus table already present, skipping seed");
            return;
        }

        let entries = match std::fs::read_dir(&seed_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Knowledge directory {:?} not readable: {}", seed_dir, e);
                return;
            }
        };

        let mut files = 0usize;
        let mut chunks = 0usize;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let Some(source) = path.file_stem().and_then(|s| s.to_str()).map(String::from)
            else {
                continue;
            };
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!("Skipping corpus file {:?}: {}", path, e);
                    continue;
                }
            };
            match self.ingest_text(content, source.clone()).await {
                Ok(n) => {
                    files += 1;
                    chunks += n;
                    info!("Seeded corpus '{}' with {} chunks", source, n);
                }
                Err(e) => error!("Failed to seed corpus '{}': {}", source, e),
            }
        }
        info!("Corpus seeding complete: {} files, {} chunks", files, chunks);
    }

    async fn ingest_text(&self, content: String, source: String) -> Result<usize, ActorError> {
        let model = self.embedding_model.as_ref().ok_or(ActorError::Knowledge(
            "Embedding model not loaded".to_string(),
        ))?;
        let conn = self
            .db_connection
            .as_ref()
            .ok_or(ActorError::Knowledge("Vector store not connected".to_string()))?;

        let chunks = chunk_text(&content);
        if chunks.is_empty() {
            warn!(
                "Ingestion skipped for '{}': no chunks (content length: {})",
                source,
                content.len()
            );
            return Ok(0);
        }

        let embeddings = model
            .embed(chunks.clone(), None)
            .map_err(|e| ActorError::Knowledge(format!("Embedding failed: {}", e)))?;

        let total_chunks = chunks.len();
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    EMBEDDING_DIM as i32,
                ),
                true,
            ),
        ]));

        let mut id_builder = StringBuilder::with_capacity(total_chunks, total_chunks * 36);
        let mut content_builder = StringBuilder::with_capacity(total_chunks, total_chunks * 2048);
        let mut source_builder = StringBuilder::with_capacity(total_chunks, total_chunks * 16);

        let values_builder = Float32Builder::with_capacity(total_chunks * EMBEDDING_DIM);
        let mut vector_builder = FixedSizeListBuilder::new(values_builder, EMBEDDING_DIM as i32);

        for (i, chunk) in chunks.iter().enumerate() {
            id_builder.append_value(uuid::Uuid::new_v4().to_string());
            content_builder.append_value(chunk);
            source_builder.append_value(&source);

            if let Some(embedding) = embeddings.get(i) {
                vector_builder.values().append_slice(embedding);
                vector_builder.append(true);
            }
        }

        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(id_builder.finish()),
                Arc::new(content_builder.finish()),
                Arc::new(source_builder.finish()),
                Arc::new(vector_builder.finish()),
            ],
        )
        .map_err(|e| ActorError::Knowledge(format!("Failed to create RecordBatch: {}", e)))?;

        let table_exists = conn
            .table_names()
            .execute()
            .await
            .map_err(|e| ActorError::Knowledge(format!("Failed to list tables: {}", e)))?
            .contains(&TABLE_NAME.to_string());

        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema.clone());

        if table_exists {
            let table = conn
                .open_table(TABLE_NAME)
                .execute()
                .await
                .map_err(|e| ActorError::Knowledge(format!("Failed to open table: {}", e)))?;

            table
                .add(Box::new(reader))
                .execute()
                .await
                .map_err(|e| ActorError::Knowledge(format!("Failed to add data: {}", e)))?;
        } else {
            conn.create_table(TABLE_NAME, Box::new(reader))
                .execute()
                .await
                .map_err(|e| ActorError::Knowledge(format!("Failed to create table: {}", e)))?;
        }

        info!("Ingested {} chunks from '{}'", total_chunks, source);
        Ok(total_chunks)
    }

    async fn search_corpus(
        &mut self,
        query: String,
        limit: usize,
    ) -> Result<Vec<KnowledgePassage>, ActorError> {
        let model = self.embedding_model.as_ref().ok_or(ActorError::Knowledge(
            "Embedding model not loaded".to_string(),
        ))?;
        let conn = self
            .db_connection
            .as_ref()
            .ok_or(ActorError::Knowledge("Vector store not connected".to_string()))?;

        let query_vec = match self.embedding_cache.get(&query) {
            Some(embedding) => embedding.clone(),
            None => {
                let query_embedding = model
                    .embed(vec![query.clone()], None)
                    .map_err(|e| ActorError::Knowledge(format!("Embedding failed: {}", e)))?;
                let embedding = query_embedding
                    .first()
                    .ok_or(ActorError::Knowledge("No embedding generated".to_string()))?
                    .clone();
                self.embedding_cache.put(query.clone(), embedding.clone());
                embedding
            }
        };

        let table_names = conn
            .table_names()
            .execute()
            .await
            .map_err(|e| ActorError::Knowledge(format!("Failed to list tables: {}", e)))?;

        if !table_names.contains(&TABLE_NAME.to_string()) {
            return Ok(Vec::new());
        }

        let table = conn
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| ActorError::Knowledge(format!("Failed to open table: {}", e)))?;

        let mut results = table
            .query()
            .limit(limit)
            .nearest_to(query_vec)
            .map_err(|e| ActorError::Knowledge(format!("Query setup failed: {}", e)))?
            .execute()
            .await
            .map_err(|e| ActorError::Knowledge(format!("Search failed: {}", e)))?;

        let mut passages = Vec::new();

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| ActorError::Knowledge(format!("Stream error: {}", e)))?
        {
            let content_col = batch.column_by_name("content").ok_or(ActorError::Knowledge(
                "Column 'content' not found".to_string(),
            ))?;
            let source_col = batch.column_by_name("source").ok_or(ActorError::Knowledge(
                "Column 'source' not found".to_string(),
            ))?;
            let distance_col = batch.column_by_name("_distance").ok_or(ActorError::Knowledge(
                "Column '_distance' not found".to_string(),
            ))?;

            let content_array = content_col
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or(ActorError::Knowledge(
                    "Failed to downcast content column".to_string(),
                ))?;
            let source_array = source_col
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or(ActorError::Knowledge(
                    "Failed to downcast source column".to_string(),
                ))?;
            let distance_array = distance_col
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or(ActorError::Knowledge(
                    "Failed to downcast distance column".to_string(),
                ))?;

            for i in 0..content_array.len() {
                if content_array.is_null(i) {
                    continue;
                }
                let source = if source_array.is_null(i) {
                    String::new()
                } else {
                    source_array.value(i).to_string()
                };
                let score = if distance_array.is_null(i) {
                    0.0
                } else {
                    distance_array.value(i)
                };
                passages.push(KnowledgePassage {
                    content: content_array.value(i).to_string(),
                    source,
                    score,
                });
            }
        }

        Ok(passages)
    }
}

/// Splits corpus text into fixed-size word windows.
fn chunk_text(content: &str) -> Vec<String> {
    let words: Vec<&str> = content.split_whitespace().collect();
    words
        .chunks(CHUNK_WORDS)
        .map(|window| window.join(" "))
        .filter(|chunk| !chunk.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_becomes_one_chunk() {
        let chunks = chunk_text("Arjuna hesitated on the battlefield of Kurukshetra.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0],
            "Arjuna hesitated on the battlefield of Kurukshetra."
        );
    }

    #[test]
    fn long_text_is_cut_into_word_windows() {
        let words: Vec<String> = (0..950).map(|i| format!("word{i}")).collect();
        let chunks = chunk_text(&words.join(" "));

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].split_whitespace().count(), 400);
        assert_eq!(chunks[1].split_whitespace().count(), 400);
        assert_eq!(chunks[2].split_whitespace().count(), 150);
        assert!(chunks[1].starts_with("word400"));
    }

    #[test]
    fn whitespace_only_text_yields_nothing() {
        assert!(chunk_text("   \n\t  ").is_empty());
        assert!(chunk_text("").is_empty());
    }

    #[test]
    fn irregular_whitespace_is_normalized() {
        let chunks = chunk_text("Rama\n\n   went\tto   the forest");
        assert_eq!(chunks, vec!["Rama went to the forest".to_string()]);
    }
}
