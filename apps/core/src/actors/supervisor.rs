use crate::actors::gemini::GeminiActorHandle;
use crate::actors::knowledge::KnowledgeActorHandle;
use crate::actors::messages::{ActorError, AppError, SupervisorMessage};
use crate::actors::traits::{GenerationActor, KnowledgeActor};
use crate::brain::{
    aggregate_preferences, analyze_patterns, apply_feedback, classify_intent, detect_language,
    detect_response_format, improvement_suggestions, language_name,
};
use crate::config::Settings;
use crate::models::{
    ChatResponse, FeedbackResponse, FeedbackType, InputType, Interaction, InteractionFeedback,
    LearnedPreference,
};
use crate::prompts::{
    build_adaptive_prompt, build_chat_prompt, build_general_prompt, build_vision_prompt,
    recent_context,
};
use crate::store::Store;
use chrono::Utc;
use sqlx::types::Json;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout, Duration};
use tracing::{error, info, instrument, warn};

/// Passages fetched per knowledge lookup.
const KNOWLEDGE_SEARCH_LIMIT: usize = 5;

/// Interactions fed into the recent-conversation block of the prompt.
const CONTEXT_WINDOW: usize = 3;

/// Interactions the preference aggregator votes over.
const PREFERENCE_WINDOW: usize = 5;

const CHAT_TIMEOUT: Duration = Duration::from_secs(90);
const FEEDBACK_TIMEOUT: Duration = Duration::from_secs(30);
const INGEST_TIMEOUT: Duration = Duration::from_secs(120);

/// A handle to the `SupervisorActor`.
///
/// This is the primary entry point for all business logic. It orchestrates the
/// generation and knowledge actors together with the store to run the chat,
/// image and feedback flows; HTTP handlers only validate and forward.
#[derive(Clone)]
pub struct SupervisorHandle {
    sender: mpsc::Sender<SupervisorMessage>,
}

impl SupervisorHandle {
    /// Creates a new `SupervisorActor` and returns a handle to it.
    ///
    /// Spawns the supervisor and its children: a `GeminiActor` bound to the
    /// configured upstream, and a `KnowledgeActor` owning the vector store
    /// (seeded from the knowledge directory on first start).
    pub fn new(store: Store, settings: &Settings) -> Self {
        let (sender, receiver) = mpsc::channel(32);
        let actor = new_production_runner(receiver, store, settings);
        tokio::spawn(async move { actor.run().await });
        Self { sender }
    }

    /// Handle over an already-spawned runner, for wiring mock actors.
    #[cfg(test)]
    pub(crate) fn from_sender(sender: mpsc::Sender<SupervisorMessage>) -> Self {
        Self { sender }
    }

    /// Runs the full chat flow for one user message and returns the response
    /// payload. `session_id` must already be resolved by the caller.
    #[instrument(skip(self, message))]
    pub async fn process_chat(
        &self,
        session_id: String,
        message: String,
    ) -> Result<ChatResponse, AppError> {
        let (send, recv) = oneshot::channel();
        let msg = SupervisorMessage::ProcessChat {
            session_id,
            message,
            responder: send,
        };
        self.sender.send(msg).await.map_err(|e| {
            AppError::Actor(ActorError::Internal(format!("Supervisor unavailable: {}", e)))
        })?;
        timeout(CHAT_TIMEOUT, recv).await?.map_err(|e| {
            AppError::Actor(ActorError::Internal(format!(
                "Supervisor dropped response: {}",
                e
            )))
        })?
    }

    /// Runs the image analysis flow: vision prompt, vision generation, store.
    #[instrument(skip(self, caption, image_bytes))]
    pub async fn process_image_chat(
        &self,
        session_id: String,
        caption: String,
        image_bytes: Vec<u8>,
        mime_type: String,
    ) -> Result<ChatResponse, AppError> {
        let (send, recv) = oneshot::channel();
        let msg = SupervisorMessage::ProcessImageChat {
            session_id,
            caption,
            image_bytes,
            mime_type,
            responder: send,
        };
        self.sender.send(msg).await.map_err(|e| {
            AppError::Actor(ActorError::Internal(format!("Supervisor unavailable: {}", e)))
        })?;
        timeout(CHAT_TIMEOUT, recv).await?.map_err(|e| {
            AppError::Actor(ActorError::Internal(format!(
                "Supervisor dropped response: {}",
                e
            )))
        })?
    }

    /// Applies feedback to a stored interaction and updates the session's
    /// learned preferences.
    #[instrument(skip(self))]
    pub async fn process_feedback(
        &self,
        interaction_id: String,
        session_id: String,
        feedback_type: FeedbackType,
        feedback_text: Option<String>,
    ) -> Result<FeedbackResponse, AppError> {
        let (send, recv) = oneshot::channel();
        let msg = SupervisorMessage::ProcessFeedback {
            interaction_id,
            session_id,
            feedback_type,
            feedback_text,
            responder: send,
        };
        self.sender.send(msg).await.map_err(|e| {
            AppError::Actor(ActorError::Internal(format!("Supervisor unavailable: {}", e)))
        })?;
        timeout(FEEDBACK_TIMEOUT, recv).await?.map_err(|e| {
            AppError::Actor(ActorError::Internal(format!(
                "Supervisor dropped response: {}",
                e
            )))
        })?
    }

    /// Chunks, embeds and appends a document to the epic corpus. Returns the
    /// number of chunks written.
    #[instrument(skip(self, content))]
    pub async fn ingest_knowledge(
        &self,
        content: String,
        source: String,
    ) -> Result<usize, AppError> {
        let (send, recv) = oneshot::channel();
        let msg = SupervisorMessage::IngestKnowledge {
            content,
            source,
            responder: send,
        };
        self.sender.send(msg).await.map_err(|e| {
            AppError::Actor(ActorError::Internal(format!("Supervisor unavailable: {}", e)))
        })?;
        timeout(INGEST_TIMEOUT, recv).await?.map_err(|e| {
            AppError::Actor(ActorError::Internal(format!(
                "Supervisor dropped response: {}",
                e
            )))
        })?
    }

    /// Sends the probe prompt to the upstream generation API.
    #[instrument(skip(self))]
    pub async fn probe_generation(&self) -> Result<String, AppError> {
        let (send, recv) = oneshot::channel();
        let msg = SupervisorMessage::ProbeGeneration { responder: send };
        self.sender.send(msg).await.map_err(|e| {
            AppError::Actor(ActorError::Internal(format!("Supervisor unavailable: {}", e)))
        })?;
        timeout(CHAT_TIMEOUT, recv).await?.map_err(|e| {
            AppError::Actor(ActorError::Internal(format!(
                "Supervisor dropped response: {}",
                e
            )))
        })?
    }
}

// --- Actor Runner ---

pub(crate) struct SupervisorRunner<G, K>
where
    G: GenerationActor,
    K: KnowledgeActor,
{
    receiver: mpsc::Receiver<SupervisorMessage>,
    generation: Arc<G>,
    knowledge: Arc<K>,
    store: Store,
}

fn new_production_runner(
    receiver: mpsc::Receiver<SupervisorMessage>,
    store: Store,
    settings: &Settings,
) -> SupervisorRunner<GeminiActorHandle, KnowledgeActorHandle> {
    let generation = GeminiActorHandle::new(
        settings.gemini_api_key.clone(),
        settings.gemini_base_url.clone(),
    );
    let knowledge = KnowledgeActorHandle::new(
        settings.lancedb_dir.clone(),
        settings.data_dir.join("models"),
        Some(settings.knowledge_dir.clone()),
    );
    SupervisorRunner {
        receiver,
        generation: Arc::new(generation),
        knowledge: Arc::new(knowledge),
        store,
    }
}

impl<G, K> SupervisorRunner<G, K>
where
    G: GenerationActor,
    K: KnowledgeActor,
{
    #[allow(dead_code)]
    pub(crate) fn new(
        receiver: mpsc::Receiver<SupervisorMessage>,
        generation: Arc<G>,
        knowledge: Arc<K>,
        store: Store,
    ) -> Self {
        Self {
            receiver,
            generation,
            knowledge,
            store,
        }
    }

    pub(crate) async fn run(mut self) {
        info!("Supervisor started");
        while let Some(msg) = self.receiver.recv().await {
            self.handle_message(msg).await;
        }
        info!("Supervisor stopped");
    }

    async fn handle_message(&mut self, msg: SupervisorMessage) {
        match msg {
            SupervisorMessage::ProcessChat {
                session_id,
                message,
                responder,
            } => {
                let result = self.handle_chat(session_id, message).await;
                if let Err(e) = &result {
                    error!("Error processing chat: {:?}", e);
                }
                let _ = responder.send(result);
            }
            SupervisorMessage::ProcessImageChat {
                session_id,
                caption,
                image_bytes,
                mime_type,
                responder,
            } => {
                let result = self
                    .handle_image_chat(session_id, caption, image_bytes, mime_type)
                    .await;
                if let Err(e) = &result {
                    error!("Error processing image chat: {:?}", e);
                }
                let _ = responder.send(result);
            }
            SupervisorMessage::ProcessFeedback {
                interaction_id,
                session_id,
                feedback_type,
                feedback_text,
                responder,
            } => {
                let result = self
                    .handle_feedback(interaction_id, session_id, feedback_type, feedback_text)
                    .await;
                if let Err(e) = &result {
                    error!("Error processing feedback: {:?}", e);
                }
                let _ = responder.send(result);
            }
            SupervisorMessage::IngestKnowledge {
                content,
                source,
                responder,
            } => {
                info!("Supervisor orchestrating corpus ingestion for '{}'", source);
                let result = self.knowledge.ingest(content, source).await;
                if let Err(e) = &result {
                    error!("Error ingesting corpus: {:?}", e);
                }
                let _ = responder.send(result);
            }
            SupervisorMessage::ProbeGeneration { responder } => {
                let result = self.generation.probe().await;
                let _ = responder.send(result);
            }
        }
    }

    /// The core chat flow: classify, personalize, optionally retrieve, then
    /// generate and persist.
    #[instrument(skip(self, message))]
    async fn handle_chat(
        &mut self,
        session_id: String,
        message: String,
    ) -> Result<ChatResponse, AppError> {
        let detection = detect_language(&message);
        let patterns = analyze_patterns(&message);
        let (intent, intent_confidence) = classify_intent(&message);
        info!(
            "Session {}: intent {} ({:.2}), language {}",
            session_id, intent, intent_confidence, detection.code
        );

        // Reads fail open: a broken preference or history lookup must not
        // block the conversation.
        let preference = match self.store.learned_preference(&session_id).await {
            Ok(preference) => preference,
            Err(e) => {
                warn!("Failed to load learned preference: {}", e);
                None
            }
        };
        let recent = match self.store.recent_interactions(&session_id, CONTEXT_WINDOW).await {
            Ok(recent) => recent,
            Err(e) => {
                warn!("Failed to load conversation context: {}", e);
                Vec::new()
            }
        };
        let context = recent_context(&recent);

        let prompt = if intent.uses_knowledge() {
            let mut query = message.clone();
            if !patterns.keywords.is_empty() {
                query.push(' ');
                query.push_str(&patterns.keywords.join(" "));
            }
            let passages = match self.knowledge.search(query, KNOWLEDGE_SEARCH_LIMIT).await {
                Ok(passages) => passages,
                Err(e) => {
                    warn!("Knowledge search failed: {}. Using internal knowledge.", e);
                    Vec::new()
                }
            };
            build_adaptive_prompt(&message, &passages)
        } else if detection.should_display || preference.is_some() || context.is_some() {
            build_chat_prompt(&message, &detection, preference.as_ref(), context.as_deref())
        } else {
            // First contact with nothing learned yet: plain companion prompt.
            build_general_prompt(&message)
        };

        let bot_response = self.generation.generate(prompt).await?;
        let response_format = detect_response_format(&bot_response);

        let interaction = Interaction {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.clone(),
            input_type: InputType::Text,
            user_input: message,
            bot_response: bot_response.clone(),
            language_code: detection.should_display.then(|| detection.code.clone()),
            language_name: detection
                .should_display
                .then(|| display_language_name(&detection.code)),
            timestamp: Utc::now().timestamp(),
            input_patterns: Json(patterns),
            response_format: Json(response_format),
            response_length: bot_response.len() as i64,
            feedback: None,
        };
        let stored = self.store.store_interaction(interaction).await?;

        if let Err(e) = self.update_preferences(&session_id).await {
            warn!("Preference update failed for session {}: {}", session_id, e);
        }

        let mut response = ChatResponse {
            response: bot_response,
            session_id,
            interaction_id: stored.id,
            intent: intent.label().to_string(),
            detected_language: None,
            language_name: None,
            confidence: None,
        };
        if detection.should_display {
            response.language_name = Some(display_language_name(&detection.code));
            response.detected_language = Some(detection.code);
            response.confidence = Some(detection.confidence);
        }
        Ok(response)
    }

    /// The image flow: no intent routing, no knowledge path.
    #[instrument(skip(self, caption, image_bytes))]
    async fn handle_image_chat(
        &mut self,
        session_id: String,
        caption: String,
        image_bytes: Vec<u8>,
        mime_type: String,
    ) -> Result<ChatResponse, AppError> {
        let detection = detect_language(&caption);
        let patterns = analyze_patterns(&caption);
        info!(
            "Session {}: image chat ({} bytes, {}), language {}",
            session_id,
            image_bytes.len(),
            mime_type,
            detection.code
        );

        let prompt = build_vision_prompt(&caption, &detection);
        let bot_response = self
            .generation
            .generate_vision(prompt, image_bytes, mime_type)
            .await?;
        let response_format = detect_response_format(&bot_response);

        let interaction = Interaction {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.clone(),
            input_type: InputType::Image,
            user_input: caption,
            bot_response: bot_response.clone(),
            language_code: detection.should_display.then(|| detection.code.clone()),
            language_name: detection
                .should_display
                .then(|| display_language_name(&detection.code)),
            timestamp: Utc::now().timestamp(),
            input_patterns: Json(patterns),
            response_format: Json(response_format),
            response_length: bot_response.len() as i64,
            feedback: None,
        };
        let stored = self.store.store_interaction(interaction).await?;

        if let Err(e) = self.update_preferences(&session_id).await {
            warn!("Preference update failed for session {}: {}", session_id, e);
        }

        let mut response = ChatResponse {
            response: bot_response,
            session_id,
            interaction_id: stored.id,
            intent: "general".to_string(),
            detected_language: None,
            language_name: None,
            confidence: None,
        };
        if detection.should_display {
            response.language_name = Some(display_language_name(&detection.code));
            response.detected_language = Some(detection.code);
            response.confidence = Some(detection.confidence);
        }
        Ok(response)
    }

    /// The feedback flow: load the interaction, apply the learning rules,
    /// attach the feedback, persist an append-only record.
    #[instrument(skip(self, feedback_text))]
    async fn handle_feedback(
        &mut self,
        interaction_id: String,
        session_id: String,
        feedback_type: FeedbackType,
        feedback_text: Option<String>,
    ) -> Result<FeedbackResponse, AppError> {
        let interaction = self
            .store
            .get_interaction(&interaction_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Interaction not found".to_string()))?;

        let mut preference = self
            .store
            .learned_preference(&session_id)
            .await?
            .unwrap_or_else(|| LearnedPreference::new(&session_id));
        apply_feedback(&mut preference, feedback_type, &interaction);
        self.store.upsert_learned_preference(&preference).await?;

        let attached = InteractionFeedback {
            feedback_type,
            feedback_text: feedback_text.clone(),
            feedback_timestamp: Utc::now(),
        };
        let updated = self
            .store
            .update_interaction_feedback(&interaction_id, &attached)
            .await?;
        if !updated {
            warn!(
                "Interaction {} disappeared before feedback could be attached",
                interaction_id
            );
        }

        let suggestions = improvement_suggestions(feedback_type, &interaction);
        let record = self
            .store
            .insert_feedback_record(&interaction, feedback_type, feedback_text.as_deref(), suggestions)
            .await?;
        info!(
            "Feedback {} ({}) recorded for interaction {}",
            record.id,
            feedback_type.as_str(),
            interaction_id
        );

        Ok(FeedbackResponse {
            success: true,
            message: "Feedback received. The AI will learn from this to improve future responses!"
                .to_string(),
            feedback_type,
        })
    }

    /// Re-aggregates the session's preference row from its recent
    /// interactions.
    async fn update_preferences(&mut self, session_id: &str) -> Result<(), AppError> {
        let recent = self
            .store
            .recent_interactions(session_id, PREFERENCE_WINDOW)
            .await?;
        let snapshot = aggregate_preferences(&recent);

        let mut preference = self
            .store
            .learned_preference(session_id)
            .await?
            .unwrap_or_else(|| LearnedPreference::new(session_id));
        preference.preferred_format = snapshot.preferred_format;
        preference.formality_level = snapshot.formality_level;
        preference.preferred_length = snapshot.preferred_length;
        preference.topics_of_interest = Json(snapshot.topics_of_interest);
        preference.interaction_count = recent.len() as i64;
        preference.last_updated = Utc::now().timestamp();

        self.store.upsert_learned_preference(&preference).await
    }
}

fn display_language_name(code: &str) -> String {
    language_name(code).unwrap_or("Unknown").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KnowledgePassage;
    use async_trait::async_trait;
    use std::sync::Mutex;

    // --- Mock Actors ---

    #[derive(Clone)]
    struct MockGenerationActor {
        response: Arc<Mutex<Result<String, AppError>>>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl MockGenerationActor {
        fn new(response: Result<String, AppError>) -> Self {
            Self {
                response: Arc::new(Mutex::new(response)),
                prompts: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl GenerationActor for MockGenerationActor {
        async fn generate(&self, prompt: String) -> Result<String, AppError> {
            self.prompts.lock().unwrap().push(prompt);
            self.response.lock().unwrap().clone()
        }

        async fn generate_vision(
            &self,
            prompt: String,
            _image_bytes: Vec<u8>,
            _mime_type: String,
        ) -> Result<String, AppError> {
            self.prompts.lock().unwrap().push(prompt);
            self.response.lock().unwrap().clone()
        }

        async fn probe(&self) -> Result<String, AppError> {
            self.response.lock().unwrap().clone()
        }
    }

    #[derive(Clone)]
    struct MockKnowledgeActor {
        passages: Arc<Mutex<Result<Vec<KnowledgePassage>, AppError>>>,
        queries: Arc<Mutex<Vec<String>>>,
        ingested: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl MockKnowledgeActor {
        fn new(passages: Result<Vec<KnowledgePassage>, AppError>) -> Self {
            Self {
                passages: Arc::new(Mutex::new(passages)),
                queries: Arc::new(Mutex::new(Vec::new())),
                ingested: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn last_query(&self) -> String {
            self.queries.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl KnowledgeActor for MockKnowledgeActor {
        async fn ingest(&self, content: String, source: String) -> Result<usize, AppError> {
            self.ingested.lock().unwrap().push((content, source));
            Ok(7)
        }

        async fn search(
            &self,
            query: String,
            _limit: usize,
        ) -> Result<Vec<KnowledgePassage>, AppError> {
            self.queries.lock().unwrap().push(query);
            self.passages.lock().unwrap().clone()
        }
    }

    // --- Test Setup ---

    fn passage(content: &str, source: &str) -> KnowledgePassage {
        KnowledgePassage {
            content: content.to_string(),
            source: source.to_string(),
            score: 0.1,
        }
    }

    async fn setup_supervisor_with_mocks(
        generation_response: Result<String, AppError>,
        knowledge_response: Result<Vec<KnowledgePassage>, AppError>,
    ) -> (
        SupervisorHandle,
        Store,
        MockGenerationActor,
        MockKnowledgeActor,
    ) {
        let (sender, receiver) = mpsc::channel(32);
        let store = Store::memory_only();
        let generation = MockGenerationActor::new(generation_response);
        let knowledge = MockKnowledgeActor::new(knowledge_response);

        let runner = SupervisorRunner::new(
            receiver,
            Arc::new(generation.clone()),
            Arc::new(knowledge.clone()),
            store.clone(),
        );
        tokio::spawn(async move { runner.run().await });

        (SupervisorHandle { sender }, store, generation, knowledge)
    }

    // --- Tests ---

    #[tokio::test]
    async fn test_cold_general_chat_uses_companion_prompt() {
        // 1. Arrange
        let (handle, store, generation, _knowledge) =
            setup_supervisor_with_mocks(Ok("Hello, friend.".to_string()), Ok(vec![])).await;

        // 2. Act
        let result = handle
            .process_chat("sess-cold".to_string(), "hello there friend".to_string())
            .await
            .unwrap();

        // 3. Assert
        assert_eq!(result.response, "Hello, friend.");
        assert_eq!(result.intent, "general");
        assert!(result.detected_language.is_none());
        assert!(generation.last_prompt().contains("wise, empathetic"));

        let stored = store.recent_interactions("sess-cold", 10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, result.interaction_id);
    }

    #[tokio::test]
    async fn test_factual_chat_routes_through_knowledge() {
        // 1. Arrange
        let passages = vec![passage("Arjuna was the third Pandava prince.", "mahabharata")];
        let (handle, _store, generation, knowledge) =
            setup_supervisor_with_mocks(Ok("Arjuna was a great archer.".to_string()), Ok(passages))
                .await;

        // 2. Act
        let result = handle
            .process_chat("sess-factual".to_string(), "Who is Arjuna?".to_string())
            .await
            .unwrap();

        // 3. Assert
        assert_eq!(result.intent, "factual");

        // The query is expanded with the analyzer's keywords.
        let query = knowledge.last_query();
        assert!(query.starts_with("Who is Arjuna?"));
        assert!(query.contains("arjuna"));

        let prompt = generation.last_prompt();
        assert!(prompt.contains("KNOWLEDGE BASE:"));
        assert!(prompt.contains("Info: Arjuna was the third Pandava prince."));
    }

    #[tokio::test]
    async fn test_search_failure_falls_back_to_internal_knowledge() {
        // 1. Arrange
        let (handle, _store, generation, _knowledge) = setup_supervisor_with_mocks(
            Ok("Rama ruled Ayodhya.".to_string()),
            Err(AppError::Actor(ActorError::Knowledge("down".to_string()))),
        )
        .await;

        // 2. Act
        let result = handle
            .process_chat("sess-fallback".to_string(), "Who is Rama?".to_string())
            .await
            .unwrap();

        // 3. Assert
        assert_eq!(result.response, "Rama ruled Ayodhya.");
        assert!(generation.last_prompt().contains("Internal Knowledge"));
    }

    #[tokio::test]
    async fn test_warm_session_gets_personalized_prompt() {
        // 1. Arrange
        let (handle, _store, generation, _knowledge) =
            setup_supervisor_with_mocks(Ok("Always happy to help!".to_string()), Ok(vec![])).await;

        // 2. Act
        handle
            .process_chat("sess-warm".to_string(), "hello there friend".to_string())
            .await
            .unwrap();
        handle
            .process_chat("sess-warm".to_string(), "thanks so much my friend".to_string())
            .await
            .unwrap();

        // 3. Assert
        let prompt = generation.last_prompt();
        assert!(prompt.contains("Learned Preferences:"));
        assert!(prompt.contains("Recent conversation:"));
        assert!(prompt.contains("User: hello there friend"));
        assert!(prompt.ends_with("User Message: thanks so much my friend"));
    }

    #[tokio::test]
    async fn test_generation_error_propagates_without_store_write() {
        // 1. Arrange
        let (handle, store, _generation, _knowledge) = setup_supervisor_with_mocks(
            Err(AppError::Upstream("status 429: quota exceeded".to_string())),
            Ok(vec![]),
        )
        .await;

        // 2. Act
        let result = handle
            .process_chat("sess-err".to_string(), "hello there friend".to_string())
            .await;

        // 3. Assert
        match result {
            Err(AppError::Upstream(msg)) => assert!(msg.contains("quota")),
            other => panic!("expected an upstream error, got {other:?}"),
        }
        let stored = store.recent_interactions("sess-err", 10).await.unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn test_feedback_on_unknown_interaction_is_not_found() {
        // 1. Arrange
        let (handle, _store, _generation, _knowledge) =
            setup_supervisor_with_mocks(Ok("unused".to_string()), Ok(vec![])).await;

        // 2. Act
        let result = handle
            .process_feedback(
                "missing-id".to_string(),
                "sess-feedback".to_string(),
                FeedbackType::ThumbsUp,
                None,
            )
            .await;

        // 3. Assert
        match result {
            Err(AppError::NotFound(msg)) => assert_eq!(msg, "Interaction not found"),
            other => panic!("expected not-found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_too_long_feedback_shortens_preference() {
        // 1. Arrange
        let (handle, store, _generation, _knowledge) = setup_supervisor_with_mocks(
            Ok("A very long and winding answer.".to_string()),
            Ok(vec![]),
        )
        .await;
        let chat = handle
            .process_chat("sess-long".to_string(), "hello there friend".to_string())
            .await
            .unwrap();

        // 2. Act
        let result = handle
            .process_feedback(
                chat.interaction_id.clone(),
                "sess-long".to_string(),
                FeedbackType::TooLong,
                Some("too wordy".to_string()),
            )
            .await
            .unwrap();

        // 3. Assert
        assert!(result.success);
        assert_eq!(
            result.message,
            "Feedback received. The AI will learn from this to improve future responses!"
        );

        let preference = store
            .learned_preference("sess-long")
            .await
            .unwrap()
            .expect("preference row should exist");
        assert_eq!(preference.preferred_length, "short");
        assert_eq!(preference.total_feedback_count, 1);

        let records = store.recent_feedback_records(10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].interaction_id, chat.interaction_id);
        assert!(records[0]
            .improvement_suggestions
            .0
            .contains(&"Reduce response length for this user".to_string()));

        let interaction = store
            .get_interaction(&chat.interaction_id)
            .await
            .unwrap()
            .unwrap();
        let attached = interaction.feedback.expect("feedback should be attached");
        assert_eq!(attached.0.feedback_type, FeedbackType::TooLong);
    }

    #[tokio::test]
    async fn test_image_chat_stores_image_interaction() {
        // 1. Arrange
        let (handle, store, generation, _knowledge) =
            setup_supervisor_with_mocks(Ok("A serene temple at dusk.".to_string()), Ok(vec![]))
                .await;

        // 2. Act
        let result = handle
            .process_image_chat(
                "sess-image".to_string(),
                "what is in this picture".to_string(),
                vec![1, 2, 3],
                "image/png".to_string(),
            )
            .await
            .unwrap();

        // 3. Assert
        assert_eq!(result.intent, "general");
        assert!(generation.last_prompt().contains("Main Subject"));

        let stored = store.recent_interactions("sess-image", 10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].input_type, InputType::Image);
        assert_eq!(stored[0].user_input, "what is in this picture");
    }

    #[tokio::test]
    async fn test_probe_and_ingest_delegate_to_children() {
        // 1. Arrange
        let (handle, _store, _generation, knowledge) =
            setup_supervisor_with_mocks(Ok("Hello!".to_string()), Ok(vec![])).await;

        // 2. Act
        let probe = handle.probe_generation().await.unwrap();
        let chunks = handle
            .ingest_knowledge("Some epic verse".to_string(), "ramayana".to_string())
            .await
            .unwrap();

        // 3. Assert
        assert_eq!(probe, "Hello!");
        assert_eq!(chunks, 7);
        let ingested = knowledge.ingested.lock().unwrap();
        assert_eq!(ingested.len(), 1);
        assert_eq!(ingested[0].1, "ramayana");
    }
}
