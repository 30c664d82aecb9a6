//! The memory manager: one character session.
//!
//! Owns the live profile, the memory stream and the completion provider, and
//! runs the retrieve -> prompt -> generate -> write-back loop.
//!
//! # Failure policy
//!
//! | Where | Generation failure | Storage/index failure |
//! |-------|--------------------|-----------------------|
//! | `chat`, `chat_as`, `chat_stream` | `reply = Err(..)` | logged, added to `warnings` |
//! | direct operations | n/a | returned as `Err` |

use crate::config::AnimaConfig;
use crate::embedding::default_embedder;
use crate::llm::{GenerationRequest, LlmProvider, OpenRouterClient, TokenStream};
use crate::models::{
    CharacterProfile, ChatMessage, IndexedMemory, MemoryId, MemoryItem, MemoryType,
    RetrievedMemory, TURN_IMPORTANCE, render_transcript,
};
use crate::rendering::{Interlocutor, build_system_prompt, render_context};
use crate::services::backfill::{BackfillReport, backfill_items};
use crate::services::reflection::{ReflectionEngine, ReflectionOutcome, Staged, daily_log_memory};
use crate::services::usage::{TokenUsage, UsageStats};
use crate::storage::{JsonProfileStore, MemoryStream, ProfileStore, dir_size};
use crate::{Error, GenerationError, Result};
use chrono::Utc;
use std::path::PathBuf;
use std::time::Instant;
use tracing::instrument;

/// Result of one synchronous chat turn.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    /// The reply, or why none was produced.
    pub reply: std::result::Result<String, GenerationError>,
    /// Memories used as context, closest first.
    pub memories: Vec<RetrievedMemory>,
    /// Estimated token usage.
    pub usage: TokenUsage,
    /// Non-fatal storage problems hit during the turn.
    pub warnings: Vec<String>,
}

impl ChatTurn {
    /// The reply text, or the error sentinel if generation failed.
    #[must_use]
    pub fn display_text(&self) -> String {
        match &self.reply {
            Ok(text) => text.clone(),
            Err(e) => e.sentinel(),
        }
    }
}

/// A reply being streamed.
///
/// Yields fragments as they arrive and buffers everything yielded. Iteration
/// stops after the first error. Pass the drained turn to
/// [`MemoryManager::commit_stream`] to write it to memory; dropping it
/// abandons the draft.
pub struct StreamingTurn {
    user_input: String,
    tokens: TokenStream,
    buffer: String,
    error: Option<GenerationError>,
    finished: bool,
    /// Memories used as context, closest first.
    pub memories: Vec<RetrievedMemory>,
    /// Estimated token usage; output is filled in on commit.
    pub usage: TokenUsage,
    /// Non-fatal storage problems hit while preparing the turn.
    pub warnings: Vec<String>,
}

impl StreamingTurn {
    /// The user message this turn answers.
    #[must_use]
    pub fn user_input(&self) -> &str {
        &self.user_input
    }

    /// Everything yielded so far.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// The error that ended the stream, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&GenerationError> {
        self.error.as_ref()
    }

    /// True once the stream has been drained without error.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.finished && self.error.is_none()
    }
}

impl Iterator for StreamingTurn {
    type Item = std::result::Result<String, GenerationError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.tokens.next() {
            Some(Ok(fragment)) => {
                self.buffer.push_str(&fragment);
                Some(Ok(fragment))
            },
            Some(Err(e)) => {
                self.finished = true;
                self.error = Some(e.clone());
                Some(Err(e))
            },
            None => {
                self.finished = true;
                None
            },
        }
    }
}

/// Snapshot of the session's storage and usage.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryStats {
    /// Items in the memory stream.
    pub memory_count: usize,
    /// Bytes used by the memory directory, when file-backed.
    pub storage_bytes: Option<u64>,
    /// Active completion model.
    pub model: String,
    /// Whether a usable credential is configured.
    pub has_credential: bool,
    /// 95th percentile retrieval latency this session.
    pub p95_retrieval_ms: Option<f64>,
    /// Completed turns this session.
    pub turns: usize,
}

/// Session facade over profile, memory stream and completion provider.
pub struct MemoryManager {
    profile: CharacterProfile,
    profile_store: Box<dyn ProfileStore>,
    stream: MemoryStream,
    llm: Box<dyn LlmProvider>,
    retrieval_limit: usize,
    session: Vec<ChatMessage>,
    usage: UsageStats,
    memory_dir: Option<PathBuf>,
}

impl MemoryManager {
    /// Assembles a manager, loading the stored profile or starting from the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile store cannot be read.
    pub fn new(
        profile_store: Box<dyn ProfileStore>,
        stream: MemoryStream,
        llm: Box<dyn LlmProvider>,
    ) -> Result<Self> {
        let profile = match profile_store.load()? {
            Some(profile) => profile,
            None => {
                tracing::info!("No stored profile; starting from the default character");
                CharacterProfile::default()
            },
        };
        Ok(Self {
            profile,
            profile_store,
            stream,
            llm,
            retrieval_limit: crate::config::DEFAULT_RETRIEVAL_LIMIT,
            session: Vec::new(),
            usage: UsageStats::new(),
            memory_dir: None,
        })
    }

    /// Opens the file-backed session described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile or memory index cannot be opened.
    pub fn open(config: &AnimaConfig) -> Result<Self> {
        let memory_dir = config.memory_dir();
        let stream = MemoryStream::open(&memory_dir, default_embedder(config))?;
        let store = JsonProfileStore::new(config.profile_path());
        let llm = OpenRouterClient::from_config(&config.llm);

        let mut manager = Self::new(Box::new(store), stream, Box::new(llm))?
            .with_retrieval_limit(config.retrieval_limit);
        manager.memory_dir = Some(memory_dir);
        Ok(manager)
    }

    /// Sets how many memories each turn retrieves.
    #[must_use]
    pub const fn with_retrieval_limit(mut self, limit: usize) -> Self {
        self.retrieval_limit = limit;
        self
    }

    /// The live profile.
    #[must_use]
    pub const fn profile(&self) -> &CharacterProfile {
        &self.profile
    }

    /// The memory stream.
    #[must_use]
    pub const fn stream(&self) -> &MemoryStream {
        &self.stream
    }

    /// The completion provider.
    #[must_use]
    pub fn llm(&self) -> &dyn LlmProvider {
        self.llm.as_ref()
    }

    /// Mutable access to the completion provider, for switching model or key.
    pub fn llm_mut(&mut self) -> &mut dyn LlmProvider {
        self.llm.as_mut()
    }

    /// Messages exchanged since the session started or was last reflected on.
    #[must_use]
    pub fn session(&self) -> &[ChatMessage] {
        &self.session
    }

    /// Forgets the session transcript without reflecting.
    pub fn clear_session(&mut self) {
        self.session.clear();
    }

    /// Usage counters for this session.
    #[must_use]
    pub const fn usage(&self) -> &UsageStats {
        &self.usage
    }

    /// Persists the live profile as is.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the save fails.
    pub fn save_profile(&self) -> Result<()> {
        self.profile_store.save(&self.profile)
    }

    /// Saves `next` and, only if that succeeds, makes it the live profile.
    fn commit_profile(&mut self, mut next: CharacterProfile) -> Result<()> {
        next.updated_at = Utc::now();
        self.profile_store.save(&next)?;
        self.profile = next;
        Ok(())
    }

    /// Replaces the whole profile and persists it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the save fails; the live profile is then unchanged.
    #[instrument(name = "anima.manager.replace_profile", skip(self, profile), fields(component = "memory_manager", operation = "replace_profile", name = %profile.name))]
    pub fn replace_profile(&mut self, profile: CharacterProfile) -> Result<()> {
        self.commit_profile(profile)
    }

    /// Renames the character and persists the profile.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a blank name or [`Error::Storage`]
    /// if the save fails.
    pub fn rename(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("name must not be empty".to_string()));
        }
        let mut next = self.profile.clone();
        name.clone_into(&mut next.name);
        self.commit_profile(next)
    }

    /// The system prompt for the current profile and `interlocutor`.
    #[must_use]
    pub fn system_prompt(&self, interlocutor: &Interlocutor) -> String {
        build_system_prompt(&self.profile, interlocutor)
    }

    /// Searches the stream; `n` defaults to the configured retrieval limit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] if the search fails.
    pub fn retrieve_relevant_memories(
        &self,
        query: &str,
        n: Option<usize>,
    ) -> Result<Vec<RetrievedMemory>> {
        self.stream.search(query, n.unwrap_or(self.retrieval_limit))
    }

    /// Records one exchange as an observation and an action.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] if the write fails.
    #[instrument(name = "anima.manager.save_interaction", skip(self, user_input, ai_response), fields(component = "memory_manager", operation = "save_interaction"))]
    pub fn save_interaction(
        &mut self,
        user_input: &str,
        ai_response: &str,
        user_name: &str,
    ) -> Result<()> {
        let observation = MemoryItem::new(
            MemoryType::Observation,
            format!("{user_name} said: {user_input}"),
        )
        .with_importance(TURN_IMPORTANCE);
        let action = MemoryItem::new(
            MemoryType::Action,
            format!("I replied to {user_name}: {ai_response}"),
        )
        .with_importance(TURN_IMPORTANCE);
        self.stream.add(&[observation, action])
    }

    /// Adds a memory by hand.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for blank content or [`Error::Index`]
    /// if the write fails.
    pub fn add_memory(
        &mut self,
        content: &str,
        memory_type: MemoryType,
        importance: i64,
    ) -> Result<MemoryId> {
        if content.trim().is_empty() {
            return Err(Error::InvalidInput(
                "memory content must not be empty".to_string(),
            ));
        }
        let item = MemoryItem::new(memory_type, content).with_importance(importance);
        let id = item.id.clone();
        self.stream.add(&[item])?;
        Ok(id)
    }

    /// Replaces a memory's content, type and importance. Returns false if absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] if the write fails.
    pub fn update_memory(
        &mut self,
        id: &MemoryId,
        content: &str,
        memory_type: MemoryType,
        importance: i64,
    ) -> Result<bool> {
        self.stream.update(id, content, memory_type, importance)
    }

    /// Deletes a memory. Returns false if absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] if the write fails.
    pub fn delete_memory(&mut self, id: &MemoryId) -> Result<bool> {
        self.stream.delete(id)
    }

    /// The newest memories first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] if the query fails.
    pub fn recent_memories(&self, limit: usize) -> Result<Vec<IndexedMemory>> {
        self.stream.recent(limit)
    }

    /// One turn with the default interlocutor.
    pub fn chat(&mut self, user_input: &str) -> ChatTurn {
        self.chat_as(user_input, &Interlocutor::default())
    }

    /// One synchronous turn: retrieve, prompt, generate, write back.
    #[instrument(name = "anima.manager.chat", skip(self, user_input, interlocutor), fields(component = "memory_manager", operation = "chat"))]
    pub fn chat_as(&mut self, user_input: &str, interlocutor: &Interlocutor) -> ChatTurn {
        let prepared = self.prepare(user_input, interlocutor);
        let mut warnings = prepared.warnings;

        let reply = self.llm.generate(&prepared.request);
        let usage = match &reply {
            Ok(text) => {
                if let Err(e) = self.save_interaction(user_input, text, &interlocutor.name) {
                    tracing::warn!(error = %e, "Failed to write interaction to memory");
                    warnings.push(format!("interaction not saved: {e}"));
                }
                let usage = prepared.usage.with_output(text);
                self.finish_turn(user_input, text, &usage);
                usage
            },
            Err(_) => prepared.usage,
        };
        metrics::counter!("chat_turns_total", "status" => if reply.is_ok() { "success" } else { "error" })
            .increment(1);

        ChatTurn {
            reply,
            memories: prepared.memories,
            usage,
            warnings,
        }
    }

    /// Starts a streamed turn. Nothing is written until [`Self::commit_stream`].
    #[instrument(name = "anima.manager.chat_stream", skip(self, user_input, interlocutor), fields(component = "memory_manager", operation = "chat_stream"))]
    pub fn chat_stream(&mut self, user_input: &str, interlocutor: &Interlocutor) -> StreamingTurn {
        let prepared = self.prepare(user_input, interlocutor);
        let tokens: TokenStream = match self.llm.generate_stream(&prepared.request) {
            Ok(tokens) => tokens,
            Err(e) => Box::new(std::iter::once(Err(e))),
        };

        StreamingTurn {
            user_input: user_input.to_string(),
            tokens,
            buffer: String::new(),
            error: None,
            finished: false,
            memories: prepared.memories,
            usage: prepared.usage,
            warnings: prepared.warnings,
        }
    }

    /// Writes a fully drained, error-free stream to memory.
    ///
    /// Returns the response text, or `None` if the stream failed or was not
    /// drained; nothing is written in that case.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] if the write fails.
    pub fn commit_stream(
        &mut self,
        turn: StreamingTurn,
        interlocutor: &Interlocutor,
    ) -> Result<Option<String>> {
        if !turn.is_complete() {
            tracing::debug!(error = ?turn.error(), "Discarding incomplete streamed reply");
            metrics::counter!("chat_turns_total", "status" => "error").increment(1);
            return Ok(None);
        }

        let response = turn.buffer;
        self.save_interaction(&turn.user_input, &response, &interlocutor.name)?;
        let usage = turn.usage.with_output(&response);
        self.finish_turn(&turn.user_input, &response, &usage);
        metrics::counter!("chat_turns_total", "status" => "success").increment(1);
        Ok(Some(response))
    }

    /// Retrieval, context and prompt shared by both chat shapes.
    fn prepare(&mut self, user_input: &str, interlocutor: &Interlocutor) -> PreparedTurn {
        let mut warnings = Vec::new();

        let start = Instant::now();
        let memories = match self.retrieve_relevant_memories(user_input, None) {
            Ok(memories) => memories,
            Err(e) => {
                tracing::warn!(error = %e, "Memory retrieval failed; continuing without context");
                warnings.push(format!("memory retrieval failed: {e}"));
                Vec::new()
            },
        };
        self.usage.record_retrieval(start.elapsed());

        let context = render_context(&memories);
        let system = self.system_prompt(interlocutor);

        let mut transcript = self.session.clone();
        transcript.push(ChatMessage::user(user_input));
        let usage = TokenUsage::estimate(
            &system,
            &context,
            &render_transcript(&transcript),
            user_input,
        );

        PreparedTurn {
            request: GenerationRequest::new(system, user_input).with_context(context),
            memories,
            usage,
            warnings,
        }
    }

    fn finish_turn(&mut self, user_input: &str, response: &str, usage: &TokenUsage) {
        self.session.push(ChatMessage::user(user_input));
        self.session.push(ChatMessage::assistant(response));
        self.usage.record_turn(usage);
    }

    /// Reflects on `history` and merges the resulting delta into the profile.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the merged profile cannot be saved; the
    /// live profile is then unchanged.
    #[instrument(name = "anima.manager.reflect", skip(self, history), fields(component = "memory_manager", operation = "reflect"))]
    pub fn reflect_on_interaction(
        &mut self,
        history: &[ChatMessage],
        user_name: &str,
    ) -> Result<ReflectionOutcome> {
        let staged = ReflectionEngine::new(self.llm.as_ref()).stage(&self.profile, history, user_name)?;

        let outcome = match staged {
            Staged::Done(outcome) => outcome,
            Staged::Merge { scratch, report } => {
                self.profile_store.save(&scratch).inspect_err(|e| {
                    tracing::error!(error = %e, "Failed to persist reflected profile");
                    metrics::counter!("reflection_outcomes_total", "outcome" => "storage_error")
                        .increment(1);
                })?;
                self.profile = *scratch;

                let mut changes = report.changes;
                let daily_log_memory = report.daily_log.and_then(|entry| {
                    let item = daily_log_memory(&entry);
                    let id = item.id.clone();
                    match self.stream.add(&[item]) {
                        Ok(()) => Some(id),
                        Err(e) => {
                            tracing::warn!(error = %e, "Daily log not mirrored to memory");
                            changes.push(format!(
                                "Daily log could not be saved to long-term memory: {e}"
                            ));
                            None
                        },
                    }
                });
                ReflectionOutcome::Applied {
                    changes,
                    daily_log_memory,
                }
            },
        };

        metrics::counter!("reflection_outcomes_total", "outcome" => outcome.label()).increment(1);
        tracing::info!(outcome = outcome.label(), "Reflection finished");
        Ok(outcome)
    }

    /// Reflects on the session transcript.
    ///
    /// The transcript is cleared once it has been merged (or was empty) and
    /// kept when reflection failed, so it can be retried.
    ///
    /// # Errors
    ///
    /// Same as [`Self::reflect_on_interaction`].
    pub fn reflect_on_session(&mut self, user_name: &str) -> Result<ReflectionOutcome> {
        let history = std::mem::take(&mut self.session);
        let outcome = self.reflect_on_interaction(&history, user_name);
        match &outcome {
            Ok(ReflectionOutcome::Applied { .. } | ReflectionOutcome::NothingToReflect) => {},
            _ => self.session = history,
        }
        outcome
    }

    /// Mirrors every daily-log entry of the profile into the stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] if the write fails.
    #[instrument(name = "anima.manager.backfill", skip(self), fields(component = "memory_manager", operation = "backfill"))]
    pub fn backfill_daily_logs(&mut self) -> Result<BackfillReport> {
        let items = backfill_items(&self.profile.daily_log);
        self.stream.add(&items)?;
        let report = BackfillReport {
            scanned: self.profile.daily_log.len(),
            written: items.len(),
        };
        tracing::info!(scanned = report.scanned, written = report.written, "Backfilled daily logs");
        Ok(report)
    }

    /// Storage and usage snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] if the stream cannot be counted.
    pub fn stats(&self) -> Result<MemoryStats> {
        Ok(MemoryStats {
            memory_count: self.stream.count()?,
            storage_bytes: self.memory_dir.as_deref().map(dir_size),
            model: self.llm.model().to_string(),
            has_credential: self.llm.has_credential(),
            p95_retrieval_ms: self.usage.p95_retrieval_ms(),
            turns: self.usage.turns(),
        })
    }
}

struct PreparedTurn {
    request: GenerationRequest,
    memories: Vec<RetrievedMemory>,
    usage: TokenUsage,
    warnings: Vec<String>,
}
