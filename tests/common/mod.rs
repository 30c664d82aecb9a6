//! Shared fixtures for integration tests.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use anima::embedding::HashedEmbedder;
use anima::llm::{GenerationRequest, LlmProvider, TokenStream};
use anima::storage::InMemoryProfileStore;
use anima::{AnimaConfig, GenerationError, MemoryManager, MemoryStream};
use secrecy::SecretString;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Embedding width used by every fixture.
pub const TEST_DIMENSIONS: usize = 128;

/// A completion provider that replays canned replies and records requests.
///
/// Clones share the same script, so a test can keep a handle after moving
/// one into a manager.
#[derive(Clone, Default)]
pub struct ScriptedLlm {
    replies: Arc<Mutex<VecDeque<Result<String, GenerationError>>>>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
    model: String,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self {
            model: "scripted-model".to_string(),
            ..Self::default()
        }
    }

    /// Queues a successful reply.
    pub fn reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    /// Queues a failure.
    pub fn fail(self, error: GenerationError) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    /// Number of requests received so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_reply(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::Transport("script exhausted".to_string())))
    }
}

impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn set_model(&mut self, model: String) {
        self.model = model;
    }

    fn set_api_key(&mut self, _api_key: Option<SecretString>) {}

    fn has_credential(&self) -> bool {
        true
    }

    fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.next_reply(request)
    }

    /// Streams the reply one word at a time.
    fn generate_stream(&self, request: &GenerationRequest) -> Result<TokenStream, GenerationError> {
        let text = self.next_reply(request)?;
        let fragments: Vec<Result<String, GenerationError>> = text
            .split_inclusive(' ')
            .map(|word| Ok(word.to_string()))
            .collect();
        Ok(Box::new(fragments.into_iter()))
    }
}

/// A stream that lives only in memory.
pub fn memory_stream() -> MemoryStream {
    MemoryStream::in_memory(Box::new(HashedEmbedder::new(TEST_DIMENSIONS))).expect("stream")
}

/// A manager over an in-memory profile store and stream.
pub fn in_memory_manager(llm: &ScriptedLlm) -> (MemoryManager, Arc<InMemoryProfileStore>) {
    let store = Arc::new(InMemoryProfileStore::new());
    let manager = MemoryManager::new(
        Box::new(Arc::clone(&store)),
        memory_stream(),
        Box::new(llm.clone()),
    )
    .expect("manager");
    (manager, store)
}

/// A configuration rooted at `dir`.
pub fn config_in(dir: &Path) -> AnimaConfig {
    let mut config = AnimaConfig::default().with_data_dir(dir);
    config.embedding_dimensions = TEST_DIMENSIONS;
    config
}

/// A file-backed manager rooted at `dir`, with the scripted provider swapped in.
pub fn file_manager(dir: &Path, llm: &ScriptedLlm) -> MemoryManager {
    let config = config_in(dir);
    let stream = MemoryStream::open(
        &config.memory_dir(),
        Box::new(HashedEmbedder::new(TEST_DIMENSIONS)),
    )
    .expect("stream");
    let store = anima::JsonProfileStore::new(config.profile_path());
    MemoryManager::new(Box::new(store), stream, Box::new(llm.clone()))
        .expect("manager")
        .with_retrieval_limit(config.retrieval_limit)
}
