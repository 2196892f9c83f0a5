//! Scripted text generator for pipeline tests.

use async_trait::async_trait;
use serialist_core::GenerateRequest;
use serialist_error::{ModelError, ModelErrorKind, ModelResult};
use serialist_interface::TextGenerator;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

const OTHERWISE: &str = "*";

/// A single scripted reply (text or error).
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail(ModelErrorKind),
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn server_error() -> Self {
        Self::Fail(ModelErrorKind::ServerError("503 unavailable".to_string()))
    }

    pub fn invalid_request() -> Self {
        Self::Fail(ModelErrorKind::InvalidRequest("400 bad request".to_string()))
    }
}

/// Generator that answers by system prompt.
///
/// Each system prompt has a queue of replies; the last reply in a queue
/// repeats once the rest are used. Calls with an unscripted system prompt
/// use the [`otherwise`](Self::otherwise) replies, or fail with an
/// invalid-request error.
pub struct ScriptedGenerator {
    name: String,
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Arc<Mutex<Vec<GenerateRequest>>>,
}

impl ScriptedGenerator {
    /// Create a generator with no routes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            routes: Mutex::new(HashMap::new()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Script the replies for one system prompt.
    pub fn route(self, system: &str, replies: Vec<Reply>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(system.to_string(), replies.into());
        self
    }

    /// Script the replies for every other system prompt.
    pub fn otherwise(self, replies: Vec<Reply>) -> Self {
        self.route(OTHERWISE, replies)
    }

    /// Total number of generate() calls.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Calls made with a given system prompt.
    pub fn calls_for(&self, system: &str) -> usize {
        self.requests_for(system).len()
    }

    /// Requests made with a given system prompt, in order.
    pub fn requests_for(&self, system: &str) -> Vec<GenerateRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.system == system)
            .cloned()
            .collect()
    }

    fn next_reply(&self, system: &str) -> Reply {
        let mut routes = self.routes.lock().unwrap();
        let key = if routes.contains_key(system) { system } else { OTHERWISE };
        match routes.get_mut(key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => Reply::Fail(ModelErrorKind::InvalidRequest(format!(
                "No script for system prompt: {}",
                system.chars().take(40).collect::<String>()
            ))),
        }
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, req: &GenerateRequest) -> ModelResult<String> {
        self.requests.lock().unwrap().push(req.clone());
        match self.next_reply(&req.system) {
            Reply::Text(text) => Ok(text),
            Reply::Fail(kind) => Err(ModelError::new(kind)),
        }
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}
