//! Tests for retry classification, call timeouts and provider fallback.

use async_trait::async_trait;
use serialist_core::GenerateRequest;
use serialist_error::{ModelError, ModelErrorKind, ModelResult};
use serialist_interface::TextGenerator;
use serialist_retry::{FallbackGenerator, RetryPolicy};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted reply for one call.
#[derive(Clone)]
enum Reply {
    Text(&'static str),
    Fail(ModelErrorKind),
    Hang,
}

struct ScriptedProvider {
    name: &'static str,
    replies: Mutex<VecDeque<Reply>>,
    fallback_reply: Reply,
    calls: Arc<Mutex<usize>>,
}

impl ScriptedProvider {
    fn new(name: &'static str, replies: Vec<Reply>, fallback_reply: Reply) -> Self {
        Self {
            name,
            replies: Mutex::new(replies.into()),
            fallback_reply,
            calls: Arc::new(Mutex::new(0)),
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl TextGenerator for ScriptedProvider {
    async fn generate(&self, _req: &GenerateRequest) -> ModelResult<String> {
        *self.calls.lock().unwrap() += 1;
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback_reply.clone());
        match reply {
            Reply::Text(text) => Ok(text.to_string()),
            Reply::Fail(kind) => Err(ModelError::new(kind)),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok("too late".to_string())
            }
        }
    }

    fn provider_name(&self) -> &str {
        self.name
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

fn server_error() -> Reply {
    Reply::Fail(ModelErrorKind::ServerError("503 unavailable".into()))
}

fn request() -> GenerateRequest {
    GenerateRequest::new("You are a novelist.", "Write the chapter.")
}

#[tokio::test(start_paused = true)]
async fn test_primary_success_uses_one_call() {
    let primary = Arc::new(ScriptedProvider::new("primary", vec![], Reply::Text("chapter")));
    let generator = FallbackGenerator::single(primary.clone(), RetryPolicy::default());

    let text = generator.generate(&request()).await.unwrap();
    assert_eq!(text, "chapter");
    assert_eq!(primary.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried_on_same_provider() {
    let primary = Arc::new(ScriptedProvider::new(
        "primary",
        vec![server_error(), server_error()],
        Reply::Text("recovered"),
    ));
    let generator = FallbackGenerator::single(primary.clone(), RetryPolicy::default());

    let text = generator.generate(&request()).await.unwrap();
    assert_eq!(text, "recovered");
    assert_eq!(primary.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_auth_error_fails_without_retry_or_fallback() {
    let primary = Arc::new(ScriptedProvider::new(
        "primary",
        vec![],
        Reply::Fail(ModelErrorKind::AuthError("bad key".into())),
    ));
    let backup = Arc::new(ScriptedProvider::new("backup", vec![], Reply::Text("unused")));
    let providers: Vec<Arc<dyn TextGenerator>> = vec![primary.clone(), backup.clone()];
    let generator = FallbackGenerator::new(providers, RetryPolicy::default()).unwrap();

    let err = generator.generate(&request()).await.unwrap_err();
    assert_eq!(err.kind.label(), "auth_error");
    assert_eq!(primary.calls(), 1);
    assert_eq!(backup.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_primary_falls_back_with_fresh_budget() {
    let primary = Arc::new(ScriptedProvider::new("primary", vec![], server_error()));
    let backup = Arc::new(ScriptedProvider::new(
        "backup",
        vec![server_error()],
        Reply::Text("from backup"),
    ));
    let policy = RetryPolicy::default().with_max_retries(2_usize);
    let providers: Vec<Arc<dyn TextGenerator>> = vec![primary.clone(), backup.clone()];
    let generator = FallbackGenerator::new(providers, policy).unwrap();

    let text = generator.generate(&request()).await.unwrap();
    assert_eq!(text, "from backup");
    assert_eq!(primary.calls(), 3);
    assert_eq!(backup.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_every_provider_exhausted_returns_last_retryable_error() {
    let primary = Arc::new(ScriptedProvider::new("primary", vec![], server_error()));
    let backup = Arc::new(ScriptedProvider::new(
        "backup",
        vec![],
        Reply::Fail(ModelErrorKind::RateLimit("quota".into())),
    ));
    let policy = RetryPolicy::default().with_max_retries(1_usize);
    let providers: Vec<Arc<dyn TextGenerator>> = vec![primary.clone(), backup.clone()];
    let generator = FallbackGenerator::new(providers, policy).unwrap();

    let err = generator.generate(&request()).await.unwrap_err();
    assert_eq!(err.kind.label(), "rate_limit");
    assert_eq!(primary.calls(), 2);
    assert_eq!(backup.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_hung_call_is_classified_as_timeout_and_retried() {
    let primary = Arc::new(ScriptedProvider::new(
        "primary",
        vec![Reply::Hang],
        Reply::Text("second try"),
    ));
    let policy = RetryPolicy::default().with_timeout_secs(5_u64);
    let generator = FallbackGenerator::single(primary.clone(), policy);

    let text = generator.generate(&request()).await.unwrap();
    assert_eq!(text, "second try");
    assert_eq!(primary.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_hung_calls_surface_timeout_when_budget_runs_out() {
    let primary = Arc::new(ScriptedProvider::new("primary", vec![], Reply::Hang));
    let policy = RetryPolicy::default()
        .with_timeout_secs(1_u64)
        .with_max_retries(1_usize);
    let generator = FallbackGenerator::single(primary.clone(), policy);

    let err = generator.generate(&request()).await.unwrap_err();
    assert!(matches!(err.kind, ModelErrorKind::Timeout(_)));
    assert_eq!(primary.calls(), 2);
}

#[test]
fn test_empty_provider_list_is_rejected() {
    let result = FallbackGenerator::new(vec![], RetryPolicy::default());
    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_retry_budget_comes_from_policy() {
    let primary = Arc::new(ScriptedProvider::new("primary", vec![], Reply::Hang));
    let policy = RetryPolicy::default()
        .with_timeout_secs(1_u64)
        .with_max_retries(0_usize);
    let generator = FallbackGenerator::single(primary.clone(), policy);

    let err = generator.generate(&request()).await.unwrap_err();
    assert!(matches!(err.kind, ModelErrorKind::Timeout(_)));
    assert_eq!(primary.calls(), 1);
}
