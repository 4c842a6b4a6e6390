//! AI responder: the backend that answers messages addressed to `ai`.
//!
//! The room dispatch task only sees [`AiResponder`]. Two implementations:
//! - [`OllamaResponder`]: HTTP client for an Ollama-style `/api/generate` endpoint.
//! - [`ScriptedResponder`]: pre-programmed replies for deterministic tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::instrument;

use crate::config::AiConfig;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AI backend returned status {0}")]
    Status(u16),

    #[error("{0}")]
    Script(String),
}

#[async_trait]
pub trait AiResponder: Send + Sync {
    /// Generate a reply to `prompt`. Callers bound the wait themselves.
    async fn generate(&self, prompt: &str, system_prompt: &str) -> Result<String, AiError>;
}

pub struct OllamaResponder {
    client: Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaResponder {
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/generate", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AiResponder for OllamaResponder {
    #[instrument(skip_all, fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str, system_prompt: &str) -> Result<String, AiError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            system: system_prompt,
            stream: false,
        };

        let resp = self.client.post(&self.endpoint).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AiError::Status(status.as_u16()));
        }

        let parsed: GenerateResponse = resp.json().await?;
        tracing::debug!(reply_len = parsed.response.len(), "AI reply received");
        Ok(parsed.response)
    }
}

/// One pre-programmed outcome of a [`ScriptedResponder`] call.
#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(String),
    Fail(String),
    /// Wait, then resolve to the inner outcome.
    Delay(Duration, Box<Scripted>),
}

impl Scripted {
    pub fn reply(text: &str) -> Self {
        Self::Reply(text.to_string())
    }

    pub fn delayed(delay: Duration, inner: Scripted) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Responder that plays back [`Scripted`] outcomes in order.
///
/// Calls past the end of the script fail.
pub struct ScriptedResponder {
    script: Mutex<VecDeque<Scripted>>,
    prompts: Mutex<Vec<(String, String)>>,
    calls: AtomicUsize,
}

impl ScriptedResponder {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `(prompt, system_prompt)` of every call so far.
    pub async fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().await.clone()
    }
}

#[async_trait]
impl AiResponder for ScriptedResponder {
    async fn generate(&self, prompt: &str, system_prompt: &str) -> Result<String, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .await
            .push((prompt.to_string(), system_prompt.to_string()));

        let mut step = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Scripted::Fail("script exhausted".to_string()));

        loop {
            match step {
                Scripted::Reply(text) => return Ok(text),
                Scripted::Fail(reason) => return Err(AiError::Script(reason)),
                Scripted::Delay(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    step = *inner;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    /// Serve `router` on a free local port and return its base URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        format!("http://{addr}")
    }

    fn config(base_url: String) -> AiConfig {
        AiConfig {
            base_url,
            model: "test-model".to_string(),
            ..AiConfig::default()
        }
    }

    #[tokio::test]
    async fn ollama_posts_prompt_and_reads_response() {
        let router = Router::new().route(
            "/api/generate",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["model"], "test-model");
                assert_eq!(body["system"], "be brief");
                assert_eq!(body["stream"], false);
                Json(json!({"response": format!("echo {}", body["prompt"].as_str().unwrap())}))
            }),
        );
        let base = serve(router).await;

        let responder = OllamaResponder::new(&config(format!("{base}/"))).unwrap();
        assert_eq!(responder.endpoint(), format!("{base}/api/generate"));

        let reply = responder.generate("hello", "be brief").await.unwrap();
        assert_eq!(reply, "echo hello");
    }

    #[tokio::test]
    async fn ollama_error_status_is_reported() {
        let router = Router::new().route(
            "/api/generate",
            post(|| async { (axum::http::StatusCode::BAD_GATEWAY, "down") }),
        );
        let base = serve(router).await;

        let responder = OllamaResponder::new(&config(base)).unwrap();
        let err = responder.generate("hello", "sys").await.unwrap_err();
        assert!(matches!(err, AiError::Status(502)));
    }

    #[tokio::test]
    async fn ollama_unexpected_body_is_an_error() {
        let router = Router::new().route("/api/generate", post(|| async { Json(json!({"text": 1})) }));
        let base = serve(router).await;

        let responder = OllamaResponder::new(&config(base)).unwrap();
        assert!(matches!(
            responder.generate("hello", "sys").await,
            Err(AiError::Http(_))
        ));
    }

    #[tokio::test]
    async fn scripted_plays_back_in_order() {
        let responder = ScriptedResponder::new(vec![
            Scripted::reply("one"),
            Scripted::Fail("boom".to_string()),
            Scripted::delayed(Duration::from_millis(5), Scripted::reply("late")),
        ]);

        assert_eq!(responder.generate("a", "s").await.unwrap(), "one");
        assert!(matches!(responder.generate("b", "s").await, Err(AiError::Script(r)) if r == "boom"));
        assert_eq!(responder.generate("c", "s").await.unwrap(), "late");
        assert!(responder.generate("d", "s").await.is_err());

        assert_eq!(responder.call_count(), 4);
        let prompts = responder.prompts().await;
        assert_eq!(prompts[0], ("a".to_string(), "s".to_string()));
        assert_eq!(prompts.len(), 4);
    }
}
