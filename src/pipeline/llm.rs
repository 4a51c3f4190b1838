//! Model interaction: fill a task's prompts, call the provider, validate.
//!
//! All prompt wording lives in [`crate::prompts`] and every task's shape in
//! [`crate::pipeline::task`]; this module owns the conversation mechanics.
//!
//! ## Repair loop
//!
//! A schema-typed answer that fails to parse is not retried blindly: the
//! broken answer stays in the conversation, the validation error is sent
//! back as a follow-up message and the temperature is raised so the model
//! produces a different completion. After `max_retries` follow-ups the call
//! reports [`CallOutcome::ValidationFailed`].
//!
//! Transport and authentication errors are never retried here; they travel
//! as `Err(TranslateError)` and end the run.
//!
//! ## Caching
//!
//! Every call goes through [`CacheStore::get_or_compute`] keyed by task
//! identity, model and the filled prompts. Only validated answers are
//! stored; halted or invalid calls hit the provider again on the next run.

use crate::cache::CacheStore;
use crate::config::ModelTier;
use crate::error::TranslateError;
use crate::pipeline::task::{ModelOutput, OutputShape, Task};
use crate::prompts::{self, fill_template, PromptInputs};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use futures::future::BoxFuture;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Whether the answer is free text or a JSON document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    Text,
    Structured,
}

/// One request of a conversation: the full message history so far.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Task identity, for logging and test doubles.
    pub task: &'static str,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: usize,
    pub mode: ResponseMode,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    /// Output token limit reached.
    Length,
    /// Safety or content filter; carries the provider's description.
    Safety(String),
}

impl FinishReason {
    /// Map a provider `finish_reason` string.
    pub fn from_provider(reason: Option<&str>) -> Self {
        match reason.map(str::to_ascii_lowercase).as_deref() {
            Some("length") | Some("max_tokens") => FinishReason::Length,
            Some(r @ ("content_filter" | "safety" | "recitation" | "blocklist"
            | "prohibited_content")) => FinishReason::Safety(r.to_string()),
            _ => FinishReason::Stop,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub content: String,
    pub finish: FinishReason,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

impl ChatReply {
    /// A completed answer without usage figures.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finish: FinishReason::Stop,
            prompt_tokens: 0,
            completion_tokens: 0,
        }
    }

    /// An answer cut short by the provider.
    pub fn halted(partial: impl Into<String>, finish: FinishReason) -> Self {
        Self {
            finish,
            ..Self::text(partial)
        }
    }

    fn halt_detail(&self) -> Option<String> {
        match &self.finish {
            FinishReason::Stop => None,
            FinishReason::Length => {
                Some("generation stopped at the output token limit (finish_reason=length)".into())
            }
            FinishReason::Safety(r) => Some(format!(
                "generation blocked by the provider (finish_reason={r})"
            )),
        }
    }
}

// ── Client seam ──────────────────────────────────────────────────────────

/// Handle to a remote chat model.
///
/// Constructed once per run and passed to every component; tests substitute
/// a scripted implementation.
pub trait ChatClient: Send + Sync {
    /// Model identifier; part of every cache key.
    fn model(&self) -> &str;

    fn chat<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> BoxFuture<'a, Result<ChatReply, TranslateError>>;
}

/// [`ChatClient`] over an `edgequake-llm` provider.
pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
    model: String,
}

impl ProviderClient {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

impl ChatClient for ProviderClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn chat<'a>(
        &'a self,
        request: &'a ChatRequest,
    ) -> BoxFuture<'a, Result<ChatReply, TranslateError>> {
        Box::pin(async move {
            let messages: Vec<ChatMessage> = request
                .messages
                .iter()
                .map(|m| match m.role {
                    Role::System => ChatMessage::system(m.content.clone()),
                    Role::User => ChatMessage::user(m.content.clone()),
                    Role::Assistant => ChatMessage::assistant(m.content.clone()),
                })
                .collect();
            let options = completion_options(request);

            match self.provider.chat(&messages, Some(&options)).await {
                Ok(response) => Ok(ChatReply {
                    finish: FinishReason::from_provider(response.finish_reason.as_deref()),
                    content: response.content,
                    prompt_tokens: response.prompt_tokens,
                    completion_tokens: response.completion_tokens,
                }),
                // edgequake-llm surfaces finish_reason="content_filter" as an
                // API error; it is a halted generation, not a transport failure.
                Err(e) if e.to_string().contains("content_filter") => Ok(ChatReply::halted(
                    String::new(),
                    FinishReason::Safety(e.to_string()),
                )),
                Err(e) => Err(TranslateError::LlmApiError {
                    message: e.to_string(),
                }),
            }
        })
    }
}

/// Sampling options for one request. Structured requests ask the provider
/// for a JSON object.
fn completion_options(request: &ChatRequest) -> CompletionOptions {
    let mut options = CompletionOptions {
        temperature: Some(request.temperature),
        max_tokens: Some(request.max_tokens),
        ..Default::default()
    };
    if request.mode == ResponseMode::Structured {
        options.response_format = Some("json_object".to_string());
    }
    options
}

/// One client handle per model tier.
#[derive(Clone)]
pub struct Clients {
    standard: Arc<dyn ChatClient>,
    outline: Arc<dyn ChatClient>,
}

impl Clients {
    pub fn new(standard: Arc<dyn ChatClient>, outline: Arc<dyn ChatClient>) -> Self {
        Self { standard, outline }
    }

    /// One handle serving every tier.
    pub fn single(client: Arc<dyn ChatClient>) -> Self {
        Self {
            outline: Arc::clone(&client),
            standard: client,
        }
    }

    pub fn for_tier(&self, tier: ModelTier) -> &Arc<dyn ChatClient> {
        match tier {
            ModelTier::Standard => &self.standard,
            ModelTier::Outline => &self.outline,
        }
    }
}

// ── Outcomes ─────────────────────────────────────────────────────────────

/// Result of a model call that reached the provider.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    Ok(T),
    /// The structured answer was still invalid after every repair attempt.
    ValidationFailed { detail: String, attempts: u32 },
    /// The provider stopped generation early.
    GenerationHalted { partial: String, detail: String },
}

impl<T> CallOutcome<T> {
    /// Treat anything but `Ok` as fatal.
    pub fn into_result(self, task: &str) -> Result<T, TranslateError> {
        match self {
            CallOutcome::Ok(v) => Ok(v),
            CallOutcome::ValidationFailed { detail, attempts } => {
                Err(TranslateError::SchemaValidation {
                    task: task.to_string(),
                    attempts,
                    detail,
                })
            }
            CallOutcome::GenerationHalted { detail, .. } => Err(TranslateError::GenerationHalted {
                task: task.to_string(),
                detail,
            }),
        }
    }

    /// Split off halted generations as `Ok(Err(detail))`; validation
    /// failure stays fatal.
    pub fn into_halt_aware(self, task: &str) -> Result<Result<T, String>, TranslateError> {
        match self {
            CallOutcome::GenerationHalted { detail, .. } => Ok(Err(detail)),
            other => other.into_result(task).map(Ok),
        }
    }
}

/// Non-`Ok` ends of a conversation; kept out of the cache.
enum CallFailure {
    Validation { detail: String, attempts: u32 },
    Halted { partial: String, detail: String },
    Fatal(TranslateError),
}

impl From<TranslateError> for CallFailure {
    fn from(e: TranslateError) -> Self {
        CallFailure::Fatal(e)
    }
}

/// Sampling and retry settings shared by every call of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallSettings {
    pub temperature: f32,
    pub repair_temperature: f32,
    pub max_tokens: usize,
    pub max_retries: u32,
}

impl Default for CallSettings {
    fn default() -> Self {
        Self {
            temperature: 0.5,
            repair_temperature: 1.0,
            max_tokens: 8192,
            max_retries: 3,
        }
    }
}

/// Counters accumulated over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CallUsage {
    /// Requests that reached the provider.
    pub requests: usize,
    pub repair_attempts: usize,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

#[derive(Serialize)]
struct CallFingerprint<'a> {
    model: &'a str,
    system: &'a str,
    message: &'a str,
}

// ── ModelCaller ──────────────────────────────────────────────────────────

/// Runs [`Task`]s against the configured clients.
pub struct ModelCaller {
    clients: Clients,
    cache: CacheStore,
    settings: CallSettings,
    requests: AtomicUsize,
    repairs: AtomicUsize,
    prompt_tokens: AtomicUsize,
    completion_tokens: AtomicUsize,
}

impl ModelCaller {
    pub fn new(clients: Clients, cache: CacheStore, settings: CallSettings) -> Self {
        Self {
            clients,
            cache,
            settings,
            requests: AtomicUsize::new(0),
            repairs: AtomicUsize::new(0),
            prompt_tokens: AtomicUsize::new(0),
            completion_tokens: AtomicUsize::new(0),
        }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn usage(&self) -> CallUsage {
        CallUsage {
            requests: self.requests.load(Ordering::Relaxed),
            repair_attempts: self.repairs.load(Ordering::Relaxed),
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
        }
    }

    /// Run task `T` with the given placeholder values.
    ///
    /// Schema-typed tasks additionally receive their JSON Schema as
    /// `${json_schema}`.
    pub async fn invoke<T: Task>(
        &self,
        inputs: &PromptInputs,
    ) -> Result<CallOutcome<T::Output>, TranslateError> {
        let client = self.clients.for_tier(T::TIER);
        let shape = <T::Output as ModelOutput>::shape();

        let mut inputs = inputs.clone();
        if let OutputShape::Json(schema) = &shape {
            inputs.insert("json_schema".to_string(), schema.to_string());
        }
        let system = fill_template(T::SYSTEM_TEMPLATE, &inputs)?;
        let message = fill_template(T::MESSAGE_TEMPLATE, &inputs)?;

        let fingerprint = CallFingerprint {
            model: client.model(),
            system: &system,
            message: &message,
        };
        let result = self
            .cache
            .get_or_compute(T::NAME, &fingerprint, || {
                self.converse::<T>(client.as_ref(), &system, &message, &shape)
            })
            .await;

        match result {
            Ok(value) => Ok(CallOutcome::Ok(value)),
            Err(CallFailure::Validation { detail, attempts }) => {
                Ok(CallOutcome::ValidationFailed { detail, attempts })
            }
            Err(CallFailure::Halted { partial, detail }) => {
                Ok(CallOutcome::GenerationHalted { partial, detail })
            }
            Err(CallFailure::Fatal(e)) => Err(e),
        }
    }

    /// Initial request plus up to `max_retries` repair follow-ups.
    async fn converse<T: Task>(
        &self,
        client: &dyn ChatClient,
        system: &str,
        message: &str,
        shape: &OutputShape,
    ) -> Result<T::Output, CallFailure> {
        let max_retries = T::MAX_RETRIES.unwrap_or(self.settings.max_retries);
        let mut request = ChatRequest {
            task: T::NAME,
            messages: vec![Message::system(system), Message::user(message)],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            mode: if shape.is_structured() {
                ResponseMode::Structured
            } else {
                ResponseMode::Text
            },
        };

        let mut reply = self.send(client, &request).await?;
        let mut attempts = 0u32;
        loop {
            if let Some(detail) = reply.halt_detail() {
                warn!("{}: {}", T::NAME, detail);
                return Err(CallFailure::Halted {
                    partial: reply.content,
                    detail,
                });
            }

            let error = match <T::Output as ModelOutput>::parse(&reply.content) {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };
            if attempts >= max_retries {
                warn!("{}: giving up after {} repair attempts: {}", T::NAME, attempts, error);
                return Err(CallFailure::Validation {
                    detail: error,
                    attempts,
                });
            }

            attempts += 1;
            self.repairs.fetch_add(1, Ordering::Relaxed);
            warn!(
                "{}: invalid structured answer, repair {}/{}: {}",
                T::NAME, attempts, max_retries, error
            );
            let follow_up = fill_template(
                prompts::REPAIR_MESSAGE,
                &prompts::inputs([("error", error.as_str())]),
            )?;
            request.temperature = self.settings.repair_temperature;
            request.messages.push(Message::assistant(reply.content));
            request.messages.push(Message::user(follow_up));
            reply = self.send(client, &request).await?;
        }
    }

    async fn send(
        &self,
        client: &dyn ChatClient,
        request: &ChatRequest,
    ) -> Result<ChatReply, TranslateError> {
        let start = Instant::now();
        self.requests.fetch_add(1, Ordering::Relaxed);
        let reply = client.chat(request).await?;
        self.prompt_tokens.fetch_add(reply.prompt_tokens, Ordering::Relaxed);
        self.completion_tokens.fetch_add(reply.completion_tokens, Ordering::Relaxed);
        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            request.task,
            reply.prompt_tokens,
            reply.completion_tokens,
            start.elapsed()
        );
        Ok(reply)
    }
}
