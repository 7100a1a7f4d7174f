//! Résumé workflow — runs one end-to-end generation attempt.
//!
//! Flow: load settings → load profile → load template → validate →
//!       (analyze JD) → generate under a deadline → extract → return.
//!
//! Every store read is time-boxed and degrades to "not found". Every LLM attempt
//! runs under its own cancellation token fired by a timer. Failed attempts are
//! retried with exponential backoff unless the failure can never succeed
//! (bad credentials, rejected request).
//!
//! The orchestrator only reads the stores. Overlapping runs are prevented at the
//! entry point (see `single_flight`), not here.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::generation::extractor::{extract, extract_with, ANALYSIS_TAGS};
use crate::generation::prompts::{
    build_analysis_prompt, build_generation_prompt, build_trimmed_analysis_prompt,
    build_trimmed_generation_prompt, PromptInputs, TrimLimits, ANALYSIS_SYSTEM,
    GENERATION_SYSTEM,
};
use crate::llm_client::{ChatMessage, ChatModel, ChatRequest, ClientCache, LlmError};
use crate::models::{ProviderSettings, UserProfile};
use crate::store::{self, KeyValueStore, StoreError};

// ────────────────────────────────────────────────────────────────────────────
// Options
// ────────────────────────────────────────────────────────────────────────────

/// How the prompt(s) for a run are built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PromptStrategy {
    /// One generation call; the model analyzes the job implicitly.
    #[default]
    Combined,
    /// An analysis call first, whose answer is fed into the generation call.
    SeparateAnalysis,
}

impl FromStr for PromptStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "combined" => Ok(PromptStrategy::Combined),
            "separate_analysis" | "separate-analysis" => Ok(PromptStrategy::SeparateAnalysis),
            other => Err(format!(
                "unknown prompt strategy '{other}' (expected 'combined' or 'separate_analysis')"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    /// Budget for each individual store read.
    pub store_timeout: Duration,
    /// Budget for each individual LLM attempt.
    pub llm_timeout: Duration,
    /// Retries after the first attempt. The budget is per stage: generation makes
    /// at most `max_retries + 1` calls, and a separate analysis stage gets its own.
    pub max_retries: u32,
    /// Delay before the second attempt; doubles for each further attempt.
    pub backoff_base: Duration,
    /// Serialized request bodies above this size are sent with a trimmed prompt.
    pub max_request_bytes: usize,
    pub trim: TrimLimits,
    pub temperature: f32,
    pub max_tokens: u32,
    pub strategy: PromptStrategy,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
            llm_timeout: Duration::from_secs(60),
            max_retries: 2,
            backoff_base: Duration::from_millis(1000),
            max_request_bytes: 100_000,
            trim: TrimLimits {
                job_chars: 1000,
                experience_entries: 2,
            },
            temperature: 0.3,
            max_tokens: 4096,
            strategy: PromptStrategy::Combined,
        }
    }
}

/// Delay before the attempt that follows `failed_attempts` failures: `base * 2^(failed_attempts - 1)`.
pub fn backoff_delay(base: Duration, failed_attempts: u32) -> Duration {
    let exponent = failed_attempts.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << exponent)
}

// ────────────────────────────────────────────────────────────────────────────
// Errors and results
// ────────────────────────────────────────────────────────────────────────────

/// Inputs that must exist before any LLM call, in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    Profile,
    Template,
    ApiKey,
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Precondition::Profile => {
                "User profile not found. Please fill in your profile before generating a resume."
            }
            Precondition::Template => {
                "Resume template not found. Please add a LaTeX resume template before generating."
            }
            Precondition::ApiKey => {
                "API key is missing or empty. Please add your API key in the provider settings."
            }
        };
        f.write_str(message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Analysis,
    Generation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Analysis => f.write_str("Job analysis"),
            Stage::Generation => f.write_str("Resume generation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkflowError {
    #[error("Job description is empty. Select the job posting text and try again.")]
    EmptyJobDescription,

    #[error("{0}")]
    PreconditionMissing(Precondition),

    #[error("{stage} failed after {attempts} attempt(s): {source}")]
    Llm {
        stage: Stage,
        attempts: u32,
        #[source]
        source: LlmError,
    },

    #[error("{stage} failed after {attempts} attempt(s): the model response did not contain the expected output")]
    ExtractionFailed { stage: Stage, attempts: u32 },
}

/// The tailored résumé produced by a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedDocument {
    pub text: String,
    /// Generation calls made, including the successful one.
    pub attempts: u32,
    /// Whether the oversized-request policy replaced the full prompt.
    pub trimmed_prompt: bool,
}

/// All inputs of one run, loaded and validated.
#[derive(Debug, Clone)]
pub struct WorkflowRequest {
    pub job_description: String,
    pub profile: UserProfile,
    pub template: String,
    pub settings: ProviderSettings,
}

/// Checks preconditions in fixed order: profile, template, API key.
pub fn validate_inputs(
    job_description: &str,
    settings: ProviderSettings,
    profile: Option<UserProfile>,
    template: Option<String>,
) -> Result<WorkflowRequest, WorkflowError> {
    let profile = profile.ok_or(WorkflowError::PreconditionMissing(Precondition::Profile))?;
    let template = template.ok_or(WorkflowError::PreconditionMissing(Precondition::Template))?;
    if !settings.has_api_key() {
        return Err(WorkflowError::PreconditionMissing(Precondition::ApiKey));
    }

    Ok(WorkflowRequest {
        job_description: job_description.to_string(),
        profile,
        template,
        settings,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Callbacks
// ────────────────────────────────────────────────────────────────────────────

/// Observer of a run. Every hook is optional.
pub trait WorkflowCallbacks: Send + Sync {
    fn on_progress(&self, _phase: &str, _percent: u8) {}
    fn on_analysis_start(&self) {}
    fn on_analysis_complete(&self, _analysis: &str) {}
    fn on_generation_start(&self) {}
    fn on_generation_complete(&self, _document: &GeneratedDocument) {}
    fn on_error(&self, _error: &WorkflowError) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub phase: String,
    pub percent: u8,
}

/// Collects the progress a run reports, in order.
#[derive(Debug, Default)]
pub struct ProgressLog {
    events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl WorkflowCallbacks for ProgressLog {
    fn on_progress(&self, phase: &str, percent: u8) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ProgressEvent {
                phase: phase.to_string(),
                percent,
            });
    }
}

/// Forwards progress while keeping reported percentages non-decreasing.
struct ProgressReporter<'a> {
    callbacks: &'a dyn WorkflowCallbacks,
    last: AtomicU8,
}

impl<'a> ProgressReporter<'a> {
    fn new(callbacks: &'a dyn WorkflowCallbacks) -> Self {
        Self {
            callbacks,
            last: AtomicU8::new(0),
        }
    }

    fn report(&self, phase: &str, percent: u8) {
        let percent = percent.min(100);
        let previous = self.last.fetch_max(percent, Ordering::AcqRel);
        let percent = percent.max(previous);
        debug!("Workflow progress: {phase} ({percent}%)");
        self.callbacks.on_progress(phase, percent);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ────────────────────────────────────────────────────────────────────────────

pub struct ResumeWorkflow {
    store: Arc<dyn KeyValueStore>,
    clients: Arc<ClientCache>,
    options: WorkflowOptions,
}

impl ResumeWorkflow {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clients: Arc<ClientCache>,
        options: WorkflowOptions,
    ) -> Self {
        Self {
            store,
            clients,
            options,
        }
    }

    /// Runs the workflow. Any failure is reported once through `on_error` and
    /// yields `None`.
    pub async fn run(
        &self,
        job_description: &str,
        callbacks: &dyn WorkflowCallbacks,
    ) -> Option<GeneratedDocument> {
        match self.run_detailed(job_description, callbacks).await {
            Ok(document) => Some(document),
            Err(e) => {
                warn!("Resume workflow failed: {e}");
                callbacks.on_error(&e);
                None
            }
        }
    }

    /// Same as [`run`](Self::run) but returns the error instead of reporting it.
    pub async fn run_detailed(
        &self,
        job_description: &str,
        callbacks: &dyn WorkflowCallbacks,
    ) -> Result<GeneratedDocument, WorkflowError> {
        if job_description.trim().is_empty() {
            return Err(WorkflowError::EmptyJobDescription);
        }

        let progress = ProgressReporter::new(callbacks);
        let store = self.store.as_ref();

        progress.report("Loading provider settings", 5);
        let settings = self
            .load_resource("provider settings", store::load_settings(store))
            .await
            .unwrap_or_default()
            .normalized();

        progress.report("Loading profile", 10);
        let profile = self
            .load_resource("profile", store::load_profile(store))
            .await;

        progress.report("Loading template", 15);
        let template = self
            .load_resource("template", store::load_template(store))
            .await;

        let request = validate_inputs(job_description, settings, profile, template)?;
        progress.report("Preparing prompt", 20);
        info!(
            "Starting resume workflow (model: {}, strategy: {:?}, job: {} chars)",
            request.settings.model,
            self.options.strategy,
            request.job_description.chars().count()
        );

        let client = self
            .clients
            .client_for(&request.settings)
            .map_err(|source| WorkflowError::Llm {
                stage: Stage::Generation,
                attempts: 0,
                source,
            })?;

        let (analysis, analysis_trimmed) = match self.options.strategy {
            PromptStrategy::Combined => (None, false),
            PromptStrategy::SeparateAnalysis => {
                callbacks.on_analysis_start();
                progress.report("Analyzing job description", 30);
                let (analysis, trimmed) = self.analyze(client.as_ref(), &request).await?;
                callbacks.on_analysis_complete(&analysis);
                (Some(analysis), trimmed)
            }
        };

        callbacks.on_generation_start();
        progress.report("Generating resume", 40);

        let inputs = PromptInputs {
            job_description: &request.job_description,
            profile: &request.profile,
            template: &request.template,
            analysis: analysis.as_deref(),
        };
        let (chat, trimmed_prompt) = self.sized_request(
            Stage::Generation,
            &request.settings,
            GENERATION_SYSTEM,
            build_generation_prompt(&inputs),
            || build_trimmed_generation_prompt(&inputs, self.options.trim),
        );

        let (text, attempts) = self
            .call_with_retry(client.as_ref(), &chat, Stage::Generation, |raw| {
                let extraction = extract(raw);
                debug!("Generation response matched {:?}", extraction.kind());
                extraction.into_document()
            })
            .await?;
        progress.report("Extracting document", 90);

        let document = GeneratedDocument {
            text,
            attempts,
            trimmed_prompt: trimmed_prompt || analysis_trimmed,
        };
        callbacks.on_generation_complete(&document);
        progress.report("Complete", 100);

        info!(
            "Resume generated: {} chars after {} attempt(s)",
            document.text.len(),
            document.attempts
        );
        Ok(document)
    }

    /// Returns the analysis text and whether its request had to be trimmed.
    async fn analyze(
        &self,
        client: &dyn ChatModel,
        request: &WorkflowRequest,
    ) -> Result<(String, bool), WorkflowError> {
        let (chat, trimmed) = self.sized_request(
            Stage::Analysis,
            &request.settings,
            ANALYSIS_SYSTEM,
            build_analysis_prompt(&request.job_description),
            || build_trimmed_analysis_prompt(&request.job_description, self.options.trim),
        );

        // A tag-less analysis is still usable; only an empty one is not.
        let (analysis, _) = self
            .call_with_retry(client, &chat, Stage::Analysis, |raw| {
                let extraction = extract_with(raw, ANALYSIS_TAGS);
                let text = extraction.text();
                (!text.is_empty()).then(|| text.to_string())
            })
            .await?;
        Ok((analysis, trimmed))
    }

    /// Reads one resource under the store timeout. Errors and timeouts count as "not found".
    async fn load_resource<T>(
        &self,
        what: &str,
        load: impl Future<Output = Result<Option<T>, StoreError>>,
    ) -> Option<T> {
        match timeout(self.options.store_timeout, load).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                warn!("Failed to load {what}, treating it as missing: {e}");
                None
            }
            Err(_) => {
                warn!(
                    "Loading {what} timed out after {}ms, treating it as missing",
                    self.options.store_timeout.as_millis()
                );
                None
            }
        }
    }

    fn chat_request(&self, settings: &ProviderSettings, system: &str, prompt: String) -> ChatRequest {
        ChatRequest {
            model: settings.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(prompt)],
            temperature: self.options.temperature,
            max_tokens: Some(self.options.max_tokens),
        }
    }

    /// Builds the request, swapping in the trimmed prompt when the body is oversized.
    fn sized_request(
        &self,
        stage: Stage,
        settings: &ProviderSettings,
        system: &str,
        prompt: String,
        trimmed_prompt: impl FnOnce() -> String,
    ) -> (ChatRequest, bool) {
        let request = self.chat_request(settings, system, prompt);
        let size = request.body_size();
        if size <= self.options.max_request_bytes {
            debug!("{stage} request body: {size} bytes");
            return (request, false);
        }

        let trimmed = self.chat_request(settings, system, trimmed_prompt());
        let trimmed_size = trimmed.body_size();
        warn!(
            "{stage} request body is {size} bytes (limit {}); sending trimmed prompt of {trimmed_size} bytes",
            self.options.max_request_bytes
        );
        if trimmed_size > self.options.max_request_bytes {
            warn!("{stage} request is still over the limit after trimming; sending it anyway");
        }
        (trimmed, true)
    }

    /// One LLM call under a timer-fired cancellation token.
    async fn attempt(&self, client: &dyn ChatModel, request: &ChatRequest) -> Result<String, LlmError> {
        let cancel = CancellationToken::new();
        let timer = {
            let cancel = cancel.clone();
            let deadline = self.options.llm_timeout;
            tokio::spawn(async move {
                sleep(deadline).await;
                cancel.cancel();
            })
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LlmError::Timeout),
            result = client.complete(request, cancel.clone()) => result,
        };
        timer.abort();
        result
    }

    /// Calls the model until `accept` yields output, retrying with backoff.
    /// Returns the accepted output and the number of attempts used.
    async fn call_with_retry<F>(
        &self,
        client: &dyn ChatModel,
        request: &ChatRequest,
        stage: Stage,
        accept: F,
    ) -> Result<(String, u32), WorkflowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_attempts = self.options.max_retries.saturating_add(1);
        let mut last_failure = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = backoff_delay(self.options.backoff_base, attempt - 1);
                warn!(
                    "{stage} attempt {}/{} failed, retrying after {}ms...",
                    attempt - 1,
                    max_attempts,
                    delay.as_millis()
                );
                sleep(delay).await;
            }

            match self.attempt(client, request).await {
                Ok(raw) => match accept(&raw) {
                    Some(output) => return Ok((output, attempt)),
                    None => {
                        warn!(
                            "{stage} attempt {attempt}: response ({} chars) had no usable output",
                            raw.len()
                        );
                        last_failure = Some(WorkflowError::ExtractionFailed {
                            stage,
                            attempts: attempt,
                        });
                    }
                },
                Err(source) if !source.is_retryable() => {
                    warn!("{stage} attempt {attempt} failed permanently: {source}");
                    return Err(WorkflowError::Llm {
                        stage,
                        attempts: attempt,
                        source,
                    });
                }
                Err(source) => {
                    warn!("{stage} attempt {attempt} failed: {source}");
                    last_failure = Some(WorkflowError::Llm {
                        stage,
                        attempts: attempt,
                        source,
                    });
                }
            }
        }

        Err(last_failure.unwrap_or(WorkflowError::ExtractionFailed {
            stage,
            attempts: max_attempts,
        }))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
