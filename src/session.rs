//! # Judge Session
//!
//! Runs one generation end to end and keeps the result presenter in sync.
//!
//! ## Pipeline
//!
//! 1. **Preconditions**: file, API key and model are checked before any I/O
//! 2. **Begin**: the presenter shows the original file and issues a ticket
//! 3. **Preprocess**: decode, downscale and JPEG-encode on the blocking pool
//! 4. **Infer**: one provider call, streamed or one-shot
//! 5. **Settle**: the outcome is applied only if its ticket is still current
//!
//! The presenter lock is never held across an `.await`, so concurrent
//! generations interleave freely and the latest one wins the display.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use tracing::{debug, info, warn};

use crate::client::{JudgeRequest, VerdictProvider, check_preconditions};
use crate::config::{JudgeConfig, Settings};
use crate::error::{VerdictError, VerdictResult};
use crate::personas::{default_persona, persona_prompt};
use crate::presenter::{RequestTicket, ResultPresenter, View};
use crate::processing::preprocess_file;
use crate::verdict::{PartialVerdict, Verdict};

/// How the provider's answer is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationMode {
    /// Render partial snapshots as they arrive
    #[default]
    Streaming,
    /// Wait for the whole response
    OneShot,
}

/// Called with the rendered view after every displayed change.
pub type ViewObserver = Arc<dyn Fn(&View) + Send + Sync>;

/// What one generation produced and whether it reached the display.
#[derive(Debug)]
pub struct GenerationOutcome {
    /// `None` when the request was rejected before it started
    pub ticket: Option<RequestTicket>,
    pub result: VerdictResult<Verdict>,
    /// `false` once a newer request superseded this one
    pub displayed: bool,
}

/// Orchestrates preprocessing, inference and presentation.
pub struct JudgeSession {
    provider: Arc<dyn VerdictProvider>,
    settings: Settings,
    config: JudgeConfig,
    presenter: Arc<Mutex<ResultPresenter>>,
    observer: Option<ViewObserver>,
}

impl fmt::Debug for JudgeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JudgeSession")
            .field("provider", &self.provider.name())
            .field("model", &self.settings.model)
            .field("judge", &self.settings.judge)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl JudgeSession {
    /// Create a new session using the builder pattern.
    pub fn builder() -> JudgeSessionBuilder {
        JudgeSessionBuilder::new()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn view(&self) -> View {
        self.lock_presenter().render()
    }

    /// Judge `file`. A `None` file is the "nothing selected" case.
    pub async fn generate(&self, file: Option<PathBuf>) -> GenerationOutcome {
        let source = match check_preconditions(
            file.as_deref(),
            &self.settings.api_key,
            &self.settings.model,
        ) {
            Ok(path) => path.to_path_buf(),
            Err(e) => return self.rejected(e),
        };
        let ticket = self.update(|p| p.begin(source.clone()));
        self.run(ticket, source).await
    }

    /// Run again on the last selected file.
    pub async fn regenerate(&self) -> GenerationOutcome {
        let source = {
            let presenter = self.lock_presenter();
            if !presenter.can_regenerate() {
                drop(presenter);
                return GenerationOutcome {
                    ticket: None,
                    result: Err(VerdictError::state(
                        "not settled",
                        "regenerate",
                        "nothing to regenerate yet",
                    )),
                    displayed: false,
                };
            }
            presenter.source().map(|p| p.to_path_buf())
        };
        if let Err(e) = check_preconditions(
            source.as_deref(),
            &self.settings.api_key,
            &self.settings.model,
        ) {
            return self.rejected(e);
        }
        match self.update(|p| p.regenerate()) {
            Ok((ticket, source)) => self.run(ticket, source).await,
            Err(e) => GenerationOutcome {
                ticket: None,
                result: Err(e),
                displayed: false,
            },
        }
    }

    fn rejected(&self, error: VerdictError) -> GenerationOutcome {
        warn!(reason = %error, "generation rejected");
        self.update(|p| p.reject(&error));
        GenerationOutcome {
            ticket: None,
            result: Err(error),
            displayed: true,
        }
    }

    async fn run(&self, ticket: RequestTicket, source: PathBuf) -> GenerationOutcome {
        let result = self.infer(ticket, source).await;
        let displayed = match &result {
            Ok(verdict) => self.update(|p| p.succeed(ticket, verdict.clone())),
            Err(e) => self.update(|p| p.fail(ticket, e)),
        };
        match &result {
            Ok(verdict) => info!(
                seq = ticket.seq(),
                displayed,
                headline = %verdict.headline(),
                "generation finished"
            ),
            Err(e) => warn!(seq = ticket.seq(), displayed, error = %e, "generation failed"),
        }
        GenerationOutcome {
            ticket: Some(ticket),
            result,
            displayed,
        }
    }

    async fn infer(&self, ticket: RequestTicket, source: PathBuf) -> VerdictResult<Verdict> {
        let image = preprocess_file(&source, &self.config.preprocess).await?;
        debug!(
            seq = ticket.seq(),
            width = image.size.w,
            height = image.size.h,
            resized = image.was_resized(),
            "upload prepared"
        );
        let judge = self.settings.judge.as_str();
        let persona_prompt = persona_prompt(judge)
            .or_else(|| persona_prompt(default_persona()))
            .unwrap_or_default();
        let request = JudgeRequest {
            api_key: self.settings.api_key.clone(),
            model: self.settings.model.clone(),
            persona_prompt,
            image,
        };
        debug!(seq = ticket.seq(), judge, mode = ?self.config.mode, "calling provider");

        match self.config.mode {
            GenerationMode::OneShot => self.provider.judge(&request).await,
            GenerationMode::Streaming => {
                let mut stream = self.provider.judge_stream(&request).await?;
                let mut last = PartialVerdict::default();
                while let Some(item) = stream.next().await {
                    let snapshot = item?;
                    last.merge(&snapshot);
                    // Superseded requests keep reading but stop drawing.
                    self.update(|p| p.apply(ticket, &snapshot));
                }
                last.into_complete()
            }
        }
    }

    /// Mutate the presenter, then notify the observer outside the lock.
    fn update<R>(&self, f: impl FnOnce(&mut ResultPresenter) -> R) -> R {
        let (out, view) = {
            let mut presenter = self.lock_presenter();
            let out = f(&mut presenter);
            (out, self.observer.as_ref().map(|_| presenter.render()))
        };
        if let (Some(observer), Some(view)) = (&self.observer, view) {
            observer(&view);
        }
        out
    }

    fn lock_presenter(&self) -> std::sync::MutexGuard<'_, ResultPresenter> {
        self.presenter
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Builder for [`JudgeSession`].
#[derive(Default)]
pub struct JudgeSessionBuilder {
    provider: Option<Arc<dyn VerdictProvider>>,
    settings: Settings,
    config: JudgeConfig,
    observer: Option<ViewObserver>,
}

impl JudgeSessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: Arc<dyn VerdictProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_config(mut self, config: JudgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_mode(mut self, mode: GenerationMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn with_observer(mut self, observer: impl Fn(&View) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn build(self) -> VerdictResult<JudgeSession> {
        let provider = self.provider.ok_or_else(|| {
            VerdictError::validation("provider", "a provider is required", "none")
        })?;
        self.config
            .validate()
            .map_err(|reason| VerdictError::validation("config", reason, format!("{:?}", self.config)))?;
        Ok(JudgeSession {
            provider,
            settings: self.settings.normalized(),
            config: self.config,
            presenter: Arc::default(),
            observer: self.observer,
        })
    }
}
