//! One attempt: discover a link, then register for a slot.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use slotclaim_browser::BrowserDriver;
use slotclaim_core::{Config, ConfigStore, Identity, StopSignal};
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use crate::discovery::LinkFinder;
use crate::registration::SlotRegistrar;
use crate::target::is_target_url;

/// What a single job attempt ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// The stop signal was already raised; nothing ran.
    Skipped,
    NoLinkFound,
    Registered,
    Failed,
}

/// Per-attempt inputs.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub identity: Identity,
    /// Source page to scan, or a sign-up URL to use directly.
    pub url_override: Option<String>,
    pub skip_check: bool,
    /// Wins over the persisted `settings.headless` when set.
    pub headless_override: Option<bool>,
}

impl JobRequest {
    /// Request used by the windowed checker. Display mode is left to the
    /// persisted setting, which each attempt re-reads.
    pub fn scheduled(identity: Identity, config: &Config) -> Self {
        Self {
            identity,
            url_override: None,
            skip_check: config.settings.skip_check,
            headless_override: None,
        }
    }
}

/// Anything the windowed checker can run once per interval.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run_once(&self) -> JobOutcome;
}

#[derive(Clone)]
pub struct Job {
    driver: Arc<dyn BrowserDriver>,
    store: Arc<dyn ConfigStore>,
    stop: StopSignal,
}

impl Job {
    pub fn new(driver: Arc<dyn BrowserDriver>, store: Arc<dyn ConfigStore>, stop: StopSignal) -> Self {
        Self { driver, store, stop }
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// Run one attempt. Never panics and never returns an error: failures are
    /// logged and reported as [`JobOutcome::Failed`].
    pub async fn run(&self, request: &JobRequest) -> JobOutcome {
        let span = info_span!("job", attempt = %Uuid::new_v4());
        let outcome = AssertUnwindSafe(self.attempt(request).instrument(span))
            .catch_unwind()
            .await;
        match outcome {
            Ok(outcome) => outcome,
            Err(_) => {
                error!("job panicked, treating the attempt as failed");
                JobOutcome::Failed
            }
        }
    }

    async fn attempt(&self, request: &JobRequest) -> JobOutcome {
        if self.stop.is_set() {
            debug!("stop signal set, skipping job");
            return JobOutcome::Skipped;
        }

        info!("starting job execution");
        // re-read every attempt so edits made while running take effect
        let config = self.store.load();

        if let Err(e) = request.identity.validate() {
            error!("cannot run job: {e}");
            return JobOutcome::Failed;
        }

        let headless = request
            .headless_override
            .unwrap_or(config.settings.headless);
        let domain = config.urls.target_domain.as_str();

        let link = match request.url_override.as_deref() {
            Some(url) if is_target_url(url, domain) => {
                info!(%url, "using provided signup URL directly");
                Some(url.to_string())
            }
            other => {
                let source = other.unwrap_or(config.urls.default.as_str());
                LinkFinder::new(Arc::clone(&self.driver), domain)
                    .discover(source, headless, request.skip_check)
                    .await
            }
        };

        let Some(link) = link else {
            info!("no new signup link found");
            return JobOutcome::NoLinkFound;
        };

        // Someone may have stopped us while the source page was loading.
        if self.stop.is_set() {
            info!("stop signal raised during link check, not registering");
            return JobOutcome::Skipped;
        }

        info!(%link, "found new signup link");
        let registrar = SlotRegistrar::new(Arc::clone(&self.driver), &config.page, &config.browser);
        if registrar
            .register_for_slot(&link, &request.identity, headless, &self.stop)
            .await
        {
            info!("successfully registered for slot");
            if config.settings.stop_after_success {
                info!("stopping automation after successful registration");
                self.stop.set("registered");
            }
            JobOutcome::Registered
        } else {
            error!("failed to register for slot");
            JobOutcome::Failed
        }
    }
}

/// A [`Job`] bound to a fixed request, as armed by the scheduler.
pub struct ScheduledJob {
    job: Job,
    request: JobRequest,
}

impl ScheduledJob {
    pub fn new(job: Job, request: JobRequest) -> Self {
        Self { job, request }
    }
}

#[async_trait]
impl JobRunner for ScheduledJob {
    async fn run_once(&self) -> JobOutcome {
        self.job.run(&self.request).await
    }
}
