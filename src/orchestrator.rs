//! Upload-and-poll workflow for one lease analysis at a time.
//!
//! The current analysis lives in a `watch` channel so a front end can render
//! it while polling runs in the background. Each upload takes a fresh
//! generation ticket; every deferred write checks its ticket inside
//! `send_if_modified`, so a poll that outlived its upload cannot touch the
//! newer state.
//!
//! Polling failures (job error, unknown job, deadline) are not returned as
//! `Err`. They are logged and reported as a `PollOutcome`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::api_client::LeaseApiClient;
use crate::config::Config;
use crate::errors::AppError;
use crate::models::{AnalysisResult, JobStatus, LeaseUpload};
use crate::session::Session;

/// Where the current analysis request stands.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum JobPhase {
    #[default]
    Idle,
    Uploading,
    /// Upload rejected; carries the message shown to the user.
    UploadFailed(String),
    /// The upload response was already the full analysis.
    Completed,
    Pending {
        job_id: String,
    },
    Polling {
        job_id: String,
    },
    Done,
    Errored,
    NotFound,
    TimedOut,
}

impl JobPhase {
    /// True once nothing further will change the result.
    pub fn is_settled(&self) -> bool {
        !matches!(
            self,
            JobPhase::Uploading | JobPhase::Pending { .. } | JobPhase::Polling { .. }
        )
    }
}

/// Snapshot published to subscribers.
#[derive(Debug, Clone, Default)]
pub struct AnalysisView {
    pub generation: u64,
    pub phase: JobPhase,
    pub result: Option<AnalysisResult>,
}

/// Identifies one upload. Stale tickets cannot mutate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobTicket(u64);

impl JobTicket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

/// What the upload response told us to do next.
#[derive(Debug, Clone)]
pub enum Submission {
    Completed(AnalysisResult),
    Pending {
        ticket: JobTicket,
        job_id: String,
        partial: AnalysisResult,
    },
}

/// How a polling loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Final result merged over the partial one.
    Done(AnalysisResult),
    /// Backend reported `status == "error"`, or the status call failed.
    Errored(String),
    NotFound,
    TimedOut(Duration),
    /// A newer upload (or a reset) took over; nothing was written.
    Superseded,
}

impl PollOutcome {
    /// The error this outcome stands for, for callers that want to surface it.
    pub fn error(&self, job_id: &str) -> Option<AppError> {
        match self {
            PollOutcome::Done(_) | PollOutcome::Superseded => None,
            PollOutcome::Errored(reason) => Some(AppError::Job(reason.clone())),
            PollOutcome::NotFound => Some(AppError::JobNotFound(job_id.to_string())),
            PollOutcome::TimedOut(waited) => Some(AppError::JobTimeout {
                job_id: job_id.to_string(),
                waited_secs: waited.as_secs(),
            }),
        }
    }
}

/// Result of `analyze`: the upload answer plus, if it was pending, how
/// polling ended.
#[derive(Debug, Clone)]
pub enum AnalysisOutcome {
    Completed(AnalysisResult),
    Polled {
        job_id: String,
        partial: AnalysisResult,
        outcome: PollOutcome,
    },
}

impl AnalysisOutcome {
    /// Best result available: the final one when polling finished, the
    /// partial one otherwise.
    pub fn result(&self) -> &AnalysisResult {
        match self {
            AnalysisOutcome::Completed(result) => result,
            AnalysisOutcome::Polled {
                outcome: PollOutcome::Done(result),
                ..
            } => result,
            AnalysisOutcome::Polled { partial, .. } => partial,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.poll_interval(),
            timeout: config.poll_timeout(),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    api: LeaseApiClient,
    settings: PollSettings,
    state: Arc<watch::Sender<AnalysisView>>,
}

impl Orchestrator {
    pub fn new(api: LeaseApiClient, settings: PollSettings) -> Self {
        let (state, _) = watch::channel(AnalysisView::default());
        Self {
            api,
            settings,
            state: Arc::new(state),
        }
    }

    pub fn settings(&self) -> PollSettings {
        self.settings
    }

    /// Receiver that sees every published `AnalysisView`.
    pub fn subscribe(&self) -> watch::Receiver<AnalysisView> {
        self.state.subscribe()
    }

    pub fn current(&self) -> AnalysisView {
        self.state.borrow().clone()
    }

    pub fn is_current(&self, ticket: JobTicket) -> bool {
        self.state.borrow().generation == ticket.0
    }

    /// Drops interest in whatever is in flight and returns to `Idle`.
    pub fn reset(&self) {
        self.state.send_modify(|view| {
            view.generation += 1;
            view.phase = JobPhase::Idle;
            view.result = None;
        });
    }

    /// Uploads a lease and, if the backend queued it, polls to completion.
    pub async fn analyze(
        &self,
        session: &Session,
        upload: &LeaseUpload,
    ) -> Result<AnalysisOutcome, AppError> {
        match self.submit(session, upload).await? {
            Submission::Completed(result) => Ok(AnalysisOutcome::Completed(result)),
            Submission::Pending {
                ticket,
                job_id,
                partial,
            } => {
                let outcome = self.poll_until_settled(session, ticket, &job_id).await;
                Ok(AnalysisOutcome::Polled {
                    job_id,
                    partial,
                    outcome,
                })
            }
        }
    }

    /// Runs `analyze`, then logs `session` out whether or not it succeeded.
    pub async fn analyze_then_logout(
        &self,
        session: &mut Session,
        upload: &LeaseUpload,
    ) -> Result<AnalysisOutcome, AppError> {
        let analyzed = self.analyze(session, upload).await;
        if session.is_authenticated() {
            session.logout(&self.api).await;
        }
        analyzed
    }

    /// Uploads a lease. Supersedes any earlier upload.
    ///
    /// Upload failures are returned (they are meant for the user) and leave
    /// the view in `UploadFailed`.
    pub async fn submit(
        &self,
        session: &Session,
        upload: &LeaseUpload,
    ) -> Result<Submission, AppError> {
        let ticket = self.begin();

        let body = match self.api.process_lease_pdf(session, upload).await {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("Upload of {} failed: {}", upload.file_name, e);
                let message = e.to_string();
                self.apply(ticket, |view| view.phase = JobPhase::UploadFailed(message));
                return Err(e);
            }
        };

        let pending_job = if body.is_pending() {
            body.job_id().map(str::to_string)
        } else {
            None
        };

        match pending_job {
            Some(job_id) => {
                tracing::info!("Upload accepted, analysis job {} pending", job_id);
                let partial = body.clone();
                let pending_id = job_id.clone();
                self.apply(ticket, |view| {
                    view.phase = JobPhase::Pending { job_id: pending_id };
                    view.result = Some(body);
                });
                Ok(Submission::Pending {
                    ticket,
                    job_id,
                    partial,
                })
            }
            None => {
                tracing::info!("Upload returned a complete analysis");
                let complete = body.clone();
                self.apply(ticket, |view| {
                    view.phase = JobPhase::Completed;
                    view.result = Some(body);
                });
                Ok(Submission::Completed(complete))
            }
        }
    }

    /// Polls `job_id` until it settles, the deadline passes, or `ticket`
    /// stops being current.
    pub async fn poll_until_settled(
        &self,
        session: &Session,
        ticket: JobTicket,
        job_id: &str,
    ) -> PollOutcome {
        self.poll_with(|| session.clone(), ticket, job_id).await
    }

    /// Like `poll_until_settled`, but reads the session from `sessions`
    /// before every status request, so a logout mid-poll takes effect.
    pub async fn poll_following(
        &self,
        sessions: &watch::Receiver<Session>,
        ticket: JobTicket,
        job_id: &str,
    ) -> PollOutcome {
        self.poll_with(|| sessions.borrow().clone(), ticket, job_id)
            .await
    }

    async fn poll_with(
        &self,
        current_session: impl Fn() -> Session,
        ticket: JobTicket,
        job_id: &str,
    ) -> PollOutcome {
        let polling_id = job_id.to_string();
        if !self.apply(ticket, |view| {
            view.phase = JobPhase::Polling { job_id: polling_id }
        }) {
            return PollOutcome::Superseded;
        }

        let started = Instant::now();
        let deadline = self.settings.timeout;

        let status = loop {
            let remaining = deadline.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                break None;
            }
            tokio::time::sleep(self.settings.interval.min(remaining)).await;

            if !self.is_current(ticket) {
                tracing::debug!("Job {} superseded, polling stopped", job_id);
                return PollOutcome::Superseded;
            }

            let remaining = deadline.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                break None;
            }

            let session = current_session();
            match tokio::time::timeout(remaining, self.api.analysis_status(&session, job_id)).await {
                Err(_) => break None,
                Ok(Ok(JobStatus::Pending)) => {}
                Ok(Ok(JobStatus::Other(status))) => {
                    tracing::debug!("Job {} reported status '{}', still waiting", job_id, status);
                }
                Ok(Err(AppError::Parse(e))) => {
                    tracing::debug!("Ignoring malformed status for job {}: {}", job_id, e);
                }
                Ok(result) => break Some(result),
            }
        };

        match status {
            None => {
                let waited = started.elapsed();
                tracing::warn!(
                    "Job {} still pending after {}s, polling stopped",
                    job_id,
                    waited.as_secs()
                );
                self.finish(ticket, JobPhase::TimedOut, PollOutcome::TimedOut(waited))
            }
            Some(Ok(JobStatus::Done(update))) => self.merge_final(ticket, job_id, update),
            Some(Ok(JobStatus::Error(detail))) => {
                let reason = detail
                    .as_ref()
                    .and_then(|d| d.get("error"))
                    .and_then(|e| e.as_str())
                    .unwrap_or("backend reported an analysis error")
                    .to_string();
                tracing::warn!("Job {} failed: {}", job_id, reason);
                self.finish(ticket, JobPhase::Errored, PollOutcome::Errored(reason))
            }
            Some(Err(AppError::JobNotFound(_))) => {
                tracing::warn!("Job {} not found, polling stopped", job_id);
                self.finish(ticket, JobPhase::NotFound, PollOutcome::NotFound)
            }
            Some(Err(e)) => {
                tracing::warn!("Polling job {} failed: {}", job_id, e);
                self.finish(ticket, JobPhase::Errored, PollOutcome::Errored(e.to_string()))
            }
            // Pending, Other and Parse never leave the loop.
            Some(Ok(_)) => self.finish(
                ticket,
                JobPhase::Errored,
                PollOutcome::Errored("unexpected job status".to_string()),
            ),
        }
    }

    fn begin(&self) -> JobTicket {
        let mut ticket = JobTicket(0);
        self.state.send_modify(|view| {
            view.generation += 1;
            view.phase = JobPhase::Uploading;
            view.result = None;
            ticket = JobTicket(view.generation);
        });
        ticket
    }

    /// Runs `update` only if `ticket` is still current. Returns whether it ran.
    fn apply(&self, ticket: JobTicket, update: impl FnOnce(&mut AnalysisView)) -> bool {
        self.state.send_if_modified(|view| {
            if view.generation != ticket.0 {
                return false;
            }
            update(view);
            true
        })
    }

    fn finish(&self, ticket: JobTicket, phase: JobPhase, outcome: PollOutcome) -> PollOutcome {
        if self.apply(ticket, |view| view.phase = phase) {
            outcome
        } else {
            PollOutcome::Superseded
        }
    }

    fn merge_final(
        &self,
        ticket: JobTicket,
        job_id: &str,
        update: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> PollOutcome {
        let mut merged = None;
        let applied = self.apply(ticket, |view| {
            let mut result = view.result.take().unwrap_or_default();
            if let Some(update) = &update {
                result.merge(update);
            }
            merged = Some(result.clone());
            view.result = Some(result);
            view.phase = JobPhase::Done;
        });

        match merged {
            Some(result) if applied => {
                tracing::info!("✓ Analysis job {} complete", job_id);
                PollOutcome::Done(result)
            }
            _ => PollOutcome::Superseded,
        }
    }
}
