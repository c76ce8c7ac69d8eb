//! Polls the job runner on a fixed interval while a daily window is open.
//!
//! A session moves `Idle -> Checking -> Idle`. It ends when a job registers,
//! when the window closes, when the stop signal is raised, or when
//! [`WindowedChecker::stop`] cancels it. Every wait inside the loop races the
//! stop signal and the session's cancellation token, so ending a session never
//! needs to abort the task.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::NaiveDate;
use slotclaim_core::{DailyWindow, StopSignal};
use slotclaim_runner::{JobOutcome, JobRunner};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::types::{CheckSummary, EndReason, StartOutcome};

/// How long [`WindowedChecker::stop`] waits for the loop to wind down.
pub const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

struct Session {
    cancel: CancellationToken,
    handle: JoinHandle<CheckSummary>,
}

pub struct WindowedChecker {
    runner: Arc<dyn JobRunner>,
    clock: Arc<dyn Clock>,
    stop: StopSignal,
    window: DailyWindow,
    interval: Duration,
    session: Mutex<Option<Session>>,
    /// Cancelled sessions that were still inside a job when `stop` gave up.
    detached: Mutex<Vec<JoinHandle<CheckSummary>>>,
}

impl WindowedChecker {
    pub fn new(
        runner: Arc<dyn JobRunner>,
        clock: Arc<dyn Clock>,
        stop: StopSignal,
        window: DailyWindow,
        interval: Duration,
    ) -> Self {
        Self {
            runner,
            clock,
            stop,
            window,
            interval,
            session: Mutex::new(None),
            detached: Mutex::new(Vec::new()),
        }
    }

    /// Begin a session if the wall clock is inside the window.
    ///
    /// Calling this while a session is running is a no-op.
    pub fn start(&self) -> StartOutcome {
        let mut slot = self.lock_session();
        if slot.as_ref().is_some_and(|s| !s.handle.is_finished()) {
            debug!("checker already running");
            return StartOutcome::AlreadyChecking;
        }
        if self.stop.is_set() {
            info!("stop signal set, not starting checker");
            return StartOutcome::Stopped;
        }

        let now = self.clock.now();
        if !self.window.contains(now.time()) {
            info!(
                now = %now.format("%H:%M"),
                window = %self.window,
                "outside the checking window, staying idle"
            );
            return StartOutcome::OutsideWindow;
        }

        info!(
            window = %self.window,
            interval_mins = self.interval.as_secs() / 60,
            "starting checks"
        );
        let cancel = CancellationToken::new();
        let session_loop = CheckLoop {
            runner: Arc::clone(&self.runner),
            clock: Arc::clone(&self.clock),
            stop: self.stop.clone(),
            cancel: cancel.clone(),
            window: self.window,
            interval: self.interval,
            day: now.date(),
        };
        let handle = tokio::spawn(session_loop.run());
        *slot = Some(Session { cancel, handle });
        StartOutcome::Started
    }

    pub fn is_checking(&self) -> bool {
        self.lock_session()
            .as_ref()
            .is_some_and(|s| !s.handle.is_finished())
    }

    /// Cancel the running session and wait up to [`STOP_JOIN_TIMEOUT`] for it.
    ///
    /// A loop still inside a job after the timeout is detached: it observes
    /// the cancellation before starting anything new, and [`drain`] can wait
    /// for its job to release the browser.
    ///
    /// [`drain`]: WindowedChecker::drain
    pub async fn stop(&self) -> Option<CheckSummary> {
        let mut session = self.lock_session().take()?;
        session.cancel.cancel();

        match tokio::time::timeout(STOP_JOIN_TIMEOUT, &mut session.handle).await {
            Ok(Ok(summary)) => {
                info!(attempts = summary.attempts, ended = %summary.ended, "checks stopped");
                Some(summary)
            }
            Ok(Err(e)) => {
                warn!("checker task failed: {e}");
                None
            }
            Err(_) => {
                warn!("checker did not wind down in time, detaching it");
                self.lock_detached().push(session.handle);
                None
            }
        }
    }

    /// Wait up to `limit` for detached sessions to finish their last job.
    ///
    /// Returns `false` if any were still running when the limit ran out.
    pub async fn drain(&self, limit: Duration) -> bool {
        let pending = std::mem::take(&mut *self.lock_detached());
        if pending.is_empty() {
            return true;
        }
        info!(sessions = pending.len(), limit_secs = limit.as_secs(), "waiting for in-flight jobs");

        let all = async {
            for handle in pending {
                let _ = handle.await;
            }
        };
        match tokio::time::timeout(limit, all).await {
            Ok(_) => true,
            Err(_) => {
                warn!("in-flight jobs still running after {}s", limit.as_secs());
                false
            }
        }
    }

    /// Wait for the current session to end on its own.
    pub async fn wait_idle(&self) -> Option<CheckSummary> {
        let session = self.lock_session().take()?;
        match session.handle.await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!("checker task failed: {e}");
                None
            }
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_detached(&self) -> MutexGuard<'_, Vec<JoinHandle<CheckSummary>>> {
        self.detached.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Everything one session's task owns.
struct CheckLoop {
    runner: Arc<dyn JobRunner>,
    clock: Arc<dyn Clock>,
    stop: StopSignal,
    cancel: CancellationToken,
    window: DailyWindow,
    interval: Duration,
    /// Date the session started on; a session never spills into the next day.
    day: NaiveDate,
}

impl CheckLoop {
    async fn run(self) -> CheckSummary {
        let mut attempts = 0;
        let ended = loop {
            if let Some(reason) = self.interrupted() {
                break reason;
            }
            let now = self.clock.now();
            if now.date() != self.day || self.window.has_closed(now.time()) {
                break EndReason::WindowClosed;
            }

            attempts += 1;
            debug!(attempt = attempts, "running scheduled job");
            if self.runner.run_once().await == JobOutcome::Registered {
                break EndReason::Registered;
            }
            if let Some(reason) = self.interrupted() {
                break reason;
            }

            let now = self.clock.now();
            let next = chrono::Duration::from_std(self.interval)
                .ok()
                .and_then(|step| now.checked_add_signed(step));
            let fits = next.is_some_and(|next| {
                next.date() == self.day && !self.window.has_closed(next.time())
            });
            if !fits {
                // No room for another attempt: sit out the rest of the window.
                let closes_at = self.day.and_time(self.window.end);
                let remaining = (closes_at - now).to_std().unwrap_or(Duration::ZERO);
                debug!(remaining_secs = remaining.as_secs(), "last attempt of the window done");
                break self.pause(remaining).await.unwrap_or(EndReason::WindowClosed);
            }

            if let Some(reason) = self.pause(self.interval).await {
                break reason;
            }
        };

        info!(attempts, %ended, "checking session ended");
        CheckSummary { attempts, ended }
    }

    fn interrupted(&self) -> Option<EndReason> {
        if self.cancel.is_cancelled() {
            Some(EndReason::Cancelled)
        } else if self.stop.is_set() {
            Some(EndReason::Stopped)
        } else {
            None
        }
    }

    /// Sleep for `duration`; `Some` when cut short.
    async fn pause(&self, duration: Duration) -> Option<EndReason> {
        tokio::select! {
            _ = self.cancel.cancelled() => Some(EndReason::Cancelled),
            _ = self.stop.wait() => Some(EndReason::Stopped),
            _ = tokio::time::sleep(duration) => None,
        }
    }
}
