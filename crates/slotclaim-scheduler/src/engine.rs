use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use slotclaim_core::config::BrowserConfig;
use slotclaim_core::{Config, StopSignal};
use slotclaim_runner::JobRunner;
use tracing::{debug, info};

use crate::checker::WindowedChecker;
use crate::clock::Clock;
use crate::error::Result;
use crate::schedule::WeeklyTrigger;
use crate::sentinel::StopFile;
use crate::types::StartOutcome;

/// Weekly scheduler: arms a [`WindowedChecker`] at `(day_of_week, start_time)`
/// and watches for stop requests at one-second precision.
pub struct Scheduler {
    checker: WindowedChecker,
    trigger: WeeklyTrigger,
    clock: Arc<dyn Clock>,
    stop: StopSignal,
    stop_file: StopFile,
    check_on_start: bool,
    /// How long shutdown waits for a job that outlived the checker's stop.
    drain_limit: Duration,
}

impl Scheduler {
    /// Build a scheduler for `config`. The identity travels inside `runner`.
    pub fn new(
        runner: Arc<dyn JobRunner>,
        config: &Config,
        clock: Arc<dyn Clock>,
        stop: StopSignal,
    ) -> Result<Self> {
        config.validate()?;
        let trigger = WeeklyTrigger::from_config(&config.schedule, clock.now())?;
        let checker = WindowedChecker::new(
            runner,
            Arc::clone(&clock),
            stop.clone(),
            trigger.window(),
            config.schedule.interval(),
        );
        Ok(Self {
            checker,
            trigger,
            clock,
            stop,
            stop_file: StopFile::new(&config.settings.stop_file),
            check_on_start: config.settings.check_on_start,
            drain_limit: attempt_budget(&config.browser),
        })
    }

    pub fn next_run(&self) -> NaiveDateTime {
        self.trigger.next_run()
    }

    /// Main loop. Ticks every second until the stop signal is raised, then
    /// stops any active checking session before returning.
    pub async fn run(mut self) {
        info!(
            day = %self.trigger.day(),
            window = %self.trigger.window(),
            next_run = %self.trigger.next_run().format("%Y-%m-%d %H:%M"),
            "scheduler started"
        );

        if self.check_on_start && self.trigger.in_window(self.clock.now()) {
            info!("started inside the window, checking now");
            self.checker.start();
        }

        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick();
                    if self.stop.is_set() {
                        break;
                    }
                }
                _ = self.stop.wait() => break,
            }
        }

        info!("scheduler shutting down");
        self.checker.stop().await;
        // a job cut off mid-attempt still has to close its browser
        self.checker.drain(self.drain_limit).await;
        info!("scheduler stopped");
    }

    fn tick(&mut self) {
        if self.stop_file.consume() {
            self.stop.set("stop file");
            return;
        }

        let now = self.clock.now();
        if !self.trigger.is_due(now) {
            return;
        }
        self.trigger.advance(now);
        info!(next_run = %self.trigger.next_run().format("%Y-%m-%d %H:%M"), "weekly trigger fired");
        match self.checker.start() {
            StartOutcome::Started => {}
            other => debug!(?other, "checker not started"),
        }
    }
}

/// Worst case for one attempt: two page loads, every element wait timing
/// out, plus the post-submit pauses.
fn attempt_budget(browser: &BrowserConfig) -> Duration {
    browser.page_load_timeout() * 2
        + browser.wait_timeout() * 8
        + browser.settle()
        + browser.visible_pause()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TokioClock;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use slotclaim_runner::JobOutcome;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct Counting(AtomicU32);

    /// Counts attempts that ran to completion.
    #[derive(Default)]
    struct Slow(AtomicU32);

    #[async_trait]
    impl JobRunner for Slow {
        async fn run_once(&self) -> JobOutcome {
            tokio::time::sleep(Duration::from_secs(20)).await;
            self.0.fetch_add(1, Ordering::SeqCst);
            JobOutcome::Failed
        }
    }

    #[async_trait]
    impl JobRunner for Counting {
        async fn run_once(&self) -> JobOutcome {
            self.0.fetch_add(1, Ordering::SeqCst);
            JobOutcome::NoLinkFound
        }
    }

    fn monday(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 12)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn config_in(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.settings.stop_file = dir.join("stop_automation.txt").display().to_string();
        config
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_schedule_is_rejected() {
        let mut config = Config::default();
        config.schedule.day_of_week = 9;
        let clock = Arc::new(TokioClock::starting_at(monday(8, 0)));
        let built = Scheduler::new(Arc::new(Counting::default()), &config, clock, StopSignal::new());
        assert!(built.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn next_run_is_this_mondays_window() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(TokioClock::starting_at(monday(8, 0)));
        let scheduler = Scheduler::new(
            Arc::new(Counting::default()),
            &config_in(dir.path()),
            clock,
            StopSignal::new(),
        )
        .unwrap();
        assert_eq!(scheduler.next_run(), monday(9, 30));
    }

    #[tokio::test(start_paused = true)]
    async fn check_on_start_arms_checker_inside_window() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.settings.check_on_start = true;
        let runner = Arc::new(Counting::default());
        let stop = StopSignal::new();
        let clock = Arc::new(TokioClock::starting_at(monday(9, 45)));
        let scheduler = Scheduler::new(runner.clone(), &config, clock, stop.clone()).unwrap();

        let task = tokio::spawn(scheduler.run());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(runner.0.load(Ordering::SeqCst), 1);

        stop.set("test");
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn without_check_on_start_waits_for_next_week() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(Counting::default());
        let stop = StopSignal::new();
        let clock = Arc::new(TokioClock::starting_at(monday(9, 45)));
        let scheduler =
            Scheduler::new(runner.clone(), &config_in(dir.path()), clock, stop.clone()).unwrap();
        assert_eq!(scheduler.next_run(), monday(9, 30) + chrono::Duration::days(7));

        let task = tokio::spawn(scheduler.run());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(runner.0.load(Ordering::SeqCst), 0);

        stop.set("test");
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_waits_for_the_job_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.settings.check_on_start = true;
        let runner = Arc::new(Slow::default());
        let stop = StopSignal::new();
        let clock = Arc::new(TokioClock::starting_at(monday(9, 45)));
        let scheduler = Scheduler::new(runner.clone(), &config, clock, stop.clone()).unwrap();

        let task = tokio::spawn(scheduler.run());
        tokio::time::sleep(Duration::from_secs(5)).await;
        stop.set("test");
        task.await.unwrap();

        // run() only returned once the attempt had finished
        assert_eq!(runner.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn attempt_budget_covers_page_loads_and_waits() {
        let browser = BrowserConfig::default();
        assert!(attempt_budget(&browser) > browser.page_load_timeout() * 2);
    }
}
