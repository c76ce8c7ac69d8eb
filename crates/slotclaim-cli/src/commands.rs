use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use slotclaim_browser::{BrowserDriver, WebDriverClient};
use slotclaim_core::{Config, ConfigStore, ConfigUpdate, FileConfigStore, Identity, StopSignal};
use slotclaim_runner::{Job, JobOutcome, JobRequest, ScheduledJob};
use slotclaim_scheduler::{Scheduler, StopFile, SystemClock};
use tracing::{info, warn};

use crate::cli::{ConfigureArgs, JobArgs};

/// How long an interrupted attempt gets to close its browser.
const ATTEMPT_GRACE: Duration = Duration::from_secs(10);

pub fn configure(store: &FileConfigStore, args: ConfigureArgs) -> Result<()> {
    let update = args.into_update();
    if update.is_empty() {
        println!("Nothing to change. Pass the fields to update, e.g. --first-name or --interval.");
        return Ok(());
    }
    if !store.update(update) {
        bail!("could not write {}", store.path().display());
    }
    let config = store.load();
    if let Err(e) = config.validate() {
        warn!("configuration saved but not usable yet: {e}");
    }
    println!("Configuration updated: {}", store.path().display());
    Ok(())
}

pub fn show_config(store: &FileConfigStore) -> Result<()> {
    let config = store.load();
    println!("# {}", store.path().display());
    print!("{}", config.to_toml()?);
    Ok(())
}

pub fn stop(store: &FileConfigStore) -> Result<()> {
    let config = store.load();
    let sentinel = StopFile::new(&config.settings.stop_file);
    sentinel
        .request()
        .with_context(|| format!("writing {}", sentinel.path().display()))?;
    println!("Stop request sent. Automation will stop shortly.");
    Ok(())
}

pub async fn run_once(store: Arc<FileConfigStore>, args: JobArgs) -> Result<()> {
    let config = store.load();
    let identity = require_identity(&args, &config)?;
    let stop = StopSignal::new();
    watch_signals(stop.clone());

    let job = Job::new(driver(&config), store, stop.clone());
    let request = immediate_request(identity, &args);
    match run_until_stopped(&job, &request, &stop, ATTEMPT_GRACE).await {
        Some(outcome) => report(outcome),
        None => println!("Interrupted."),
    }
    Ok(())
}

pub async fn start(store: Arc<FileConfigStore>, run_now: bool, args: JobArgs) -> Result<()> {
    if let Some(headless) = args.display.choice() {
        store.update(ConfigUpdate {
            headless: Some(headless),
            ..Default::default()
        });
    }
    let config = store.load();
    config.validate().context("invalid configuration")?;
    let identity = require_identity(&args, &config)?;

    let stop = StopSignal::new();
    let sentinel = StopFile::new(&config.settings.stop_file);
    if sentinel.consume() {
        info!("removed a stale stop file");
    }
    watch_signals(stop.clone());

    info!(user = %identity, "automation started");
    let job = Job::new(driver(&config), Arc::clone(&store) as Arc<dyn ConfigStore>, stop.clone());

    if run_now {
        info!("running job immediately");
        let request = immediate_request(identity.clone(), &args);
        if let Some(outcome) = run_until_stopped(&job, &request, &stop, ATTEMPT_GRACE).await {
            report(outcome);
        }
        if stop.is_set() {
            println!("Automation finished after the immediate run.");
            return Ok(());
        }
        println!("Immediate job completed. Starting scheduler...");
    }

    let mut request = JobRequest::scheduled(identity, &config);
    request.skip_check |= args.skip_check;
    let runner = Arc::new(ScheduledJob::new(job, request));
    let scheduler = Scheduler::new(runner, &config, Arc::new(SystemClock), stop)?;

    println!(
        "Automation running. Next window opens {}. Press Ctrl+C to stop,\nor run `slotclaim stop` / create {} from another shell.",
        scheduler.next_run().format("%A %Y-%m-%d %H:%M"),
        sentinel.path().display()
    );
    scheduler.run().await;
    info!("application shutdown complete");
    Ok(())
}

fn driver(config: &Config) -> Arc<dyn BrowserDriver> {
    Arc::new(WebDriverClient::new(&config.browser))
}

fn require_identity(args: &JobArgs, config: &Config) -> Result<Identity> {
    let identity = args.identity.resolve(&config.user);
    identity.validate().context(
        "missing user information; pass --first-name/--last-name/--email or run `slotclaim configure`",
    )?;
    Ok(identity)
}

fn immediate_request(identity: Identity, args: &JobArgs) -> JobRequest {
    JobRequest {
        identity,
        url_override: args.url.clone(),
        skip_check: args.skip_check,
        headless_override: args.display.choice(),
    }
}

/// Run one attempt, racing it against `stop`. Once stop is raised the attempt
/// gets `grace` to wind down before it is dropped; `None` when it was.
async fn run_until_stopped(
    job: &Job,
    request: &JobRequest,
    stop: &StopSignal,
    grace: Duration,
) -> Option<JobOutcome> {
    let attempt = job.run(request);
    tokio::pin!(attempt);
    tokio::select! {
        biased;
        outcome = &mut attempt => return Some(outcome),
        _ = stop.wait() => {}
    }

    info!(grace_secs = grace.as_secs(), "stop requested mid-attempt, waiting for it to wind down");
    match tokio::time::timeout(grace, attempt).await {
        Ok(outcome) => Some(outcome),
        Err(_) => {
            warn!("attempt still running after {}s, abandoning it", grace.as_secs());
            None
        }
    }
}

fn report(outcome: JobOutcome) {
    match outcome {
        JobOutcome::Registered => println!("Registered for a slot."),
        JobOutcome::NoLinkFound => println!("No sign-up link published yet."),
        JobOutcome::Failed => println!("Attempt failed, see the log for details."),
        JobOutcome::Skipped => println!("Stopped before the attempt ran."),
    }
}

/// Raise `stop` on Ctrl+C or SIGTERM. A second signal exits immediately.
fn watch_signals(stop: StopSignal) {
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("received shutdown signal");
        stop.set("signal");

        shutdown_signal().await;
        warn!("second shutdown signal, exiting without cleanup");
        std::process::exit(130);
    });
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let ctrl_c = tokio::signal::ctrl_c();
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("cannot listen for SIGTERM ({e}), Ctrl+C only");
                let _ = ctrl_c.await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    }
}
