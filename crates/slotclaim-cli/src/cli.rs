use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use slotclaim_core::types::parse_time_of_day;
use slotclaim_core::{ConfigUpdate, Identity};

pub const DEFAULT_LOG_FILE: &str = "slotclaim_automation.log";

/// Claims a sign-up slot the moment its link is published.
#[derive(Parser, Debug)]
#[command(name = "slotclaim", version = env!("SLOTCLAIM_VERSION"), about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to $SLOTCLAIM_CONFIG, then ./slotclaim.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Append log output to this file as well as stderr
    #[arg(long, global = true, default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Update and persist configuration fields
    Configure(ConfigureArgs),
    /// Print the current configuration
    ShowConfig,
    /// Run a single job now and exit
    RunOnce(JobArgs),
    /// Arm the weekly scheduler and run until stopped
    Start {
        /// Run one job immediately before arming the scheduler
        #[arg(long)]
        run_now: bool,

        #[command(flatten)]
        job: JobArgs,
    },
    /// Ask a running scheduler to stop
    Stop,
}

/// Identity fields; blanks fall back to the configured user.
#[derive(Args, Debug, Clone, Default)]
pub struct IdentityArgs {
    #[arg(long)]
    pub first_name: Option<String>,
    #[arg(long)]
    pub last_name: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
}

impl IdentityArgs {
    pub fn resolve(&self, configured: &Identity) -> Identity {
        Identity::new(
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default(),
            self.email.as_deref().unwrap_or_default(),
        )
        .or(configured)
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct DisplayArgs {
    /// Run browsers without a window
    #[arg(long, conflicts_with = "visible")]
    pub headless: bool,
    /// Run browsers with a visible window
    #[arg(long)]
    pub visible: bool,
}

impl DisplayArgs {
    pub fn choice(&self) -> Option<bool> {
        match (self.headless, self.visible) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct JobArgs {
    #[command(flatten)]
    pub identity: IdentityArgs,

    /// Source page to scan, or a sign-up URL to use directly
    #[arg(long)]
    pub url: Option<String>,

    /// Use a URL already on the sign-up domain without loading it
    #[arg(long)]
    pub skip_check: bool,

    #[command(flatten)]
    pub display: DisplayArgs,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ConfigureArgs {
    #[command(flatten)]
    pub identity: IdentityArgs,

    /// Default source page
    #[arg(long)]
    pub url: Option<String>,

    #[command(flatten)]
    pub display: DisplayArgs,

    #[arg(long)]
    pub stop_after_success: Option<bool>,

    #[arg(long)]
    pub skip_check: Option<bool>,

    /// Start checking right away when launched inside the window
    #[arg(long)]
    pub check_on_start: Option<bool>,

    /// Day of the week, 0 = Monday … 6 = Sunday
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=6))]
    pub day: Option<u8>,

    /// Window start, HH:MM
    #[arg(long, value_parser = hh_mm)]
    pub start: Option<String>,

    /// Window end, HH:MM
    #[arg(long, value_parser = hh_mm)]
    pub end: Option<String>,

    /// Minutes between checks
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,
}

impl ConfigureArgs {
    pub fn into_update(self) -> ConfigUpdate {
        ConfigUpdate {
            first_name: self.identity.first_name,
            last_name: self.identity.last_name,
            email: self.identity.email,
            default_url: self.url,
            headless: self.display.choice(),
            stop_after_success: self.stop_after_success,
            skip_check: self.skip_check,
            check_on_start: self.check_on_start,
            day_of_week: self.day,
            start_time: self.start,
            end_time: self.end,
            check_interval: self.interval,
        }
    }
}

fn hh_mm(value: &str) -> Result<String, String> {
    parse_time_of_day(value)
        .map(|t| t.format("%H:%M").to_string())
        .map_err(|e| e.to_string())
}
