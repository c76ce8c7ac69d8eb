use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CoreError, Result};
use crate::types::{parse_time_of_day, DailyWindow, Identity};

pub const DEFAULT_CONFIG_FILE: &str = "slotclaim.toml";
pub const DEFAULT_SOURCE_URL: &str = "https://uwm.edu/food-pantry/";
pub const DEFAULT_TARGET_DOMAIN: &str = "signupgenius.com";
pub const DEFAULT_STOP_FILE: &str = "stop_automation.txt";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
pub const ENV_PREFIX: &str = "SLOTCLAIM_";

/// Top-level config (slotclaim.toml + SLOTCLAIM_* env overrides).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub user: Identity,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub urls: UrlsConfig,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub page: PageProfile,
}

/// Weekly polling window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// 0 = Monday … 6 = Sunday.
    #[serde(default)]
    pub day_of_week: u8,
    #[serde(default = "default_start_time")]
    pub start_time: String,
    #[serde(default = "default_end_time")]
    pub end_time: String,
    /// Minutes between checks while the window is open.
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            day_of_week: 0,
            start_time: default_start_time(),
            end_time: default_end_time(),
            check_interval: default_check_interval(),
        }
    }
}

impl ScheduleConfig {
    pub fn window(&self) -> Result<DailyWindow> {
        DailyWindow::new(
            parse_time_of_day(&self.start_time)?,
            parse_time_of_day(&self.end_time)?,
        )
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.check_interval.saturating_mul(60))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlsConfig {
    /// Page scanned for a freshly published sign-up link.
    #[serde(default = "default_source_url")]
    pub default: String,
    /// Host of the sign-up service; subdomains match too.
    #[serde(default = "default_target_domain")]
    pub target_domain: String,
}

impl Default for UrlsConfig {
    fn default() -> Self {
        Self {
            default: default_source_url(),
            target_domain: default_target_domain(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub headless: bool,
    #[serde(default = "bool_true")]
    pub stop_after_success: bool,
    /// Use a source URL that is already on the target domain without loading it.
    #[serde(default)]
    pub skip_check: bool,
    /// Arm the checker at startup when already inside this week's window.
    #[serde(default)]
    pub check_on_start: bool,
    /// Sentinel file that requests a stop from outside the process.
    #[serde(default = "default_stop_file")]
    pub stop_file: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            headless: false,
            stop_after_success: true,
            skip_check: false,
            check_on_start: false,
            stop_file: default_stop_file(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    Chrome,
    Firefox,
}

/// WebDriver endpoint and the timing knobs used while driving pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    #[serde(default = "default_browser_kind")]
    pub kind: BrowserKind,
    #[serde(default = "default_page_load_timeout")]
    pub page_load_timeout_secs: u64,
    /// Upper bound for every wait-for-element step.
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_secs: u64,
    /// Pause after submitting the form.
    #[serde(default = "default_settle")]
    pub settle_secs: u64,
    /// Pause before closing a visible browser so the result can be seen.
    #[serde(default = "default_settle")]
    pub visible_pause_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            kind: default_browser_kind(),
            page_load_timeout_secs: default_page_load_timeout(),
            wait_timeout_secs: default_wait_timeout(),
            settle_secs: default_settle(),
            visible_pause_secs: default_settle(),
        }
    }
}

impl BrowserConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    pub fn visible_pause(&self) -> Duration {
        Duration::from_secs(self.visible_pause_secs)
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }
}

/// Selectors describing the sign-up form of the target site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageProfile {
    #[serde(default = "default_signup_button_xpath")]
    pub signup_button_xpath: String,
    #[serde(default = "default_confirm_button_xpath")]
    pub confirm_button_xpath: String,
    #[serde(default = "default_first_name_id")]
    pub first_name_id: String,
    #[serde(default = "default_last_name_id")]
    pub last_name_id: String,
    #[serde(default = "default_email_id")]
    pub email_id: String,
    #[serde(default = "default_submit_name")]
    pub submit_name: String,
}

impl Default for PageProfile {
    fn default() -> Self {
        Self {
            signup_button_xpath: default_signup_button_xpath(),
            confirm_button_xpath: default_confirm_button_xpath(),
            first_name_id: default_first_name_id(),
            last_name_id: default_last_name_id(),
            email_id: default_email_id(),
            submit_name: default_submit_name(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_start_time() -> String {
    "09:30".to_string()
}
fn default_end_time() -> String {
    "10:00".to_string()
}
fn default_check_interval() -> u64 {
    10
}
fn default_source_url() -> String {
    DEFAULT_SOURCE_URL.to_string()
}
fn default_target_domain() -> String {
    DEFAULT_TARGET_DOMAIN.to_string()
}
fn default_stop_file() -> String {
    DEFAULT_STOP_FILE.to_string()
}
fn default_webdriver_url() -> String {
    DEFAULT_WEBDRIVER_URL.to_string()
}
fn default_browser_kind() -> BrowserKind {
    BrowserKind::Chrome
}
fn default_page_load_timeout() -> u64 {
    30
}
fn default_wait_timeout() -> u64 {
    5
}
fn default_settle() -> u64 {
    2
}
fn default_signup_button_xpath() -> String {
    "//div/div/div/signup-button/button".to_string()
}
fn default_confirm_button_xpath() -> String {
    "//div[@id='signupContainerId']/div[4]/div/button".to_string()
}
fn default_first_name_id() -> String {
    "firstname".to_string()
}
fn default_last_name_id() -> String {
    "lastname".to_string()
}
fn default_email_id() -> String {
    "email".to_string()
}
fn default_submit_name() -> String {
    "btnSignUp".to_string()
}

impl Config {
    /// Load config from a TOML file with SLOTCLAIM_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g. `SLOTCLAIM_SETTINGS__HEADLESS=true`.
    pub fn load(path: &Path) -> Result<Self> {
        Self::extract(path, true)
    }

    fn extract(path: &Path, with_env: bool) -> Result<Self> {
        let mut figment = Figment::new().merge(Toml::file(path));
        if with_env {
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }
        figment
            .extract()
            .map_err(|e| CoreError::Config(e.to_string()))
    }

    /// Check everything the scheduler relies on. Identity is validated separately
    /// because it may come from the command line instead.
    pub fn validate(&self) -> Result<()> {
        if self.schedule.day_of_week > 6 {
            return Err(CoreError::Config(format!(
                "day_of_week must be 0-6, got {}",
                self.schedule.day_of_week
            )));
        }
        if self.schedule.check_interval == 0 {
            return Err(CoreError::Config(
                "check_interval must be at least one minute".to_string(),
            ));
        }
        self.schedule.window()?;
        if self.urls.target_domain.trim().is_empty() {
            return Err(CoreError::Config("urls.target_domain is empty".to_string()));
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Partial update applied by `configure`; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ConfigUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub default_url: Option<String>,
    pub headless: Option<bool>,
    pub stop_after_success: Option<bool>,
    pub skip_check: Option<bool>,
    pub check_on_start: Option<bool>,
    pub day_of_week: Option<u8>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub check_interval: Option<u64>,
}

impl ConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.default_url.is_none()
            && self.headless.is_none()
            && self.stop_after_success.is_none()
            && self.skip_check.is_none()
            && self.check_on_start.is_none()
            && self.day_of_week.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.check_interval.is_none()
    }

    pub fn apply(self, config: &mut Config) {
        if let Some(v) = self.first_name {
            config.user.first_name = v;
        }
        if let Some(v) = self.last_name {
            config.user.last_name = v;
        }
        if let Some(v) = self.email {
            config.user.email = v;
        }
        if let Some(v) = self.default_url {
            config.urls.default = v;
        }
        if let Some(v) = self.headless {
            config.settings.headless = v;
        }
        if let Some(v) = self.stop_after_success {
            config.settings.stop_after_success = v;
        }
        if let Some(v) = self.skip_check {
            config.settings.skip_check = v;
        }
        if let Some(v) = self.check_on_start {
            config.settings.check_on_start = v;
        }
        if let Some(v) = self.day_of_week {
            config.schedule.day_of_week = v;
        }
        if let Some(v) = self.start_time {
            config.schedule.start_time = v;
        }
        if let Some(v) = self.end_time {
            config.schedule.end_time = v;
        }
        if let Some(v) = self.check_interval {
            config.schedule.check_interval = v;
        }
    }
}

/// Where the core reads its configuration from.
///
/// Loading never fails: a broken store degrades to defaults so unattended
/// runs keep going.
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Config;
    fn save(&self, config: &Config) -> bool;
}

/// TOML file store in the working directory (or an explicit path).
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Resolve the config path: explicit > SLOTCLAIM_CONFIG env > ./slotclaim.toml.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("SLOTCLAIM_CONFIG").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, config.to_toml()?)?;
        Ok(())
    }

    /// Apply `update` to the file contents (env overrides are not persisted).
    pub fn update(&self, update: ConfigUpdate) -> bool {
        let mut config = if self.path.exists() {
            match Config::extract(&self.path, false) {
                Ok(c) => c,
                Err(e) => {
                    warn!(path = %self.path.display(), "config unreadable ({e}), rewriting from defaults");
                    Config::default()
                }
            }
        } else {
            Config::default()
        };
        update.apply(&mut config);
        self.save(&config)
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if !self.path.exists() {
            info!(path = %self.path.display(), "no configuration file found, creating default");
            let config = Config::default();
            self.save(&config);
            return config;
        }
        match Config::load(&self.path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %self.path.display(), "config load failed ({e}), using defaults");
                Config::default()
            }
        }
    }

    fn save(&self, config: &Config) -> bool {
        match self.write(config) {
            Ok(()) => {
                info!(path = %self.path.display(), "configuration saved");
                true
            }
            Err(e) => {
                warn!(path = %self.path.display(), code = e.code(), "config save failed: {e}");
                false
            }
        }
    }
}

/// Fixed configuration held in memory; `save` replaces it.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    config: std::sync::RwLock<Config>,
}

impl MemoryConfigStore {
    pub fn new(config: Config) -> Self {
        Self {
            config: std::sync::RwLock::new(config),
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Config {
        match self.config.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn save(&self, config: &Config) -> bool {
        match self.config.write() {
            Ok(mut guard) => {
                *guard = config.clone();
                true
            }
            Err(_) => false,
        }
    }
}
