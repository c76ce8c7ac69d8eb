//! `slotclaim-core`: config, identity types and the stop signal.

pub mod config;
pub mod error;
pub mod stop;
pub mod types;

pub use config::{Config, ConfigStore, ConfigUpdate, FileConfigStore, MemoryConfigStore};
pub use error::{CoreError, Result};
pub use stop::StopSignal;
pub use types::{DailyWindow, Identity};
