use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// The person a slot is claimed for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

impl Identity {
    pub fn new(first_name: &str, last_name: &str, email: &str) -> Self {
        Self {
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            email: email.trim().to_string(),
        }
    }

    /// All three fields must be non-blank before any job may run.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("email", &self.email),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(CoreError::MissingIdentity { field });
            }
        }
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.validate().is_ok()
    }

    /// Fill any blank field from `fallback`.
    pub fn or(self, fallback: &Identity) -> Identity {
        let pick = |own: String, other: &String| {
            if own.trim().is_empty() {
                other.clone()
            } else {
                own
            }
        };
        Identity {
            first_name: pick(self.first_name, &fallback.first_name),
            last_name: pick(self.last_name, &fallback.last_name),
            email: pick(self.email, &fallback.email),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.first_name, self.last_name, self.email)
    }
}

/// Parse a wall-clock "HH:MM" string.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|_| CoreError::InvalidTime {
        value: value.to_string(),
    })
}

/// A daily `[start, end]` wall-clock range, both ends inclusive.
///
/// Bounds are configured at minute resolution, so comparisons ignore
/// seconds: 10:00:30 is still inside a window that ends at 10:00.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl DailyWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
        if start > end {
            return Err(CoreError::Config(format!(
                "window start {} is after window end {}",
                start.format("%H:%M"),
                end.format("%H:%M")
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        let time = truncate_to_minute(time);
        self.start <= time && time <= self.end
    }

    /// True once `time` is strictly past the closing minute.
    pub fn has_closed(&self, time: NaiveTime) -> bool {
        truncate_to_minute(time) > self.end
    }

    pub fn length(&self) -> chrono::Duration {
        self.end - self.start
    }
}

impl fmt::Display for DailyWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    time.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time)
}
