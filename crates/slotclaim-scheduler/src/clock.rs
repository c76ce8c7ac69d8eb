use chrono::{Local, NaiveDateTime};
use tokio::time::Instant;

/// Source of local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The machine's local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Wall clock pinned to `base` at creation and advanced by tokio's timer.
///
/// Under a paused tokio runtime this lets hour-long windows run instantly
/// while sleeps and wall-clock reads stay consistent.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    base: NaiveDateTime,
    origin: Instant,
}

impl TokioClock {
    pub fn starting_at(base: NaiveDateTime) -> Self {
        Self {
            base,
            origin: Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> NaiveDateTime {
        let elapsed = Instant::now().duration_since(self.origin);
        self.base + chrono::Duration::from_std(elapsed).unwrap_or(chrono::Duration::zero())
    }
}
