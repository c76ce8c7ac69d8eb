use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Weekday};
use slotclaim_core::config::ScheduleConfig;
use slotclaim_core::DailyWindow;

use crate::error::{Result, SchedulerError};

/// Map `0 = Monday … 6 = Sunday` onto chrono's weekday.
pub fn weekday_from_index(day: u8) -> Result<Weekday> {
    Ok(match day {
        0 => Weekday::Mon,
        1 => Weekday::Tue,
        2 => Weekday::Wed,
        3 => Weekday::Thu,
        4 => Weekday::Fri,
        5 => Weekday::Sat,
        6 => Weekday::Sun,
        other => {
            return Err(SchedulerError::InvalidSchedule(format!(
                "day_of_week must be 0-6, got {other}"
            )))
        }
    })
}

/// Next `(day, at)` local occurrence strictly *after* `from`.
pub fn next_weekly(day: Weekday, at: NaiveTime, from: NaiveDateTime) -> NaiveDateTime {
    let today_dow = from.weekday().num_days_from_monday() as i64;
    let target_dow = day.num_days_from_monday() as i64;
    // Negative means the target day already passed this week.
    let days_ahead = (target_dow - today_dow).rem_euclid(7);

    let candidate = (from.date() + Duration::days(days_ahead)).and_time(at);
    if candidate > from {
        candidate
    } else {
        // Today is the target day and the time has already passed: push a week.
        candidate + Duration::days(7)
    }
}

/// One weekly trigger at `(day, start)` guarding a daily window.
#[derive(Debug, Clone)]
pub struct WeeklyTrigger {
    day: Weekday,
    window: DailyWindow,
    next_run: NaiveDateTime,
}

impl WeeklyTrigger {
    pub fn new(day: Weekday, window: DailyWindow, now: NaiveDateTime) -> Self {
        Self {
            day,
            window,
            next_run: next_weekly(day, window.start, now),
        }
    }

    pub fn from_config(schedule: &ScheduleConfig, now: NaiveDateTime) -> Result<Self> {
        if schedule.check_interval == 0 {
            return Err(SchedulerError::InvalidSchedule(
                "check_interval must be at least one minute".to_string(),
            ));
        }
        let day = weekday_from_index(schedule.day_of_week)?;
        Ok(Self::new(day, schedule.window()?, now))
    }

    pub fn day(&self) -> Weekday {
        self.day
    }

    pub fn window(&self) -> DailyWindow {
        self.window
    }

    pub fn next_run(&self) -> NaiveDateTime {
        self.next_run
    }

    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        now >= self.next_run
    }

    /// Consume the due occurrence and arm the following one.
    pub fn advance(&mut self, now: NaiveDateTime) {
        self.next_run = next_weekly(self.day, self.window.start, now);
    }

    /// Whether `now` falls inside this week's window (right day, inside the range).
    pub fn in_window(&self, now: NaiveDateTime) -> bool {
        now.weekday() == self.day && self.window.contains(now.time())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    // 2026-10-12 is a Monday.

    #[test]
    fn later_today_fires_today() {
        let next = next_weekly(Weekday::Mon, hm(9, 30), at(2026, 10, 12, 8, 0));
        assert_eq!(next, at(2026, 10, 12, 9, 30));
    }

    #[test]
    fn passed_today_fires_next_week() {
        let next = next_weekly(Weekday::Mon, hm(9, 30), at(2026, 10, 12, 9, 30));
        assert_eq!(next, at(2026, 10, 19, 9, 30));
    }

    #[test]
    fn earlier_weekday_wraps_around() {
        // Friday → next Monday
        let next = next_weekly(Weekday::Mon, hm(9, 30), at(2026, 10, 16, 12, 0));
        assert_eq!(next, at(2026, 10, 19, 9, 30));
        // Monday → Wednesday same week
        let next = next_weekly(Weekday::Wed, hm(14, 0), at(2026, 10, 12, 12, 0));
        assert_eq!(next, at(2026, 10, 14, 14, 0));
    }

    #[test]
    fn trigger_advances_one_week_after_firing() {
        let window = DailyWindow::new(hm(9, 30), hm(10, 0)).unwrap();
        let mut trigger = WeeklyTrigger::new(Weekday::Mon, window, at(2026, 10, 12, 9, 0));
        assert!(!trigger.is_due(at(2026, 10, 12, 9, 29)));
        assert!(trigger.is_due(at(2026, 10, 12, 9, 30)));

        trigger.advance(at(2026, 10, 12, 9, 30));
        assert_eq!(trigger.next_run(), at(2026, 10, 19, 9, 30));
    }

    #[test]
    fn in_window_checks_day_and_time() {
        let window = DailyWindow::new(hm(9, 30), hm(10, 0)).unwrap();
        let trigger = WeeklyTrigger::new(Weekday::Mon, window, at(2026, 10, 12, 9, 0));
        assert!(trigger.in_window(at(2026, 10, 12, 9, 45)));
        assert!(!trigger.in_window(at(2026, 10, 13, 9, 45)));
        assert!(!trigger.in_window(at(2026, 10, 12, 10, 5)));
    }

    #[test]
    fn bad_day_index_is_rejected() {
        assert!(weekday_from_index(7).is_err());
        assert_eq!(weekday_from_index(6).unwrap(), Weekday::Sun);
    }
}
