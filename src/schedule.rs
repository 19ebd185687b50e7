use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

/// Last weekday reachable from the week start (Monday + 4 = Friday).
pub const MAX_DAYS_OFFSET: u32 = 4;

/// Source of "now" for the scheduled runner.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock in the host's local time zone, taken to be the exchange's.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Weekly trigger: the `days_offset`-th weekday of the week, a fixed offset
/// after the market open. Exchange holidays are not modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebalanceSchedule {
    days_offset: u32,
    market_open: NaiveTime,
    offset_after_open: Duration,
}

impl RebalanceSchedule {
    /// `days_offset` past [`MAX_DAYS_OFFSET`] lands on Friday; configuration
    /// rejects such values before they get here.
    pub fn weekly(days_offset: u32, market_open: NaiveTime, offset_after_open: Duration) -> Self {
        Self {
            days_offset: days_offset.min(MAX_DAYS_OFFSET),
            market_open,
            offset_after_open,
        }
    }

    pub fn days_offset(&self) -> u32 {
        self.days_offset
    }

    /// Trigger instant for the week containing `date`.
    pub fn trigger_for_week(&self, date: NaiveDate) -> NaiveDateTime {
        let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
        let day = monday + Duration::days(self.days_offset as i64);
        day.and_time(self.market_open) + self.offset_after_open
    }

    /// Due once per week: at or after this week's trigger, unless a run
    /// already happened at or after it.
    pub fn is_due(&self, now: NaiveDateTime, last_run: Option<NaiveDateTime>) -> bool {
        if matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        let trigger = self.trigger_for_week(now.date());
        now >= trigger && last_run.map_or(true, |last| last < trigger)
    }
}

impl Default for RebalanceSchedule {
    fn default() -> Self {
        Self::weekly(
            0,
            NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            Duration::minutes(90),
        )
    }
}
