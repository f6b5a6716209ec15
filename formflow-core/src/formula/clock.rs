//! Clocks
//!
//! Formulas that ask for "today" and the builder's save timestamps read time
//! through this trait, so tests can pin it.

use std::fmt::Debug;

use chrono::{DateTime, Local, NaiveDate, Utc};

pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// The calendar date formulas see as today.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall-clock time; `today` follows the local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock stopped at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Noon UTC on the given date, or `None` for an impossible date.
    pub fn on_date(year: i32, month: u32, day: u32) -> Option<Self> {
        let at = NaiveDate::from_ymd_opt(year, month, day)?
            .and_hms_opt(12, 0, 0)?
            .and_utc();
        Some(Self(at))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn fixed_clock_reports_its_date() {
        let clock = FixedClock::on_date(2025, 6, 1).unwrap();
        assert_eq!(clock.today().year(), 2025);
        assert_eq!(clock.now().to_rfc3339(), "2025-06-01T12:00:00+00:00");
        assert!(FixedClock::on_date(2025, 2, 30).is_none());
    }
}
