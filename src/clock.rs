//! Time source for the ledger
//!
//! All "today" decisions use one reference calendar (a fixed UTC offset),
//! never the caller's local time.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn offset(&self) -> FixedOffset;

    /// Calendar date in the reference timezone
    fn today(&self) -> NaiveDate {
        self.now().with_timezone(&self.offset()).date_naive()
    }
}

/// Wall clock with a fixed reference offset
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn utc() -> Self {
        Self {
            offset: utc_offset(),
        }
    }

    /// Out-of-range offsets fall back to UTC; config validation rejects them earlier.
    pub fn with_offset_minutes(minutes: i32) -> Self {
        Self {
            offset: FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(utc_offset),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    offset: FixedOffset,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
            offset: utc_offset(),
        }
    }

    pub fn with_offset_minutes(start: DateTime<Utc>, minutes: i32) -> Self {
        Self {
            now: Mutex::new(start),
            offset: FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(utc_offset),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_today_uses_reference_offset() {
        // 2026-03-01 20:00 UTC is already 2026-03-02 in UTC+8
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
        let utc = ManualClock::new(start);
        let shanghai = ManualClock::with_offset_minutes(start, 8 * 60);

        assert_eq!(utc.today(), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        assert_eq!(shanghai.today(), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
    }

    #[test]
    fn test_manual_clock_advance() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 23, 59, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(Duration::minutes(2));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
    }
}
