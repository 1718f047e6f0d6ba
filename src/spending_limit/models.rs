use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Per-wallet daily cap counter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendingLimit {
    pub wallet_id: i64,
    pub daily_limit: Decimal,
    pub used_today: Decimal,
    /// Reference-calendar date `used_today` belongs to
    pub reset_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SpendingLimit {
    /// Counter as seen on `today`: a row from an earlier day counts as zero
    pub fn used_on(&self, today: NaiveDate) -> Decimal {
        if self.reset_date < today {
            Decimal::ZERO
        } else {
            self.used_today
        }
    }

    /// Quota left on `today`, never negative
    pub fn remaining_on(&self, today: NaiveDate) -> Decimal {
        (self.daily_limit - self.used_on(today)).max(Decimal::ZERO)
    }
}

/// Answer to "may this wallet spend `amount` now"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimitCheck {
    pub allowed: bool,
    pub remaining: Decimal,
    pub daily_limit: Decimal,
    pub used_today: Decimal,
}
