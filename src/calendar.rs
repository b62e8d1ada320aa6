use chrono::{DateTime, Duration, NaiveDate, Utc};

pub const RANK_CHANGE_WINDOW_DAYS: i64 = 7;
pub const DIGEST_WINDOW_DAYS: i64 = 7;
pub const ACTIVE_USER_WINDOW_DAYS: i64 = 30;
pub const SNAPSHOT_RETENTION_DAYS: i64 = 84;

/// UTC calendar day used to deduplicate snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn of(instant: DateTime<Utc>) -> Self {
        Self(instant.date_naive())
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }
}

impl std::fmt::Display for DayKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

pub fn days_before(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now - Duration::days(days.max(0))
}

pub fn today(now: DateTime<Utc>) -> NaiveDate {
    now.date_naive()
}
