//! Currency with the timezone that defines its business day.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// A currency a branch books in.
///
/// Daily balances and date ranges are cut at local midnight in `timezone`,
/// never at UTC midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    /// ISO 4217 code, e.g. "PHP".
    pub code: String,
    /// IANA timezone for day boundaries.
    pub timezone: Tz,
}

impl Currency {
    /// Creates a currency.
    #[must_use]
    pub fn new(code: impl Into<String>, timezone: Tz) -> Self {
        Self {
            code: code.into(),
            timezone,
        }
    }

    /// The local calendar date of an instant.
    #[must_use]
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.timezone).date_naive()
    }

    /// The UTC instant of local midnight starting `date`.
    ///
    /// On a DST gap the earliest valid local time is used.
    #[must_use]
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        let naive = date.and_time(NaiveTime::MIN);
        match self.timezone.from_local_datetime(&naive) {
            chrono::LocalResult::Single(dt) => dt.with_timezone(&Utc),
            chrono::LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
            chrono::LocalResult::None => Utc.from_utc_datetime(&naive),
        }
    }

    /// The UTC instant of the last nanosecond of local `date`.
    #[must_use]
    pub fn end_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        let next = date.succ_opt().unwrap_or(date);
        self.start_of_day(next) - chrono::Duration::nanoseconds(1)
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code)
    }
}
