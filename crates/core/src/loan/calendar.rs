//! Due-date arithmetic: skip rules and per-mode advance.
//!
//! All dates here are local calendar dates in the loan account currency's
//! timezone.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc, Weekday};
use coopbank_shared::types::{Currency, HolidayId, Scope};
use serde::{Deserialize, Serialize};

use super::error::ScheduleError;
use super::types::{Exclusions, ModeOfPayment, PaymentCalendar};

/// Longest run of excluded days tolerated before giving up.
const MAX_SKIP_DAYS: u32 = 366;

/// A non-business day for one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    /// Identifier.
    pub id: HolidayId,
    /// Organization and branch.
    pub scope: Scope,
    /// Currency whose calendar this holiday belongs to.
    pub currency_code: String,
    /// The holiday, as an instant inside the local day.
    pub entry_date: DateTime<Utc>,
    /// Display name.
    pub name: String,
}

/// Holidays of one currency, keyed by local date.
#[derive(Debug, Clone, Default)]
pub struct HolidayCalendar {
    dates: HashSet<NaiveDate>,
}

impl HolidayCalendar {
    /// Collects the holidays of `currency`, converting each to its local date.
    #[must_use]
    pub fn new(holidays: &[Holiday], currency: &Currency) -> Self {
        let dates = holidays
            .iter()
            .filter(|h| h.currency_code == currency.code)
            .map(|h| currency.local_date(h.entry_date))
            .collect();
        Self { dates }
    }

    /// True when `date` is a listed holiday.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }
}

fn is_excluded(date: NaiveDate, exclusions: Exclusions, holidays: &HolidayCalendar) -> bool {
    match date.weekday() {
        Weekday::Sat if exclusions.saturday => true,
        Weekday::Sun if exclusions.sunday => true,
        _ => exclusions.holidays && holidays.contains(date),
    }
}

/// Number of consecutive excluded days starting at `date`.
///
/// Zero when `date` itself is a business day.
///
/// # Errors
///
/// Returns `ScheduleError::NoBusinessDay` when no business day follows
/// within a year.
pub fn skipped_days(
    date: NaiveDate,
    exclusions: Exclusions,
    holidays: &HolidayCalendar,
) -> Result<u32, ScheduleError> {
    let mut skipped = 0;
    let mut current = date;
    while is_excluded(current, exclusions, holidays) {
        skipped += 1;
        if skipped > MAX_SKIP_DAYS {
            return Err(ScheduleError::NoBusinessDay(date));
        }
        current = current.succ_opt().ok_or(ScheduleError::DateOutOfRange)?;
    }
    Ok(skipped)
}

/// The next occurrence of `weekday` strictly after `date`.
fn next_weekday(date: NaiveDate, weekday: Weekday) -> Option<NaiveDate> {
    let from = date.weekday().num_days_from_sunday();
    let to = weekday.num_days_from_sunday();
    let ahead = (to + 7 - from) % 7;
    let ahead = if ahead == 0 { 7 } else { ahead };
    date.checked_add_days(Days::new(u64::from(ahead)))
}

/// `day` of the given month, clamped to the month's length.
fn clamped_day(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let day = day.max(1);
    (1..=day)
        .rev()
        .find_map(|d| NaiveDate::from_ymd_opt(year, month, d))
}

fn semi_monthly_next(date: NaiveDate, calendar: PaymentCalendar) -> Option<NaiveDate> {
    let (pay1, pay2) = if calendar.semi_monthly_pay1 <= calendar.semi_monthly_pay2 {
        (calendar.semi_monthly_pay1, calendar.semi_monthly_pay2)
    } else {
        (calendar.semi_monthly_pay2, calendar.semi_monthly_pay1)
    };
    let day = date.day();
    if day < pay1 {
        clamped_day(date.year(), date.month(), pay1)
    } else if day < pay2 {
        let candidate = clamped_day(date.year(), date.month(), pay2)?;
        // pay2 past the month end clamps to the last day, which may be today
        if candidate > date {
            Some(candidate)
        } else {
            let next = date.checked_add_months(Months::new(1))?;
            clamped_day(next.year(), next.month(), pay1)
        }
    } else {
        let next = date.with_day(1)?.checked_add_months(Months::new(1))?;
        clamped_day(next.year(), next.month(), pay1)
    }
}

/// The nominal due date following `date`.
///
/// `anchor_day` is the day of month the schedule started on; exact-day
/// monthly loans return to it after short months.
///
/// # Errors
///
/// Returns `ScheduleError::DateOutOfRange` on calendar overflow.
pub fn advance(
    date: NaiveDate,
    mode: ModeOfPayment,
    calendar: PaymentCalendar,
    anchor_day: u32,
) -> Result<NaiveDate, ScheduleError> {
    let next = match mode {
        ModeOfPayment::Daily | ModeOfPayment::FixedDays => date.succ_opt(),
        ModeOfPayment::Weekly => next_weekday(date, calendar.weekly_day),
        ModeOfPayment::SemiMonthly => semi_monthly_next(date, calendar),
        ModeOfPayment::Monthly if calendar.monthly_exact_day => date
            .with_day(1)
            .and_then(|d| d.checked_add_months(Months::new(1)))
            .and_then(|d| clamped_day(d.year(), d.month(), anchor_day)),
        ModeOfPayment::Monthly => date.checked_add_days(Days::new(30)),
        ModeOfPayment::Quarterly => date.checked_add_months(Months::new(3)),
        ModeOfPayment::SemiAnnual => date.checked_add_months(Months::new(6)),
        ModeOfPayment::Lumpsum => Some(date),
    };
    next.ok_or(ScheduleError::DateOutOfRange)
}
