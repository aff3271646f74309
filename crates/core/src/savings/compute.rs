//! Interest generation for one member ledger and the post plan of a run.
//!
//! Generation is pure: it reads daily ending balances and the account's
//! rate scheme and returns a provisional entry. Ledger writes happen only
//! when a printed run is posted.

use chrono::{Datelike, NaiveDate};
use coopbank_shared::types::{AccountId, GeneratedSavingsInterestEntryId, MemberTypeId, round_money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::SavingsError;
use super::types::{
    BrowseReference, GeneratedSavingsInterest, GeneratedSavingsInterestEntry, InterestType,
    SavingsComputationType,
};
use crate::account::Account;
use crate::ledger::{DailyBalance, EntryDirection, GeneralLedgerEntry, daily_ending_balances};
use crate::lifecycle::PostLeg;
use crate::member::{MemberProfile, MemberTypeHistory, active_type_history};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Run-wide parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavingsParams {
    /// Interest base.
    pub computation_type: SavingsComputationType,
    /// Withholding tax in percent.
    pub interest_tax_rate: Decimal,
    /// Days per year used to prorate annual rates.
    pub annual_divisor: Decimal,
}

impl SavingsParams {
    /// Parameters of `run` under the branch's annual divisor.
    ///
    /// # Errors
    ///
    /// Returns `SavingsError` for an empty window, a non-positive divisor,
    /// a tax rate outside 0..=100 or an unsupported computation type.
    pub fn for_run(
        run: &GeneratedSavingsInterest,
        annual_divisor: Decimal,
    ) -> Result<Self, SavingsError> {
        if run.new_computation_date <= run.last_computation_date {
            return Err(SavingsError::InvalidWindow {
                from: run.last_computation_date,
                to: run.new_computation_date,
            });
        }
        if annual_divisor <= Decimal::ZERO {
            return Err(SavingsError::InvalidDivisor(annual_divisor));
        }
        if run.interest_tax_rate < Decimal::ZERO || run.interest_tax_rate > HUNDRED {
            return Err(SavingsError::InvalidTaxRate(run.interest_tax_rate));
        }
        ensure_supported(run.computation_type)?;
        Ok(Self {
            computation_type: run.computation_type,
            interest_tax_rate: run.interest_tax_rate,
            annual_divisor,
        })
    }
}

/// Everything known about one member's savings ledger.
#[derive(Debug, Clone, Copy)]
pub struct MemberLedger<'a> {
    /// The member.
    pub member: &'a MemberProfile,
    /// The savings account.
    pub account: &'a Account,
    /// The member's chain on that account.
    pub entries: &'a [GeneralLedgerEntry],
    /// The member's type history.
    pub histories: &'a [MemberTypeHistory],
}

/// Interest, tax and projected balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestResult {
    /// Gross interest.
    pub interest: Decimal,
    /// Withholding tax.
    pub tax: Decimal,
    /// Last balance plus interest less tax.
    pub ending_balance: Decimal,
}

fn ensure_supported(kind: SavingsComputationType) -> Result<(), SavingsError> {
    match kind {
        SavingsComputationType::DailyLowestBalance
        | SavingsComputationType::AverageDailyBalance
        | SavingsComputationType::MonthlyEndBalanceTotal => Ok(()),
        SavingsComputationType::MonthlyEndLowestBalance
        | SavingsComputationType::AdbEndBalance
        | SavingsComputationType::MonthlyLowestBalanceAverage
        | SavingsComputationType::MonthlyEndBalanceAverage => {
            Err(SavingsError::UnsupportedComputation(kind))
        }
    }
}

/// The rate scheme for a member: the one for their member type, else the
/// account-wide one.
#[must_use]
pub fn select_reference(
    references: &[BrowseReference],
    account_id: AccountId,
    member_type_id: Option<MemberTypeId>,
) -> Option<&BrowseReference> {
    let on_account = || references.iter().filter(move |r| r.account_id == account_id);
    member_type_id
        .and_then(|t| on_account().find(|r| r.member_type_id == Some(t)))
        .or_else(|| on_account().find(|r| r.member_type_id.is_none()))
}

/// Local date the member took the member type the scheme is keyed on.
fn type_start(reference: &BrowseReference, ledger: &MemberLedger<'_>) -> Option<NaiveDate> {
    let member_type_id = reference.member_type_id.or(ledger.member.member_type_id)?;
    let history = active_type_history(ledger.histories, ledger.member.id, member_type_id)?;
    Some(ledger.account.currency.local_date(history.created_at))
}

/// Picks the rate from the scheme's tier table, falling back to the flat rate.
#[must_use]
pub fn resolve_rate(
    reference: &BrowseReference,
    ledger: &MemberLedger<'_>,
    last_balance: Decimal,
) -> Decimal {
    let tiered = match reference.interest_type {
        InterestType::Year => type_start(reference, ledger).and_then(|start| {
            reference
                .year_tiers
                .iter()
                .find(|t| (t.from_year..=t.to_year).contains(&start.year()))
                .map(|t| t.interest_rate)
        }),
        InterestType::Date => type_start(reference, ledger).and_then(|start| {
            reference
                .date_tiers
                .iter()
                .find(|t| (t.from_date..=t.to_date).contains(&start))
                .map(|t| t.interest_rate)
        }),
        InterestType::Amount => reference
            .amount_tiers
            .iter()
            .find(|t| (t.from_amount..=t.to_amount).contains(&last_balance))
            .map(|t| t.interest_rate),
    };
    tiered.unwrap_or(reference.interest_rate)
}

/// Balance-days the rate applies to: the base balance times the days it
/// is held for.
fn balance_days(
    daily: &[DailyBalance],
    kind: SavingsComputationType,
) -> Result<Decimal, SavingsError> {
    let days = Decimal::from(daily.len());
    let weighted = match kind {
        SavingsComputationType::DailyLowestBalance => {
            daily.iter().map(|d| d.balance).min().unwrap_or_default() * days
        }
        // The average times the day count is the plain sum.
        SavingsComputationType::AverageDailyBalance => daily.iter().map(|d| d.balance).sum(),
        SavingsComputationType::MonthlyEndBalanceTotal => {
            let mut total = Decimal::ZERO;
            let mut month: Option<(i32, u32)> = None;
            let mut month_days = 0u32;
            let mut month_end = Decimal::ZERO;
            for day in daily {
                let key = (day.date.year(), day.date.month());
                if month.is_some_and(|m| m != key) {
                    total += month_end * Decimal::from(month_days);
                    month_days = 0;
                }
                month = Some(key);
                month_days += 1;
                month_end = day.balance;
            }
            total + month_end * Decimal::from(month_days)
        }
        kind @ (SavingsComputationType::MonthlyEndLowestBalance
        | SavingsComputationType::AdbEndBalance
        | SavingsComputationType::MonthlyLowestBalanceAverage
        | SavingsComputationType::MonthlyEndBalanceAverage) => {
            return Err(SavingsError::UnsupportedComputation(kind));
        }
    };
    Ok(weighted.max(Decimal::ZERO))
}

/// Interest and tax over a window of daily balances.
///
/// A negative base earns nothing. Non-taxable accounts never withhold.
///
/// # Errors
///
/// Returns `SavingsError::UnsupportedComputation` for computation types
/// without a formula.
pub fn compute_interest(
    daily: &[DailyBalance],
    rate: Decimal,
    params: &SavingsParams,
    taxable: bool,
) -> Result<InterestResult, SavingsError> {
    let last = daily.last().map(|d| d.balance).unwrap_or_default();
    let weighted = balance_days(daily, params.computation_type)?;
    let interest = round_money(weighted * rate / HUNDRED / params.annual_divisor);
    let tax = if taxable {
        round_money(interest * params.interest_tax_rate / HUNDRED)
    } else {
        Decimal::ZERO
    };
    Ok(InterestResult {
        interest,
        tax,
        ending_balance: last + interest - tax,
    })
}

/// Builds the provisional entry for one member ledger.
///
/// Returns `None` when the ledger has no balance in the window, ends at
/// zero, or sits below the scheme minimum with no charge configured. Below
/// the minimum with a charge, the entry carries the charge as negative
/// interest.
///
/// # Errors
///
/// Propagates [`compute_interest`] errors.
pub fn generate_entry(
    run: &GeneratedSavingsInterest,
    reference: &BrowseReference,
    ledger: MemberLedger<'_>,
    params: &SavingsParams,
) -> Result<Option<GeneratedSavingsInterestEntry>, SavingsError> {
    let currency = &ledger.account.currency;
    let first_day = currency.local_date(run.last_computation_date);
    let Some(last_day) = currency.local_date(run.new_computation_date).pred_opt() else {
        return Ok(None);
    };
    if last_day < first_day {
        return Ok(None);
    }
    let daily = daily_ending_balances(
        ledger.entries,
        currency,
        run.last_computation_date,
        currency.end_of_day(last_day),
    );
    let Some(last_balance) = daily.last().map(|d| d.balance) else {
        return Ok(None);
    };
    if last_balance.is_zero() {
        return Ok(None);
    }

    let result = if last_balance < reference.minimum_balance {
        if reference.charges.is_zero() {
            return Ok(None);
        }
        InterestResult {
            interest: -reference.charges,
            tax: Decimal::ZERO,
            ending_balance: last_balance - reference.charges,
        }
    } else {
        let rate = resolve_rate(reference, &ledger, last_balance);
        compute_interest(&daily, rate, params, ledger.account.rules.taxable)?
    };

    Ok(Some(GeneratedSavingsInterestEntry {
        id: GeneratedSavingsInterestEntryId::new(),
        scope: run.scope,
        generated_savings_interest_id: run.id,
        member_profile_id: ledger.member.id,
        account_id: ledger.account.id,
        interest_amount: result.interest,
        interest_tax: result.tax,
        ending_balance: result.ending_balance,
    }))
}

/// Applies a manual interest and tax override, re-projecting the balance.
pub fn override_entry(
    entry: &mut GeneratedSavingsInterestEntry,
    interest: Decimal,
    tax: Decimal,
    last_balance: Decimal,
) {
    entry.interest_amount = round_money(interest);
    entry.interest_tax = round_money(tax);
    entry.ending_balance = last_balance + entry.interest_amount - entry.interest_tax;
}

/// Run totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingsTotals {
    /// Sum of gross interest.
    pub total_interest: Decimal,
    /// Sum of tax.
    pub total_tax: Decimal,
}

impl SavingsTotals {
    /// Sums `entries`.
    #[must_use]
    pub fn of(entries: &[GeneratedSavingsInterestEntry]) -> Self {
        entries.iter().fold(Self::default(), |acc, e| Self {
            total_interest: acc.total_interest + e.interest_amount,
            total_tax: acc.total_tax + e.interest_tax,
        })
    }

    /// Stamps the totals on the run.
    pub fn apply(&self, run: &mut GeneratedSavingsInterest) {
        run.total_interest = self.total_interest;
        run.total_tax = self.total_tax;
    }
}

/// Ledger legs for posting a run.
///
/// Each entry posts its net-of-tax amount to the member ledger, as a
/// credit for interest and a debit for charges. With `post_account_id`
/// every member leg is followed by the opposite leg on that account.
#[must_use]
pub fn plan_post(
    entries: &[GeneratedSavingsInterestEntry],
    post_account_id: Option<AccountId>,
) -> Vec<PostLeg> {
    entries
        .iter()
        .filter(|e| !e.net().is_zero())
        .flat_map(|entry| {
            let net = entry.net();
            let direction = if net.is_sign_positive() {
                EntryDirection::Credit
            } else {
                EntryDirection::Debit
            };
            PostLeg {
                member_profile_id: Some(entry.member_profile_id),
                account_id: entry.account_id,
                direction,
                amount: net.abs(),
            }
            .with_mirror(post_account_id)
        })
        .collect()
}

#[cfg(test)]
#[path = "compute_tests.rs"]
mod tests;
