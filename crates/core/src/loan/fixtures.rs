//! Shared loan fixtures for unit tests.

use chrono::{TimeZone, Utc};
use coopbank_shared::types::{
    AccountId, AutomaticLoanDeductionId, BranchId, ComputationSheetId, Currency, LoanTransactionId,
    MemberProfileId, OrganizationId, Scope,
};
use rust_decimal::Decimal;

use super::types::{
    AutomaticLoanDeduction, Exclusions, LoanTransaction, LoanType, ModeOfPayment, PaymentCalendar,
};
use crate::account::{AccountRules, AccountSnapshot, AccountType};

pub fn scope() -> Scope {
    Scope::new(OrganizationId::new(), BranchId::new())
}

pub fn php() -> Currency {
    Currency::new("PHP", chrono_tz::Asia::Manila)
}

/// A printed, unreleased standard loan. Printed 2026-01-05 09:00 Manila time.
pub fn sample_loan(applied: Decimal, mode: ModeOfPayment, terms: u32) -> LoanTransaction {
    let printed = Utc.with_ymd_and_hms(2026, 1, 5, 1, 0, 0).unwrap();
    LoanTransaction {
        id: LoanTransactionId::new(),
        scope: scope(),
        member_profile_id: MemberProfileId::new(),
        account_id: AccountId::new(),
        voucher: "LV-0001".to_string(),
        loan_type: LoanType::Standard,
        previous_loan_id: None,
        applied,
        is_add_on: false,
        mode_of_payment: mode,
        terms,
        calendar: PaymentCalendar::default(),
        exclusions: Exclusions::default(),
        printed_date: Some(printed),
        released_date: None,
        released_by: None,
        transaction_batch_id: None,
        count: 0,
        processing: false,
        total_debit: Decimal::ZERO,
        total_credit: Decimal::ZERO,
        total_principal: Decimal::ZERO,
        balance: Decimal::ZERO,
        amortization: Decimal::ZERO,
        created_at: printed,
        updated_at: printed,
    }
}

pub fn snapshot(scope: Scope, account_id: AccountId, rules: AccountRules) -> AccountSnapshot {
    AccountSnapshot {
        account_id,
        scope,
        history_id: None,
        name: format!("{:?}", rules.account_type),
        currency: php(),
        rules,
    }
}

pub fn rules(account_type: AccountType) -> AccountRules {
    AccountRules::new(account_type)
}

pub fn deduction_rule(scope: Scope) -> AutomaticLoanDeduction {
    AutomaticLoanDeduction {
        id: AutomaticLoanDeductionId::new(),
        scope,
        computation_sheet_id: ComputationSheetId::new(),
        account_id: AccountId::new(),
        name: "Service Fee".to_string(),
        charges_percentage_1: Decimal::ZERO,
        charges_percentage_2: Decimal::ZERO,
        charges_amount: Decimal::ZERO,
        charges_divisor: Decimal::ZERO,
        min_amount: Decimal::ZERO,
        max_amount: Decimal::ZERO,
        anum: false,
        number_of_months: 0,
        add_on: false,
    }
}
