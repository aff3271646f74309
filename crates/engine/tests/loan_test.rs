//! Loan lifecycle tests: balancing, schedule, release and processing.

mod common;

use chrono::{TimeZone, Utc};
use coopbank_core::account::{Account, AccountRules, AccountType};
use coopbank_core::ledger::{LedgerSource, PostingError};
use coopbank_core::loan::{
    Exclusions, LoanAccount, LoanEntryKind, LoanError, LoanTransaction, LoanTransactionEntry,
    LoanType, ModeOfPayment, PaymentCalendar,
};
use coopbank_core::member::MemberProfile;
use coopbank_db::Query;
use coopbank_engine::services::{BulkEvent, BulkSummary};
use coopbank_engine::{EngineError, RequestContext};
use coopbank_shared::types::LoanTransactionId;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::broadcast::error::TryRecvError;

use common::{harness, harness_with, settings, start, Harness};

struct Accounts {
    loan: Account,
    interest: Account,
    cash: Account,
}

async fn accounts(h: &Harness, loan_rules: AccountRules) -> Accounts {
    let loan = h.account("Loan Receivable", loan_rules).await;
    let mut interest = AccountRules::new(AccountType::Interest);
    interest.interest_standard = dec!(2);
    interest.loan_account_id = Some(loan.id);
    let interest = h.account("Interest Income", interest).await;
    let mut cash = AccountRules::new(AccountType::Other);
    cash.cash_and_cash_equivalence = true;
    let cash = h.account("Cash on Hand", cash).await;
    Accounts {
        loan,
        interest,
        cash,
    }
}

async fn standard_accounts(h: &Harness) -> Accounts {
    accounts(h, AccountRules::new(AccountType::Loan)).await
}

fn application(h: &Harness, loan_account: &Account, member: &MemberProfile) -> LoanTransaction {
    LoanTransaction {
        id: LoanTransactionId::new(),
        scope: h.scope(),
        member_profile_id: member.id,
        account_id: loan_account.id,
        voucher: "LV-0001".to_string(),
        loan_type: LoanType::Standard,
        previous_loan_id: None,
        applied: dec!(12000),
        is_add_on: false,
        mode_of_payment: ModeOfPayment::Monthly,
        terms: 12,
        calendar: PaymentCalendar::default(),
        exclusions: Exclusions::default(),
        printed_date: None,
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
        created_at: start(),
        updated_at: start(),
    }
}

/// Creates, prints and releases a loan for a new member.
async fn released_loan(h: &Harness, accounts: &Accounts, name: &str) -> LoanTransaction {
    let member = h.member(name).await;
    let loans = h.engine.loans();
    let loan = loans
        .create(&h.ctx, application(h, &accounts.loan, &member))
        .await
        .unwrap();
    loans.print(&h.ctx, loan.id).await.unwrap();
    loans
        .release(&h.ctx, loan.id, Some(accounts.cash.id))
        .await
        .unwrap()
}

/// Two months and two days after the print date, in Manila.
fn march_7(h: &Harness) -> RequestContext {
    h.ctx
        .clone()
        .at(Utc.with_ymd_and_hms(2026, 3, 7, 1, 0, 0).unwrap())
}

#[tokio::test]
async fn test_monthly_straight_schedule_of_a_printed_loan() {
    let h = harness();
    let accounts = standard_accounts(&h).await;
    let member = h.member("Ana Cruz").await;
    let loans = h.engine.loans();
    let loan = loans
        .create(&h.ctx, application(&h, &accounts.loan, &member))
        .await
        .unwrap();

    let err = loans.schedule(&h.ctx, loan.id).await.unwrap_err();
    assert!(matches!(err.root(), EngineError::Schedule(_)));

    loans.print(&h.ctx, loan.id).await.unwrap();
    let schedule = loans.schedule(&h.ctx, loan.id).await.unwrap();

    assert_eq!(schedule.len(), 13);
    assert_eq!(schedule[0].balance, dec!(12000));
    for period in &schedule[1..] {
        assert_eq!(period.value_of(accounts.loan.id), dec!(1000.00));
    }
    assert_eq!(schedule[1].value_of(accounts.interest.id), dec!(240.00));
    assert_eq!(schedule[12].balance, Decimal::ZERO);
}

#[tokio::test]
async fn test_balancing_nets_deductions_from_the_cash_leg() {
    let h = harness();
    let accounts = standard_accounts(&h).await;
    let share_capital = h.savings_account().await;
    let member = h.member("Ana Cruz").await;
    let loans = h.engine.loans();
    let loan = loans
        .create(&h.ctx, application(&h, &accounts.loan, &member))
        .await
        .unwrap();

    let mut deduction = LoanTransactionEntry::new(&loan, LoanEntryKind::Deduction, "Share Capital");
    deduction.account_id = Some(share_capital.id);
    deduction.credit = dec!(500);
    loans.add_entry(&h.ctx, deduction).await.unwrap();

    let (balanced, entries) = loans
        .balance(&h.ctx, loan.id, Some(accounts.cash.id))
        .await
        .unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].account_id, Some(accounts.cash.id));
    assert_eq!(entries[0].credit, dec!(11500));
    assert_eq!(entries[1].debit, dec!(12000));
    assert_eq!(balanced.total_debit, dec!(12000));
    assert_eq!(balanced.total_credit, dec!(12000));
    assert_eq!(balanced.amortization, dec!(1000));

    // Balancing again replaces the legs instead of stacking them.
    let (_, again) = loans.balance(&h.ctx, loan.id, None).await.unwrap();
    assert_eq!(again.len(), 3);
    let stored = h
        .find(Query::<LoanTransactionEntry>::in_scope(h.scope()).within(loan.id))
        .await;
    assert_eq!(stored.len(), 3);
}

#[tokio::test]
async fn test_release_posts_every_leg_and_pins_accounts() {
    let h = harness();
    let accounts = standard_accounts(&h).await;
    let batch = h.open_batch().await;

    let loan = released_loan(&h, &accounts, "Ana Cruz").await;

    assert_eq!(loan.released_date, Some(start()));
    assert_eq!(loan.released_by, Some(h.ctx.actor));
    assert_eq!(loan.transaction_batch_id, Some(batch.id));
    assert_eq!(loan.balance, dec!(12000));

    let ledger = h.engine.ledger();
    let loan_chain = ledger
        .entries(&h.ctx, accounts.loan.id, Some(loan.member_profile_id))
        .await
        .unwrap();
    assert_eq!(loan_chain.len(), 1);
    assert_eq!(loan_chain[0].source, LedgerSource::Loan);
    assert_eq!(loan_chain[0].balance, dec!(12000));
    assert_eq!(loan_chain[0].loan_transaction_id, Some(loan.id));
    let cash_chain = ledger.entries(&h.ctx, accounts.cash.id, None).await.unwrap();
    assert_eq!(cash_chain.len(), 1);
    assert_eq!(cash_chain[0].credit, dec!(12000));

    let pinned = h
        .find(Query::<LoanAccount>::in_scope(h.scope()).within(loan.id))
        .await;
    assert_eq!(pinned.len(), 2);
    let principal = pinned.iter().find(|a| a.account_id == accounts.loan.id).unwrap();
    assert_eq!(principal.amount, dec!(12000));
    let interest = pinned.iter().find(|a| a.account_id == accounts.interest.id).unwrap();
    assert_eq!(interest.amount, Decimal::ZERO);

    let err = h
        .engine
        .loans()
        .release(&h.ctx, loan.id, Some(accounts.cash.id))
        .await
        .unwrap_err();
    assert!(matches!(err.root(), EngineError::Loan(LoanError::AlreadyReleased(_))));
}

#[tokio::test]
async fn test_failed_release_leaves_nothing_behind() {
    let h = harness();
    let mut capped = AccountRules::new(AccountType::Loan);
    capped.max_amount = dec!(100);
    let accounts = accounts(&h, capped).await;
    let member = h.member("Ana Cruz").await;
    h.open_batch().await;
    let loans = h.engine.loans();
    let loan = loans
        .create(&h.ctx, application(&h, &accounts.loan, &member))
        .await
        .unwrap();
    loans.print(&h.ctx, loan.id).await.unwrap();
    let mut events = h.engine.subscribe();

    // The cash leg posts, then the loan leg breaks the cap.
    let err = loans
        .release(&h.ctx, loan.id, Some(accounts.cash.id))
        .await
        .unwrap_err();
    assert!(matches!(
        err.root(),
        EngineError::Posting(PostingError::LimitExceeded { .. })
    ));

    let stored: LoanTransaction = h.load(loan.id).await;
    assert!(stored.released_date.is_none());
    assert_eq!(stored.total_credit, Decimal::ZERO);
    let ledger = h.engine.ledger();
    assert!(ledger.entries(&h.ctx, accounts.cash.id, None).await.unwrap().is_empty());
    assert!(h
        .find(Query::<LoanTransactionEntry>::in_scope(h.scope()).within(loan.id))
        .await
        .is_empty());
    assert!(h
        .find(Query::<LoanAccount>::in_scope(h.scope()).within(loan.id))
        .await
        .is_empty());
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_release_needs_a_printed_loan_and_an_open_batch() {
    let h = harness();
    let accounts = standard_accounts(&h).await;
    let member = h.member("Ana Cruz").await;
    let loans = h.engine.loans();
    let loan = loans
        .create(&h.ctx, application(&h, &accounts.loan, &member))
        .await
        .unwrap();

    let err = loans
        .release(&h.ctx, loan.id, Some(accounts.cash.id))
        .await
        .unwrap_err();
    assert!(matches!(err.root(), EngineError::Loan(LoanError::NotPrinted(_))));

    loans.print(&h.ctx, loan.id).await.unwrap();
    let err = loans
        .release(&h.ctx, loan.id, Some(accounts.cash.id))
        .await
        .unwrap_err();
    assert!(matches!(err.root(), EngineError::NoOpenBatch));
}

#[tokio::test]
async fn test_processing_accrues_elapsed_periods_once() {
    let h = harness();
    let accounts = standard_accounts(&h).await;
    h.open_batch().await;
    let loan = released_loan(&h, &accounts, "Ana Cruz").await;
    let ctx = march_7(&h);
    let processor = h.engine.processor();

    let summary = processor.process(&ctx, loan.id).await.unwrap();
    assert_eq!(summary.previous_count, 0);
    assert_eq!(summary.new_count, 3);
    assert_eq!(summary.posted, 2);
    assert_eq!(summary.member_name, "Ana Cruz");

    let interest = h
        .engine
        .ledger()
        .entries(&ctx, accounts.interest.id, Some(loan.member_profile_id))
        .await
        .unwrap();
    assert_eq!(interest.len(), 2);
    assert!(interest.iter().all(|e| e.credit == dec!(240.00)));
    assert_eq!(interest[1].balance, dec!(480.00));

    let again = processor.process(&ctx, loan.id).await.unwrap();
    assert_eq!(again.previous_count, 3);
    assert_eq!(again.new_count, 3);
    assert_eq!(again.posted, 0);

    let stored: LoanTransaction = h.load(loan.id).await;
    assert_eq!(stored.count, 3);
    assert!(!stored.processing);
    let pinned = h
        .find(Query::<LoanAccount>::in_scope(h.scope()).within(loan.id))
        .await;
    let accrued = pinned.iter().find(|a| a.account_id == accounts.interest.id).unwrap();
    assert_eq!(accrued.amount, dec!(480.00));
}

#[tokio::test]
async fn test_released_schedule_keeps_the_pinned_rates() {
    let h = harness();
    let accounts = standard_accounts(&h).await;
    h.open_batch().await;
    let loan = released_loan(&h, &accounts, "Ana Cruz").await;

    let mut raised = accounts.interest.rules.clone();
    raised.interest_standard = dec!(5);
    h.engine
        .accounts()
        .update_rules(&h.ctx, accounts.interest.id, raised)
        .await
        .unwrap();

    let schedule = h.engine.loans().schedule(&h.ctx, loan.id).await.unwrap();
    assert_eq!(schedule[1].value_of(accounts.interest.id), dec!(240.00));
    assert_eq!(schedule[12].value_of(accounts.loan.id), dec!(1000.00));
}

#[tokio::test]
async fn test_release_and_accruals_carry_the_default_payment_type() {
    let h = harness();
    let cash_type = h.payment_type().await;
    let mut loan_rules = AccountRules::new(AccountType::Loan);
    loan_rules.default_payment_type_id = Some(cash_type.id);
    let loan_account = h.account("Loan Receivable", loan_rules).await;
    let mut interest = AccountRules::new(AccountType::Interest);
    interest.interest_standard = dec!(2);
    interest.loan_account_id = Some(loan_account.id);
    interest.default_payment_type_id = Some(cash_type.id);
    let interest = h.account("Interest Income", interest).await;
    let mut cash = AccountRules::new(AccountType::Other);
    cash.cash_and_cash_equivalence = true;
    let cash = h.account("Cash on Hand", cash).await;
    let accounts = Accounts {
        loan: loan_account,
        interest,
        cash,
    };
    h.open_batch().await;

    let loan = released_loan(&h, &accounts, "Ana Cruz").await;
    let ledger = h.engine.ledger();
    let loan_chain = ledger
        .entries(&h.ctx, accounts.loan.id, Some(loan.member_profile_id))
        .await
        .unwrap();
    assert_eq!(loan_chain[0].payment_type_id, Some(cash_type.id));
    let cash_chain = ledger.entries(&h.ctx, accounts.cash.id, None).await.unwrap();
    assert_eq!(cash_chain[0].payment_type_id, None);

    let ctx = march_7(&h);
    h.engine.processor().process(&ctx, loan.id).await.unwrap();
    let accruals = ledger
        .entries(&ctx, accounts.interest.id, Some(loan.member_profile_id))
        .await
        .unwrap();
    assert_eq!(accruals.len(), 2);
    assert!(accruals.iter().all(|e| e.payment_type_id == Some(cash_type.id)));
}

#[tokio::test]
async fn test_claimed_or_unreleased_loans_are_not_processed() {
    let h = harness();
    let accounts = standard_accounts(&h).await;
    let member = h.member("Ben Reyes").await;
    h.open_batch().await;
    let processor = h.engine.processor();

    let pending = h
        .engine
        .loans()
        .create(&h.ctx, application(&h, &accounts.loan, &member))
        .await
        .unwrap();
    let err = processor.process(&h.ctx, pending.id).await.unwrap_err();
    assert!(matches!(err.root(), EngineError::Loan(LoanError::NotReleased(_))));

    let loan = released_loan(&h, &accounts, "Ana Cruz").await;
    let mut claimed: LoanTransaction = h.load(loan.id).await;
    claimed.processing = true;
    {
        use coopbank_db::{Crud, Store, UnitOfWork};
        let mut tx = h.engine.store().begin().await.unwrap();
        tx.update(&claimed).await.unwrap();
        tx.commit().await.unwrap();
    }

    let err = processor.process(&march_7(&h), loan.id).await.unwrap_err();
    assert!(matches!(err.root(), EngineError::Loan(LoanError::AlreadyProcessing(_))));
    let stored: LoanTransaction = h.load(loan.id).await;
    assert_eq!(stored.count, 0);
}

async fn drain(run: &mut coopbank_engine::services::BulkRun) -> (usize, Option<BulkSummary>) {
    let mut progress = 0;
    loop {
        match run.progress.recv().await {
            Ok(BulkEvent::Progress(_)) => progress += 1,
            Ok(BulkEvent::Completed(summary)) => return (progress, Some(summary)),
            Err(_) => return (progress, None),
        }
    }
}

#[tokio::test]
async fn test_bulk_run_processes_every_released_loan() {
    let h = harness();
    let accounts = standard_accounts(&h).await;
    h.open_batch().await;
    let mut loans = Vec::new();
    for name in ["Ana Cruz", "Ben Reyes", "Carla Santos"] {
        loans.push(released_loan(&h, &accounts, name).await);
    }
    let ctx = march_7(&h);
    let processor = h.engine.processor();

    let mut run = processor.process_all(&ctx).await.unwrap();
    assert_eq!(run.total, 3);

    // Every loan is claimed, so a second run finds nothing.
    let mut second = processor.process_all(&ctx).await.unwrap();
    assert_eq!(second.total, 0);

    let (progress, completed) = drain(&mut run).await;
    assert_eq!(progress, 3);
    let completed = completed.unwrap();
    assert_eq!(completed.total_processed, 3);
    assert_eq!(completed.failed, 0);
    assert!(!completed.timed_out);
    assert_eq!(completed.branch_id, h.scope().branch_id);

    let summary = run.wait().await.unwrap();
    assert_eq!(summary, completed);
    let (_, empty) = drain(&mut second).await;
    assert_eq!(empty.unwrap().total_processed, 0);

    for loan in loans {
        let stored: LoanTransaction = h.load(loan.id).await;
        assert_eq!(stored.count, 3);
        assert!(!stored.processing);
    }
}

#[tokio::test]
async fn test_bulk_run_stops_at_its_deadline_and_clears_claims() {
    let h = harness_with(coopbank_engine::EngineSettings {
        per_loan_delay: std::time::Duration::from_millis(200),
        batch_timeout: std::time::Duration::from_millis(50),
        ..settings()
    });
    let accounts = standard_accounts(&h).await;
    h.open_batch().await;
    let mut loans = Vec::new();
    for name in ["Ana Cruz", "Ben Reyes", "Carla Santos"] {
        loans.push(released_loan(&h, &accounts, name).await);
    }

    let run = h.engine.processor().process_all(&march_7(&h)).await.unwrap();
    let summary = run.wait().await.unwrap();

    assert!(summary.timed_out);
    assert!(summary.total_processed < 3);
    for loan in loans {
        let stored: LoanTransaction = h.load(loan.id).await;
        assert!(!stored.processing);
    }
}
