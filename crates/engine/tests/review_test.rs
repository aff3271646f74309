//! Savings interest runs and mutual fund contributions through their
//! generate, print and post cycle.

mod common;

use chrono::{DateTime, TimeZone, Utc};
use coopbank_core::account::{Account, AccountRules, AccountType};
use coopbank_core::ledger::LedgerSource;
use coopbank_core::lifecycle::{LifecycleError, PostRequest, ReviewState};
use coopbank_core::member::MemberProfile;
use coopbank_core::mutual_fund::{MutualFund, MutualFundComputationType, MutualFundError};
use coopbank_core::payment::PaymentSource;
use coopbank_core::savings::{BrowseReference, InterestType, SavingsComputationType};
use coopbank_engine::services::SavingsRunRequest;
use coopbank_engine::{EngineError, ErrorKind};
use coopbank_shared::types::{BrowseReferenceId, MutualFundId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use common::{harness, start, Harness};

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, day, hour, 0, 0).unwrap()
}

fn post_request(post_account: Option<&Account>) -> PostRequest {
    PostRequest {
        check_voucher_number: Some("CV-0042".to_string()),
        post_account_id: post_account.map(|a| a.id),
        entry_date: at(20, 1),
    }
}

/// A savings account earning a flat 3.6% with 20% withholding, and one
/// member holding 10,000 on it since the morning of January 5.
async fn savings_setup(h: &Harness) -> (Account, MemberProfile) {
    let account = h.savings_account().await;
    h.seed(&BrowseReference {
        id: BrowseReferenceId::new(),
        scope: h.scope(),
        name: "Regular savings".to_string(),
        account_id: account.id,
        member_type_id: None,
        interest_rate: dec!(3.6),
        minimum_balance: Decimal::ZERO,
        charges: Decimal::ZERO,
        interest_type: InterestType::Amount,
        year_tiers: Vec::new(),
        date_tiers: Vec::new(),
        amount_tiers: Vec::new(),
    })
    .await;
    let member = h.member("Ana Cruz").await;
    let cash = h.payment_type().await;
    h.open_batch().await;
    h.pay(&account, &cash, &member, dec!(10000), PaymentSource::Deposit)
        .await;
    (account, member)
}

fn run_request(account: &Account) -> SavingsRunRequest {
    SavingsRunRequest {
        document_no: "SI-2026-01".to_string(),
        // January 6 through January 15 in Manila.
        last_computation_date: at(5, 16),
        new_computation_date: at(15, 16),
        account_id: Some(account.id),
        member_type_id: None,
        computation_type: SavingsComputationType::DailyLowestBalance,
        interest_tax_rate: dec!(20),
    }
}

#[tokio::test]
async fn test_savings_run_earns_on_the_lowest_daily_balance() {
    let h = harness();
    let (account, member) = savings_setup(&h).await;

    let run = h
        .engine
        .savings()
        .generate(&h.ctx, run_request(&account))
        .await
        .unwrap();

    assert_eq!(run.entries.len(), 1);
    let entry = &run.entries[0];
    assert_eq!(entry.member_profile_id, member.id);
    assert_eq!(entry.interest_amount, dec!(10.00));
    assert_eq!(entry.interest_tax, dec!(2.00));
    assert_eq!(entry.ending_balance, dec!(10008.00));
    assert_eq!(run.run.total_interest, dec!(10.00));
    assert_eq!(run.run.total_tax, dec!(2.00));

    // Generating writes nothing to the ledger.
    let chain = h
        .engine
        .ledger()
        .entries(&h.ctx, account.id, Some(member.id))
        .await
        .unwrap();
    assert_eq!(chain.len(), 1);
}

#[tokio::test]
async fn test_savings_run_lifecycle_gates_edits_and_posts_net_interest() {
    let h = harness();
    let (account, member) = savings_setup(&h).await;
    let savings = h.engine.savings();
    let run = savings.generate(&h.ctx, run_request(&account)).await.unwrap();
    let run_id = run.run.id;
    let entry_id = run.entries[0].id;

    let err = savings
        .post(&h.ctx, run_id, post_request(None))
        .await
        .unwrap_err();
    assert!(matches!(err.root(), EngineError::Lifecycle(LifecycleError::NotPrinted)));

    let printed = savings.print(&h.ctx, run_id).await.unwrap();
    assert_eq!(printed.review.printed_date, Some(start()));
    assert_eq!(printed.review.printed_by, Some(h.ctx.actor));

    let err = savings.regenerate(&h.ctx, run_id).await.unwrap_err();
    assert!(matches!(err.root(), EngineError::Lifecycle(LifecycleError::AlreadyPrinted)));
    assert_eq!(err.kind(), ErrorKind::BusinessRule);
    let err = savings
        .override_entry(&h.ctx, entry_id, dec!(15), dec!(3))
        .await
        .unwrap_err();
    assert!(matches!(err.root(), EngineError::Lifecycle(LifecycleError::AlreadyPrinted)));

    savings.undo_print(&h.ctx, run_id).await.unwrap();
    let overridden = savings
        .override_entry(&h.ctx, entry_id, dec!(15), dec!(3))
        .await
        .unwrap();
    assert_eq!(overridden.run.total_interest, dec!(15.00));
    assert_eq!(overridden.run.total_tax, dec!(3.00));
    assert_eq!(overridden.entries[0].ending_balance, dec!(10012.00));

    savings.print(&h.ctx, run_id).await.unwrap();
    let posted = savings
        .post(&h.ctx, run_id, post_request(None))
        .await
        .unwrap();
    assert_eq!(posted.review.posted_date, Some(start()));
    assert_eq!(posted.review.check_voucher_number.as_deref(), Some("CV-0042"));

    let chain = h
        .engine
        .ledger()
        .entries(&h.ctx, account.id, Some(member.id))
        .await
        .unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[1].source, LedgerSource::SavingsInterest);
    assert_eq!(chain[1].credit, dec!(12.00));
    assert_eq!(chain[1].balance, dec!(10012.00));
    assert_eq!(chain[1].reference_number, "CV-0042");

    let err = savings
        .post(&h.ctx, run_id, post_request(None))
        .await
        .unwrap_err();
    assert!(matches!(err.root(), EngineError::Lifecycle(LifecycleError::AlreadyPosted)));
    let err = savings.undo_print(&h.ctx, run_id).await.unwrap_err();
    assert!(matches!(err.root(), EngineError::Lifecycle(LifecycleError::AlreadyPosted)));
}

#[tokio::test]
async fn test_savings_run_rejects_an_empty_window() {
    let h = harness();
    let (account, _) = savings_setup(&h).await;
    let mut request = run_request(&account);
    request.new_computation_date = request.last_computation_date;

    let err = h
        .engine
        .savings()
        .generate(&h.ctx, request)
        .await
        .unwrap_err();
    assert!(matches!(err.root(), EngineError::Savings(_)));
}

fn fund(h: &Harness, deceased: &MemberProfile, account: &Account, amount: Decimal) -> MutualFund {
    MutualFund {
        id: MutualFundId::new(),
        scope: h.scope(),
        member_profile_id: deceased.id,
        member_type_id: None,
        name: "Damayan - P. Santos".to_string(),
        description: String::new(),
        date_of_death: at(3, 0),
        extension_only: false,
        amount,
        computation_type: MutualFundComputationType::Continuous,
        total_amount: Decimal::ZERO,
        account_id: Some(account.id),
        additional_members: Vec::new(),
        tables: Vec::new(),
        review: ReviewState::default(),
        created_by: h.ctx.actor,
        created_at: start(),
    }
}

#[tokio::test]
async fn test_mutual_fund_debits_every_living_member() {
    let h = harness();
    let account = h.savings_account().await;
    let mut pool = AccountRules::new(AccountType::Other);
    pool.cash_and_cash_equivalence = true;
    let pool = h.account("Mutual Aid Fund", pool).await;
    let cash = h.payment_type().await;
    h.open_batch().await;
    let deceased = h.member("Pedro Santos").await;
    let mut living = Vec::new();
    for name in ["Ana Cruz", "Ben Reyes"] {
        let member = h.member(name).await;
        h.pay(&account, &cash, &member, dec!(1000), PaymentSource::Deposit)
            .await;
        living.push(member);
    }

    let funds = h.engine.mutual_funds();
    let created = funds
        .create(&h.ctx, fund(&h, &deceased, &account, dec!(100)))
        .await
        .unwrap();
    let generated = funds.generate(&h.ctx, created.id).await.unwrap();
    assert_eq!(generated.entries.len(), 2);
    assert!(generated
        .entries
        .iter()
        .all(|e| e.amount == dec!(100) && e.member_profile_id != deceased.id));
    assert_eq!(generated.fund.total_amount, dec!(200));

    funds.print(&h.ctx, created.id).await.unwrap();
    let err = funds.generate(&h.ctx, created.id).await.unwrap_err();
    assert!(matches!(err.root(), EngineError::Lifecycle(LifecycleError::AlreadyPrinted)));

    let posted = funds
        .post(&h.ctx, created.id, post_request(Some(&pool)))
        .await
        .unwrap();
    assert_eq!(posted.review.post_account_id, Some(pool.id));

    let ledger = h.engine.ledger();
    for member in &living {
        let chain = ledger
            .entries(&h.ctx, account.id, Some(member.id))
            .await
            .unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1].source, LedgerSource::MutualContribution);
        assert_eq!(chain[1].debit, dec!(100));
        assert_eq!(chain[1].balance, dec!(900));
    }
    let pool_chain = ledger.entries(&h.ctx, pool.id, None).await.unwrap();
    assert_eq!(pool_chain.len(), 2);
    assert_eq!(pool_chain[1].balance, dec!(200));

    let stored = funds.get(&h.ctx, created.id).await.unwrap();
    assert!(stored.fund.review.posted_date.is_some());
    assert_eq!(stored.entries.len(), 2);
}

#[tokio::test]
async fn test_mutual_fund_rejects_a_negative_amount() {
    let h = harness();
    let account = h.savings_account().await;
    let deceased = h.member("Pedro Santos").await;

    let err = h
        .engine
        .mutual_funds()
        .create(&h.ctx, fund(&h, &deceased, &account, dec!(-1)))
        .await
        .unwrap_err();
    assert!(matches!(
        err.root(),
        EngineError::MutualFund(MutualFundError::NegativeAmount(_))
    ));
}
