//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use coopbank_core::account::{Account, AccountRules, AccountType};
use coopbank_core::batch::TransactionBatch;
use coopbank_core::member::MemberProfile;
use coopbank_core::payment::{PaymentRequest, PaymentSource, PaymentType};
use coopbank_db::{Crud, MemoryStore, Query, Record, Store, UnitOfWork};
use coopbank_engine::services::{NewAccount, PaymentReceipt};
use coopbank_engine::{Engine, EngineSettings, RequestContext};
use coopbank_shared::FixedClock;
use coopbank_shared::types::{
    BranchId, Currency, MemberProfileId, OrganizationId, PaymentTypeId, Scope, UserId,
};
use rust_decimal::Decimal;

/// 2026-01-05 09:00 in Manila.
pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 1, 0, 0).unwrap()
}

pub fn php() -> Currency {
    Currency::new("PHP", chrono_tz::Asia::Manila)
}

pub fn settings() -> EngineSettings {
    EngineSettings {
        per_loan_delay: Duration::from_millis(1),
        batch_timeout: Duration::from_secs(30),
        ..EngineSettings::default()
    }
}

pub struct Harness {
    pub engine: Engine<MemoryStore>,
    pub ctx: RequestContext,
}

pub fn harness() -> Harness {
    harness_with(settings())
}

pub fn harness_with(settings: EngineSettings) -> Harness {
    let engine = Engine::new(
        MemoryStore::default(),
        Arc::new(FixedClock(start())),
        settings,
    );
    let scope = Scope::new(OrganizationId::new(), BranchId::new());
    Harness {
        engine,
        ctx: RequestContext::new(UserId::new(), scope),
    }
}

impl Harness {
    pub fn scope(&self) -> Scope {
        self.ctx.scope
    }

    /// Another teller of the same branch.
    pub fn teller(&self) -> RequestContext {
        RequestContext::new(UserId::new(), self.ctx.scope)
    }

    /// Writes a record straight to the store.
    pub async fn seed<R: Record>(&self, record: &R) {
        let mut tx = self.engine.store().begin().await.unwrap();
        tx.create(record).await.unwrap();
        tx.commit().await.unwrap();
    }

    /// Reads a committed record.
    pub async fn load<R: Record>(&self, id: R::Id) -> R {
        let mut tx = self.engine.store().begin().await.unwrap();
        let record = tx.find_one(id).await.unwrap();
        tx.rollback().await.unwrap();
        record
    }

    /// Reads committed records.
    pub async fn find<R: Record>(&self, query: Query<R>) -> Vec<R> {
        let mut tx = self.engine.store().begin().await.unwrap();
        let records = tx.find(query).await.unwrap();
        tx.rollback().await.unwrap();
        records
    }

    pub async fn account(&self, name: &str, rules: AccountRules) -> Account {
        self.engine
            .accounts()
            .create(
                &self.ctx,
                NewAccount {
                    name: name.to_string(),
                    currency: php(),
                    rules,
                },
            )
            .await
            .unwrap()
    }

    pub async fn savings_account(&self) -> Account {
        self.account("Savings", AccountRules::new(AccountType::Deposit)).await
    }

    pub async fn member(&self, full_name: &str) -> MemberProfile {
        let member = MemberProfile {
            id: MemberProfileId::new(),
            scope: self.scope(),
            full_name: full_name.to_string(),
            member_type_id: None,
            is_mutual_fund_member: true,
            created_at: start(),
        };
        self.seed(&member).await;
        member
    }

    pub async fn payment_type(&self) -> PaymentType {
        let payment_type = PaymentType {
            id: PaymentTypeId::new(),
            organization_id: self.scope().organization_id,
            name: "Cash".to_string(),
        };
        self.seed(&payment_type).await;
        payment_type
    }

    pub async fn open_batch(&self) -> TransactionBatch {
        self.engine.batches().open(&self.ctx).await.unwrap()
    }

    pub async fn pay(
        &self,
        account: &Account,
        payment_type: &PaymentType,
        member: &MemberProfile,
        amount: Decimal,
        source: PaymentSource,
    ) -> PaymentReceipt {
        self.engine
            .payments()
            .post(&self.ctx, payment(account, payment_type, Some(member), amount, source))
            .await
            .unwrap()
    }
}

pub fn payment(
    account: &Account,
    payment_type: &PaymentType,
    member: Option<&MemberProfile>,
    amount: Decimal,
    source: PaymentSource,
) -> PaymentRequest {
    PaymentRequest {
        account_id: account.id,
        payment_type_id: payment_type.id,
        member_profile_id: member.map(|m| m.id),
        amount,
        reference_number: "OR-1".to_string(),
        entry_date: None,
        transaction_id: None,
        or_auto_generated: false,
        source,
        description: String::new(),
    }
}
