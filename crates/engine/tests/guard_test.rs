//! Abuse guard behaviour seen through the services.

mod common;

use coopbank_core::payment::PaymentSource;
use coopbank_engine::{EngineError, EngineSettings, ErrorKind};
use coopbank_shared::config::AbuseGuardConfig;
use rust_decimal_macros::dec;

use common::{harness_with, payment, settings};

fn strict() -> EngineSettings {
    EngineSettings {
        abuse_guard: AbuseGuardConfig {
            max_failures: 3,
            window_secs: 60,
            block_secs: 60,
            max_origins: 100,
        },
        ..settings()
    }
}

#[tokio::test]
async fn test_repeated_failures_block_the_origin() {
    let h = harness_with(strict());
    let account = h.savings_account().await;
    let member = h.member("Ana Cruz").await;
    let cash = h.payment_type().await;
    let noisy = h.ctx.clone().from_origin("203.0.113.9");
    let payments = h.engine.payments();

    // No batch is open, so every attempt fails.
    for _ in 0..3 {
        let err = payments
            .post(
                &noisy,
                payment(&account, &cash, Some(&member), dec!(10), PaymentSource::Deposit),
            )
            .await
            .unwrap_err();
        assert!(matches!(err.root(), EngineError::NoOpenBatch));
    }
    assert_eq!(h.engine.guard().failures("203.0.113.9").await, 0);

    h.open_batch().await;
    let err = payments
        .post(
            &noisy,
            payment(&account, &cash, Some(&member), dec!(10), PaymentSource::Deposit),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::OriginBlocked(ref o) if o == "203.0.113.9"));
    assert_eq!(err.kind(), ErrorKind::Authorization);

    // Other origins and anonymous callers are unaffected.
    let quiet = h.ctx.clone().from_origin("198.51.100.4");
    payments
        .post(
            &quiet,
            payment(&account, &cash, Some(&member), dec!(10), PaymentSource::Deposit),
        )
        .await
        .unwrap();
    h.pay(&account, &cash, &member, dec!(10), PaymentSource::Deposit)
        .await;
}

#[tokio::test]
async fn test_failures_without_an_origin_are_not_counted() {
    let h = harness_with(strict());
    let account = h.savings_account().await;
    let member = h.member("Ana Cruz").await;
    let cash = h.payment_type().await;

    for _ in 0..5 {
        assert!(h
            .engine
            .payments()
            .post(
                &h.ctx,
                payment(&account, &cash, Some(&member), dec!(10), PaymentSource::Deposit),
            )
            .await
            .is_err());
    }

    h.open_batch().await;
    h.pay(&account, &cash, &member, dec!(10), PaymentSource::Deposit)
        .await;
}
