//! Integration tests for the ledger and the materialized balance

mod common;

use aidfund_business::{spawn_reconciler, BalanceMaterializer, ErrorKind, LedgerService, ReviewGateway};
use aidfund_core::{Amount, Capability, Decision, DecisionPayload, Direction, NewLedgerEntry};
use aidfund_persistence::{BalanceRepo, LedgerFilter, LedgerRepo};
use chrono::Utc;
use common::Harness;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_balance_matches_full_aggregation() {
    let h = Harness::in_memory().await;
    let ledger = LedgerService::new(&h.ctx);
    let treasurer = h.treasurer();

    let movements = [
        (Direction::Inflow, dec!(1000)),
        (Direction::Outflow, dec!(250.50)),
        (Direction::Inflow, dec!(75.25)),
        (Direction::Outflow, dec!(900)),
        (Direction::Inflow, dec!(0.01)),
    ];
    for (direction, amount) in movements {
        ledger
            .record_entry(&treasurer, direction, amount, "donation", None, "")
            .await
            .unwrap();
    }

    let materializer = BalanceMaterializer::new(&h.ctx);
    let balance = materializer.get_current_balance().await.unwrap();
    let (aggregated, count, last_seq) = materializer.aggregate().await.unwrap();

    assert_eq!(balance.current_balance, dec!(-75.24));
    assert_eq!(balance.current_balance, aggregated);
    assert_eq!(count, 5);
    assert_eq!(balance.last_entry_seq, last_seq);
    assert_eq!(balance.recomputed_by, "TRE-001");

    // Running balance stamped on each entry
    let entries = ledger.list_entries(&LedgerFilter::default()).await.unwrap();
    let stamps: Vec<_> = entries.iter().map(|e| e.balance_after.unwrap()).collect();
    assert_eq!(stamps, [dec!(1000), dec!(749.50), dec!(824.75), dec!(-75.25), dec!(-75.24)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_inflows_are_not_lost() {
    let h = Harness::on_disk().await;
    let treasurer = h.treasurer();

    let tasks: Vec<_> = (0..2)
        .map(|_| {
            let ctx = Arc::clone(&h.ctx);
            let actor = treasurer.clone();
            tokio::spawn(async move {
                LedgerService::new(&ctx)
                    .record_entry(&actor, Direction::Inflow, dec!(100), "donation", None, "")
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let balance = BalanceMaterializer::new(&h.ctx).get_current_balance().await.unwrap();
    assert_eq!(balance.current_balance, dec!(200));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_settle_to_sum() {
    let h = Harness::on_disk().await;
    let treasurer = h.treasurer();

    let tasks: Vec<_> = (1..=20)
        .map(|i| {
            let ctx = Arc::clone(&h.ctx);
            let actor = treasurer.clone();
            let direction = if i % 4 == 0 { Direction::Outflow } else { Direction::Inflow };
            tokio::spawn(async move {
                LedgerService::new(&ctx)
                    .record_entry(&actor, direction, Decimal::from(i), "donation", None, "")
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    // inflows 1..=20 minus multiples of 4, outflows 4+8+12+16+20
    let expected = Decimal::from(210 - 60 - 60);
    let materializer = BalanceMaterializer::new(&h.ctx);
    let balance = materializer.get_current_balance().await.unwrap();
    assert_eq!(balance.current_balance, expected);
    assert_eq!(materializer.aggregate().await.unwrap().0, expected);
}

#[tokio::test]
async fn test_recompute_is_idempotent() {
    let h = Harness::in_memory().await;
    LedgerService::new(&h.ctx)
        .record_entry(&h.treasurer(), Direction::Inflow, dec!(42), "donation", None, "")
        .await
        .unwrap();

    let materializer = BalanceMaterializer::new(&h.ctx);
    let first = materializer.recompute("TRE-001").await.unwrap();
    let second = materializer.recompute("TRE-001").await.unwrap();
    assert_eq!(first.current_balance, second.current_balance);
    assert_eq!(first.last_entry_seq, second.last_entry_seq);
    assert_eq!(second.revision, first.revision + 1);
}

#[tokio::test]
async fn test_balance_self_heals() {
    let h = Harness::in_memory().await;
    let materializer = BalanceMaterializer::new(&h.ctx);

    // Cold start: no balance row yet
    let cold = materializer.get_current_balance().await.unwrap();
    assert_eq!(cold.current_balance, Decimal::ZERO);
    assert_eq!(cold.last_entry_seq, 0);

    // An entry written without the follow-up recompute, as after a crash
    {
        let mut conn = h.ctx.pool().acquire().await.unwrap();
        let entry = NewLedgerEntry::new(
            Direction::Inflow,
            Amount::positive(dec!(300)).unwrap(),
            "donation",
            "TRE-001",
        );
        LedgerRepo::append(&mut conn, &entry, Utc::now()).await.unwrap();
    }

    let healed = materializer.get_current_balance().await.unwrap();
    assert_eq!(healed.current_balance, dec!(300));
    assert_eq!(healed.last_entry_seq, 1);
    assert_eq!(healed.recomputed_by, "system");
}

#[tokio::test]
async fn test_reconcile_reports_and_repairs_drift() {
    let h = Harness::in_memory().await;
    let treasurer = h.treasurer();
    LedgerService::new(&h.ctx)
        .record_entry(&treasurer, Direction::Inflow, dec!(500), "donation", None, "")
        .await
        .unwrap();

    let materializer = BalanceMaterializer::new(&h.ctx);
    let report = materializer.reconcile(&treasurer, false).await.unwrap();
    assert!(report.is_consistent());

    // Corrupt the cache
    {
        let mut conn = h.ctx.pool().acquire().await.unwrap();
        let mut balance = BalanceRepo::get(&mut conn).await.unwrap().unwrap();
        balance.current_balance = dec!(123);
        BalanceRepo::save(&mut conn, &balance).await.unwrap();
    }

    let auditor = h.actor("AUD-001", &[Capability::Audit]);
    let report = materializer.reconcile(&auditor, false).await.unwrap();
    assert_eq!(report.materialized, Some(dec!(123)));
    assert_eq!(report.aggregated, dec!(500));
    assert_eq!(report.drift, dec!(377));
    assert!(!report.repaired);

    let err = materializer.reconcile(&auditor, true).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let report = materializer.reconcile(&treasurer, true).await.unwrap();
    assert!(report.repaired);
    let balance = materializer.get_current_balance().await.unwrap();
    assert_eq!(balance.current_balance, dec!(500));
}

#[tokio::test]
async fn test_background_reconciler_repairs_drift() {
    let h = Harness::in_memory().await;
    LedgerService::new(&h.ctx)
        .record_entry(&h.treasurer(), Direction::Inflow, dec!(80), "donation", None, "")
        .await
        .unwrap();
    {
        let mut conn = h.ctx.pool().acquire().await.unwrap();
        let mut balance = BalanceRepo::get(&mut conn).await.unwrap().unwrap();
        balance.current_balance = dec!(-1);
        BalanceRepo::save(&mut conn, &balance).await.unwrap();
    }

    let handle = spawn_reconciler(Arc::clone(&h.ctx), Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.abort();

    let mut conn = h.ctx.pool().acquire().await.unwrap();
    let balance = BalanceRepo::get(&mut conn).await.unwrap().unwrap();
    assert_eq!(balance.current_balance, dec!(80));
}

#[tokio::test]
async fn test_record_entry_validation() {
    let h = Harness::in_memory().await;
    let ledger = LedgerService::new(&h.ctx);

    let err = ledger
        .record_entry(&h.treasurer(), Direction::Inflow, dec!(0), "donation", None, "")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAmount);

    let err = ledger
        .record_entry(&h.treasurer(), Direction::Outflow, dec!(-5), "donation", None, "")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAmount);

    let err = ledger
        .record_entry(&h.reviewer(), Direction::Inflow, dec!(10), "donation", None, "")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let err = ledger
        .record_entry(&h.treasurer(), Direction::Outflow, dec!(10), "manual", Some("REQ-none"), "")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert!(ledger.list_entries(&LedgerFilter::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_request_outflows_come_from_finalization_only() {
    let h = Harness::in_memory().await;
    let gateway = ReviewGateway::new(&h.ctx);
    let ledger = LedgerService::new(&h.ctx);
    let manual_outflow = |request_id: String| {
        let ledger = &ledger;
        let treasurer = h.treasurer();
        async move {
            ledger
                .record_entry(&treasurer, Direction::Outflow, dec!(30), "manual", Some(&request_id), "")
                .await
        }
    };

    let submitted = gateway
        .submit(&h.student(), "STU-001", "books", dec!(30), "Pens")
        .await
        .unwrap();
    let err = manual_outflow(submitted.id.clone()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);

    let rejected = gateway
        .submit(&h.student(), "STU-002", "books", dec!(30), "Pens")
        .await
        .unwrap();
    gateway
        .decide(&h.reviewer(), &rejected.id, Decision::Reject, DecisionPayload::new().with_remark("Duplicate"))
        .await
        .unwrap();
    let err = manual_outflow(rejected.id.clone()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
    assert!(ledger.entries_for_request(&rejected.id).await.unwrap().is_empty());

    // The refused outflow left nothing behind, so approval still works
    let outcome = gateway
        .decide(&h.reviewer(), &submitted.id, Decision::Approve, DecisionPayload::new().with_amount(dec!(30)))
        .await
        .unwrap();
    let disbursement = outcome.ledger_entry.unwrap();
    let err = manual_outflow(submitted.id.clone()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);

    // Inflows tagged to a request (refunds) are fine
    ledger
        .record_entry(&h.treasurer(), Direction::Inflow, dec!(30), "refund", Some(&submitted.id), "")
        .await
        .unwrap();
    let entries = ledger.entries_for_request(&submitted.id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].id, disbursement.id);

    // Untagged outflows stay available for general fund expenses
    ledger
        .record_entry(&h.treasurer(), Direction::Outflow, dec!(5), "bank_fee", None, "")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_description_is_the_only_mutable_field() {
    let h = Harness::in_memory().await;
    let ledger = LedgerService::new(&h.ctx);
    let entry = ledger
        .record_entry(&h.treasurer(), Direction::Inflow, dec!(15), "donation", None, "walk-in")
        .await
        .unwrap();

    let updated = ledger
        .update_description(&h.treasurer(), &entry.id, "Alumni walk-in donation")
        .await
        .unwrap();
    assert_eq!(updated.description, "Alumni walk-in donation");
    assert_eq!(updated.amount, entry.amount);
    assert_eq!(updated.seq, entry.seq);

    let err = ledger
        .update_description(&h.reviewer(), &entry.id, "x")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let err = ledger.get_entry("LED-missing").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
