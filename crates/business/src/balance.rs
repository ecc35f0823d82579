//! Balance materializer
//!
//! `fund_balance` is a cache over the ledger. Recomputation folds every
//! entry newer than `last_entry_seq` into the stored value while holding
//! the balance lock, so concurrent writers can never lose each other's
//! entries. `reconcile` checks the cache against a full re-aggregation.

use crate::error::WorkflowResult;
use crate::services::ServiceContext;
use aidfund_core::{ledger, Actor, Capability, FundBalance, LedgerEntry};
use aidfund_persistence::{BalanceRepo, LedgerRepo};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::SqliteConnection;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Actor recorded for recomputations nobody asked for explicitly
pub const SYSTEM_ACTOR: &str = "system";

/// Outcome of comparing the cache with a full aggregation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Cached value before the check, `None` on a cold store
    pub materialized: Option<Decimal>,
    pub aggregated: Decimal,
    pub entry_count: usize,
    pub last_entry_seq: i64,
    /// `aggregated - materialized`
    pub drift: Decimal,
    pub repaired: bool,
}

impl ReconcileReport {
    pub fn is_consistent(&self) -> bool {
        self.drift.is_zero() && self.materialized.is_some()
    }
}

pub struct BalanceMaterializer<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> BalanceMaterializer<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Fold new ledger entries into the stored balance.
    ///
    /// Idempotent: with no new entries only `revision` and the
    /// recomputation stamp change.
    pub async fn recompute(&self, actor_id: &str) -> WorkflowResult<FundBalance> {
        let _guard = self.ctx.balance_lock().lock().await;
        let mut tx = self.ctx.pool().begin().await?;

        let current = BalanceRepo::lock(&mut tx, actor_id, Utc::now()).await?;
        debug!(revision = current.revision, "Balance lock acquired");

        let entries = LedgerRepo::entries_after(&mut tx, current.last_entry_seq).await?;
        let updated = Self::fold(&mut tx, current, &entries, actor_id).await?;

        tx.commit().await?;
        debug!(
            balance = %updated.current_balance,
            folded = entries.len(),
            last_seq = updated.last_entry_seq,
            "Balance recomputed"
        );
        Ok(updated)
    }

    /// Apply `entries` on top of `base`, stamping each entry's running balance.
    async fn fold(
        conn: &mut SqliteConnection,
        base: FundBalance,
        entries: &[LedgerEntry],
        actor_id: &str,
    ) -> WorkflowResult<FundBalance> {
        let mut running = base.current_balance;
        let mut last_seq = base.last_entry_seq;
        for entry in entries {
            running += entry.signed_amount();
            last_seq = entry.seq;
            LedgerRepo::set_balance_after(&mut *conn, entry.seq, running).await?;
        }

        let updated = FundBalance {
            current_balance: running,
            last_entry_seq: last_seq,
            revision: base.revision,
            recomputed_at: Utc::now(),
            recomputed_by: actor_id.to_string(),
        };
        BalanceRepo::save(&mut *conn, &updated).await?;
        Ok(updated)
    }

    /// Last materialized balance, recomputed first when missing or behind the ledger.
    pub async fn get_current_balance(&self) -> WorkflowResult<FundBalance> {
        let (stored, max_seq) = {
            let mut conn = self.ctx.pool().acquire().await?;
            let stored = BalanceRepo::get(&mut conn).await?;
            let max_seq = LedgerRepo::max_seq(&mut conn).await?;
            (stored, max_seq)
        };

        match stored {
            Some(balance) if balance.last_entry_seq >= max_seq => Ok(balance),
            Some(balance) => {
                warn!(
                    cached_seq = balance.last_entry_seq,
                    ledger_seq = max_seq,
                    "Balance behind ledger, recomputing"
                );
                self.recompute(SYSTEM_ACTOR).await
            }
            None => {
                info!("No materialized balance yet, computing");
                self.recompute(SYSTEM_ACTOR).await
            }
        }
    }

    /// Independent full re-aggregation: (Σinflow − Σoutflow, entry count, max seq).
    pub async fn aggregate(&self) -> WorkflowResult<(Decimal, usize, i64)> {
        let mut conn = self.ctx.pool().acquire().await?;
        let entries = LedgerRepo::entries_after(&mut conn, 0).await?;
        let last_seq = entries.last().map_or(0, |e| e.seq);
        Ok((ledger::aggregate(Decimal::ZERO, &entries), entries.len(), last_seq))
    }

    /// Compare the cache with a full aggregation. Needs `Audit`; repairing needs `Treasury`.
    pub async fn reconcile(&self, actor: &Actor, repair: bool) -> WorkflowResult<ReconcileReport> {
        self.ctx.require(actor, Capability::Audit).await?;
        if repair {
            self.ctx.require(actor, Capability::Treasury).await?;
        }
        self.reconcile_as(actor.id(), repair).await
    }

    pub(crate) async fn reconcile_as(
        &self,
        actor_id: &str,
        repair: bool,
    ) -> WorkflowResult<ReconcileReport> {
        let _guard = self.ctx.balance_lock().lock().await;
        let mut tx = self.ctx.pool().begin().await?;

        // Lock first so the transaction never upgrades from a read snapshot.
        // The upsert inserts at revision 1, so anything lower than 2 was a cold store.
        let current = BalanceRepo::lock(&mut tx, actor_id, Utc::now()).await?;
        let cached = (current.revision > 1).then_some(current.current_balance);

        let entries = LedgerRepo::entries_after(&mut tx, 0).await?;
        let aggregated = ledger::aggregate(Decimal::ZERO, &entries);
        let last_entry_seq = entries.last().map_or(0, |e| e.seq);

        let drift = aggregated - cached.unwrap_or(Decimal::ZERO);

        if repair {
            let base = FundBalance {
                current_balance: Decimal::ZERO,
                last_entry_seq: 0,
                ..current
            };
            Self::fold(&mut tx, base, &entries, actor_id).await?;
            tx.commit().await?;
        }
        // Without repair the transaction is dropped and the revision bump rolls back

        let report = ReconcileReport {
            materialized: cached,
            aggregated,
            entry_count: entries.len(),
            last_entry_seq,
            drift,
            repaired: repair,
        };
        if !drift.is_zero() {
            warn!(
                materialized = ?cached,
                aggregated = %aggregated,
                drift = %drift,
                repaired = repair,
                "Balance drift detected"
            );
        } else {
            info!(balance = %aggregated, entries = entries.len(), "Balance reconciled");
        }
        Ok(report)
    }
}

/// Periodically reconcile and repair the balance cache.
pub fn spawn_reconciler(ctx: Arc<ServiceContext>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let materializer = BalanceMaterializer::new(&ctx);
            match materializer.reconcile_as(SYSTEM_ACTOR, false).await {
                Ok(report) if !report.drift.is_zero() => {
                    if let Err(e) = materializer.reconcile_as(SYSTEM_ACTOR, true).await {
                        warn!(error = %e, "Balance repair failed");
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Balance reconciliation failed"),
            }
        }
    })
}
