//! Finalization coordinator
//!
//! Bridges "request became approved" and "ledger gained its outflow".
//! Inside `decide` the outflow is written in the same transaction as the
//! state change, so a failure here rolls the whole decision back.

use crate::balance::BalanceMaterializer;
use crate::error::{WorkflowError, WorkflowResult};
use crate::services::ServiceContext;
use aidfund_core::{Actor, Amount, Capability, LedgerEntry, NewLedgerEntry, RequestState};
use aidfund_persistence::{LedgerRepo, RequestRepo};
use chrono::Utc;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

/// Result of a finalization call
#[derive(Debug, Clone, Serialize)]
pub struct Finalization {
    pub entry: LedgerEntry,
    /// `false` when the outflow already existed
    pub created: bool,
}

pub struct FinalizationCoordinator<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> FinalizationCoordinator<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Create the request's disbursement outflow on `conn`, or return the existing one.
    ///
    /// Every failure is `FinalizationFailed`. An existing outflow with a
    /// different amount is a conflict, never silently accepted.
    pub async fn finalize_in(
        conn: &mut SqliteConnection,
        request_id: &str,
        amount: Amount,
        actor_id: &str,
    ) -> WorkflowResult<Finalization> {
        let fail = |reason: String| WorkflowError::finalization(request_id, reason);

        let existing = LedgerRepo::outflow_for_request(&mut *conn, request_id)
            .await
            .map_err(|e| fail(e.to_string()))?;

        if let Some(entry) = existing {
            if entry.amount != amount {
                return Err(fail(format!(
                    "existing outflow {} is {}, expected {}",
                    entry.id, entry.amount, amount
                )));
            }
            debug!(request = request_id, entry = %entry.id, "Outflow already recorded");
            return Ok(Finalization {
                entry,
                created: false,
            });
        }

        let new_entry = NewLedgerEntry::disbursement(request_id, amount, actor_id);
        let entry = LedgerRepo::append(&mut *conn, &new_entry, Utc::now())
            .await
            .map_err(|e| fail(e.to_string()))?;

        info!(
            request = request_id,
            entry = %entry.id,
            amount = %amount,
            "Disbursement outflow recorded"
        );
        Ok(Finalization {
            entry,
            created: true,
        })
    }

    /// Ensure an approved request has its outflow, then refresh the balance.
    ///
    /// Safe to retry: a second call returns the entry created by the first.
    /// Needs `Review` or `Treasury`.
    pub async fn finalize(
        &self,
        actor: &Actor,
        request_id: &str,
        approved_amount: Amount,
    ) -> WorkflowResult<Finalization> {
        self.ctx
            .require_any(actor, &[Capability::Review, Capability::Treasury])
            .await?;

        // Lock before reading so concurrent retries queue instead of both
        // seeing no outflow.
        let mut tx = self.ctx.pool().begin().await?;
        RequestRepo::lock(&mut tx, request_id).await?;
        let request = RequestRepo::get_by_id(&mut tx, request_id).await?;

        if request.state != RequestState::Approved {
            return Err(WorkflowError::invalid_transition(
                request.state,
                "only approved requests can be finalized",
            ));
        }
        match request.approved_amount {
            Some(amount) if amount == approved_amount => {}
            other => {
                return Err(WorkflowError::finalization(
                    request_id,
                    format!("approved amount is {:?}, finalize called with {}", other, approved_amount),
                ))
            }
        }

        let result = Self::finalize_in(&mut tx, request_id, approved_amount, actor.id()).await?;
        tx.commit()
            .await
            .map_err(|e| WorkflowError::finalization(request_id, e.to_string()))?;

        if let Err(e) = BalanceMaterializer::new(self.ctx).recompute(actor.id()).await {
            warn!(request = request_id, error = %e, "Balance recompute deferred");
        }
        Ok(result)
    }
}
