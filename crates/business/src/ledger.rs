//! Ledger service - manual fund movements and ledger queries

use crate::balance::BalanceMaterializer;
use crate::error::{WorkflowError, WorkflowResult};
use crate::services::ServiceContext;
use aidfund_core::{Actor, Amount, Capability, Direction, LedgerEntry, NewLedgerEntry};
use aidfund_persistence::{LedgerFilter, LedgerRepo, RequestRepo};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};

pub struct LedgerService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> LedgerService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Append one entry and recompute the balance. Needs `Treasury`.
    ///
    /// Prior entries are never touched. Entries may reference a request
    /// only as inflows (refunds); a request's outflow is written by
    /// finalization alone.
    pub async fn record_entry(
        &self,
        actor: &Actor,
        direction: Direction,
        amount: Decimal,
        category: &str,
        request_id: Option<&str>,
        description: &str,
    ) -> WorkflowResult<LedgerEntry> {
        self.ctx.require(actor, Capability::Treasury).await?;
        let amount = Amount::positive(amount)?;

        let mut entry = NewLedgerEntry::new(direction, amount, category.trim(), actor.id())
            .with_description(description.trim());

        let mut conn = self.ctx.pool().acquire().await?;
        if let Some(request_id) = request_id {
            let request = RequestRepo::get_by_id(&mut conn, request_id).await?;
            if direction == Direction::Outflow {
                return Err(WorkflowError::invalid_transition(
                    request.state,
                    "request disbursements are recorded by finalization only",
                ));
            }
            entry = entry.with_request(request_id);
        }

        let stored = LedgerRepo::append(&mut conn, &entry, Utc::now()).await?;
        drop(conn);

        info!(
            entry = %stored.id,
            direction = %stored.direction,
            amount = %stored.amount,
            category = %stored.category,
            "Ledger entry recorded"
        );

        if let Err(e) = BalanceMaterializer::new(self.ctx).recompute(actor.id()).await {
            warn!(entry = %stored.id, error = %e, "Balance recompute deferred");
        }
        Ok(stored)
    }

    /// Change an entry's free-text description. Needs `Treasury`.
    pub async fn update_description(
        &self,
        actor: &Actor,
        entry_id: &str,
        description: &str,
    ) -> WorkflowResult<LedgerEntry> {
        self.ctx.require(actor, Capability::Treasury).await?;
        let mut conn = self.ctx.pool().acquire().await?;
        LedgerRepo::update_description(&mut conn, entry_id, description.trim()).await?;
        info!(entry = entry_id, actor = actor.id(), "Ledger description updated");
        Ok(LedgerRepo::get_by_id(&mut conn, entry_id).await?)
    }

    pub async fn get_entry(&self, entry_id: &str) -> WorkflowResult<LedgerEntry> {
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(LedgerRepo::get_by_id(&mut conn, entry_id).await?)
    }

    pub async fn list_entries(&self, filter: &LedgerFilter) -> WorkflowResult<Vec<LedgerEntry>> {
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(LedgerRepo::list(&mut conn, filter).await?)
    }

    pub async fn entries_for_request(&self, request_id: &str) -> WorkflowResult<Vec<LedgerEntry>> {
        self.list_entries(&LedgerFilter {
            request_id: Some(request_id.to_string()),
            ..Default::default()
        })
        .await
    }
}
