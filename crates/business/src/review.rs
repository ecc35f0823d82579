//! Review gateway - the request lifecycle state machine
//!
//! ```text
//! fast track:  submitted ──approve/reject (Review)──▶ approved | rejected
//! board track: submitted ──approve (Board)──▶ board_reviewed ──approve (Review)──▶ approved
//!                  │                                  │
//!                  └──reject (Board|Review)──▶ rejected ◀──reject (Board)──┘
//! ```
//!
//! A decision is validated in full before anything is written. The state
//! change, its status log entry and, for approvals, the disbursement
//! outflow then commit in one transaction.

use crate::balance::BalanceMaterializer;
use crate::collaborators::NotificationEvent;
use crate::error::{WorkflowError, WorkflowResult};
use crate::finalize::FinalizationCoordinator;
use crate::services::ServiceContext;
use aidfund_core::{
    Actor, AidRequest, Amount, Capability, CategoryPolicy, Decision, DecisionPayload, FundBalance,
    LedgerEntry, Receipt, RequestState, ReviewTrack, StatusLogEntry,
};
use aidfund_persistence::{RequestFilter, RequestRepo, StatusLogRepo};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use sqlx::SqliteConnection;
use tracing::{info, warn};

/// Where a decision leads and which capabilities may take it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub to: RequestState,
    /// Any one of these suffices
    pub capabilities: &'static [Capability],
}

const REVIEW: &[Capability] = &[Capability::Review];
const BOARD: &[Capability] = &[Capability::Board];
const BOARD_OR_REVIEW: &[Capability] = &[Capability::Board, Capability::Review];

/// Transition table. `None` means no such edge exists.
pub fn next_step(track: ReviewTrack, from: RequestState, decision: Decision) -> Option<Step> {
    use RequestState::*;

    let (to, capabilities) = match (track, from, decision) {
        (ReviewTrack::FastTrack, Submitted, Decision::Approve) => (Approved, REVIEW),
        (ReviewTrack::FastTrack, Submitted, Decision::Reject) => (Rejected, REVIEW),
        (ReviewTrack::Board, Submitted, Decision::Approve) => (BoardReviewed, BOARD),
        (ReviewTrack::Board, Submitted, Decision::Reject) => (Rejected, BOARD_OR_REVIEW),
        (ReviewTrack::Board, BoardReviewed, Decision::Approve) => (Approved, REVIEW),
        (ReviewTrack::Board, BoardReviewed, Decision::Reject) => (Rejected, BOARD),
        _ => return None,
    };
    Some(Step { to, capabilities })
}

/// Decision payload after validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ValidatedDecision {
    pub board_amount: Option<Amount>,
    pub approved_amount: Option<Amount>,
    pub remark: Option<String>,
    pub needs_evidence: bool,
}

/// Check amount and remark rules for one step. Evidence is checked separately
/// because it needs the evidence store.
pub(crate) fn validate_payload(
    request: &AidRequest,
    policy: &CategoryPolicy,
    step: Step,
    payload: &DecisionPayload,
    board_min_remark_chars: usize,
) -> WorkflowResult<ValidatedDecision> {
    let remark = payload.trimmed_remark().map(str::to_string);

    match step.to {
        RequestState::Rejected => {
            let remark = remark.ok_or_else(|| {
                WorkflowError::MissingRemark("A rejection needs a remark".to_string())
            })?;
            if request.track == ReviewTrack::Board
                && remark.chars().count() <= board_min_remark_chars
            {
                return Err(WorkflowError::MissingRemark(format!(
                    "Board-track rejections need a remark longer than {} characters",
                    board_min_remark_chars
                )));
            }
            Ok(ValidatedDecision {
                board_amount: None,
                approved_amount: None,
                remark: Some(remark),
                needs_evidence: false,
            })
        }
        RequestState::BoardReviewed => {
            let amount = positive_amount(payload.amount)?;
            Ok(ValidatedDecision {
                board_amount: Some(amount),
                approved_amount: None,
                remark,
                needs_evidence: false,
            })
        }
        RequestState::Approved if request.track == ReviewTrack::Board => {
            let fixed = request.board_amount.ok_or_else(|| {
                WorkflowError::invalid_transition(request.state, "no board amount on record")
            })?;
            if let Some(given) = payload.amount {
                if given != fixed.value() {
                    return Err(WorkflowError::InvalidAmount(format!(
                        "The board fixed the amount at {}",
                        fixed
                    )));
                }
            }
            Ok(ValidatedDecision {
                board_amount: None,
                approved_amount: Some(fixed),
                remark,
                needs_evidence: true,
            })
        }
        RequestState::Approved => {
            let amount = positive_amount(payload.amount)?;
            if !policy.permits(amount.value()) {
                return Err(WorkflowError::AmountExceedsLimit {
                    amount: amount.value(),
                    limit: policy.max_amount.unwrap_or(Decimal::ZERO),
                });
            }
            Ok(ValidatedDecision {
                board_amount: None,
                approved_amount: Some(amount),
                remark,
                needs_evidence: policy.evidence_required,
            })
        }
        RequestState::Submitted => Err(WorkflowError::invalid_transition(
            request.state,
            "requests cannot return to submitted",
        )),
    }
}

fn positive_amount(amount: Option<Decimal>) -> WorkflowResult<Amount> {
    let value = amount
        .ok_or_else(|| WorkflowError::InvalidAmount("An amount is required".to_string()))?;
    Ok(Amount::positive(value)?)
}

/// Everything a successful decision produced
#[derive(Debug, Clone, Serialize)]
pub struct DecisionOutcome {
    pub request: AidRequest,
    pub log_entry: StatusLogEntry,
    /// Disbursement outflow, for approvals
    pub ledger_entry: Option<LedgerEntry>,
    /// Balance after the approval; `None` if recomputation was deferred
    pub balance: Option<FundBalance>,
}

pub struct ReviewGateway<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ReviewGateway<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Create a request in `submitted`, routed by the category directory.
    pub async fn submit(
        &self,
        actor: &Actor,
        requester_id: &str,
        category_id: &str,
        requested_amount: Decimal,
        justification: &str,
    ) -> WorkflowResult<AidRequest> {
        self.ctx.require(actor, Capability::Submit).await?;
        let amount = Amount::new(requested_amount)?;
        let policy = self
            .ctx
            .directory()
            .policy(category_id)
            .await
            .ok_or_else(|| WorkflowError::not_found("Category", category_id))?;

        let request = AidRequest::new(
            requester_id,
            category_id,
            policy.track,
            amount,
            justification.trim(),
        );
        let mut conn = self.ctx.pool().acquire().await?;
        RequestRepo::insert(&mut conn, &request).await?;
        drop(conn);

        info!(
            request = %request.id,
            category = category_id,
            track = %request.track,
            amount = %amount,
            "Request submitted"
        );
        self.ctx
            .notify(
                requester_id,
                NotificationEvent::RequestSubmitted,
                json!({ "request_id": request.id, "amount": amount }),
            )
            .await;
        Ok(request)
    }

    /// Apply a reviewer decision.
    ///
    /// Checks run in order: existence, active and non-terminal, track
    /// gating, capability, payload, evidence. Nothing is written unless all
    /// pass; a lost compare-and-set race is `AlreadyDecided`.
    pub async fn decide(
        &self,
        actor: &Actor,
        request_id: &str,
        decision: Decision,
        payload: DecisionPayload,
    ) -> WorkflowResult<DecisionOutcome> {
        let request = self.get_request(request_id).await?;

        if !request.is_active {
            return Err(WorkflowError::invalid_transition(
                request.state,
                "the request has been deactivated",
            ));
        }
        if request.is_terminal() {
            return Err(WorkflowError::invalid_transition(
                request.state,
                "the request is already final",
            ));
        }

        let policy = self.effective_policy(&request).await?;
        let step = next_step(request.track, request.state, decision).ok_or_else(|| {
            WorkflowError::invalid_transition(request.state, format!("cannot {} here", decision))
        })?;
        self.authorize_step(actor, &request, decision, step).await?;

        let validated = validate_payload(
            &request,
            &policy,
            step,
            &payload,
            self.ctx.workflow().board_min_remark_chars,
        )?;
        if validated.needs_evidence {
            self.check_evidence(&request.id, payload.evidence.as_deref())
                .await?;
        }

        let now = Utc::now();
        let mut tx = self.ctx.pool().begin().await?;

        let applied = RequestRepo::transition(
            &mut tx,
            &request.id,
            request.state,
            step.to,
            validated.board_amount,
            validated.approved_amount,
            now,
        )
        .await?;
        if !applied {
            return Err(WorkflowError::AlreadyDecided(request.id.clone()));
        }
        if validated.needs_evidence {
            self.confirm_evidence_in(&mut tx, &request.id, payload.evidence.as_deref())
                .await?;
        }

        let log_entry = StatusLogRepo::append(
            &mut tx,
            &request.id,
            request.state,
            step.to,
            actor.id(),
            validated.remark.as_deref(),
            now,
        )
        .await?;

        let finalization = match (step.to, validated.approved_amount) {
            (RequestState::Approved, Some(amount)) => Some(
                FinalizationCoordinator::finalize_in(&mut tx, &request.id, amount, actor.id())
                    .await?,
            ),
            _ => None,
        };

        tx.commit().await.map_err(|e| {
            if finalization.is_some() {
                WorkflowError::finalization(&request.id, e.to_string())
            } else {
                WorkflowError::from(e)
            }
        })?;

        info!(
            request = %request.id,
            from = %request.state,
            to = %step.to,
            actor = actor.id(),
            "Decision applied"
        );

        // Balance is a cache; a failure here is healed by the next read
        let balance = match finalization {
            Some(_) => match BalanceMaterializer::new(self.ctx).recompute(actor.id()).await {
                Ok(balance) => Some(balance),
                Err(e) => {
                    warn!(request = %request.id, error = %e, "Balance recompute deferred");
                    None
                }
            },
            None => None,
        };

        let updated = AidRequest {
            state: step.to,
            board_amount: validated.board_amount.or(request.board_amount),
            approved_amount: validated.approved_amount.or(request.approved_amount),
            updated_at: now,
            ..request
        };

        let event = match step.to {
            RequestState::BoardReviewed => NotificationEvent::BoardReviewed,
            RequestState::Approved => NotificationEvent::Approved,
            _ => NotificationEvent::Rejected,
        };
        self.ctx
            .notify(
                &updated.requester_id,
                event,
                json!({
                    "request_id": updated.id,
                    "state": updated.state,
                    "amount": updated.approved_amount.or(updated.board_amount),
                    "remark": log_entry.remark,
                }),
            )
            .await;

        Ok(DecisionOutcome {
            request: updated,
            log_entry,
            ledger_entry: finalization.map(|f| f.entry),
            balance,
        })
    }

    /// Current category policy with the request's own track.
    ///
    /// A request keeps the track it was routed to at submission; if the
    /// directory now disagrees, the drift is logged.
    async fn effective_policy(&self, request: &AidRequest) -> WorkflowResult<CategoryPolicy> {
        let policy = self
            .ctx
            .directory()
            .policy(&request.category_id)
            .await
            .ok_or_else(|| WorkflowError::not_found("Category", &request.category_id))?;

        if policy.track != request.track {
            warn!(
                request = %request.id,
                category = %request.category_id,
                routed = %request.track,
                configured = %policy.track,
                "Category routing changed since submission, keeping routed track"
            );
        }
        Ok(CategoryPolicy {
            track: request.track,
            ..policy
        })
    }

    async fn authorize_step(
        &self,
        actor: &Actor,
        request: &AidRequest,
        decision: Decision,
        step: Step,
    ) -> WorkflowResult<()> {
        let Err(err) = self.ctx.require_any(actor, step.capabilities).await else {
            return Ok(());
        };

        // A reviewer approving a board-track request straight from submitted
        // is asking for the fast path, which board categories do not have.
        let fast_path_attempt = request.track == ReviewTrack::Board
            && request.state == RequestState::Submitted
            && decision == Decision::Approve
            && self.ctx.has_capability(actor, Capability::Review).await;
        if fast_path_attempt {
            return Err(WorkflowError::invalid_transition(
                request.state,
                "board-track requests need board review before approval",
            ));
        }
        Err(err)
    }

    async fn check_evidence(&self, request_id: &str, artifact_id: Option<&str>) -> WorkflowResult<()> {
        let artifact_id = artifact_id.ok_or_else(|| {
            WorkflowError::MissingEvidence("Approval needs a proof-of-disbursement receipt".to_string())
        })?;

        let active = self
            .ctx
            .evidence()
            .is_active_artifact(request_id, artifact_id)
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?;
        if !active {
            return Err(WorkflowError::MissingEvidence(format!(
                "Receipt {} is not an active receipt for this request",
                artifact_id
            )));
        }
        Ok(())
    }

    /// Re-check the cited receipt inside the decision transaction.
    async fn confirm_evidence_in(
        &self,
        conn: &mut SqliteConnection,
        request_id: &str,
        artifact_id: Option<&str>,
    ) -> WorkflowResult<()> {
        let artifact_id = artifact_id.unwrap_or_default();
        let active = self
            .ctx
            .evidence()
            .confirm_active_in(conn, request_id, artifact_id)
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?;
        if !active {
            return Err(WorkflowError::MissingEvidence(format!(
                "Receipt {} was voided before the decision was recorded",
                artifact_id
            )));
        }
        Ok(())
    }

    /// Attach a receipt. Allowed in every state; needs `Submit` or `Review`.
    pub async fn attach_evidence(
        &self,
        actor: &Actor,
        request_id: &str,
        locator: &str,
        declared_amount: Option<Decimal>,
    ) -> WorkflowResult<String> {
        self.ctx
            .require_any(actor, &[Capability::Submit, Capability::Review])
            .await?;
        let request = self.get_request(request_id).await?;

        let locator = locator.trim();
        if locator.is_empty() {
            return Err(WorkflowError::MissingEvidence(
                "A receipt needs a document locator".to_string(),
            ));
        }
        let declared = declared_amount.map(Amount::new).transpose()?;

        let artifact_id = self
            .ctx
            .evidence()
            .attach_evidence(&request.id, actor.id(), locator, declared)
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?;
        info!(request = %request.id, receipt = %artifact_id, "Evidence attached");
        Ok(artifact_id)
    }

    /// Void a receipt so it no longer satisfies the evidence rule. Needs `Review`.
    pub async fn void_evidence(&self, actor: &Actor, artifact_id: &str) -> WorkflowResult<Receipt> {
        self.ctx.require(actor, Capability::Review).await?;
        let evidence = self.ctx.evidence();

        let receipt = evidence
            .get_evidence(artifact_id)
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?
            .ok_or_else(|| WorkflowError::not_found("Receipt", artifact_id))?;

        if evidence
            .void_evidence(artifact_id)
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?
        {
            info!(receipt = artifact_id, actor = actor.id(), "Evidence voided");
        }
        evidence
            .get_evidence(artifact_id)
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))?
            .ok_or_else(|| WorkflowError::not_found("Receipt", &receipt.id))
    }

    pub async fn list_evidence(&self, request_id: &str) -> WorkflowResult<Vec<Receipt>> {
        self.ctx
            .evidence()
            .list_evidence(request_id)
            .await
            .map_err(|e| WorkflowError::Storage(e.to_string()))
    }

    pub async fn get_request(&self, request_id: &str) -> WorkflowResult<AidRequest> {
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(RequestRepo::get_by_id(&mut conn, request_id).await?)
    }

    /// Status log of a request, oldest first.
    pub async fn history(&self, request_id: &str) -> WorkflowResult<Vec<StatusLogEntry>> {
        let mut conn = self.ctx.pool().acquire().await?;
        RequestRepo::get_by_id(&mut conn, request_id).await?;
        Ok(StatusLogRepo::list_for_request(&mut conn, request_id).await?)
    }

    pub async fn list_requests(&self, filter: &RequestFilter) -> WorkflowResult<Vec<AidRequest>> {
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(RequestRepo::list(&mut conn, filter).await?)
    }

    /// Active request count per state
    pub async fn request_stats(&self) -> WorkflowResult<Vec<(RequestState, i64)>> {
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(RequestRepo::count_by_state(&mut conn).await?)
    }

    /// Soft-deactivate a request. Needs `Administer`; state and amounts are untouched.
    pub async fn deactivate(&self, actor: &Actor, request_id: &str) -> WorkflowResult<AidRequest> {
        self.ctx.require(actor, Capability::Administer).await?;
        let mut conn = self.ctx.pool().acquire().await?;
        let request = RequestRepo::get_by_id(&mut conn, request_id).await?;
        if RequestRepo::deactivate(&mut conn, request_id, Utc::now()).await? {
            info!(request = request_id, actor = actor.id(), "Request deactivated");
        }
        Ok(AidRequest {
            is_active: false,
            ..request
        })
    }
}
