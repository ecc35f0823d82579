//! Request, decision and evidence commands

use aidfund_business::{DecisionOutcome, LedgerService, ReviewGateway};
use aidfund_core::{AidRequest, DecisionPayload};
use aidfund_persistence::RequestFilter;
use anyhow::Result;
use rust_decimal::Decimal;
use serde_json::json;

use crate::context::{self, print_json, report};
use crate::{Cli, DecisionArg, EvidenceAction, RequestAction};

pub async fn handle(cli: &Cli, action: &RequestAction) -> Result<()> {
    let ctx = context::connect(cli).await?;
    let gateway = ReviewGateway::new(&ctx);

    match action {
        RequestAction::Submit {
            requester,
            category,
            amount,
            justification,
        } => {
            let actor = context::actor(cli, &ctx)?;
            let request = gateway
                .submit(&actor, requester, category, *amount, justification)
                .await
                .map_err(report)?;
            if cli.json {
                return print_json(&request);
            }
            println!("✅ Submitted {}", request.id);
            println!("   Track: {}  Amount: {}", request.track, request.requested_amount);
        }
        RequestAction::Show { request_id } => {
            let request = gateway.get_request(request_id).await.map_err(report)?;
            let history = gateway.history(request_id).await.map_err(report)?;
            let receipts = gateway.list_evidence(request_id).await.map_err(report)?;
            let entries = LedgerService::new(&ctx)
                .entries_for_request(request_id)
                .await
                .map_err(report)?;

            if cli.json {
                return print_json(&json!({
                    "request": request,
                    "history": history,
                    "receipts": receipts,
                    "ledger_entries": entries,
                }));
            }
            print_request(&request);
            println!("\nHistory:");
            for log in &history {
                println!(
                    "  #{} {} -> {} by {} at {}{}",
                    log.sequence,
                    log.previous_state,
                    log.new_state,
                    log.actor_id,
                    log.created_at.format("%Y-%m-%d %H:%M"),
                    log.remark.as_deref().map(|r| format!(" ({})", r)).unwrap_or_default(),
                );
            }
            if !receipts.is_empty() {
                println!("\nReceipts:");
                for r in &receipts {
                    println!("  {} [{}] {}", r.id, r.status, r.locator);
                }
            }
            if !entries.is_empty() {
                println!("\nLedger:");
                for e in &entries {
                    println!("  {} {} {}", e.id, e.direction, e.amount);
                }
            }
        }
        RequestAction::List {
            state,
            requester,
            category,
            all,
            limit,
        } => {
            let filter = RequestFilter {
                state: state.map(|s| s.to_core_type()),
                requester_id: requester.clone(),
                category_id: category.clone(),
                include_inactive: *all,
                limit: *limit,
            };
            let requests = gateway.list_requests(&filter).await.map_err(report)?;
            if cli.json {
                return print_json(&requests);
            }
            if requests.is_empty() {
                println!("No requests");
            }
            for r in &requests {
                println!(
                    "{}  {:<14} {:<10} {:>10}  {}{}",
                    r.id,
                    r.state,
                    r.category_id,
                    r.requested_amount,
                    r.requester_id,
                    if r.is_active { "" } else { "  (inactive)" },
                );
            }
        }
        RequestAction::Deactivate { request_id } => {
            let actor = context::actor(cli, &ctx)?;
            let request = gateway.deactivate(&actor, request_id).await.map_err(report)?;
            if cli.json {
                return print_json(&request);
            }
            println!("✅ Deactivated {}", request.id);
        }
    }
    Ok(())
}

pub async fn decide(
    cli: &Cli,
    request_id: &str,
    decision: DecisionArg,
    amount: Option<Decimal>,
    evidence: Option<&str>,
    remark: Option<&str>,
) -> Result<()> {
    let ctx = context::connect(cli).await?;
    let actor = context::actor(cli, &ctx)?;

    let mut payload = DecisionPayload::new();
    if let Some(amount) = amount {
        payload = payload.with_amount(amount);
    }
    if let Some(evidence) = evidence {
        payload = payload.with_evidence(evidence);
    }
    if let Some(remark) = remark {
        payload = payload.with_remark(remark);
    }

    let outcome = ReviewGateway::new(&ctx)
        .decide(&actor, request_id, decision.to_core_type(), payload)
        .await
        .map_err(report)?;

    if cli.json {
        return print_json(&outcome);
    }
    print_outcome(&outcome);
    Ok(())
}

pub async fn evidence(cli: &Cli, action: &EvidenceAction) -> Result<()> {
    let ctx = context::connect(cli).await?;
    let actor = context::actor(cli, &ctx)?;
    let gateway = ReviewGateway::new(&ctx);

    match action {
        EvidenceAction::Attach {
            request_id,
            locator,
            declared_amount,
        } => {
            let receipt_id = gateway
                .attach_evidence(&actor, request_id, locator, *declared_amount)
                .await
                .map_err(report)?;
            if cli.json {
                return print_json(&json!({ "receipt_id": receipt_id }));
            }
            println!("✅ Attached {} to {}", receipt_id, request_id);
        }
        EvidenceAction::Void { receipt_id } => {
            let receipt = gateway.void_evidence(&actor, receipt_id).await.map_err(report)?;
            if cli.json {
                return print_json(&receipt);
            }
            println!("✅ Voided {} on {}", receipt.id, receipt.request_id);
        }
    }
    Ok(())
}

fn print_request(request: &AidRequest) {
    println!("📋 {}", request.id);
    println!("   Requester: {}", request.requester_id);
    println!("   Category:  {} ({})", request.category_id, request.track);
    println!("   State:     {}{}", request.state, if request.is_active { "" } else { " (inactive)" });
    println!("   Requested: {}", request.requested_amount);
    if let Some(amount) = request.board_amount {
        println!("   Board:     {}", amount);
    }
    if let Some(amount) = request.approved_amount {
        println!("   Approved:  {}", amount);
    }
    println!("   Justification: {}", request.justification);
}

fn print_outcome(outcome: &DecisionOutcome) {
    println!(
        "✅ {} is now {}",
        outcome.request.id, outcome.request.state
    );
    if let Some(ref entry) = outcome.ledger_entry {
        println!("   Disbursed: {} ({})", entry.amount, entry.id);
    }
    if let Some(ref balance) = outcome.balance {
        println!("   Fund balance: {}", balance.current_balance);
    }
}
