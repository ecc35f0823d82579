//! Ledger and finalization commands

use aidfund_business::{FinalizationCoordinator, LedgerService};
use aidfund_core::{Amount, LedgerEntry};
use aidfund_persistence::LedgerFilter;
use anyhow::Result;
use rust_decimal::Decimal;

use crate::context::{self, print_json, report};
use crate::{Cli, LedgerAction};

pub async fn handle(cli: &Cli, action: &LedgerAction) -> Result<()> {
    let ctx = context::connect(cli).await?;
    let service = LedgerService::new(&ctx);

    match action {
        LedgerAction::Record {
            direction,
            amount,
            category,
            request,
            description,
        } => {
            let actor = context::actor(cli, &ctx)?;
            let entry = service
                .record_entry(
                    &actor,
                    direction.to_core_type(),
                    *amount,
                    category,
                    request.as_deref(),
                    description,
                )
                .await
                .map_err(report)?;
            if cli.json {
                return print_json(&entry);
            }
            println!("✅ Recorded {}", entry.id);
            print_entry(&entry);
        }
        LedgerAction::List {
            direction,
            category,
            request,
            limit,
        } => {
            let filter = LedgerFilter {
                direction: direction.map(|d| d.to_core_type()),
                category: category.clone(),
                request_id: request.clone(),
                limit: *limit,
            };
            let entries = service.list_entries(&filter).await.map_err(report)?;
            if cli.json {
                return print_json(&entries);
            }
            if entries.is_empty() {
                println!("No ledger entries");
            }
            for entry in &entries {
                print_entry(entry);
            }
        }
        LedgerAction::Describe {
            entry_id,
            description,
        } => {
            let actor = context::actor(cli, &ctx)?;
            let entry = service
                .update_description(&actor, entry_id, description)
                .await
                .map_err(report)?;
            if cli.json {
                return print_json(&entry);
            }
            println!("✅ Updated {}", entry.id);
        }
    }
    Ok(())
}

pub async fn finalize(cli: &Cli, request_id: &str, amount: Decimal) -> Result<()> {
    let ctx = context::connect(cli).await?;
    let actor = context::actor(cli, &ctx)?;
    let amount = Amount::positive(amount)?;

    let finalization = FinalizationCoordinator::new(&ctx)
        .finalize(&actor, request_id, amount)
        .await
        .map_err(report)?;
    if cli.json {
        return print_json(&finalization);
    }
    if finalization.created {
        println!("✅ Disbursement recorded for {}", request_id);
    } else {
        println!("ℹ️  {} was already disbursed", request_id);
    }
    print_entry(&finalization.entry);
    Ok(())
}

fn print_entry(entry: &LedgerEntry) {
    println!(
        "#{:<5} {}  {:<8} {:>10}  {:<14} {}  bal={}  {}",
        entry.seq,
        entry.created_at.format("%Y-%m-%d %H:%M"),
        entry.direction,
        entry.amount,
        entry.category,
        entry.request_id.as_deref().unwrap_or("-"),
        entry
            .balance_after
            .map(|b| b.to_string())
            .unwrap_or_else(|| "?".to_string()),
        entry.description,
    );
}
