//! Database, balance and reconciliation commands

use aidfund_business::{spawn_reconciler, BalanceMaterializer, ReconcileReport, ReviewGateway};
use aidfund_core::Capability;
use anyhow::{bail, Result};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::context::{self, print_json, report};
use crate::Cli;

pub async fn init(cli: &Cli) -> Result<()> {
    let ctx = context::connect(cli).await?;
    ctx.db().close().await;
    if cli.json {
        return print_json(&json!({ "initialized": true }));
    }
    println!("✅ Database ready");
    Ok(())
}

pub async fn status(cli: &Cli) -> Result<()> {
    let ctx = context::connect(cli).await?;
    let stats = ReviewGateway::new(&ctx).request_stats().await.map_err(report)?;
    let balance = BalanceMaterializer::new(&ctx)
        .get_current_balance()
        .await
        .map_err(report)?;

    if cli.json {
        let counts: serde_json::Map<_, _> = stats
            .iter()
            .map(|(state, n)| (state.to_string(), json!(n)))
            .collect();
        return print_json(&json!({ "requests": counts, "balance": balance }));
    }
    println!("📊 Requests");
    for (state, count) in &stats {
        println!("   {:<15} {}", state, count);
    }
    println!("💰 Fund balance: {}", balance.current_balance);
    println!("   Through ledger #{} (revision {})", balance.last_entry_seq, balance.revision);
    Ok(())
}

pub async fn balance(cli: &Cli) -> Result<()> {
    let ctx = context::connect(cli).await?;
    let balance = BalanceMaterializer::new(&ctx)
        .get_current_balance()
        .await
        .map_err(report)?;
    if cli.json {
        return print_json(&balance);
    }
    println!("💰 {}", balance.current_balance);
    println!(
        "   Recomputed {} by {}",
        balance.recomputed_at.to_rfc3339(),
        balance.recomputed_by
    );
    Ok(())
}

pub async fn reconcile(cli: &Cli, repair: bool, watch: bool) -> Result<()> {
    let config = context::load_config(cli)?;
    let ctx = context::connect_with(&config).await?;
    let actor = context::actor(cli, &ctx)?;

    if !watch {
        let outcome = BalanceMaterializer::new(&ctx)
            .reconcile(&actor, repair)
            .await
            .map_err(report)?;
        if cli.json {
            return print_json(&outcome);
        }
        print_report(&outcome);
        return Ok(());
    }

    // The watcher always repairs, so the caller must be allowed to.
    for capability in [Capability::Audit, Capability::Treasury] {
        ctx.require(&actor, capability).await.map_err(report)?;
    }
    let Some(interval) = config.reconcile_interval() else {
        bail!("reconcile_interval_secs is not set in the config");
    };

    let handle = spawn_reconciler(Arc::new(ctx), interval);
    info!(interval_secs = interval.as_secs(), "Reconciler running, Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    handle.abort();
    Ok(())
}

fn print_report(outcome: &ReconcileReport) {
    let materialized = outcome
        .materialized
        .map(|m| m.to_string())
        .unwrap_or_else(|| "(none)".to_string());
    if outcome.is_consistent() {
        println!("✅ Balance matches the ledger: {}", outcome.aggregated);
    } else {
        println!("⚠️  Drift detected");
        println!("   Cached:     {}", materialized);
        println!("   Ledger sum: {}", outcome.aggregated);
        println!("   Drift:      {}", outcome.drift);
    }
    println!(
        "   {} entries through #{}{}",
        outcome.entry_count,
        outcome.last_entry_seq,
        if outcome.repaired { ", repaired" } else { "" }
    );
}
