//! Service wiring for one CLI invocation

use aidfund_business::{FundConfig, ServiceContext, WorkflowError};
use aidfund_core::Actor;
use anyhow::{anyhow, Context, Result};
use serde::Serialize;

use crate::Cli;

/// Load config and apply `--db`.
pub fn load_config(cli: &Cli) -> Result<FundConfig> {
    let mut config = FundConfig::load(cli.config.as_deref())?;
    if let Some(ref url) = cli.db {
        config.database.url = url.clone();
    }
    Ok(config)
}

pub async fn connect_with(config: &FundConfig) -> Result<ServiceContext> {
    ServiceContext::from_config(config)
        .await
        .with_context(|| format!("Failed to open {}", config.database.url))
}

pub async fn connect(cli: &Cli) -> Result<ServiceContext> {
    connect_with(&load_config(cli)?).await
}

/// Verify the `--session` token.
pub fn actor(cli: &Cli, ctx: &ServiceContext) -> Result<Actor> {
    let token = cli
        .session
        .as_deref()
        .ok_or_else(|| anyhow!("A session token is required (--session or AIDFUND_SESSION)"))?;
    ctx.authenticate(token).map_err(report)
}

/// Caller-facing form of a workflow error: kind plus remark, no internals.
pub fn report(err: WorkflowError) -> anyhow::Error {
    tracing::debug!(error = ?err, "Command failed");
    anyhow!("[{}] {}", err.kind(), err.remark())
}

/// Print as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
