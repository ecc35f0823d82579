//! Session key and token commands
//!
//! Stands in for the identity provider: the signing seed never belongs in
//! the fund config, only the verifying key does.

use aidfund_core::{SessionClaims, SessionIssuer};
use anyhow::{Context, Result};
use chrono::Duration;
use serde_json::json;

use crate::context::print_json;
use crate::SessionAction;

pub fn handle(action: &SessionAction, as_json: bool) -> Result<()> {
    match action {
        SessionAction::Keygen => {
            let issuer = SessionIssuer::generate();
            if as_json {
                return print_json(&json!({
                    "signing_key": issuer.seed_hex(),
                    "verifying_key": issuer.verifying_key_hex(),
                }));
            }
            println!("Signing key (keep secret):  {}", issuer.seed_hex());
            println!("Verifying key (config):     {}", issuer.verifying_key_hex());
        }
        SessionAction::Issue {
            actor,
            capabilities,
            ttl_hours,
            signing_key,
        } => {
            let issuer = SessionIssuer::from_hex(signing_key).context("Invalid signing key")?;
            let claims = SessionClaims::new(
                actor,
                capabilities.iter().map(|c| c.to_core_type()),
                Duration::hours(*ttl_hours),
            );
            let expires_at = claims.expires_at;
            let token = issuer.issue(claims)?.encode();
            if as_json {
                return print_json(&json!({ "token": token, "expires_at": expires_at }));
            }
            println!("{}", token);
            eprintln!("Session for {} expires {}", actor, expires_at.to_rfc3339());
        }
    }
    Ok(())
}
