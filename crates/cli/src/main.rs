//! Aidfund CLI - student aid review and welfare fund ledger
//!
//! Usage:
//! ```bash
//! aidfund session keygen
//! aidfund session issue --actor REV-001 --cap review
//! aidfund request submit --requester STU-001 --category emergency --amount 450 --justification "Rent"
//! aidfund evidence attach REQ-... --locator receipts/r1.pdf
//! aidfund decide REQ-... approve --amount 400 --evidence RCP-...
//! aidfund ledger record inflow 1000 --category donation
//! aidfund balance
//! aidfund reconcile --repair
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod context;

use commands::{admin, ledger, request, session};

/// Aidfund - financial-aid review workflow and welfare fund ledger
#[derive(Parser)]
#[command(name = "aidfund")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// JSON config file (defaults to ./aidfund.json when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database URL, overrides the config file
    #[arg(long, global = true, env = "AIDFUND_DATABASE_URL")]
    pub db: Option<String>,

    /// Signed session token proving the caller's identity
    #[arg(long, global = true, env = "AIDFUND_SESSION", hide_env_values = true)]
    pub session: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database schema
    Init,

    /// Show request counts and the fund balance
    Status,

    /// Session keys and tokens
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Aid request intake and queries
    Request {
        #[command(subcommand)]
        action: RequestAction,
    },

    /// Approve or reject a request
    Decide {
        /// Request ID (REQ-...)
        request_id: String,
        decision: DecisionArg,
        /// Amount to approve, or to fix at board review
        #[arg(long)]
        amount: Option<Decimal>,
        /// Receipt ID proving disbursement
        #[arg(long)]
        evidence: Option<String>,
        #[arg(long)]
        remark: Option<String>,
    },

    /// Proof-of-disbursement receipts
    Evidence {
        #[command(subcommand)]
        action: EvidenceAction,
    },

    /// Fund ledger
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },

    /// Re-run finalization for an approved request
    Finalize {
        request_id: String,
        /// Approved amount on record
        amount: Decimal,
    },

    /// Show the current fund balance
    Balance,

    /// Compare the balance with a full ledger aggregation
    Reconcile {
        /// Rebuild the cached balance from the ledger
        #[arg(long)]
        repair: bool,
        /// Keep running at the configured interval until interrupted
        #[arg(long)]
        watch: bool,
    },
}

#[derive(Subcommand)]
pub enum SessionAction {
    /// Generate a signing key pair
    Keygen,
    /// Issue a session token
    Issue {
        #[arg(long)]
        actor: String,
        /// Capabilities (comma-separated)
        #[arg(long = "cap", value_delimiter = ',', required = true)]
        capabilities: Vec<CapabilityArg>,
        #[arg(long, default_value_t = 8)]
        ttl_hours: i64,
        /// Hex signing key seed
        #[arg(long, env = "AIDFUND_SIGNING_KEY", hide_env_values = true)]
        signing_key: String,
    },
}

#[derive(Subcommand)]
pub enum RequestAction {
    /// Submit a new request
    Submit {
        #[arg(long)]
        requester: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        justification: String,
    },
    /// Show a request with its history, receipts and ledger entries
    Show { request_id: String },
    /// List requests
    List {
        #[arg(long)]
        state: Option<StateArg>,
        #[arg(long)]
        requester: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// Include deactivated requests
        #[arg(long)]
        all: bool,
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Soft-deactivate a request
    Deactivate { request_id: String },
}

#[derive(Subcommand)]
pub enum EvidenceAction {
    /// Attach a receipt to a request
    Attach {
        request_id: String,
        /// Document locator in the external store
        #[arg(long)]
        locator: String,
        #[arg(long)]
        declared_amount: Option<Decimal>,
    },
    /// Void a receipt
    Void { receipt_id: String },
}

#[derive(Subcommand)]
pub enum LedgerAction {
    /// Record a manual fund movement
    Record {
        direction: DirectionArg,
        amount: Decimal,
        #[arg(long, default_value = "donation")]
        category: String,
        /// Request the movement relates to
        #[arg(long)]
        request: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List ledger entries
    List {
        #[arg(long)]
        direction: Option<DirectionArg>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        request: Option<String>,
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Change an entry's description
    Describe { entry_id: String, description: String },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum DecisionArg {
    Approve,
    Reject,
}

impl DecisionArg {
    pub fn to_core_type(self) -> aidfund_core::Decision {
        match self {
            DecisionArg::Approve => aidfund_core::Decision::Approve,
            DecisionArg::Reject => aidfund_core::Decision::Reject,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum DirectionArg {
    Inflow,
    Outflow,
}

impl DirectionArg {
    pub fn to_core_type(self) -> aidfund_core::Direction {
        match self {
            DirectionArg::Inflow => aidfund_core::Direction::Inflow,
            DirectionArg::Outflow => aidfund_core::Direction::Outflow,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StateArg {
    Submitted,
    BoardReviewed,
    Approved,
    Rejected,
}

impl StateArg {
    pub fn to_core_type(self) -> aidfund_core::RequestState {
        match self {
            StateArg::Submitted => aidfund_core::RequestState::Submitted,
            StateArg::BoardReviewed => aidfund_core::RequestState::BoardReviewed,
            StateArg::Approved => aidfund_core::RequestState::Approved,
            StateArg::Rejected => aidfund_core::RequestState::Rejected,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum CapabilityArg {
    Submit,
    Review,
    Board,
    Treasury,
    Audit,
    Administer,
}

impl CapabilityArg {
    pub fn to_core_type(self) -> aidfund_core::Capability {
        match self {
            CapabilityArg::Submit => aidfund_core::Capability::Submit,
            CapabilityArg::Review => aidfund_core::Capability::Review,
            CapabilityArg::Board => aidfund_core::Capability::Board,
            CapabilityArg::Treasury => aidfund_core::Capability::Treasury,
            CapabilityArg::Audit => aidfund_core::Capability::Audit,
            CapabilityArg::Administer => aidfund_core::Capability::Administer,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Session { ref action } => session::handle(action, cli.json)?,
        Commands::Init => admin::init(&cli).await?,
        Commands::Status => admin::status(&cli).await?,
        Commands::Balance => admin::balance(&cli).await?,
        Commands::Reconcile { repair, watch } => admin::reconcile(&cli, repair, watch).await?,
        Commands::Request { ref action } => request::handle(&cli, action).await?,
        Commands::Decide {
            ref request_id,
            decision,
            amount,
            ref evidence,
            ref remark,
        } => {
            request::decide(
                &cli,
                request_id,
                decision,
                amount,
                evidence.as_deref(),
                remark.as_deref(),
            )
            .await?
        }
        Commands::Evidence { ref action } => request::evidence(&cli, action).await?,
        Commands::Ledger { ref action } => ledger::handle(&cli, action).await?,
        Commands::Finalize {
            ref request_id,
            amount,
        } => ledger::finalize(&cli, request_id, amount).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_decide() {
        let cli = Cli::try_parse_from([
            "aidfund",
            "decide",
            "REQ-1",
            "approve",
            "--amount",
            "120.50",
            "--evidence",
            "RCP-1",
        ])
        .unwrap();

        match cli.command {
            Commands::Decide {
                request_id,
                decision,
                amount,
                evidence,
                remark,
            } => {
                assert_eq!(request_id, "REQ-1");
                assert_eq!(decision.to_core_type(), aidfund_core::Decision::Approve);
                assert_eq!(amount, Some(Decimal::new(12050, 2)));
                assert_eq!(evidence.as_deref(), Some("RCP-1"));
                assert!(remark.is_none());
            }
            _ => panic!("expected decide"),
        }
    }

    #[test]
    fn test_parse_capability_list() {
        let cli = Cli::try_parse_from([
            "aidfund",
            "session",
            "issue",
            "--actor",
            "REV-001",
            "--cap",
            "review,board",
            "--signing-key",
            "00",
        ])
        .unwrap();

        let Commands::Session {
            action: SessionAction::Issue { capabilities, .. },
        } = cli.command
        else {
            panic!("expected session issue");
        };
        let caps: Vec<_> = capabilities.iter().map(|c| c.to_core_type()).collect();
        assert_eq!(
            caps,
            vec![aidfund_core::Capability::Review, aidfund_core::Capability::Board]
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["aidfund", "balance", "--db", "sqlite::memory:", "--json"]).unwrap();
        assert_eq!(cli.db.as_deref(), Some("sqlite::memory:"));
        assert!(cli.json);
    }
}
