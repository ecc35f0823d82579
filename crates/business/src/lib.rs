//! # Aidfund Business
//!
//! Request review workflow and the welfare fund ledger.
//!
//! ## Services
//!
//! - [`ReviewGateway`]: submit, decide, evidence, request queries
//! - [`FinalizationCoordinator`]: approval ⇒ exactly one disbursement outflow
//! - [`LedgerService`]: manual entries and ledger queries
//! - [`BalanceMaterializer`]: locked balance recomputation and reconciliation
//!
//! ## Usage
//!
//! ```rust,ignore
//! let ctx = ServiceContext::from_config(&FundConfig::load(None)?).await?;
//! let actor = ctx.authenticate(&token)?;
//! let outcome = ReviewGateway::new(&ctx)
//!     .decide(&actor, "REQ-...", Decision::Approve, payload)
//!     .await?;
//! ```

pub mod balance;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod finalize;
pub mod ledger;
pub mod review;
pub mod services;

pub use balance::{spawn_reconciler, BalanceMaterializer, ReconcileReport, SYSTEM_ACTOR};
pub use collaborators::{
    AuthorizationProvider, CategoryDirectory, ClaimsAuthorizer, EvidenceStore, NotificationEvent,
    Notifier, OutboxNotifier, SqliteEvidenceStore, StaticCategoryDirectory, TracingNotifier,
};
pub use config::{FundConfig, WorkflowConfig};
pub use error::{ErrorKind, WorkflowError, WorkflowResult};
pub use finalize::{Finalization, FinalizationCoordinator};
pub use ledger::LedgerService;
pub use review::{next_step, DecisionOutcome, ReviewGateway, Step};
pub use services::ServiceContext;
