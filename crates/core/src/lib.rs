//! # Aidfund Core
//!
//! Domain types shared by every Aidfund crate:
//! - `Amount`: non-negative decimal for money
//! - `AidRequest`, `RequestState`, `ReviewTrack`: the request lifecycle
//! - `StatusLogEntry`: immutable audit trail per transition
//! - `Receipt`: evidentiary artifact proving disbursement
//! - `LedgerEntry`, `FundBalance`: the welfare fund ledger
//! - `Actor`, `Capability`, `SessionToken`: verified caller identity
//!
//! This crate does no I/O.

pub mod actor;
pub mod amount;
pub mod category;
pub mod error;
pub mod ledger;
pub mod receipt;
pub mod request;
pub mod status_log;

pub use actor::{Actor, Capability, SessionClaims, SessionIssuer, SessionToken, SessionVerifier};
pub use amount::Amount;
pub use category::{CategoryPolicy, ReviewTrack};
pub use error::{CoreError, CoreResult};
pub use ledger::{Direction, FundBalance, LedgerEntry, NewLedgerEntry, DISBURSEMENT_CATEGORY};
pub use receipt::{Receipt, ReceiptStatus};
pub use request::{AidRequest, Decision, DecisionPayload, RequestState};
pub use status_log::StatusLogEntry;
