//! External collaborators consumed by the workflow
//!
//! The core only talks to these traits. Default adapters live in the
//! submodules; deployments can swap any of them on `ServiceContext`.

mod authz;
mod directory;
mod evidence;
mod notify;

pub use authz::ClaimsAuthorizer;
pub use directory::StaticCategoryDirectory;
pub use evidence::SqliteEvidenceStore;
pub use notify::{OutboxNotifier, TracingNotifier};

use aidfund_core::{Actor, Amount, Capability, CategoryPolicy, Receipt};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use strum_macros::{AsRefStr, Display};

/// Identity/authorization provider
#[async_trait]
pub trait AuthorizationProvider: Send + Sync {
    /// A negative answer surfaces as `Unauthorized`.
    async fn has_capability(&self, actor: &Actor, capability: Capability) -> bool;
}

/// Store of proof-of-disbursement artifacts.
///
/// The workflow never sees file bytes or storage paths, only artifact IDs.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    async fn attach_evidence(
        &self,
        request_id: &str,
        uploader_id: &str,
        locator: &str,
        declared_amount: Option<Amount>,
    ) -> anyhow::Result<String>;

    async fn has_active_evidence(&self, request_id: &str) -> anyhow::Result<bool>;

    /// Whether `artifact_id` is attached to `request_id` and not void.
    async fn is_active_artifact(&self, request_id: &str, artifact_id: &str)
        -> anyhow::Result<bool>;

    /// `is_active_artifact` evaluated on the connection that holds the
    /// decision's transaction, so a void that lands after validation is seen
    /// before commit. Stores kept outside the fund database re-ask their backend.
    async fn confirm_active_in(
        &self,
        _conn: &mut SqliteConnection,
        request_id: &str,
        artifact_id: &str,
    ) -> anyhow::Result<bool> {
        self.is_active_artifact(request_id, artifact_id).await
    }

    async fn get_evidence(&self, artifact_id: &str) -> anyhow::Result<Option<Receipt>>;

    async fn list_evidence(&self, request_id: &str) -> anyhow::Result<Vec<Receipt>>;

    /// Returns `false` if the artifact was already void.
    async fn void_evidence(&self, artifact_id: &str) -> anyhow::Result<bool>;
}

/// Category master data
#[async_trait]
pub trait CategoryDirectory: Send + Sync {
    async fn policy(&self, category_id: &str) -> Option<CategoryPolicy>;

    async fn is_board_required(&self, category_id: &str) -> bool {
        self.policy(category_id)
            .await
            .map_or(false, |p| p.is_board_required())
    }

    /// Approval ceiling; `None` for unknown or unlimited categories.
    async fn max_amount(&self, category_id: &str) -> Option<Decimal> {
        self.policy(category_id).await.and_then(|p| p.max_amount)
    }
}

/// Event sent to the requester after an accepted transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationEvent {
    RequestSubmitted,
    BoardReviewed,
    Approved,
    Rejected,
}

/// Outbound notification delivery
///
/// Called after commit. Errors are logged and never undo the transition.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        user_id: &str,
        event: NotificationEvent,
        payload: serde_json::Value,
    ) -> anyhow::Result<()>;
}
