//! Service context shared by every workflow service

use crate::collaborators::{
    AuthorizationProvider, CategoryDirectory, ClaimsAuthorizer, EvidenceStore, Notifier,
    NotificationEvent, OutboxNotifier, SqliteEvidenceStore, StaticCategoryDirectory,
    TracingNotifier,
};
use crate::config::{FundConfig, WorkflowConfig};
use crate::error::{WorkflowError, WorkflowResult};
use aidfund_core::{Actor, Capability, SessionVerifier};
use aidfund_persistence::{Database, OutboxStore};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Database access, collaborators and workflow settings.
///
/// Services borrow the context (`ReviewGateway::new(&ctx)`); wrap it in an
/// `Arc` to share it between tasks.
pub struct ServiceContext {
    db: Database,
    authz: Arc<dyn AuthorizationProvider>,
    evidence: Arc<dyn EvidenceStore>,
    directory: Arc<dyn CategoryDirectory>,
    notifier: Arc<dyn Notifier>,
    verifier: Option<SessionVerifier>,
    workflow: WorkflowConfig,
    /// Serializes balance recomputation within this process
    balance_lock: Mutex<()>,
}

impl ServiceContext {
    /// Context with the default adapters: claims-based authorization,
    /// SQLite receipts and logged notifications.
    pub fn new(db: Database, directory: Arc<dyn CategoryDirectory>) -> Self {
        let evidence = Arc::new(SqliteEvidenceStore::new(db.pool().clone()));
        Self {
            db,
            authz: Arc::new(ClaimsAuthorizer::new()),
            evidence,
            directory,
            notifier: Arc::new(TracingNotifier),
            verifier: None,
            workflow: WorkflowConfig::default(),
            balance_lock: Mutex::new(()),
        }
    }

    /// Connect the database and wire adapters from configuration.
    pub async fn from_config(config: &FundConfig) -> anyhow::Result<Self> {
        let db = Database::connect(&config.database).await?;
        let directory = Arc::new(StaticCategoryDirectory::new(config.categories.clone()));
        let mut ctx = Self::new(db, directory).with_workflow(config.workflow.clone());

        if let Some(ref key) = config.session.verifying_key {
            ctx = ctx.with_verifier(SessionVerifier::from_hex(key)?);
        }
        if let Some(ref dir) = config.notifications.outbox_dir {
            let outbox = Arc::new(OutboxStore::new(dir)?);
            ctx = ctx.with_notifier(Arc::new(OutboxNotifier::new(outbox)));
            info!(dir = %dir.display(), "Notification outbox enabled");
        }
        Ok(ctx)
    }

    pub fn with_authorizer(mut self, authz: Arc<dyn AuthorizationProvider>) -> Self {
        self.authz = authz;
        self
    }

    pub fn with_evidence_store(mut self, evidence: Arc<dyn EvidenceStore>) -> Self {
        self.evidence = evidence;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_verifier(mut self, verifier: SessionVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_workflow(mut self, workflow: WorkflowConfig) -> Self {
        self.workflow = workflow;
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn pool(&self) -> &SqlitePool {
        self.db.pool()
    }

    pub fn evidence(&self) -> &dyn EvidenceStore {
        self.evidence.as_ref()
    }

    pub fn directory(&self) -> &dyn CategoryDirectory {
        self.directory.as_ref()
    }

    pub fn workflow(&self) -> &WorkflowConfig {
        &self.workflow
    }

    pub(crate) fn balance_lock(&self) -> &Mutex<()> {
        &self.balance_lock
    }

    /// Turn a transport-encoded session token into a verified actor.
    pub fn authenticate(&self, token: &str) -> WorkflowResult<Actor> {
        let verifier = self
            .verifier
            .as_ref()
            .ok_or_else(|| WorkflowError::InvalidSession("no verifying key configured".to_string()))?;
        Ok(verifier.verify_encoded(token, Utc::now())?)
    }

    /// Fail with `Unauthorized` unless the actor holds `capability`.
    pub async fn require(&self, actor: &Actor, capability: Capability) -> WorkflowResult<()> {
        if self.authz.has_capability(actor, capability).await {
            Ok(())
        } else {
            Err(WorkflowError::unauthorized(actor.id(), capability))
        }
    }

    /// Like `require`, accepting any of several capabilities.
    pub async fn require_any(
        &self,
        actor: &Actor,
        capabilities: &[Capability],
    ) -> WorkflowResult<Capability> {
        for capability in capabilities {
            if self.authz.has_capability(actor, *capability).await {
                return Ok(*capability);
            }
        }
        let first = capabilities.first().copied().unwrap_or(Capability::Administer);
        Err(WorkflowError::unauthorized(actor.id(), first))
    }

    pub async fn has_capability(&self, actor: &Actor, capability: Capability) -> bool {
        self.authz.has_capability(actor, capability).await
    }

    /// Send a notification; failures are logged and swallowed.
    pub async fn notify(&self, user_id: &str, event: NotificationEvent, payload: serde_json::Value) {
        if let Err(e) = self.notifier.notify(user_id, event, payload).await {
            warn!(user = user_id, event = %event, error = %e, "Notification failed");
        }
    }
}
