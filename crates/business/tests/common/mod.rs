//! Shared fixtures for the integration tests

#![allow(dead_code)]

use aidfund_business::{ServiceContext, StaticCategoryDirectory};
use aidfund_core::{Actor, Capability, CategoryPolicy, SessionClaims, SessionIssuer};
use aidfund_persistence::{Database, DatabaseConfig};
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;
use tempfile::TempDir;

pub struct Harness {
    pub ctx: Arc<ServiceContext>,
    pub directory: Arc<StaticCategoryDirectory>,
    pub issuer: SessionIssuer,
    _dir: Option<TempDir>,
}

pub fn categories() -> Vec<CategoryPolicy> {
    vec![
        CategoryPolicy::fast_track("emergency", dec!(500)),
        CategoryPolicy {
            evidence_required: false,
            ..CategoryPolicy::fast_track("books", dec!(300))
        },
        CategoryPolicy::board("medical"),
    ]
}

impl Harness {
    pub async fn in_memory() -> Self {
        Self::build(Database::in_memory().await.unwrap(), None, |ctx| ctx)
    }

    /// On-disk database with a multi-connection pool
    pub async fn on_disk() -> Self {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite:{}", dir.path().join("fund.db").display());
        let db = Database::connect(&DatabaseConfig::with_url(&url)).await.unwrap();
        Self::build(db, Some(dir), |ctx| ctx)
    }

    pub async fn with<F>(customize: F) -> Self
    where
        F: FnOnce(ServiceContext) -> ServiceContext,
    {
        Self::build(Database::in_memory().await.unwrap(), None, customize)
    }

    fn build<F>(db: Database, dir: Option<TempDir>, customize: F) -> Self
    where
        F: FnOnce(ServiceContext) -> ServiceContext,
    {
        let directory = Arc::new(StaticCategoryDirectory::new(categories()));
        let issuer = SessionIssuer::generate();
        let ctx = ServiceContext::new(db, directory.clone()).with_verifier(issuer.verifier());
        Self {
            ctx: Arc::new(customize(ctx)),
            directory,
            issuer,
            _dir: dir,
        }
    }

    pub fn actor(&self, id: &str, capabilities: &[Capability]) -> Actor {
        let claims = SessionClaims::new(id, capabilities.iter().copied(), Duration::hours(1));
        let token = self.issuer.issue(claims).unwrap();
        self.issuer.verifier().verify(&token, Utc::now()).unwrap()
    }

    pub fn student(&self) -> Actor {
        self.actor("STU-001", &[Capability::Submit])
    }

    pub fn reviewer(&self) -> Actor {
        self.actor("REV-001", &[Capability::Review])
    }

    pub fn board(&self) -> Actor {
        self.actor("BRD-001", &[Capability::Board])
    }

    pub fn treasurer(&self) -> Actor {
        self.actor("TRE-001", &[Capability::Treasury, Capability::Audit])
    }

    pub fn admin(&self) -> Actor {
        self.actor("ADM-001", &[Capability::Administer])
    }
}
