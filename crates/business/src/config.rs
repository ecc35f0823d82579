//! Fund configuration
//!
//! Loaded from a JSON file, then overridden from the environment.
//! Every field has a default so a partial file is enough.

use aidfund_core::CategoryPolicy;
use aidfund_persistence::DatabaseConfig;
use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_DATABASE_URL: &str = "AIDFUND_DATABASE_URL";
pub const ENV_VERIFYING_KEY: &str = "AIDFUND_VERIFYING_KEY";
pub const ENV_OUTBOX_DIR: &str = "AIDFUND_OUTBOX_DIR";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// Category table: track, ceiling, evidence rule
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryPolicy>,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Period of the background balance reconciliation; off when unset
    #[serde(default)]
    pub reconcile_interval_secs: Option<u64>,
}

/// Review workflow tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Board-track rejection remarks must be longer than this many characters
    #[serde(default = "default_board_min_remark_chars")]
    pub board_min_remark_chars: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Hex Ed25519 public key used to verify session tokens
    #[serde(default)]
    pub verifying_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Directory for the JSONL outbox. Notifications are only logged when unset.
    #[serde(default)]
    pub outbox_dir: Option<PathBuf>,
}

fn default_board_min_remark_chars() -> usize {
    10
}

fn default_categories() -> Vec<CategoryPolicy> {
    vec![
        CategoryPolicy::fast_track("emergency", Decimal::new(500, 0)),
        CategoryPolicy::fast_track("books", Decimal::new(300, 0)),
        CategoryPolicy::board("medical"),
        CategoryPolicy::board("tuition"),
    ]
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            board_min_remark_chars: default_board_min_remark_chars(),
        }
    }
}

impl Default for FundConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            workflow: WorkflowConfig::default(),
            categories: default_categories(),
            session: SessionConfig::default(),
            notifications: NotificationConfig::default(),
            reconcile_interval_secs: None,
        }
    }
}

impl FundConfig {
    /// Load configuration from JSON file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))
    }

    /// File if given (or `aidfund.json` when present), else defaults; then env overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new("aidfund.json").exists() => Self::from_file(Path::new("aidfund.json"))?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_DATABASE_URL) {
            self.database.url = url;
        }
        if let Some(key) = lookup(ENV_VERIFYING_KEY) {
            self.session.verifying_key = Some(key);
        }
        if let Some(dir) = lookup(ENV_OUTBOX_DIR) {
            self.notifications.outbox_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn reconcile_interval(&self) -> Option<Duration> {
        self.reconcile_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aidfund_core::ReviewTrack;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = FundConfig::default();
        assert_eq!(config.workflow.board_min_remark_chars, 10);
        assert_eq!(config.categories.len(), 4);
        assert!(config.session.verifying_key.is_none());
        assert!(config.reconcile_interval().is_none());
    }

    #[test]
    fn test_partial_json() {
        let json = r#"{
            "categories": [
                {"id": "hardship", "track": "fast_track", "max_amount": "250"},
                {"category_id": "surgery", "track": "board", "evidence_required": false}
            ],
            "reconcile_interval_secs": 60
        }"#;
        let config: FundConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.categories[0].category_id, "hardship");
        assert_eq!(config.categories[0].max_amount, Some(dec!(250)));
        assert!(config.categories[0].evidence_required);
        assert_eq!(config.categories[1].track, ReviewTrack::Board);
        assert!(!config.categories[1].evidence_required);
        assert_eq!(config.database.busy_timeout_ms, 5_000);
        assert_eq!(config.reconcile_interval(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_DATABASE_URL, "sqlite:/tmp/override.db"),
            (ENV_OUTBOX_DIR, "/tmp/outbox"),
        ]
        .into_iter()
        .collect();

        let mut config = FundConfig::default();
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.url, "sqlite:/tmp/override.db");
        assert_eq!(config.notifications.outbox_dir, Some(PathBuf::from("/tmp/outbox")));
        assert!(config.session.verifying_key.is_none());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("aidfund.json");
        std::fs::write(&path, r#"{"workflow": {"board_min_remark_chars": 20}}"#).unwrap();

        let config = FundConfig::from_file(&path).unwrap();
        assert_eq!(config.workflow.board_min_remark_chars, 20);
        assert!(FundConfig::from_file(&dir.path().join("missing.json")).is_err());
    }
}
