use super::CategoryDirectory;
use aidfund_core::CategoryPolicy;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory category table built from configuration.
///
/// `replace` swaps the whole table, as a configuration reload would.
#[derive(Debug, Default)]
pub struct StaticCategoryDirectory {
    policies: RwLock<HashMap<String, CategoryPolicy>>,
}

impl StaticCategoryDirectory {
    pub fn new<I>(policies: I) -> Self
    where
        I: IntoIterator<Item = CategoryPolicy>,
    {
        Self {
            policies: RwLock::new(Self::index(policies)),
        }
    }

    fn index<I>(policies: I) -> HashMap<String, CategoryPolicy>
    where
        I: IntoIterator<Item = CategoryPolicy>,
    {
        policies
            .into_iter()
            .map(|p| (p.category_id.clone(), p))
            .collect()
    }

    pub async fn replace<I>(&self, policies: I)
    where
        I: IntoIterator<Item = CategoryPolicy>,
    {
        *self.policies.write().await = Self::index(policies);
    }

    pub async fn categories(&self) -> Vec<CategoryPolicy> {
        let mut all: Vec<_> = self.policies.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.category_id.cmp(&b.category_id));
        all
    }
}

#[async_trait]
impl CategoryDirectory for StaticCategoryDirectory {
    async fn policy(&self, category_id: &str) -> Option<CategoryPolicy> {
        self.policies.read().await.get(category_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_lookup_and_replace() {
        let directory = StaticCategoryDirectory::new([
            CategoryPolicy::fast_track("emergency", dec!(500)),
            CategoryPolicy::board("medical"),
        ]);

        assert!(directory.is_board_required("medical").await);
        assert!(!directory.is_board_required("emergency").await);
        assert!(!directory.is_board_required("unknown").await);
        assert_eq!(directory.max_amount("emergency").await, Some(dec!(500)));
        assert_eq!(directory.max_amount("medical").await, None);

        directory.replace([CategoryPolicy::board("emergency")]).await;
        assert!(directory.is_board_required("emergency").await);
        assert!(directory.policy("medical").await.is_none());
    }
}
