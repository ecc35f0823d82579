use super::AuthorizationProvider;
use aidfund_core::{Actor, Capability};
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::debug;

/// Answers from the capabilities carried in the verified session.
///
/// Actor IDs on the revocation list are denied everything, which covers a
/// token that is still inside its lifetime after the account was disabled.
#[derive(Debug, Default)]
pub struct ClaimsAuthorizer {
    revoked: HashSet<String>,
}

impl ClaimsAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_revoked<I, S>(revoked: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            revoked: revoked.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl AuthorizationProvider for ClaimsAuthorizer {
    async fn has_capability(&self, actor: &Actor, capability: Capability) -> bool {
        if self.revoked.contains(actor.id()) {
            debug!(actor = actor.id(), "Revoked actor");
            return false;
        }
        actor.has(capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aidfund_core::{SessionClaims, SessionIssuer};
    use chrono::{Duration, Utc};

    fn actor(id: &str, caps: &[Capability]) -> Actor {
        let issuer = SessionIssuer::generate();
        let token = issuer
            .issue(SessionClaims::new(id, caps.iter().copied(), Duration::hours(1)))
            .unwrap();
        issuer.verifier().verify(&token, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_claims_and_revocation() {
        let reviewer = actor("REV-1", &[Capability::Review]);
        let authz = ClaimsAuthorizer::new();
        assert!(authz.has_capability(&reviewer, Capability::Review).await);
        assert!(!authz.has_capability(&reviewer, Capability::Board).await);

        let authz = ClaimsAuthorizer::with_revoked(["REV-1"]);
        assert!(!authz.has_capability(&reviewer, Capability::Review).await);
    }
}
