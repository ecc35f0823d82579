//! # Actor Module
//!
//! Verified caller identity. An `Actor` can only be produced by
//! `SessionVerifier::verify`, so the core never treats a bare identifier
//! (an email, a user id string) as proof of authorization.
//!
//! Tokens are Ed25519-signed claims encoded as `hex(claims_json).hex(signature)`.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum_macros::{AsRefStr, Display, EnumString};

/// Capability granted to a caller by the identity provider.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
    /// Submit requests and upload receipts
    Submit,
    /// General reviewer: fast-track decisions, board-track screening and disbursement
    Review,
    /// Specialized review board
    Board,
    /// Record manual ledger entries
    Treasury,
    /// Read-only reconciliation and reporting
    Audit,
    /// Soft-deactivate requests
    Administer,
}

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub actor_id: String,
    pub capabilities: BTreeSet<Capability>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionClaims {
    pub fn new<I>(actor_id: &str, capabilities: I, ttl: Duration) -> Self
    where
        I: IntoIterator<Item = Capability>,
    {
        let issued_at = Utc::now();
        Self {
            actor_id: actor_id.to_string(),
            capabilities: capabilities.into_iter().collect(),
            issued_at,
            expires_at: issued_at + ttl,
        }
    }
}

/// Signed session token presented with every core call.
#[derive(Debug, Clone)]
pub struct SessionToken {
    payload: Vec<u8>,
    claims: SessionClaims,
    signature: [u8; 64],
}

impl SessionToken {
    pub fn claims(&self) -> &SessionClaims {
        &self.claims
    }

    /// Encode for transport: `hex(claims_json).hex(signature)`
    pub fn encode(&self) -> String {
        format!("{}.{}", hex::encode(&self.payload), hex::encode(self.signature))
    }

    pub fn decode(token: &str) -> CoreResult<Self> {
        let (payload_hex, signature_hex) = token
            .trim()
            .split_once('.')
            .ok_or_else(|| CoreError::MalformedSession("missing separator".to_string()))?;

        let payload = hex::decode(payload_hex)
            .map_err(|e| CoreError::MalformedSession(format!("claims: {}", e)))?;
        let signature: [u8; 64] = hex::decode(signature_hex)
            .map_err(|e| CoreError::MalformedSession(format!("signature: {}", e)))?
            .try_into()
            .map_err(|_| CoreError::MalformedSession("signature must be 64 bytes".to_string()))?;
        let claims: SessionClaims = serde_json::from_slice(&payload)
            .map_err(|e| CoreError::MalformedSession(format!("claims: {}", e)))?;

        Ok(Self {
            payload,
            claims,
            signature,
        })
    }
}

/// Issues session tokens. Held by the identity provider, never by reviewers.
pub struct SessionIssuer {
    signing_key: SigningKey,
}

impl SessionIssuer {
    /// Create from a 32-byte seed (hex-encoded)
    pub fn from_hex(hex_seed: &str) -> CoreResult<Self> {
        let seed: [u8; 32] = hex::decode(hex_seed.trim())
            .map_err(|e| CoreError::InvalidKey(e.to_string()))?
            .try_into()
            .map_err(|_| CoreError::InvalidKey("seed must be 32 bytes".to_string()))?;

        Ok(Self {
            signing_key: SigningKey::from_bytes(&seed),
        })
    }

    /// Generate a new random signing key
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            signing_key: SigningKey::generate(&mut rng),
        }
    }

    pub fn seed_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    pub fn verifying_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }

    pub fn verifier(&self) -> SessionVerifier {
        SessionVerifier {
            verifying_key: self.signing_key.verifying_key(),
        }
    }

    pub fn issue(&self, claims: SessionClaims) -> CoreResult<SessionToken> {
        let payload = serde_json::to_vec(&claims)
            .map_err(|e| CoreError::MalformedSession(e.to_string()))?;
        let signature = self.signing_key.sign(&payload).to_bytes();

        Ok(SessionToken {
            payload,
            claims,
            signature,
        })
    }
}

/// Verifies session tokens and yields the `Actor` they describe.
#[derive(Clone)]
pub struct SessionVerifier {
    verifying_key: VerifyingKey,
}

impl SessionVerifier {
    pub fn from_hex(public_key_hex: &str) -> CoreResult<Self> {
        let bytes: [u8; 32] = hex::decode(public_key_hex.trim())
            .map_err(|e| CoreError::InvalidKey(e.to_string()))?
            .try_into()
            .map_err(|_| CoreError::InvalidKey("public key must be 32 bytes".to_string()))?;
        let verifying_key =
            VerifyingKey::from_bytes(&bytes).map_err(|e| CoreError::InvalidKey(e.to_string()))?;

        Ok(Self { verifying_key })
    }

    pub fn verify(&self, token: &SessionToken, now: DateTime<Utc>) -> CoreResult<Actor> {
        let signature = Signature::from_bytes(&token.signature);
        self.verifying_key
            .verify(&token.payload, &signature)
            .map_err(|_| CoreError::BadSessionSignature)?;

        if token.claims.expires_at <= now {
            return Err(CoreError::SessionExpired(token.claims.expires_at));
        }

        Ok(Actor {
            id: token.claims.actor_id.clone(),
            capabilities: token.claims.capabilities.clone(),
            expires_at: token.claims.expires_at,
        })
    }

    /// Decode and verify a transport-encoded token.
    pub fn verify_encoded(&self, token: &str, now: DateTime<Utc>) -> CoreResult<Actor> {
        self.verify(&SessionToken::decode(token)?, now)
    }
}

/// A caller whose identity was proven by a verified session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    id: String,
    capabilities: BTreeSet<Capability>,
    expires_at: DateTime<Utc>,
}

impl Actor {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(caps: &[Capability]) -> SessionClaims {
        SessionClaims::new("REV-001", caps.iter().copied(), Duration::hours(1))
    }

    #[test]
    fn test_issue_and_verify() {
        let issuer = SessionIssuer::generate();
        let token = issuer.issue(claims(&[Capability::Review])).unwrap();

        let actor = issuer.verifier().verify(&token, Utc::now()).unwrap();
        assert_eq!(actor.id(), "REV-001");
        assert!(actor.has(Capability::Review));
        assert!(!actor.has(Capability::Board));
    }

    #[test]
    fn test_encoded_roundtrip_through_public_key() {
        let issuer = SessionIssuer::generate();
        let encoded = issuer
            .issue(claims(&[Capability::Board, Capability::Audit]))
            .unwrap()
            .encode();

        let verifier = SessionVerifier::from_hex(&issuer.verifying_key_hex()).unwrap();
        let actor = verifier.verify_encoded(&encoded, Utc::now()).unwrap();
        assert!(actor.has(Capability::Board));
        assert!(actor.has(Capability::Audit));
    }

    #[test]
    fn test_foreign_key_rejected() {
        let issuer = SessionIssuer::generate();
        let other = SessionIssuer::generate();
        let token = issuer.issue(claims(&[Capability::Review])).unwrap();

        let result = other.verifier().verify(&token, Utc::now());
        assert_eq!(result, Err(CoreError::BadSessionSignature));
    }

    #[test]
    fn test_tampered_claims_rejected() {
        let issuer = SessionIssuer::generate();
        let token = issuer.issue(claims(&[Capability::Submit])).unwrap();
        let encoded = token.encode();
        let (_, signature) = encoded.split_once('.').unwrap();

        // Same signature, escalated capabilities
        let forged = serde_json::to_vec(&claims(&[Capability::Submit, Capability::Board])).unwrap();
        let forged = format!("{}.{}", hex::encode(forged), signature);

        let result = issuer.verifier().verify_encoded(&forged, Utc::now());
        assert_eq!(result, Err(CoreError::BadSessionSignature));
    }

    #[test]
    fn test_expired_session_rejected() {
        let issuer = SessionIssuer::generate();
        let token = issuer
            .issue(SessionClaims::new(
                "REV-001",
                [Capability::Review],
                Duration::minutes(5),
            ))
            .unwrap();

        let later = Utc::now() + Duration::minutes(10);
        assert!(matches!(
            issuer.verifier().verify(&token, later),
            Err(CoreError::SessionExpired(_))
        ));
    }

    #[test]
    fn test_bare_identifier_is_not_a_token() {
        let issuer = SessionIssuer::generate();
        let result = issuer
            .verifier()
            .verify_encoded("reviewer@university.edu", Utc::now());
        assert!(matches!(result, Err(CoreError::MalformedSession(_))));
    }

    #[test]
    fn test_seed_roundtrip() {
        let issuer = SessionIssuer::generate();
        let again = SessionIssuer::from_hex(&issuer.seed_hex()).unwrap();
        assert_eq!(issuer.verifying_key_hex(), again.verifying_key_hex());
    }
}
