//! Join credentials for agents
//!
//! Mints the short-lived, room-scoped access tokens the real-time platform
//! accepts. Tokens are HS256 JWTs signed with the platform API secret, with
//! the API key as issuer and a video grant restricted to one room.
//!
//! Every token carries a fresh `jti`, so two issuances for the same room and
//! identity never produce the same string.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::types::{Result, SwitchboardError};

/// Clock skew allowance baked into `nbf`
const NOT_BEFORE_SKEW_SECS: u64 = 10;

/// Room permissions granted to the holder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrant {
    pub room: String,
    pub room_join: bool,
    pub can_publish: bool,
    pub can_subscribe: bool,
}

impl VideoGrant {
    /// Join + publish + subscribe on a single room
    pub fn agent(room: &str) -> Self {
        Self {
            room: room.to_string(),
            room_join: true,
            can_publish: true,
            can_subscribe: true,
        }
    }
}

/// Payload stored in a join token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinClaims {
    /// API key of the issuer
    pub iss: String,
    /// Participant identity
    pub sub: String,
    /// Not before (Unix timestamp)
    pub nbf: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Unique token id
    pub jti: String,
    pub video: VideoGrant,
}

/// A minted credential, handed to exactly one agent
#[derive(Debug, Clone)]
pub struct JoinCredential {
    pub room: String,
    pub identity: String,
    pub issued_at: u64,
    pub ttl: Duration,
    /// The signed token; opaque to everything except the platform
    pub token: String,
}

/// Signs join credentials with the platform key pair
///
/// The key material is read-only after construction, so one issuer can be
/// shared across request handlers without locking.
#[derive(Clone)]
pub struct JoinTokenIssuer {
    api_key: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for JoinTokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinTokenIssuer")
            .field("api_key", &self.api_key)
            .finish_non_exhaustive()
    }
}

impl JoinTokenIssuer {
    /// Create an issuer from the platform API key and secret
    pub fn new(api_key: impl Into<String>, api_secret: &str) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(SwitchboardError::Config("LIVEKIT_API_KEY is empty".into()));
        }
        if api_secret.is_empty() {
            return Err(SwitchboardError::Config("LIVEKIT_API_SECRET is empty".into()));
        }

        Ok(Self {
            api_key,
            encoding_key: EncodingKey::from_secret(api_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(api_secret.as_bytes()),
        })
    }

    /// Mint a credential letting `identity` join `room` for `ttl`
    pub fn issue(&self, room: &str, identity: &str, ttl: Duration) -> Result<JoinCredential> {
        let now = unix_now()?;

        let claims = JoinClaims {
            iss: self.api_key.clone(),
            sub: identity.to_string(),
            nbf: now.saturating_sub(NOT_BEFORE_SKEW_SECS),
            exp: now.saturating_add(ttl.as_secs()),
            jti: Uuid::new_v4().to_string(),
            video: VideoGrant::agent(room),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| SwitchboardError::Token(format!("Failed to sign join token: {}", e)))?;

        Ok(JoinCredential {
            room: room.to_string(),
            identity: identity.to_string(),
            issued_at: now,
            ttl,
            token,
        })
    }

    /// Verify and decode a token minted by this issuer
    pub fn verify(&self, token: &str) -> Result<JoinClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_nbf = true;
        validation.set_issuer(&[self.api_key.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "sub", "iss"]);

        let data = decode::<JoinClaims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }
}

/// Participant identity for an agent joining `room`
///
/// Identities must not collide inside a room, so each call gets a random suffix.
pub fn agent_identity(room: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("agent-{}-{}", room, &suffix[..8])
}

fn unix_now() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| SwitchboardError::Token(format!("System time error: {}", e)))
}
