//! Credential issuing for agents
//!
//! Provides:
//! - Room-scoped join token minting (HS256 JWT)
//! - Unique participant identities per issuance

pub mod token;

pub use token::{agent_identity, JoinClaims, JoinCredential, JoinTokenIssuer, VideoGrant};
