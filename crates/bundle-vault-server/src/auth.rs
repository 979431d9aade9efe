// crates/bundle-vault-server/src/auth.rs
// ============================================================================
// Module: Bundle Vault Request Authorization
// Description: Bearer token authentication for vault data routes.
// Purpose: Gate every data route and record each decision.
// Dependencies: sha2, subtle, serde
// ============================================================================

//! ## Overview
//! A request is authorized by [`RequestAuthz`]. The default
//! [`BearerTokenAuthz`] accepts everything when no token is configured;
//! otherwise the `Authorization: Bearer <token>` header must match the
//! configured token, compared in constant time.
//!
//! ## Invariants
//! - Raw tokens never appear in audit output; only a SHA-256 fingerprint is
//!   recorded.
//! - Oversized authorization headers are rejected before parsing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;
use std::net::IpAddr;

use bundle_vault_config::ServerAuthConfig;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use subtle::ConstantTimeEq;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum accepted size of an `Authorization` header.
const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;
/// Authorization scheme prefix, matched case-sensitively.
const BEARER_PREFIX: &str = "Bearer ";

// ============================================================================
// SECTION: Request Context
// ============================================================================

/// Request metadata used for authorization decisions.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Route label being requested.
    pub route: &'static str,
    /// Caller IP address, when known.
    pub peer_ip: Option<IpAddr>,
    /// Raw `Authorization` header value.
    pub auth_header: Option<String>,
}

impl RequestContext {
    /// Builds a context for an HTTP request.
    #[must_use]
    pub const fn http(
        route: &'static str,
        peer_ip: Option<IpAddr>,
        auth_header: Option<String>,
    ) -> Self {
        Self {
            route,
            peer_ip,
            auth_header,
        }
    }
}

/// Authenticated caller identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Method that admitted the request.
    pub method: AuthMethod,
    /// SHA-256 fingerprint of the presented token.
    pub token_fingerprint: Option<String>,
}

/// Methods that can admit a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// No token is configured; every caller is admitted.
    Open,
    /// The caller presented the configured bearer token.
    BearerToken,
}

impl AuthMethod {
    /// Returns the audit label for the method.
    const fn label(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::BearerToken => "bearer_token",
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Authorization failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The caller did not present valid credentials.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
}

// ============================================================================
// SECTION: Traits
// ============================================================================

/// Authorizes inbound data requests.
pub trait RequestAuthz: Send + Sync {
    /// Authorizes a request.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the request must be rejected.
    fn authorize(&self, ctx: &RequestContext) -> Result<AuthContext, AuthError>;
}

/// Receives authorization audit events.
pub trait AuthAuditSink: Send + Sync {
    /// Records an authorization decision.
    fn record(&self, event: &AuthAuditEvent);
}

// ============================================================================
// SECTION: Bearer Token Authz
// ============================================================================

/// Shared-secret bearer token authorization.
#[derive(Clone)]
pub struct BearerTokenAuthz {
    /// Configured token; `None` admits every caller.
    token: Option<String>,
}

impl BearerTokenAuthz {
    /// Builds the authorizer from server auth configuration.
    #[must_use]
    pub fn from_config(config: &ServerAuthConfig) -> Self {
        Self::new(config.bearer_token.clone())
    }

    /// Builds the authorizer around an optional token.
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|token| !token.trim().is_empty()),
        }
    }

    /// Returns true when a token is configured.
    #[must_use]
    pub const fn requires_token(&self) -> bool {
        self.token.is_some()
    }
}

impl RequestAuthz for BearerTokenAuthz {
    fn authorize(&self, ctx: &RequestContext) -> Result<AuthContext, AuthError> {
        let Some(expected) = &self.token else {
            return Ok(AuthContext {
                method: AuthMethod::Open,
                token_fingerprint: None,
            });
        };
        let presented = parse_bearer_token(ctx.auth_header.as_deref())?;
        if !constant_time_eq_str(&presented, expected) {
            return Err(AuthError::Unauthenticated("invalid bearer token".to_string()));
        }
        Ok(AuthContext {
            method: AuthMethod::BearerToken,
            token_fingerprint: Some(token_fingerprint(&presented)),
        })
    }
}

// ============================================================================
// SECTION: Audit Events
// ============================================================================

/// Authorization audit event payload.
#[derive(Debug, Serialize)]
pub struct AuthAuditEvent {
    /// Event identifier.
    event: &'static str,
    /// Decision outcome.
    decision: &'static str,
    /// Route label.
    route: &'static str,
    /// Caller IP address (if available).
    peer_ip: Option<String>,
    /// Auth method label.
    auth_method: Option<&'static str>,
    /// Bearer token fingerprint (sha256).
    token_fingerprint: Option<String>,
    /// Failure reason (for deny events).
    reason: Option<String>,
}

impl AuthAuditEvent {
    /// Builds an allow event.
    #[must_use]
    pub fn allowed(ctx: &RequestContext, auth: &AuthContext) -> Self {
        Self {
            event: "vault_authz",
            decision: "allow",
            route: ctx.route,
            peer_ip: ctx.peer_ip.map(|ip| ip.to_string()),
            auth_method: Some(auth.method.label()),
            token_fingerprint: auth.token_fingerprint.clone(),
            reason: None,
        }
    }

    /// Builds a deny event.
    #[must_use]
    pub fn denied(ctx: &RequestContext, error: &AuthError) -> Self {
        Self {
            event: "vault_authz",
            decision: "deny",
            route: ctx.route,
            peer_ip: ctx.peer_ip.map(|ip| ip.to_string()),
            auth_method: None,
            token_fingerprint: None,
            reason: Some(error.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Extracts the token from a `Bearer` authorization header.
fn parse_bearer_token(auth_header: Option<&str>) -> Result<String, AuthError> {
    let header = auth_header
        .ok_or_else(|| AuthError::Unauthenticated("missing authorization".to_string()))?;
    if header.len() > MAX_AUTH_HEADER_BYTES {
        return Err(AuthError::Unauthenticated("authorization header too large".to_string()));
    }
    let token = header
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::Unauthenticated("invalid authorization header".to_string()))?;
    Ok(token.to_string())
}

/// Compares two strings in constant time.
fn constant_time_eq_str(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Returns the lowercase hex SHA-256 digest of a token.
fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================
