//! # Client Identification
//!
//! Derives the key a request is rate limited under.
//!
//! ```text
//!     Authorization: Bearer <jwt> ──verify──► ok ──► "user:" + sha256(user_id)
//!              │                                │
//!              │ missing / malformed            │ invalid / expired
//!              ▼                                ▼
//!     X-Forwarded-For (first entry, valid IP) ──► "ip:<addr>"
//!              │ absent / unparseable
//!              ▼
//!     X-Real-IP (valid IP) ─────────────────────► "ip:<addr>"
//!              │ absent / unparseable
//!              ▼
//!     transport peer address (port stripped) ──► "ip:<addr>"
//!              │ unavailable
//!              ▼
//!     "ip:unknown"
//! ```
//!
//! Identity-derived keys are hashed so raw identifiers never sit in the map,
//! and the `user:`/`ip:` tags keep the two key spaces from colliding. A bad
//! credential is never an error here: it simply falls through to the IP.
//!
//! Forwarded headers are trusted as-is. Deploy behind a proxy that overwrites
//! them, otherwise clients can pick their own key.

use crate::error::AuthError;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, Request};
use sha2::{Digest, Sha256};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Verifies a bearer credential and yields the stable user identifier it
/// carries.
pub trait TokenVerifier: Send + Sync {
    fn verify_identity(&self, token: &str) -> Result<String, AuthError>;
}

/// Resolves rate-limit keys for incoming requests.
#[derive(Clone, Default)]
pub struct ClientIdentifier {
    verifier: Option<Arc<dyn TokenVerifier>>,
}

impl ClientIdentifier {
    /// Identifies authenticated clients by user, everyone else by IP.
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            verifier: Some(verifier),
        }
    }

    /// Identifies every client by IP.
    pub fn ip_only() -> Self {
        Self::default()
    }

    /// Key for a request, reading the peer address from axum's
    /// [`ConnectInfo`] extension when present.
    pub fn identify<B>(&self, req: &Request<B>) -> String {
        let remote = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        self.identify_parts(req.headers(), remote)
    }

    /// Key for the given headers and transport peer address.
    pub fn identify_parts(&self, headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
        if let Some(key) = self.user_key(headers) {
            return key;
        }

        match client_ip(headers, remote) {
            Some(ip) => format!("ip:{ip}"),
            None => "ip:unknown".to_string(),
        }
    }

    fn user_key(&self, headers: &HeaderMap) -> Option<String> {
        let verifier = self.verifier.as_ref()?;
        let token = bearer_token(headers)?;
        let identity = verifier.verify_identity(token).ok()?;
        Some(format!("user:{}", hash_identity(&identity)))
    }
}

impl std::fmt::Debug for ClientIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientIdentifier")
            .field("verifies_tokens", &self.verifier.is_some())
            .finish()
    }
}

/// The credential from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively. An empty credential, trailing
/// extra tokens or any other scheme yield `None`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split_whitespace();

    let scheme = parts.next()?;
    let token = parts.next()?;
    if parts.next().is_some() || !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }

    Some(token)
}

/// Proxy-aware client address.
///
/// First entry of `X-Forwarded-For`, then `X-Real-IP`, then the peer address.
/// A header that does not parse as an IP is skipped.
pub fn client_ip(headers: &HeaderMap, remote: Option<SocketAddr>) -> Option<IpAddr> {
    let forwarded = header_str(headers, X_FORWARDED_FOR)
        .and_then(|value| value.split(',').next())
        .and_then(parse_ip);
    if forwarded.is_some() {
        return forwarded;
    }

    let real_ip = header_str(headers, X_REAL_IP).and_then(parse_ip);
    if real_ip.is_some() {
        return real_ip;
    }

    remote.map(|addr| addr.ip())
}

/// Lowercase hex SHA-256 of an identity.
pub fn hash_identity(identity: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identity.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[inline]
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok()
}

#[inline]
fn parse_ip(value: &str) -> Option<IpAddr> {
    value.trim().parse().ok()
}
