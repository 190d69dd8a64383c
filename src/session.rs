//! Who is calling.
//!
//! Sign-in itself happens at the auth gateway in front of this service; the
//! gateway forwards the signed-in user id in a header. Requests without it are
//! anonymous and resolve to the sign-up step.

use anyhow::{Context, Result};
use axum::http::{HeaderMap, HeaderName};

use crate::onboarding::models::UserId;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: UserId(user_id.into()),
        }
    }
}

pub trait SessionProvider: Send + Sync {
    fn session(&self, headers: &HeaderMap) -> Option<Session>;
}

/// Reads the identity from a gateway-forwarded header.
#[derive(Clone, Debug)]
pub struct ForwardedIdentity {
    header: HeaderName,
}

impl ForwardedIdentity {
    pub fn new(header: &str) -> Result<Self> {
        let header = HeaderName::from_bytes(header.as_bytes())
            .with_context(|| format!("invalid identity header name {header:?}"))?;
        Ok(Self { header })
    }
}

impl SessionProvider for ForwardedIdentity {
    fn session(&self, headers: &HeaderMap) -> Option<Session> {
        let raw = headers.get(&self.header)?.to_str().ok()?.trim();
        (!raw.is_empty()).then(|| Session::new(raw))
    }
}
