//! Caller identity.
//!
//! Authentication itself happens upstream (the gateway in front of the API
//! sets the identity headers); this module only exposes who the caller is.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

pub trait Session: Send + Sync {
    fn user_id(&self) -> Option<String>;

    fn email(&self) -> Option<String> {
        None
    }
}

/// Identity taken from request headers.
#[derive(Debug, Clone, Default)]
pub struct HeaderSession {
    user_id: Option<String>,
    email: Option<String>,
}

impl HeaderSession {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            user_id: read(USER_ID_HEADER),
            email: read(USER_EMAIL_HEADER),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for HeaderSession {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

impl Session for HeaderSession {
    fn user_id(&self) -> Option<String> {
        self.user_id.clone()
    }

    fn email(&self) -> Option<String> {
        self.email.clone()
    }
}

/// Fixed identity, for the CLI and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    pub user_id: Option<String>,
    pub email: Option<String>,
}

impl StaticSession {
    pub fn user(uid: impl Into<String>) -> Self {
        Self {
            user_id: Some(uid.into()),
            email: None,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl Session for StaticSession {
    fn user_id(&self) -> Option<String> {
        self.user_id.clone()
    }

    fn email(&self) -> Option<String> {
        self.email.clone()
    }
}
