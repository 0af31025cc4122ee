//! Response-side session plumbing.
//!
//! Verification may rotate a session. The renewed tokens must reach the
//! client, so the resolver records them in a [`ResponseContext`] that the
//! middleware applies to whatever response the pipeline produces.

use axum::http::{header, HeaderValue};
use axum::response::Response;

use crate::auth::identity::SessionArtifact;
use crate::config::IdentityConfig;

/// How session cookies are written.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub access_cookie: String,
    pub refresh_cookie: String,
    pub secure: bool,
    pub max_age_secs: u64,
}

impl CookiePolicy {
    pub fn from_config(config: &IdentityConfig) -> Self {
        Self {
            access_cookie: config.access_cookie.clone(),
            refresh_cookie: config.refresh_cookie.clone(),
            secure: config.secure_cookies,
            max_age_secs: config.cookie_max_age_secs,
        }
    }

    fn render(&self, name: &str, value: &str, max_age: u64) -> String {
        let mut cookie = format!("{name}={value}; Path=/; Max-Age={max_age}; HttpOnly; SameSite=Lax");
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Per-request sink for response side effects of identity resolution.
#[derive(Debug, Clone)]
pub struct ResponseContext {
    policy: CookiePolicy,
    set_cookies: Vec<HeaderValue>,
}

impl ResponseContext {
    pub fn new(policy: CookiePolicy) -> Self {
        Self {
            policy,
            set_cookies: Vec::new(),
        }
    }

    /// Queue cookies carrying a renewed session.
    pub fn write_session(&mut self, session: &SessionArtifact) {
        let max_age = self.policy.max_age_secs;
        let access = self.policy.render(&self.policy.access_cookie, &session.access_token, max_age);
        let refresh = self.policy.render(&self.policy.refresh_cookie, &session.refresh_token, max_age);
        self.push(access);
        self.push(refresh);
    }

    /// Queue cookies that remove the session from the client.
    pub fn clear_session(&mut self) {
        let access = self.policy.render(&self.policy.access_cookie, "", 0);
        let refresh = self.policy.render(&self.policy.refresh_cookie, "", 0);
        self.push(access);
        self.push(refresh);
    }

    fn push(&mut self, cookie: String) {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => self.set_cookies.push(value),
            Err(_) => tracing::warn!("Dropping session cookie with non-header-safe token"),
        }
    }

    pub fn set_cookies(&self) -> &[HeaderValue] {
        &self.set_cookies
    }

    pub fn is_empty(&self) -> bool {
        self.set_cookies.is_empty()
    }

    /// Append the queued `Set-Cookie` headers to a response.
    pub fn apply(self, response: &mut Response) {
        let headers = response.headers_mut();
        for cookie in self.set_cookies {
            headers.append(header::SET_COOKIE, cookie);
        }
    }
}
