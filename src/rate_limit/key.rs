//! Rate limit key derivation.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request};

use crate::auth::identity::ResolvedIdentity;
use crate::config::KeyStrategy;

/// Derives the key a request is counted under.
pub trait KeyExtractor: Send + Sync {
    fn key(&self, request: &Request) -> String;
}

impl<F> KeyExtractor for F
where
    F: Fn(&Request) -> String + Send + Sync,
{
    fn key(&self, request: &Request) -> String {
        self(request)
    }
}

/// Caller network address.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientIpKey {
    /// Use the first `X-Forwarded-For` hop; only safe behind a trusted proxy.
    pub trust_forwarded_for: bool,
}

impl ClientIpKey {
    pub fn client_ip(&self, request: &Request) -> Option<String> {
        if self.trust_forwarded_for {
            let forwarded = request
                .headers()
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').next())
                .map(|s| s.trim())
                .filter(|s| !s.is_empty());
            if let Some(ip) = forwarded {
                return Some(ip.to_string());
            }
        }

        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    }
}

impl KeyExtractor for ClientIpKey {
    fn key(&self, request: &Request) -> String {
        self.client_ip(request).unwrap_or_else(|| "unknown".to_string())
    }
}

/// Resolved user when present, caller address otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityKey {
    pub fallback: ClientIpKey,
}

impl KeyExtractor for IdentityKey {
    fn key(&self, request: &Request) -> String {
        match request.extensions().get::<ResolvedIdentity>() {
            Some(identity) => format!("user:{}", identity.user_id),
            None => format!("ip:{}", self.fallback.key(request)),
        }
    }
}

pub fn extractor_for(strategy: KeyStrategy, trust_forwarded_for: bool) -> Arc<dyn KeyExtractor> {
    let ip = ClientIpKey { trust_forwarded_for };
    match strategy {
        KeyStrategy::ClientIp => Arc::new(ip),
        KeyStrategy::Identity => Arc::new(IdentityKey { fallback: ip }),
    }
}
