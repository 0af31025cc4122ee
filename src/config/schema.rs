//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Identity provider connection and session cookie settings.
    pub identity: IdentityConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Membership tiers and gating.
    pub membership: MembershipConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// What the resolver does when the cookie channel hits a provider fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CookieFaultPolicy {
    /// Treat the fault like a failed verification and try the bearer channel.
    #[default]
    FallThrough,
    /// Stop resolution and report the fault.
    ShortCircuit,
}

/// Identity provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Base URL of the auth API (e.g., "https://project.example.co").
    pub base_url: String,

    /// Public API key sent as the `apikey` header on every call.
    pub anon_key: String,

    /// Privileged key used for admin operations (user deletion).
    pub service_role_key: String,

    /// Per-call timeout in seconds.
    pub request_timeout_secs: u64,

    /// Cookie carrying the session access token.
    pub access_cookie: String,

    /// Cookie carrying the session refresh token.
    pub refresh_cookie: String,

    /// Mark session cookies `Secure`.
    pub secure_cookies: bool,

    /// `Max-Age` of written session cookies in seconds.
    pub cookie_max_age_secs: u64,

    pub cookie_fault_policy: CookieFaultPolicy,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9999".to_string(),
            anon_key: String::new(),
            service_role_key: String::new(),
            request_timeout_secs: 10,
            access_cookie: "sb-access-token".to_string(),
            refresh_cookie: "sb-refresh-token".to_string(),
            secure_cookies: true,
            cookie_max_age_secs: 60 * 60 * 24 * 7,
            cookie_fault_policy: CookieFaultPolicy::FallThrough,
        }
    }
}

/// How a limiter derives the key a request is counted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    /// Caller network address.
    #[default]
    ClientIp,
    /// Resolved user id, falling back to the caller address.
    Identity,
}

/// A single named fixed-window limiter.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimiterConfig {
    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Requests admitted per key per window.
    pub max_requests: u64,

    /// Message returned with the 429 response.
    pub message: String,

    #[serde(default)]
    pub key: KeyStrategy,
}

impl LimiterConfig {
    pub fn new(window_ms: u64, max_requests: u64, message: impl Into<String>) -> Self {
        Self {
            window_ms,
            max_requests,
            message: message.into(),
            key: KeyStrategy::ClientIp,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Period of the expired-entry sweep in seconds.
    pub sweep_interval_secs: u64,

    /// Use the first `X-Forwarded-For` hop as the client address.
    pub trust_forwarded_for: bool,

    /// Named limiter instances.
    pub limiters: BTreeMap<String, LimiterConfig>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        const MINUTE: u64 = 60 * 1000;

        let mut limiters = BTreeMap::new();
        limiters.insert(
            "login".to_string(),
            LimiterConfig::new(
                15 * MINUTE,
                5,
                "Too many login attempts from this IP, please try again after 15 minutes",
            ),
        );
        limiters.insert(
            "register".to_string(),
            LimiterConfig::new(
                60 * MINUTE,
                3,
                "Too many accounts created from this IP, please try again after an hour",
            ),
        );
        limiters.insert(
            "password_reset".to_string(),
            LimiterConfig::new(
                60 * MINUTE,
                3,
                "Too many password reset requests, please try again after an hour",
            ),
        );
        limiters.insert(
            "contact".to_string(),
            LimiterConfig::new(
                60 * MINUTE,
                5,
                "Too many messages sent, please try again later",
            ),
        );
        limiters.insert(
            "api".to_string(),
            LimiterConfig {
                key: KeyStrategy::Identity,
                ..LimiterConfig::new(
                    15 * MINUTE,
                    100,
                    "Too many requests, please try again later",
                )
            },
        );

        // Counts authenticated routes per address before identity is known.
        limiters.insert(
            "api_ip".to_string(),
            LimiterConfig::new(
                15 * MINUTE,
                300,
                "Too many requests from this IP, please try again later",
            ),
        );

        Self {
            enabled: true,
            sweep_interval_secs: 60,
            trust_forwarded_for: false,
            limiters,
        }
    }
}

/// One entry of the tier catalog.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TierConfig {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl TierConfig {
    fn new(name: &str, display_name: &str, capabilities: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Membership configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MembershipConfig {
    /// Tier assumed for users without a profile or tier.
    pub default_tier: String,

    /// Tiers admitted by tier-gated routes.
    pub gated_tiers: Vec<String>,

    /// Tier catalog.
    pub tiers: Vec<TierConfig>,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            default_tier: "free".to_string(),
            gated_tiers: vec!["trial".into(), "premium".into(), "pro".into()],
            tiers: vec![
                TierConfig::new("free", "Free", &["profile"]),
                TierConfig::new("trial", "Trial", &["profile", "insights"]),
                TierConfig::new("premium", "Premium", &["profile", "insights", "exports"]),
                TierConfig::new("pro", "Pro", &["profile", "insights", "exports", "api"]),
            ],
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the `/admin` routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
        }
    }
}
