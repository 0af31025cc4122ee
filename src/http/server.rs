//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with every route and its guard chain
//! - Wire up middleware (request ID, tracing, body limit, timeout)
//! - Spawn the rate limit reclaimer next to the server
//! - Drain on shutdown and join the reclaimer before returning

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::Request,
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::access::{attach_membership, require_tier, AllowedTiers, MembershipLookup, ProfileMembership, TierCatalog};
use crate::admin;
use crate::auth::middleware::{optional_auth, require_auth, AuthState};
use crate::auth::provider::IdentityProvider;
use crate::config::GateConfig;
use crate::http::handlers;
use crate::http::request::{RequestIdExt, UuidRequestId};
use crate::lifecycle::Shutdown;
use crate::profile::ProfileStore;
use crate::rate_limit::{
    rate_limit, Clock, InMemoryRateLimitStore, RateLimitStore, RateLimiters, Reclaimer, SystemClock,
};

const MAX_BODY_BYTES: usize = 64 * 1024;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GateConfig>,
    pub auth: AuthState,
    pub profiles: Arc<dyn ProfileStore>,
    pub membership: Arc<dyn MembershipLookup>,
    pub limiters: RateLimiters,
    pub started_at: Instant,
}

/// HTTP server for the gate and its bundled routes.
pub struct HttpServer {
    router: Router,
    config: GateConfig,
    limiters: RateLimiters,
}

impl HttpServer {
    /// Server with the in-process rate limit store and the wall clock.
    pub fn new(config: GateConfig, provider: Arc<dyn IdentityProvider>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self::with_rate_limit_backend(
            config,
            provider,
            profiles,
            Arc::new(InMemoryRateLimitStore::new()),
            Arc::new(SystemClock),
        )
    }

    pub fn with_rate_limit_backend(
        config: GateConfig,
        provider: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileStore>,
        store: Arc<dyn RateLimitStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let limiters = RateLimiters::from_config(&config.rate_limit, store, clock);
        let membership: Arc<dyn MembershipLookup> = Arc::new(ProfileMembership::new(
            profiles.clone(),
            TierCatalog::from_config(&config.membership),
        ));

        let state = AppState {
            config: Arc::new(config.clone()),
            auth: AuthState::new(provider, &config.identity),
            profiles,
            membership,
            limiters: limiters.clone(),
            started_at: Instant::now(),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            limiters,
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// `route_layer` calls wrap outward: the last one added runs first.
    #[allow(deprecated)]
    fn build_router(config: &GateConfig, state: AppState) -> Router {
        let limits = LimitLayers {
            enabled: config.rate_limit.enabled,
            limiters: &state.limiters,
        };
        let allowed = Arc::new(AllowedTiers::new(config.membership.gated_tiers.iter().cloned()));

        let login = limits.apply("login", Router::new().route("/api/auth/login", post(handlers::login)));
        let register = limits.apply("register", Router::new().route("/api/auth/register", post(handlers::register)));
        let password_reset = limits.apply(
            "password_reset",
            Router::new().route("/api/auth/password-reset", post(handlers::password_reset)),
        );
        let contact = limits.apply("contact", Router::new().route("/api/contact", post(handlers::contact)));

        let account = limits.apply(
            "api_ip",
            limits
                .apply(
                    "api",
                    Router::new()
                        .route("/api/profile", get(handlers::get_profile).patch(handlers::update_profile))
                        .route("/api/account", axum::routing::delete(handlers::delete_account)),
                )
                .route_layer(middleware::from_fn_with_state(state.auth.clone(), require_auth)),
        );

        let membership = limits.apply(
            "api_ip",
            limits
                .apply(
                    "api",
                    Router::new()
                        .route("/api/membership", get(handlers::get_membership))
                        .route_layer(middleware::from_fn_with_state(state.membership.clone(), attach_membership)),
                )
                .route_layer(middleware::from_fn_with_state(state.auth.clone(), require_auth)),
        );

        let premium = limits.apply(
            "api_ip",
            limits
                .apply(
                    "api",
                    Router::new()
                        .route("/api/premium/insights", get(handlers::premium_insights))
                        .route_layer(middleware::from_fn_with_state(allowed, require_tier))
                        .route_layer(middleware::from_fn_with_state(state.membership.clone(), attach_membership)),
                )
                .route_layer(middleware::from_fn_with_state(state.auth.clone(), require_auth)),
        );

        let feed = Router::new()
            .route("/api/feed", get(handlers::feed))
            .route_layer(middleware::from_fn_with_state(state.auth.clone(), optional_auth));

        let mut router = Router::new()
            .route("/health", get(handlers::health))
            .merge(login)
            .merge(register)
            .merge(password_reset)
            .merge(contact)
            .merge(account)
            .merge(membership)
            .merge(premium)
            .merge(feed);

        if config.admin.enabled {
            router = router.merge(admin::admin_router(&config.admin.api_key));
        }

        router
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request.request_id(),
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// Router for in-process use (tests, embedding).
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn limiters(&self) -> &RateLimiters {
        &self.limiters
    }

    /// Run until `shutdown` fires, accepting connections on `listener`.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let server_shutdown = shutdown.subscribe();
        let reclaimer = self.config.rate_limit.enabled.then(|| {
            Reclaimer::new(
                self.limiters.store(),
                self.limiters.clock(),
                Duration::from_secs(self.config.rate_limit.sweep_interval_secs),
            )
            .spawn(shutdown.subscribe())
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(Shutdown::wait(server_shutdown))
            .await;

        // Also stops the reclaimer when serving ended on an error.
        shutdown.trigger();
        if let Some(handle) = reclaimer {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Reclaimer task failed");
            }
        }

        result?;
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }
}

/// Attaches named limiters to route groups.
struct LimitLayers<'a> {
    enabled: bool,
    limiters: &'a RateLimiters,
}

impl LimitLayers<'_> {
    fn apply(&self, name: &str, router: Router<AppState>) -> Router<AppState> {
        if !self.enabled {
            return router;
        }
        match self.limiters.get(name) {
            Some(limiter) => router.route_layer(middleware::from_fn_with_state(limiter, rate_limit)),
            None => {
                tracing::warn!(limiter = name, "Limiter not configured, routes left unlimited");
                router
            }
        }
    }
}
