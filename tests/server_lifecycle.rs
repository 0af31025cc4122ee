//! End-to-end: real listener, remote provider against the mock auth API,
//! graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use gatehouse::auth::RemoteIdentityProvider;
use gatehouse::config::LimiterConfig;
use gatehouse::lifecycle::Shutdown;
use gatehouse::profile::InMemoryProfileStore;
use gatehouse::HttpServer;
use tokio::net::TcpListener;

mod common;
use common::{start_mock_gotrue, test_config};

#[tokio::test]
async fn test_login_session_and_graceful_shutdown() {
    let gotrue = start_mock_gotrue().await;
    gotrue
        .state
        .accounts
        .insert("a@example.com".into(), ("secret-pw".into(), "user-1".into()));

    let mut config = test_config();
    config.identity.base_url = gotrue.base_url.clone();
    config.rate_limit.sweep_interval_secs = 1;
    config
        .rate_limit
        .limiters
        .insert("login".into(), LimiterConfig::new(60_000, 3, "Too many login attempts"));

    let provider = Arc::new(RemoteIdentityProvider::new(&config.identity).unwrap());
    let server = HttpServer::new(config, provider, Arc::new(InMemoryProfileStore::new()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.clone()));

    let client = reqwest::Client::builder().no_proxy().build().unwrap();

    let health = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(health.status(), 200);
    assert!(health.headers().contains_key("x-request-id"));

    let login = client
        .post(format!("{base}/api/auth/login"))
        .json(&serde_json::json!({ "email": "a@example.com", "password": "secret-pw" }))
        .send()
        .await
        .unwrap();
    assert_eq!(login.status(), 200);
    assert_eq!(login.headers()["x-ratelimit-remaining"], "2");

    let session: Vec<String> = login
        .headers()
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap().split(';').next().unwrap().to_string())
        .collect();
    assert_eq!(session.len(), 2);

    let feed: serde_json::Value = client
        .get(format!("{base}/api/feed"))
        .header("cookie", session.join("; "))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(feed["data"]["personalized"], true);
    assert_eq!(feed["data"]["user_id"], "user-1");

    // The login limiter is keyed by the peer address.
    for _ in 0..2 {
        client
            .post(format!("{base}/api/auth/login"))
            .json(&serde_json::json!({ "email": "a@example.com", "password": "wrong" }))
            .send()
            .await
            .unwrap();
    }
    let denied = client
        .post(format!("{base}/api/auth/login"))
        .json(&serde_json::json!({ "email": "a@example.com", "password": "secret-pw" }))
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status(), 429);
    assert!(denied.headers().contains_key("retry-after"));

    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop in time")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(shutdown.receiver_count(), 0);
}

#[tokio::test]
async fn test_provider_outage_is_500_on_strict_routes_only() {
    let gotrue = start_mock_gotrue().await;
    gotrue.state.users.insert("tok".into(), "user-1".into());
    gotrue.state.fail_with(Some(502));

    let mut config = test_config();
    config.identity.base_url = gotrue.base_url.clone();
    let provider = Arc::new(RemoteIdentityProvider::new(&config.identity).unwrap());
    let server = HttpServer::new(config, provider, Arc::new(InMemoryProfileStore::new()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.clone()));

    let client = reqwest::Client::builder().no_proxy().build().unwrap();

    let strict = client
        .get(format!("{base}/api/profile"))
        .bearer_auth("tok")
        .send()
        .await
        .unwrap();
    assert_eq!(strict.status(), 500);

    let optional = client
        .get(format!("{base}/api/feed"))
        .bearer_auth("tok")
        .send()
        .await
        .unwrap();
    assert_eq!(optional.status(), 200);

    shutdown.trigger();
    handle.await.unwrap().unwrap();
}
