
use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::config::ServiceConfig;
use crate::headers::AuthSlot;
use crate::service::{NetworkService, RestCall};
use test_support::{CannedTransport, CountingIndicator};

#[derive(Debug, serde::Deserialize)]
struct Pong {
    ok: bool,
}

#[tokio::test]
async fn indicator_wraps_the_whole_call() {
    let transport = Arc::new(CannedTransport::new(r#"{"ok": true}"#));
    let service = NetworkService::new(
        ServiceConfig::from_values("https://api.example.com"),
        transport.clone(),
        None,
    );
    let indicator = Arc::new(CountingIndicator::default());

    let _: Pong = service
        .call(
            RestCall::get("/v1/ping").activity_label("Loading"),
            Some(indicator.clone()),
        )
        .await
        .unwrap();

    assert_eq!(indicator.shown.load(Ordering::SeqCst), 1);
    assert_eq!(indicator.hidden.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn saved_basic_auth_reaches_transport() {
    let transport = Arc::new(CannedTransport::new(r#"{"ok": true}"#));
    let service = NetworkService::new(
        ServiceConfig::from_values("https://api.example.com"),
        transport.clone(),
        None,
    );
    service.add_basic_auth("user", "pass");
    service.save_basic_auth();

    let _: Pong = service
        .call(RestCall::get("/v1/ping").auth(AuthSlot::Basic), None)
        .await
        .unwrap();
    let _: Pong = service
        .call(RestCall::get("/v1/ping"), None)
        .await
        .unwrap();

    let seen = transport.seen.lock().unwrap();
    assert_eq!(
        seen[0].headers.get("Authorization"),
        Some("Basic dXNlcjpwYXNz")
    );
    assert!(seen[1].headers.get("Authorization").is_none());
}
