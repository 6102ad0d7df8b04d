//! Client end to end against a local server.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::sleep;

use ride_sync::{
    Accepted, Client, ConnectionState, ConnectionStatus, EventKind, FileSessionStore, Identity,
    InboundEvent, Notice, RefreshTarget, ReconnectPolicy, RideCommand, Role, SessionStore, UserId,
};

use common::{MockServer, RecordingView, eventually, init_tracing, ride_json};

const DRIVER_GREETING: &str = r#"{"event":"connected","user_id":7,"is_driver":true}"#;
const RIDER_GREETING: &str = r#"{"event":"connected","user_id":2,"is_driver":false}"#;

fn client_for(server: &MockServer, view: &Arc<RecordingView>) -> Client {
    Client::builder()
        .base_url(server.base_url())
        .credential("secret-token")
        .reconnect(ReconnectPolicy::new(
            Duration::from_millis(50),
            Duration::from_millis(200),
            3,
        ))
        .view(view.clone())
        .build()
        .expect("client")
}

async fn connected(server: &MockServer, client: &Client) {
    client.connect().expect("connect");
    eventually("open", || client.state() == ConnectionState::Open).await;
    eventually("server side", || server.connections() >= 1).await;
}

#[tokio::test]
async fn test_handshake_confirms_identity_and_loads_lists() {
    init_tracing();
    let server = MockServer::start().await;
    server.greet_with(DRIVER_GREETING);
    server.respond("GET", "/rides/", 200, format!("[{}]", ride_json(1, 2, "requested")));
    server.respond("GET", "/rides/assigned", 200, "[]");
    let view = Arc::new(RecordingView::default());
    let client = client_for(&server, &view);

    connected(&server, &client).await;
    eventually("identity", || client.identity().is_some()).await;

    assert_eq!(
        client.identity(),
        Some(Identity::new(UserId::new(7), Role::Driver))
    );
    assert!(view.has_notice("Real-time updates enabled"));
    assert_eq!(view.last_status(), Some(ConnectionStatus::Connected));

    eventually("both lists", || view.lists.lock().len() == 2).await;
    let mut targets: Vec<RefreshTarget> = view.lists.lock().iter().map(|(t, _)| *t).collect();
    targets.sort_by_key(ToString::to_string);
    assert_eq!(
        targets,
        vec![RefreshTarget::AssignedRides, RefreshTarget::RideRequests]
    );
}

#[tokio::test]
async fn test_push_reaches_default_reaction() {
    let server = MockServer::start().await;
    server.greet_with(DRIVER_GREETING);
    let view = Arc::new(RecordingView::default());
    let client = client_for(&server, &view);

    connected(&server, &client).await;
    server.push(r#"{"event":"new_ride","ride_id":5,"pickup":"Airport","dropoff":"Downtown"}"#);

    eventually("notice", || {
        view.has_notice("New ride request: Airport → Downtown")
    })
    .await;
}

#[tokio::test]
async fn test_custom_handler_replaces_default() {
    let server = MockServer::start().await;
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let view = Arc::new(RecordingView::default());
    let client = Client::builder()
        .base_url(server.base_url())
        .credential("secret-token")
        .view(view.clone())
        .on(EventKind::RideCompleted, move |event, _ctx| {
            if let InboundEvent::RideCompleted { .. } = event {
                sink.lock().push(event.ride_id());
            }
            Ok(())
        })
        .build()
        .expect("client");

    connected(&server, &client).await;
    server.push(r#"{"event":"ride_completed","ride_id":8}"#);

    eventually("handler", || seen.lock().len() == 1).await;
    assert!(!view.has_notice("Ride completed!"));
}

#[tokio::test]
async fn test_handler_dispatches_over_realtime() {
    let server = MockServer::start().await;
    server.greet_with(DRIVER_GREETING);
    let view = Arc::new(RecordingView::default());
    let client = Client::builder()
        .base_url(server.base_url())
        .credential("secret-token")
        .view(view.clone())
        .on(EventKind::NewRide, |event, ctx| {
            if let Some(ride_id) = event.ride_id() {
                ctx.spawn_dispatch(RideCommand::assign(ride_id));
            }
            Ok(())
        })
        .build()
        .expect("client");

    connected(&server, &client).await;
    server.push(r#"{"event":"new_ride","ride_id":5,"pickup":"Airport","dropoff":"Downtown"}"#);

    eventually("frame", || server.frames().len() == 1).await;
    let frame: serde_json::Value = serde_json::from_str(&server.frames()[0]).expect("json");
    assert_eq!(
        frame,
        serde_json::json!({"action": "ride_assigned", "ride_id": 5})
    );
    assert!(
        server
            .requests()
            .iter()
            .all(|request| !request.path.ends_with("/assign"))
    );
}

#[tokio::test]
async fn test_request_ride_over_realtime() {
    let server = MockServer::start().await;
    server.greet_with(RIDER_GREETING);
    server.respond("GET", "/rides/my", 200, "[]");
    let view = Arc::new(RecordingView::default());
    let client = client_for(&server, &view);

    connected(&server, &client).await;
    let accepted = client
        .request_ride("Airport", "Downtown")
        .await
        .expect("request");

    assert_eq!(accepted, Accepted::Queued);
    assert!(view.has_notice("Ride request sent! Waiting for confirmation..."));
    eventually("frame", || server.frames().len() == 1).await;
    assert!(
        server
            .requests()
            .iter()
            .all(|request| request.path != "/rides/")
    );
}

#[tokio::test]
async fn test_request_ride_over_fallback() {
    let server = MockServer::start().await;
    server.respond("POST", "/rides/", 200, ride_json(4, 2, "requested"));
    server.respond("GET", "/rides/my", 200, format!("[{}]", ride_json(4, 2, "requested")));
    let view = Arc::new(RecordingView::default());
    let client = client_for(&server, &view);

    let accepted = client
        .request_ride("Airport", "Downtown")
        .await
        .expect("request");

    assert!(!accepted.is_realtime());
    assert!(view.has_notice("Ride requested successfully!"));
    assert!(server.frames().is_empty());
}

#[tokio::test]
async fn test_failed_actions_notify() {
    let server = MockServer::start().await;
    server.respond(
        "GET",
        "/rides/3/assign",
        400,
        r#"{"detail":"Ride already assigned or completed"}"#,
    );
    server.respond("POST", "/rides/3/complete", 500, "{}");
    let view = Arc::new(RecordingView::default());
    let client = client_for(&server, &view);

    assert!(client.assign_ride(3).await.is_err());
    assert!(client.complete_ride(3).await.is_err());

    assert_eq!(
        view.error_notices(),
        vec![
            "Ride already assigned or completed".to_string(),
            "Failed to complete ride".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_terminal_close_is_reported() {
    let server = MockServer::start().await;
    let view = Arc::new(RecordingView::default());
    let client = client_for(&server, &view);

    connected(&server, &client).await;
    server.close_with(1008);

    eventually("closed", || client.state() == ConnectionState::Closed).await;
    eventually("notice", || {
        view.has_notice("Real-time connection closed by the server")
    })
    .await;
    assert_eq!(view.last_status(), Some(ConnectionStatus::Disconnected));
}

#[tokio::test]
async fn test_lost_connection_reports_reconnect() {
    let server = MockServer::start().await;
    let view = Arc::new(RecordingView::default());
    let client = client_for(&server, &view);

    connected(&server, &client).await;
    server.drop_connection();

    eventually("reconnected", || server.connections() == 2).await;
    eventually("open", || client.state() == ConnectionState::Open).await;
    assert!(view.has_notice("Connection lost. Attempting to reconnect..."));
}

#[tokio::test]
async fn test_disconnect_is_silent() {
    let server = MockServer::start().await;
    let view = Arc::new(RecordingView::default());
    let client = client_for(&server, &view);

    connected(&server, &client).await;
    client.disconnect();
    sleep(Duration::from_millis(150)).await;

    assert!(view.error_notices().is_empty());
    assert_eq!(client.state(), ConnectionState::Closed);
    assert_eq!(server.connections(), 1);
}

#[tokio::test]
async fn test_start_connects_after_delay() {
    let server = MockServer::start().await;
    let client = Client::builder()
        .options(
            ride_sync::ClientOptions::new()
                .with_base_url(server.base_url())
                .with_startup_delay(Duration::from_millis(50)),
        )
        .credential("secret-token")
        .build()
        .expect("client");

    assert!(client.start());
    assert_eq!(client.state(), ConnectionState::Idle);

    eventually("open", || client.state() == ConnectionState::Open).await;
    assert!(!client.on_focus());
}

#[tokio::test]
async fn test_focus_reconnects_after_disconnect() {
    let server = MockServer::start().await;
    let view = Arc::new(RecordingView::default());
    let client = client_for(&server, &view);

    connected(&server, &client).await;
    client.disconnect();

    assert!(client.on_visibility_change(true));
    eventually("second connection", || server.connections() == 2).await;
}

#[tokio::test]
async fn test_resolve_role_checks_when_unknown() {
    let server = MockServer::start().await;
    server.respond("GET", "/rides/assigned", 403, r#"{"detail":"Drivers only"}"#);
    let view = Arc::new(RecordingView::default());
    let client = client_for(&server, &view);

    let role = client.resolve_role().await.expect("role");

    assert_eq!(role, Some(Role::Rider));
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_logout_clears_persisted_session() {
    let dir = TempDir::new().expect("tempdir");
    let store = Arc::new(FileSessionStore::new(dir.path().join("session.json")));
    let server = MockServer::start().await;
    server.greet_with(RIDER_GREETING);
    let view = Arc::new(RecordingView::default());

    let client = Client::builder()
        .base_url(server.base_url())
        .session_store(store.clone())
        .credential("secret-token")
        .view(view.clone())
        .build()
        .expect("client");

    connected(&server, &client).await;
    eventually("identity", || client.identity().is_some()).await;

    client.logout();

    assert!(!client.session().has_credential());
    assert!(client.identity().is_none());
    let persisted = store.load().expect("load");
    assert!(persisted.is_none_or(|session| session.token.is_none()));
    assert!(matches!(client.connect(), Err(ride_sync::Error::MissingCredential)));
    assert_eq!(
        view.notices.lock().last(),
        Some(&Notice::error("Please login first"))
    );
}
