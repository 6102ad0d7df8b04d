//! Command dispatch over both surfaces.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio_test::{assert_err, assert_ok};
use url::Url;

use ride_sync::router::NoRefresh;
use ride_sync::transport::TransportConfig;
use ride_sync::{
    Accepted, ApiRefresher, Credential, Dispatcher, Error, RefreshTarget, RideApi, RideCommand,
    RideStatus, Session, Transport,
};

use common::{MockServer, RecordingView, eventually, init_tracing, ride_json, unused_base_url};

struct Fixture {
    transport: Transport,
    api: RideApi,
    session: Session,
}

fn fixture(base_url: &str) -> Fixture {
    let session = Session::new();
    session.set_credential(Credential::new("secret-token"));

    let ws_url = format!("{}/ws", base_url.replacen("http", "ws", 1));
    let transport = Transport::new(
        Url::parse(&ws_url).expect("ws url"),
        session.clone(),
        TransportConfig::default(),
    );
    let api = RideApi::new(
        Url::parse(base_url).expect("base url"),
        session.clone(),
        Duration::from_secs(2),
    )
    .expect("api");

    Fixture {
        transport,
        api,
        session,
    }
}

fn dispatcher(fixture: &Fixture) -> Dispatcher {
    Dispatcher::new(
        fixture.transport.clone(),
        Arc::new(fixture.api.clone()),
        Arc::new(NoRefresh),
        fixture.session.clone(),
    )
}

#[tokio::test]
async fn test_open_channel_sends_one_frame_and_no_request() {
    init_tracing();
    let server = MockServer::start().await;
    let fixture = fixture(&server.base_url());
    let dispatcher = dispatcher(&fixture);

    fixture.transport.connect().expect("connect");
    eventually("open", || fixture.transport.is_open()).await;

    let accepted = dispatcher
        .dispatch(RideCommand::request("Airport", "Downtown"))
        .await
        .expect("dispatch");

    assert_eq!(accepted, Accepted::Queued);
    eventually("frame", || server.frames().len() == 1).await;

    let frame: serde_json::Value = serde_json::from_str(&server.frames()[0]).expect("json");
    assert_eq!(
        frame,
        serde_json::json!({"action": "ride_requested", "pickup": "Airport", "dropoff": "Downtown"})
    );
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn test_closed_channel_sends_one_request_and_no_frame() {
    let server = MockServer::start().await;
    server.respond("POST", "/rides/", 200, ride_json(11, 2, "requested"));
    let fixture = fixture(&server.base_url());
    let dispatcher = dispatcher(&fixture);

    let accepted = dispatcher
        .dispatch(RideCommand::request("Airport", "Downtown"))
        .await
        .expect("dispatch");

    let Accepted::Completed(ride) = accepted else {
        panic!("expected fallback completion, got {accepted:?}");
    };
    assert_eq!(ride.id.as_u64(), 11);
    assert_eq!(ride.status, RideStatus::Requested);

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer secret-token"));

    let body: serde_json::Value = serde_json::from_str(&requests[0].body).expect("json");
    assert_eq!(
        body,
        serde_json::json!({"pickup": "Airport", "dropoff": "Downtown"})
    );
    assert!(server.frames().is_empty());
    assert_eq!(server.connections(), 0);
}

#[tokio::test]
async fn test_assign_and_complete_paths() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    server.respond("GET", "/rides/3/assign", 200, ride_json(3, 2, "assigned"));
    server.respond("POST", "/rides/3/complete", 200, ride_json(3, 2, "completed"));
    let fixture = fixture(&server.base_url());
    let dispatcher = dispatcher(&fixture);

    dispatcher.dispatch(RideCommand::assign(3)).await?;
    dispatcher.dispatch(RideCommand::complete(3)).await?;

    let seen: Vec<(String, String)> = server
        .requests()
        .into_iter()
        .map(|request| (request.method, request.path))
        .collect();
    assert_eq!(
        seen,
        vec![
            ("GET".to_string(), "/rides/3/assign".to_string()),
            ("POST".to_string(), "/rides/3/complete".to_string()),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_server_detail_is_surfaced() {
    let server = MockServer::start().await;
    server.respond(
        "GET",
        "/rides/9/assign",
        400,
        r#"{"detail":"Ride already assigned or completed"}"#,
    );
    let fixture = fixture(&server.base_url());

    let err = assert_err!(dispatcher(&fixture).dispatch(RideCommand::assign(9)).await);

    assert!(matches!(err, Error::Api { status: 400, .. }));
    assert_eq!(err.user_message(), "Ride already assigned or completed");
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_failure_without_detail() {
    let server = MockServer::start().await;
    server.respond("POST", "/rides/5/complete", 500, "{}");
    let fixture = fixture(&server.base_url());

    let err = dispatcher(&fixture)
        .dispatch(RideCommand::complete(5))
        .await
        .expect_err("should fail");

    assert!(matches!(
        err,
        Error::Api {
            status: 500,
            detail: None
        }
    ));
}

#[tokio::test]
async fn test_unreachable_server_is_a_network_error() {
    let base = unused_base_url().await;
    let fixture = fixture(&base);

    let err = dispatcher(&fixture)
        .dispatch(RideCommand::request("A", "B"))
        .await
        .expect_err("should fail");

    assert!(matches!(err, Error::Network(_)));
    assert_eq!(err.user_message(), "Network error. Please try again.");
}

#[tokio::test]
async fn test_fallback_success_refreshes_lists() {
    let server = MockServer::start().await;
    server.respond("POST", "/rides/", 200, ride_json(12, 2, "requested"));
    server.respond(
        "GET",
        "/rides/my",
        200,
        format!("[{}]", ride_json(12, 2, "requested")),
    );
    let fixture = fixture(&server.base_url());
    let view = Arc::new(RecordingView::default());
    let refresher = Arc::new(ApiRefresher::new(fixture.api.clone(), view.clone()));
    let dispatcher = Dispatcher::new(
        fixture.transport.clone(),
        Arc::new(fixture.api.clone()),
        refresher,
        fixture.session.clone(),
    );

    dispatcher
        .dispatch(RideCommand::request("Airport", "Downtown"))
        .await
        .expect("dispatch");

    eventually("list shown", || !view.lists.lock().is_empty()).await;
    let lists = view.lists.lock();
    assert_eq!(lists[0].0, RefreshTarget::MyRides);
    assert_eq!(lists[0].1.len(), 1);
}

#[tokio::test]
async fn test_open_requests_filters_by_status() {
    let server = MockServer::start().await;
    server.respond(
        "GET",
        "/rides/",
        200,
        format!(
            "[{},{},{}]",
            ride_json(1, 2, "requested"),
            ride_json(2, 2, "assigned"),
            ride_json(3, 4, "requested")
        ),
    );
    let fixture = fixture(&server.base_url());

    let rides = assert_ok!(fixture.api.open_requests().await);

    let ids: Vec<u64> = rides.iter().map(|ride| ride.id.as_u64()).collect();
    assert_eq!(ids, vec![1, 3]);
}
