//! Shared fixtures for integration tests.
//!
//! [`MockServer`] answers both surfaces on one port: WebSocket upgrades
//! become scriptable realtime connections, everything else gets a canned
//! JSON response.

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::http;
use tracing_subscriber::EnvFilter;

use ride_sync::{
    ConnectionStatus, LifecycleEvent, Notice, RefreshTarget, Ride, RideView, Transport,
};

// ============================================================================
// Logging
// ============================================================================

/// Installs a test subscriber honoring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Polling
// ============================================================================

/// Waits up to five seconds for `condition`.
///
/// # Panics
///
/// Panics naming `what` on timeout.
pub async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        sleep(Duration::from_millis(10)).await;
    }
}

/// Returns an address nothing listens on.
pub async fn unused_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{addr}")
}

/// Serializes a ride the way the server lists it.
pub fn ride_json(id: u64, user_id: u64, status: &str) -> String {
    format!(
        r#"{{"id":{id},"user_id":{user_id},"driver_id":null,"pickup":"Airport","dropoff":"Downtown","status":"{status}"}}"#
    )
}

// ============================================================================
// MockServer
// ============================================================================

/// Instruction for the current realtime connection.
#[derive(Debug)]
enum Action {
    Push(String),
    Close(u16),
    Drop,
}

/// One request seen on the request/response surface.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: String,
}

#[derive(Default)]
struct ServerState {
    greeting: Mutex<Option<String>>,
    rejection: Mutex<Option<u16>>,
    current: Mutex<Option<mpsc::UnboundedSender<Action>>>,
    connections: AtomicUsize,
    upgrade_uris: Mutex<Vec<String>>,
    frames: Mutex<Vec<String>>,
    routes: Mutex<HashMap<String, (u16, String)>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Local dispatch server double.
pub struct MockServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    task: JoinHandle<()>,
}

impl MockServer {
    /// Binds to a random local port and starts accepting.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let state = Arc::new(ServerState::default());

        let accept_state = Arc::clone(&state);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, Arc::clone(&accept_state)));
            }
        });

        Self { addr, state, task }
    }

    /// Returns the service root.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Returns the realtime endpoint.
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Sends `frame` on every new realtime connection.
    pub fn greet_with(&self, frame: impl Into<String>) {
        *self.state.greeting.lock() = Some(frame.into());
    }

    /// Refuses every realtime upgrade with HTTP `status`.
    pub fn reject_upgrades(&self, status: u16) {
        *self.state.rejection.lock() = Some(status);
    }

    /// Answers `method path` with `status` and `body`.
    pub fn respond(&self, method: &str, path: &str, status: u16, body: impl Into<String>) {
        self.state
            .routes
            .lock()
            .insert(format!("{method} {path}"), (status, body.into()));
    }

    /// Pushes a frame on the current realtime connection.
    pub fn push(&self, frame: impl Into<String>) {
        self.act(Action::Push(frame.into()));
    }

    /// Closes the current realtime connection with `code`.
    pub fn close_with(&self, code: u16) {
        self.act(Action::Close(code));
    }

    /// Drops the current realtime connection without a close frame.
    pub fn drop_connection(&self) {
        self.act(Action::Drop);
    }

    /// Number of realtime connections accepted so far.
    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Request URIs of all realtime upgrades.
    pub fn upgrade_uris(&self) -> Vec<String> {
        self.state.upgrade_uris.lock().clone()
    }

    /// Text frames received from clients.
    pub fn frames(&self) -> Vec<String> {
        self.state.frames.lock().clone()
    }

    /// Requests received on the request/response surface.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }

    fn act(&self, action: Action) {
        let current = self.state.current.lock();
        let tx = current.as_ref().expect("no realtime connection");
        tx.send(action).expect("connection task gone");
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(stream: TcpStream, state: Arc<ServerState>) {
    let Some(head) = peek_head(&stream).await else {
        return;
    };

    if head.to_ascii_lowercase().contains("upgrade: websocket") {
        serve_realtime(stream, state).await;
    } else {
        serve_request(stream, state).await;
    }
}

/// Peeks at the request head without consuming it.
async fn peek_head(stream: &TcpStream) -> Option<String> {
    let mut buf = vec![0u8; 8192];
    for _ in 0..500 {
        let n = stream.peek(&mut buf).await.ok()?;
        if n == 0 {
            return None;
        }
        let head = String::from_utf8_lossy(&buf[..n]);
        if head.contains("\r\n\r\n") {
            return Some(head.into_owned());
        }
        sleep(Duration::from_millis(2)).await;
    }
    None
}

async fn serve_realtime(stream: TcpStream, state: Arc<ServerState>) {
    let uris = Arc::clone(&state);
    let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        uris.upgrade_uris.lock().push(request.uri().to_string());
        match *uris.rejection.lock() {
            Some(status) => Err(http::Response::builder()
                .status(status)
                .body(None)
                .expect("rejection")),
            None => Ok(response),
        }
    };

    let Ok(mut ws) = accept_hdr_async(stream, callback).await else {
        return;
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    *state.current.lock() = Some(tx);
    state.connections.fetch_add(1, Ordering::SeqCst);

    let greeting = state.greeting.lock().clone();
    if let Some(greeting) = greeting
        && ws.send(Message::Text(greeting.into())).await.is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            message = ws.next() => match message {
                Some(Ok(Message::Text(text))) => state.frames.lock().push(text.to_string()),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            action = rx.recv() => match action {
                Some(Action::Push(frame)) => {
                    if ws.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                Some(Action::Close(code)) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: "".into(),
                    };
                    let _ = ws.close(Some(frame)).await;
                    while let Some(Ok(_)) = ws.next().await {}
                    break;
                }
                Some(Action::Drop) | None => break,
            },
        }
    }
}

async fn serve_request(mut stream: TcpStream, state: Arc<ServerState>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.lines();
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();

    let mut content_length = 0usize;
    let mut authorization = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let value = value.trim();
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.parse().unwrap_or(0),
                "authorization" => authorization = Some(value.to_string()),
                _ => {}
            }
        }
    }

    while buf.len() < header_end + content_length {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    let body = String::from_utf8_lossy(&buf[header_end..header_end + content_length]).into_owned();

    let (status, payload) = state
        .routes
        .lock()
        .get(&format!("{method} {path}"))
        .cloned()
        .unwrap_or_else(|| (404, r#"{"detail":"Not Found"}"#.to_string()));

    state.requests.lock().push(RecordedRequest {
        method,
        path,
        authorization,
        body,
    });

    let response = format!(
        "HTTP/1.1 {status} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
        payload.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

// ============================================================================
// Recorders
// ============================================================================

/// View that records everything it is shown.
#[derive(Default)]
pub struct RecordingView {
    pub statuses: Mutex<Vec<ConnectionStatus>>,
    pub notices: Mutex<Vec<Notice>>,
    pub lists: Mutex<Vec<(RefreshTarget, Vec<Ride>)>>,
}

impl RecordingView {
    pub fn error_notices(&self) -> Vec<String> {
        self.notices
            .lock()
            .iter()
            .filter(|notice| notice.is_error())
            .map(|notice| notice.text().to_string())
            .collect()
    }

    pub fn has_notice(&self, text: &str) -> bool {
        self.notices.lock().iter().any(|notice| notice.text() == text)
    }

    pub fn last_status(&self) -> Option<ConnectionStatus> {
        self.statuses.lock().last().copied()
    }
}

impl RideView for RecordingView {
    fn status(&self, status: ConnectionStatus) {
        self.statuses.lock().push(status);
    }

    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }

    fn show_rides(&self, target: RefreshTarget, rides: &[Ride]) {
        self.lists.lock().push((target, rides.to_vec()));
    }
}

/// Records every lifecycle notification of `transport`.
pub fn record_lifecycle(transport: &Transport) -> Arc<Mutex<Vec<LifecycleEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    transport.subscribe(move |event| sink.lock().push(event.clone()));
    events
}
