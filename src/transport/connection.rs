//! WebSocket connection and event loop.
//!
//! One [`Connection`] wraps one client socket. It spawns a tokio task that
//! owns both halves of the stream and handles:
//!
//! - Incoming frames, forwarded to the transport as [`Signal`]s
//! - Outgoing text frames queued through [`Connection::send`]
//! - Optional heartbeat pings
//! - Explicit close requests
//!
//! Every signal carries the epoch the connection was opened under, so the
//! transport can discard signals from connections it already abandoned.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, timeout};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::command::PING_FRAME;

use super::core::Signal;
use super::state::{CLOSE_ABNORMAL, CLOSE_NO_STATUS};

// ============================================================================
// Types
// ============================================================================

/// Client WebSocket stream.
pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Write a text frame and report the outcome.
    Send {
        text: String,
        ack_tx: oneshot::Sender<Result<()>>,
    },
    /// Send a close frame and stop.
    Close { code: u16, reason: String },
}

// ============================================================================
// Connection
// ============================================================================

/// Handle to a live realtime connection.
///
/// Cloning yields another handle to the same event loop.
#[derive(Debug, Clone)]
pub(crate) struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
}

impl Connection {
    /// Performs the client handshake against `url`.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if the handshake exceeds `connect_timeout`
    /// - [`Error::HandshakeRejected`] if the server answers the upgrade with an HTTP error
    /// - [`Error::Connection`] if the socket fails
    pub(crate) async fn open(url: &Url, connect_timeout: Duration) -> Result<WsStream> {
        let (stream, response) = timeout(connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| Error::connection_timeout(connect_timeout.as_millis() as u64))?
            .map_err(|e| match e {
                WsError::Http(response) => Error::HandshakeRejected {
                    status: response.status().as_u16(),
                },
                other => Error::connection(other.to_string()),
            })?;

        debug!(status = %response.status(), "WebSocket handshake completed");
        Ok(stream)
    }

    /// Spawns the event loop for an opened stream.
    ///
    /// Posts [`Signal::Opened`] before any frame signal of this connection.
    pub(crate) fn spawn(
        stream: WsStream,
        epoch: u64,
        signal_tx: mpsc::UnboundedSender<Signal>,
        heartbeat: Option<Duration>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let connection = Self { command_tx };

        let _ = signal_tx.send(Signal::Opened {
            epoch,
            connection: connection.clone(),
        });

        tokio::spawn(Self::run_event_loop(
            stream, epoch, command_rx, signal_tx, heartbeat,
        ));

        connection
    }

    /// Writes a text frame.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the event loop has stopped
    /// - [`Error::WebSocket`] if the write fails
    pub(crate) async fn send(&self, text: String) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();

        self.command_tx
            .send(ConnectionCommand::Send { text, ack_tx })
            .map_err(|_| Error::ConnectionClosed)?;

        ack_rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    /// Sends a close frame and stops the event loop.
    ///
    /// The loop emits no closure signal for a requested close.
    pub(crate) fn close(&self, code: u16, reason: &str) {
        let _ = self.command_tx.send(ConnectionCommand::Close {
            code,
            reason: reason.to_string(),
        });
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop(
        stream: WsStream,
        epoch: u64,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        signal_tx: mpsc::UnboundedSender<Signal>,
        heartbeat: Option<Duration>,
    ) {
        let (mut ws_write, mut ws_read) = stream.split();
        let mut heartbeat = heartbeat.map(|period| {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            tokio::select! {
                // Incoming frames from the server
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            trace!(epoch, len = text.len(), "Frame received");
                            let _ = signal_tx.send(Signal::Message {
                                epoch,
                                text: text.to_string(),
                            });
                        }

                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (u16::from(f.code), f.reason.to_string()))
                                .unwrap_or((CLOSE_NO_STATUS, String::new()));

                            debug!(epoch, code, %reason, "WebSocket closed by remote");
                            let _ = signal_tx.send(Signal::Closed { epoch, code, reason });
                            break;
                        }

                        Some(Err(e)) => {
                            warn!(epoch, error = %e, "WebSocket error");
                            let _ = signal_tx.send(Signal::Error {
                                epoch,
                                message: e.to_string(),
                            });
                            let _ = signal_tx.send(Signal::Closed {
                                epoch,
                                code: CLOSE_ABNORMAL,
                                reason: String::new(),
                            });
                            break;
                        }

                        None => {
                            debug!(epoch, "WebSocket stream ended");
                            let _ = signal_tx.send(Signal::Closed {
                                epoch,
                                code: CLOSE_ABNORMAL,
                                reason: String::new(),
                            });
                            break;
                        }

                        // Binary, Ping, Pong, Frame
                        Some(Ok(_)) => {}
                    }
                }

                // Commands from the transport
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { text, ack_tx }) => {
                            let result = ws_write
                                .send(Message::Text(text.into()))
                                .await
                                .map_err(Error::from);
                            let _ = ack_tx.send(result);
                        }

                        Some(ConnectionCommand::Close { code, reason }) => {
                            debug!(epoch, code, "Closing connection");
                            let frame = CloseFrame {
                                code: CloseCode::from(code),
                                reason: reason.into(),
                            };
                            let _ = ws_write.send(Message::Close(Some(frame))).await;
                            break;
                        }

                        None => {
                            debug!(epoch, "Command channel closed");
                            let _ = ws_write.close().await;
                            break;
                        }
                    }
                }

                // Keepalive
                () = next_tick(&mut heartbeat) => {
                    trace!(epoch, "Heartbeat ping");
                    if let Err(e) = ws_write.send(Message::Text(PING_FRAME.into())).await {
                        warn!(epoch, error = %e, "Heartbeat failed");
                    }
                }
            }
        }

        debug!(epoch, "Event loop terminated");
    }
}

/// Waits for the next heartbeat tick, forever if heartbeats are off.
async fn next_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    async fn serve_once() -> (Url, tokio::task::JoinHandle<WebSocketStream<TcpStream>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let url = Url::parse(&format!("ws://127.0.0.1:{port}/ws")).expect("url");

        let handle = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.expect("accept");
            accept_async(tcp).await.expect("handshake")
        });

        (url, handle)
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let (url, server) = serve_once().await;
        let stream = Connection::open(&url, Duration::from_secs(5))
            .await
            .expect("open");
        let mut server = server.await.expect("server");

        let (signal_tx, mut signal_rx) = mpsc::unbounded_channel();
        let connection = Connection::spawn(stream, 7, signal_tx, None);

        connection
            .send(r#"{"action":"ride_assigned","ride_id":1}"#.to_string())
            .await
            .expect("send");
        let frame = server.next().await.expect("frame").expect("ok");
        assert_eq!(
            frame.into_text().expect("text").as_str(),
            r#"{"action":"ride_assigned","ride_id":1}"#
        );

        assert!(matches!(
            signal_rx.recv().await,
            Some(Signal::Opened { epoch: 7, .. })
        ));

        server
            .send(Message::Text(r#"{"event":"pong"}"#.into()))
            .await
            .expect("server send");
        match signal_rx.recv().await {
            Some(Signal::Message { epoch, text }) => {
                assert_eq!(epoch, 7);
                assert_eq!(text, r#"{"event":"pong"}"#);
            }
            other => panic!("unexpected signal: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_remote_close_reports_code() {
        let (url, server) = serve_once().await;
        let stream = Connection::open(&url, Duration::from_secs(5))
            .await
            .expect("open");
        let mut server = server.await.expect("server");

        let (signal_tx, mut signal_rx) = mpsc::unbounded_channel();
        let _connection = Connection::spawn(stream, 3, signal_tx, None);

        server
            .close(Some(CloseFrame {
                code: CloseCode::from(1008),
                reason: "bad token".into(),
            }))
            .await
            .expect("close");

        assert!(matches!(
            signal_rx.recv().await,
            Some(Signal::Opened { epoch: 3, .. })
        ));
        match signal_rx.recv().await {
            Some(Signal::Closed { epoch, code, .. }) => {
                assert_eq!(epoch, 3);
                assert_eq!(code, 1008);
            }
            other => panic!("unexpected signal: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_heartbeat_sends_ping() {
        let (url, server) = serve_once().await;
        let stream = Connection::open(&url, Duration::from_secs(5))
            .await
            .expect("open");
        let mut server = server.await.expect("server");

        let (signal_tx, _signal_rx) = mpsc::unbounded_channel();
        let _connection =
            Connection::spawn(stream, 1, signal_tx, Some(Duration::from_millis(20)));

        let frame = server.next().await.expect("frame").expect("ok");
        assert_eq!(frame.into_text().expect("text").as_str(), PING_FRAME);
    }

    #[tokio::test]
    async fn test_open_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let url = Url::parse(&format!("ws://127.0.0.1:{port}/ws")).expect("url");
        let result = Connection::open(&url, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(Error::Connection { .. })));
    }

    #[tokio::test]
    async fn test_open_forbidden_upgrade() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        tokio::spawn(async move {
            let (mut tcp, _) = listener.accept().await.expect("accept");
            let mut buf = [0u8; 4096];
            let _ = tcp.read(&mut buf).await;
            let _ = tcp
                .write_all(b"HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n")
                .await;
        });

        let url = Url::parse(&format!("ws://127.0.0.1:{port}/ws")).expect("url");
        let err = Connection::open(&url, Duration::from_secs(5))
            .await
            .expect_err("rejected");

        assert!(matches!(err, Error::HandshakeRejected { status: 403 }));
        assert!(err.is_unauthorized());
    }
}
