//! Persistent Socket.IO connection with reconnect

use std::collections::HashSet;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use super::event::{EventKind, RealtimeEvent};
use super::packet::{EnginePacket, SocketPacket};
use crate::error::{PacketError, RealtimeError};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const EVENT_BUFFER: usize = 256;

/// What the channel reports to its owner
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connected,
    Disconnected { reason: String },
    Event(RealtimeEvent),
}

/// Builder for a realtime connection
#[derive(Debug, Clone)]
pub struct RealtimeChannel {
    endpoint: String,
    subscriptions: HashSet<EventKind>,
}

impl RealtimeChannel {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            subscriptions: HashSet::new(),
        }
    }

    pub fn subscribe(mut self, kind: EventKind) -> Self {
        self.subscriptions.insert(kind);
        self
    }

    pub fn subscribe_all(self) -> Self {
        EventKind::ALL.into_iter().fold(self, |channel, kind| channel.subscribe(kind))
    }

    /// Open the connection on a background task.
    ///
    /// The task keeps reconnecting after drops until [`RealtimeHandle::disconnect`]
    /// is called or the handle is dropped.
    pub fn connect(self) -> Result<RealtimeHandle, RealtimeError> {
        let url = websocket_url(&self.endpoint)?;
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        info!(%url, "starting realtime channel");
        let task = tokio::spawn(run(url, self.subscriptions, tx, shutdown_rx));

        Ok(RealtimeHandle {
            events: rx,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }
}

/// Owner side of a running realtime connection
pub struct RealtimeHandle {
    events: mpsc::Receiver<ChannelEvent>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl RealtimeHandle {
    /// Next event, in the order the server sent them
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    /// Close the connection and wait for the background task to finish
    pub async fn disconnect(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for RealtimeHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// `http://host:5000` becomes `ws://host:5000/socket.io/?EIO=4&transport=websocket`
pub fn websocket_url(endpoint: &str) -> Result<Url, RealtimeError> {
    let mut url = Url::parse(endpoint).map_err(|e| RealtimeError::InvalidEndpoint(format!("{}: {}", endpoint, e)))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(RealtimeError::InvalidEndpoint(format!(
                "unsupported scheme '{}'",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| RealtimeError::InvalidEndpoint(endpoint.to_string()))?;

    if url.path().is_empty() || url.path() == "/" {
        url.set_path("/socket.io/");
    }
    url.set_query(Some("EIO=4&transport=websocket"));
    Ok(url)
}

enum Exit {
    Shutdown,
    ReceiverGone,
    Dropped(String),
}

async fn run(
    url: Url,
    subscriptions: HashSet<EventKind>,
    tx: mpsc::Sender<ChannelEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut backoff = INITIAL_BACKOFF;
    loop {
        let mut connected = false;
        let exit = run_session(&url, &subscriptions, &tx, &mut shutdown, &mut connected).await;

        let reason = match exit {
            Exit::Shutdown => {
                info!("realtime channel closed");
                return;
            }
            Exit::ReceiverGone => {
                debug!("realtime receiver dropped, stopping");
                return;
            }
            Exit::Dropped(reason) => reason,
        };

        if connected {
            backoff = INITIAL_BACKOFF;
            warn!(%reason, "realtime connection dropped");
            if tx.send(ChannelEvent::Disconnected { reason }).await.is_err() {
                return;
            }
        } else {
            warn!(%reason, retry_in = ?backoff, "realtime connect failed");
        }

        tokio::select! {
            _ = &mut shutdown => return,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = next_backoff(backoff);
    }
}

async fn run_session(
    url: &Url,
    subscriptions: &HashSet<EventKind>,
    tx: &mpsc::Sender<ChannelEvent>,
    shutdown: &mut oneshot::Receiver<()>,
    connected: &mut bool,
) -> Exit {
    let connect = tokio::select! {
        _ = &mut *shutdown => return Exit::Shutdown,
        result = connect_async(url.as_str()) => result,
    };
    let (mut ws, _) = match connect {
        Ok(value) => value,
        Err(err) => return Exit::Dropped(err.to_string()),
    };
    debug!("websocket open, waiting for handshake");

    loop {
        let frame = tokio::select! {
            _ = &mut *shutdown => {
                let _ = ws.send(Message::Text(SocketPacket::disconnect().into_frame())).await;
                let _ = ws.close(None).await;
                return Exit::Shutdown;
            }
            frame = ws.next() => frame,
        };

        let text = match frame {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => return Exit::Dropped("connection closed".to_string()),
            Some(Ok(_)) => continue,
            Some(Err(err)) => return Exit::Dropped(err.to_string()),
        };

        let step = match interpret(&text, subscriptions) {
            Ok(step) => step,
            Err(err) => {
                warn!(error = %err, frame = %text, "ignoring malformed realtime frame");
                continue;
            }
        };

        match step {
            Step::Reply(reply) => {
                if let Err(err) = ws.send(Message::Text(reply)).await {
                    return Exit::Dropped(err.to_string());
                }
            }
            Step::Emit(event) => {
                if event == ChannelEvent::Connected {
                    *connected = true;
                    info!("realtime channel connected");
                }
                if tx.send(event).await.is_err() {
                    let _ = ws.close(None).await;
                    return Exit::ReceiverGone;
                }
            }
            Step::Closed(reason) => {
                let _ = ws.close(None).await;
                return Exit::Dropped(reason);
            }
            Step::Ignore => {}
        }
    }
}

/// Reaction to one inbound text frame
#[derive(Debug, PartialEq)]
enum Step {
    Reply(String),
    Emit(ChannelEvent),
    Closed(String),
    Ignore,
}

fn interpret(frame: &str, subscriptions: &HashSet<EventKind>) -> Result<Step, PacketError> {
    let message = match EnginePacket::decode(frame)? {
        EnginePacket::Open(handshake) => {
            debug!(sid = %handshake.sid, ping_interval = handshake.ping_interval, "engine.io open");
            return Ok(Step::Reply(SocketPacket::connect().into_frame()));
        }
        EnginePacket::Ping(data) => return Ok(Step::Reply(EnginePacket::Pong(data).encode())),
        EnginePacket::Close => return Ok(Step::Closed("server closed the transport".to_string())),
        EnginePacket::Message(message) => message,
        EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => return Ok(Step::Ignore),
    };

    match SocketPacket::decode(&message)? {
        SocketPacket::Connect { .. } => Ok(Step::Emit(ChannelEvent::Connected)),
        SocketPacket::Disconnect { .. } => Ok(Step::Closed("server disconnected the socket".to_string())),
        SocketPacket::ConnectError { data, .. } => Ok(Step::Closed(format!("connect error: {}", data))),
        SocketPacket::Event { name, mut args, .. } => {
            let kind = match EventKind::from_name(&name) {
                Some(kind) if subscriptions.contains(&kind) => kind,
                _ => {
                    debug!(event = %name, "dropping unsubscribed event");
                    return Ok(Step::Ignore);
                }
            };
            let payload = if args.is_empty() {
                serde_json::Value::Null
            } else {
                args.swap_remove(0)
            };
            let event = RealtimeEvent::from_payload(kind, payload)?;
            Ok(Step::Emit(ChannelEvent::Event(event)))
        }
        SocketPacket::Unsupported(kind) => {
            debug!(packet_type = %kind, "ignoring unsupported socket.io packet");
            Ok(Step::Ignore)
        }
    }
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    fn all() -> HashSet<EventKind> {
        EventKind::ALL.into_iter().collect()
    }

    #[test]
    fn test_websocket_url() {
        assert_eq!(
            websocket_url("http://localhost:5000").unwrap().as_str(),
            "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            websocket_url("https://render.example.com/custom/").unwrap().as_str(),
            "wss://render.example.com/custom/?EIO=4&transport=websocket"
        );
        assert!(matches!(
            websocket_url("ftp://x"),
            Err(RealtimeError::InvalidEndpoint(_))
        ));
        assert!(websocket_url("not a url").is_err());
    }

    #[test]
    fn test_interpret_handshake_and_ping() {
        let open = r#"0{"sid":"s","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;
        assert_eq!(interpret(open, &all()).unwrap(), Step::Reply("40".to_string()));
        assert_eq!(interpret("2", &all()).unwrap(), Step::Reply("3".to_string()));
        assert_eq!(interpret(r#"40{"sid":"x"}"#, &all()).unwrap(), Step::Emit(ChannelEvent::Connected));
    }

    #[test]
    fn test_interpret_filters_by_subscription() {
        let frame = r#"42["progress",{"progress":30,"jobId":"j"}]"#;

        let only_completed: HashSet<EventKind> = [EventKind::Completed].into_iter().collect();
        assert_eq!(interpret(frame, &only_completed).unwrap(), Step::Ignore);

        assert_eq!(
            interpret(frame, &all()).unwrap(),
            Step::Emit(ChannelEvent::Event(RealtimeEvent::progress("j", 30.0)))
        );
        assert_eq!(interpret(r#"42["log",{"line":"x"}]"#, &all()).unwrap(), Step::Ignore);
    }

    #[test]
    fn test_interpret_close_packets() {
        assert!(matches!(interpret("1", &all()).unwrap(), Step::Closed(_)));
        assert!(matches!(interpret("41", &all()).unwrap(), Step::Closed(_)));
        assert!(matches!(
            interpret(r#"44{"message":"denied"}"#, &all()).unwrap(),
            Step::Closed(ref r) if r.contains("denied")
        ));
    }

    #[test]
    fn test_interpret_bad_payload_is_error() {
        assert!(interpret(r#"42["error",{"message":"no id"}]"#, &all()).is_err());
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(next_backoff(Duration::from_secs(1)), Duration::from_secs(2));
        assert_eq!(next_backoff(Duration::from_secs(20)), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn test_channel_against_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let open = r#"0{"sid":"s1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;
            ws.send(Message::Text(open.to_string())).await.unwrap();
            assert_eq!(ws.next().await.unwrap().unwrap(), Message::Text("40".to_string()));

            ws.send(Message::Text(r#"40{"sid":"n1"}"#.to_string())).await.unwrap();
            ws.send(Message::Text("2".to_string())).await.unwrap();
            assert_eq!(ws.next().await.unwrap().unwrap(), Message::Text("3".to_string()));

            for frame in [
                r#"42["progress",{"progress":10,"jobId":"a"}]"#,
                r#"42["status",{"ok":true}]"#,
                r#"42["completed",{"videoUrl":"http://v/a.mp4","topic":"t","jobId":"a"}]"#,
            ] {
                ws.send(Message::Text(frame.to_string())).await.unwrap();
            }

            // Client says goodbye on disconnect
            loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) if text == "41" => break,
                    Some(Ok(_)) => continue,
                    _ => panic!("connection ended before socket.io disconnect"),
                }
            }
        });

        let mut handle = RealtimeChannel::new(&format!("http://{}", addr))
            .subscribe_all()
            .connect()
            .unwrap();

        let mut received = Vec::new();
        while received.len() < 3 {
            let event = timeout(Duration::from_secs(5), handle.recv())
                .await
                .expect("timed out waiting for realtime event")
                .expect("channel closed");
            received.push(event);
        }

        assert_eq!(
            received,
            vec![
                ChannelEvent::Connected,
                ChannelEvent::Event(RealtimeEvent::progress("a", 10.0)),
                ChannelEvent::Event(RealtimeEvent::completed("a", "http://v/a.mp4", "t")),
            ]
        );

        handle.disconnect().await;
        timeout(Duration::from_secs(5), server).await.unwrap().unwrap();
    }

    type ServerSocket = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

    async fn accept_connected(listener: &TcpListener, sid: &str) -> ServerSocket {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let open = format!(
            r#"0{{"sid":"{}","upgrades":[],"pingInterval":25000,"pingTimeout":20000}}"#,
            sid
        );
        ws.send(Message::Text(open)).await.unwrap();
        assert_eq!(ws.next().await.unwrap().unwrap(), Message::Text("40".to_string()));
        ws.send(Message::Text(format!(r#"40{{"sid":"{}"}}"#, sid))).await.unwrap();
        ws
    }

    #[tokio::test]
    async fn test_channel_reconnects_after_drop() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let mut first = accept_connected(&listener, "s1").await;
            let _ = first.close(None).await;
            drop(first);

            let mut second = accept_connected(&listener, "s2").await;
            second
                .send(Message::Text(r#"42["progress",{"progress":55,"jobId":"a"}]"#.to_string()))
                .await
                .unwrap();

            loop {
                match second.next().await {
                    Some(Ok(Message::Text(text))) if text == "41" => break,
                    Some(Ok(_)) => continue,
                    _ => panic!("connection ended before socket.io disconnect"),
                }
            }
        });

        let mut handle = RealtimeChannel::new(&format!("http://{}", addr))
            .subscribe_all()
            .connect()
            .unwrap();

        let mut received = Vec::new();
        while received.len() < 4 {
            let event = timeout(Duration::from_secs(10), handle.recv())
                .await
                .expect("timed out waiting for realtime event")
                .expect("channel closed");
            received.push(event);
        }

        assert_eq!(received[0], ChannelEvent::Connected);
        assert!(matches!(received[1], ChannelEvent::Disconnected { .. }));
        assert_eq!(received[2], ChannelEvent::Connected);
        assert_eq!(received[3], ChannelEvent::Event(RealtimeEvent::progress("a", 55.0)));

        handle.disconnect().await;
        timeout(Duration::from_secs(5), server).await.unwrap().unwrap();
    }
}
