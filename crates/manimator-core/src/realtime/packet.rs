//! Engine.IO v4 / Socket.IO v5 text frame codec
//!
//! Only the text encoding used over the WebSocket transport is handled.
//! Binary attachments and acknowledgements are recognised but not decoded.

use serde::Deserialize;
use serde_json::Value;

use crate::error::PacketError;

/// Handshake sent by the server in the Engine.IO `open` packet
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

/// Transport-level packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    pub fn decode(frame: &str) -> Result<Self, PacketError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(PacketError::Empty)?;
        let data = chars.as_str();

        match kind {
            '0' => {
                let handshake = serde_json::from_str(data)
                    .map_err(|e| PacketError::InvalidPayload(format!("open: {}", e)))?;
                Ok(EnginePacket::Open(handshake))
            }
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(data.to_string())),
            '3' => Ok(EnginePacket::Pong(data.to_string())),
            '4' => Ok(EnginePacket::Message(data.to_string())),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(PacketError::UnknownType(other)),
        }
    }

    /// Frames the client needs to send. `Open` is server-only and encodes empty.
    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(_) => String::new(),
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{}", data),
            EnginePacket::Pong(data) => format!("3{}", data),
            EnginePacket::Message(data) => format!("4{}", data),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

/// Socket.IO packet carried inside an Engine.IO message
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        data: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        ack: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        data: Value,
    },
    /// Acks and binary packets; type digit kept for logging
    Unsupported(char),
}

const DEFAULT_NAMESPACE: &str = "/";

impl SocketPacket {
    pub fn connect() -> Self {
        SocketPacket::Connect {
            namespace: DEFAULT_NAMESPACE.to_string(),
            data: None,
        }
    }

    pub fn disconnect() -> Self {
        SocketPacket::Disconnect {
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }

    pub fn decode(message: &str) -> Result<Self, PacketError> {
        let mut chars = message.chars();
        let kind = chars.next().ok_or(PacketError::Empty)?;
        let rest = chars.as_str();

        let (namespace, rest) = split_namespace(rest);
        let (ack, rest) = split_ack(rest);

        match kind {
            '0' => {
                let data = if rest.is_empty() {
                    None
                } else {
                    Some(parse_json(rest, "connect")?)
                };
                Ok(SocketPacket::Connect { namespace, data })
            }
            '1' => Ok(SocketPacket::Disconnect { namespace }),
            '2' => {
                let value = parse_json(rest, "event")?;
                let mut items = match value {
                    Value::Array(items) => items.into_iter(),
                    _ => return Err(PacketError::InvalidPayload("event: expected array".to_string())),
                };
                let name = match items.next() {
                    Some(Value::String(name)) => name,
                    _ => {
                        return Err(PacketError::InvalidPayload(
                            "event: missing event name".to_string(),
                        ))
                    }
                };
                Ok(SocketPacket::Event {
                    namespace,
                    ack,
                    name,
                    args: items.collect(),
                })
            }
            '4' => Ok(SocketPacket::ConnectError {
                namespace,
                data: parse_json(rest, "connect_error").unwrap_or(Value::Null),
            }),
            '3' | '5' | '6' => Ok(SocketPacket::Unsupported(kind)),
            other => Err(PacketError::UnknownType(other)),
        }
    }

    pub fn encode(&self) -> String {
        let (kind, namespace, body) = match self {
            SocketPacket::Connect { namespace, data } => (
                '0',
                namespace,
                data.as_ref().map(Value::to_string).unwrap_or_default(),
            ),
            SocketPacket::Disconnect { namespace } => ('1', namespace, String::new()),
            SocketPacket::Event {
                namespace,
                ack,
                name,
                args,
            } => {
                let mut items = vec![Value::String(name.clone())];
                items.extend(args.iter().cloned());
                let ack = ack.map(|id| id.to_string()).unwrap_or_default();
                ('2', namespace, format!("{}{}", ack, Value::Array(items)))
            }
            SocketPacket::ConnectError { namespace, data } => ('4', namespace, data.to_string()),
            SocketPacket::Unsupported(kind) => return kind.to_string(),
        };

        if namespace == DEFAULT_NAMESPACE {
            format!("{}{}", kind, body)
        } else {
            format!("{}{},{}", kind, namespace, body)
        }
    }

    /// Wrap in an Engine.IO message frame
    pub fn into_frame(self) -> String {
        EnginePacket::Message(self.encode()).encode()
    }
}

fn split_namespace(rest: &str) -> (String, &str) {
    if rest.starts_with('/') {
        match rest.split_once(',') {
            Some((namespace, tail)) => (namespace.to_string(), tail),
            None => (rest.to_string(), ""),
        }
    } else {
        (DEFAULT_NAMESPACE.to_string(), rest)
    }
}

fn split_ack(rest: &str) -> (Option<u64>, &str) {
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return (None, rest);
    }
    let (id, tail) = rest.split_at(digits);
    (id.parse().ok(), tail)
}

fn parse_json(text: &str, what: &str) -> Result<Value, PacketError> {
    serde_json::from_str(text).map_err(|e| PacketError::InvalidPayload(format!("{}: {}", what, e)))
}
