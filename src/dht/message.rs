use super::error::DhtError;
use super::node::{decode_compact_addr, encode_compact_addr, NodeId};
use crate::bencode::{decode, encode, Dict, Value};
use bytes::Bytes;
use std::net::SocketAddr;

/// The raw `t` field of a KRPC message.
pub type TransactionId = Bytes;

/// The `y`-discriminated payload of a KRPC message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KrpcBody {
    /// `y = "q"`: method name `q` and argument dictionary `a`.
    Query { method: String, args: Dict },
    /// `y = "r"`: the return values `r`.
    Response { values: Dict },
    /// `y = "e"`: the `[code, message]` pair `e`.
    Error { code: i64, message: String },
}

/// A decoded KRPC message.
///
/// # Examples
///
/// ```
/// use bitpaito::bencode::Dict;
/// use bitpaito::dht::{KrpcBody, KrpcMessage};
/// use bytes::Bytes;
///
/// let msg = KrpcMessage::query(Bytes::from_static(b"\x07"), "ping", Dict::new());
/// let parsed = KrpcMessage::parse(&msg.encode()).unwrap();
///
/// assert_eq!(parsed.transaction_id.as_ref(), b"\x07");
/// assert!(matches!(parsed.body, KrpcBody::Query { ref method, .. } if method == "ping"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KrpcMessage {
    pub transaction_id: TransactionId,
    /// Client version tag `v`.
    pub version: Option<Bytes>,
    /// Observed address of the message's recipient, as reported by the sender.
    pub ip: Option<SocketAddr>,
    pub body: KrpcBody,
}

impl KrpcMessage {
    pub fn query(transaction_id: TransactionId, method: &str, args: Dict) -> Self {
        Self {
            transaction_id,
            version: None,
            ip: None,
            body: KrpcBody::Query {
                method: method.to_string(),
                args,
            },
        }
    }

    pub fn response(transaction_id: TransactionId, values: Dict) -> Self {
        Self {
            transaction_id,
            version: None,
            ip: None,
            body: KrpcBody::Response { values },
        }
    }

    pub fn error(transaction_id: TransactionId, code: i64, message: &str) -> Self {
        Self {
            transaction_id,
            version: None,
            ip: None,
            body: KrpcBody::Error {
                code,
                message: message.to_string(),
            },
        }
    }

    pub fn with_version(mut self, version: Bytes) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_ip(mut self, ip: SocketAddr) -> Self {
        self.ip = Some(ip);
        self
    }

    /// `"query"`, `"response"` or `"error"`.
    pub fn kind(&self) -> &'static str {
        match self.body {
            KrpcBody::Query { .. } => "query",
            KrpcBody::Response { .. } => "response",
            KrpcBody::Error { .. } => "error",
        }
    }

    /// The `id` of the sending node, taken from `a` for queries and `r` for responses.
    pub fn sender_id(&self) -> Option<NodeId> {
        let dict = match &self.body {
            KrpcBody::Query { args, .. } => args,
            KrpcBody::Response { values } => values,
            KrpcBody::Error { .. } => return None,
        };

        dict.get(b"id")
            .and_then(Value::as_bytes)
            .and_then(|b| NodeId::from_bytes(b).ok())
    }

    pub fn parse(data: &[u8]) -> Result<Self, DhtError> {
        Self::from_value(decode(data)?)
    }

    pub fn from_value(value: Value) -> Result<Self, DhtError> {
        let mut dict = value
            .into_dict()
            .ok_or_else(|| DhtError::InvalidMessage("expected dict".into()))?;

        let transaction_id = dict
            .get(b"t")
            .and_then(Value::as_bytes)
            .cloned()
            .ok_or_else(|| DhtError::InvalidMessage("missing transaction id".into()))?;

        let msg_type = dict
            .get(b"y")
            .and_then(Value::as_str)
            .ok_or_else(|| DhtError::InvalidMessage("missing message type".into()))?
            .to_string();

        let version = dict.get(b"v").and_then(Value::as_bytes).cloned();
        let ip = dict
            .get(b"ip")
            .and_then(Value::as_bytes)
            .and_then(|b| decode_compact_addr(b));

        let body = match msg_type.as_str() {
            "q" => {
                let method = dict
                    .get(b"q")
                    .and_then(Value::as_str)
                    .ok_or_else(|| DhtError::InvalidMessage("missing query name".into()))?
                    .to_string();

                let args = match dict.remove(b"a") {
                    None => Dict::new(),
                    Some(args) => args.into_dict().ok_or_else(|| {
                        DhtError::InvalidMessage("query args not a dict".into())
                    })?,
                };

                KrpcBody::Query { method, args }
            }
            "r" => {
                let values = dict
                    .remove(b"r")
                    .and_then(Value::into_dict)
                    .ok_or_else(|| DhtError::InvalidMessage("missing response dict".into()))?;

                KrpcBody::Response { values }
            }
            "e" => {
                let error = dict
                    .get(b"e")
                    .and_then(Value::as_list)
                    .ok_or_else(|| DhtError::InvalidMessage("missing error list".into()))?;

                let code = error.first().and_then(Value::as_integer).unwrap_or(0);
                let message = error
                    .get(1)
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string();

                KrpcBody::Error { code, message }
            }
            other => {
                return Err(DhtError::InvalidMessage(format!(
                    "unknown message type: {}",
                    other
                )))
            }
        };

        Ok(Self {
            transaction_id,
            version,
            ip,
            body,
        })
    }

    /// Builds the bencode dictionary for this message with its keys in sorted order.
    pub fn to_value(&self) -> Value {
        let mut dict = Dict::new();

        match &self.body {
            KrpcBody::Query { args, .. } => {
                dict.insert("a", args.clone());
            }
            KrpcBody::Error { code, message } => {
                dict.insert("e", vec![Value::from(*code), Value::string(message)]);
            }
            KrpcBody::Response { .. } => {}
        }

        if let Some(ip) = &self.ip {
            dict.insert("ip", encode_compact_addr(ip));
        }

        match &self.body {
            KrpcBody::Query { method, .. } => {
                dict.insert("q", method.as_str());
            }
            KrpcBody::Response { values } => {
                dict.insert("r", values.clone());
            }
            KrpcBody::Error { .. } => {}
        }

        dict.insert("t", self.transaction_id.clone());

        if let Some(version) = &self.version {
            dict.insert("v", version.clone());
        }

        let kind = match self.body {
            KrpcBody::Query { .. } => "q",
            KrpcBody::Response { .. } => "r",
            KrpcBody::Error { .. } => "e",
        };
        dict.insert("y", kind);

        Value::Dict(dict)
    }

    pub fn encode(&self) -> Vec<u8> {
        encode(&self.to_value())
    }
}
