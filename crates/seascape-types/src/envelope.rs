//! # Wire Envelopes
//!
//! The three message shapes exchanged on the bus.
//!
//! | Kind      | Bytes                                                        |
//! |-----------|--------------------------------------------------------------|
//! | Request   | `{"command":<string>,"params":<object>}`                     |
//! | Reply     | `{"status":"ok"\|"fail","message":<string>,"params":<object>}` |
//! | Broadcast | `<topic><Reply JSON>` with no separator                      |
//!
//! Broadcast decoding splits at the first `{` byte. It is a framing rule for
//! PUB/SUB prefix matching, not a JSON document, and it is why topics may
//! never contain `{`.

use crate::errors::EnvelopeError;
use crate::params::Params;
use serde::Serialize;
use serde_json::{Map, Value};

/// Outcome carried by a [`Reply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Ok,
    Fail,
}

impl ReplyStatus {
    /// Interpret a wire status. Only a case-insensitive "ok" is success.
    #[must_use]
    pub fn from_wire(status: &str) -> Self {
        if status.eq_ignore_ascii_case("ok") {
            Self::Ok
        } else {
            Self::Fail
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Fail => "fail",
        }
    }
}

/// A command sent to a remote service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub command: String,
    pub params: Params,
}

/// The answer to a [`Request`], also the payload of a [`Broadcast`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub status: ReplyStatus,
    pub message: String,
    pub params: Params,
}

/// A reply published under a topic string.
#[derive(Debug, Clone, PartialEq)]
pub struct Broadcast {
    topic: String,
    reply: Reply,
}

/// Any of the three wire shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Request(Request),
    Reply(Reply),
    Broadcast(Broadcast),
}

// =============================================================================
// DECODING HELPERS
// =============================================================================

fn parse_object(bytes: &[u8]) -> Result<Map<String, Value>, EnvelopeError> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(EnvelopeError::Parse("expected a JSON object".into())),
        Err(e) => Err(EnvelopeError::Parse(e.to_string())),
    }
}

fn take_string(map: &mut Map<String, Value>, field: &'static str) -> Result<String, EnvelopeError> {
    match map.remove(field) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(EnvelopeError::InvalidField {
            field,
            expected: "a string",
        }),
        None => Err(EnvelopeError::MissingField(field)),
    }
}

fn take_params(map: &mut Map<String, Value>) -> Result<Params, EnvelopeError> {
    match map.remove("params") {
        Some(Value::Object(params)) => Ok(Params::from(params)),
        Some(_) => Err(EnvelopeError::InvalidField {
            field: "params",
            expected: "an object",
        }),
        None => Err(EnvelopeError::MissingField("params")),
    }
}

fn to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, EnvelopeError> {
    serde_json::to_vec(value).map_err(|e| EnvelopeError::Encode(e.to_string()))
}

// =============================================================================
// REQUEST
// =============================================================================

impl Request {
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            params: Params::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key, value);
        self
    }

    #[must_use]
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        to_bytes(self)
    }

    /// # Errors
    ///
    /// `Parse` for malformed JSON, `MissingField` when `command` or
    /// `params` is absent.
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let mut map = parse_object(bytes)?;
        let command = take_string(&mut map, "command")?;
        let params = take_params(&mut map)?;
        Ok(Self { command, params })
    }
}

// =============================================================================
// REPLY
// =============================================================================

impl Reply {
    /// Successful reply carrying `params`.
    #[must_use]
    pub fn ok(params: Params) -> Self {
        Self {
            status: ReplyStatus::Ok,
            message: String::new(),
            params,
        }
    }

    /// Failed reply with a human-readable reason.
    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Fail,
            message: message.into(),
            params: Params::new(),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == ReplyStatus::Ok
    }

    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        to_bytes(self)
    }

    /// # Errors
    ///
    /// `Parse` for malformed JSON, `MissingField` when `status` or `params`
    /// is absent. A missing `message` decodes as empty.
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let mut map = parse_object(bytes)?;
        let status = ReplyStatus::from_wire(&take_string(&mut map, "status")?);
        let message = match take_string(&mut map, "message") {
            Ok(message) => message,
            Err(EnvelopeError::MissingField(_)) => String::new(),
            Err(e) => return Err(e),
        };
        let params = take_params(&mut map)?;
        Ok(Self {
            status,
            message,
            params,
        })
    }
}

// =============================================================================
// BROADCAST
// =============================================================================

impl Broadcast {
    /// # Errors
    ///
    /// Rejects topics containing `{`, which would break decoding.
    pub fn new(topic: impl Into<String>, reply: Reply) -> Result<Self, EnvelopeError> {
        let topic = topic.into();
        if topic.contains('{') {
            return Err(EnvelopeError::InvalidTopic(format!(
                "'{topic}' contains '{{'"
            )));
        }
        Ok(Self { topic, reply })
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn reply(&self) -> &Reply {
        &self.reply
    }

    #[must_use]
    pub fn into_reply(self) -> Reply {
        self.reply
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.reply.is_ok()
    }

    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        let mut bytes = self.topic.as_bytes().to_vec();
        bytes.extend(self.reply.encode()?);
        Ok(bytes)
    }

    /// Split at the first `{` into topic and reply.
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let split = bytes
            .iter()
            .position(|b| *b == b'{')
            .ok_or(EnvelopeError::MissingPayload)?;
        let topic = std::str::from_utf8(&bytes[..split])
            .map_err(|e| EnvelopeError::InvalidTopic(e.to_string()))?
            .to_string();
        let reply = Reply::decode(&bytes[split..])?;
        Ok(Self { topic, reply })
    }
}

// =============================================================================
// ENVELOPE
// =============================================================================

impl Envelope {
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        match self {
            Self::Request(request) => request.encode(),
            Self::Reply(reply) => reply.encode(),
            Self::Broadcast(broadcast) => broadcast.encode(),
        }
    }

    /// Decode without knowing the kind up front.
    ///
    /// Bytes that start with `{` are a request when they carry `command` and
    /// a reply otherwise; anything else is a broadcast. A broadcast with an
    /// empty topic is indistinguishable from a reply and decodes as one.
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        if bytes.first() != Some(&b'{') {
            return Broadcast::decode(bytes).map(Self::Broadcast);
        }
        let map = parse_object(bytes)?;
        if map.contains_key("command") {
            Request::decode(bytes).map(Self::Request)
        } else {
            Reply::decode(bytes).map(Self::Reply)
        }
    }
}

impl From<Request> for Envelope {
    fn from(request: Request) -> Self {
        Self::Request(request)
    }
}

impl From<Reply> for Envelope {
    fn from(reply: Reply) -> Self {
        Self::Reply(reply)
    }
}

impl From<Broadcast> for Envelope {
    fn from(broadcast: Broadcast) -> Self {
        Self::Broadcast(broadcast)
    }
}
