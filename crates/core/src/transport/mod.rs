//! Transport seam between the supervisor and the upstream platform.
//!
//! A [`TransportConnector`] opens one live session and yields a
//! [`Transport`] — a stream of raw envelopes ending in a close notice.
//! The production implementation is WebSocket-based ([`ws`]); tests use
//! the in-memory [`fake`] transport with an injection controller.

use async_trait::async_trait;
use livelink_protocol::RawEnvelope;

use crate::credentials::Credential;
use crate::error::Result;

pub mod fake;
pub mod ws;

pub use fake::{FakeController, FakeHub};
pub use ws::WsConnector;

/// How session endpoints are addressed by the connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
	/// The endpoint accepts the broadcaster handle directly; no explicit
	/// room id is needed and the resolver stays out of the path.
	HandleAddressed,
	/// The endpoint requires an explicit room id, resolved up front.
	RoomAddressed,
}

/// Target of one session open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTarget {
	Handle(String),
	Room { handle: String, room_id: String },
}

impl SessionTarget {
	pub fn handle(&self) -> &str {
		match self {
			SessionTarget::Handle(handle) => handle,
			SessionTarget::Room { handle, .. } => handle,
		}
	}

	pub fn room_id(&self) -> Option<&str> {
		match self {
			SessionTarget::Handle(_) => None,
			SessionTarget::Room { room_id, .. } => Some(room_id),
		}
	}
}

/// One inbound occurrence on an open transport.
#[derive(Debug)]
pub enum TransportEvent {
	/// A parsed platform frame.
	Message(RawEnvelope),
	/// The transport closed; `reason` is the upstream's close text when
	/// one was provided. Classification happens in the supervisor.
	Closed { reason: Option<String> },
}

/// An open live session.
#[async_trait]
pub trait Transport: Send {
	/// Next inbound event; `None` once the stream is fully drained
	/// (always after a `Closed` event).
	async fn next_event(&mut self) -> Option<TransportEvent>;

	/// Closes the session. Idempotent.
	async fn close(&mut self);
}

impl std::fmt::Debug for dyn Transport {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("Transport")
	}
}

/// Opens live sessions against the upstream platform.
#[async_trait]
pub trait TransportConnector: Send + Sync {
	/// Addressing mode; decides whether the supervisor resolves a room id.
	fn mode(&self) -> TransportMode;

	/// Opens a session. Failures must be classified
	/// ([`LiveError::Connection`](crate::error::LiveError)).
	async fn open(&self, target: &SessionTarget, credential: &Credential) -> Result<Box<dyn Transport>>;
}
