//! WebSocket transport over tokio-tungstenite.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use livelink_protocol::RawEnvelope;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};
use url::Url;

use super::{SessionTarget, Transport, TransportConnector, TransportEvent, TransportMode};
use crate::credentials::Credential;
use crate::error::{ErrorCategory, LiveError, Result};

/// Connector building `wss://` session URLs against a gateway host.
#[derive(Debug, Clone)]
pub struct WsConnector {
	endpoint: Url,
	mode: TransportMode,
}

impl WsConnector {
	/// `endpoint` is the gateway base, e.g. `wss://gw.example.com/live`.
	pub fn new(endpoint: &str, mode: TransportMode) -> Result<Self> {
		let endpoint = Url::parse(endpoint).map_err(|e| LiveError::Config(format!("invalid gateway endpoint '{endpoint}': {e}")))?;
		Ok(Self { endpoint, mode })
	}

	fn session_url(&self, target: &SessionTarget, credential: &Credential) -> Url {
		let mut url = self.endpoint.clone();
		{
			let mut query = url.query_pairs_mut();
			query.append_pair("uniqueId", target.handle());
			if let Some(room_id) = target.room_id() {
				query.append_pair("roomId", room_id);
			}
			query.append_pair("apiKey", credential.expose());
		}
		url
	}
}

#[async_trait]
impl TransportConnector for WsConnector {
	fn mode(&self) -> TransportMode {
		self.mode
	}

	async fn open(&self, target: &SessionTarget, credential: &Credential) -> Result<Box<dyn Transport>> {
		let url = self.session_url(target, credential);
		debug!(
			target = "livelink.transport",
			handle = target.handle(),
			room_id = target.room_id(),
			"opening websocket session"
		);
		let (stream, response) = connect_async(url.as_str()).await.map_err(|e| classify_handshake(&e))?;
		debug!(target = "livelink.transport", status = %response.status(), "websocket session open");
		Ok(Box::new(WsTransport { stream: Some(stream) }))
	}
}

fn classify_handshake(err: &tokio_tungstenite::tungstenite::Error) -> LiveError {
	use tokio_tungstenite::tungstenite::Error;
	let category = match err {
		Error::Http(response) => ErrorCategory::from_status(response.status().as_u16()),
		Error::Io(_) | Error::Tls(_) => ErrorCategory::NetworkError,
		Error::Url(_) => ErrorCategory::ConfigInvalid,
		_ => ErrorCategory::from_message(&err.to_string()),
	};
	LiveError::connection(category, format!("websocket handshake failed: {err}"))
}

/// An open WebSocket session.
pub struct WsTransport {
	stream: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
}

#[async_trait]
impl Transport for WsTransport {
	async fn next_event(&mut self) -> Option<TransportEvent> {
		let stream = self.stream.as_mut()?;
		loop {
			match stream.next().await {
				Some(Ok(Message::Text(text))) => match RawEnvelope::from_json(&text) {
					Ok(envelope) => return Some(TransportEvent::Message(envelope)),
					Err(e) => {
						warn!(target = "livelink.transport", error = %e, "unparseable frame dropped");
					}
				},
				Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
				Some(Ok(Message::Binary(_) | Message::Frame(_))) => {
					// The platform's text feed is all we consume.
				}
				Some(Ok(Message::Close(frame))) => {
					let reason = frame.map(|f| f.reason.to_string()).filter(|r| !r.is_empty());
					self.stream = None;
					return Some(TransportEvent::Closed { reason });
				}
				Some(Err(e)) => {
					self.stream = None;
					return Some(TransportEvent::Closed {
						reason: Some(e.to_string()),
					});
				}
				None => {
					self.stream = None;
					return Some(TransportEvent::Closed { reason: None });
				}
			}
		}
	}

	async fn close(&mut self) {
		if let Some(mut stream) = self.stream.take() {
			let _ = stream.send(Message::Close(None)).await;
			let _ = stream.flush().await;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::{InMemorySettings, SETTING_API_CREDENTIAL};
	use crate::credentials::resolve_credential;

	fn credential() -> Credential {
		let settings = InMemorySettings::new();
		settings.set(SETTING_API_CREDENTIAL, "test-secret-key");
		resolve_credential(None, &settings).unwrap()
	}

	#[test]
	fn session_url_carries_handle_room_and_key() {
		let connector = WsConnector::new("wss://gw.example.com/live", TransportMode::RoomAddressed).unwrap();
		let target = SessionTarget::Room {
			handle: "alice".into(),
			room_id: "7129".into(),
		};
		let url = connector.session_url(&target, &credential());
		let query = url.query().unwrap();
		assert!(query.contains("uniqueId=alice"));
		assert!(query.contains("roomId=7129"));
		assert!(query.contains("apiKey=test-secret-key"));
	}

	#[test]
	fn handle_addressed_url_has_no_room_id() {
		let connector = WsConnector::new("wss://gw.example.com/live", TransportMode::HandleAddressed).unwrap();
		let url = connector.session_url(&SessionTarget::Handle("bob".into()), &credential());
		assert!(!url.query().unwrap().contains("roomId"));
	}

	#[test]
	fn bad_endpoint_is_a_config_error() {
		let err = WsConnector::new("not a url", TransportMode::HandleAddressed).unwrap_err();
		assert!(matches!(err, LiveError::Config(_)));
	}
}
