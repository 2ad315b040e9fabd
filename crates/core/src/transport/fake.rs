//! In-memory transport for unit testing the supervisor without a network.
//!
//! A [`FakeHub`] hands out a [`TransportConnector`]; every `open` call
//! produces a paired [`FakeController`] the test uses to inject frames
//! and closes, and to inspect what the engine asked for.
//!
//! # Example
//!
//! ```ignore
//! let hub = FakeHub::new(TransportMode::HandleAddressed);
//! supervisor.connect("alice", ConnectOptions::default()).await?;
//! let controller = hub.controller(0).await;
//! controller.inject_json(r#"{"type":"chat","comment":"hi"}"#);
//! controller.close(Some("server going away"));
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use livelink_protocol::RawEnvelope;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};

use super::{SessionTarget, Transport, TransportConnector, TransportEvent, TransportMode};
use crate::credentials::Credential;
use crate::error::{LiveError, Result};

#[derive(Default)]
struct HubInner {
	controllers: Vec<FakeController>,
	scripted_failures: Vec<LiveError>,
}

/// Shared factory for fake sessions.
pub struct FakeHub {
	mode: TransportMode,
	inner: Arc<Mutex<HubInner>>,
	opened: Arc<Notify>,
}

impl FakeHub {
	pub fn new(mode: TransportMode) -> Self {
		Self {
			mode,
			inner: Arc::new(Mutex::new(HubInner::default())),
			opened: Arc::new(Notify::new()),
		}
	}

	/// A connector handle for the supervisor under test.
	pub fn connector(&self) -> Arc<dyn TransportConnector> {
		Arc::new(FakeConnector {
			mode: self.mode,
			inner: Arc::clone(&self.inner),
			opened: Arc::clone(&self.opened),
		})
	}

	/// Scripts the next `open` call to fail with `error`.
	pub fn fail_next_open(&self, error: LiveError) {
		self.inner.lock().scripted_failures.push(error);
	}

	/// Number of sessions opened so far.
	pub fn open_count(&self) -> usize {
		self.inner.lock().controllers.len()
	}

	/// Waits for the `index`-th session (0-based) to be opened and
	/// returns its controller.
	pub async fn controller(&self, index: usize) -> FakeController {
		loop {
			if let Some(controller) = self.inner.lock().controllers.get(index).cloned() {
				return controller;
			}
			self.opened.notified().await;
		}
	}
}

struct FakeConnector {
	mode: TransportMode,
	inner: Arc<Mutex<HubInner>>,
	opened: Arc<Notify>,
}

#[async_trait]
impl TransportConnector for FakeConnector {
	fn mode(&self) -> TransportMode {
		self.mode
	}

	async fn open(&self, target: &SessionTarget, credential: &Credential) -> Result<Box<dyn Transport>> {
		let mut inner = self.inner.lock();
		if !inner.scripted_failures.is_empty() {
			return Err(inner.scripted_failures.remove(0));
		}
		let (tx, rx) = mpsc::unbounded_channel();
		let controller = FakeController {
			tx,
			target: target.clone(),
			credential_source: credential.source().name(),
		};
		inner.controllers.push(controller);
		drop(inner);
		self.opened.notify_waiters();
		Ok(Box::new(FakeTransport { rx }))
	}
}

/// Controller for one opened fake session.
#[derive(Clone)]
pub struct FakeController {
	tx: mpsc::UnboundedSender<TransportEvent>,
	target: SessionTarget,
	credential_source: &'static str,
}

impl FakeController {
	/// The target the engine opened this session with.
	pub fn target(&self) -> &SessionTarget {
		&self.target
	}

	/// Credential source name the engine authenticated with.
	pub fn credential_source(&self) -> &'static str {
		self.credential_source
	}

	/// Injects a raw JSON frame, as if received from the platform.
	///
	/// # Panics
	///
	/// Panics when `json` is not a valid envelope; fake frames are
	/// test-authored and should never be malformed silently.
	pub fn inject_json(&self, json: &str) {
		let envelope = RawEnvelope::from_json(json).expect("fake frame must be a valid envelope");
		let _ = self.tx.send(TransportEvent::Message(envelope));
	}

	/// Simulates an unsolicited transport close.
	pub fn close(&self, reason: Option<&str>) {
		let _ = self.tx.send(TransportEvent::Closed {
			reason: reason.map(str::to_string),
		});
	}
}

struct FakeTransport {
	rx: mpsc::UnboundedReceiver<TransportEvent>,
}

#[async_trait]
impl Transport for FakeTransport {
	async fn next_event(&mut self) -> Option<TransportEvent> {
		self.rx.recv().await
	}

	async fn close(&mut self) {
		self.rx.close();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::{InMemorySettings, SETTING_API_CREDENTIAL};
	use crate::credentials::resolve_credential;
	use crate::error::ErrorCategory;

	fn credential() -> Credential {
		let settings = InMemorySettings::new();
		settings.set(SETTING_API_CREDENTIAL, "fake-hub-secret");
		resolve_credential(None, &settings).unwrap()
	}

	#[tokio::test]
	async fn injected_frames_arrive_in_order() {
		let hub = FakeHub::new(TransportMode::HandleAddressed);
		let connector = hub.connector();
		let mut transport = connector
			.open(&SessionTarget::Handle("alice".into()), &credential())
			.await
			.unwrap();
		let controller = hub.controller(0).await;
		controller.inject_json(r#"{"type":"chat","comment":"one","uniqueId":"u"}"#);
		controller.inject_json(r#"{"type":"chat","comment":"two","uniqueId":"u"}"#);
		controller.close(Some("bye"));

		match transport.next_event().await {
			Some(TransportEvent::Message(env)) => assert_eq!(env.kind, "chat"),
			other => panic!("unexpected: {other:?}"),
		}
		let _ = transport.next_event().await;
		match transport.next_event().await {
			Some(TransportEvent::Closed { reason }) => assert_eq!(reason.as_deref(), Some("bye")),
			other => panic!("unexpected: {other:?}"),
		}
	}

	#[tokio::test]
	async fn scripted_failure_surfaces_on_open() {
		let hub = FakeHub::new(TransportMode::HandleAddressed);
		hub.fail_next_open(LiveError::connection(ErrorCategory::RateLimited, "429"));
		let connector = hub.connector();
		let err = connector
			.open(&SessionTarget::Handle("alice".into()), &credential())
			.await
			.unwrap_err();
		assert_eq!(err.category(), ErrorCategory::RateLimited);
		assert_eq!(hub.open_count(), 0);
	}
}
