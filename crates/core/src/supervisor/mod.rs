//! Connection supervision: session lifecycle, the normalization and
//! deduplication pipeline, bounded automatic reconnects, and the stats
//! broadcast cadence.
//!
//! One supervisor owns at most one live session. `connect` tears down
//! any previous session first, so callers never juggle session handles;
//! they subscribe to the [`EventBus`] and watch the
//! [`ConnectionState`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use livelink_protocol::{CanonicalEvent, ConnectedEvent, DisconnectedEvent, ErrorEvent, RawEnvelope, StatsSnapshot};
use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

pub mod dedup;
pub mod normalize;
pub mod stats;

pub use dedup::{FingerprintCache, fingerprint};
pub use normalize::{Normalized, normalize};
pub use stats::StatsTracker;

use crate::config::{SETTING_FALLBACK_ENABLED, SettingsStore, SupervisorConfig};
use crate::credentials::{Credential, resolve_credential};
use crate::diagnostics::DiagnosticsRecorder;
use crate::error::{ErrorCategory, LiveError, Result};
use crate::events::EventBus;
use crate::lifecycle::{CleanupHandle, CleanupRegistry};
use crate::resolver::{ResolveOptions, RoomResolver};
use crate::transport::{SessionTarget, Transport, TransportConnector, TransportEvent, TransportMode};

/// Observable lifecycle of the supervised connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
	/// No session has been requested yet.
	Idle,
	/// `connect` is resolving credentials, the room, and the transport.
	Connecting,
	Connected,
	/// The transport dropped and an automatic reconnect is in flight.
	Reconnecting,
	/// Failed on credentials or configuration; automatic recovery is
	/// pointless until the operator intervenes.
	AuthError,
	Disconnected,
}

impl ConnectionState {
	pub fn as_str(self) -> &'static str {
		match self {
			ConnectionState::Idle => "idle",
			ConnectionState::Connecting => "connecting",
			ConnectionState::Connected => "connected",
			ConnectionState::Reconnecting => "reconnecting",
			ConnectionState::AuthError => "authError",
			ConnectionState::Disconnected => "disconnected",
		}
	}
}

/// Per-call options for [`ConnectionSupervisor::connect`].
#[derive(Debug, Default, Clone)]
pub struct ConnectOptions {
	/// Highest-priority credential layer for this connection.
	pub credential_override: Option<String>,
	/// Skip the resolver cache read for this connection.
	pub bypass_cache: bool,
	/// Skip the optional third-party fallback resolution strategy.
	pub disable_optional_fallback: bool,
}

struct ActiveSession {
	handle: String,
	shutdown: oneshot::Sender<()>,
	task: JoinHandle<()>,
	cleanup_handle: CleanupHandle,
}

struct Shared {
	config: SupervisorConfig,
	connector: Arc<dyn TransportConnector>,
	resolver: Option<Arc<RoomResolver>>,
	settings: Arc<dyn SettingsStore>,
	diagnostics: Arc<DiagnosticsRecorder>,
	cleanup: Arc<CleanupRegistry>,
	bus: EventBus,
	state: watch::Sender<ConnectionState>,
	reconnect_attempts: AtomicU32,
	/// Start time inferred for the last connected handle; survives a
	/// manual reconnect to the same handle so elapsed time stays honest.
	persisted_start: Mutex<Option<(String, DateTime<Utc>)>>,
}

impl Shared {
	fn set_state(&self, next: ConnectionState) {
		self.state.send_if_modified(|state| {
			if *state == next {
				return false;
			}
			debug!(target = "livelink.supervisor", from = state.as_str(), to = next.as_str(), "state");
			*state = next;
			true
		});
	}

	fn persisted_start_for(&self, handle: &str) -> Option<DateTime<Utc>> {
		match self.persisted_start.lock().as_ref() {
			Some((h, ts)) if h == handle => Some(*ts),
			_ => None,
		}
	}
}

/// Supervises one live session: connects, pumps the event pipeline, and
/// reconnects within a bounded budget when the transport drops.
pub struct ConnectionSupervisor {
	shared: Arc<Shared>,
	session: tokio::sync::Mutex<Option<ActiveSession>>,
}

impl ConnectionSupervisor {
	/// `resolver` may be `None` only with a handle-addressed connector.
	pub fn new(
		config: SupervisorConfig,
		connector: Arc<dyn TransportConnector>,
		resolver: Option<Arc<RoomResolver>>,
		settings: Arc<dyn SettingsStore>,
		diagnostics: Arc<DiagnosticsRecorder>,
		cleanup: Arc<CleanupRegistry>,
	) -> Self {
		let (state, _) = watch::channel(ConnectionState::Idle);
		Self {
			shared: Arc::new(Shared {
				config,
				connector,
				resolver,
				settings,
				diagnostics,
				cleanup,
				bus: EventBus::new(),
				state,
				reconnect_attempts: AtomicU32::new(0),
				persisted_start: Mutex::new(None),
			}),
			session: tokio::sync::Mutex::new(None),
		}
	}

	/// Connects to `handle`'s live broadcast, replacing any previous
	/// session. The start time inferred for the same handle survives the
	/// replacement; counters restart.
	pub async fn connect(&self, handle: &str, options: ConnectOptions) -> Result<()> {
		let handle = handle.trim().trim_start_matches('@').to_ascii_lowercase();
		if handle.is_empty() {
			return Err(LiveError::Config("broadcaster handle is empty".into()));
		}

		let mut session = self.session.lock().await;
		stop_session(&self.shared, &mut session).await;

		self.shared.set_state(ConnectionState::Connecting);
		self.shared.reconnect_attempts.store(0, Ordering::SeqCst);

		let credential = match resolve_credential(options.credential_override.as_deref(), self.shared.settings.as_ref()) {
			Ok(credential) => credential,
			Err(err) => {
				self.shared
					.diagnostics
					.record_attempt(&handle, false, Some(err.category()), err.to_string());
				self.shared.set_state(ConnectionState::AuthError);
				return Err(err);
			}
		};
		self.shared.diagnostics.set_credential_source(credential.source());
		info!(
			target = "livelink.supervisor",
			handle,
			credential_source = credential.source().name(),
			credential = %credential.masked(),
			"connecting"
		);

		let fallback_disabled = self.shared.settings.get_bool(SETTING_FALLBACK_ENABLED) == Some(false);
		let resolve_options = ResolveOptions {
			bypass_cache: options.bypass_cache,
			credential: Some(credential.clone()),
			disable_optional_fallback: options.disable_optional_fallback || fallback_disabled,
		};

		let (target, transport) = match open_session(&self.shared, &handle, &credential, &resolve_options).await {
			Ok(pair) => pair,
			Err(err) => {
				// Resolution failures were already recorded by the resolver.
				if !matches!(err, LiveError::Resolution(_)) {
					self.shared
						.diagnostics
						.record_attempt(&handle, false, Some(err.category()), err.to_string());
				}
				self.shared.set_state(failure_state(err.category()));
				return Err(err);
			}
		};

		let persisted_start = self.shared.persisted_start_for(&handle);
		self.shared.diagnostics.record_attempt(&handle, true, None, "connected");
		self.shared.set_state(ConnectionState::Connected);
		info!(target = "livelink.supervisor", handle, room_id = target.room_id(), "connected");
		self.shared.bus.publish(CanonicalEvent::Connected(ConnectedEvent {
			handle: handle.clone(),
			room_id: target.room_id().map(str::to_string),
			reconnect: false,
			timestamp: Utc::now(),
		}));

		let (shutdown_tx, shutdown_rx) = oneshot::channel();
		let (cleanup_tx, cleanup_rx) = oneshot::channel();
		let shared = Arc::clone(&self.shared);
		let session_handle = handle.clone();
		let task = tokio::spawn(async move {
			run_session(Arc::clone(&shared), session_handle, credential, resolve_options, transport, persisted_start, shutdown_rx).await;
			// The registry should only list sessions that are still alive.
			if let Ok(hook) = cleanup_rx.await {
				shared.cleanup.deregister(hook);
			}
		});
		let abort = task.abort_handle();
		let cleanup_handle = self.shared.cleanup.register(move || abort.abort());
		let _ = cleanup_tx.send(cleanup_handle);
		*session = Some(ActiveSession {
			handle,
			shutdown: shutdown_tx,
			task,
			cleanup_handle,
		});
		Ok(())
	}

	/// Tears down the session and forgets the persisted start time.
	/// Idempotent.
	pub async fn disconnect(&self) {
		let mut session = self.session.lock().await;
		stop_session(&self.shared, &mut session).await;
		self.shared.persisted_start.lock().take();
		self.shared.reconnect_attempts.store(0, Ordering::SeqCst);
		self.shared.set_state(ConnectionState::Disconnected);
	}

	pub fn state(&self) -> ConnectionState {
		*self.shared.state.borrow()
	}

	/// Watch channel mirroring every state transition.
	pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
		self.shared.state.subscribe()
	}

	/// Cloneable handle to the event and stats channels.
	pub fn bus(&self) -> EventBus {
		self.shared.bus.clone()
	}

	pub fn subscribe(&self) -> broadcast::Receiver<CanonicalEvent> {
		self.shared.bus.subscribe()
	}

	pub fn subscribe_stats(&self) -> broadcast::Receiver<StatsSnapshot> {
		self.shared.bus.subscribe_stats()
	}

	/// Automatic reconnects consumed since the last stable period.
	pub fn reconnect_attempts(&self) -> u32 {
		self.shared.reconnect_attempts.load(Ordering::SeqCst)
	}

	pub fn diagnostics(&self) -> &Arc<DiagnosticsRecorder> {
		&self.shared.diagnostics
	}
}

async fn stop_session(shared: &Shared, session: &mut Option<ActiveSession>) {
	if let Some(active) = session.take() {
		shared.cleanup.deregister(active.cleanup_handle);
		let _ = active.shutdown.send(());
		if active.task.await.is_err() {
			warn!(target = "livelink.supervisor", handle = active.handle, "session task aborted");
		} else {
			debug!(target = "livelink.supervisor", handle = active.handle, "session stopped");
		}
	}
}

/// Builds the session target (resolving the room id when the connector
/// needs one) and opens the transport.
async fn open_session(
	shared: &Shared,
	handle: &str,
	credential: &Credential,
	resolve_options: &ResolveOptions,
) -> Result<(SessionTarget, Box<dyn Transport>)> {
	let target = match shared.connector.mode() {
		TransportMode::HandleAddressed => SessionTarget::Handle(handle.to_string()),
		TransportMode::RoomAddressed => {
			let resolver = shared
				.resolver
				.as_ref()
				.ok_or_else(|| LiveError::Config("room-addressed transport configured without a resolver".into()))?;
			let room_id = resolver.resolve(handle, resolve_options.clone()).await?;
			SessionTarget::Room {
				handle: handle.to_string(),
				room_id,
			}
		}
	};
	let transport = shared.connector.open(&target, credential).await?;
	Ok((target, transport))
}

async fn run_session(
	shared: Arc<Shared>,
	handle: String,
	credential: Credential,
	resolve_options: ResolveOptions,
	mut transport: Box<dyn Transport>,
	persisted_start: Option<DateTime<Utc>>,
	mut shutdown_rx: oneshot::Receiver<()>,
) {
	let mut dedup = FingerprintCache::new(shared.config.fingerprint_capacity, shared.config.fingerprint_ttl);
	let mut tracker = StatsTracker::new(shared.config.start_time_floor, persisted_start);
	tracker.anchor_wall_clock(Utc::now());
	persist_start(&shared, &handle, &tracker);

	let mut stats_tick = tokio::time::interval(shared.config.stats_interval);
	stats_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

	// Armed after a reconnect; firing refunds the whole budget.
	let stable = tokio::time::sleep(shared.config.stable_after);
	tokio::pin!(stable);
	let mut stable_armed = false;

	loop {
		tokio::select! {
			_ = &mut shutdown_rx => {
				transport.close().await;
				shared.bus.publish(disconnected(&handle, Some("disconnect requested".into()), false));
				break;
			}
			_ = stats_tick.tick() => {
				shared.bus.publish_stats(tracker.snapshot(Utc::now()));
			}
			_ = &mut stable, if stable_armed => {
				stable_armed = false;
				shared.reconnect_attempts.store(0, Ordering::SeqCst);
				debug!(target = "livelink.supervisor", handle, "connection stable; reconnect budget reset");
			}
			event = transport.next_event() => match event {
				Some(TransportEvent::Message(envelope)) => {
					if handle_frame(&shared, &handle, envelope, &mut dedup, &mut tracker) {
						shared.bus.publish(disconnected(&handle, Some("stream ended".into()), false));
						shared.set_state(ConnectionState::Disconnected);
						break;
					}
				}
				closed => {
					let reason = match closed {
						Some(TransportEvent::Closed { reason }) => reason,
						_ => None,
					};
					match handle_close(&shared, &handle, &credential, &resolve_options, reason, &mut shutdown_rx).await {
						Some(new_transport) => {
							// The fingerprint cache survives the reconnect:
							// re-delivered events around the drop are exactly
							// what it exists to suppress.
							transport = new_transport;
							stable_armed = true;
							stable.as_mut().reset(tokio::time::Instant::now() + shared.config.stable_after);
						}
						None => break,
					}
				}
			}
		}
	}
}

/// Pumps one inbound frame through normalize → dedup → stats → publish.
/// Returns `true` when the broadcaster ended the stream.
fn handle_frame(
	shared: &Shared,
	handle: &str,
	envelope: RawEnvelope,
	dedup: &mut FingerprintCache,
	tracker: &mut StatsTracker,
) -> bool {
	match normalize(envelope, Utc::now(), shared.config.start_time_floor) {
		Normalized::Event(event) => {
			if let Some(key) = fingerprint(&event) {
				if !dedup.observe(&key, Instant::now()) {
					trace!(target = "livelink.supervisor", handle, kind = event.event_type(), "duplicate suppressed");
					return false;
				}
			}
			let corrected = tracker.apply(&event);
			shared.bus.publish(event);
			if corrected {
				// Out-of-cadence snapshot so subscribers see the corrected
				// start time without waiting for the next tick.
				shared.bus.publish_stats(tracker.snapshot(Utc::now()));
			}
			persist_start(shared, handle, tracker);
			false
		}
		Normalized::RoomInfo(info) => {
			if tracker.observe_platform_start(info.create_time, Utc::now()) {
				shared.bus.publish_stats(tracker.snapshot(Utc::now()));
				persist_start(shared, handle, tracker);
			}
			false
		}
		Normalized::StreamEnd => {
			info!(target = "livelink.supervisor", handle, "broadcast ended upstream");
			true
		}
		Normalized::Ignored(kind) => {
			trace!(target = "livelink.supervisor", handle, kind, "unhandled message kind");
			false
		}
		Normalized::Invalid { kind, error } => {
			warn!(target = "livelink.supervisor", handle, kind, error, "malformed message body dropped");
			false
		}
	}
}

/// Classifies an unsolicited close and drives the reconnect budget.
/// Returns the replacement transport, or `None` when the session ends.
async fn handle_close(
	shared: &Arc<Shared>,
	handle: &str,
	credential: &Credential,
	resolve_options: &ResolveOptions,
	reason: Option<String>,
	shutdown_rx: &mut oneshot::Receiver<()>,
) -> Option<Box<dyn Transport>> {
	let message = reason.clone().unwrap_or_else(|| "transport closed without a reason".to_string());
	let category = reason.as_deref().map(ErrorCategory::from_message).unwrap_or(ErrorCategory::Unknown);
	warn!(
		target = "livelink.supervisor",
		handle,
		category = category.as_str(),
		message = %message,
		"transport closed"
	);
	shared.diagnostics.record_attempt(handle, false, Some(category), message.clone());

	if !category.retryable() {
		shared.bus.publish(error_event(category, message.clone()));
		shared.bus.publish(disconnected(handle, Some(message), false));
		shared.set_state(failure_state(category));
		return None;
	}

	if shared.reconnect_attempts.load(Ordering::SeqCst) >= shared.config.max_auto_reconnects {
		budget_exhausted(shared, handle, category);
		return None;
	}

	shared.set_state(ConnectionState::Reconnecting);
	shared.bus.publish(disconnected(handle, Some(message), true));

	let reconnected = tokio::select! {
		_ = &mut *shutdown_rx => {
			// A deliberate disconnect landed during the wait; subscribers
			// must not be left on a `will_reconnect: true` note.
			shared.bus.publish(disconnected(handle, Some("disconnect requested".into()), false));
			return None;
		}
		result = try_reconnect(shared, handle, credential, resolve_options) => result,
	};
	match reconnected {
		Ok(Some((target, transport))) => {
			shared.diagnostics.record_attempt(handle, true, None, "reconnected");
			shared.set_state(ConnectionState::Connected);
			info!(
				target = "livelink.supervisor",
				handle,
				attempt = shared.reconnect_attempts.load(Ordering::SeqCst),
				"reconnected"
			);
			shared.bus.publish(CanonicalEvent::Connected(ConnectedEvent {
				handle: handle.to_string(),
				room_id: target.room_id().map(str::to_string),
				reconnect: true,
				timestamp: Utc::now(),
			}));
			Some(transport)
		}
		Ok(None) => {
			budget_exhausted(shared, handle, category);
			None
		}
		Err(err) => {
			let category = err.category();
			shared.diagnostics.record_attempt(handle, false, Some(category), err.to_string());
			shared.bus.publish(error_event(category, err.to_string()));
			shared.bus.publish(disconnected(handle, Some(err.to_string()), false));
			shared.set_state(failure_state(category));
			None
		}
	}
}

/// Retries the open until it succeeds, fails terminally, or the budget
/// runs out (`Ok(None)`).
async fn try_reconnect(
	shared: &Arc<Shared>,
	handle: &str,
	credential: &Credential,
	resolve_options: &ResolveOptions,
) -> Result<Option<(SessionTarget, Box<dyn Transport>)>> {
	loop {
		let used = shared.reconnect_attempts.load(Ordering::SeqCst);
		if used >= shared.config.max_auto_reconnects {
			return Ok(None);
		}
		shared.reconnect_attempts.store(used + 1, Ordering::SeqCst);
		info!(
			target = "livelink.supervisor",
			handle,
			attempt = used + 1,
			max = shared.config.max_auto_reconnects,
			delay_secs = shared.config.reconnect_delay.as_secs(),
			"reconnect scheduled"
		);
		tokio::time::sleep(shared.config.reconnect_delay).await;
		match open_session(shared, handle, credential, resolve_options).await {
			Ok(pair) => return Ok(Some(pair)),
			Err(err) if err.category().retryable() => {
				warn!(
					target = "livelink.supervisor",
					handle,
					category = err.category().as_str(),
					error = %err,
					"reconnect attempt failed"
				);
				shared.diagnostics.record_attempt(handle, false, Some(err.category()), err.to_string());
			}
			Err(err) => return Err(err),
		}
	}
}

fn budget_exhausted(shared: &Shared, handle: &str, category: ErrorCategory) {
	warn!(
		target = "livelink.supervisor",
		handle,
		max = shared.config.max_auto_reconnects,
		"reconnect budget exhausted"
	);
	shared.bus.publish(error_event(
		category,
		format!(
			"automatic reconnect budget ({}) exhausted; reconnect manually",
			shared.config.max_auto_reconnects
		),
	));
	shared.bus.publish(disconnected(handle, Some("reconnect budget exhausted".into()), false));
	shared.set_state(ConnectionState::Disconnected);
}

fn persist_start(shared: &Shared, handle: &str, tracker: &StatsTracker) {
	if let Some(start) = tracker.start_time() {
		*shared.persisted_start.lock() = Some((handle.to_string(), start));
	}
}

/// Credential and configuration failures park the supervisor in
/// `AuthError`; everything else ends in `Disconnected`.
fn failure_state(category: ErrorCategory) -> ConnectionState {
	match category {
		ErrorCategory::AuthInvalid | ErrorCategory::ConfigInvalid => ConnectionState::AuthError,
		_ => ConnectionState::Disconnected,
	}
}

fn disconnected(handle: &str, reason: Option<String>, will_reconnect: bool) -> CanonicalEvent {
	CanonicalEvent::Disconnected(DisconnectedEvent {
		handle: handle.to_string(),
		reason,
		will_reconnect,
		timestamp: Utc::now(),
	})
}

fn error_event(category: ErrorCategory, message: impl Into<String>) -> CanonicalEvent {
	CanonicalEvent::Error(ErrorEvent {
		category: category.as_str().to_string(),
		message: message.into(),
		remedy: category.remedy().to_string(),
		retryable: category.retryable(),
		timestamp: Utc::now(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::InMemorySettings;
	use crate::transport::FakeHub;

	fn supervisor_with(hub: &FakeHub, settings: InMemorySettings) -> ConnectionSupervisor {
		ConnectionSupervisor::new(
			SupervisorConfig::default(),
			hub.connector(),
			None,
			Arc::new(settings),
			Arc::new(DiagnosticsRecorder::new()),
			Arc::new(CleanupRegistry::new()),
		)
	}

	#[test]
	fn failure_states_follow_the_taxonomy() {
		assert_eq!(failure_state(ErrorCategory::AuthInvalid), ConnectionState::AuthError);
		assert_eq!(failure_state(ErrorCategory::ConfigInvalid), ConnectionState::AuthError);
		assert_eq!(failure_state(ErrorCategory::NotLive), ConnectionState::Disconnected);
		assert_eq!(failure_state(ErrorCategory::NetworkError), ConnectionState::Disconnected);
	}

	#[tokio::test]
	async fn connect_without_any_credential_is_a_config_error() {
		let hub = FakeHub::new(TransportMode::HandleAddressed);
		let supervisor = supervisor_with(&hub, InMemorySettings::new());
		let err = supervisor.connect("alice", ConnectOptions::default()).await.unwrap_err();
		assert!(matches!(err, LiveError::Config(_)));
		assert_eq!(supervisor.state(), ConnectionState::AuthError);
		assert_eq!(hub.open_count(), 0);
	}

	#[tokio::test]
	async fn empty_handle_is_rejected_before_any_work() {
		let hub = FakeHub::new(TransportMode::HandleAddressed);
		let supervisor = supervisor_with(&hub, InMemorySettings::new());
		let err = supervisor.connect("  @ ", ConnectOptions::default()).await.unwrap_err();
		assert!(matches!(err, LiveError::Config(_)));
		assert_eq!(supervisor.state(), ConnectionState::Idle);
	}
}
