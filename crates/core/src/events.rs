//! Publish/subscribe fan-out for canonical events and stats snapshots.
//!
//! Two broadcast channels with explicit subscriber lifecycle: events are
//! delivered in normalization order, stats on the supervisor's cadence.
//! Slow subscribers lag and observe `RecvError::Lagged` rather than
//! back-pressuring the session loop.

use livelink_protocol::{CanonicalEvent, StatsSnapshot};
use tokio::sync::broadcast;
use tracing::trace;

/// Default per-channel buffer before slow subscribers start lagging.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Cloneable handle to the engine's two broadcast channels.
#[derive(Clone)]
pub struct EventBus {
	events: broadcast::Sender<CanonicalEvent>,
	stats: broadcast::Sender<StatsSnapshot>,
}

impl EventBus {
	pub fn new() -> Self {
		Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
	}

	pub fn with_capacity(capacity: usize) -> Self {
		let (events, _) = broadcast::channel(capacity.max(1));
		let (stats, _) = broadcast::channel(capacity.max(1));
		Self { events, stats }
	}

	/// Subscribes to canonical events from this point on.
	pub fn subscribe(&self) -> broadcast::Receiver<CanonicalEvent> {
		self.events.subscribe()
	}

	/// Subscribes to the periodic stats broadcast.
	pub fn subscribe_stats(&self) -> broadcast::Receiver<StatsSnapshot> {
		self.stats.subscribe()
	}

	/// Publishes a canonical event; a zero-subscriber bus is not an error.
	pub fn publish(&self, event: CanonicalEvent) {
		trace!(target = "livelink.events", kind = event.event_type(), "publish");
		let _ = self.events.send(event);
	}

	/// Publishes a stats snapshot.
	pub fn publish_stats(&self, snapshot: StatsSnapshot) {
		let _ = self.stats.send(snapshot);
	}

	/// Current number of event subscribers.
	pub fn subscriber_count(&self) -> usize {
		self.events.receiver_count()
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use chrono::Utc;
	use livelink_protocol::{ChatEvent, Actor};

	use super::*;

	fn chat(message: &str) -> CanonicalEvent {
		CanonicalEvent::Chat(ChatEvent {
			actor: Actor {
				user_id: "1".into(),
				handle: "alice".into(),
				display_name: "Alice".into(),
				avatar_url: None,
			},
			message: message.into(),
			timestamp: Utc::now(),
		})
	}

	#[tokio::test]
	async fn events_arrive_in_publish_order() {
		let bus = EventBus::new();
		let mut rx = bus.subscribe();
		bus.publish(chat("one"));
		bus.publish(chat("two"));
		let first = rx.recv().await.unwrap();
		let second = rx.recv().await.unwrap();
		match (first, second) {
			(CanonicalEvent::Chat(a), CanonicalEvent::Chat(b)) => {
				assert_eq!(a.message, "one");
				assert_eq!(b.message, "two");
			}
			other => panic!("unexpected events: {other:?}"),
		}
	}

	#[tokio::test]
	async fn publishing_without_subscribers_is_fine() {
		let bus = EventBus::new();
		bus.publish(chat("nobody listening"));
		assert_eq!(bus.subscriber_count(), 0);
	}
}
