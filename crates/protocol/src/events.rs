//! Canonical event schema published to subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of the upstream account behind an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
	/// Opaque upstream user identifier.
	pub user_id: String,
	/// Stable public handle (the `@name` form, without the `@`).
	pub handle: String,
	/// Display name at the time of the event.
	pub display_name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub avatar_url: Option<String>,
}

/// Canonical event record, tagged by event type.
///
/// Every inbound platform message that survives normalization and
/// deduplication is published as exactly one of these variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CanonicalEvent {
	Connected(ConnectedEvent),
	Disconnected(DisconnectedEvent),
	Error(ErrorEvent),
	Chat(ChatEvent),
	Gift(GiftEvent),
	Follow(FollowEvent),
	Share(ShareEvent),
	Like(LikeEvent),
	Subscribe(SubscribeEvent),
	Member(MemberEvent),
	ViewerCount(ViewerCountEvent),
}

impl CanonicalEvent {
	/// Stable lowercase tag used on the wire and in fingerprints.
	pub fn event_type(&self) -> &'static str {
		match self {
			CanonicalEvent::Connected(_) => "connected",
			CanonicalEvent::Disconnected(_) => "disconnected",
			CanonicalEvent::Error(_) => "error",
			CanonicalEvent::Chat(_) => "chat",
			CanonicalEvent::Gift(_) => "gift",
			CanonicalEvent::Follow(_) => "follow",
			CanonicalEvent::Share(_) => "share",
			CanonicalEvent::Like(_) => "like",
			CanonicalEvent::Subscribe(_) => "subscribe",
			CanonicalEvent::Member(_) => "member",
			CanonicalEvent::ViewerCount(_) => "viewerCount",
		}
	}

	/// Event timestamp, present on every variant.
	pub fn timestamp(&self) -> DateTime<Utc> {
		match self {
			CanonicalEvent::Connected(e) => e.timestamp,
			CanonicalEvent::Disconnected(e) => e.timestamp,
			CanonicalEvent::Error(e) => e.timestamp,
			CanonicalEvent::Chat(e) => e.timestamp,
			CanonicalEvent::Gift(e) => e.timestamp,
			CanonicalEvent::Follow(e) => e.timestamp,
			CanonicalEvent::Share(e) => e.timestamp,
			CanonicalEvent::Like(e) => e.timestamp,
			CanonicalEvent::Subscribe(e) => e.timestamp,
			CanonicalEvent::Member(e) => e.timestamp,
			CanonicalEvent::ViewerCount(e) => e.timestamp,
		}
	}

	/// Acting user, when the event type has one.
	pub fn actor(&self) -> Option<&Actor> {
		match self {
			CanonicalEvent::Chat(e) => Some(&e.actor),
			CanonicalEvent::Gift(e) => Some(&e.actor),
			CanonicalEvent::Follow(e) => Some(&e.actor),
			CanonicalEvent::Share(e) => Some(&e.actor),
			CanonicalEvent::Like(e) => Some(&e.actor),
			CanonicalEvent::Subscribe(e) => Some(&e.actor),
			CanonicalEvent::Member(e) => Some(&e.actor),
			_ => None,
		}
	}
}

/// Session came up (first connect or successful reconnect).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedEvent {
	pub handle: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub room_id: Option<String>,
	pub reconnect: bool,
	pub timestamp: DateTime<Utc>,
}

/// Session went down, deliberately or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectedEvent {
	pub handle: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
	/// Whether the supervisor will attempt an automatic reconnect.
	pub will_reconnect: bool,
	pub timestamp: DateTime<Utc>,
}

/// Classified connection failure surfaced to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
	/// Taxonomy category tag, e.g. `authInvalid` or `rateLimited`.
	pub category: String,
	pub message: String,
	pub remedy: String,
	pub retryable: bool,
	pub timestamp: DateTime<Utc>,
}

/// A chat message in the broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEvent {
	pub actor: Actor,
	pub message: String,
	pub timestamp: DateTime<Utc>,
}

/// A virtual gift, possibly the terminal message of a streak.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftEvent {
	pub actor: Actor,
	pub gift_id: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub gift_name: Option<String>,
	pub diamond_value: u32,
	pub repeat_count: u32,
	/// Whether the gift type supports streaks.
	pub streakable: bool,
	/// Set on the message that closes a streak.
	pub streak_end: bool,
	/// `diamond_value * 2 * repeat_count`, the accounted coin total.
	pub coins: u64,
	pub timestamp: DateTime<Utc>,
}

impl GiftEvent {
	/// Whether this message should be counted toward the running totals.
	///
	/// Streakable gifts only count on the streak-end message; everything
	/// else counts immediately.
	pub fn countable(&self) -> bool {
		!self.streakable || self.streak_end
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowEvent {
	pub actor: Actor,
	pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareEvent {
	pub actor: Actor,
	pub timestamp: DateTime<Utc>,
}

/// One like tap batch; `count` is the number of likes in this message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeEvent {
	pub actor: Actor,
	pub count: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub total_likes: Option<u64>,
	pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeEvent {
	pub actor: Actor,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub months: Option<u32>,
	pub timestamp: DateTime<Utc>,
}

/// A viewer joined the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberEvent {
	pub actor: Actor,
	pub timestamp: DateTime<Utc>,
}

/// Upstream-reported concurrent viewer count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerCountEvent {
	pub viewers: u64,
	pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
	use super::*;

	fn actor() -> Actor {
		Actor {
			user_id: "7112".into(),
			handle: "alice".into(),
			display_name: "Alice".into(),
			avatar_url: None,
		}
	}

	#[test]
	fn events_serialize_with_type_tag() {
		let event = CanonicalEvent::Chat(ChatEvent {
			actor: actor(),
			message: "hello".into(),
			timestamp: Utc::now(),
		});
		let json = serde_json::to_value(&event).unwrap();
		assert_eq!(json["type"], "chat");
		assert_eq!(json["actor"]["handle"], "alice");
		assert_eq!(event.event_type(), "chat");
	}

	#[test]
	fn streakable_gift_only_countable_at_streak_end() {
		let mut gift = GiftEvent {
			actor: actor(),
			gift_id: 5655,
			gift_name: Some("Rose".into()),
			diamond_value: 1,
			repeat_count: 3,
			streakable: true,
			streak_end: false,
			coins: 6,
			timestamp: Utc::now(),
		};
		assert!(!gift.countable());
		gift.streak_end = true;
		assert!(gift.countable());
		gift.streakable = false;
		gift.streak_end = false;
		assert!(gift.countable());
	}
}
