//! Event fingerprinting and duplicate suppression.
//!
//! The upstream re-delivers semantically identical messages around
//! reconnects and page refreshes. A fingerprint keys each event by its
//! type, subject, discriminating content, and a 1-second timestamp
//! bucket; repeats within the TTL window are suppressed.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use livelink_protocol::CanonicalEvent;

/// Bounded fingerprint cache with lazy TTL purge.
pub struct FingerprintCache {
	capacity: usize,
	ttl: Duration,
	entries: HashMap<String, Instant>,
}

impl FingerprintCache {
	pub fn new(capacity: usize, ttl: Duration) -> Self {
		Self {
			capacity: capacity.max(1),
			ttl,
			entries: HashMap::new(),
		}
	}

	/// Records `key` at `now`. Returns `true` when the event is fresh
	/// and should be published; `false` when it is a duplicate within
	/// the TTL window.
	pub fn observe(&mut self, key: &str, now: Instant) -> bool {
		if let Some(last_seen) = self.entries.get(key) {
			if now.duration_since(*last_seen) < self.ttl {
				return false;
			}
		}

		// Purge lazily on insert; evict oldest when still at capacity.
		self.entries.retain(|_, last_seen| now.duration_since(*last_seen) < self.ttl);
		if self.entries.len() >= self.capacity {
			if let Some(oldest) = self.entries.iter().min_by_key(|(_, seen)| **seen).map(|(k, _)| k.clone()) {
				self.entries.remove(&oldest);
			}
		}

		self.entries.insert(key.to_string(), now);
		true
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

/// Fingerprint for a canonical event, or `None` for lifecycle events
/// (connected/disconnected/error) which are never deduplicated.
pub fn fingerprint(event: &CanonicalEvent) -> Option<String> {
	let bucket = event.timestamp().timestamp();
	let subject = event.actor().map(|a| a.user_id.as_str()).unwrap_or("-");
	let discriminator = match event {
		CanonicalEvent::Connected(_) | CanonicalEvent::Disconnected(_) | CanonicalEvent::Error(_) => return None,
		CanonicalEvent::Chat(e) => e.message.clone(),
		CanonicalEvent::Gift(e) => format!("{}:{}:{}", e.gift_id, e.repeat_count, u8::from(e.streak_end)),
		CanonicalEvent::Like(e) => e.count.to_string(),
		CanonicalEvent::ViewerCount(e) => e.viewers.to_string(),
		CanonicalEvent::Follow(_) | CanonicalEvent::Share(_) | CanonicalEvent::Subscribe(_) | CanonicalEvent::Member(_) => String::new(),
	};
	Some(format!("{}:{subject}:{discriminator}:{bucket}", event.event_type()))
}

#[cfg(test)]
mod tests {
	use chrono::{TimeZone, Utc};
	use livelink_protocol::{Actor, ChatEvent, GiftEvent};

	use super::*;

	fn actor() -> Actor {
		Actor {
			user_id: "42".into(),
			handle: "alice".into(),
			display_name: "Alice".into(),
			avatar_url: None,
		}
	}

	fn chat_at(message: &str, secs: i64) -> CanonicalEvent {
		CanonicalEvent::Chat(ChatEvent {
			actor: actor(),
			message: message.into(),
			timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
		})
	}

	#[test]
	fn identical_events_same_bucket_share_a_fingerprint() {
		let a = fingerprint(&chat_at("hello", 1000)).unwrap();
		let b = fingerprint(&chat_at("hello", 1000)).unwrap();
		let c = fingerprint(&chat_at("hello", 1001)).unwrap();
		assert_eq!(a, b);
		assert_ne!(a, c);
	}

	#[test]
	fn gift_repeat_counts_discriminate() {
		let gift = |repeat_count, streak_end| {
			CanonicalEvent::Gift(GiftEvent {
				actor: actor(),
				gift_id: 5655,
				gift_name: None,
				diamond_value: 1,
				repeat_count,
				streakable: true,
				streak_end,
				coins: 2 * repeat_count as u64,
				timestamp: Utc.timestamp_opt(1000, 0).unwrap(),
			})
		};
		let mid = fingerprint(&gift(2, false)).unwrap();
		let end = fingerprint(&gift(3, true)).unwrap();
		assert_ne!(mid, end);
		assert_eq!(fingerprint(&gift(2, false)).unwrap(), mid);
	}

	#[test]
	fn duplicates_suppressed_within_ttl_then_readmitted() {
		let mut cache = FingerprintCache::new(1000, Duration::from_secs(60));
		let now = Instant::now();
		assert!(cache.observe("chat:42:hi:1000", now));
		assert!(!cache.observe("chat:42:hi:1000", now + Duration::from_secs(30)));
		assert!(cache.observe("chat:42:hi:1000", now + Duration::from_secs(61)));
	}

	#[test]
	fn capacity_evicts_oldest() {
		let mut cache = FingerprintCache::new(2, Duration::from_secs(600));
		let now = Instant::now();
		assert!(cache.observe("a", now));
		assert!(cache.observe("b", now + Duration::from_secs(1)));
		assert!(cache.observe("c", now + Duration::from_secs(2)));
		assert_eq!(cache.len(), 2);
		// "a" was the oldest and got evicted, so it reads as fresh again.
		assert!(cache.observe("a", now + Duration::from_secs(3)));
	}

	#[test]
	fn lifecycle_events_have_no_fingerprint() {
		let event = CanonicalEvent::Connected(livelink_protocol::ConnectedEvent {
			handle: "alice".into(),
			room_id: None,
			reconnect: false,
			timestamp: Utc::now(),
		});
		assert!(fingerprint(&event).is_none());
	}
}
