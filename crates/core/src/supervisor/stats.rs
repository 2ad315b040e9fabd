//! Rolling stats accumulation and stream-start-time inference.

use chrono::{DateTime, Utc};
use livelink_protocol::{CanonicalEvent, StatsAggregate, StatsSnapshot};
use tracing::debug;

/// How the current start time was obtained, in increasing precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum StartTimeSource {
	/// Connection wall clock; the weakest fallback.
	WallClock,
	/// Earliest event timestamp observed so far.
	EarliestEvent,
	/// Explicit start time from session metadata.
	Platform,
}

/// Accumulates counters for one session and infers the stream start.
pub struct StatsTracker {
	stats: StatsAggregate,
	start: Option<DateTime<Utc>>,
	source: StartTimeSource,
	floor: DateTime<Utc>,
}

impl StatsTracker {
	/// Fresh tracker; `start` is a previously persisted start time when
	/// reconnecting to the same handle (counters still restart).
	pub fn new(floor: DateTime<Utc>, persisted_start: Option<DateTime<Utc>>) -> Self {
		Self {
			stats: StatsAggregate::default(),
			start: persisted_start,
			// A persisted value was inferred once already; don't let the
			// wall-clock fallback overwrite it.
			source: if persisted_start.is_some() {
				StartTimeSource::EarliestEvent
			} else {
				StartTimeSource::WallClock
			},
			floor,
		}
	}

	pub fn stats(&self) -> StatsAggregate {
		self.stats
	}

	pub fn start_time(&self) -> Option<DateTime<Utc>> {
		self.start
	}

	/// Anchors the wall-clock fallback when nothing better is known yet.
	pub fn anchor_wall_clock(&mut self, now: DateTime<Utc>) {
		if self.start.is_none() {
			self.start = Some(now);
			self.source = StartTimeSource::WallClock;
		}
	}

	/// Applies explicit session metadata. Returns `true` when the start
	/// time changed (a retroactive correction worth broadcasting).
	pub fn observe_platform_start(&mut self, create_time: Option<i64>, now: DateTime<Utc>) -> bool {
		let Some(ts) = create_time.and_then(|secs| DateTime::from_timestamp(secs, 0)) else {
			return false;
		};
		if ts < self.floor || ts > now {
			debug!(target = "livelink.supervisor", %ts, "implausible platform start time ignored");
			return false;
		}
		let changed = self.start != Some(ts);
		self.start = Some(ts);
		self.source = StartTimeSource::Platform;
		changed
	}

	/// Folds one published event into the counters and the start-time
	/// inference. Returns `true` when the start time was corrected.
	pub fn apply(&mut self, event: &CanonicalEvent) -> bool {
		match event {
			CanonicalEvent::Gift(gift) => {
				if gift.countable() {
					self.stats.total_coins += gift.coins;
					self.stats.gifts += 1;
				}
			}
			CanonicalEvent::Like(like) => {
				self.stats.likes += u64::from(like.count);
			}
			CanonicalEvent::Follow(_) => self.stats.followers += 1,
			CanonicalEvent::Share(_) => self.stats.shares += 1,
			CanonicalEvent::ViewerCount(vc) => self.stats.viewers = vc.viewers,
			_ => {}
		}
		self.observe_event_time(event.timestamp())
	}

	fn observe_event_time(&mut self, ts: DateTime<Utc>) -> bool {
		if self.source == StartTimeSource::Platform || ts < self.floor {
			return false;
		}
		let earlier = match self.start {
			Some(current) => ts < current,
			None => true,
		};
		// Event evidence only moves the start backwards; the broadcast
		// cannot have started after something we already saw in it.
		let upgrade = self.source == StartTimeSource::WallClock && self.start.is_some() && earlier;
		if self.start.is_none() || upgrade || (self.source == StartTimeSource::EarliestEvent && earlier) {
			self.start = Some(ts);
			self.source = StartTimeSource::EarliestEvent;
			return true;
		}
		false
	}

	/// Snapshot for the 1 Hz broadcast.
	pub fn snapshot(&self, now: DateTime<Utc>) -> StatsSnapshot {
		let elapsed_seconds = self
			.start
			.map(|start| (now - start).num_seconds().max(0) as u64);
		StatsSnapshot {
			stats: self.stats,
			stream_start: self.start,
			elapsed_seconds,
			timestamp: now,
		}
	}
}

#[cfg(test)]
mod tests {
	use chrono::TimeZone;
	use livelink_protocol::{Actor, GiftEvent, LikeEvent};

	use super::*;

	fn floor() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap()
	}

	fn actor() -> Actor {
		Actor {
			user_id: "1".into(),
			handle: "a".into(),
			display_name: "A".into(),
			avatar_url: None,
		}
	}

	fn gift(streakable: bool, streak_end: bool, repeat_count: u32, ts: DateTime<Utc>) -> CanonicalEvent {
		CanonicalEvent::Gift(GiftEvent {
			actor: actor(),
			gift_id: 1,
			gift_name: None,
			diamond_value: 5,
			repeat_count,
			streakable,
			streak_end,
			coins: 5 * 2 * u64::from(repeat_count),
			timestamp: ts,
		})
	}

	#[test]
	fn streak_gifts_count_only_at_streak_end() {
		let now = Utc::now();
		let mut tracker = StatsTracker::new(floor(), None);
		tracker.apply(&gift(true, false, 1, now));
		tracker.apply(&gift(true, false, 2, now));
		assert_eq!(tracker.stats().total_coins, 0);
		assert_eq!(tracker.stats().gifts, 0);
		tracker.apply(&gift(true, true, 3, now));
		assert_eq!(tracker.stats().total_coins, 30);
		assert_eq!(tracker.stats().gifts, 1);
	}

	#[test]
	fn non_streak_gifts_count_immediately() {
		let mut tracker = StatsTracker::new(floor(), None);
		tracker.apply(&gift(false, false, 2, Utc::now()));
		assert_eq!(tracker.stats().total_coins, 20);
		assert_eq!(tracker.stats().gifts, 1);
	}

	#[test]
	fn likes_accumulate_and_viewers_gauge() {
		let now = Utc::now();
		let mut tracker = StatsTracker::new(floor(), None);
		tracker.apply(&CanonicalEvent::Like(LikeEvent {
			actor: actor(),
			count: 7,
			total_likes: None,
			timestamp: now,
		}));
		tracker.apply(&CanonicalEvent::Like(LikeEvent {
			actor: actor(),
			count: 3,
			total_likes: None,
			timestamp: now,
		}));
		assert_eq!(tracker.stats().likes, 10);
	}

	#[test]
	fn platform_start_overrides_event_inference() {
		let now = Utc::now();
		let mut tracker = StatsTracker::new(floor(), None);
		tracker.anchor_wall_clock(now);
		let event_ts = now - chrono::Duration::minutes(10);
		assert!(tracker.apply(&gift(false, false, 1, event_ts)));
		assert_eq!(tracker.start_time(), Some(event_ts));

		let platform_secs = (now - chrono::Duration::hours(1)).timestamp();
		assert!(tracker.observe_platform_start(Some(platform_secs), now));
		assert_eq!(tracker.start_time().unwrap().timestamp(), platform_secs);

		// Later event evidence no longer moves it.
		assert!(!tracker.apply(&gift(false, false, 1, now - chrono::Duration::hours(2))));
	}

	#[test]
	fn implausible_platform_start_is_ignored() {
		let now = Utc::now();
		let mut tracker = StatsTracker::new(floor(), None);
		assert!(!tracker.observe_platform_start(Some(100), now));
		assert!(!tracker.observe_platform_start(Some((now + chrono::Duration::hours(2)).timestamp()), now));
	}

	#[test]
	fn persisted_start_survives_and_counters_restart() {
		let start = Utc::now() - chrono::Duration::minutes(30);
		let mut tracker = StatsTracker::new(floor(), Some(start));
		assert_eq!(tracker.start_time(), Some(start));
		assert_eq!(tracker.stats(), StatsAggregate::default());
		let snapshot = tracker.snapshot(start + chrono::Duration::seconds(90));
		assert_eq!(snapshot.elapsed_seconds, Some(90));
	}
}
