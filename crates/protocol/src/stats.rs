//! Rolling session statistics and the periodic broadcast snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monotonic counters for the lifetime of one session.
///
/// `viewers` is the exception: it is a last-observed gauge, since the
/// upstream reports absolute concurrent-viewer counts. Counters reset
/// to zero when a new session starts; a reconnect to the same handle
/// keeps the stream duration but restarts the counters, because the
/// counters describe this process's observation window rather than the
/// broadcast itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsAggregate {
	pub viewers: u64,
	pub likes: u64,
	pub total_coins: u64,
	pub followers: u64,
	pub shares: u64,
	pub gifts: u64,
}

/// One tick of the 1 Hz stats broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
	pub stats: StatsAggregate,
	/// Inferred broadcast start, when known.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stream_start: Option<DateTime<Utc>>,
	/// `now - stream_start`, rounded to whole seconds.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub elapsed_seconds: Option<u64>,
	pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn snapshot_serializes_camel_case() {
		let snapshot = StatsSnapshot {
			stats: StatsAggregate {
				total_coins: 42,
				..Default::default()
			},
			stream_start: None,
			elapsed_seconds: Some(7),
			timestamp: Utc::now(),
		};
		let json = serde_json::to_value(&snapshot).unwrap();
		assert_eq!(json["stats"]["totalCoins"], 42);
		assert_eq!(json["elapsedSeconds"], 7);
		assert!(json.get("streamStart").is_none());
	}
}
