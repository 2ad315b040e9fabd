//! Engine configuration and the settings-store seam.
//!
//! Timeouts, feature toggles, and the settings-layer credential come
//! from an external settings store owned by the host application. The
//! engine only depends on the [`SettingsStore`] trait.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

use crate::backoff::Backoff;

/// Key for the settings-layer API credential.
pub const SETTING_API_CREDENTIAL: &str = "credentials.apiKey";
/// Key toggling the optional third-party fallback resolution strategy.
pub const SETTING_FALLBACK_ENABLED: &str = "resolver.fallbackEnabled";
/// Environment variable consulted as the credential's environment layer.
pub const ENV_API_CREDENTIAL: &str = "LIVELINK_API_KEY";

/// Read-only view of the host's settings store.
pub trait SettingsStore: Send + Sync {
	/// Returns the raw value for `key`, if set.
	fn get(&self, key: &str) -> Option<String>;

	/// Convenience: `key` parsed as a boolean toggle.
	fn get_bool(&self, key: &str) -> Option<bool> {
		self.get(key).map(|v| {
			let v = v.trim().to_ascii_lowercase();
			v == "1" || v == "true" || v == "yes" || v == "on"
		})
	}
}

/// In-memory settings store for tests and embedded use.
#[derive(Debug, Default)]
pub struct InMemorySettings {
	values: Mutex<HashMap<String, String>>,
}

impl InMemorySettings {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
		self.values.lock().insert(key.into(), value.into());
	}

	pub fn remove(&self, key: &str) {
		self.values.lock().remove(key);
	}
}

impl SettingsStore for InMemorySettings {
	fn get(&self, key: &str) -> Option<String> {
		self.values.lock().get(key).cloned()
	}
}

/// Configuration for [`RoomResolver`](crate::resolver::RoomResolver).
#[derive(Debug, Clone)]
pub struct ResolverConfig {
	/// Host serving broadcaster live pages and the primary/secondary APIs.
	pub platform_host: String,
	/// Endpoint of the optional credentialed third-party fallback service.
	pub fallback_endpoint: Option<String>,
	/// Per-request HTTP timeout.
	pub request_timeout: Duration,
	/// Successful resolutions are cached this long.
	pub cache_ttl: Duration,
	/// Retry cap per strategy.
	pub max_attempts_per_strategy: u32,
	/// Retry backoff within one strategy.
	pub backoff: Backoff,
}

impl Default for ResolverConfig {
	fn default() -> Self {
		Self {
			platform_host: "www.tiktok.com".into(),
			fallback_endpoint: None,
			request_timeout: Duration::from_secs(10),
			cache_ttl: Duration::from_secs(5 * 60),
			max_attempts_per_strategy: 5,
			backoff: Backoff::default(),
		}
	}
}

/// Configuration for [`ConnectionSupervisor`](crate::supervisor::ConnectionSupervisor).
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
	/// Automatic reconnect cap before requiring manual intervention.
	pub max_auto_reconnects: u32,
	/// Fixed delay between automatic reconnect attempts.
	pub reconnect_delay: Duration,
	/// A connection alive this long resets the reconnect counter.
	pub stable_after: Duration,
	/// Cadence of the stats broadcast.
	pub stats_interval: Duration,
	/// Fingerprint cache bound.
	pub fingerprint_capacity: usize,
	/// Fingerprint TTL; an identical event past this window publishes again.
	pub fingerprint_ttl: Duration,
	/// Historical floor for plausible stream start times.
	pub start_time_floor: chrono::DateTime<chrono::Utc>,
}

impl Default for SupervisorConfig {
	fn default() -> Self {
		Self {
			max_auto_reconnects: 5,
			reconnect_delay: Duration::from_secs(5),
			stable_after: Duration::from_secs(5 * 60),
			stats_interval: Duration::from_secs(1),
			fingerprint_capacity: 1000,
			fingerprint_ttl: Duration::from_secs(60),
			start_time_floor: chrono::DateTime::from_timestamp(1_451_606_400, 0).expect("valid floor timestamp"),
		}
	}
}
