//! Bounded connection-attempt history and derived health status.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::credentials::CredentialSource;
use crate::error::ErrorCategory;

/// Ring-buffer capacity; health is derived over this window.
const ATTEMPT_HISTORY: usize = 10;

/// One connection or resolution attempt, success or failure.
#[derive(Debug, Clone)]
pub struct ConnectionAttemptRecord {
	pub timestamp: DateTime<Utc>,
	pub handle: String,
	pub success: bool,
	pub category: Option<ErrorCategory>,
	pub message: String,
}

/// Coarse health derived from recent attempt failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HealthStatus {
	Healthy,
	Degraded,
	Critical,
}

/// Operator-facing snapshot of the recorder.
#[derive(Debug, Clone)]
pub struct DiagnosticsSnapshot {
	pub health: HealthStatus,
	pub attempts: Vec<ConnectionAttemptRecord>,
	/// Name of the effective credential source; never the secret itself.
	pub credential_source: Option<&'static str>,
}

#[derive(Default)]
struct Inner {
	attempts: VecDeque<ConnectionAttemptRecord>,
	credential_source: Option<CredentialSource>,
}

/// Append-only recorder of recent connection attempts.
///
/// Owned by the host, shared by RoomResolver and ConnectionSupervisor.
#[derive(Default)]
pub struct DiagnosticsRecorder {
	inner: Mutex<Inner>,
}

impl DiagnosticsRecorder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends an attempt record, evicting the oldest past capacity.
	pub fn record_attempt(&self, handle: &str, success: bool, category: Option<ErrorCategory>, message: impl Into<String>) {
		let record = ConnectionAttemptRecord {
			timestamp: Utc::now(),
			handle: handle.to_string(),
			success,
			category,
			message: message.into(),
		};
		debug!(
			target = "livelink.diagnostics",
			handle,
			success,
			category = category.map(ErrorCategory::as_str),
			message = %record.message,
			"attempt recorded"
		);
		let mut inner = self.inner.lock();
		if inner.attempts.len() == ATTEMPT_HISTORY {
			inner.attempts.pop_front();
		}
		inner.attempts.push_back(record);
	}

	/// The most recent `n` attempts, newest first.
	pub fn recent_attempts(&self, n: usize) -> Vec<ConnectionAttemptRecord> {
		let inner = self.inner.lock();
		inner.attempts.iter().rev().take(n).cloned().collect()
	}

	/// Health over the last 10 attempts: 0–1 failures healthy, 2–4
	/// degraded, 5 or more critical.
	pub fn health_status(&self) -> HealthStatus {
		let inner = self.inner.lock();
		let failures = inner.attempts.iter().filter(|a| !a.success).count();
		match failures {
			0 | 1 => HealthStatus::Healthy,
			2..=4 => HealthStatus::Degraded,
			_ => HealthStatus::Critical,
		}
	}

	/// Records which credential source is currently effective.
	pub fn set_credential_source(&self, source: CredentialSource) {
		self.inner.lock().credential_source = Some(source);
	}

	/// Name of the effective credential source, if any.
	pub fn credential_source(&self) -> Option<&'static str> {
		self.inner.lock().credential_source.map(CredentialSource::name)
	}

	/// Full operator snapshot.
	pub fn snapshot(&self) -> DiagnosticsSnapshot {
		DiagnosticsSnapshot {
			health: self.health_status(),
			attempts: self.recent_attempts(ATTEMPT_HISTORY),
			credential_source: self.credential_source(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn history_is_bounded_to_ten() {
		let recorder = DiagnosticsRecorder::new();
		for i in 0..15 {
			recorder.record_attempt("alice", true, None, format!("attempt {i}"));
		}
		let attempts = recorder.recent_attempts(100);
		assert_eq!(attempts.len(), 10);
		// Newest first; attempt 14 survives, attempt 4 was evicted.
		assert_eq!(attempts[0].message, "attempt 14");
		assert_eq!(attempts[9].message, "attempt 5");
	}

	#[test]
	fn health_thresholds() {
		let recorder = DiagnosticsRecorder::new();
		assert_eq!(recorder.health_status(), HealthStatus::Healthy);
		recorder.record_attempt("a", false, Some(ErrorCategory::NetworkError), "down");
		assert_eq!(recorder.health_status(), HealthStatus::Healthy);
		recorder.record_attempt("a", false, Some(ErrorCategory::NetworkError), "down");
		assert_eq!(recorder.health_status(), HealthStatus::Degraded);
		for _ in 0..3 {
			recorder.record_attempt("a", false, Some(ErrorCategory::NetworkError), "down");
		}
		assert_eq!(recorder.health_status(), HealthStatus::Critical);
	}

	#[test]
	fn failures_age_out_of_the_window() {
		let recorder = DiagnosticsRecorder::new();
		for _ in 0..5 {
			recorder.record_attempt("a", false, Some(ErrorCategory::GatewayTimeout), "down");
		}
		assert_eq!(recorder.health_status(), HealthStatus::Critical);
		for _ in 0..10 {
			recorder.record_attempt("a", true, None, "up");
		}
		assert_eq!(recorder.health_status(), HealthStatus::Healthy);
	}

	#[test]
	fn snapshot_exposes_source_name_only() {
		let recorder = DiagnosticsRecorder::new();
		recorder.set_credential_source(CredentialSource::Environment);
		let snapshot = recorder.snapshot();
		assert_eq!(snapshot.credential_source, Some("environment"));
	}
}
