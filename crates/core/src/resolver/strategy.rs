//! The strategy seam for room-id resolution.

use async_trait::async_trait;

use crate::credentials::Credential;
use crate::error::ErrorCategory;

/// A failure from one strategy attempt.
#[derive(Debug, Clone)]
pub struct StrategyError {
	pub category: ErrorCategory,
	pub message: String,
}

impl StrategyError {
	pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
		Self {
			category,
			message: message.into(),
		}
	}

	/// Terminal failures abort retries for this strategy immediately:
	/// auth rejection, permission denial, or "broadcaster not live"
	/// cannot be fixed by asking again.
	pub fn terminal(&self) -> bool {
		!self.category.retryable()
	}
}

impl From<reqwest::Error> for StrategyError {
	fn from(err: reqwest::Error) -> Self {
		Self::new(ErrorCategory::from_request_error(&err), err.to_string())
	}
}

/// Per-call context shared with strategies.
pub struct StrategyContext<'a> {
	/// Credential for strategies that authenticate against a service.
	pub credential: Option<&'a Credential>,
}

/// One independent way to resolve a handle to a room id.
///
/// Strategies are executed sequentially, never in parallel, to bound
/// load on the upstream.
#[async_trait]
pub trait ResolveStrategy: Send + Sync {
	/// Stable name used in diagnostics and aggregated errors.
	fn name(&self) -> &'static str;

	/// Whether this strategy cannot run without a credential.
	fn requires_credential(&self) -> bool {
		false
	}

	/// Optional strategies can be disabled per call.
	fn optional(&self) -> bool {
		false
	}

	async fn resolve(&self, handle: &str, cx: &StrategyContext<'_>) -> Result<String, StrategyError>;
}

/// A room id is plausible when it is all digits of sane length.
pub fn plausible_room_id(value: &str) -> bool {
	(5..=30).contains(&value.len()) && value.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn plausibility_bounds() {
		assert!(plausible_room_id("7123456789"));
		assert!(!plausible_room_id("123"));
		assert!(!plausible_room_id("7123a56789"));
		assert!(!plausible_room_id(""));
		assert!(!plausible_room_id(&"9".repeat(31)));
	}

	#[test]
	fn terminal_follows_taxonomy() {
		assert!(StrategyError::new(ErrorCategory::AuthInvalid, "").terminal());
		assert!(StrategyError::new(ErrorCategory::NotLive, "").terminal());
		assert!(StrategyError::new(ErrorCategory::Blocked, "").terminal());
		assert!(!StrategyError::new(ErrorCategory::RateLimited, "").terminal());
		assert!(!StrategyError::new(ErrorCategory::NetworkError, "").terminal());
	}
}
