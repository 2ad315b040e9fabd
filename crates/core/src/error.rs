//! Error types and the connection-failure taxonomy.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, LiveError>;

/// Classified category for a connection or resolution failure.
///
/// The category decides whether automated recovery is worth attempting
/// and what an operator should be told.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
	/// The broadcaster is not currently live.
	NotLive,
	/// No room exists for the requested handle.
	RoomNotFound,
	/// Credentials were rejected by the upstream.
	AuthInvalid,
	/// Local configuration is missing or malformed.
	ConfigInvalid,
	/// The upstream is throttling this client.
	RateLimited,
	/// Upstream gateway timed out or returned 5xx.
	GatewayTimeout,
	/// The upstream served a block page or captcha challenge.
	Blocked,
	/// DNS, TLS, or socket-level failure.
	NetworkError,
	/// Anything not recognized; treated as transient.
	Unknown,
}

impl ErrorCategory {
	/// Whether an automated retry has any chance of succeeding.
	pub fn retryable(self) -> bool {
		matches!(
			self,
			ErrorCategory::RateLimited
				| ErrorCategory::GatewayTimeout
				| ErrorCategory::NetworkError
				| ErrorCategory::Unknown
		)
	}

	/// Stable camelCase tag used on published error events.
	pub fn as_str(self) -> &'static str {
		match self {
			ErrorCategory::NotLive => "notLive",
			ErrorCategory::RoomNotFound => "roomNotFound",
			ErrorCategory::AuthInvalid => "authInvalid",
			ErrorCategory::ConfigInvalid => "configInvalid",
			ErrorCategory::RateLimited => "rateLimited",
			ErrorCategory::GatewayTimeout => "gatewayTimeout",
			ErrorCategory::Blocked => "blocked",
			ErrorCategory::NetworkError => "networkError",
			ErrorCategory::Unknown => "unknown",
		}
	}

	/// Operator-facing remedy suggestion.
	pub fn remedy(self) -> &'static str {
		match self {
			ErrorCategory::NotLive => "Wait until the broadcaster goes live, then connect again",
			ErrorCategory::RoomNotFound => "Check the handle spelling; the account may not exist or may never have gone live",
			ErrorCategory::AuthInvalid => "Update the API credential and reconnect manually",
			ErrorCategory::ConfigInvalid => "Fix the configuration (credential sources, endpoints) and reconnect manually",
			ErrorCategory::RateLimited => "Back off; the connection will be retried after a cooldown",
			ErrorCategory::GatewayTimeout => "Upstream gateway trouble; retrying automatically",
			ErrorCategory::Blocked => "The upstream is blocking this client; wait a while and consider rotating network identity before trying again",
			ErrorCategory::NetworkError => "Check local connectivity; retrying automatically",
			ErrorCategory::Unknown => "Unrecognized failure; retrying automatically",
		}
	}

	/// Classifies an HTTP status code.
	pub fn from_status(status: u16) -> Self {
		match status {
			401 => ErrorCategory::AuthInvalid,
			403 => ErrorCategory::Blocked,
			404 => ErrorCategory::RoomNotFound,
			429 => ErrorCategory::RateLimited,
			502 | 503 | 504 => ErrorCategory::GatewayTimeout,
			_ => ErrorCategory::Unknown,
		}
	}

	/// Best-effort classification of a free-form failure message.
	///
	/// Upstream close frames and scraped error pages carry no structured
	/// code, so this is the last line of classification before `Unknown`.
	pub fn from_message(message: &str) -> Self {
		let msg = message.to_ascii_lowercase();
		if msg.contains("captcha") || msg.contains("verify") || msg.contains("blocked") {
			ErrorCategory::Blocked
		} else if msg.contains("invalid credential")
			|| msg.contains("unauthorized")
			|| msg.contains("auth")
			|| msg.contains("forbidden api key")
		{
			ErrorCategory::AuthInvalid
		} else if msg.contains("not live") || msg.contains("offline") || msg.contains("stream ended") {
			ErrorCategory::NotLive
		} else if msg.contains("room not found") || msg.contains("no room") {
			ErrorCategory::RoomNotFound
		} else if msg.contains("rate limit") || msg.contains("too many requests") {
			ErrorCategory::RateLimited
		} else if msg.contains("timed out") || msg.contains("timeout") || msg.contains("gateway") {
			ErrorCategory::GatewayTimeout
		} else if msg.contains("dns") || msg.contains("connection refused") || msg.contains("connection reset") {
			ErrorCategory::NetworkError
		} else {
			ErrorCategory::Unknown
		}
	}

	/// Classifies a `reqwest` transport error.
	pub fn from_request_error(err: &reqwest::Error) -> Self {
		if err.is_timeout() {
			ErrorCategory::GatewayTimeout
		} else if err.is_connect() {
			ErrorCategory::NetworkError
		} else if let Some(status) = err.status() {
			ErrorCategory::from_status(status.as_u16())
		} else {
			ErrorCategory::Unknown
		}
	}
}

/// One failed attempt during room resolution.
#[derive(Debug, Clone)]
pub struct AttemptError {
	/// Strategy name, e.g. `markupScrape` or `primaryApi`.
	pub strategy: &'static str,
	/// 1-based attempt number within that strategy.
	pub attempt: u32,
	pub category: ErrorCategory,
	pub message: String,
}

/// Aggregate failure after every resolution strategy was exhausted.
#[derive(Debug, Clone, Error)]
pub struct ResolutionError {
	pub handle: String,
	pub attempts: Vec<AttemptError>,
}

impl std::fmt::Display for ResolutionError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"could not resolve a room id for '{}' after {} attempt(s):",
			self.handle,
			self.attempts.len()
		)?;
		for err in &self.attempts {
			write!(f, "\n  {} #{}: [{}] {}", err.strategy, err.attempt, err.category.as_str(), err.message)?;
		}
		Ok(())
	}
}

impl ResolutionError {
	/// Category of the final attempt, or `RoomNotFound` when no strategy ran.
	pub fn last_category(&self) -> ErrorCategory {
		self.attempts.last().map(|a| a.category).unwrap_or(ErrorCategory::RoomNotFound)
	}
}

/// Top-level error type for the engine.
#[derive(Debug, Error)]
pub enum LiveError {
	/// Room resolution exhausted every strategy.
	#[error(transparent)]
	Resolution(#[from] ResolutionError),

	/// A classified connection failure.
	#[error("{} ({}): {message}", category.as_str(), if category.retryable() { "retryable" } else { "not retryable" })]
	Connection { category: ErrorCategory, message: String },

	/// Missing or malformed local configuration.
	#[error("configuration error: {0}")]
	Config(String),
}

impl LiveError {
	/// Builds a classified connection error.
	pub fn connection(category: ErrorCategory, message: impl Into<String>) -> Self {
		LiveError::Connection {
			category,
			message: message.into(),
		}
	}

	/// The failure category, mapping non-connection variants onto the taxonomy.
	pub fn category(&self) -> ErrorCategory {
		match self {
			LiveError::Resolution(err) => err.last_category(),
			LiveError::Connection { category, .. } => *category,
			LiveError::Config(_) => ErrorCategory::ConfigInvalid,
		}
	}

	/// Operator-facing remedy suggestion for this failure.
	pub fn remedy(&self) -> &'static str {
		self.category().remedy()
	}
}
