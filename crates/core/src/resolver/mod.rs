//! Room-id resolution with caching, retries, and a strategy cascade.
//!
//! Strategies run sequentially in a fixed order; each is retried with
//! exponential backoff up to a cap unless it fails terminally. The
//! first plausible room id wins and is cached write-through for the
//! configured TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

pub mod api;
pub mod fallback;
pub mod markup;
pub mod strategy;

pub use strategy::{ResolveStrategy, StrategyContext, StrategyError};

use crate::config::ResolverConfig;
use crate::credentials::Credential;
use crate::diagnostics::DiagnosticsRecorder;
use crate::error::{AttemptError, LiveError, ResolutionError, Result};

/// Per-call options for [`RoomResolver::resolve`].
#[derive(Debug, Default, Clone)]
pub struct ResolveOptions {
	/// Skip the cache read (the successful result is still written back).
	pub bypass_cache: bool,
	/// Credential for strategies that need one.
	pub credential: Option<Credential>,
	/// Skip strategies marked optional (the third-party fallback).
	pub disable_optional_fallback: bool,
}

struct CachedRoomId {
	room_id: String,
	resolved_at: Instant,
}

/// Resolves a broadcaster handle to its active room id.
pub struct RoomResolver {
	config: ResolverConfig,
	strategies: Vec<Box<dyn ResolveStrategy>>,
	cache: Mutex<HashMap<String, CachedRoomId>>,
	diagnostics: Arc<DiagnosticsRecorder>,
}

impl RoomResolver {
	/// Builds the resolver with the production strategy cascade:
	/// markup scrape → primary API → secondary API → optional fallback.
	pub fn new(config: ResolverConfig, diagnostics: Arc<DiagnosticsRecorder>) -> Result<Self> {
		let client = reqwest::Client::builder()
			.timeout(config.request_timeout)
			.default_headers(markup::browser_headers(&config.platform_host))
			.build()
			.map_err(|e| LiveError::Config(format!("failed to build http client: {e}")))?;

		let mut strategies: Vec<Box<dyn ResolveStrategy>> = vec![
			Box::new(markup::MarkupScrapeStrategy::new(client.clone(), config.platform_host.clone())),
			Box::new(api::PrimaryApiStrategy::new(client.clone(), config.platform_host.clone())),
			Box::new(api::SecondaryApiStrategy::new(client.clone(), config.platform_host.clone())),
		];
		if let Some(endpoint) = &config.fallback_endpoint {
			strategies.push(Box::new(fallback::ThirdPartyFallbackStrategy::new(client, endpoint.clone())));
		}

		Ok(Self::with_strategies(config, diagnostics, strategies))
	}

	/// Builds the resolver with an explicit strategy list (test seam).
	pub fn with_strategies(
		config: ResolverConfig,
		diagnostics: Arc<DiagnosticsRecorder>,
		strategies: Vec<Box<dyn ResolveStrategy>>,
	) -> Self {
		Self {
			config,
			strategies,
			cache: Mutex::new(HashMap::new()),
			diagnostics,
		}
	}

	/// Resolves `handle` to a room id, trying cache first.
	pub async fn resolve(&self, handle: &str, options: ResolveOptions) -> Result<String> {
		let handle = normalize_handle(handle);

		if !options.bypass_cache {
			if let Some(room_id) = self.cache_lookup(&handle) {
				debug!(target = "livelink.resolver", handle, room_id, "cache hit");
				return Ok(room_id);
			}
		}

		let cx = StrategyContext {
			credential: options.credential.as_ref(),
		};
		let mut attempts: Vec<AttemptError> = Vec::new();

		for strategy in &self.strategies {
			if strategy.optional() && options.disable_optional_fallback {
				debug!(target = "livelink.resolver", strategy = strategy.name(), "optional strategy disabled for this call");
				continue;
			}
			if strategy.requires_credential() && cx.credential.is_none() {
				debug!(target = "livelink.resolver", strategy = strategy.name(), "skipped: no credential");
				continue;
			}

			for attempt in 1..=self.config.max_attempts_per_strategy {
				match strategy.resolve(&handle, &cx).await {
					Ok(room_id) => {
						info!(
							target = "livelink.resolver",
							handle,
							room_id,
							strategy = strategy.name(),
							attempt,
							"resolved"
						);
						self.cache_store(&handle, &room_id);
						self.diagnostics
							.record_attempt(&handle, true, None, format!("resolved via {}", strategy.name()));
						return Ok(room_id);
					}
					Err(err) => {
						warn!(
							target = "livelink.resolver",
							handle,
							strategy = strategy.name(),
							attempt,
							category = err.category.as_str(),
							message = %err.message,
							"strategy attempt failed"
						);
						let terminal = err.terminal();
						attempts.push(AttemptError {
							strategy: strategy.name(),
							attempt,
							category: err.category,
							message: err.message,
						});
						if terminal {
							break;
						}
						if attempt < self.config.max_attempts_per_strategy {
							tokio::time::sleep(self.config.backoff.delay(attempt - 1)).await;
						}
					}
				}
			}
		}

		let error = ResolutionError {
			handle: handle.clone(),
			attempts,
		};
		self.diagnostics
			.record_attempt(&handle, false, Some(error.last_category()), error.to_string());
		Err(LiveError::Resolution(error))
	}

	fn cache_lookup(&self, handle: &str) -> Option<String> {
		let mut cache = self.cache.lock();
		match cache.get(handle) {
			Some(entry) if entry.resolved_at.elapsed() < self.config.cache_ttl => Some(entry.room_id.clone()),
			Some(_) => {
				// Past TTL: behaves as a miss.
				cache.remove(handle);
				None
			}
			None => None,
		}
	}

	fn cache_store(&self, handle: &str, room_id: &str) {
		self.cache.lock().insert(
			handle.to_string(),
			CachedRoomId {
				room_id: room_id.to_string(),
				resolved_at: Instant::now(),
			},
		);
	}
}

/// Strips the `@` prefix and normalizes case.
fn normalize_handle(handle: &str) -> String {
	handle.trim().trim_start_matches('@').to_ascii_lowercase()
}

/// Walks `path` through nested objects; accepts string or integer leaves.
pub(crate) fn json_string_at(value: &Value, path: &[&str]) -> Option<String> {
	let mut cursor = value;
	for key in path {
		cursor = cursor.get(key)?;
	}
	match cursor {
		Value::String(s) => Some(s.clone()),
		Value::Number(n) => Some(n.to_string()),
		_ => None,
	}
}
