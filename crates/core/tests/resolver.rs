//! Resolver cascade behavior against scripted strategies.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use livelink::config::{InMemorySettings, ResolverConfig, SETTING_API_CREDENTIAL};
use livelink::credentials::resolve_credential;
use livelink::diagnostics::DiagnosticsRecorder;
use livelink::error::{ErrorCategory, LiveError};
use livelink::resolver::{ResolveOptions, ResolveStrategy, RoomResolver, StrategyContext, StrategyError};

type Outcome = Result<&'static str, (ErrorCategory, &'static str)>;

struct ScriptedStrategy {
	name: &'static str,
	optional: bool,
	requires_credential: bool,
	outcomes: Mutex<VecDeque<Outcome>>,
	calls: AtomicU32,
}

impl ScriptedStrategy {
	fn new(name: &'static str, outcomes: impl IntoIterator<Item = Outcome>) -> Arc<Self> {
		Arc::new(Self {
			name,
			optional: false,
			requires_credential: false,
			outcomes: Mutex::new(outcomes.into_iter().collect()),
			calls: AtomicU32::new(0),
		})
	}

	fn optional(name: &'static str, outcomes: impl IntoIterator<Item = Outcome>) -> Arc<Self> {
		Arc::new(Self {
			name,
			optional: true,
			requires_credential: true,
			outcomes: Mutex::new(outcomes.into_iter().collect()),
			calls: AtomicU32::new(0),
		})
	}

	fn calls(&self) -> u32 {
		self.calls.load(Ordering::SeqCst)
	}
}

/// Adapter so one scripted strategy can be both boxed into the
/// resolver and inspected by the test afterwards.
struct Scripted(Arc<ScriptedStrategy>);

#[async_trait]
impl ResolveStrategy for Scripted {
	fn name(&self) -> &'static str {
		self.0.name
	}

	fn requires_credential(&self) -> bool {
		self.0.requires_credential
	}

	fn optional(&self) -> bool {
		self.0.optional
	}

	async fn resolve(&self, _handle: &str, _cx: &StrategyContext<'_>) -> Result<String, StrategyError> {
		self.0.calls.fetch_add(1, Ordering::SeqCst);
		match self.0.outcomes.lock().pop_front() {
			Some(Ok(room_id)) => Ok(room_id.to_string()),
			Some(Err((category, message))) => Err(StrategyError::new(category, message)),
			None => Err(StrategyError::new(ErrorCategory::Unknown, "script exhausted")),
		}
	}
}

fn boxed(strategy: &Arc<ScriptedStrategy>) -> Box<dyn ResolveStrategy> {
	Box::new(Scripted(Arc::clone(strategy)))
}

fn resolver_with(config: ResolverConfig, strategies: Vec<Box<dyn ResolveStrategy>>) -> RoomResolver {
	RoomResolver::with_strategies(config, Arc::new(DiagnosticsRecorder::new()), strategies)
}

fn resolver(strategies: Vec<Box<dyn ResolveStrategy>>) -> RoomResolver {
	resolver_with(ResolverConfig::default(), strategies)
}

#[tokio::test]
async fn successful_resolution_is_cached_across_handle_spellings() -> anyhow::Result<()> {
	let strategy = ScriptedStrategy::new("scripted", [Ok("1234567890"), Ok("9999999999")]);
	let resolver = resolver(vec![boxed(&strategy)]);

	let first = resolver.resolve("@Alice", ResolveOptions::default()).await?;
	let second = resolver.resolve("alice", ResolveOptions::default()).await?;

	assert_eq!(first, "1234567890");
	assert_eq!(second, "1234567890");
	assert_eq!(strategy.calls(), 1);
	Ok(())
}

#[tokio::test]
async fn expired_cache_entries_resolve_again() -> anyhow::Result<()> {
	let strategy = ScriptedStrategy::new("scripted", [Ok("1111111111"), Ok("2222222222")]);
	let config = ResolverConfig {
		cache_ttl: Duration::ZERO,
		..ResolverConfig::default()
	};
	let resolver = resolver_with(config, vec![boxed(&strategy)]);

	assert_eq!(resolver.resolve("alice", ResolveOptions::default()).await?, "1111111111");
	assert_eq!(resolver.resolve("alice", ResolveOptions::default()).await?, "2222222222");
	assert_eq!(strategy.calls(), 2);
	Ok(())
}

#[tokio::test]
async fn bypass_cache_forces_a_fresh_resolution() -> anyhow::Result<()> {
	let strategy = ScriptedStrategy::new("scripted", [Ok("1111111111"), Ok("2222222222")]);
	let resolver = resolver(vec![boxed(&strategy)]);

	resolver.resolve("alice", ResolveOptions::default()).await?;
	let options = ResolveOptions {
		bypass_cache: true,
		..ResolveOptions::default()
	};
	assert_eq!(resolver.resolve("alice", options).await?, "2222222222");
	assert_eq!(strategy.calls(), 2);
	Ok(())
}

#[tokio::test(start_paused = true)]
async fn retryable_failures_retry_up_to_the_cap_then_cascade() {
	let flaky = ScriptedStrategy::new("flaky", vec![Err((ErrorCategory::RateLimited, "429")); 5]);
	let backup = ScriptedStrategy::new("backup", [Ok("4242424242")]);
	let resolver = resolver(vec![boxed(&flaky), boxed(&backup)]);

	let room_id = resolver.resolve("alice", ResolveOptions::default()).await.unwrap();

	assert_eq!(room_id, "4242424242");
	assert_eq!(flaky.calls(), 5);
	assert_eq!(backup.calls(), 1);
}

#[tokio::test]
async fn terminal_failure_skips_remaining_retries_for_that_strategy() {
	let offline = ScriptedStrategy::new("offline", [Err((ErrorCategory::NotLive, "status 4"))]);
	let backup = ScriptedStrategy::new("backup", [Ok("4242424242")]);
	let resolver = resolver(vec![boxed(&offline), boxed(&backup)]);

	assert_eq!(resolver.resolve("alice", ResolveOptions::default()).await.unwrap(), "4242424242");
	assert_eq!(offline.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_cascade_reports_every_attempt() {
	let alpha = ScriptedStrategy::new("alpha", [Err((ErrorCategory::Blocked, "captcha wall"))]);
	let beta = ScriptedStrategy::new("beta", vec![Err((ErrorCategory::GatewayTimeout, "504")); 5]);
	let resolver = resolver(vec![boxed(&alpha), boxed(&beta)]);

	let err = resolver.resolve("alice", ResolveOptions::default()).await.unwrap_err();
	match err {
		LiveError::Resolution(resolution) => {
			assert_eq!(resolution.attempts.len(), 6);
			assert_eq!(resolution.last_category(), ErrorCategory::GatewayTimeout);
			let text = resolution.to_string();
			assert!(text.contains("alpha #1"), "{text}");
			assert!(text.contains("beta #5"), "{text}");
			assert!(text.contains("captcha wall"), "{text}");
		}
		other => panic!("expected a resolution error, got {other:?}"),
	}
}

#[tokio::test]
async fn optional_strategies_honor_credentials_and_the_per_call_toggle() {
	let fallback = ScriptedStrategy::optional("fallback", [Ok("5555555555"), Ok("5555555555")]);
	let resolver = resolver(vec![boxed(&fallback)]);

	// No credential: the strategy never runs.
	let err = resolver.resolve("alice", ResolveOptions::default()).await.unwrap_err();
	assert!(matches!(err, LiveError::Resolution(_)));
	assert_eq!(fallback.calls(), 0);

	let settings = InMemorySettings::new();
	settings.set(SETTING_API_CREDENTIAL, "integration-secret");
	let credential = resolve_credential(None, &settings).unwrap();

	// Credentialed but disabled per call: still skipped.
	let options = ResolveOptions {
		credential: Some(credential.clone()),
		disable_optional_fallback: true,
		..ResolveOptions::default()
	};
	let err = resolver.resolve("alice", options).await.unwrap_err();
	assert!(matches!(err, LiveError::Resolution(_)));
	assert_eq!(fallback.calls(), 0);

	// Credentialed and enabled: it resolves.
	let options = ResolveOptions {
		credential: Some(credential),
		..ResolveOptions::default()
	};
	assert_eq!(resolver.resolve("alice", options).await.unwrap(), "5555555555");
	assert_eq!(fallback.calls(), 1);
}

#[tokio::test]
async fn attempts_land_in_the_diagnostics_history() {
	let diagnostics = Arc::new(DiagnosticsRecorder::new());
	let strategy = ScriptedStrategy::new("scripted", [Ok("1234567890")]);
	let resolver = RoomResolver::with_strategies(ResolverConfig::default(), Arc::clone(&diagnostics), vec![boxed(&strategy)]);

	resolver.resolve("alice", ResolveOptions::default()).await.unwrap();

	let recent = diagnostics.recent_attempts(10);
	assert_eq!(recent.len(), 1);
	assert!(recent[0].success);
	assert_eq!(recent[0].handle, "alice");
	assert!(recent[0].message.contains("scripted"));
}
