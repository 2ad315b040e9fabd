//! Optional third-party fallback resolution strategy.
//!
//! A credentialed external service that mirrors room lookups. Disabled
//! unless an endpoint is configured; skipped per call when the caller
//! disables optional strategies or no credential is available.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::json_string_at;
use super::strategy::{ResolveStrategy, StrategyContext, StrategyError, plausible_room_id};
use crate::error::ErrorCategory;

pub struct ThirdPartyFallbackStrategy {
	client: reqwest::Client,
	endpoint: String,
}

impl ThirdPartyFallbackStrategy {
	pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
		Self {
			client,
			endpoint: endpoint.into(),
		}
	}
}

#[async_trait]
impl ResolveStrategy for ThirdPartyFallbackStrategy {
	fn name(&self) -> &'static str {
		"thirdPartyFallback"
	}

	fn requires_credential(&self) -> bool {
		true
	}

	fn optional(&self) -> bool {
		true
	}

	async fn resolve(&self, handle: &str, cx: &StrategyContext<'_>) -> Result<String, StrategyError> {
		let Some(credential) = cx.credential else {
			return Err(StrategyError::new(
				ErrorCategory::ConfigInvalid,
				"fallback service requires a credential and none was resolved",
			));
		};

		let url = format!("{}?uniqueId={handle}", self.endpoint);
		let response = self
			.client
			.get(&url)
			.bearer_auth(credential.expose())
			.send()
			.await
			.map_err(StrategyError::from)?;
		let status = response.status();
		if !status.is_success() {
			return Err(StrategyError::new(
				ErrorCategory::from_status(status.as_u16()),
				format!("fallback service returned {status}"),
			));
		}

		let body = response.json::<Value>().await.map_err(StrategyError::from)?;
		let found = [&["roomId"][..], &["data", "roomId"][..]]
			.iter()
			.filter_map(|path| json_string_at(&body, path))
			.find(|value| plausible_room_id(value));
		match found {
			Some(room_id) => {
				debug!(target = "livelink.resolver", handle, room_id, "fallback service matched");
				Ok(room_id)
			}
			None => Err(StrategyError::new(ErrorCategory::Unknown, "room id missing from fallback response")),
		}
	}
}
