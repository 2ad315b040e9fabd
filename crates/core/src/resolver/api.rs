//! Platform API resolution strategies.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::json_string_at;
use super::strategy::{ResolveStrategy, StrategyContext, StrategyError, plausible_room_id};
use crate::error::ErrorCategory;

/// Upstream room status code meaning "not broadcasting".
const ROOM_STATUS_OFFLINE: u64 = 4;

async fn fetch_json(client: &reqwest::Client, url: &str) -> Result<Value, StrategyError> {
	let response = client.get(url).send().await.map_err(StrategyError::from)?;
	let status = response.status();
	if !status.is_success() {
		return Err(StrategyError::new(
			ErrorCategory::from_status(status.as_u16()),
			format!("api returned {status}"),
		));
	}
	response.json::<Value>().await.map_err(StrategyError::from)
}

fn room_id_from(body: &Value, paths: &[&[&str]]) -> Option<String> {
	paths
		.iter()
		.filter_map(|path| json_string_at(body, path))
		.find(|value| plausible_room_id(value))
}

/// Primary platform API: the live-room lookup keyed by handle.
pub struct PrimaryApiStrategy {
	client: reqwest::Client,
	host: String,
}

impl PrimaryApiStrategy {
	pub fn new(client: reqwest::Client, host: impl Into<String>) -> Self {
		Self {
			client,
			host: host.into(),
		}
	}
}

#[async_trait]
impl ResolveStrategy for PrimaryApiStrategy {
	fn name(&self) -> &'static str {
		"primaryApi"
	}

	async fn resolve(&self, handle: &str, _cx: &StrategyContext<'_>) -> Result<String, StrategyError> {
		let url = format!("https://{}/api-live/user/room/?aid=1988&uniqueId={handle}", self.host);
		let body = fetch_json(&self.client, &url).await?;

		if let Some(status) = body.pointer("/data/user/status").and_then(Value::as_u64) {
			if status == ROOM_STATUS_OFFLINE {
				return Err(StrategyError::new(ErrorCategory::NotLive, "room status reports the broadcaster offline"));
			}
		}

		match room_id_from(&body, &[&["data", "user", "roomId"], &["data", "roomId"]]) {
			Some(room_id) => {
				debug!(target = "livelink.resolver", handle, room_id, "primary api matched");
				Ok(room_id)
			}
			None => Err(StrategyError::new(ErrorCategory::Unknown, "room id missing from primary api response")),
		}
	}
}

/// Secondary platform API: the live-detail endpoint, a different code
/// path upstream that tends to survive when the primary one degrades.
pub struct SecondaryApiStrategy {
	client: reqwest::Client,
	host: String,
}

impl SecondaryApiStrategy {
	pub fn new(client: reqwest::Client, host: impl Into<String>) -> Self {
		Self {
			client,
			host: host.into(),
		}
	}
}

#[async_trait]
impl ResolveStrategy for SecondaryApiStrategy {
	fn name(&self) -> &'static str {
		"secondaryApi"
	}

	async fn resolve(&self, handle: &str, _cx: &StrategyContext<'_>) -> Result<String, StrategyError> {
		let url = format!("https://{}/api/live/detail/?aid=1988&uniqueId={handle}", self.host);
		let body = fetch_json(&self.client, &url).await?;

		match room_id_from(&body, &[&["LiveRoomInfo", "roomId"], &["data", "liveRoom", "roomId"]]) {
			Some(room_id) => {
				debug!(target = "livelink.resolver", handle, room_id, "secondary api matched");
				Ok(room_id)
			}
			None => Err(StrategyError::new(ErrorCategory::Unknown, "room id missing from live-detail response")),
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn room_id_accepts_first_plausible_path() {
		let body = json!({"data": {"user": {"roomId": "7123456789"}, "roomId": "999"}});
		let found = room_id_from(&body, &[&["data", "user", "roomId"], &["data", "roomId"]]);
		assert_eq!(found.as_deref(), Some("7123456789"));
	}

	#[test]
	fn implausible_path_values_are_skipped() {
		let body = json!({"data": {"user": {"roomId": "n/a"}, "roomId": 7123456789_u64}});
		let found = room_id_from(&body, &[&["data", "user", "roomId"], &["data", "roomId"]]);
		assert_eq!(found.as_deref(), Some("7123456789"));
	}
}
