//! Markup-scrape resolution strategy.
//!
//! Scrapes the broadcaster's public live page. The page structure
//! drifts often, so extraction applies several independent script
//! patterns and several candidate data paths, succeeding when any
//! combination yields a plausible room id. Requests carry realistic
//! client-identification headers to reduce the chance of being blocked.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex_lite::Regex;
use serde_json::Value;
use tracing::{debug, trace};

use super::json_string_at;
use super::strategy::{ResolveStrategy, StrategyContext, StrategyError, plausible_room_id};
use crate::error::ErrorCategory;

/// Script blobs known to embed the room state as JSON.
static SCRIPT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
	[
		r#"(?s)<script id="SIGI_STATE"[^>]*>(.*?)</script>"#,
		r#"(?s)<script id="__UNIVERSAL_DATA_FOR_REHYDRATION__"[^>]*>(.*?)</script>"#,
	]
	.into_iter()
	.map(|p| Regex::new(p).expect("script pattern must compile"))
	.collect()
});

/// Candidate locations of the room id inside the embedded state.
const CANDIDATE_PATHS: &[&[&str]] = &[
	&["LiveRoom", "liveRoomUserInfo", "user", "roomId"],
	&["__DEFAULT_SCOPE__", "webapp.live-detail", "liveRoomUserInfo", "user", "roomId"],
	&["CurrentRoom", "roomId"],
];

/// Last-resort patterns applied to the raw markup.
static DIRECT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
	[r#""roomId":"(\d{5,30})""#, r#""room_id":"?(\d{5,30})"#, r#"room_id=(\d{5,30})"#]
		.into_iter()
		.map(|p| Regex::new(p).expect("direct pattern must compile"))
		.collect()
});

/// Markers of a loaded-but-offline live page.
const OFFLINE_MARKERS: &[&str] = &[r#""status":4"#, "LiveRoomOffline"];

/// Extracts a plausible room id from live-page markup, if any pattern
/// and path combination matches.
pub fn extract_room_id(html: &str) -> Option<String> {
	for pattern in SCRIPT_PATTERNS.iter() {
		for captures in pattern.captures_iter(html) {
			let Some(blob) = captures.get(1) else { continue };
			let Ok(state) = serde_json::from_str::<Value>(blob.as_str()) else {
				trace!(target = "livelink.resolver", "script blob is not valid JSON; next pattern");
				continue;
			};
			for path in CANDIDATE_PATHS {
				if let Some(value) = json_string_at(&state, path) {
					if plausible_room_id(&value) {
						return Some(value);
					}
				}
			}
		}
	}

	for pattern in DIRECT_PATTERNS.iter() {
		if let Some(captures) = pattern.captures(html) {
			let value = captures.get(1)?.as_str().to_string();
			if plausible_room_id(&value) {
				return Some(value);
			}
		}
	}

	None
}

/// Whether the markup indicates the broadcaster is not currently live.
pub fn detect_offline(html: &str) -> bool {
	OFFLINE_MARKERS.iter().any(|marker| html.contains(marker))
}

/// Headers a mainstream browser would send.
pub(crate) fn browser_headers(host: &str) -> reqwest::header::HeaderMap {
	use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER, USER_AGENT};
	let mut headers = HeaderMap::new();
	headers.insert(
		USER_AGENT,
		HeaderValue::from_static(
			"Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
		),
	);
	headers.insert(
		ACCEPT,
		HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
	);
	headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
	if let Ok(referer) = HeaderValue::from_str(&format!("https://{host}/")) {
		headers.insert(REFERER, referer);
	}
	headers
}

/// Live-page scrape strategy.
pub struct MarkupScrapeStrategy {
	client: reqwest::Client,
	host: String,
}

impl MarkupScrapeStrategy {
	pub fn new(client: reqwest::Client, host: impl Into<String>) -> Self {
		Self {
			client,
			host: host.into(),
		}
	}
}

#[async_trait]
impl ResolveStrategy for MarkupScrapeStrategy {
	fn name(&self) -> &'static str {
		"markupScrape"
	}

	async fn resolve(&self, handle: &str, _cx: &StrategyContext<'_>) -> Result<String, StrategyError> {
		let url = format!("https://{}/@{}/live", self.host, handle);
		let response = self.client.get(&url).send().await.map_err(StrategyError::from)?;
		let status = response.status();
		if !status.is_success() {
			return Err(StrategyError::new(
				ErrorCategory::from_status(status.as_u16()),
				format!("live page returned {status}"),
			));
		}
		let html = response.text().await.map_err(StrategyError::from)?;
		if detect_offline(&html) {
			return Err(StrategyError::new(ErrorCategory::NotLive, "live page reports the broadcaster offline"));
		}
		match extract_room_id(&html) {
			Some(room_id) => {
				debug!(target = "livelink.resolver", handle, room_id, "markup scrape matched");
				Ok(room_id)
			}
			None => Err(StrategyError::new(
				ErrorCategory::RoomNotFound,
				"no extraction pattern matched the live page markup",
			)),
		}
	}
}
