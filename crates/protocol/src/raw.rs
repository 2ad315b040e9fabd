//! Upstream payload shapes, as observed on the wire.
//!
//! The platform tags every frame with a `type` field and is loose about
//! everything else: identifiers arrive as strings or numbers, booleans as
//! `0`/`1`, and field names drift between camelCase and snake_case
//! between app versions. All of that tolerance lives here, once, so the
//! rest of the engine only ever sees one shape per message type.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Outer frame: a `type` tag plus a type-specific body.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEnvelope {
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(flatten)]
	pub body: Value,
}

impl RawEnvelope {
	/// Parses an envelope from a raw text frame.
	pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
		serde_json::from_str(text)
	}
}

/// Sender identity fields, flattened into most message bodies.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUser {
	#[serde(default, alias = "user_id", deserialize_with = "opt_string_or_number")]
	pub user_id: Option<String>,
	#[serde(default, alias = "unique_id")]
	pub unique_id: Option<String>,
	#[serde(default, alias = "nick_name")]
	pub nickname: Option<String>,
	#[serde(default, alias = "profile_picture_url", alias = "profilePicture")]
	pub profile_picture_url: Option<String>,
}

/// `chat` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChat {
	#[serde(flatten)]
	pub user: RawUser,
	pub comment: String,
	#[serde(default, alias = "create_time", deserialize_with = "opt_epoch")]
	pub create_time: Option<i64>,
}

/// `gift` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGift {
	#[serde(flatten)]
	pub user: RawUser,
	#[serde(alias = "gift_id")]
	pub gift_id: u64,
	#[serde(default, alias = "gift_name")]
	pub gift_name: Option<String>,
	#[serde(default, alias = "diamond_count")]
	pub diamond_count: u32,
	#[serde(default = "one", alias = "repeat_count")]
	pub repeat_count: u32,
	#[serde(default, alias = "repeat_end", deserialize_with = "loose_bool")]
	pub repeat_end: bool,
	/// Upstream gift class; `1` marks a streakable gift.
	#[serde(default, alias = "gift_type")]
	pub gift_type: u8,
	#[serde(default, alias = "create_time", deserialize_with = "opt_epoch")]
	pub create_time: Option<i64>,
}

impl RawGift {
	pub fn streakable(&self) -> bool {
		self.gift_type == 1
	}
}

/// `follow` and `share` bodies share one shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSocial {
	#[serde(flatten)]
	pub user: RawUser,
	#[serde(default, alias = "create_time", deserialize_with = "opt_epoch")]
	pub create_time: Option<i64>,
}

/// `like` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLike {
	#[serde(flatten)]
	pub user: RawUser,
	#[serde(default = "one", alias = "like_count")]
	pub like_count: u32,
	#[serde(default, alias = "total_like_count")]
	pub total_like_count: Option<u64>,
	#[serde(default, alias = "create_time", deserialize_with = "opt_epoch")]
	pub create_time: Option<i64>,
}

/// `subscribe` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSubscribe {
	#[serde(flatten)]
	pub user: RawUser,
	#[serde(default, alias = "sub_month", alias = "subMonth")]
	pub months: Option<u32>,
	#[serde(default, alias = "create_time", deserialize_with = "opt_epoch")]
	pub create_time: Option<i64>,
}

/// `member` (viewer join) body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMember {
	#[serde(flatten)]
	pub user: RawUser,
	#[serde(default, alias = "create_time", deserialize_with = "opt_epoch")]
	pub create_time: Option<i64>,
}

/// `roomUser` (viewer count) body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRoomUser {
	#[serde(default, alias = "viewer_count")]
	pub viewer_count: u64,
	#[serde(default, alias = "create_time", deserialize_with = "opt_epoch")]
	pub create_time: Option<i64>,
}

/// `roomInfo` session metadata body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRoomInfo {
	#[serde(default, alias = "create_time", deserialize_with = "opt_epoch")]
	pub create_time: Option<i64>,
	#[serde(default)]
	pub title: Option<String>,
}

/// `streamEnd` control body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStreamEnd {
	#[serde(default)]
	pub action: Option<u32>,
}

fn one() -> u32 {
	1
}

/// Accepts a JSON string or number and yields its string form.
fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	let value = Option::<Value>::deserialize(deserializer)?;
	Ok(match value {
		Some(Value::String(s)) => Some(s),
		Some(Value::Number(n)) => Some(n.to_string()),
		_ => None,
	})
}

/// Accepts `true`/`false`, `1`/`0`, or a numeric string.
fn loose_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
	D: Deserializer<'de>,
{
	let value = Option::<Value>::deserialize(deserializer)?;
	Ok(match value {
		Some(Value::Bool(b)) => b,
		Some(Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
		Some(Value::String(s)) => s == "1" || s.eq_ignore_ascii_case("true"),
		_ => false,
	})
}

/// Accepts epoch seconds or milliseconds; normalizes to seconds.
fn opt_epoch<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
	D: Deserializer<'de>,
{
	let value = Option::<Value>::deserialize(deserializer)?;
	let raw = match value {
		Some(Value::Number(n)) => n.as_i64(),
		Some(Value::String(s)) => s.parse::<i64>().ok(),
		_ => None,
	};
	Ok(raw.map(|ts| if ts > 100_000_000_000 { ts / 1000 } else { ts }))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn envelope_splits_type_from_body() {
		let env = RawEnvelope::from_json(r#"{"type":"chat","comment":"hi","uniqueId":"alice"}"#).unwrap();
		assert_eq!(env.kind, "chat");
		let chat: RawChat = serde_json::from_value(env.body).unwrap();
		assert_eq!(chat.comment, "hi");
		assert_eq!(chat.user.unique_id.as_deref(), Some("alice"));
	}

	#[test]
	fn user_id_tolerates_numbers_and_snake_case() {
		let chat: RawChat =
			serde_json::from_str(r#"{"user_id":71234,"nick_name":"Alice","comment":"yo"}"#).unwrap();
		assert_eq!(chat.user.user_id.as_deref(), Some("71234"));
		assert_eq!(chat.user.nickname.as_deref(), Some("Alice"));
	}

	#[test]
	fn gift_flags_tolerate_numeric_booleans() {
		let gift: RawGift = serde_json::from_str(
			r#"{"giftId":5655,"diamondCount":1,"repeatCount":3,"repeatEnd":1,"giftType":1}"#,
		)
		.unwrap();
		assert!(gift.repeat_end);
		assert!(gift.streakable());
		assert_eq!(gift.repeat_count, 3);
	}

	#[test]
	fn epoch_millis_normalize_to_seconds() {
		let like: RawLike =
			serde_json::from_str(r#"{"likeCount":5,"createTime":1712345678000}"#).unwrap();
		assert_eq!(like.create_time, Some(1_712_345_678));
	}

	#[test]
	fn missing_repeat_count_defaults_to_one() {
		let gift: RawGift = serde_json::from_str(r#"{"giftId":1,"diamondCount":10}"#).unwrap();
		assert_eq!(gift.repeat_count, 1);
		assert!(!gift.repeat_end);
		assert!(!gift.streakable());
	}
}
