//! Raw platform frames → canonical events.
//!
//! Every inbound envelope is validated and mapped here, once. Unknown
//! message kinds are ignored (logged at trace), malformed bodies are
//! surfaced as [`Normalized::Invalid`] so the session loop can log them
//! without publishing anything speculative downstream.

use chrono::{DateTime, Utc};
use livelink_protocol::{
	Actor, CanonicalEvent, ChatEvent, FollowEvent, GiftEvent, LikeEvent, MemberEvent, RawChat, RawEnvelope, RawGift,
	RawLike, RawMember, RawRoomInfo, RawRoomUser, RawSocial, RawStreamEnd, RawSubscribe, RawUser, ShareEvent,
	SubscribeEvent, ViewerCountEvent,
};

/// Coin multiplier applied to a gift's diamond value.
const COINS_PER_DIAMOND: u64 = 2;

/// Outcome of normalizing one envelope.
#[derive(Debug)]
pub enum Normalized {
	/// A publishable canonical event.
	Event(CanonicalEvent),
	/// Session metadata carrying a possible stream start time.
	RoomInfo(RawRoomInfo),
	/// The broadcaster ended the stream.
	StreamEnd,
	/// Recognized but deliberately unpublished kind.
	Ignored(String),
	/// Recognized kind with a malformed body.
	Invalid { kind: String, error: String },
}

/// Normalizes one envelope. `now` anchors events that carry no usable
/// timestamp; `floor` rejects implausibly old upstream timestamps.
pub fn normalize(envelope: RawEnvelope, now: DateTime<Utc>, floor: DateTime<Utc>) -> Normalized {
	let kind = envelope.kind;
	let body = envelope.body;

	macro_rules! parse {
		($ty:ty) => {
			match serde_json::from_value::<$ty>(body) {
				Ok(parsed) => parsed,
				Err(e) => {
					return Normalized::Invalid {
						kind: kind.clone(),
						error: e.to_string(),
					};
				}
			}
		};
	}

	match kind.as_str() {
		"chat" => {
			let raw = parse!(RawChat);
			Normalized::Event(CanonicalEvent::Chat(ChatEvent {
				actor: actor_from(&raw.user),
				message: raw.comment,
				timestamp: event_time(raw.create_time, now, floor),
			}))
		}
		"gift" => {
			let raw = parse!(RawGift);
			let coins = u64::from(raw.diamond_count) * COINS_PER_DIAMOND * u64::from(raw.repeat_count);
			Normalized::Event(CanonicalEvent::Gift(GiftEvent {
				actor: actor_from(&raw.user),
				gift_id: raw.gift_id,
				gift_name: raw.gift_name.clone(),
				diamond_value: raw.diamond_count,
				repeat_count: raw.repeat_count,
				streakable: raw.streakable(),
				streak_end: raw.repeat_end,
				coins,
				timestamp: event_time(raw.create_time, now, floor),
			}))
		}
		"follow" => {
			let raw = parse!(RawSocial);
			Normalized::Event(CanonicalEvent::Follow(FollowEvent {
				actor: actor_from(&raw.user),
				timestamp: event_time(raw.create_time, now, floor),
			}))
		}
		"share" => {
			let raw = parse!(RawSocial);
			Normalized::Event(CanonicalEvent::Share(ShareEvent {
				actor: actor_from(&raw.user),
				timestamp: event_time(raw.create_time, now, floor),
			}))
		}
		"like" => {
			let raw = parse!(RawLike);
			Normalized::Event(CanonicalEvent::Like(LikeEvent {
				actor: actor_from(&raw.user),
				count: raw.like_count,
				total_likes: raw.total_like_count,
				timestamp: event_time(raw.create_time, now, floor),
			}))
		}
		"subscribe" => {
			let raw = parse!(RawSubscribe);
			Normalized::Event(CanonicalEvent::Subscribe(SubscribeEvent {
				actor: actor_from(&raw.user),
				months: raw.months,
				timestamp: event_time(raw.create_time, now, floor),
			}))
		}
		"member" => {
			let raw = parse!(RawMember);
			Normalized::Event(CanonicalEvent::Member(MemberEvent {
				actor: actor_from(&raw.user),
				timestamp: event_time(raw.create_time, now, floor),
			}))
		}
		"roomUser" | "viewerCount" => {
			let raw = parse!(RawRoomUser);
			Normalized::Event(CanonicalEvent::ViewerCount(ViewerCountEvent {
				viewers: raw.viewer_count,
				timestamp: event_time(raw.create_time, now, floor),
			}))
		}
		"roomInfo" => Normalized::RoomInfo(parse!(RawRoomInfo)),
		"streamEnd" => {
			let _ = parse!(RawStreamEnd);
			Normalized::StreamEnd
		}
		_ => Normalized::Ignored(kind.clone()),
	}
}

fn actor_from(user: &RawUser) -> Actor {
	let user_id = user
		.user_id
		.clone()
		.or_else(|| user.unique_id.clone())
		.unwrap_or_else(|| "unknown".to_string());
	let handle = user.unique_id.clone().unwrap_or_else(|| user_id.clone());
	let display_name = user.nickname.clone().unwrap_or_else(|| handle.clone());
	Actor {
		user_id,
		handle,
		display_name,
		avatar_url: user.profile_picture_url.clone(),
	}
}

/// Upstream timestamp when plausible, otherwise `now`.
fn event_time(create_time: Option<i64>, now: DateTime<Utc>, floor: DateTime<Utc>) -> DateTime<Utc> {
	match create_time.and_then(|secs| DateTime::from_timestamp(secs, 0)) {
		Some(ts) if ts >= floor && ts <= now + chrono::Duration::minutes(5) => ts,
		_ => now,
	}
}
