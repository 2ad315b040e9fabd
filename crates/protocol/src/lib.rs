//! Wire and canonical event types for the livelink engine.
//!
//! This crate contains the serde-serializable types shared between the
//! connection engine and its consumers. Two layers live here:
//!
//! * `raw` — the shapes of upstream platform payloads as they appear on
//!   the wire, tolerant of the field synonyms the platform is known to
//!   emit. Validated once, at ingestion.
//! * `events` — the canonical, tagged event schema published to
//!   subscribers. One stable shape per event type; downstream code never
//!   probes for optional field spellings.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization
//! * Canonical: One schema per event type, decided at the normalization
//!   boundary
//! * Stable: Changes only when the published event contract changes
//!
//! The engine itself lives in the `livelink` crate.

pub mod events;
pub mod raw;
pub mod stats;

pub use events::*;
pub use raw::*;
pub use stats::*;
