//! Live-connection resilience engine.
//!
//! Connects to a broadcaster's live session on an external platform and
//! keeps that connection useful: room-id resolution with a strategy
//! cascade and caching ([`resolver`]), session supervision with bounded
//! automatic reconnects ([`supervisor`]), event normalization and
//! deduplication, per-session stats with stream-start inference, and a
//! bounded diagnostics history ([`diagnostics`]).
//!
//! Wire-shaped and canonical event types live in `livelink-protocol`;
//! this crate owns all behavior.

pub mod backoff;
pub mod config;
pub mod credentials;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod resolver;
pub mod supervisor;
pub mod transport;

pub use config::{InMemorySettings, ResolverConfig, SettingsStore, SupervisorConfig};
pub use credentials::{Credential, CredentialSource, resolve_credential};
pub use diagnostics::{ConnectionAttemptRecord, DiagnosticsRecorder, DiagnosticsSnapshot, HealthStatus};
pub use error::{ErrorCategory, LiveError, ResolutionError, Result};
pub use events::EventBus;
pub use lifecycle::{CleanupHandle, CleanupRegistry};
pub use resolver::{ResolveOptions, RoomResolver};
pub use supervisor::{ConnectOptions, ConnectionState, ConnectionSupervisor};
pub use transport::{SessionTarget, Transport, TransportConnector, TransportMode, WsConnector};
