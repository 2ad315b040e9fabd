//! Injected lifecycle manager for teardown hooks.
//!
//! Replaces the process-wide shutdown-registration flag of older
//! designs: each component registers its cleanup hook against an owned
//! registry instance, and registration/deregistration are idempotent
//! per handle.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::debug;

type Hook = Box<dyn FnOnce() + Send>;

/// Token returned by [`CleanupRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupHandle(u64);

/// Registry of one-shot cleanup hooks, run in registration order.
#[derive(Default)]
pub struct CleanupRegistry {
	hooks: Mutex<BTreeMap<u64, Hook>>,
	next_id: AtomicU64,
}

impl CleanupRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a hook; the returned handle deregisters it.
	pub fn register(&self, hook: impl FnOnce() + Send + 'static) -> CleanupHandle {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		self.hooks.lock().insert(id, Box::new(hook));
		CleanupHandle(id)
	}

	/// Removes a hook without running it. Safe to call more than once.
	pub fn deregister(&self, handle: CleanupHandle) {
		self.hooks.lock().remove(&handle.0);
	}

	/// Runs and drains every registered hook, oldest first. Idempotent:
	/// a second call is a no-op unless new hooks were registered.
	pub fn run_all(&self) {
		let hooks = std::mem::take(&mut *self.hooks.lock());
		let count = hooks.len();
		for (_, hook) in hooks {
			hook();
		}
		if count > 0 {
			debug!(target = "livelink.lifecycle", count, "cleanup hooks ran");
		}
	}

	/// Number of currently registered hooks.
	pub fn len(&self) -> usize {
		self.hooks.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.hooks.lock().is_empty()
	}
}
