use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-scope structural modification counter.
///
/// Every proxy and cursor of a scope holds a clone of the same tracker, so a mutation made through
/// any proxy is visible to every cursor at once. Detection is optimistic: it is exact for
/// sequential interleavings on one thread, while concurrent mutation from other threads during
/// iteration is outside the guarantee and may go unnoticed for a step.
#[derive(Debug, Default, Clone)]
pub struct ModificationTracker {
	counter: Arc<AtomicU64>,
}

impl ModificationTracker {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn current_value(&self) -> u64 {
		self.counter.load(Ordering::Acquire)
	}

	/// Records a structural modification.
	pub fn notify_modified(&self) {
		// fetch_add wraps; a 64-bit counter cannot wrap within one scope's lifetime.
		self.counter.fetch_add(1, Ordering::AcqRel);
	}

	/// Returns true iff the counter differs from `captured`.
	pub fn is_modified_since(&self, captured: u64) -> bool {
		self.current_value() != captured
	}

	/// Returns true if both trackers share one counter.
	pub fn shares_counter_with(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.counter, &other.counter)
	}
}
