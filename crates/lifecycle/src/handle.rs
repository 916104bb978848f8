use std::sync::atomic::{AtomicBool, Ordering};

use tether_primitives::HandleId;

use crate::LifecycleError;

/// A native object id plus its liveness flag.
///
/// The flag starts out true for any non-zero id and flips to false exactly once, when the owning
/// destructor runs. Every proxy operation goes through [`NativeHandle::get`], so an id is never
/// passed back to the native library after disposal.
#[derive(Debug)]
pub struct NativeHandle {
	id: HandleId,
	valid: AtomicBool,
}

impl NativeHandle {
	/// Wraps an id returned by a native constructor.
	pub fn new(id: HandleId) -> Self {
		Self {
			id,
			valid: AtomicBool::new(id.is_valid()),
		}
	}

	/// Returns the id if the handle is still live.
	pub fn get(&self) -> Result<HandleId, LifecycleError> {
		if self.is_valid() {
			Ok(self.id)
		} else {
			Err(LifecycleError::UseAfterFree { handle: self.id })
		}
	}

	/// Returns true until the handle is invalidated.
	pub fn is_valid(&self) -> bool {
		self.valid.load(Ordering::Acquire)
	}

	/// Returns the id regardless of liveness, for diagnostics only.
	pub const fn id(&self) -> HandleId {
		self.id
	}

	/// Marks the handle as disposed.
	///
	/// Returns the id only to the first caller; later calls (and calls on a handle that was never
	/// valid) return `None`.
	pub fn invalidate(&self) -> Option<HandleId> {
		self.valid.swap(false, Ordering::AcqRel).then_some(self.id)
	}
}

impl std::fmt::Display for NativeHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = if self.is_valid() { "valid" } else { "closed" };
		write!(f, "{} ({state})", self.id)
	}
}
