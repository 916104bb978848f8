use std::sync::Arc;

use tether_lifecycle::{NativeHandle, ProxyDestructor};
use tether_native::{IterMode, NativeItem};
use tracing::{trace, warn};

use super::guard::{CursorGuard, CursorStatus, Fault};
use crate::proxy::ProxyCore;
use crate::{Result, StorageError};

type DecodeFn<T> = Box<dyn Fn(NativeItem) -> Result<T> + Send + Sync>;

/// Fail-fast forward cursor over an index, backed by a native iterator.
///
/// The native iterator is opened and the modification baseline captured on the first pull.
/// Once bound, a pull after any structural modification of the scope fails with
/// [`StorageError::ConcurrentModification`], and every later pull fails the same way. Draining
/// the cursor releases the native iterator; so do [`SequenceCursor::close`] and drop.
pub struct SequenceCursor<T> {
	guard: CursorGuard,
	mode: IterMode,
	native: Option<ProxyDestructor>,
	decode: DecodeFn<T>,
}

impl<T> SequenceCursor<T> {
	pub(crate) fn new(source: Arc<ProxyCore>, mode: IterMode, decode: impl Fn(NativeItem) -> Result<T> + Send + Sync + 'static) -> Self {
		Self {
			guard: CursorGuard::new(source),
			mode,
			native: None,
			decode: Box::new(decode),
		}
	}

	pub fn status(&self) -> CursorStatus {
		self.guard.status()
	}

	/// Tracker value captured at bind time, if bound.
	pub fn baseline(&self) -> Option<u64> {
		self.guard.baseline()
	}

	/// Releases the native iterator. Idempotent.
	///
	/// A drained cursor stays drained; any other cursor fails every later pull with
	/// [`StorageError::UseAfterFree`].
	pub fn close(&mut self) -> Result<()> {
		if matches!(self.guard.status(), CursorStatus::Unbound | CursorStatus::Bound) {
			let resource = format!("closed cursor over {}", self.guard.source().describe());
			self.guard.poison(Fault::UseAfterFree { resource });
		}
		self.release()
	}

	fn release(&mut self) -> Result<()> {
		let Some(native) = self.native.take() else {
			return Ok(());
		};
		trace!(address = %self.guard.source().address(), "Releasing native iterator");
		native.clean().map_err(|source| {
			let core = self.guard.source();
			StorageError::clean_failure(core.scope().cleaner().id(), format!("iterator over {}", core.describe()), source)
		})
	}

	fn open_native(&self) -> Result<ProxyDestructor> {
		let source = self.guard.source();
		let index = source.native()?;
		let backend = source.backend().clone();
		let id = backend.iter_open(index, self.mode)?;
		let destructor = ProxyDestructor::new_registered(
			&source.scope().index_cleaner(),
			Arc::new(NativeHandle::new(id)),
			"iterator",
			move |id| backend.iter_dispose(id).map_err(Into::into),
		)?;
		trace!(address = %source.address(), iterator = %id, mode = ?self.mode, "Opened native iterator");
		Ok(destructor)
	}

	fn pull(&mut self) -> Result<Option<T>> {
		if !self.guard.enter(|| Ok(()))? {
			return Ok(None);
		}
		let handle = match &self.native {
			Some(native) => native.handle().clone(),
			None => {
				let native = self.open_native()?;
				let handle = native.handle().clone();
				self.native = Some(native);
				handle
			}
		};
		let Ok(iter) = handle.get() else {
			let resource = format!("iterator over {}", self.guard.source().describe());
			return Err(self.guard.poison(Fault::UseAfterFree { resource }));
		};
		match self.guard.source().backend().iter_next(iter)? {
			Some(item) => (self.decode)(item).map(Some),
			None => {
				self.guard.exhaust();
				self.release()?;
				Ok(None)
			}
		}
	}
}

impl<T> Iterator for SequenceCursor<T> {
	type Item = Result<T>;

	fn next(&mut self) -> Option<Self::Item> {
		self.pull().transpose()
	}
}

impl<T> Drop for SequenceCursor<T> {
	fn drop(&mut self) {
		if let Err(err) = self.release() {
			warn!(address = %self.guard.source().address(), error = %err, "Failed to release native iterator");
		}
	}
}

impl<T> std::fmt::Debug for SequenceCursor<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SequenceCursor")
			.field("guard", &self.guard)
			.field("mode", &self.mode)
			.field("native", &self.native)
			.finish_non_exhaustive()
	}
}
