use std::sync::Arc;

use super::guard::{CursorGuard, CursorStatus};
use crate::config::MIN_SPLITTABLE_SIZE;
use crate::proxy::ProxyCore;
use crate::{Result, StorageError};

type ElementFn<T> = Arc<dyn Fn(u64) -> Result<T> + Send + Sync>;
type SizeFn = Arc<dyn Fn() -> Result<u64> + Send + Sync>;

/// Fail-fast cursor over a position range `[origin, fence)` that can be split for parallel
/// traversal.
///
/// An open fence is resolved to the live size on the first operation, which also captures the
/// modification baseline. [`SplittableCursor::try_split`] hands the lower half to a new cursor
/// sharing that baseline, so a single structural modification fails every fragment.
pub struct SplittableCursor<T> {
	guard: CursorGuard,
	origin: u64,
	fence: Option<u64>,
	min_split: u64,
	element_at: ElementFn<T>,
	live_size: SizeFn,
}

impl<T> SplittableCursor<T> {
	/// Fails with [`StorageError::InvalidArgument`] if `origin` is past a given `fence`.
	pub(crate) fn new(
		source: Arc<ProxyCore>,
		origin: u64,
		fence: Option<u64>,
		element_at: impl Fn(u64) -> Result<T> + Send + Sync + 'static,
		live_size: impl Fn() -> Result<u64> + Send + Sync + 'static,
	) -> Result<Self> {
		if let Some(fence) = fence
			&& origin > fence
		{
			return Err(StorageError::InvalidArgument(format!("origin {origin} is past fence {fence}")));
		}
		let min_split = source.scope().config().cursor.min_splittable_size.max(MIN_SPLITTABLE_SIZE);
		Ok(Self {
			guard: CursorGuard::new(source),
			origin,
			fence,
			min_split,
			element_at: Arc::new(element_at),
			live_size: Arc::new(live_size),
		})
	}

	pub fn status(&self) -> CursorStatus {
		self.guard.status()
	}

	/// Tracker value captured at bind time, if bound.
	pub fn baseline(&self) -> Option<u64> {
		self.guard.baseline()
	}

	/// Splits off the lower half of the remaining range.
	///
	/// With `size = fence - origin` and `mid = origin + size / 2`, the returned cursor covers
	/// `[origin, mid)` and this one keeps `[mid, fence)`. Returns `None` below the minimum
	/// splittable size.
	pub fn try_split(&mut self) -> Result<Option<Self>> {
		let fence = self.bind()?;
		let size = fence - self.origin;
		if size < self.min_split {
			return Ok(None);
		}
		let mid = self.origin + size / 2;
		let lower = Self {
			guard: self.guard.clone(),
			origin: self.origin,
			fence: Some(mid),
			min_split: self.min_split,
			element_at: self.element_at.clone(),
			live_size: self.live_size.clone(),
		};
		self.origin = mid;
		Ok(Some(lower))
	}

	/// Feeds the next element to `action`. Returns false once the range is drained.
	pub fn try_advance(&mut self, action: impl FnOnce(T)) -> Result<bool> {
		let fence = self.bind()?;
		if self.origin >= fence {
			self.guard.exhaust();
			return Ok(false);
		}
		let value = (self.element_at)(self.origin)?;
		self.origin += 1;
		action(value);
		Ok(true)
	}

	/// Feeds every remaining element to `action`, stopping at the first failure.
	pub fn for_each_remaining(&mut self, mut action: impl FnMut(T)) -> Result<()> {
		while self.try_advance(&mut action)? {}
		Ok(())
	}

	/// Exact number of remaining elements.
	pub fn estimate_size(&mut self) -> Result<u64> {
		let fence = self.bind()?;
		Ok(fence - self.origin)
	}

	/// Checks liveness and modification, resolving the fence on first use. Returns the fence.
	fn bind(&mut self) -> Result<u64> {
		let origin = self.origin;
		let fence = &mut self.fence;
		let live_size = &self.live_size;
		self.guard.enter(|| {
			let size = live_size()?;
			let end = fence.unwrap_or(size);
			if origin > size {
				return Err(StorageError::IndexOutOfBounds { index: origin, len: size });
			}
			if end > size {
				return Err(StorageError::IndexOutOfBounds { index: end, len: size });
			}
			*fence = Some(end);
			Ok(())
		})?;
		Ok(self.fence.unwrap_or(self.origin))
	}
}

impl<T> Iterator for SplittableCursor<T> {
	type Item = Result<T>;

	fn next(&mut self) -> Option<Self::Item> {
		let mut next = None;
		match self.try_advance(|value| next = Some(value)) {
			Ok(_) => next.map(Ok),
			Err(err) => Some(Err(err)),
		}
	}
}

impl<T> std::fmt::Debug for SplittableCursor<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SplittableCursor")
			.field("guard", &self.guard)
			.field("origin", &self.origin)
			.field("fence", &self.fence)
			.field("min_split", &self.min_split)
			.finish_non_exhaustive()
	}
}
