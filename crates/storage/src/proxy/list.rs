use std::borrow::Borrow;
use std::sync::Arc;

use tether_native::IterMode;
use tether_primitives::IndexKind;

use super::{ProxyCore, StorageIndex};
use crate::codec::Codec;
use crate::cursor::{ParallelSequence, SequenceCursor, SplittableCursor, decode_value};
use crate::{Result, StorageError};

/// Proxy to a native list: a sequence of `T` addressed by position.
pub struct ListProxy<T> {
	core: Arc<ProxyCore>,
	codec: Arc<dyn Codec<T>>,
}

impl<T> Clone for ListProxy<T> {
	fn clone(&self) -> Self {
		Self {
			core: self.core.clone(),
			codec: self.codec.clone(),
		}
	}
}

impl<T: Send + Sync + 'static> StorageIndex for ListProxy<T> {
	const KIND: IndexKind = IndexKind::List;

	fn core(&self) -> &Arc<ProxyCore> {
		&self.core
	}
}

impl<T: Send + Sync + 'static> ListProxy<T> {
	pub(crate) fn new(core: Arc<ProxyCore>, codec: Arc<dyn Codec<T>>) -> Self {
		Self { core, codec }
	}

	/// Appends `value` to the end of the list.
	pub fn push(&self, value: &T) -> Result<()> {
		let bytes = self.codec.encode(value)?;
		let native = self.core.native_for_write()?;
		self.core.backend().list_push(native, bytes)?;
		Ok(())
	}

	/// Appends every value, in order. Nothing is written if any value fails to encode.
	pub fn extend<I>(&self, values: I) -> Result<()>
	where
		I: IntoIterator,
		I::Item: Borrow<T>,
	{
		let encoded = values
			.into_iter()
			.map(|value| self.codec.encode(value.borrow()))
			.collect::<Result<Vec<_>, _>>()?;
		let native = self.core.native_for_write()?;
		let backend = self.core.backend();
		for bytes in encoded {
			backend.list_push(native, bytes)?;
		}
		Ok(())
	}

	/// Returns the element at `index`.
	pub fn get(&self, index: u64) -> Result<T> {
		let native = self.core.native()?;
		let backend = self.core.backend();
		match backend.list_get(native, index)? {
			Some(bytes) => Ok(self.codec.decode(&bytes)?),
			None => Err(StorageError::IndexOutOfBounds {
				index,
				len: backend.list_len(native)?,
			}),
		}
	}

	/// Replaces the element at `index`.
	pub fn set(&self, index: u64, value: &T) -> Result<()> {
		let bytes = self.codec.encode(value)?;
		let len = self.len()?;
		if index >= len {
			return Err(StorageError::IndexOutOfBounds { index, len });
		}
		let native = self.core.native_for_write()?;
		self.core.backend().list_set(native, index, bytes)?;
		Ok(())
	}

	pub fn last(&self) -> Result<Option<T>> {
		match self.len()? {
			0 => Ok(None),
			len => self.get(len - 1).map(Some),
		}
	}

	/// Removes and returns the last element.
	///
	/// Fails with [`StorageError::NoSuchElement`] on an empty list.
	pub fn remove_last(&self) -> Result<T> {
		let native = self.core.native_for_write()?;
		match self.core.backend().list_pop(native)? {
			Some(bytes) => Ok(self.codec.decode(&bytes)?),
			None => Err(StorageError::NoSuchElement(self.core.describe())),
		}
	}

	/// Shortens the list to `len` elements. Does nothing if it is not longer than that.
	pub fn truncate(&self, len: u64) -> Result<()> {
		let native = self.core.native_for_write()?;
		self.core.backend().list_truncate(native, len)?;
		Ok(())
	}

	pub fn clear(&self) -> Result<()> {
		let native = self.core.native_for_write()?;
		self.core.backend().clear(native)?;
		Ok(())
	}

	pub fn len(&self) -> Result<u64> {
		let native = self.core.native()?;
		Ok(self.core.backend().list_len(native)?)
	}

	pub fn is_empty(&self) -> Result<bool> {
		Ok(self.len()? == 0)
	}

	/// Returns a fail-fast cursor over the elements, bound on first use.
	pub fn iter(&self) -> Result<SequenceCursor<T>> {
		self.core.native()?;
		let codec = self.codec.clone();
		Ok(SequenceCursor::new(self.core.clone(), IterMode::Values, move |item| decode_value(&*codec, item)))
	}

	/// Returns a splittable cursor over the whole list, sized on first use.
	pub fn splittable(&self) -> Result<SplittableCursor<T>> {
		self.splittable_cursor(0, None)
	}

	/// Returns a splittable cursor over positions `origin..fence`.
	///
	/// Fails with [`StorageError::InvalidArgument`] if `origin > fence`; bounds against the list
	/// length are checked on first use.
	pub fn splittable_range(&self, origin: u64, fence: u64) -> Result<SplittableCursor<T>> {
		self.splittable_cursor(origin, Some(fence))
	}

	/// Returns a rayon parallel iterator over the elements, in list order.
	pub fn par_iter(&self) -> Result<ParallelSequence<T>> {
		Ok(ParallelSequence::new(self.splittable()?))
	}

	fn splittable_cursor(&self, origin: u64, fence: Option<u64>) -> Result<SplittableCursor<T>> {
		self.core.native()?;
		let list = self.clone();
		let sized = self.clone();
		SplittableCursor::new(
			self.core.clone(),
			origin,
			fence,
			move |index| list.get(index),
			move || sized.len(),
		)
	}
}

impl<T> std::fmt::Debug for ListProxy<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ListProxy").field("core", &self.core).finish()
	}
}
