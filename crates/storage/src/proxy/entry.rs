use std::sync::Arc;

use tether_primitives::IndexKind;

use super::{ProxyCore, StorageIndex};
use crate::Result;
use crate::codec::Codec;

/// Proxy to a native entry: a single optional `T`.
pub struct EntryProxy<T> {
	core: Arc<ProxyCore>,
	codec: Arc<dyn Codec<T>>,
}

impl<T> Clone for EntryProxy<T> {
	fn clone(&self) -> Self {
		Self {
			core: self.core.clone(),
			codec: self.codec.clone(),
		}
	}
}

impl<T: Send + Sync + 'static> StorageIndex for EntryProxy<T> {
	const KIND: IndexKind = IndexKind::Entry;

	fn core(&self) -> &Arc<ProxyCore> {
		&self.core
	}
}

impl<T: Send + Sync + 'static> EntryProxy<T> {
	pub(crate) fn new(core: Arc<ProxyCore>, codec: Arc<dyn Codec<T>>) -> Self {
		Self { core, codec }
	}

	pub fn set(&self, value: &T) -> Result<()> {
		let bytes = self.codec.encode(value)?;
		let native = self.core.native_for_write()?;
		self.core.backend().entry_set(native, bytes)?;
		Ok(())
	}

	pub fn get(&self) -> Result<Option<T>> {
		let native = self.core.native()?;
		match self.core.backend().entry_get(native)? {
			Some(bytes) => Ok(Some(self.codec.decode(&bytes)?)),
			None => Ok(None),
		}
	}

	pub fn is_present(&self) -> Result<bool> {
		let native = self.core.native()?;
		Ok(self.core.backend().entry_get(native)?.is_some())
	}

	pub fn remove(&self) -> Result<()> {
		let native = self.core.native_for_write()?;
		self.core.backend().entry_remove(native)?;
		Ok(())
	}
}

impl<T> std::fmt::Debug for EntryProxy<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EntryProxy").field("core", &self.core).finish()
	}
}
