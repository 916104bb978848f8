use std::sync::Arc;

use tether_native::IterMode;
use tether_primitives::IndexKind;

use super::{ProxyCore, StorageIndex};
use crate::Result;
use crate::codec::Codec;
use crate::cursor::{SequenceCursor, decode_value};

/// Proxy to a native ordered set of `T`.
pub struct KeySetProxy<T> {
	core: Arc<ProxyCore>,
	codec: Arc<dyn Codec<T>>,
}

impl<T> Clone for KeySetProxy<T> {
	fn clone(&self) -> Self {
		Self {
			core: self.core.clone(),
			codec: self.codec.clone(),
		}
	}
}

impl<T: Send + Sync + 'static> StorageIndex for KeySetProxy<T> {
	const KIND: IndexKind = IndexKind::KeySet;

	fn core(&self) -> &Arc<ProxyCore> {
		&self.core
	}
}

impl<T: Send + Sync + 'static> KeySetProxy<T> {
	pub(crate) fn new(core: Arc<ProxyCore>, codec: Arc<dyn Codec<T>>) -> Self {
		Self { core, codec }
	}

	pub fn insert(&self, value: &T) -> Result<()> {
		let key = self.codec.encode(value)?;
		let native = self.core.native_for_write()?;
		self.core.backend().set_insert(native, key)?;
		Ok(())
	}

	pub fn contains(&self, value: &T) -> Result<bool> {
		let key = self.codec.encode(value)?;
		let native = self.core.native()?;
		Ok(self.core.backend().set_contains(native, &key)?)
	}

	pub fn remove(&self, value: &T) -> Result<()> {
		let key = self.codec.encode(value)?;
		let native = self.core.native_for_write()?;
		self.core.backend().set_remove(native, &key)?;
		Ok(())
	}

	pub fn clear(&self) -> Result<()> {
		let native = self.core.native_for_write()?;
		self.core.backend().clear(native)?;
		Ok(())
	}

	/// Returns a fail-fast cursor over the keys in encoded order.
	pub fn iter(&self) -> Result<SequenceCursor<T>> {
		self.core.native()?;
		let codec = self.codec.clone();
		Ok(SequenceCursor::new(self.core.clone(), IterMode::Keys, move |item| decode_value(&*codec, item)))
	}
}

impl<T> std::fmt::Debug for KeySetProxy<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("KeySetProxy").field("core", &self.core).finish()
	}
}
