use std::sync::Arc;

use tether_native::{IterMode, NativeItem};
use tether_primitives::IndexKind;

use super::{ProxyCore, StorageIndex};
use crate::codec::Codec;
use crate::cursor::{SequenceCursor, decode_value};
use crate::{Result, StorageError};

/// Proxy to a native ordered map from `K` to `V`.
///
/// Iteration follows the order of the encoded keys.
pub struct MapProxy<K, V> {
	core: Arc<ProxyCore>,
	keys: Arc<dyn Codec<K>>,
	values: Arc<dyn Codec<V>>,
}

impl<K, V> Clone for MapProxy<K, V> {
	fn clone(&self) -> Self {
		Self {
			core: self.core.clone(),
			keys: self.keys.clone(),
			values: self.values.clone(),
		}
	}
}

impl<K, V> StorageIndex for MapProxy<K, V>
where
	K: Send + Sync + 'static,
	V: Send + Sync + 'static,
{
	const KIND: IndexKind = IndexKind::Map;

	fn core(&self) -> &Arc<ProxyCore> {
		&self.core
	}
}

impl<K, V> MapProxy<K, V>
where
	K: Send + Sync + 'static,
	V: Send + Sync + 'static,
{
	pub(crate) fn new(core: Arc<ProxyCore>, keys: Arc<dyn Codec<K>>, values: Arc<dyn Codec<V>>) -> Self {
		Self { core, keys, values }
	}

	/// Inserts or replaces the value under `key`.
	pub fn put(&self, key: &K, value: &V) -> Result<()> {
		let key = self.keys.encode(key)?;
		let value = self.values.encode(value)?;
		let native = self.core.native_for_write()?;
		self.core.backend().map_put(native, key, value)?;
		Ok(())
	}

	pub fn get(&self, key: &K) -> Result<Option<V>> {
		let key = self.keys.encode(key)?;
		let native = self.core.native()?;
		match self.core.backend().map_get(native, &key)? {
			Some(bytes) => Ok(Some(self.values.decode(&bytes)?)),
			None => Ok(None),
		}
	}

	pub fn contains_key(&self, key: &K) -> Result<bool> {
		let key = self.keys.encode(key)?;
		let native = self.core.native()?;
		Ok(self.core.backend().map_get(native, &key)?.is_some())
	}

	/// Removes the value under `key`, if any.
	pub fn remove(&self, key: &K) -> Result<()> {
		let key = self.keys.encode(key)?;
		let native = self.core.native_for_write()?;
		self.core.backend().map_remove(native, &key)?;
		Ok(())
	}

	pub fn clear(&self) -> Result<()> {
		let native = self.core.native_for_write()?;
		self.core.backend().clear(native)?;
		Ok(())
	}

	pub fn keys(&self) -> Result<SequenceCursor<K>> {
		self.core.native()?;
		let keys = self.keys.clone();
		Ok(SequenceCursor::new(self.core.clone(), IterMode::Keys, move |item| decode_value(&*keys, item)))
	}

	pub fn values(&self) -> Result<SequenceCursor<V>> {
		self.core.native()?;
		let values = self.values.clone();
		Ok(SequenceCursor::new(self.core.clone(), IterMode::Values, move |item| decode_value(&*values, item)))
	}

	pub fn entries(&self) -> Result<SequenceCursor<(K, V)>> {
		self.core.native()?;
		let keys = self.keys.clone();
		let values = self.values.clone();
		Ok(SequenceCursor::new(
			self.core.clone(),
			IterMode::Entries,
			move |item| match item {
				NativeItem::Entry { key, value } => Ok((keys.decode(&key)?, values.decode(&value)?)),
				NativeItem::Value(_) => Err(StorageError::IllegalState("map iterator yielded a bare value".to_owned())),
			},
		))
	}
}

impl<K, V> std::fmt::Debug for MapProxy<K, V> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MapProxy").field("core", &self.core).finish()
	}
}
