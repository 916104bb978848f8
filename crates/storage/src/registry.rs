use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tether_primitives::{IndexAddress, IndexKind};
use tracing::debug;

use crate::proxy::{ProxyCore, StorageIndex};
use crate::{Result, StorageError};

/// Open proxies of one scope, keyed by address.
///
/// Holding the proxies here is what makes a second open of the same address return the same
/// instance. The table is cleared by a clean action registered in the scope's index cleaner, so
/// it never outlives the proxies' native handles.
#[derive(Clone, Default)]
pub(crate) struct OpenIndexRegistry {
	entries: Arc<Mutex<HashMap<IndexAddress, OpenIndex>>>,
}

struct OpenIndex {
	kind: IndexKind,
	type_name: String,
	core: Weak<ProxyCore>,
	proxy: Box<dyn Any + Send + Sync>,
}

impl OpenIndexRegistry {
	/// Returns the proxy already open at `address`, or opens one with `create`.
	///
	/// The table stays locked while `create` runs, so concurrent opens of one address cannot both
	/// allocate a native index.
	pub(crate) fn get_or_open<P, F>(&self, address: &IndexAddress, create: F) -> Result<P>
	where
		P: StorageIndex + Clone + Send + Sync + 'static,
		F: FnOnce() -> Result<P>,
	{
		let mut entries = self.entries.lock();
		if let Some(open) = entries.get(address) {
			return match open.proxy.downcast_ref::<P>() {
				Some(proxy) if open.kind == P::KIND => {
					debug!(address = %address, kind = %P::KIND, "Reusing open index");
					Ok(proxy.clone())
				}
				_ => Err(StorageError::WrongType {
					address: address.clone(),
					requested: type_label::<P>(),
					existing: open.type_name.clone(),
				}),
			};
		}

		let proxy = create()?;
		entries.insert(
			address.clone(),
			OpenIndex {
				kind: P::KIND,
				type_name: type_label::<P>(),
				core: Arc::downgrade(proxy.core()),
				proxy: Box::new(proxy.clone()),
			},
		);
		Ok(proxy)
	}

	/// Forgets `core` if it is the proxy registered at its address.
	pub(crate) fn remove(&self, core: &Arc<ProxyCore>) {
		let mut entries = self.entries.lock();
		let registered = entries
			.get(core.address())
			.is_some_and(|open| std::ptr::eq(open.core.as_ptr(), Arc::as_ptr(core)));
		if registered {
			entries.remove(core.address());
		}
	}

	pub(crate) fn clear(&self) {
		let dropped = {
			let mut entries = self.entries.lock();
			std::mem::take(&mut *entries)
		};
		if !dropped.is_empty() {
			debug!(indexes = dropped.len(), "Cleared open index registry");
		}
	}

	pub(crate) fn len(&self) -> usize {
		self.entries.lock().len()
	}
}

impl std::fmt::Debug for OpenIndexRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("OpenIndexRegistry").field("open", &self.len()).finish()
	}
}

/// Type name with module paths stripped, e.g. `ListProxy<u64>`.
pub(crate) fn type_label<T: ?Sized>() -> String {
	let full = std::any::type_name::<T>();
	let mut label = String::with_capacity(full.len());
	let mut segment = String::new();
	for c in full.chars() {
		if c.is_alphanumeric() || c == '_' || c == ':' {
			segment.push(c);
		} else {
			label.push_str(segment.rsplit("::").next().unwrap_or(&segment));
			segment.clear();
			label.push(c);
		}
	}
	label.push_str(segment.rsplit("::").next().unwrap_or(&segment));
	label
}
