//! Typed proxies to natively-held indexes.
//!
//! Every proxy kind wraps one shared [`ProxyCore`], which owns the native handle and enforces
//! liveness and writability before anything is delegated to the backend. The kinds add only their
//! own data operations on top.

use std::sync::Arc;

use tether_lifecycle::{NativeHandle, ProxyDestructor};
use tether_native::NativeBackend;
use tether_primitives::{HandleId, IndexAddress, IndexKind};
use tracing::debug;

use crate::{Result, Scope, StorageError};

mod entry;
mod key_set;
mod list;
mod map;

pub use entry::EntryProxy;
pub use key_set::KeySetProxy;
pub use list::ListProxy;
pub use map::MapProxy;

/// State shared by all clones of one proxy.
pub struct ProxyCore {
	handle: Arc<NativeHandle>,
	address: IndexAddress,
	kind: IndexKind,
	scope: Scope,
	destructor: ProxyDestructor,
}

impl ProxyCore {
	pub(crate) fn new(handle: Arc<NativeHandle>, address: IndexAddress, kind: IndexKind, scope: Scope, destructor: ProxyDestructor) -> Self {
		Self {
			handle,
			address,
			kind,
			scope,
			destructor,
		}
	}

	pub fn address(&self) -> &IndexAddress {
		&self.address
	}

	pub fn name(&self) -> &str {
		self.address.name()
	}

	pub fn kind(&self) -> IndexKind {
		self.kind
	}

	pub fn scope(&self) -> &Scope {
		&self.scope
	}

	/// Returns true while both the proxy and its scope are alive.
	pub fn is_valid(&self) -> bool {
		self.handle.is_valid() && self.scope.is_open()
	}

	/// Returns the native handle after checking liveness.
	pub(crate) fn native(&self) -> Result<HandleId> {
		if !self.scope.is_open() {
			return Err(self.use_after_free());
		}
		self.handle.get().map_err(|_| self.use_after_free())
	}

	/// Checks liveness and writability, then records a structural modification.
	pub(crate) fn native_for_write(&self) -> Result<HandleId> {
		let native = self.native()?;
		self.mark_modified()?;
		Ok(native)
	}

	/// Records a structural modification of this index in the scope tracker.
	///
	/// Fails with [`StorageError::UnsupportedMutation`] on a read-only scope, leaving the tracker
	/// untouched.
	pub fn notify_modified(&self) -> Result<()> {
		self.native()?;
		self.mark_modified()
	}

	fn mark_modified(&self) -> Result<()> {
		if !self.scope.is_writable() {
			return Err(StorageError::UnsupportedMutation { target: self.describe() });
		}
		self.scope.tracker().notify_modified();
		Ok(())
	}

	pub(crate) fn backend(&self) -> &Arc<dyn NativeBackend> {
		self.scope.backend()
	}

	pub(crate) fn use_after_free(&self) -> StorageError {
		StorageError::UseAfterFree {
			resource: self.describe(),
		}
	}

	pub(crate) fn describe(&self) -> String {
		format!("{} index {}", self.kind, self.address)
	}

	/// Destroys the native index now instead of at scope close.
	///
	/// Idempotent. A later open of the same address in this scope creates a fresh proxy.
	pub fn close(self: &Arc<Self>) -> Result<()> {
		self.scope.registry().remove(self);
		if self.destructor.is_spent() {
			return Ok(());
		}
		debug!(address = %self.address, kind = %self.kind, "Closing index early");
		self.destructor
			.clean()
			.map_err(|source| StorageError::clean_failure(self.scope.cleaner().id(), self.describe(), source))
	}
}

impl std::fmt::Debug for ProxyCore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ProxyCore")
			.field("address", &self.address)
			.field("kind", &self.kind)
			.field("handle", &self.handle)
			.finish_non_exhaustive()
	}
}

/// Capabilities shared by every proxy kind.
pub trait StorageIndex {
	/// Kind of native index this proxy opens.
	const KIND: IndexKind;

	fn core(&self) -> &Arc<ProxyCore>;

	fn address(&self) -> &IndexAddress {
		self.core().address()
	}

	fn name(&self) -> &str {
		self.core().name()
	}

	fn is_valid(&self) -> bool {
		self.core().is_valid()
	}

	fn notify_modified(&self) -> Result<()> {
		self.core().notify_modified()
	}

	fn close(&self) -> Result<()> {
		self.core().close()
	}

	/// Returns true if both values are clones of one proxy instance.
	fn same_instance(&self, other: &Self) -> bool
	where
		Self: Sized,
	{
		Arc::ptr_eq(self.core(), other.core())
	}
}

#[cfg(test)]
mod tests;
