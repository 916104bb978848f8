//! The boundary to the native storage library.
//!
//! Everything above this crate talks to natively-held objects only through [`NativeBackend`],
//! passing opaque [`HandleId`]s back and forth. The trait mirrors the C-style surface of the
//! native library: constructors returning ids, primitive operations keyed by id, pull-based
//! iterators, and explicit disposal. Nothing here tracks liveness on the caller's behalf; that is
//! the job of the lifecycle and storage layers.
//!
//! [`MemoryBackend`] is a complete in-process implementation used by tests and demos.

mod error;
pub mod memory;

pub use error::{NativeError, NativeResult};
pub use memory::MemoryBackend;
use tether_primitives::{HandleId, IndexAddress, IndexKind};

/// Kind of a database access object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessKind {
	/// Read-only view of the committed state at creation time.
	Snapshot,
	/// Read-write working copy of the committed state, mergeable back as a patch.
	Fork,
}

impl AccessKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Snapshot => "snapshot",
			Self::Fork => "fork",
		}
	}

	pub const fn is_writable(self) -> bool {
		matches!(self, Self::Fork)
	}
}

impl std::fmt::Display for AccessKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// What a native iterator yields for map-like indexes. Lists and key sets ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterMode {
	Keys,
	Values,
	Entries,
}

/// One element pulled from a native iterator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeItem {
	Value(Vec<u8>),
	Entry { key: Vec<u8>, value: Vec<u8> },
}

/// The native storage library, as seen from the host side.
///
/// Implementations must be callable from several threads, but callers never rely on them to make
/// concurrent mutation of one index safe.
pub trait NativeBackend: Send + Sync {
	/// Creates a snapshot or fork of the committed state.
	fn open_access(&self, kind: AccessKind) -> NativeResult<HandleId>;
	/// Destroys an access object that was not merged.
	fn dispose_access(&self, access: HandleId) -> NativeResult<()>;
	/// Records the current fork state as the rollback target.
	fn checkpoint(&self, fork: HandleId) -> NativeResult<()>;
	/// Reverts the fork to its last checkpoint (or its initial state).
	fn rollback(&self, fork: HandleId) -> NativeResult<()>;
	/// Applies the fork's changes to the committed state, consuming the fork.
	fn merge(&self, fork: HandleId) -> NativeResult<()>;

	/// Opens the index at `address` as `kind` within `access`.
	///
	/// Fails with [`NativeError::WrongType`] if the address already holds another kind of index,
	/// and with [`NativeError::InvalidName`] if the native library rejects the name.
	fn open(&self, access: HandleId, address: &IndexAddress, kind: IndexKind) -> NativeResult<HandleId>;
	/// Destroys an index object.
	fn dispose(&self, index: HandleId) -> NativeResult<()>;
	/// Removes every element of the index.
	fn clear(&self, index: HandleId) -> NativeResult<()>;

	fn list_len(&self, list: HandleId) -> NativeResult<u64>;
	fn list_get(&self, list: HandleId, index: u64) -> NativeResult<Option<Vec<u8>>>;
	fn list_push(&self, list: HandleId, value: Vec<u8>) -> NativeResult<()>;
	fn list_set(&self, list: HandleId, index: u64, value: Vec<u8>) -> NativeResult<()>;
	fn list_pop(&self, list: HandleId) -> NativeResult<Option<Vec<u8>>>;
	fn list_truncate(&self, list: HandleId, len: u64) -> NativeResult<()>;

	fn map_get(&self, map: HandleId, key: &[u8]) -> NativeResult<Option<Vec<u8>>>;
	fn map_put(&self, map: HandleId, key: Vec<u8>, value: Vec<u8>) -> NativeResult<()>;
	fn map_remove(&self, map: HandleId, key: &[u8]) -> NativeResult<()>;

	fn set_contains(&self, set: HandleId, key: &[u8]) -> NativeResult<bool>;
	fn set_insert(&self, set: HandleId, key: Vec<u8>) -> NativeResult<()>;
	fn set_remove(&self, set: HandleId, key: &[u8]) -> NativeResult<()>;

	fn entry_get(&self, entry: HandleId) -> NativeResult<Option<Vec<u8>>>;
	fn entry_set(&self, entry: HandleId, value: Vec<u8>) -> NativeResult<()>;
	fn entry_remove(&self, entry: HandleId) -> NativeResult<()>;

	/// Opens a pull-based iterator over the index.
	fn iter_open(&self, index: HandleId, mode: IterMode) -> NativeResult<HandleId>;
	/// Pulls the next element, `None` at the end.
	fn iter_next(&self, iter: HandleId) -> NativeResult<Option<NativeItem>>;
	/// Destroys an iterator object.
	fn iter_dispose(&self, iter: HandleId) -> NativeResult<()>;
}
