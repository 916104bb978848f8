use tether_lifecycle::{BoxError, CleanFailure, CleanerId, CloseFailures, LifecycleError};
use tether_native::NativeError;
use tether_primitives::{AddressError, IndexAddress};
use thiserror::Error;

use crate::codec::CodecError;

/// A convenient type alias for `Result` with `E` = [`StorageError`].
pub type Result<T, E = StorageError> = std::result::Result<T, E>;

/// Errors raised by scopes, proxies and cursors.
///
/// All of them are reported to the immediate caller; nothing is logged and swallowed.
#[derive(Debug, Error)]
pub enum StorageError {
	/// The proxy, cursor or scope (or one of its owners) was already disposed.
	#[error("{resource} used after it was freed")]
	UseAfterFree { resource: String },
	/// A mutation was attempted through a read-only scope.
	#[error("cannot modify {target}: the scope is read-only")]
	UnsupportedMutation { target: String },
	/// The index was structurally modified after the cursor bound to it.
	#[error("index {address} was modified while a cursor was iterating over it")]
	ConcurrentModification { address: IndexAddress },
	#[error(transparent)]
	CloseFailures(#[from] CloseFailures),
	#[error("invalid argument: {0}")]
	InvalidArgument(String),
	#[error(transparent)]
	InvalidAddress(#[from] AddressError),
	#[error("index {index} is out of bounds for length {len}")]
	IndexOutOfBounds { index: u64, len: u64 },
	/// The address is already open, or persisted, as a different type.
	#[error("index {address} is already open as {existing}, cannot open it as {requested}")]
	WrongType {
		address: IndexAddress,
		requested: String,
		existing: String,
	},
	#[error(transparent)]
	Codec(#[from] CodecError),
	#[error("native library error: {0}")]
	Native(#[from] NativeError),
	#[error("{0} is empty")]
	NoSuchElement(String),
	#[error("illegal state: {0}")]
	IllegalState(String),
}

impl From<LifecycleError> for StorageError {
	fn from(err: LifecycleError) -> Self {
		match err {
			LifecycleError::UseAfterFree { handle } => Self::UseAfterFree {
				resource: format!("native handle {handle}"),
			},
			LifecycleError::CleanerClosed { cleaner, .. } => Self::UseAfterFree {
				resource: format!("cleaner {cleaner}"),
			},
			LifecycleError::CloseFailures(failures) => Self::CloseFailures(failures),
		}
	}
}

impl StorageError {
	/// Wraps the failure of one destructor run outside its cleaner.
	pub(crate) fn clean_failure(cleaner: CleanerId, action: String, source: BoxError) -> Self {
		Self::CloseFailures(CloseFailures {
			cleaner,
			failures: vec![CleanFailure { action, source }],
		})
	}

	/// Returns true for failures caused by a disposed owner.
	pub fn is_use_after_free(&self) -> bool {
		matches!(self, Self::UseAfterFree { .. })
	}

	/// Returns true for fail-fast concurrent modification reports.
	pub fn is_concurrent_modification(&self) -> bool {
		matches!(self, Self::ConcurrentModification { .. })
	}
}
