use tether_primitives::{HandleId, IndexAddress, IndexKind};
use thiserror::Error;

/// Errors reported by the native library.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NativeError {
	/// The address already holds an index of another kind.
	#[error("index {address} is a {actual}, cannot open it as a {expected}")]
	WrongType {
		address: IndexAddress,
		expected: IndexKind,
		actual: IndexKind,
	},
	/// The native library refuses the index name.
	#[error("invalid index name {name:?}: {reason}")]
	InvalidName { name: String, reason: &'static str },
	/// The id does not refer to a live native object.
	#[error("unknown native handle {0}")]
	UnknownHandle(HandleId),
	/// The id refers to an object of another type.
	#[error("native handle {handle} refers to a {actual}, expected a {expected}")]
	HandleTypeMismatch {
		handle: HandleId,
		expected: &'static str,
		actual: &'static str,
	},
	/// A write was attempted through a read-only access.
	#[error("access {0} is read-only")]
	ReadOnly(HandleId),
	#[error("index {index} out of bounds for length {len}")]
	IndexOutOfBounds { index: u64, len: u64 },
	/// The access object does not support the operation.
	#[error("{operation} is not supported by access {access}")]
	Unsupported { operation: &'static str, access: HandleId },
	/// The access object still has indexes or iterators open on it.
	#[error("native handle {handle} still has {dependents} live dependent object(s)")]
	LiveDependents { handle: HandleId, dependents: usize },
	#[error("{0} indexes cannot be iterated")]
	NotIterable(IndexKind),
}

pub type NativeResult<T, E = NativeError> = std::result::Result<T, E>;
