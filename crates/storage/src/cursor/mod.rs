//! Fail-fast cursors over proxied indexes.
//!
//! Both cursor kinds bind lazily: nothing native is touched and no baseline is captured until the
//! first observable operation. From then on every step compares the scope's modification tracker
//! with the baseline and poisons the cursor on mismatch.

use tether_native::NativeItem;

use crate::codec::Codec;
use crate::{Result, StorageError};

mod guard;
mod parallel;
mod sequence;
mod split;

pub use guard::CursorStatus;
pub use parallel::ParallelSequence;
pub use sequence::SequenceCursor;
pub use split::SplittableCursor;

/// Decodes an item of a single-value iterator.
pub(crate) fn decode_value<T: 'static>(codec: &dyn Codec<T>, item: NativeItem) -> Result<T> {
	match item {
		NativeItem::Value(bytes) => Ok(codec.decode(&bytes)?),
		NativeItem::Entry { .. } => Err(StorageError::IllegalState("expected a single value, got a key-value pair".to_owned())),
	}
}
