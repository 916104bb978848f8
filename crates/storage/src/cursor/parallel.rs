use rayon::iter::ParallelIterator;
use rayon::iter::plumbing::{Folder, UnindexedConsumer, UnindexedProducer, bridge_unindexed};

use super::split::SplittableCursor;
use crate::Result;

/// Rayon parallel iterator over a [`SplittableCursor`].
///
/// Work is divided with [`SplittableCursor::try_split`], so every fragment shares one baseline and
/// a structural modification during traversal surfaces as an `Err` item. Ordered consumers such
/// as `collect` see the elements in index order.
#[derive(Debug)]
pub struct ParallelSequence<T> {
	cursor: SplittableCursor<T>,
}

impl<T> ParallelSequence<T> {
	pub(crate) fn new(cursor: SplittableCursor<T>) -> Self {
		Self { cursor }
	}
}

impl<T: Send> ParallelIterator for ParallelSequence<T> {
	type Item = Result<T>;

	fn drive_unindexed<C>(self, consumer: C) -> C::Result
	where
		C: UnindexedConsumer<Self::Item>,
	{
		bridge_unindexed(CursorProducer(self.cursor), consumer)
	}
}

struct CursorProducer<T>(SplittableCursor<T>);

impl<T: Send> UnindexedProducer for CursorProducer<T> {
	type Item = Result<T>;

	fn split(mut self) -> (Self, Option<Self>) {
		// A failed split leaves the cursor poisoned or unbound, so fold_with reports the error.
		match self.0.try_split() {
			Ok(Some(lower)) => (Self(lower), Some(self)),
			Ok(None) | Err(_) => (self, None),
		}
	}

	fn fold_with<F>(mut self, mut folder: F) -> F
	where
		F: Folder<Self::Item>,
	{
		while !folder.full() {
			match self.0.next() {
				Some(Ok(value)) => folder = folder.consume(Ok(value)),
				Some(Err(err)) => return folder.consume(Err(err)),
				None => break,
			}
		}
		folder
	}
}
