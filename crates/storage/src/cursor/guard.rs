use std::sync::Arc;

use tether_primitives::IndexAddress;
use tracing::trace;

use crate::proxy::ProxyCore;
use crate::{Result, StorageError};

/// Observable lifecycle stage of a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStatus {
	/// Nothing was pulled yet; no baseline captured.
	Unbound,
	Bound,
	/// Drained. Further pulls report exhaustion, never an error.
	Exhausted,
	/// Failed for good. Further operations fail with the same error.
	Poisoned,
}

/// Cause a cursor was poisoned with, replayed on every later operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Fault {
	UseAfterFree { resource: String },
	ConcurrentModification { address: IndexAddress },
}

impl Fault {
	fn to_error(&self) -> StorageError {
		match self {
			Self::UseAfterFree { resource } => StorageError::UseAfterFree { resource: resource.clone() },
			Self::ConcurrentModification { address } => StorageError::ConcurrentModification { address: address.clone() },
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CursorState {
	Unbound,
	Bound { baseline: u64 },
	Exhausted,
	Poisoned(Fault),
}

/// Fail-fast state machine shared by the cursor kinds.
///
/// Clones carry the same baseline, which is how split fragments observe one modification
/// together.
#[derive(Debug, Clone)]
pub(crate) struct CursorGuard {
	source: Arc<ProxyCore>,
	state: CursorState,
}

impl CursorGuard {
	pub(crate) fn new(source: Arc<ProxyCore>) -> Self {
		Self {
			source,
			state: CursorState::Unbound,
		}
	}

	pub(crate) fn source(&self) -> &Arc<ProxyCore> {
		&self.source
	}

	pub(crate) fn status(&self) -> CursorStatus {
		match self.state {
			CursorState::Unbound => CursorStatus::Unbound,
			CursorState::Bound { .. } => CursorStatus::Bound,
			CursorState::Exhausted => CursorStatus::Exhausted,
			CursorState::Poisoned(_) => CursorStatus::Poisoned,
		}
	}

	pub(crate) fn baseline(&self) -> Option<u64> {
		match self.state {
			CursorState::Bound { baseline } => Some(baseline),
			_ => None,
		}
	}

	/// Runs the checks that precede every observable cursor step.
	///
	/// On the first call, `bind` runs and the tracker value is captured as the baseline. A failing
	/// `bind` leaves the cursor unbound. Returns `Ok(false)` once the cursor is exhausted.
	pub(crate) fn enter(&mut self, bind: impl FnOnce() -> Result<()>) -> Result<bool> {
		match &self.state {
			CursorState::Exhausted => Ok(false),
			CursorState::Poisoned(fault) => Err(fault.to_error()),
			CursorState::Unbound => {
				self.check_live()?;
				bind()?;
				let baseline = self.source.scope().tracker().current_value();
				trace!(address = %self.source.address(), baseline, "Bound cursor");
				self.state = CursorState::Bound { baseline };
				Ok(true)
			}
			CursorState::Bound { baseline } => {
				let baseline = *baseline;
				self.check_live()?;
				if self.source.scope().tracker().is_modified_since(baseline) {
					let address = self.source.address().clone();
					return Err(self.poison(Fault::ConcurrentModification { address }));
				}
				Ok(true)
			}
		}
	}

	/// Marks a bound cursor as drained.
	pub(crate) fn exhaust(&mut self) {
		if matches!(self.state, CursorState::Bound { .. }) {
			self.state = CursorState::Exhausted;
		}
	}

	/// Makes `fault` terminal and returns the error it maps to.
	pub(crate) fn poison(&mut self, fault: Fault) -> StorageError {
		let err = fault.to_error();
		trace!(address = %self.source.address(), error = %err, "Cursor poisoned");
		self.state = CursorState::Poisoned(fault);
		err
	}

	fn check_live(&mut self) -> Result<()> {
		if self.source.is_valid() {
			return Ok(());
		}
		let resource = self.source.describe();
		Err(self.poison(Fault::UseAfterFree { resource }))
	}
}
