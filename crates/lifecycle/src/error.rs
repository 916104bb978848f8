use tether_primitives::HandleId;
use thiserror::Error;

use crate::CleanerId;

/// Boxed error returned by clean actions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by handles and cleaners.
#[derive(Debug, Error)]
pub enum LifecycleError {
	/// The handle was already disposed.
	#[error("native handle {handle} is no longer valid")]
	UseAfterFree { handle: HandleId },
	/// A clean action was offered to a cleaner that has already run.
	///
	/// The action itself has been executed before this error is returned; its failure, if any,
	/// is the source of this error.
	#[error("cannot register clean action ({action}) in closed cleaner {cleaner}")]
	CleanerClosed {
		cleaner: CleanerId,
		action: String,
		#[source]
		immediate_failure: Option<BoxError>,
	},
	#[error(transparent)]
	CloseFailures(#[from] CloseFailures),
}

/// Aggregated failure of [`crate::Cleaner::close`].
///
/// Every registered action has run exactly once by the time this error exists; it carries one
/// [`CleanFailure`] per action that failed, in execution order.
#[derive(Debug, Error)]
#[error("{} clean action(s) failed when closing cleaner {cleaner}: {}", .failures.len(), summarize(.failures))]
pub struct CloseFailures {
	pub cleaner: CleanerId,
	pub failures: Vec<CleanFailure>,
}

impl CloseFailures {
	/// Returns the failures in execution (reverse registration) order.
	pub fn failures(&self) -> &[CleanFailure] {
		&self.failures
	}

	/// Returns the failed actions' descriptions, descending into nested cleaners.
	pub fn failed_actions(&self) -> Vec<&str> {
		let mut actions = Vec::new();
		for failure in &self.failures {
			match failure.source.downcast_ref::<CloseFailures>() {
				Some(nested) => actions.extend(nested.failed_actions()),
				None => actions.push(failure.action.as_str()),
			}
		}
		actions
	}
}

/// One failed clean action.
#[derive(Debug, Error)]
#[error("{action}: {source}")]
pub struct CleanFailure {
	pub action: String,
	#[source]
	pub source: BoxError,
}

/// A clean action panicked instead of returning an error.
#[derive(Debug, Error)]
#[error("clean action panicked: {message}")]
pub struct ActionPanicked {
	pub message: String,
}

fn summarize(failures: &[CleanFailure]) -> String {
	failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}
