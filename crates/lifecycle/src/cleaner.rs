use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use crate::{ActionPanicked, BoxError, CleanFailure, CleanerConfig, CloseFailures, LifecycleError};

/// A one-shot disposal action registered in a [`Cleaner`].
pub trait CleanAction: Send {
	/// Releases the resource. Called at most once.
	fn clean(self: Box<Self>) -> Result<(), BoxError>;

	/// Type of the released resource, used for diagnostics.
	fn resource_type(&self) -> Option<&'static str> {
		None
	}

	/// Human-readable description used in logs and failure reports.
	fn describe(&self) -> String {
		self.resource_type().unwrap_or("unknown").to_owned()
	}

	/// Returns true once running the action would do nothing, e.g. because the resource was
	/// released early. Spent actions may be dropped from the cleaner without being run.
	fn is_spent(&self) -> bool {
		false
	}
}

/// Smallest registration count at which spent actions are pruned.
const PRUNE_FLOOR: usize = 32;

/// Identifier of a cleaner, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CleanerId(u64);

impl CleanerId {
	fn next() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(0);
		Self(NEXT.fetch_add(1, Ordering::Relaxed).wrapping_add(1))
	}
}

impl std::fmt::Display for CleanerId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Ordered registry of disposal actions, executed LIFO on [`Cleaner::close`].
///
/// `Cleaner` is a cheap handle: clones share the same registry. If the last handle is dropped
/// without an explicit close, the pending actions still run (failures are only logged then).
#[derive(Clone)]
pub struct Cleaner {
	id: CleanerId,
	config: CleanerConfig,
	state: Arc<Mutex<CleanerState>>,
}

struct CleanerState {
	id: CleanerId,
	actions: Vec<Box<dyn CleanAction>>,
	closed: bool,
	/// Registration count that triggers the next pruning pass.
	prune_at: usize,
}

impl CleanerState {
	/// Drops spent actions once the registry has doubled since the last pass.
	fn prune(&mut self) {
		if self.actions.len() < self.prune_at {
			return;
		}
		let before = self.actions.len();
		self.actions.retain(|action| !action.is_spent());
		self.prune_at = (self.actions.len() * 2).max(PRUNE_FLOOR);
		if self.actions.len() < before {
			trace!(cleaner = %self.id, pruned = before - self.actions.len(), kept = self.actions.len(), "Pruned spent clean actions");
		}
	}
}

impl Cleaner {
	/// Creates an open cleaner with default diagnostics settings.
	pub fn new() -> Self {
		Self::with_config(CleanerConfig::default())
	}

	/// Creates an open cleaner with the given diagnostics settings.
	pub fn with_config(config: CleanerConfig) -> Self {
		let id = CleanerId::next();
		Self {
			id,
			config,
			state: Arc::new(Mutex::new(CleanerState {
				id,
				actions: Vec::new(),
				closed: false,
				prune_at: PRUNE_FLOOR,
			})),
		}
	}

	pub fn id(&self) -> CleanerId {
		self.id
	}

	pub fn config(&self) -> CleanerConfig {
		self.config
	}

	/// Registers a clean action.
	///
	/// On a closed cleaner the action is executed right away, so the resource does not leak, and
	/// [`LifecycleError::CleanerClosed`] is returned.
	pub fn add(&self, action: impl CleanAction + 'static) -> Result<(), LifecycleError> {
		self.add_boxed(Box::new(action))
	}

	/// Registers an already boxed clean action. See [`Cleaner::add`].
	pub fn add_boxed(&self, action: Box<dyn CleanAction>) -> Result<(), LifecycleError> {
		let mut state = self.state.lock();
		if state.closed {
			drop(state);
			let description = action.describe();
			let immediate_failure = run_action(action).err();
			if let Some(err) = &immediate_failure {
				error!(cleaner = %self.id, action = %description, error = %err, "Clean action failed");
			}
			return Err(LifecycleError::CleanerClosed {
				cleaner: self.id,
				action: description,
				immediate_failure,
			});
		}

		state.prune();
		state.actions.push(action);
		let registered = state.actions.len();
		if self.config.should_warn(registered) {
			warn!(
				cleaner = %self.id,
				registered,
				by_type = %frequencies(&state.actions),
				"Many clean actions registered in one cleaner"
			);
		}
		Ok(())
	}

	/// Registers a closure as a clean action.
	pub fn add_fn<F>(&self, description: impl Into<String>, f: F) -> Result<(), LifecycleError>
	where
		F: FnOnce() -> Result<(), BoxError> + Send + 'static,
	{
		self.add(FnAction {
			description: description.into(),
			f,
		})
	}

	/// Creates a nested cleaner that is closed by this one.
	///
	/// The child runs as a single action of the parent, at the position of this call, so
	/// everything registered in the child is torn down before anything registered here earlier.
	pub fn child(&self) -> Result<Cleaner, LifecycleError> {
		self.child_with_config(self.config)
	}

	/// Like [`Cleaner::child`], with its own diagnostics settings.
	pub fn child_with_config(&self, config: CleanerConfig) -> Result<Cleaner, LifecycleError> {
		let child = Cleaner::with_config(config);
		self.add(ChildCleaner(child.clone()))?;
		Ok(child)
	}

	/// Runs every registered action exactly once, most recently registered first.
	///
	/// Failing (or panicking) actions do not stop the remaining ones; their causes are collected
	/// into one [`CloseFailures`]. Closing again is a no-op.
	pub fn close(&self) -> Result<(), CloseFailures> {
		let actions = {
			let mut state = self.state.lock();
			if state.closed {
				return Ok(());
			}
			state.closed = true;
			std::mem::take(&mut state.actions)
		};

		debug!(cleaner = %self.id, actions = actions.len(), "Closing cleaner");
		let failures = run_all(self.id, actions);
		if failures.is_empty() {
			Ok(())
		} else {
			Err(CloseFailures {
				cleaner: self.id,
				failures,
			})
		}
	}

	pub fn is_closed(&self) -> bool {
		self.state.lock().closed
	}

	/// Returns the number of registered actions, including spent ones not yet pruned.
	pub fn len(&self) -> usize {
		self.state.lock().actions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl Default for Cleaner {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for Cleaner {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.state.lock();
		f.debug_struct("Cleaner")
			.field("id", &self.id)
			.field("registered", &state.actions.len())
			.field("closed", &state.closed)
			.finish()
	}
}

impl Drop for CleanerState {
	fn drop(&mut self) {
		if self.closed || self.actions.is_empty() {
			return;
		}
		warn!(cleaner = %self.id, actions = self.actions.len(), "Cleaner dropped without close");
		self.closed = true;
		// Failures were already logged one by one.
		let _ = run_all(self.id, std::mem::take(&mut self.actions));
	}
}

fn run_all(cleaner: CleanerId, actions: Vec<Box<dyn CleanAction>>) -> Vec<CleanFailure> {
	let mut failures = Vec::new();
	for action in actions.into_iter().rev() {
		let description = action.describe();
		if let Err(source) = run_action(action) {
			error!(cleaner = %cleaner, action = %description, error = %source, "Clean action failed");
			failures.push(CleanFailure {
				action: description,
				source,
			});
		}
	}
	failures
}

fn run_action(action: Box<dyn CleanAction>) -> Result<(), BoxError> {
	match catch_unwind(AssertUnwindSafe(move || action.clean())) {
		Ok(result) => result,
		Err(payload) => {
			let message = payload
				.downcast_ref::<&str>()
				.map(|s| (*s).to_owned())
				.or_else(|| payload.downcast_ref::<String>().cloned())
				.unwrap_or_else(|| "non-string panic payload".to_owned());
			Err(Box::new(ActionPanicked { message }))
		}
	}
}

fn frequencies(actions: &[Box<dyn CleanAction>]) -> String {
	let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
	for action in actions {
		*counts.entry(action.resource_type().unwrap_or("unknown")).or_default() += 1;
	}
	counts.iter().map(|(kind, n)| format!("{kind}={n}")).collect::<Vec<_>>().join(", ")
}

struct FnAction<F> {
	description: String,
	f: F,
}

impl<F> CleanAction for FnAction<F>
where
	F: FnOnce() -> Result<(), BoxError> + Send,
{
	fn clean(self: Box<Self>) -> Result<(), BoxError> {
		(self.f)()
	}

	fn describe(&self) -> String {
		self.description.clone()
	}
}

struct ChildCleaner(Cleaner);

impl CleanAction for ChildCleaner {
	fn clean(self: Box<Self>) -> Result<(), BoxError> {
		self.0.close().map_err(|e| Box::new(e) as BoxError)
	}

	fn resource_type(&self) -> Option<&'static str> {
		Some("cleaner")
	}

	fn describe(&self) -> String {
		format!("child cleaner {}", self.0.id)
	}

	fn is_spent(&self) -> bool {
		self.0.is_closed()
	}
}

#[cfg(test)]
mod tests;
