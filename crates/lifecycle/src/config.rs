use serde::{Deserialize, Serialize};

/// Diagnostics settings of a [`crate::Cleaner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanerConfig {
	/// Number of registered actions at which the cleaner starts warning.
	pub warn_threshold: usize,
	/// Past the threshold, warn once per this many registrations.
	pub warn_frequency: usize,
}

impl CleanerConfig {
	pub(crate) fn should_warn(&self, registered: usize) -> bool {
		registered >= self.warn_threshold && registered % self.warn_frequency.max(1) == 0
	}
}

impl Default for CleanerConfig {
	fn default() -> Self {
		Self {
			warn_threshold: 1000,
			warn_frequency: 100,
		}
	}
}
