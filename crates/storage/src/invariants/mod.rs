//! Machine-checkable invariant catalog and proof entrypoints for scopes, proxies and cursors.
#![allow(dead_code)]

pub(crate) mod catalog;

#[allow(unused_imports)]
pub(crate) use catalog::{
	ADDRESS_KEEPS_ITS_TYPE, CURSOR_BINDS_LATE, NATIVE_ALLOCATION_IS_REGISTERED_BEFORE_USE,
	NO_NATIVE_CALL_AFTER_FREE, ONE_PROXY_PER_ADDRESS_PER_SCOPE, POISONED_CURSOR_STAYS_POISONED,
	READ_ONLY_MUTATION_DOES_NOT_TICK, ROLLBACK_INVALIDATES_OPEN_INDEXES,
	SCOPE_CLOSE_RUNS_DEPENDENTS_FIRST, SPLIT_FRAGMENTS_SHARE_BASELINE,
};

#[cfg(doc)]
pub(crate) fn test_scope_close_destroys_everything_it_allocated() {}

#[cfg(doc)]
pub(crate) fn test_failed_open_allocates_nothing() {}

#[cfg(doc)]
pub(crate) fn test_reopen_returns_same_instance() {}

#[cfg(doc)]
pub(crate) fn test_reopen_as_other_type_fails() {}

#[cfg(doc)]
pub(crate) fn test_snapshot_mutation_leaves_tracker_unchanged() {}

#[cfg(doc)]
pub(crate) fn test_closed_scope_rejects_proxy_use() {}

#[cfg(doc)]
pub(crate) fn test_cursor_binds_on_first_pull() {}

#[cfg(doc)]
pub(crate) fn test_poisoned_cursor_stays_poisoned() {}

#[cfg(doc)]
pub(crate) fn test_mutation_fails_every_fragment() {}

#[cfg(doc)]
pub(crate) fn test_rollback_invalidates_open_indexes() {}

#[cfg(test)]
mod proofs;

#[cfg(test)]
#[allow(unused_imports)]
pub(crate) use proofs::{
	test_closed_scope_rejects_proxy_use, test_cursor_binds_on_first_pull,
	test_failed_open_allocates_nothing, test_mutation_fails_every_fragment,
	test_poisoned_cursor_stays_poisoned, test_reopen_as_other_type_fails,
	test_reopen_returns_same_instance, test_rollback_invalidates_open_indexes,
	test_scope_close_destroys_everything_it_allocated,
	test_snapshot_mutation_leaves_tracker_unchanged,
};
