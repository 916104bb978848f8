//! Invariant catalog for scopes, proxies and cursors.
#![allow(dead_code)]

/// Closing a scope must destroy its indexes and cursors before the scope's access object.
///
/// - Enforced in: `tether_lifecycle::Cleaner::close`, [`crate::Database::snapshot`], [`crate::Database::fork`]
/// - Tested by: [`crate::invariants::test_scope_close_destroys_everything_it_allocated`]
/// - Failure symptom: The native library frees an access object while indexes still point into it.
pub(crate) const SCOPE_CLOSE_RUNS_DEPENDENTS_FIRST: () = ();

/// Every natively allocated index must be registered with a cleaner before a proxy wraps it, and
/// no argument check may fail after allocation.
///
/// - Enforced in: `Scope::open_index`
/// - Tested by: [`crate::invariants::test_failed_open_allocates_nothing`]
/// - Failure symptom: Native indexes leak when an open fails halfway.
pub(crate) const NATIVE_ALLOCATION_IS_REGISTERED_BEFORE_USE: () = ();

/// An address must map to at most one live proxy per scope.
///
/// - Enforced in: `OpenIndexRegistry::get_or_open`
/// - Tested by: [`crate::invariants::test_reopen_returns_same_instance`]
/// - Failure symptom: Two proxies over one native index, each with its own destructor.
pub(crate) const ONE_PROXY_PER_ADDRESS_PER_SCOPE: () = ();

/// Reopening an address as a different index type must fail, whether the existing index is open
/// in this scope or persisted by an earlier one.
///
/// - Enforced in: `OpenIndexRegistry::get_or_open`, `Scope::open_index`
/// - Tested by: [`crate::invariants::test_reopen_as_other_type_fails`]
/// - Failure symptom: Elements of one type decoded as another.
pub(crate) const ADDRESS_KEEPS_ITS_TYPE: () = ();

/// A mutation through a read-only scope must fail without advancing the tracker.
///
/// - Enforced in: [`crate::ProxyCore::notify_modified`], [`crate::Scope::notify_modified`]
/// - Tested by: [`crate::invariants::test_snapshot_mutation_leaves_tracker_unchanged`]
/// - Failure symptom: Cursors over a snapshot fail although nothing changed.
pub(crate) const READ_ONLY_MUTATION_DOES_NOT_TICK: () = ();

/// No native call may be made with a handle whose owner was destroyed.
///
/// - Enforced in: [`crate::ProxyCore::is_valid`], `ProxyCore::native`, `Scope::access`
/// - Tested by: [`crate::invariants::test_closed_scope_rejects_proxy_use`]
/// - Failure symptom: Use-after-free inside the native library.
pub(crate) const NO_NATIVE_CALL_AFTER_FREE: () = ();

/// A cursor must capture its baseline on its first observable operation, not at creation.
///
/// - Enforced in: `CursorGuard::enter`
/// - Tested by: [`crate::invariants::test_cursor_binds_on_first_pull`]
/// - Failure symptom: Mutations between cursor creation and first use are reported as
///   concurrent modification, or are not observed by the cursor.
pub(crate) const CURSOR_BINDS_LATE: () = ();

/// Once a cursor reports a failure it must report it again on every later operation.
///
/// - Enforced in: `CursorGuard::poison`
/// - Tested by: [`crate::invariants::test_poisoned_cursor_stays_poisoned`]
/// - Failure symptom: Iteration resumes over a structurally changed index.
pub(crate) const POISONED_CURSOR_STAYS_POISONED: () = ();

/// Fragments of a split cursor must share one baseline so a single mutation fails all of them.
///
/// - Enforced in: [`crate::SplittableCursor::try_split`]
/// - Tested by: [`crate::invariants::test_mutation_fails_every_fragment`]
/// - Failure symptom: Parallel traversal silently mixes elements from before and after a mutation.
pub(crate) const SPLIT_FRAGMENTS_SHARE_BASELINE: () = ();

/// Rolling a fork back must destroy every proxy and cursor opened in it.
///
/// - Enforced in: [`crate::Fork::rollback`]
/// - Tested by: [`crate::invariants::test_rollback_invalidates_open_indexes`]
/// - Failure symptom: Proxies keep handles to index states the fork no longer has.
pub(crate) const ROLLBACK_INVALIDATES_OPEN_INDEXES: () = ();
