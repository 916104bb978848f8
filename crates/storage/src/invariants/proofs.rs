//! Machine-checkable invariant proofs for scopes, proxies and cursors.

use std::sync::Arc;

use tether_lifecycle::Cleaner;
use tether_native::MemoryBackend;

use crate::{CursorStatus, Database, StorageError, StorageIndex};

fn database() -> (Arc<MemoryBackend>, Database) {
	let backend = Arc::new(MemoryBackend::new());
	(backend.clone(), Database::new(backend))
}

/// Scope close destroys cursors and indexes before the access they were opened through.
#[cfg_attr(test, test)]
pub(crate) fn test_scope_close_destroys_everything_it_allocated() {
	let (backend, db) = database();
	let root = Cleaner::new();
	let fork = db.fork(&root).unwrap();
	let list = fork.list::<u32>("list").unwrap();
	list.extend([1u32, 2, 3]).unwrap();
	let mut cursor = list.iter().unwrap();
	assert_eq!(cursor.next().unwrap().unwrap(), 1);
	assert_eq!(backend.live_handles(), 3, "access, list and iterator");

	root.close().unwrap();

	assert_eq!(backend.live_handles(), 0);
	assert!(!fork.is_open());
	assert!(!list.is_valid());
}

/// Opens rejected by argument checks leave nothing allocated.
#[cfg_attr(test, test)]
pub(crate) fn test_failed_open_allocates_nothing() {
	let (backend, db) = database();
	let root = Cleaner::new();
	let fork = db.fork(&root).unwrap();
	fork.list::<u32>("taken").unwrap();
	let before = backend.live_handles();

	assert!(matches!(fork.map::<u32, u32>("taken"), Err(StorageError::WrongType { .. })));
	assert!(matches!(fork.entry::<u32>("__reserved"), Err(StorageError::InvalidArgument(_))));
	assert!(matches!(fork.entry::<u32>("bad name"), Err(StorageError::InvalidAddress(_))));

	assert_eq!(backend.live_handles(), before);
	assert_eq!(fork.cleaner().len(), 2, "access destructor and index cleaner only");
}

/// A second open of an address returns the proxy instance already open.
#[cfg_attr(test, test)]
pub(crate) fn test_reopen_returns_same_instance() {
	let (backend, db) = database();
	let root = Cleaner::new();
	let snapshot = db.snapshot(&root).unwrap();

	let first = snapshot.key_set::<String>("names").unwrap();
	let second = snapshot.key_set::<String>("names").unwrap();

	assert!(first.same_instance(&second));
	assert_eq!(snapshot.open_indexes(), 1);
	assert_eq!(backend.live_handles(), 2, "snapshot and one index");
}

/// Reopening as another type fails, both within a scope and across scopes.
#[cfg_attr(test, test)]
pub(crate) fn test_reopen_as_other_type_fails() {
	let (_, db) = database();
	let root = Cleaner::new();
	let fork = db.fork(&root).unwrap();
	fork.entry::<u64>("config").unwrap();

	let err = fork.list::<u64>("config").unwrap_err();
	assert!(matches!(err, StorageError::WrongType { ref requested, .. } if requested == "ListProxy<u64>"));

	db.merge(fork.into_patch().unwrap()).unwrap();
	let later = db.snapshot(&root).unwrap();
	let err = later.list::<u64>("config").unwrap_err();
	assert!(matches!(err, StorageError::WrongType { ref existing, .. } if existing == "entry index"));
}

/// Mutating through a snapshot fails and does not advance the tracker.
#[cfg_attr(test, test)]
pub(crate) fn test_snapshot_mutation_leaves_tracker_unchanged() {
	let (_, db) = database();
	let root = Cleaner::new();
	let snapshot = db.snapshot(&root).unwrap();
	let list = snapshot.list::<u32>("list").unwrap();
	let before = snapshot.tracker().current_value();

	assert!(matches!(list.push(&1), Err(StorageError::UnsupportedMutation { .. })));
	assert!(matches!(list.notify_modified(), Err(StorageError::UnsupportedMutation { .. })));
	assert!(matches!(snapshot.notify_modified(), Err(StorageError::UnsupportedMutation { .. })));

	assert_eq!(snapshot.tracker().current_value(), before);
}

/// Every proxy operation fails with use-after-free once its scope is closed.
#[cfg_attr(test, test)]
pub(crate) fn test_closed_scope_rejects_proxy_use() {
	let (_, db) = database();
	let root = Cleaner::new();
	let fork = db.fork(&root).unwrap();
	let map = fork.map::<String, u32>("map").unwrap();
	map.put(&"a".to_owned(), &1).unwrap();

	fork.close().unwrap();

	assert!(map.get(&"a".to_owned()).unwrap_err().is_use_after_free());
	assert!(map.put(&"b".to_owned(), &2).unwrap_err().is_use_after_free());
	assert!(map.keys().unwrap_err().is_use_after_free());
	assert!(fork.entry::<u32>("other").unwrap_err().is_use_after_free());
}

/// Mutations between cursor creation and the first pull are reflected without failing.
#[cfg_attr(test, test)]
pub(crate) fn test_cursor_binds_on_first_pull() {
	let (_, db) = database();
	let root = Cleaner::new();
	let fork = db.fork(&root).unwrap();
	let list = fork.list::<u32>("list").unwrap();
	list.push(&1).unwrap();

	let cursor = list.iter().unwrap();
	assert_eq!(cursor.status(), CursorStatus::Unbound);
	list.push(&2).unwrap();

	let items: Vec<u32> = cursor.collect::<Result<_, _>>().unwrap();
	assert_eq!(items, vec![1, 2]);
}

/// A cursor that saw a modification fails on every later pull.
#[cfg_attr(test, test)]
pub(crate) fn test_poisoned_cursor_stays_poisoned() {
	let (_, db) = database();
	let root = Cleaner::new();
	let fork = db.fork(&root).unwrap();
	let list = fork.list::<u32>("list").unwrap();
	list.extend([1u32, 2, 3]).unwrap();

	let mut cursor = list.iter().unwrap();
	assert_eq!(cursor.next().unwrap().unwrap(), 1);
	list.push(&4).unwrap();

	for _ in 0..3 {
		assert!(cursor.next().unwrap().unwrap_err().is_concurrent_modification());
	}
	assert_eq!(cursor.status(), CursorStatus::Poisoned);
}

/// One modification fails every fragment of a split cursor.
#[cfg_attr(test, test)]
pub(crate) fn test_mutation_fails_every_fragment() {
	let (_, db) = database();
	let root = Cleaner::new();
	let fork = db.fork(&root).unwrap();
	let list = fork.list::<u32>("list").unwrap();
	list.extend(0u32..8).unwrap();

	let mut upper = list.splittable().unwrap();
	let mut lower = upper.try_split().unwrap().unwrap();
	let mut lowest = lower.try_split().unwrap().unwrap();
	assert_eq!(lowest.next().unwrap().unwrap(), 0);

	list.set(7, &70).unwrap();

	for fragment in [&mut lowest, &mut lower, &mut upper] {
		assert!(fragment.try_advance(|_| {}).unwrap_err().is_concurrent_modification());
	}
}

/// Rollback destroys the fork's open proxies; reopening yields fresh ones.
#[cfg_attr(test, test)]
pub(crate) fn test_rollback_invalidates_open_indexes() {
	let (backend, db) = database();
	let root = Cleaner::new();
	let fork = db.fork(&root).unwrap();
	let entry = fork.entry::<u32>("entry").unwrap();
	entry.set(&1).unwrap();
	fork.create_checkpoint().unwrap();
	entry.set(&2).unwrap();

	fork.rollback().unwrap();

	assert!(!entry.is_valid());
	assert_eq!(fork.open_indexes(), 0);
	assert_eq!(backend.live_handles(), 1);
	let reopened = fork.entry::<u32>("entry").unwrap();
	assert!(!reopened.same_instance(&entry));
	assert_eq!(reopened.get().unwrap(), Some(1));
}
