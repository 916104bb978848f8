#![allow(unused_crate_dependencies)]

//! End-to-end behavior of cleaners, scopes, proxies and cursors over the in-memory backend.

use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rayon::prelude::*;
use rstest::rstest;
use tether_lifecycle::Cleaner;
use tether_native::MemoryBackend;
use tether_storage::{Database, Fork, ListProxy, SplittableCursor, StorageError, StorageIndex};

struct Env {
	backend: Arc<MemoryBackend>,
	db: Database,
	root: Cleaner,
}

fn env() -> Env {
	let _ = tracing_subscriber::fmt::try_init();
	let backend = Arc::new(MemoryBackend::new());
	Env {
		db: Database::new(backend.clone()),
		backend,
		root: Cleaner::new(),
	}
}

fn numbers(fork: &Fork, len: u64) -> ListProxy<u64> {
	let list = fork.list::<u64>("numbers").unwrap();
	list.extend(0..len).unwrap();
	list
}

/// Splits until no fragment can be split further, keeping split order.
fn leaves(mut cursor: SplittableCursor<u64>) -> Vec<SplittableCursor<u64>> {
	let before = cursor.estimate_size().unwrap();
	match cursor.try_split().unwrap() {
		Some(mut lower) => {
			assert_eq!(lower.estimate_size().unwrap() + cursor.estimate_size().unwrap(), before);
			let mut out = leaves(lower);
			out.extend(leaves(cursor));
			out
		}
		None => vec![cursor],
	}
}

#[test]
fn cleaner_runs_actions_last_registered_first() {
	let log = Arc::new(Mutex::new(Vec::new()));
	let cleaner = Cleaner::new();
	for name in ["A", "B", "C"] {
		let log = log.clone();
		cleaner
			.add_fn(name, move || {
				log.lock().push(name);
				Ok(())
			})
			.unwrap();
	}

	cleaner.close().unwrap();
	cleaner.close().unwrap();

	assert_eq!(*log.lock(), vec!["C", "B", "A"]);
}

#[test]
fn cleaner_failures_are_aggregated() {
	let runs = Arc::new(Mutex::new(0));
	let cleaner = Cleaner::new();
	for name in ["first", "second", "third", "fourth"] {
		let runs = runs.clone();
		let fails = name != "third";
		cleaner
			.add_fn(name, move || {
				*runs.lock() += 1;
				if fails { Err(format!("{name} broke").into()) } else { Ok(()) }
			})
			.unwrap();
	}

	let err = StorageError::from(cleaner.close().unwrap_err());

	assert_eq!(*runs.lock(), 4);
	let StorageError::CloseFailures(failures) = err else {
		panic!("expected aggregated close failures, got {err}");
	};
	assert_eq!(failures.failed_actions(), vec!["fourth", "second", "first"]);
}

#[test]
fn read_only_scope_rejects_modification_notices() {
	let env = env();
	let snapshot = env.db.snapshot(&env.root).unwrap();
	let entry = snapshot.entry::<u8>("entry").unwrap();
	let before = snapshot.tracker().current_value();

	for _ in 0..3 {
		assert!(matches!(snapshot.notify_modified(), Err(StorageError::UnsupportedMutation { .. })));
		assert!(matches!(entry.notify_modified(), Err(StorageError::UnsupportedMutation { .. })));
	}

	assert_eq!(snapshot.tracker().current_value(), before);
}

#[test]
fn writable_scope_notices_strictly_increase_the_tracker() {
	let env = env();
	let fork = env.db.fork(&env.root).unwrap();
	let tracker = fork.tracker();
	let first = tracker.current_value();

	let mut last = first;
	for _ in 0..5 {
		fork.notify_modified().unwrap();
		assert!(tracker.current_value() > last);
		last = tracker.current_value();
	}

	assert!(tracker.is_modified_since(first));
	assert!(!tracker.is_modified_since(last));
}

#[test]
fn cursor_yields_all_elements_then_exhausts() {
	let env = env();
	let fork = env.db.fork(&env.root).unwrap();
	let list = fork.list::<i32>("list").unwrap();
	list.extend([1i32, 2, 3]).unwrap();

	let mut cursor = list.iter().unwrap();
	let mut seen = Vec::new();
	for item in cursor.by_ref() {
		seen.push(item.unwrap());
	}

	assert_eq!(seen, vec![1, 2, 3]);
	assert!(cursor.next().is_none());
}

#[test]
fn mutation_after_first_pull_fails_every_later_pull() {
	let env = env();
	let fork = env.db.fork(&env.root).unwrap();
	let list = numbers(&fork, 5);
	let mut cursor = list.iter().unwrap();
	cursor.next().unwrap().unwrap();

	list.push(&5).unwrap();

	for _ in 0..4 {
		assert!(matches!(cursor.next(), Some(Err(StorageError::ConcurrentModification { .. }))));
	}
}

#[test]
fn mutation_before_first_pull_is_reflected() {
	let env = env();
	let fork = env.db.fork(&env.root).unwrap();
	let list = numbers(&fork, 2);
	let cursor = list.iter().unwrap();
	let splittable = list.splittable().unwrap();

	list.set(0, &10).unwrap();
	list.push(&2).unwrap();

	assert_eq!(cursor.collect::<Result<Vec<_>, _>>().unwrap(), vec![10, 1, 2]);
	assert_eq!(splittable.collect::<Result<Vec<_>, _>>().unwrap(), vec![10, 1, 2]);
}

#[rstest]
#[case(0)]
#[case(1)]
fn tiny_cursors_cannot_split(#[case] len: u64) {
	let env = env();
	let fork = env.db.fork(&env.root).unwrap();
	let mut cursor = numbers(&fork, len).splittable().unwrap();
	assert!(cursor.try_split().unwrap().is_none());
}

#[rstest]
fn split_leaves_reproduce_the_sequence(#[values(2, 3, 4, 5, 7, 8, 9, 16, 128)] len: u64) {
	let env = env();
	let fork = env.db.fork(&env.root).unwrap();
	let cursor = numbers(&fork, len).splittable().unwrap();

	let parts = leaves(cursor);
	assert_eq!(parts.len() as u64, len);

	let mut all = Vec::new();
	for part in parts {
		all.extend(part.map(Result::unwrap));
	}
	assert_eq!(all, (0..len).collect::<Vec<_>>());
}

#[test]
fn fork_proxies_are_deduplicated_by_address() {
	let env = env();
	let fork = env.db.fork(&env.root).unwrap();

	let first = fork.map::<String, u64>("balances").unwrap();
	let second = fork.map::<String, u64>("balances").unwrap();

	assert!(first.same_instance(&second));
	assert_eq!(env.backend.live_handles(), 2);
}

#[test]
fn type_conflict_names_address_and_both_types() {
	let env = env();
	let fork = env.db.fork(&env.root).unwrap();
	fork.map::<String, u64>("balances").unwrap();

	let err = fork.list::<u64>("balances").unwrap_err();

	assert_eq!(
		err.to_string(),
		"index balances is already open as MapProxy<String, u64>, cannot open it as ListProxy<u64>"
	);
}

#[test]
fn closing_the_root_cleaner_frees_everything() {
	let env = env();
	let snapshot = env.db.snapshot(&env.root).unwrap();
	let fork = env.db.fork(&env.root).unwrap();
	let list = numbers(&fork, 3);
	let mut cursor = list.iter().unwrap();
	cursor.next().unwrap().unwrap();
	snapshot.key_set::<u8>("set").unwrap();

	env.root.close().unwrap();

	assert_eq!(env.backend.live_handles(), 0);
	assert!(cursor.next().unwrap().unwrap_err().is_use_after_free());
	assert!(list.get(0).unwrap_err().is_use_after_free());
}

proptest! {
	/// Parallel traversal sees exactly the sequential elements, in order.
	#[test]
	fn prop_parallel_traversal_matches_sequential(len in 0u64..200) {
		let env = env();
		let fork = env.db.fork(&env.root).unwrap();
		let list = numbers(&fork, len);

		let sequential: Vec<u64> = list.iter().unwrap().collect::<Result<_, _>>().unwrap();
		let parallel: Vec<u64> = list.par_iter().unwrap().collect::<Result<_, _>>().unwrap();

		prop_assert_eq!(sequential, parallel);
	}
}
