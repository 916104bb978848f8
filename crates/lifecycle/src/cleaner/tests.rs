use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tether_primitives::HandleId;

use super::*;
use crate::{NativeHandle, ProxyDestructor};

type Log = Arc<Mutex<Vec<&'static str>>>;

fn recording(cleaner: &Cleaner, log: &Log, name: &'static str) {
	let log = log.clone();
	cleaner
		.add_fn(name, move || {
			log.lock().push(name);
			Ok(())
		})
		.unwrap();
}

fn failing(cleaner: &Cleaner, log: &Log, name: &'static str) {
	let log = log.clone();
	cleaner
		.add_fn(name, move || {
			log.lock().push(name);
			Err(format!("{name} failed").into())
		})
		.unwrap();
}

#[test]
fn close_runs_actions_in_reverse_order() {
	let cleaner = Cleaner::new();
	let log = Log::default();
	recording(&cleaner, &log, "a");
	recording(&cleaner, &log, "b");
	recording(&cleaner, &log, "c");

	cleaner.close().unwrap();

	assert_eq!(*log.lock(), vec!["c", "b", "a"]);
	assert!(cleaner.is_closed());
	assert!(cleaner.is_empty());
}

#[test]
fn second_close_is_noop() {
	let cleaner = Cleaner::new();
	let log = Log::default();
	failing(&cleaner, &log, "a");

	assert!(cleaner.close().is_err());
	cleaner.close().unwrap();

	assert_eq!(*log.lock(), vec!["a"]);
}

#[test]
fn close_on_empty_cleaner_succeeds() {
	let cleaner = Cleaner::new();
	cleaner.close().unwrap();
	assert!(cleaner.is_closed());
}

#[test]
fn failures_do_not_stop_remaining_actions() {
	let cleaner = Cleaner::new();
	let log = Log::default();
	recording(&cleaner, &log, "a");
	failing(&cleaner, &log, "b");
	recording(&cleaner, &log, "c");
	failing(&cleaner, &log, "d");

	let err = cleaner.close().unwrap_err();

	assert_eq!(*log.lock(), vec!["d", "c", "b", "a"]);
	assert_eq!(err.cleaner, cleaner.id());
	assert_eq!(err.failed_actions(), vec!["d", "b"]);
	let message = err.to_string();
	assert!(message.contains("2 clean action(s) failed"), "{message}");
	assert!(message.contains("d failed") && message.contains("b failed"), "{message}");
}

#[test]
fn panicking_action_is_reported_not_propagated() {
	let cleaner = Cleaner::new();
	let log = Log::default();
	recording(&cleaner, &log, "a");
	cleaner.add_fn("boom", || panic!("native destructor blew up")).unwrap();
	recording(&cleaner, &log, "c");

	let err = cleaner.close().unwrap_err();

	assert_eq!(*log.lock(), vec!["c", "a"]);
	assert_eq!(err.failures().len(), 1);
	let panicked = err.failures()[0].source.downcast_ref::<ActionPanicked>().unwrap();
	assert_eq!(panicked.message, "native destructor blew up");
}

#[test]
fn add_to_closed_cleaner_runs_action_and_fails() {
	let cleaner = Cleaner::new();
	cleaner.close().unwrap();
	let log = Log::default();
	let log_clone = log.clone();

	let err = cleaner
		.add_fn("late", move || {
			log_clone.lock().push("late");
			Ok(())
		})
		.unwrap_err();

	assert_eq!(*log.lock(), vec!["late"]);
	assert!(matches!(
		err,
		LifecycleError::CleanerClosed { ref action, immediate_failure: None, .. } if action == "late"
	));
}

#[test]
fn add_to_closed_cleaner_attaches_action_failure() {
	let cleaner = Cleaner::new();
	cleaner.close().unwrap();

	let err = cleaner.add_fn("late", || Err("nope".into())).unwrap_err();

	assert!(matches!(err, LifecycleError::CleanerClosed { immediate_failure: Some(_), .. }));
}

#[test]
fn child_cleaner_closes_before_earlier_parent_actions() {
	let parent = Cleaner::new();
	let log = Log::default();
	recording(&parent, &log, "parent-first");
	let child = parent.child().unwrap();
	recording(&child, &log, "child-a");
	recording(&child, &log, "child-b");
	recording(&parent, &log, "parent-last");

	parent.close().unwrap();

	assert_eq!(*log.lock(), vec!["parent-last", "child-b", "child-a", "parent-first"]);
	assert!(child.is_closed());
}

#[test]
fn child_closed_early_is_skipped_by_parent() {
	let parent = Cleaner::new();
	let log = Log::default();
	let child = parent.child().unwrap();
	recording(&child, &log, "child");

	child.close().unwrap();
	parent.close().unwrap();

	assert_eq!(*log.lock(), vec!["child"]);
}

#[test]
fn nested_failures_are_reachable_from_root() {
	let parent = Cleaner::new();
	let log = Log::default();
	failing(&parent, &log, "parent");
	let child = parent.child().unwrap();
	failing(&child, &log, "child");

	let err = parent.close().unwrap_err();

	assert_eq!(*log.lock(), vec!["child", "parent"]);
	assert_eq!(err.failed_actions(), vec!["child", "parent"]);
}

#[test]
fn child_of_closed_cleaner_is_rejected() {
	let parent = Cleaner::new();
	parent.close().unwrap();
	assert!(matches!(parent.child(), Err(LifecycleError::CleanerClosed { .. })));
}

#[test]
fn dropping_last_handle_runs_pending_actions() {
	let log = Log::default();
	{
		let cleaner = Cleaner::new();
		recording(&cleaner, &log, "a");
		recording(&cleaner, &log, "b");
	}
	assert_eq!(*log.lock(), vec!["b", "a"]);
}

#[test]
fn warning_cadence_follows_config() {
	let config = CleanerConfig {
		warn_threshold: 10,
		warn_frequency: 5,
	};
	let warned: Vec<usize> = (1..=21).filter(|n| config.should_warn(*n)).collect();
	assert_eq!(warned, vec![10, 15, 20]);

	let every = CleanerConfig {
		warn_threshold: 0,
		warn_frequency: 0,
	};
	assert!(every.should_warn(1));
}

#[test]
fn many_actions_still_close_in_order() {
	let _ = tracing_subscriber::fmt::try_init();
	let cleaner = Cleaner::with_config(CleanerConfig {
		warn_threshold: 4,
		warn_frequency: 2,
	});
	let order = Arc::new(Mutex::new(Vec::new()));
	for i in 0..8 {
		let order = order.clone();
		cleaner
			.add_fn(format!("action-{i}"), move || {
				order.lock().push(i);
				Ok(())
			})
			.unwrap();
	}
	assert_eq!(cleaner.len(), 8);

	cleaner.close().unwrap();

	assert_eq!(*order.lock(), (0..8).rev().collect::<Vec<_>>());
}

#[test]
fn spent_destructors_are_pruned() {
	let cleaner = Cleaner::new();
	let log = Log::default();
	recording(&cleaner, &log, "live");
	for id in 1..=500 {
		let destructor = ProxyDestructor::new_registered(&cleaner, Arc::new(NativeHandle::new(HandleId::new(id))), "iterator", |_| Ok(())).unwrap();
		destructor.clean().unwrap();
		assert!(cleaner.len() <= PRUNE_FLOOR, "{} actions after {id} registrations", cleaner.len());
	}

	cleaner.close().unwrap();
	assert_eq!(*log.lock(), vec!["live"]);
}

#[test]
fn pending_destructors_survive_pruning() {
	let cleaner = Cleaner::new();
	let disposed = Arc::new(Mutex::new(Vec::new()));
	for id in 1..=(PRUNE_FLOOR as u64 * 3) {
		let disposed = disposed.clone();
		ProxyDestructor::new_registered(&cleaner, Arc::new(NativeHandle::new(HandleId::new(id))), "index", move |id| {
			disposed.lock().push(id);
			Ok(())
		})
		.unwrap();
	}
	assert_eq!(cleaner.len(), PRUNE_FLOOR * 3);

	cleaner.close().unwrap();
	assert_eq!(disposed.lock().len(), PRUNE_FLOOR * 3);
}

#[test]
fn closed_children_are_pruned() {
	let parent = Cleaner::new();
	for _ in 0..200 {
		parent.child().unwrap().close().unwrap();
	}
	let open = parent.child().unwrap();

	assert!(parent.len() <= PRUNE_FLOOR);
	parent.close().unwrap();
	assert!(open.is_closed());
}
