use std::sync::Arc;

use pretty_assertions::assert_eq;
use tether_lifecycle::Cleaner;
use tether_native::MemoryBackend;
use tether_primitives::IndexAddress;

use super::*;
use crate::codec::{Codec, CodecError};
use crate::{Database, Fork};

struct Fixture {
	backend: Arc<MemoryBackend>,
	db: Database,
	fork: Fork,
	root: Cleaner,
}

fn fixture() -> Fixture {
	let _ = tracing_subscriber::fmt::try_init();
	let backend = Arc::new(MemoryBackend::new());
	let root = Cleaner::new();
	let db = Database::new(backend.clone());
	let fork = db.fork(&root).unwrap();
	Fixture { backend, db, fork, root }
}

/// Accepts even numbers only.
struct EvenCodec;

impl Codec<u32> for EvenCodec {
	fn encode(&self, value: &u32) -> Result<Vec<u8>, CodecError> {
		if value % 2 == 1 {
			return Err(CodecError::encode::<u32>(format!("{value} is odd")));
		}
		Ok(value.to_le_bytes().to_vec())
	}

	fn decode(&self, bytes: &[u8]) -> Result<u32, CodecError> {
		let bytes: [u8; 4] = bytes.try_into().map_err(CodecError::decode::<u32>)?;
		Ok(u32::from_le_bytes(bytes))
	}
}

#[test]
fn list_operations() {
	let fx = fixture();
	let list = fx.fork.list::<String>("words").unwrap();
	assert!(list.is_empty().unwrap());
	assert_eq!(list.last().unwrap(), None);

	list.extend(["a", "b", "c"].map(str::to_owned)).unwrap();
	list.push(&"d".to_owned()).unwrap();
	list.set(1, &"B".to_owned()).unwrap();
	assert_eq!(list.len().unwrap(), 4);
	assert_eq!(list.get(1).unwrap(), "B");
	assert_eq!(list.last().unwrap().as_deref(), Some("d"));

	assert_eq!(list.remove_last().unwrap(), "d");
	list.truncate(2).unwrap();
	list.truncate(5).unwrap();
	let items: Vec<String> = list.iter().unwrap().collect::<Result<_, _>>().unwrap();
	assert_eq!(items, vec!["a", "B"]);

	list.clear().unwrap();
	assert!(matches!(list.remove_last(), Err(StorageError::NoSuchElement(_))));
}

#[test]
fn list_bounds_are_checked() {
	let fx = fixture();
	let list = fx.fork.list::<u8>("bytes").unwrap();
	list.push(&7).unwrap();

	assert!(matches!(list.get(1), Err(StorageError::IndexOutOfBounds { index: 1, len: 1 })));
	assert!(matches!(list.set(3, &0), Err(StorageError::IndexOutOfBounds { index: 3, len: 1 })));
}

#[test]
fn only_mutations_advance_the_tracker() {
	let fx = fixture();
	let tracker = fx.fork.tracker().clone();
	let list = fx.fork.list::<u16>("list").unwrap();
	let start = tracker.current_value();

	list.push(&1).unwrap();
	list.set(0, &2).unwrap();
	assert_eq!(tracker.current_value(), start + 2);

	list.get(0).unwrap();
	list.len().unwrap();
	list.iter().unwrap().count();
	assert_eq!(tracker.current_value(), start + 2);

	list.notify_modified().unwrap();
	assert!(tracker.is_modified_since(start + 2));
}

#[test]
fn failed_encoding_writes_nothing() {
	let fx = fixture();
	let list: ListProxy<u32> = fx.fork.list_with_codec("evens", EvenCodec).unwrap();
	let before = fx.fork.tracker().current_value();

	let err = list.extend([2u32, 3, 4]).unwrap_err();
	assert!(matches!(err, StorageError::Codec(CodecError { operation: "encode", .. })));
	assert_eq!(list.len().unwrap(), 0);
	assert_eq!(fx.fork.tracker().current_value(), before);

	list.extend([2u32, 4]).unwrap();
	assert_eq!(list.get(1).unwrap(), 4);
}

#[test]
fn map_operations() {
	let fx = fixture();
	let map = fx.fork.map::<String, u64>("balances").unwrap();
	let alice = "alice".to_owned();

	assert_eq!(map.get(&alice).unwrap(), None);
	map.put(&alice, &10).unwrap();
	map.put(&alice, &12).unwrap();
	map.put(&"bob".to_owned(), &3).unwrap();
	assert_eq!(map.get(&alice).unwrap(), Some(12));
	assert!(map.contains_key(&alice).unwrap());

	map.remove(&alice).unwrap();
	assert!(!map.contains_key(&alice).unwrap());
	assert_eq!(map.keys().unwrap().count(), 1);

	map.clear().unwrap();
	assert_eq!(map.entries().unwrap().count(), 0);
}

#[test]
fn key_set_operations() {
	let fx = fixture();
	let set = fx.fork.key_set::<(u8, u8)>("pairs").unwrap();
	set.insert(&(1, 2)).unwrap();
	set.insert(&(1, 2)).unwrap();
	set.insert(&(0, 9)).unwrap();

	assert!(set.contains(&(1, 2)).unwrap());
	let pairs: Vec<(u8, u8)> = set.iter().unwrap().collect::<Result<_, _>>().unwrap();
	assert_eq!(pairs, vec![(0, 9), (1, 2)]);

	set.remove(&(1, 2)).unwrap();
	assert!(!set.contains(&(1, 2)).unwrap());
	set.clear().unwrap();
	assert!(!set.contains(&(0, 9)).unwrap());
}

#[test]
fn entry_operations() {
	let fx = fixture();
	let entry = fx.fork.entry::<Vec<u32>>("config").unwrap();
	assert!(!entry.is_present().unwrap());

	entry.set(&vec![1, 2]).unwrap();
	assert_eq!(entry.get().unwrap(), Some(vec![1, 2]));

	entry.remove().unwrap();
	assert_eq!(entry.get().unwrap(), None);
}

#[test]
fn undecodable_bytes_surface_as_codec_errors() {
	let fx = fixture();
	fx.fork.entry::<String>("flag").unwrap().set(&"zz".to_owned()).unwrap();
	fx.db.merge(fx.fork.clone().into_patch().unwrap()).unwrap();

	let snapshot = fx.db.snapshot(&fx.root).unwrap();
	let err = snapshot.entry::<bool>("flag").unwrap().get().unwrap_err();
	assert!(matches!(err, StorageError::Codec(CodecError { operation: "decode", .. })));
}

#[test]
fn early_close_frees_the_index_only() {
	let fx = fixture();
	let list = fx.fork.list::<u8>("list").unwrap();
	let other = fx.fork.list::<u8>("other").unwrap();
	let handles = fx.backend.live_handles();

	list.close().unwrap();
	list.close().unwrap();

	assert!(!list.is_valid());
	assert!(list.len().unwrap_err().is_use_after_free());
	assert!(other.is_valid());
	assert_eq!(fx.backend.live_handles(), handles - 1);
	assert_eq!(fx.fork.open_indexes(), 1);

	let reopened = fx.fork.list::<u8>("list").unwrap();
	assert!(!reopened.same_instance(&list));
	assert!(reopened.is_valid());
}

#[test]
fn proxies_report_their_address() {
	let fx = fixture();
	let address = IndexAddress::in_group("accounts", *b"id-1").unwrap();
	let entry = fx.fork.entry::<u8>(&address).unwrap();

	assert_eq!(entry.address(), &address);
	assert_eq!(entry.name(), "accounts");
	assert_eq!(entry.core().kind(), IndexKind::Entry);
	assert_eq!(entry.core().describe(), "entry index accounts[69642d31]");
}

#[test]
fn same_address_in_group_and_standalone_are_distinct() {
	let fx = fixture();
	let standalone = fx.fork.list::<u8>("accounts").unwrap();
	let member = fx.fork.list::<u8>(IndexAddress::in_group("accounts", vec![1]).unwrap()).unwrap();

	standalone.push(&1).unwrap();
	assert!(!standalone.same_instance(&member));
	assert!(member.is_empty().unwrap());
}
