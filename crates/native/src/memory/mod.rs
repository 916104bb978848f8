//! In-process [`NativeBackend`] that keeps the committed state in ordered maps.
//!
//! Every object handed out (access, index, iterator) lives in one handle table keyed by
//! [`HandleId`]. Each operation resolves its handle against that table and checks the object
//! type, so a stale or mistyped id yields an error instead of touching the wrong object.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;

use parking_lot::Mutex;
use tether_primitives::{HandleId, IndexAddress, IndexKind};
use tracing::{debug, trace};

use crate::{AccessKind, IterMode, NativeBackend, NativeError, NativeItem, NativeResult};

mod store;

use store::{EMPTY_MAP, EMPTY_SET, IndexData, Store, check_name, index_label};

/// Native backend that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
	state: Mutex<BackendState>,
}

#[derive(Debug, Default)]
struct BackendState {
	committed: Store,
	objects: HashMap<HandleId, Object>,
	last_id: u64,
}

#[derive(Debug)]
enum Object {
	Access(AccessState),
	Index {
		access: HandleId,
		address: IndexAddress,
		kind: IndexKind,
	},
	Iter(IterState),
}

impl Object {
	fn label(&self) -> &'static str {
		match self {
			Self::Access(access) => match access.kind {
				AccessKind::Snapshot => "snapshot",
				AccessKind::Fork => "fork",
			},
			Self::Index { kind, .. } => index_label(*kind),
			Self::Iter(_) => "iterator",
		}
	}
}

#[derive(Debug)]
struct AccessState {
	kind: AccessKind,
	store: Store,
	/// Addresses written through this access; only these are applied on merge.
	dirty: BTreeSet<IndexAddress>,
	/// Rollback target: the state at creation or at the last checkpoint.
	checkpoint: Option<(Store, BTreeSet<IndexAddress>)>,
}

#[derive(Debug, Clone)]
struct IterState {
	index: HandleId,
	mode: IterMode,
	cursor: IterCursor,
}

#[derive(Debug, Clone)]
enum IterCursor {
	Position(u64),
	After(Option<Vec<u8>>),
}

impl MemoryBackend {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the number of live native objects of any type.
	pub fn live_handles(&self) -> usize {
		self.state.lock().objects.len()
	}

	/// Returns true if `handle` refers to a live native object.
	pub fn is_live(&self, handle: HandleId) -> bool {
		self.state.lock().objects.contains_key(&handle)
	}

	/// Returns the kinds of all committed indexes, ordered by address.
	pub fn committed_indexes(&self) -> Vec<(IndexAddress, IndexKind)> {
		let state = self.state.lock();
		state.committed.iter().map(|(address, data)| (address.clone(), data.kind())).collect()
	}
}

impl BackendState {
	fn allocate(&mut self, object: Object) -> HandleId {
		self.last_id += 1;
		let id = HandleId::new(self.last_id);
		trace!(handle = %id, object = object.label(), "Allocated native object");
		self.objects.insert(id, object);
		id
	}

	fn access(&self, handle: HandleId) -> NativeResult<&AccessState> {
		match self.objects.get(&handle) {
			Some(Object::Access(access)) => Ok(access),
			Some(other) => Err(mismatch(handle, "database access", other)),
			None => Err(NativeError::UnknownHandle(handle)),
		}
	}

	fn access_mut(&mut self, handle: HandleId) -> NativeResult<&mut AccessState> {
		match self.objects.get_mut(&handle) {
			Some(Object::Access(access)) => Ok(access),
			Some(other) => Err(mismatch(handle, "database access", other)),
			None => Err(NativeError::UnknownHandle(handle)),
		}
	}

	fn fork_mut(&mut self, handle: HandleId, operation: &'static str) -> NativeResult<&mut AccessState> {
		let access = self.access_mut(handle)?;
		if access.kind != AccessKind::Fork {
			return Err(NativeError::Unsupported { operation, access: handle });
		}
		Ok(access)
	}

	/// Resolves an index handle, optionally requiring a kind.
	fn index_target(&self, handle: HandleId, expected: Option<IndexKind>) -> NativeResult<(HandleId, IndexAddress, IndexKind)> {
		match self.objects.get(&handle) {
			Some(Object::Index { access, address, kind }) if expected.is_none_or(|e| e == *kind) => Ok((*access, address.clone(), *kind)),
			Some(other) => Err(mismatch(handle, expected.map_or("index", index_label), other)),
			None => Err(NativeError::UnknownHandle(handle)),
		}
	}

	fn data(&self, handle: HandleId, kind: IndexKind) -> NativeResult<Option<&IndexData>> {
		let (access, address, _) = self.index_target(handle, Some(kind))?;
		Ok(self.access(access)?.store.get(&address))
	}

	fn data_mut(&mut self, handle: HandleId, expected: Option<IndexKind>) -> NativeResult<&mut IndexData> {
		let (access, address, kind) = self.index_target(handle, expected)?;
		let state = self.access_mut(access)?;
		if !state.kind.is_writable() {
			return Err(NativeError::ReadOnly(access));
		}
		state.dirty.insert(address.clone());
		Ok(state.store.entry(address).or_insert_with(|| IndexData::empty(kind)))
	}

	fn list(&self, handle: HandleId) -> NativeResult<&[Vec<u8>]> {
		match self.data(handle, IndexKind::List)? {
			Some(IndexData::List(items)) => Ok(items.as_slice()),
			None => Ok(&[][..]),
			Some(other) => Err(corrupt(handle, IndexKind::List, other)),
		}
	}

	fn list_mut(&mut self, handle: HandleId) -> NativeResult<&mut Vec<Vec<u8>>> {
		match self.data_mut(handle, Some(IndexKind::List))? {
			IndexData::List(items) => Ok(items),
			other => Err(corrupt(handle, IndexKind::List, other)),
		}
	}

	fn map(&self, handle: HandleId) -> NativeResult<&BTreeMap<Vec<u8>, Vec<u8>>> {
		match self.data(handle, IndexKind::Map)? {
			Some(IndexData::Map(entries)) => Ok(entries),
			None => Ok(&EMPTY_MAP),
			Some(other) => Err(corrupt(handle, IndexKind::Map, other)),
		}
	}

	fn map_mut(&mut self, handle: HandleId) -> NativeResult<&mut BTreeMap<Vec<u8>, Vec<u8>>> {
		match self.data_mut(handle, Some(IndexKind::Map))? {
			IndexData::Map(entries) => Ok(entries),
			other => Err(corrupt(handle, IndexKind::Map, other)),
		}
	}

	fn key_set(&self, handle: HandleId) -> NativeResult<&BTreeSet<Vec<u8>>> {
		match self.data(handle, IndexKind::KeySet)? {
			Some(IndexData::KeySet(keys)) => Ok(keys),
			None => Ok(&EMPTY_SET),
			Some(other) => Err(corrupt(handle, IndexKind::KeySet, other)),
		}
	}

	fn key_set_mut(&mut self, handle: HandleId) -> NativeResult<&mut BTreeSet<Vec<u8>>> {
		match self.data_mut(handle, Some(IndexKind::KeySet))? {
			IndexData::KeySet(keys) => Ok(keys),
			other => Err(corrupt(handle, IndexKind::KeySet, other)),
		}
	}

	fn entry(&self, handle: HandleId) -> NativeResult<Option<&Vec<u8>>> {
		match self.data(handle, IndexKind::Entry)? {
			Some(IndexData::Entry(value)) => Ok(value.as_ref()),
			None => Ok(None),
			Some(other) => Err(corrupt(handle, IndexKind::Entry, other)),
		}
	}

	fn entry_mut(&mut self, handle: HandleId) -> NativeResult<&mut Option<Vec<u8>>> {
		match self.data_mut(handle, Some(IndexKind::Entry))? {
			IndexData::Entry(value) => Ok(value),
			other => Err(corrupt(handle, IndexKind::Entry, other)),
		}
	}

	fn iter_state(&self, handle: HandleId) -> NativeResult<IterState> {
		match self.objects.get(&handle) {
			Some(Object::Iter(iter)) => Ok(iter.clone()),
			Some(other) => Err(mismatch(handle, "iterator", other)),
			None => Err(NativeError::UnknownHandle(handle)),
		}
	}

	/// Counts the indexes opened through `access` and the iterators over them.
	fn dependents(&self, access: HandleId) -> usize {
		let owned_by = |handle: &HandleId| matches!(self.objects.get(handle), Some(Object::Index { access: owner, .. }) if *owner == access);
		self.objects
			.iter()
			.filter(|(handle, object)| match object {
				Object::Index { .. } => owned_by(handle),
				Object::Iter(iter) => owned_by(&iter.index),
				Object::Access(_) => false,
			})
			.count()
	}

	/// Removes an access object, which must outlive everything opened through it.
	fn remove_access(&mut self, access: HandleId, expected: &'static str) -> NativeResult<Object> {
		if matches!(self.objects.get(&access), Some(Object::Access(_))) {
			let dependents = self.dependents(access);
			if dependents > 0 {
				return Err(NativeError::LiveDependents { handle: access, dependents });
			}
		}
		self.remove(access, expected, |o| matches!(o, Object::Access(_)))
	}

	fn remove(&mut self, handle: HandleId, expected: &'static str, is_expected: impl FnOnce(&Object) -> bool) -> NativeResult<Object> {
		match self.objects.get(&handle) {
			Some(object) if is_expected(object) => {}
			Some(other) => return Err(mismatch(handle, expected, other)),
			None => return Err(NativeError::UnknownHandle(handle)),
		}
		trace!(handle = %handle, object = expected, "Disposed native object");
		self.objects.remove(&handle).ok_or(NativeError::UnknownHandle(handle))
	}
}

fn mismatch(handle: HandleId, expected: &'static str, actual: &Object) -> NativeError {
	NativeError::HandleTypeMismatch {
		handle,
		expected,
		actual: actual.label(),
	}
}

fn corrupt(handle: HandleId, expected: IndexKind, actual: &IndexData) -> NativeError {
	NativeError::HandleTypeMismatch {
		handle,
		expected: index_label(expected),
		actual: index_label(actual.kind()),
	}
}

fn after(last: &Option<Vec<u8>>) -> (Bound<&[u8]>, Bound<&[u8]>) {
	match last {
		Some(key) => (Bound::Excluded(key.as_slice()), Bound::Unbounded),
		None => (Bound::Unbounded, Bound::Unbounded),
	}
}

impl NativeBackend for MemoryBackend {
	fn open_access(&self, kind: AccessKind) -> NativeResult<HandleId> {
		let mut state = self.state.lock();
		let store = state.committed.clone();
		let checkpoint = kind.is_writable().then(|| (store.clone(), BTreeSet::new()));
		let id = state.allocate(Object::Access(AccessState {
			kind,
			store,
			dirty: BTreeSet::new(),
			checkpoint,
		}));
		debug!(access = %id, kind = %kind, "Opened database access");
		Ok(id)
	}

	fn dispose_access(&self, access: HandleId) -> NativeResult<()> {
		self.state.lock().remove_access(access, "database access").map(drop)
	}

	fn checkpoint(&self, fork: HandleId) -> NativeResult<()> {
		let mut state = self.state.lock();
		let access = state.fork_mut(fork, "checkpoint")?;
		access.checkpoint = Some((access.store.clone(), access.dirty.clone()));
		Ok(())
	}

	fn rollback(&self, fork: HandleId) -> NativeResult<()> {
		let mut state = self.state.lock();
		let access = state.fork_mut(fork, "rollback")?;
		if let Some((store, dirty)) = access.checkpoint.clone() {
			access.store = store;
			access.dirty = dirty;
		}
		Ok(())
	}

	fn merge(&self, fork: HandleId) -> NativeResult<()> {
		let mut state = self.state.lock();
		state.fork_mut(fork, "merge")?;
		let Object::Access(access) = state.remove_access(fork, "fork")? else {
			return Err(NativeError::UnknownHandle(fork));
		};
		for address in &access.dirty {
			match access.store.get(address) {
				Some(data) => state.committed.insert(address.clone(), data.clone()),
				None => state.committed.remove(address),
			};
		}
		debug!(fork = %fork, changed = access.dirty.len(), "Merged fork");
		Ok(())
	}

	fn open(&self, access: HandleId, address: &IndexAddress, kind: IndexKind) -> NativeResult<HandleId> {
		if let Some(reason) = check_name(address) {
			return Err(NativeError::InvalidName {
				name: address.name().to_owned(),
				reason,
			});
		}
		let mut state = self.state.lock();
		let access_state = state.access_mut(access)?;
		match access_state.store.get(address) {
			Some(existing) if existing.kind() != kind => {
				return Err(NativeError::WrongType {
					address: address.clone(),
					expected: kind,
					actual: existing.kind(),
				});
			}
			Some(_) => {}
			None => {
				// The index type is persisted once a fork first opens the address.
				access_state.store.insert(address.clone(), IndexData::empty(kind));
				if access_state.kind.is_writable() {
					access_state.dirty.insert(address.clone());
				}
			}
		}
		Ok(state.allocate(Object::Index {
			access,
			address: address.clone(),
			kind,
		}))
	}

	fn dispose(&self, index: HandleId) -> NativeResult<()> {
		self.state.lock().remove(index, "index", |o| matches!(o, Object::Index { .. })).map(drop)
	}

	fn clear(&self, index: HandleId) -> NativeResult<()> {
		self.state.lock().data_mut(index, None)?.clear();
		Ok(())
	}

	fn list_len(&self, list: HandleId) -> NativeResult<u64> {
		Ok(self.state.lock().list(list)?.len() as u64)
	}

	fn list_get(&self, list: HandleId, index: u64) -> NativeResult<Option<Vec<u8>>> {
		let state = self.state.lock();
		let items = state.list(list)?;
		Ok(usize::try_from(index).ok().and_then(|i| items.get(i)).cloned())
	}

	fn list_push(&self, list: HandleId, value: Vec<u8>) -> NativeResult<()> {
		self.state.lock().list_mut(list)?.push(value);
		Ok(())
	}

	fn list_set(&self, list: HandleId, index: u64, value: Vec<u8>) -> NativeResult<()> {
		let mut state = self.state.lock();
		let items = state.list_mut(list)?;
		let len = items.len() as u64;
		match usize::try_from(index).ok().and_then(|i| items.get_mut(i)) {
			Some(slot) => {
				*slot = value;
				Ok(())
			}
			None => Err(NativeError::IndexOutOfBounds { index, len }),
		}
	}

	fn list_pop(&self, list: HandleId) -> NativeResult<Option<Vec<u8>>> {
		Ok(self.state.lock().list_mut(list)?.pop())
	}

	fn list_truncate(&self, list: HandleId, len: u64) -> NativeResult<()> {
		let mut state = self.state.lock();
		state.list_mut(list)?.truncate(usize::try_from(len).unwrap_or(usize::MAX));
		Ok(())
	}

	fn map_get(&self, map: HandleId, key: &[u8]) -> NativeResult<Option<Vec<u8>>> {
		Ok(self.state.lock().map(map)?.get(key).cloned())
	}

	fn map_put(&self, map: HandleId, key: Vec<u8>, value: Vec<u8>) -> NativeResult<()> {
		self.state.lock().map_mut(map)?.insert(key, value);
		Ok(())
	}

	fn map_remove(&self, map: HandleId, key: &[u8]) -> NativeResult<()> {
		self.state.lock().map_mut(map)?.remove(key);
		Ok(())
	}

	fn set_contains(&self, set: HandleId, key: &[u8]) -> NativeResult<bool> {
		Ok(self.state.lock().key_set(set)?.contains(key))
	}

	fn set_insert(&self, set: HandleId, key: Vec<u8>) -> NativeResult<()> {
		self.state.lock().key_set_mut(set)?.insert(key);
		Ok(())
	}

	fn set_remove(&self, set: HandleId, key: &[u8]) -> NativeResult<()> {
		self.state.lock().key_set_mut(set)?.remove(key);
		Ok(())
	}

	fn entry_get(&self, entry: HandleId) -> NativeResult<Option<Vec<u8>>> {
		Ok(self.state.lock().entry(entry)?.cloned())
	}

	fn entry_set(&self, entry: HandleId, value: Vec<u8>) -> NativeResult<()> {
		*self.state.lock().entry_mut(entry)? = Some(value);
		Ok(())
	}

	fn entry_remove(&self, entry: HandleId) -> NativeResult<()> {
		*self.state.lock().entry_mut(entry)? = None;
		Ok(())
	}

	fn iter_open(&self, index: HandleId, mode: IterMode) -> NativeResult<HandleId> {
		let mut state = self.state.lock();
		let (_, _, kind) = state.index_target(index, None)?;
		let cursor = match kind {
			IndexKind::List => IterCursor::Position(0),
			IndexKind::Map | IndexKind::KeySet => IterCursor::After(None),
			IndexKind::Entry => return Err(NativeError::NotIterable(kind)),
		};
		Ok(state.allocate(Object::Iter(IterState { index, mode, cursor })))
	}

	fn iter_next(&self, iter: HandleId) -> NativeResult<Option<NativeItem>> {
		let mut state = self.state.lock();
		let IterState { index, mode, cursor } = state.iter_state(iter)?;
		let (_, _, kind) = state.index_target(index, None)?;

		let (item, cursor) = match (kind, cursor) {
			(IndexKind::List, IterCursor::Position(position)) => {
				let items = state.list(index)?;
				match usize::try_from(position).ok().and_then(|i| items.get(i)).cloned() {
					Some(value) => (Some(NativeItem::Value(value)), IterCursor::Position(position + 1)),
					None => (None, IterCursor::Position(position)),
				}
			}
			(IndexKind::Map, IterCursor::After(last)) => {
				let next = state.map(index)?.range::<[u8], _>(after(&last)).next().map(|(k, v)| (k.clone(), v.clone()));
				match next {
					Some((key, value)) => {
						let item = match mode {
							IterMode::Keys => NativeItem::Value(key.clone()),
							IterMode::Values => NativeItem::Value(value),
							IterMode::Entries => NativeItem::Entry { key: key.clone(), value },
						};
						(Some(item), IterCursor::After(Some(key)))
					}
					None => (None, IterCursor::After(last)),
				}
			}
			(IndexKind::KeySet, IterCursor::After(last)) => {
				let next = state.key_set(index)?.range::<[u8], _>(after(&last)).next().cloned();
				match next {
					Some(key) => (Some(NativeItem::Value(key.clone())), IterCursor::After(Some(key))),
					None => (None, IterCursor::After(last)),
				}
			}
			(kind, _) => return Err(NativeError::NotIterable(kind)),
		};

		if let Some(Object::Iter(iter_state)) = state.objects.get_mut(&iter) {
			iter_state.cursor = cursor;
		}
		Ok(item)
	}

	fn iter_dispose(&self, iter: HandleId) -> NativeResult<()> {
		self.state.lock().remove(iter, "iterator", |o| matches!(o, Object::Iter(_))).map(drop)
	}
}
