use std::sync::Arc;

use parking_lot::Mutex;
use tether_lifecycle::{Cleaner, NativeHandle, ProxyDestructor};
use tether_native::{AccessKind, MemoryBackend, NativeBackend, NativeError};
use tether_primitives::{HandleId, IndexAddress, IntoAddress};
use tracing::{debug, warn};

use crate::codec::{Codec, PostcardCodec};
use crate::proxy::{EntryProxy, KeySetProxy, ListProxy, MapProxy, ProxyCore, StorageIndex};
use crate::registry::{OpenIndexRegistry, type_label};
use crate::{ModificationTracker, Result, StorageConfig, StorageError};

/// Entry point: creates snapshots and forks of the committed state and merges patches back.
#[derive(Clone)]
pub struct Database {
	backend: Arc<dyn NativeBackend>,
	config: StorageConfig,
}

impl Database {
	pub fn new(backend: Arc<dyn NativeBackend>) -> Self {
		Self::with_config(backend, StorageConfig::default())
	}

	pub fn with_config(backend: Arc<dyn NativeBackend>, config: StorageConfig) -> Self {
		Self { backend, config }
	}

	/// Creates a database over a fresh [`MemoryBackend`].
	pub fn in_memory() -> Self {
		Self::new(Arc::new(MemoryBackend::new()))
	}

	pub fn config(&self) -> &StorageConfig {
		&self.config
	}

	pub fn backend(&self) -> &Arc<dyn NativeBackend> {
		&self.backend
	}

	/// Opens a read-only view of the committed state, torn down no later than `parent`.
	pub fn snapshot(&self, parent: &Cleaner) -> Result<Snapshot> {
		Scope::open(self, AccessKind::Snapshot, parent).map(Snapshot)
	}

	/// Opens a writable working copy of the committed state, torn down no later than `parent`.
	pub fn fork(&self, parent: &Cleaner) -> Result<Fork> {
		Scope::open(self, AccessKind::Fork, parent).map(Fork)
	}

	/// Applies a patch to the committed state.
	pub fn merge(&self, mut patch: Patch) -> Result<()> {
		if !std::ptr::addr_eq(Arc::as_ptr(&self.backend), Arc::as_ptr(&patch.backend)) {
			return Err(StorageError::IllegalState("patch was created by another database".to_owned()));
		}
		self.backend.merge(patch.fork)?;
		patch.merged = true;
		debug!(fork = %patch.fork, "Merged patch");
		Ok(())
	}
}

impl std::fmt::Debug for Database {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Database").field("config", &self.config).finish_non_exhaustive()
	}
}

/// Context under which proxies are opened: a snapshot or a fork.
///
/// Owns a cleaner, a modification tracker shared by all its proxies and cursors, and the table of
/// open proxies. Clones refer to the same scope.
#[derive(Clone)]
pub struct Scope {
	inner: Arc<ScopeInner>,
}

struct ScopeInner {
	kind: AccessKind,
	handle: Arc<NativeHandle>,
	destructor: ProxyDestructor,
	backend: Arc<dyn NativeBackend>,
	config: StorageConfig,
	cleaner: Cleaner,
	/// Cleaner of everything opened in the scope; replaced on rollback.
	indexes: Mutex<Cleaner>,
	tracker: ModificationTracker,
	registry: OpenIndexRegistry,
}

impl Scope {
	fn open(database: &Database, kind: AccessKind, parent: &Cleaner) -> Result<Self> {
		let config = database.config;
		let cleaner = parent.child_with_config(config.cleaner)?;
		let access = database.backend.open_access(kind)?;
		let handle = Arc::new(NativeHandle::new(access));
		let backend = database.backend.clone();
		let destructor = ProxyDestructor::new_registered(&cleaner, handle.clone(), kind.as_str(), move |id| {
			backend.dispose_access(id).map_err(Into::into)
		})?;
		let registry = OpenIndexRegistry::default();
		let indexes = index_cleaner(&cleaner, &registry)?;
		debug!(access = %access, kind = %kind, cleaner = %cleaner.id(), "Opened scope");

		Ok(Self {
			inner: Arc::new(ScopeInner {
				kind,
				handle,
				destructor,
				backend: database.backend.clone(),
				config,
				cleaner,
				indexes: Mutex::new(indexes),
				tracker: ModificationTracker::new(),
				registry,
			}),
		})
	}

	pub fn kind(&self) -> AccessKind {
		self.inner.kind
	}

	pub fn is_writable(&self) -> bool {
		self.inner.kind.is_writable()
	}

	/// Returns true until the scope's cleaner has run.
	pub fn is_open(&self) -> bool {
		self.inner.handle.is_valid()
	}

	pub fn tracker(&self) -> &ModificationTracker {
		&self.inner.tracker
	}

	pub fn cleaner(&self) -> &Cleaner {
		&self.inner.cleaner
	}

	pub fn config(&self) -> &StorageConfig {
		&self.inner.config
	}

	/// Returns the number of distinct indexes currently open in this scope.
	pub fn open_indexes(&self) -> usize {
		self.inner.registry.len()
	}

	/// Records a structural modification in the scope tracker.
	///
	/// Fails with [`StorageError::UnsupportedMutation`] on a snapshot.
	pub fn notify_modified(&self) -> Result<()> {
		self.access()?;
		if !self.is_writable() {
			return Err(StorageError::UnsupportedMutation {
				target: self.describe(),
			});
		}
		self.inner.tracker.notify_modified();
		Ok(())
	}

	/// Destroys everything opened in the scope, most recent first, then the scope itself.
	///
	/// Idempotent.
	pub fn close(&self) -> Result<()> {
		debug!(scope = %self.describe(), "Closing scope");
		self.inner.cleaner.close()?;
		Ok(())
	}

	pub fn list<T>(&self, address: impl IntoAddress) -> Result<ListProxy<T>>
	where
		T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static,
	{
		self.list_with_codec(address, PostcardCodec::new())
	}

	pub fn list_with_codec<T>(&self, address: impl IntoAddress, codec: impl Codec<T>) -> Result<ListProxy<T>>
	where
		T: Send + Sync + 'static,
	{
		let codec: Arc<dyn Codec<T>> = Arc::new(codec);
		self.open_index(address, move |core| ListProxy::new(core, codec))
	}

	pub fn map<K, V>(&self, address: impl IntoAddress) -> Result<MapProxy<K, V>>
	where
		K: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static,
		V: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static,
	{
		self.map_with_codecs(address, PostcardCodec::new(), PostcardCodec::new())
	}

	pub fn map_with_codecs<K, V>(&self, address: impl IntoAddress, keys: impl Codec<K>, values: impl Codec<V>) -> Result<MapProxy<K, V>>
	where
		K: Send + Sync + 'static,
		V: Send + Sync + 'static,
	{
		let keys: Arc<dyn Codec<K>> = Arc::new(keys);
		let values: Arc<dyn Codec<V>> = Arc::new(values);
		self.open_index(address, move |core| MapProxy::new(core, keys, values))
	}

	pub fn key_set<T>(&self, address: impl IntoAddress) -> Result<KeySetProxy<T>>
	where
		T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static,
	{
		let codec: Arc<dyn Codec<T>> = Arc::new(PostcardCodec::new());
		self.open_index(address, move |core| KeySetProxy::new(core, codec))
	}

	pub fn entry<T>(&self, address: impl IntoAddress) -> Result<EntryProxy<T>>
	where
		T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static,
	{
		let codec: Arc<dyn Codec<T>> = Arc::new(PostcardCodec::new());
		self.open_index(address, move |core| EntryProxy::new(core, codec))
	}

	/// Opens the proxy at `address`, or returns the instance already open in this scope.
	///
	/// Every check that can fail runs before the native index is allocated; the destructor is
	/// registered right after allocation, before the proxy exists.
	fn open_index<P, B>(&self, address: impl IntoAddress, build: B) -> Result<P>
	where
		P: StorageIndex + Clone + Send + Sync + 'static,
		B: FnOnce(Arc<ProxyCore>) -> P,
	{
		let address = address.into_address()?;
		let access = self.access()?;
		self.inner.registry.get_or_open(&address, || {
			let native = self.inner.backend.open(access, &address, P::KIND).map_err(|err| open_error::<P>(err, &address))?;
			let handle = Arc::new(NativeHandle::new(native));
			let backend = self.inner.backend.clone();
			let destructor = ProxyDestructor::new_registered(&self.index_cleaner(), handle.clone(), P::KIND.as_str(), move |id| {
				backend.dispose(id).map_err(Into::into)
			})?;
			debug!(address = %address, kind = %P::KIND, handle = %native, "Opened index");
			Ok(build(Arc::new(ProxyCore::new(handle, address.clone(), P::KIND, self.clone(), destructor))))
		})
	}

	pub(crate) fn access(&self) -> Result<HandleId> {
		self.inner.handle.get().map_err(|_| StorageError::UseAfterFree {
			resource: self.describe(),
		})
	}

	pub(crate) fn backend(&self) -> &Arc<dyn NativeBackend> {
		&self.inner.backend
	}

	pub(crate) fn registry(&self) -> &OpenIndexRegistry {
		&self.inner.registry
	}

	/// Cleaner that proxies and cursors of this scope register their destructors in.
	pub(crate) fn index_cleaner(&self) -> Cleaner {
		self.inner.indexes.lock().clone()
	}

	fn describe(&self) -> String {
		format!("{} {}", self.inner.kind, self.inner.handle)
	}
}

impl std::fmt::Debug for Scope {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Scope")
			.field("kind", &self.inner.kind)
			.field("handle", &self.inner.handle)
			.field("tracker", &self.inner.tracker.current_value())
			.field("registry", &self.inner.registry)
			.finish()
	}
}

/// Creates the cleaner for a scope's indexes. Its first action clears the open-index table, so
/// the table is emptied after every proxy in it has been destroyed.
fn index_cleaner(scope_cleaner: &Cleaner, registry: &OpenIndexRegistry) -> Result<Cleaner> {
	let indexes = scope_cleaner.child()?;
	let registry = registry.clone();
	indexes.add_fn("open index registry", move || {
		registry.clear();
		Ok(())
	})?;
	Ok(indexes)
}

fn open_error<P>(err: NativeError, address: &IndexAddress) -> StorageError {
	match err {
		NativeError::WrongType { actual, .. } => StorageError::WrongType {
			address: address.clone(),
			requested: type_label::<P>(),
			existing: format!("{actual} index"),
		},
		NativeError::InvalidName { name, reason } => StorageError::InvalidArgument(format!("index name {name:?}: {reason}")),
		other => StorageError::Native(other),
	}
}

/// Read-only scope over the committed state at creation time.
#[derive(Debug, Clone)]
pub struct Snapshot(Scope);

impl std::ops::Deref for Snapshot {
	type Target = Scope;

	fn deref(&self) -> &Scope {
		&self.0
	}
}

/// Writable scope whose changes can be merged back as a [`Patch`].
#[derive(Debug, Clone)]
pub struct Fork(Scope);

impl std::ops::Deref for Fork {
	type Target = Scope;

	fn deref(&self) -> &Scope {
		&self.0
	}
}

impl Fork {
	/// Makes the current state the target of the next [`Fork::rollback`].
	pub fn create_checkpoint(&self) -> Result<()> {
		let access = self.access()?;
		self.backend().checkpoint(access)?;
		debug!(fork = %access, "Created checkpoint");
		Ok(())
	}

	/// Reverts the fork to the last checkpoint, or to its initial state.
	///
	/// Every proxy and cursor opened in this fork is destroyed first; opening the same addresses
	/// again yields fresh proxies.
	pub fn rollback(&self) -> Result<()> {
		let access = self.access()?;
		let fresh = index_cleaner(&self.inner.cleaner, &self.inner.registry)?;
		let stale = std::mem::replace(&mut *self.inner.indexes.lock(), fresh);
		let closed = stale.close();
		self.inner.tracker.notify_modified();
		self.backend().rollback(access)?;
		debug!(fork = %access, "Rolled back fork");
		closed?;
		Ok(())
	}

	/// Destroys every proxy of the fork and turns the fork into a patch for [`Database::merge`].
	pub fn into_patch(self) -> Result<Patch> {
		let access = self.access()?;
		self.index_cleaner().close()?;
		self.inner.destructor.cancel();
		self.inner.handle.invalidate();
		self.inner.cleaner.close()?;
		debug!(fork = %access, "Converted fork into patch");
		Ok(Patch {
			fork: access,
			backend: self.inner.backend.clone(),
			merged: false,
		})
	}
}

/// Changes of a fork, ready to be merged. Dropping an unmerged patch discards it.
pub struct Patch {
	fork: HandleId,
	backend: Arc<dyn NativeBackend>,
	merged: bool,
}

impl std::fmt::Debug for Patch {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Patch").field("fork", &self.fork).field("merged", &self.merged).finish()
	}
}

impl Drop for Patch {
	fn drop(&mut self) {
		if self.merged {
			return;
		}
		if let Err(err) = self.backend.dispose_access(self.fork) {
			warn!(fork = %self.fork, error = %err, "Failed to discard unmerged patch");
		}
	}
}
