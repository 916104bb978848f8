//! Scoped, typed proxies to indexes held by a native storage library.
//!
//! A [`Database`] hands out [`Snapshot`]s and [`Fork`]s, each tied to a caller-owned
//! [`Cleaner`](tether_lifecycle::Cleaner). Inside a scope, indexes are opened by address as
//! [`ListProxy`], [`MapProxy`], [`KeySetProxy`] or [`EntryProxy`]; opening an address twice
//! returns the same proxy instance. Everything a scope allocates natively is destroyed when its
//! cleaner closes, most recent first, and any later use fails with
//! [`StorageError::UseAfterFree`] instead of touching freed memory.
//!
//! Iteration goes through fail-fast cursors. A [`SequenceCursor`] pulls from a native iterator;
//! a [`SplittableCursor`] walks a list by position and splits in halves for parallel traversal,
//! and [`ParallelSequence`] plugs it into rayon. Each cursor captures the scope's
//! [`ModificationTracker`] on first use and reports [`StorageError::ConcurrentModification`] as
//! soon as the scope was structurally modified since.

pub mod codec;
mod config;
mod cursor;
mod error;
mod invariants;
pub mod proxy;
mod registry;
mod scope;
mod tracker;

pub use codec::{Codec, CodecError, PostcardCodec};
pub use config::{ConfigError, CursorConfig, MIN_SPLITTABLE_SIZE, StorageConfig};
pub use cursor::{CursorStatus, ParallelSequence, SequenceCursor, SplittableCursor};
pub use error::{Result, StorageError};
pub use proxy::{EntryProxy, KeySetProxy, ListProxy, MapProxy, ProxyCore, StorageIndex};
pub use scope::{Database, Fork, Patch, Scope, Snapshot};
pub use tracker::ModificationTracker;
