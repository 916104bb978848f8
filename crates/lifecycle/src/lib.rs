//! Lifecycle management for objects owned by a native library.
//!
//! A [`NativeHandle`] pairs an opaque [`HandleId`] with a liveness flag that flips exactly once.
//! A [`Cleaner`] collects disposal actions and runs them in reverse registration order when
//! closed, so the most dependent resource is always torn down first. Cleaners nest through
//! [`Cleaner::child`], which keeps the whole ownership graph a tree with one root `close`.
//!
//! [`HandleId`]: tether_primitives::HandleId

mod cleaner;
mod config;
mod destructor;
mod error;
mod handle;

pub use cleaner::{CleanAction, Cleaner, CleanerId};
pub use config::CleanerConfig;
pub use destructor::ProxyDestructor;
pub use error::{ActionPanicked, BoxError, CleanFailure, CloseFailures, LifecycleError};
pub use handle::NativeHandle;
