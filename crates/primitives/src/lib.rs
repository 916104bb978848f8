//! Core identifier types: native handle ids, index addresses and index kinds.

/// Index addresses: a validated name plus an optional id in an index group.
pub mod address;
/// Opaque identifiers of objects owned by the native library.
pub mod handle;
/// Type tags of natively-held indexes.
pub mod kind;

pub use address::{AddressError, IndexAddress, IntoAddress};
pub use handle::HandleId;
pub use kind::IndexKind;
