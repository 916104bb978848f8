use std::collections::{BTreeMap, BTreeSet};

use tether_primitives::{IndexAddress, IndexKind};

pub(super) type Store = BTreeMap<IndexAddress, IndexData>;

pub(super) static EMPTY_MAP: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
pub(super) static EMPTY_SET: BTreeSet<Vec<u8>> = BTreeSet::new();

/// Contents of one index. The variant doubles as the persisted index type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum IndexData {
	List(Vec<Vec<u8>>),
	Map(BTreeMap<Vec<u8>, Vec<u8>>),
	KeySet(BTreeSet<Vec<u8>>),
	Entry(Option<Vec<u8>>),
}

impl IndexData {
	pub(super) fn empty(kind: IndexKind) -> Self {
		match kind {
			IndexKind::List => Self::List(Vec::new()),
			IndexKind::Map => Self::Map(BTreeMap::new()),
			IndexKind::KeySet => Self::KeySet(BTreeSet::new()),
			IndexKind::Entry => Self::Entry(None),
		}
	}

	pub(super) fn kind(&self) -> IndexKind {
		match self {
			Self::List(_) => IndexKind::List,
			Self::Map(_) => IndexKind::Map,
			Self::KeySet(_) => IndexKind::KeySet,
			Self::Entry(_) => IndexKind::Entry,
		}
	}

	pub(super) fn clear(&mut self) {
		match self {
			Self::List(items) => items.clear(),
			Self::Map(entries) => entries.clear(),
			Self::KeySet(keys) => keys.clear(),
			Self::Entry(value) => *value = None,
		}
	}
}

/// Label of an index object of the given kind, for handle type diagnostics.
pub(super) const fn index_label(kind: IndexKind) -> &'static str {
	match kind {
		IndexKind::List => "list index",
		IndexKind::Map => "map index",
		IndexKind::KeySet => "key set index",
		IndexKind::Entry => "entry index",
	}
}

/// Names the native library reserves for its own bookkeeping.
pub(super) fn check_name(address: &IndexAddress) -> Option<&'static str> {
	if address.name().starts_with("__") {
		Some("names starting with \"__\" are reserved")
	} else {
		None
	}
}
