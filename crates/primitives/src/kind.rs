/// Kind of a natively-held index.
///
/// The kind of an address is fixed by the first open that persists it; opening the same
/// address as a different kind is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
	/// Append-only list addressed by position.
	List,
	/// Ordered key-value map.
	Map,
	/// Ordered set of keys.
	KeySet,
	/// A single optional value.
	Entry,
}

impl IndexKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::List => "list",
			Self::Map => "map",
			Self::KeySet => "key_set",
			Self::Entry => "entry",
		}
	}
}

impl std::fmt::Display for IndexKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}
