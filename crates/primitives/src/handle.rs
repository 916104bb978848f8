/// Opaque identifier of an object owned by the native library.
///
/// Handles are plain integers on this side of the boundary and are never dereferenced here;
/// only the native backend knows what a given id refers to. The zero id is reserved and never
/// identifies a live object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
	/// The reserved id that never identifies a live object.
	pub const INVALID: Self = Self(0);

	/// Wraps a raw id returned by the native library.
	pub const fn new(raw: u64) -> Self {
		Self(raw)
	}

	/// Returns the raw id to pass back to the native library.
	pub const fn raw(self) -> u64 {
		self.0
	}

	/// Returns false for the reserved zero id.
	pub const fn is_valid(self) -> bool {
		self.0 != 0
	}
}

impl std::fmt::Display for HandleId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{:#X}", self.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn zero_is_invalid() {
		assert!(!HandleId::INVALID.is_valid());
		assert!(!HandleId::new(0).is_valid());
		assert!(HandleId::new(0x1F).is_valid());
	}

	#[test]
	fn displays_as_hex() {
		assert_eq!(HandleId::new(0x1F).to_string(), "0x1F");
	}
}
