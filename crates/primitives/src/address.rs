use thiserror::Error;

/// Errors produced when an index address is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
	/// The index or group name is empty.
	#[error("index name must not be empty")]
	EmptyName,
	/// The name contains a character outside `[A-Za-z0-9_.-]`.
	#[error("index name {name:?} contains invalid character {character:?}")]
	InvalidCharacter { name: String, character: char },
	/// An index group member was given an empty id.
	#[error("id in group {group:?} must not be empty")]
	EmptyGroupId { group: String },
}

/// Address of an index: a name and, for members of an index group, the id in that group.
///
/// Addresses are validated on construction, so a value of this type is always
/// acceptable to the native library as far as naming is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexAddress {
	name: String,
	id_in_group: Option<Vec<u8>>,
}

impl IndexAddress {
	/// Creates the address of a standalone index.
	pub fn new(name: impl Into<String>) -> Result<Self, AddressError> {
		let name = name.into();
		check_name(&name)?;
		Ok(Self { name, id_in_group: None })
	}

	/// Creates the address of an index that belongs to the group `group`.
	pub fn in_group(group: impl Into<String>, id: impl Into<Vec<u8>>) -> Result<Self, AddressError> {
		let name = group.into();
		check_name(&name)?;
		let id = id.into();
		if id.is_empty() {
			return Err(AddressError::EmptyGroupId { group: name });
		}
		Ok(Self {
			name,
			id_in_group: Some(id),
		})
	}

	/// Returns the index name, or the group name for group members.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Returns the id in the group, if this address belongs to one.
	pub fn id_in_group(&self) -> Option<&[u8]> {
		self.id_in_group.as_deref()
	}
}

impl std::fmt::Display for IndexAddress {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.name)?;
		if let Some(id) = &self.id_in_group {
			f.write_str("[")?;
			for byte in id {
				write!(f, "{byte:02x}")?;
			}
			f.write_str("]")?;
		}
		Ok(())
	}
}

/// Conversion into a validated [`IndexAddress`].
///
/// Lets index constructors accept either a plain name or a prepared address.
pub trait IntoAddress {
	fn into_address(self) -> Result<IndexAddress, AddressError>;
}

impl IntoAddress for IndexAddress {
	fn into_address(self) -> Result<IndexAddress, AddressError> {
		Ok(self)
	}
}

impl IntoAddress for &IndexAddress {
	fn into_address(self) -> Result<IndexAddress, AddressError> {
		Ok(self.clone())
	}
}

impl IntoAddress for &str {
	fn into_address(self) -> Result<IndexAddress, AddressError> {
		IndexAddress::new(self)
	}
}

impl IntoAddress for String {
	fn into_address(self) -> Result<IndexAddress, AddressError> {
		IndexAddress::new(self)
	}
}

fn check_name(name: &str) -> Result<(), AddressError> {
	if name.is_empty() {
		return Err(AddressError::EmptyName);
	}
	match name.chars().find(|c| !is_name_char(*c)) {
		Some(character) => Err(AddressError::InvalidCharacter {
			name: name.to_owned(),
			character,
		}),
		None => Ok(()),
	}
}

fn is_name_char(c: char) -> bool {
	c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}
