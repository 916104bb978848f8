//! Element codecs: how values cross the native boundary as bytes.

use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tether_lifecycle::BoxError;
use thiserror::Error;

/// Converts index elements to and from their stored byte form.
pub trait Codec<T>: Send + Sync + 'static {
	fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError>;
	fn decode(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// Failure to encode or decode an element.
#[derive(Debug, Error)]
#[error("failed to {operation} {type_name}: {source}")]
pub struct CodecError {
	pub operation: &'static str,
	pub type_name: &'static str,
	#[source]
	pub source: BoxError,
}

impl CodecError {
	pub fn encode<T>(source: impl Into<BoxError>) -> Self {
		Self {
			operation: "encode",
			type_name: std::any::type_name::<T>(),
			source: source.into(),
		}
	}

	pub fn decode<T>(source: impl Into<BoxError>) -> Self {
		Self {
			operation: "decode",
			type_name: std::any::type_name::<T>(),
			source: source.into(),
		}
	}
}

/// The standard codec: serde values in postcard encoding.
pub struct PostcardCodec<T>(PhantomData<fn() -> T>);

impl<T> PostcardCodec<T> {
	pub const fn new() -> Self {
		Self(PhantomData)
	}
}

impl<T> Default for PostcardCodec<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> Clone for PostcardCodec<T> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<T> Copy for PostcardCodec<T> {}

impl<T> std::fmt::Debug for PostcardCodec<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "PostcardCodec<{}>", std::any::type_name::<T>())
	}
}

impl<T> Codec<T> for PostcardCodec<T>
where
	T: Serialize + DeserializeOwned + 'static,
{
	fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError> {
		postcard::to_stdvec(value).map_err(CodecError::encode::<T>)
	}

	fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
		postcard::from_bytes(bytes).map_err(CodecError::decode::<T>)
	}
}
