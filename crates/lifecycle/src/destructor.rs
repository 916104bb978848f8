use std::sync::Arc;

use parking_lot::Mutex;
use tether_primitives::HandleId;

use crate::{BoxError, CleanAction, Cleaner, LifecycleError, NativeHandle};

type DestroyFn = Box<dyn FnOnce(HandleId) -> Result<(), BoxError> + Send>;

/// Clean action that invalidates a [`NativeHandle`] and destroys the native object behind it.
///
/// Clones share state, so the owner of a proxy can keep one to destroy the object early or to
/// [`cancel`](Self::cancel) destruction on ownership transfer, while another clone sits in a
/// [`Cleaner`]. Destruction happens at most once across all clones.
#[derive(Clone)]
pub struct ProxyDestructor {
	inner: Arc<DestructorInner>,
}

struct DestructorInner {
	handle: Arc<NativeHandle>,
	resource_type: &'static str,
	destroy: Mutex<Option<DestroyFn>>,
}

impl ProxyDestructor {
	pub fn new<F>(handle: Arc<NativeHandle>, resource_type: &'static str, destroy: F) -> Self
	where
		F: FnOnce(HandleId) -> Result<(), BoxError> + Send + 'static,
	{
		Self {
			inner: Arc::new(DestructorInner {
				handle,
				resource_type,
				destroy: Mutex::new(Some(Box::new(destroy))),
			}),
		}
	}

	/// Creates a destructor and registers it in `cleaner`.
	///
	/// If the cleaner is already closed the native object is destroyed immediately and the
	/// registration error is returned.
	pub fn new_registered<F>(cleaner: &Cleaner, handle: Arc<NativeHandle>, resource_type: &'static str, destroy: F) -> Result<Self, LifecycleError>
	where
		F: FnOnce(HandleId) -> Result<(), BoxError> + Send + 'static,
	{
		let destructor = Self::new(handle, resource_type, destroy);
		cleaner.add(destructor.clone())?;
		Ok(destructor)
	}

	/// Invalidates the handle and runs the destroy function, once.
	///
	/// Does nothing if already destroyed or cancelled, or if the handle was invalidated by
	/// someone else in the meantime.
	pub fn clean(&self) -> Result<(), BoxError> {
		let Some(destroy) = self.inner.destroy.lock().take() else {
			return Ok(());
		};
		match self.inner.handle.invalidate() {
			Some(id) => destroy(id),
			None => Ok(()),
		}
	}

	/// Disarms the destructor without touching the handle.
	///
	/// Returns false if it had already run or been cancelled.
	pub fn cancel(&self) -> bool {
		self.inner.destroy.lock().take().is_some()
	}

	/// Returns true once the destructor has run or been cancelled.
	pub fn is_spent(&self) -> bool {
		self.inner.destroy.lock().is_none()
	}

	pub fn handle(&self) -> &Arc<NativeHandle> {
		&self.inner.handle
	}
}

impl CleanAction for ProxyDestructor {
	fn clean(self: Box<Self>) -> Result<(), BoxError> {
		ProxyDestructor::clean(&self)
	}

	fn resource_type(&self) -> Option<&'static str> {
		Some(self.inner.resource_type)
	}

	fn describe(&self) -> String {
		format!("{} destructor for {}", self.inner.resource_type, self.inner.handle)
	}

	fn is_spent(&self) -> bool {
		ProxyDestructor::is_spent(self)
	}
}

impl std::fmt::Debug for ProxyDestructor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ProxyDestructor")
			.field("resource_type", &self.inner.resource_type)
			.field("handle", &self.inner.handle)
			.field("spent", &self.is_spent())
			.finish()
	}
}
