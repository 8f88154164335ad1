//! The wrapper side of the identity relation.
//!
//! Every wrapper embeds a [`ResourceCore`]: the closable native reference, the identity it
//! is cached under, its owning device, and a weak back-reference to the manager it was
//! registered with. The manager only ever holds wrappers weakly, so the core is what
//! removes the cache entry when the wrapper dies or is closed.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use crate::closable::ClosablePtr;
use crate::device::Device;
use crate::error::{InteropError, Result};
use crate::native::{NativeIdentity, NativeResource};
use crate::resolver::WrapperKind;
use crate::resource_manager::ResourceManager;
use crate::resources::{CanvasBitmap, CanvasBrush, CanvasRenderTarget};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

pub struct ResourceCore {
    native: ClosablePtr<Arc<dyn NativeResource>>,
    identity: NativeIdentity,
    device: Option<Arc<Device>>,
    token: u64,
    manager: Mutex<Weak<ResourceManager>>,
}

impl ResourceCore {
    pub fn new(native: Arc<dyn NativeResource>, device: Option<Arc<Device>>) -> Result<Self> {
        let identity = native.identity();
        if identity.is_null() {
            return Err(InteropError::InvalidArgument("native resource is null"));
        }
        Ok(Self {
            native: ClosablePtr::new(native),
            identity,
            device,
            token: NEXT_TOKEN.fetch_add(1, Ordering::Relaxed),
            manager: Mutex::new(Weak::new()),
        })
    }

    pub fn identity(&self) -> NativeIdentity {
        self.identity
    }

    pub fn device(&self) -> Option<&Arc<Device>> {
        self.device.as_ref()
    }

    pub(crate) fn token(&self) -> u64 {
        self.token
    }

    /// Fails if this wrapper or the device it traces to has been closed.
    pub fn ensure_not_closed(&self) -> Result<()> {
        self.native.with(|_| ())?;
        match &self.device {
            Some(device) => device.ensure_not_closed(),
            None => Ok(()),
        }
    }

    pub fn native(&self) -> Result<Arc<dyn NativeResource>> {
        self.ensure_not_closed()?;
        self.native.ensure_not_closed()
    }

    pub fn with_native<R>(&self, f: impl FnOnce(&dyn NativeResource) -> R) -> Result<R> {
        self.ensure_not_closed()?;
        self.native.with(|native| f(native.as_ref()))
    }

    pub fn is_closed(&self) -> bool {
        self.native.is_closed() || self.device.as_ref().is_some_and(|d| d.is_closed())
    }

    /// Release the native resource and leave the identity cache.
    pub fn close(&self) {
        if self.native.close() {
            debug!(identity = ?self.identity, "wrapper closed");
            self.deregister();
        }
    }

    /// Point the back-reference at `manager`. A wrapper still registered with another
    /// live manager cannot be attached.
    pub(crate) fn attach(&self, manager: &Arc<ResourceManager>) -> Result<()> {
        let mut current = self.manager.lock();
        if current.upgrade().is_some_and(|m| !Arc::ptr_eq(&m, manager)) {
            return Err(InteropError::InvalidArgument(
                "wrapper is registered with another manager",
            ));
        }
        *current = Arc::downgrade(manager);
        Ok(())
    }

    pub(crate) fn detach(&self, manager: &ResourceManager) {
        let mut current = self.manager.lock();
        if std::ptr::eq(current.as_ptr(), manager) {
            *current = Weak::new();
        }
    }

    pub(crate) fn manager(&self) -> Option<Arc<ResourceManager>> {
        self.manager.lock().upgrade()
    }

    fn deregister(&self) {
        if let Some(manager) = self.manager() {
            manager.forget(self.identity, self.token);
            self.detach(&manager);
        }
    }
}

impl Drop for ResourceCore {
    fn drop(&mut self) {
        self.deregister();
    }
}

impl fmt::Debug for ResourceCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCore")
            .field("identity", &self.identity)
            .field("closed", &self.is_closed())
            .field("has_device", &self.device.is_some())
            .finish()
    }
}

/// A caller-facing object standing for exactly one native resource.
///
/// The `query_*` methods are the capability check: a concrete wrapper answers `Some` for
/// each interface it implements.
pub trait ResourceWrapper: Any + Send + Sync {
    fn core(&self) -> &ResourceCore;

    fn kind(&self) -> WrapperKind;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    fn query_bitmap(self: Arc<Self>) -> Option<Arc<dyn CanvasBitmap>> {
        None
    }

    fn query_render_target(self: Arc<Self>) -> Option<Arc<dyn CanvasRenderTarget>> {
        None
    }

    fn query_brush(self: Arc<Self>) -> Option<Arc<dyn CanvasBrush>> {
        None
    }

    fn identity(&self) -> NativeIdentity {
        self.core().identity()
    }

    /// Wrapper to native interop.
    fn native_resource(&self) -> Result<Arc<dyn NativeResource>> {
        self.core().native()
    }

    fn device(&self) -> Option<Arc<Device>> {
        self.core().device().cloned()
    }

    fn ensure_not_closed(&self) -> Result<()> {
        self.core().ensure_not_closed()
    }

    fn is_closed(&self) -> bool {
        self.core().is_closed()
    }

    fn close(&self) {
        self.core().close();
    }
}

/// A view of a wrapper that callers can ask for by type.
pub trait Interface: 'static {
    const NAME: &'static str;

    fn query(wrapper: Arc<dyn ResourceWrapper>) -> Option<Arc<Self>>;
}

impl Interface for dyn ResourceWrapper {
    const NAME: &'static str = "CanvasResource";

    fn query(wrapper: Arc<dyn ResourceWrapper>) -> Option<Arc<Self>> {
        Some(wrapper)
    }
}

pub(crate) fn downcast_wrapper<T: ResourceWrapper>(
    wrapper: Arc<dyn ResourceWrapper>,
) -> Option<Arc<T>> {
    wrapper.into_any().downcast::<T>().ok()
}

/// Whether two interface views refer to the same wrapper object.
pub fn is_same_instance<A: ?Sized, B: ?Sized>(a: &Arc<A>, b: &Arc<B>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
