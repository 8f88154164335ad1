//! The device wrapper: owner of a native device, its device-context pool and its
//! device-lost event.
//!
//! Every resource wrapper created on a device holds the device strongly and checks it on
//! each access, so closing the device closes the whole tree beneath it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::closable::ClosablePtr;
use crate::error::{InteropError, Result, is_device_lost_hresult};
use crate::event::{EventSource, RegisteredEvent};
use crate::native::{NativeDevice, NativeDeviceContext};
use crate::pool::{DeviceContextLease, DeviceContextPool, PoolStats};
use crate::resolver::WrapperKind;
use crate::resource_manager::ResourceManager;
use crate::wrapper::{Interface, ResourceCore, ResourceWrapper, downcast_wrapper};

pub type DeviceContext = Box<dyn NativeDeviceContext>;

pub struct Device {
    core: ResourceCore,
    native: ClosablePtr<Arc<dyn NativeDevice>>,
    pool: DeviceContextPool<DeviceContext>,
    device_lost: Arc<EventSource<Arc<Device>>>,
}

impl Device {
    /// Build an unregistered wrapper. Most callers want [`Device::create`].
    pub fn wrap(native: Arc<dyn NativeDevice>) -> Result<Arc<Self>> {
        let core = ResourceCore::new(native.clone().as_resource(), None)?;
        let factory_device = native.clone();
        let pool = DeviceContextPool::new(move || factory_device.create_device_context());
        Ok(Arc::new(Self {
            core,
            native: ClosablePtr::new(native),
            pool,
            device_lost: Arc::new(EventSource::new()),
        }))
    }

    /// The wrapper for `native` in `manager`, created and registered on first use.
    pub fn create(
        manager: &Arc<ResourceManager>,
        native: Arc<dyn NativeDevice>,
    ) -> Result<Arc<Self>> {
        let identity = native.identity();
        let wrapper = manager.get_or_create_with(identity, || {
            let device: Arc<dyn ResourceWrapper> = Self::wrap(native)?;
            Ok(device)
        })?;
        let actual = wrapper.kind().name();
        Self::query(wrapper).ok_or(InteropError::InterfaceNotSupported {
            requested: Self::NAME,
            actual,
        })
    }

    pub fn native_device(&self) -> Result<Arc<dyn NativeDevice>> {
        self.core.ensure_not_closed()?;
        self.native.ensure_not_closed()
    }

    /// The manager this device is registered with. Resources created from the device
    /// register there too.
    pub fn manager(&self) -> Result<Arc<ResourceManager>> {
        self.ensure_not_closed()?;
        self.core.manager().ok_or(InteropError::InvalidArgument(
            "device is not registered with a resource manager",
        ))
    }

    pub fn lease_device_context(&self) -> Result<DeviceContextLease<DeviceContext>> {
        self.ensure_not_closed()?;
        self.pool.take_lease()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn add_device_lost(
        &self,
        handler: impl Fn(&Arc<Device>) + Send + Sync + 'static,
    ) -> Result<RegisteredEvent> {
        self.ensure_not_closed()?;
        RegisteredEvent::subscribe(&self.device_lost, handler)
    }

    pub fn raise_device_lost(self: &Arc<Self>) {
        debug!(identity = ?self.identity(), handlers = self.device_lost.len(), "device lost");
        self.device_lost.invoke(self);
    }

    /// Whether `hresult` reports that this device was lost. Device-lost codes only count
    /// when the native device itself agrees it has been removed.
    pub fn is_device_lost(&self, hresult: i32) -> Result<bool> {
        let native = self.native_device()?;
        Ok(is_device_lost_hresult(hresult) && native.is_removed())
    }

    pub fn is_removed(&self) -> bool {
        self.native_device().map_or(true, |native| native.is_removed())
    }
}

impl ResourceWrapper for Device {
    fn core(&self) -> &ResourceCore {
        &self.core
    }

    fn kind(&self) -> WrapperKind {
        WrapperKind::Device
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    /// Destroys idle device contexts now and leased ones as their leases end. Every
    /// wrapper created on this device reports closed from here on.
    fn close(&self) {
        if self.native.close() {
            self.pool.close();
            debug!(identity = ?self.identity(), "device closed");
        }
        self.core.close();
    }
}

impl Interface for Device {
    const NAME: &'static str = "CanvasDevice";

    fn query(wrapper: Arc<dyn ResourceWrapper>) -> Option<Arc<Self>> {
        downcast_wrapper(wrapper)
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("core", &self.core)
            .field("pool", &self.pool)
            .finish()
    }
}
