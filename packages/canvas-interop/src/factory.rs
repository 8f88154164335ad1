//! Device creation and the per-application shared devices.
//!
//! Shared devices live in a [`SharedDeviceState`] stored in the application's
//! [`PropertyBag`], so a factory the host throws away and recreates still hands out the
//! same shared device.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::device::Device;
use crate::error::Result;
use crate::native::NativeDevice;
use crate::resource_manager::ResourceManager;
use crate::singleton::{PerApplicationManager, PropertyBag};
use crate::wrapper::ResourceWrapper;

pub const SHARED_DEVICE_STATE_KEY: &str = "canvas_interop.SharedDeviceState";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceOptions {
    /// Use a software rasterizer instead of the hardware adapter.
    pub force_software: bool,
}

/// Creates the native devices behind [`Device`] wrappers.
pub trait DeviceProvider: Send + Sync {
    fn create_native_device(&self, options: &DeviceOptions) -> Result<Arc<dyn NativeDevice>>;
}

pub struct SharedDeviceState {
    provider: Arc<dyn DeviceProvider>,
    // Indexed by `force_software`.
    devices: Mutex<[Option<Arc<Device>>; 2]>,
}

impl SharedDeviceState {
    fn new(provider: Arc<dyn DeviceProvider>) -> Self {
        Self {
            provider,
            devices: Mutex::new([None, None]),
        }
    }

    fn shared_device(
        &self,
        manager: &Arc<ResourceManager>,
        force_software: bool,
    ) -> Result<Arc<Device>> {
        let mut devices = self.devices.lock();
        let slot = &mut devices[usize::from(force_software)];
        if let Some(device) = slot.as_ref().filter(|d| !d.is_closed() && !d.is_removed()) {
            return Ok(device.clone());
        }
        let native = self
            .provider
            .create_native_device(&DeviceOptions { force_software })?;
        let device = Device::create(manager, native)?;
        debug!(force_software, replaced = slot.is_some(), "shared device created");
        let previous = slot.replace(device.clone());
        drop(devices);
        drop(previous);
        Ok(device)
    }
}

pub struct DeviceFactory {
    state: Arc<PerApplicationManager<SharedDeviceState>>,
    manager: Arc<ResourceManager>,
}

impl DeviceFactory {
    /// Attach to the shared-device state stored in `bag`, creating it on first use.
    /// An existing state keeps the provider it was created with.
    pub fn new(
        bag: &Arc<PropertyBag>,
        provider: Arc<dyn DeviceProvider>,
        manager: Arc<ResourceManager>,
    ) -> Result<Self> {
        let state = PerApplicationManager::get_or_create(bag, SHARED_DEVICE_STATE_KEY, || {
            SharedDeviceState::new(provider)
        })?;
        Ok(Self { state, manager })
    }

    /// A new device, never shared.
    pub fn create_device(&self, options: &DeviceOptions) -> Result<Arc<Device>> {
        let native = self.state.provider.create_native_device(options)?;
        Device::create(&self.manager, native)
    }

    /// The application's shared device, replaced if it was closed or lost.
    pub fn get_shared_device(&self, force_software: bool) -> Result<Arc<Device>> {
        self.state.shared_device(&self.manager, force_software)
    }

    pub fn manager(&self) -> &Arc<ResourceManager> {
        &self.manager
    }
}
