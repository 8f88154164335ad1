#![allow(dead_code)]

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use canvas_interop::error::DXGI_ERROR_DEVICE_REMOVED;
use canvas_interop::{
    BitmapInfo, Color, Device, DeviceOptions, DeviceProvider, InteropError, NativeDevice,
    NativeDeviceContext, NativeIdentity, NativeKind, NativeResource, ResourceFlags,
    ResourceManager, Result,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug)]
pub struct FakeBitmap {
    info: BitmapInfo,
    flags: ResourceFlags,
}

impl FakeBitmap {
    pub fn new(width: u32, height: u32, flags: ResourceFlags) -> Arc<Self> {
        Arc::new(Self {
            info: BitmapInfo {
                width,
                height,
                dpi: 96.0,
            },
            flags,
        })
    }
}

impl NativeResource for FakeBitmap {
    fn kind(&self) -> NativeKind {
        NativeKind::Bitmap
    }

    fn flags(&self) -> ResourceFlags {
        self.flags
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn bitmap_info(&self) -> Option<BitmapInfo> {
        Some(self.info)
    }
}

/// Brushes, stroke styles, gradients and effects: only the kind matters.
#[derive(Debug)]
pub struct FakeResource {
    kind: NativeKind,
}

impl FakeResource {
    pub fn new(kind: NativeKind) -> Arc<Self> {
        Arc::new(Self { kind })
    }
}

impl NativeResource for FakeResource {
    fn kind(&self) -> NativeKind {
        self.kind
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct NullResource;

impl NativeResource for NullResource {
    fn identity(&self) -> NativeIdentity {
        NativeIdentity::NULL
    }

    fn kind(&self) -> NativeKind {
        NativeKind::Bitmap
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub type CallLog = Arc<Mutex<Vec<&'static str>>>;

#[derive(Default)]
pub struct FakeDevice {
    pub removed: AtomicBool,
    pub fail_end_draw: AtomicBool,
    pub contexts_created: AtomicUsize,
    pub contexts_dropped: Arc<AtomicUsize>,
    pub calls: CallLog,
}

impl FakeDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

impl NativeResource for FakeDevice {
    fn kind(&self) -> NativeKind {
        NativeKind::Device
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_device(self: Arc<Self>) -> Option<Arc<dyn NativeDevice>> {
        Some(self)
    }
}

impl NativeDevice for FakeDevice {
    fn as_resource(self: Arc<Self>) -> Arc<dyn NativeResource> {
        self
    }

    fn create_device_context(&self) -> Result<Box<dyn NativeDeviceContext>> {
        self.contexts_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeContext {
            fail_end_draw: self.fail_end_draw.load(Ordering::SeqCst),
            dropped: self.contexts_dropped.clone(),
            calls: self.calls.clone(),
        }))
    }

    fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }
}

struct FakeContext {
    fail_end_draw: bool,
    dropped: Arc<AtomicUsize>,
    calls: CallLog,
}

impl FakeContext {
    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

impl NativeDeviceContext for FakeContext {
    fn create_bitmap(
        &mut self,
        width: u32,
        height: u32,
        _dpi: f32,
        flags: ResourceFlags,
    ) -> Result<Arc<dyn NativeResource>> {
        self.record("create_bitmap");
        Ok(FakeBitmap::new(width, height, flags))
    }

    fn set_target(&mut self, target: Option<&dyn NativeResource>) -> Result<()> {
        self.record(if target.is_some() { "set_target" } else { "clear_target" });
        Ok(())
    }

    fn begin_draw(&mut self) {
        self.record("begin_draw");
    }

    fn end_draw(&mut self) -> Result<()> {
        self.record("end_draw");
        if self.fail_end_draw {
            return Err(InteropError::native(DXGI_ERROR_DEVICE_REMOVED, "device removed"));
        }
        Ok(())
    }

    fn clear(&mut self, _color: Color) {
        self.record("clear");
    }
}

impl Drop for FakeContext {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeProvider {
    pub created: AtomicUsize,
    pub software_created: AtomicUsize,
}

impl DeviceProvider for FakeProvider {
    fn create_native_device(&self, options: &DeviceOptions) -> Result<Arc<dyn NativeDevice>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        if options.force_software {
            self.software_created.fetch_add(1, Ordering::SeqCst);
        }
        Ok(FakeDevice::new())
    }
}

/// A fresh manager plus a device registered in it.
pub fn manager_and_device() -> (Arc<ResourceManager>, Arc<FakeDevice>, Arc<Device>) {
    init_tracing();
    let manager = ResourceManager::new();
    let native = FakeDevice::new();
    let device = Device::create(&manager, native.clone()).expect("device");
    (manager, native, device)
}

pub fn as_native<T: NativeResource>(resource: &Arc<T>) -> Arc<dyn NativeResource> {
    resource.clone()
}
