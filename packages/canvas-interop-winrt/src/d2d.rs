//! Direct2D devices and device contexts.

use std::any::Any;
use std::sync::Arc;

use canvas_interop::{
    Color, DeviceOptions, DeviceProvider, InteropError, NativeDevice, NativeDeviceContext,
    NativeIdentity, NativeKind, NativeResource, ResourceFlags, Result,
};
use tracing::debug;
use windows::Win32::Graphics::Direct2D::Common::{
    D2D_SIZE_U, D2D1_ALPHA_MODE_PREMULTIPLIED, D2D1_COLOR_F, D2D1_PIXEL_FORMAT,
};
use windows::Win32::Graphics::Direct2D::{
    D2D1_BITMAP_PROPERTIES1, D2D1_DEVICE_CONTEXT_OPTIONS_NONE, D2D1_FACTORY_TYPE_MULTI_THREADED,
    D2D1CreateFactory, ID2D1ColorContext, ID2D1Device, ID2D1DeviceContext, ID2D1Factory1,
    ID2D1Image,
};
use windows::Win32::Graphics::Direct3D::{
    D3D_DRIVER_TYPE, D3D_DRIVER_TYPE_HARDWARE, D3D_DRIVER_TYPE_WARP, D3D_FEATURE_LEVEL,
    D3D_FEATURE_LEVEL_10_0, D3D_FEATURE_LEVEL_10_1, D3D_FEATURE_LEVEL_11_0,
    D3D_FEATURE_LEVEL_11_1,
};
use windows::Win32::Graphics::Direct3D11::{
    D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_CREATE_DEVICE_FLAG, D3D11_SDK_VERSION,
    D3D11CreateDevice, ID3D11Device,
};
use windows::Win32::Graphics::Dxgi::Common::DXGI_FORMAT_B8G8R8A8_UNORM;
use windows::Win32::Graphics::Dxgi::IDXGIDevice;
use windows::core::{IUnknown, Interface};

use crate::com::{ComResource, com_identity, options_from_flags};
use crate::interop::from_windows_error;

/// An `ID2D1Device`, optionally with the Direct3D device it was created on.
pub struct D2DDevice {
    device: ID2D1Device,
    unknown: IUnknown,
    d3d_device: Option<ID3D11Device>,
}

// SAFETY: the device comes from a multithreaded factory; device contexts created from it
// are handed out one per lease and never shared.
unsafe impl Send for D2DDevice {}
unsafe impl Sync for D2DDevice {}

impl D2DDevice {
    pub fn new(device: ID2D1Device, d3d_device: Option<ID3D11Device>) -> Result<Arc<Self>> {
        let unknown = device.cast().map_err(from_windows_error)?;
        Ok(Arc::new(Self {
            device,
            unknown,
            d3d_device,
        }))
    }

    pub fn device(&self) -> &ID2D1Device {
        &self.device
    }

    pub fn unknown(&self) -> &IUnknown {
        &self.unknown
    }
}

impl NativeResource for D2DDevice {
    fn identity(&self) -> NativeIdentity {
        com_identity(&self.unknown)
    }

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

impl NativeDevice for D2DDevice {
    fn as_resource(self: Arc<Self>) -> Arc<dyn NativeResource> {
        self
    }

    fn create_device_context(&self) -> Result<Box<dyn NativeDeviceContext>> {
        let context = unsafe { self.device.CreateDeviceContext(D2D1_DEVICE_CONTEXT_OPTIONS_NONE) }
            .map_err(from_windows_error)?;
        Ok(Box::new(D2DDeviceContext { context }))
    }

    fn is_removed(&self) -> bool {
        self.d3d_device
            .as_ref()
            .is_some_and(|d3d| unsafe { d3d.GetDeviceRemovedReason() }.is_err())
    }
}

pub struct D2DDeviceContext {
    context: ID2D1DeviceContext,
}

// SAFETY: a context is owned by exactly one lease at a time and only moves between
// threads while idle.
unsafe impl Send for D2DDeviceContext {}

impl D2DDeviceContext {
    pub fn context(&self) -> &ID2D1DeviceContext {
        &self.context
    }
}

impl NativeDeviceContext for D2DDeviceContext {
    fn create_bitmap(
        &mut self,
        width: u32,
        height: u32,
        dpi: f32,
        flags: ResourceFlags,
    ) -> Result<Arc<dyn NativeResource>> {
        let properties = D2D1_BITMAP_PROPERTIES1 {
            pixelFormat: D2D1_PIXEL_FORMAT {
                format: DXGI_FORMAT_B8G8R8A8_UNORM,
                alphaMode: D2D1_ALPHA_MODE_PREMULTIPLIED,
            },
            dpiX: dpi,
            dpiY: dpi,
            bitmapOptions: options_from_flags(flags),
            colorContext: std::mem::ManuallyDrop::new(None::<ID2D1ColorContext>),
        };
        let bitmap = unsafe {
            self.context
                .CreateBitmap(D2D_SIZE_U { width, height }, None, 0, &properties)
        }
        .map_err(from_windows_error)?;
        Ok(ComResource::bitmap(&bitmap)?)
    }

    fn set_target(&mut self, target: Option<&dyn NativeResource>) -> Result<()> {
        let Some(target) = target else {
            unsafe { self.context.SetTarget(None::<&ID2D1Image>) };
            return Ok(());
        };
        let image = target
            .as_any()
            .downcast_ref::<ComResource>()
            .ok_or(InteropError::InvalidArgument("target is not a Direct2D resource"))?
            .interface::<ID2D1Image>()?;
        unsafe { self.context.SetTarget(&image) };
        Ok(())
    }

    fn begin_draw(&mut self) {
        unsafe { self.context.BeginDraw() };
    }

    fn end_draw(&mut self) -> Result<()> {
        unsafe { self.context.EndDraw(None, None) }.map_err(from_windows_error)
    }

    fn clear(&mut self, color: Color) {
        let color = D2D1_COLOR_F {
            r: color.r,
            g: color.g,
            b: color.b,
            a: color.a,
        };
        unsafe { self.context.Clear(Some(&color)) };
    }
}

const FEATURE_LEVELS: [D3D_FEATURE_LEVEL; 4] = [
    D3D_FEATURE_LEVEL_11_1,
    D3D_FEATURE_LEVEL_11_0,
    D3D_FEATURE_LEVEL_10_1,
    D3D_FEATURE_LEVEL_10_0,
];

/// Creates Direct3D 11 devices (hardware, or WARP when software is forced) and the
/// Direct2D devices on top of them.
pub struct HardwareDeviceProvider {
    factory: ID2D1Factory1,
}

// SAFETY: the factory is created with D2D1_FACTORY_TYPE_MULTI_THREADED.
unsafe impl Send for HardwareDeviceProvider {}
unsafe impl Sync for HardwareDeviceProvider {}

impl HardwareDeviceProvider {
    pub fn new() -> Result<Self> {
        let factory = unsafe {
            D2D1CreateFactory::<ID2D1Factory1>(D2D1_FACTORY_TYPE_MULTI_THREADED, None)
        }
        .map_err(from_windows_error)?;
        Ok(Self { factory })
    }

    fn create_d3d_device(driver_type: D3D_DRIVER_TYPE) -> Result<ID3D11Device> {
        let flags = D3D11_CREATE_DEVICE_BGRA_SUPPORT;
        #[cfg(debug_assertions)]
        {
            use windows::Win32::Graphics::Direct3D11::D3D11_CREATE_DEVICE_DEBUG;
            // The debug layer is only present when the SDK layers are installed.
            match Self::try_create_d3d_device(driver_type, flags | D3D11_CREATE_DEVICE_DEBUG) {
                Ok(device) => return Ok(device),
                Err(err) => {
                    tracing::warn!("retrying device creation without the debug layer: {err}")
                }
            }
        }
        Self::try_create_d3d_device(driver_type, flags)
    }

    fn try_create_d3d_device(
        driver_type: D3D_DRIVER_TYPE,
        flags: D3D11_CREATE_DEVICE_FLAG,
    ) -> Result<ID3D11Device> {
        let mut device: Option<ID3D11Device> = None;
        let mut chosen = D3D_FEATURE_LEVEL_11_0;
        unsafe {
            D3D11CreateDevice(
                None,
                driver_type,
                None,
                flags,
                Some(&FEATURE_LEVELS),
                D3D11_SDK_VERSION,
                Some(&mut device),
                Some(&mut chosen),
                None,
            )
        }
        .map_err(from_windows_error)?;
        debug!(?driver_type, feature_level = ?chosen, "created D3D11 device");
        device.ok_or(InteropError::native(
            windows::Win32::Foundation::E_FAIL.0,
            "D3D11CreateDevice returned no device",
        ))
    }
}

impl DeviceProvider for HardwareDeviceProvider {
    fn create_native_device(&self, options: &DeviceOptions) -> Result<Arc<dyn NativeDevice>> {
        let driver_type = if options.force_software {
            D3D_DRIVER_TYPE_WARP
        } else {
            D3D_DRIVER_TYPE_HARDWARE
        };
        let d3d_device = Self::create_d3d_device(driver_type)?;
        let dxgi_device: IDXGIDevice = d3d_device.cast().map_err(from_windows_error)?;
        let device =
            unsafe { self.factory.CreateDevice(&dxgi_device) }.map_err(from_windows_error)?;
        Ok(D2DDevice::new(device, Some(d3d_device))?)
    }
}
