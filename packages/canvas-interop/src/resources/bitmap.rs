use std::any::Any;
use std::sync::Arc;

use tracing::debug;

use crate::device::Device;
use crate::error::{InteropError, Result};
use crate::native::{BitmapInfo, NativeResource, ResourceFlags};
use crate::resolver::WrapperKind;
use crate::resources::{CanvasBitmap, CanvasRenderTarget, DrawingSession};
use crate::wrapper::{ResourceCore, ResourceWrapper};

#[derive(Debug)]
pub struct BitmapWrapper {
    core: ResourceCore,
    info: BitmapInfo,
    flags: ResourceFlags,
}

impl BitmapWrapper {
    pub fn wrap(device: Arc<Device>, native: Arc<dyn NativeResource>) -> Result<Arc<Self>> {
        Self::new(device, native).map(Arc::new)
    }

    fn new(device: Arc<Device>, native: Arc<dyn NativeResource>) -> Result<Self> {
        let info = native.bitmap_info().ok_or(InteropError::InvalidArgument(
            "native resource is not a bitmap",
        ))?;
        let flags = native.flags();
        Ok(Self {
            core: ResourceCore::new(native, Some(device))?,
            info,
            flags,
        })
    }
}

impl ResourceWrapper for BitmapWrapper {
    fn core(&self) -> &ResourceCore {
        &self.core
    }

    fn kind(&self) -> WrapperKind {
        WrapperKind::Bitmap
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn query_bitmap(self: Arc<Self>) -> Option<Arc<dyn CanvasBitmap>> {
        Some(self)
    }
}

impl CanvasBitmap for BitmapWrapper {
    fn size_in_pixels(&self) -> Result<(u32, u32)> {
        self.ensure_not_closed()?;
        Ok((self.info.width, self.info.height))
    }

    fn dpi(&self) -> Result<f32> {
        self.ensure_not_closed()?;
        Ok(self.info.dpi)
    }

    fn flags(&self) -> Result<ResourceFlags> {
        self.ensure_not_closed()?;
        Ok(self.flags)
    }
}

/// A bitmap created with [`ResourceFlags::TARGET`].
#[derive(Debug)]
pub struct RenderTargetWrapper {
    bitmap: BitmapWrapper,
}

impl RenderTargetWrapper {
    pub fn wrap(device: Arc<Device>, native: Arc<dyn NativeResource>) -> Result<Arc<Self>> {
        if !native.flags().contains(ResourceFlags::TARGET) {
            return Err(InteropError::InterfaceNotSupported {
                requested: WrapperKind::RenderTarget.name(),
                actual: WrapperKind::Bitmap.name(),
            });
        }
        Ok(Arc::new(Self {
            bitmap: BitmapWrapper::new(device, native)?,
        }))
    }

    /// Allocate a new target bitmap on `device` and register its wrapper with the
    /// device's resource manager.
    pub fn create(device: &Arc<Device>, width: u32, height: u32, dpi: f32) -> Result<Arc<Self>> {
        if width == 0 || height == 0 {
            return Err(InteropError::InvalidArgument("render target size must be non-zero"));
        }
        if dpi.is_nan() || dpi <= 0.0 {
            return Err(InteropError::InvalidArgument("dpi must be positive"));
        }
        let manager = device.manager()?;
        let native = {
            let mut lease = device.lease_device_context()?;
            lease
                .get_mut()?
                .create_bitmap(width, height, dpi, ResourceFlags::TARGET)?
        };
        let target = Self::wrap(device.clone(), native)?;
        let wrapper: Arc<dyn ResourceWrapper> = target.clone();
        manager.add(&wrapper)?;
        debug!(identity = ?target.identity(), width, height, "render target created");
        Ok(target)
    }
}

impl ResourceWrapper for RenderTargetWrapper {
    fn core(&self) -> &ResourceCore {
        &self.bitmap.core
    }

    fn kind(&self) -> WrapperKind {
        WrapperKind::RenderTarget
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn query_bitmap(self: Arc<Self>) -> Option<Arc<dyn CanvasBitmap>> {
        Some(self)
    }

    fn query_render_target(self: Arc<Self>) -> Option<Arc<dyn CanvasRenderTarget>> {
        Some(self)
    }
}

impl CanvasBitmap for RenderTargetWrapper {
    fn size_in_pixels(&self) -> Result<(u32, u32)> {
        self.bitmap.size_in_pixels()
    }

    fn dpi(&self) -> Result<f32> {
        self.bitmap.dpi()
    }

    fn flags(&self) -> Result<ResourceFlags> {
        self.bitmap.flags()
    }
}

impl CanvasRenderTarget for RenderTargetWrapper {
    fn create_drawing_session(&self) -> Result<DrawingSession> {
        let target = self.native_resource()?;
        let device = self
            .core()
            .device()
            .ok_or(InteropError::InvalidArgument("render target has no device"))?;
        let lease = device.lease_device_context()?;
        DrawingSession::begin(lease, target)
    }
}
