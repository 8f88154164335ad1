use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::Device;
use crate::error::{InteropError, Result};
use crate::native::NativeResource;
use crate::resolver::WrapperKind;
use crate::resources::CanvasBrush;
use crate::wrapper::{Interface, ResourceCore, ResourceWrapper, downcast_wrapper};

#[derive(Debug)]
pub struct SolidColorBrushWrapper {
    core: ResourceCore,
    opacity: Mutex<f32>,
}

impl SolidColorBrushWrapper {
    pub fn wrap(device: Arc<Device>, native: Arc<dyn NativeResource>) -> Result<Arc<Self>> {
        Ok(Arc::new(Self {
            core: ResourceCore::new(native, Some(device))?,
            opacity: Mutex::new(1.0),
        }))
    }
}

impl ResourceWrapper for SolidColorBrushWrapper {
    fn core(&self) -> &ResourceCore {
        &self.core
    }

    fn kind(&self) -> WrapperKind {
        WrapperKind::SolidColorBrush
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn query_brush(self: Arc<Self>) -> Option<Arc<dyn CanvasBrush>> {
        Some(self)
    }
}

impl CanvasBrush for SolidColorBrushWrapper {
    fn opacity(&self) -> Result<f32> {
        self.ensure_not_closed()?;
        Ok(*self.opacity.lock())
    }

    fn set_opacity(&self, opacity: f32) -> Result<()> {
        self.ensure_not_closed()?;
        if !(0.0..=1.0).contains(&opacity) {
            return Err(InteropError::InvalidArgument("opacity must be within 0..=1"));
        }
        *self.opacity.lock() = opacity;
        Ok(())
    }
}

impl Interface for SolidColorBrushWrapper {
    const NAME: &'static str = "CanvasSolidColorBrush";

    fn query(wrapper: Arc<dyn ResourceWrapper>) -> Option<Arc<Self>> {
        downcast_wrapper(wrapper)
    }
}
