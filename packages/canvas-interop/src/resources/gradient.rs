use std::any::Any;
use std::sync::Arc;

use crate::device::Device;
use crate::error::Result;
use crate::native::NativeResource;
use crate::resolver::WrapperKind;
use crate::wrapper::{Interface, ResourceCore, ResourceWrapper, downcast_wrapper};

#[derive(Debug)]
pub struct GradientStopCollectionWrapper {
    core: ResourceCore,
}

impl GradientStopCollectionWrapper {
    pub fn wrap(device: Arc<Device>, native: Arc<dyn NativeResource>) -> Result<Arc<Self>> {
        Ok(Arc::new(Self {
            core: ResourceCore::new(native, Some(device))?,
        }))
    }
}

impl ResourceWrapper for GradientStopCollectionWrapper {
    fn core(&self) -> &ResourceCore {
        &self.core
    }

    fn kind(&self) -> WrapperKind {
        WrapperKind::GradientStopCollection
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl Interface for GradientStopCollectionWrapper {
    const NAME: &'static str = "CanvasGradientStopCollection";

    fn query(wrapper: Arc<dyn ResourceWrapper>) -> Option<Arc<Self>> {
        downcast_wrapper(wrapper)
    }
}
