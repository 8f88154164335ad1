use std::any::Any;
use std::sync::Arc;

use crate::error::Result;
use crate::native::NativeResource;
use crate::resolver::WrapperKind;
use crate::wrapper::{Interface, ResourceCore, ResourceWrapper, downcast_wrapper};

/// Stroke styles are factory resources and belong to no device.
#[derive(Debug)]
pub struct StrokeStyleWrapper {
    core: ResourceCore,
}

impl StrokeStyleWrapper {
    pub fn wrap(native: Arc<dyn NativeResource>) -> Result<Arc<Self>> {
        Ok(Arc::new(Self {
            core: ResourceCore::new(native, None)?,
        }))
    }
}

impl ResourceWrapper for StrokeStyleWrapper {
    fn core(&self) -> &ResourceCore {
        &self.core
    }

    fn kind(&self) -> WrapperKind {
        WrapperKind::StrokeStyle
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl Interface for StrokeStyleWrapper {
    const NAME: &'static str = "CanvasStrokeStyle";

    fn query(wrapper: Arc<dyn ResourceWrapper>) -> Option<Arc<Self>> {
        downcast_wrapper(wrapper)
    }
}
