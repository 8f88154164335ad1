//! Polymorphic wrapper resolution.
//!
//! The concrete wrapper type is chosen once, from the native resource's kind and
//! capability flags. The interface a caller asks for only decides whether the lookup
//! succeeds, never what gets created.

use std::sync::Arc;

use tracing::debug;

use crate::device::Device;
use crate::error::{InteropError, Result};
use crate::native::{NativeKind, NativeResource, ResourceFlags};
use crate::resource_manager::ResourceManager;
use crate::resources::{
    BitmapWrapper, GradientStopCollectionWrapper, RenderTargetWrapper, SolidColorBrushWrapper,
    StrokeStyleWrapper,
};
use crate::wrapper::{Interface, ResourceWrapper};

/// The concrete wrapper types this crate knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WrapperKind {
    Device,
    Bitmap,
    RenderTarget,
    SolidColorBrush,
    StrokeStyle,
    GradientStopCollection,
}

impl WrapperKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Device => "CanvasDevice",
            Self::Bitmap => "CanvasBitmap",
            Self::RenderTarget => "CanvasRenderTarget",
            Self::SolidColorBrush => "CanvasSolidColorBrush",
            Self::StrokeStyle => "CanvasStrokeStyle",
            Self::GradientStopCollection => "CanvasGradientStopCollection",
        }
    }
}

/// Pick the wrapper type for a native resource, or `None` if no built-in wrapper fits.
pub fn resolve_kind(native: &dyn NativeResource) -> Option<WrapperKind> {
    match native.kind() {
        NativeKind::Device => Some(WrapperKind::Device),
        NativeKind::Bitmap if native.flags().contains(ResourceFlags::TARGET) => {
            Some(WrapperKind::RenderTarget)
        }
        NativeKind::Bitmap => Some(WrapperKind::Bitmap),
        NativeKind::SolidColorBrush => Some(WrapperKind::SolidColorBrush),
        NativeKind::StrokeStyle => Some(WrapperKind::StrokeStyle),
        NativeKind::GradientStopCollection => Some(WrapperKind::GradientStopCollection),
        NativeKind::DeviceContext | NativeKind::Effect | NativeKind::Other => None,
    }
}

/// Inputs handed to each wrapper creator on a cache miss.
pub struct CreateContext<'a> {
    pub manager: &'a Arc<ResourceManager>,
    pub device: Option<&'a Arc<Device>>,
    pub native: &'a Arc<dyn NativeResource>,
}

impl CreateContext<'_> {
    pub fn require_device(&self) -> Result<Arc<Device>> {
        self.device.cloned().ok_or(InteropError::InvalidArgument(
            "a device is required to wrap this resource",
        ))
    }
}

/// Returns `None` to pass the resource on to the next creator.
pub type TryCreateFn = fn(&CreateContext<'_>) -> Option<Result<Arc<dyn ResourceWrapper>>>;

pub fn default_creators() -> Vec<TryCreateFn> {
    vec![create_builtin as TryCreateFn]
}

fn create_builtin(cx: &CreateContext<'_>) -> Option<Result<Arc<dyn ResourceWrapper>>> {
    let kind = resolve_kind(cx.native.as_ref())?;
    debug!(identity = ?cx.native.identity(), ?kind, "creating wrapper");
    Some(build(kind, cx))
}

fn build(kind: WrapperKind, cx: &CreateContext<'_>) -> Result<Arc<dyn ResourceWrapper>> {
    let native = cx.native.clone();
    let wrapper: Arc<dyn ResourceWrapper> = match kind {
        WrapperKind::Device => {
            let device = native.as_device().ok_or(InteropError::InterfaceNotSupported {
                requested: WrapperKind::Device.name(),
                actual: NativeKind::Device.name(),
            })?;
            Device::wrap(device)?
        }
        WrapperKind::Bitmap => BitmapWrapper::wrap(cx.require_device()?, native)?,
        WrapperKind::RenderTarget => RenderTargetWrapper::wrap(cx.require_device()?, native)?,
        WrapperKind::SolidColorBrush => {
            SolidColorBrushWrapper::wrap(cx.require_device()?, native)?
        }
        WrapperKind::StrokeStyle => StrokeStyleWrapper::wrap(native)?,
        WrapperKind::GradientStopCollection => {
            GradientStopCollectionWrapper::wrap(cx.require_device()?, native)?
        }
    };
    Ok(wrapper)
}

impl ResourceManager {
    /// Resolve `native` to its wrapper and view it through interface `I`.
    ///
    /// A wrapper whose type does not support `I` fails with
    /// [`InteropError::InterfaceNotSupported`]. A wrapper that was already cached stays cached.
    pub fn get_or_create_as<I: Interface + ?Sized>(
        self: &Arc<Self>,
        device: Option<&Arc<Device>>,
        native: &Arc<dyn NativeResource>,
    ) -> Result<Arc<I>> {
        let wrapper = self.get_or_create(device, native)?;
        let actual = wrapper.kind().name();
        I::query(wrapper).ok_or(InteropError::InterfaceNotSupported {
            requested: I::NAME,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;

    struct Fake(NativeKind, ResourceFlags);

    impl NativeResource for Fake {
        fn kind(&self) -> NativeKind {
            self.0
        }

        fn flags(&self) -> ResourceFlags {
            self.1
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn target_flag_selects_render_target() {
        let plain = Fake(NativeKind::Bitmap, ResourceFlags::CPU_READ);
        let target = Fake(NativeKind::Bitmap, ResourceFlags::TARGET);
        assert_eq!(resolve_kind(&plain), Some(WrapperKind::Bitmap));
        assert_eq!(resolve_kind(&target), Some(WrapperKind::RenderTarget));
    }

    #[test]
    fn flags_are_ignored_for_other_kinds() {
        let brush = Fake(NativeKind::SolidColorBrush, ResourceFlags::TARGET);
        assert_eq!(resolve_kind(&brush), Some(WrapperKind::SolidColorBrush));
        assert_eq!(resolve_kind(&Fake(NativeKind::Effect, ResourceFlags::empty())), None);
        assert_eq!(resolve_kind(&Fake(NativeKind::DeviceContext, ResourceFlags::empty())), None);
    }
}
