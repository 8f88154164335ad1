//! COM objects as native resources.

use std::any::Any;
use std::sync::Arc;

use canvas_interop::{BitmapInfo, NativeIdentity, NativeKind, NativeResource, ResourceFlags, Result};
use windows::Win32::Graphics::Direct2D::{
    D2D1_BITMAP_OPTIONS, D2D1_BITMAP_OPTIONS_CANNOT_DRAW, D2D1_BITMAP_OPTIONS_CPU_READ,
    D2D1_BITMAP_OPTIONS_TARGET, ID2D1Bitmap1, ID2D1Effect, ID2D1GradientStopCollection,
    ID2D1SolidColorBrush, ID2D1StrokeStyle,
};
use windows::core::{IUnknown, Interface};

use crate::interop::from_windows_error;

/// Any Direct2D object, held through its canonical `IUnknown`.
pub struct ComResource {
    unknown: IUnknown,
    kind: NativeKind,
    flags: ResourceFlags,
    info: Option<BitmapInfo>,
}

// SAFETY: resources are created from a D2D1_FACTORY_TYPE_MULTI_THREADED factory, which
// serializes access to them internally.
unsafe impl Send for ComResource {}
unsafe impl Sync for ComResource {}

impl ComResource {
    /// Wrap `interface`, classifying it by the Direct2D interfaces it answers to.
    pub fn new<I: Interface>(interface: &I) -> Result<Arc<Self>> {
        let unknown: IUnknown = interface.cast().map_err(from_windows_error)?;
        if let Ok(bitmap) = unknown.cast::<ID2D1Bitmap1>() {
            return Self::bitmap(&bitmap);
        }
        let kind = if unknown.cast::<ID2D1SolidColorBrush>().is_ok() {
            NativeKind::SolidColorBrush
        } else if unknown.cast::<ID2D1StrokeStyle>().is_ok() {
            NativeKind::StrokeStyle
        } else if unknown.cast::<ID2D1GradientStopCollection>().is_ok() {
            NativeKind::GradientStopCollection
        } else if unknown.cast::<ID2D1Effect>().is_ok() {
            NativeKind::Effect
        } else {
            NativeKind::Other
        };
        Ok(Arc::new(Self {
            unknown,
            kind,
            flags: ResourceFlags::empty(),
            info: None,
        }))
    }

    pub fn bitmap(bitmap: &ID2D1Bitmap1) -> Result<Arc<Self>> {
        let (options, size, dpi) = unsafe {
            let (mut dpi_x, mut dpi_y) = (0.0f32, 0.0f32);
            bitmap.GetDpi(&mut dpi_x, &mut dpi_y);
            (bitmap.GetOptions(), bitmap.GetPixelSize(), dpi_x)
        };
        Ok(Arc::new(Self {
            unknown: bitmap.cast().map_err(from_windows_error)?,
            kind: NativeKind::Bitmap,
            flags: flags_from_options(options),
            info: Some(BitmapInfo {
                width: size.width,
                height: size.height,
                dpi,
            }),
        }))
    }

    pub fn unknown(&self) -> &IUnknown {
        &self.unknown
    }

    pub fn interface<I: Interface>(&self) -> Result<I> {
        self.unknown.cast().map_err(from_windows_error)
    }
}

/// COM identity: the address of the object's `IUnknown`.
pub(crate) fn com_identity(unknown: &IUnknown) -> NativeIdentity {
    NativeIdentity::from_addr(unknown.as_raw() as usize)
}

fn flags_from_options(options: D2D1_BITMAP_OPTIONS) -> ResourceFlags {
    let mut flags = ResourceFlags::empty();
    let has = |option: D2D1_BITMAP_OPTIONS| options.0 & option.0 != 0;
    flags.set(ResourceFlags::TARGET, has(D2D1_BITMAP_OPTIONS_TARGET));
    flags.set(ResourceFlags::CPU_READ, has(D2D1_BITMAP_OPTIONS_CPU_READ));
    flags.set(ResourceFlags::CANNOT_DRAW, has(D2D1_BITMAP_OPTIONS_CANNOT_DRAW));
    flags
}

pub(crate) fn options_from_flags(flags: ResourceFlags) -> D2D1_BITMAP_OPTIONS {
    let mut options = 0;
    if flags.contains(ResourceFlags::TARGET) {
        options |= D2D1_BITMAP_OPTIONS_TARGET.0;
    }
    // Direct2D only accepts CPU-readable bitmaps that cannot be drawn.
    if flags.contains(ResourceFlags::CPU_READ) {
        options |= D2D1_BITMAP_OPTIONS_CPU_READ.0 | D2D1_BITMAP_OPTIONS_CANNOT_DRAW.0;
    }
    if flags.contains(ResourceFlags::CANNOT_DRAW) {
        options |= D2D1_BITMAP_OPTIONS_CANNOT_DRAW.0;
    }
    D2D1_BITMAP_OPTIONS(options)
}

impl NativeResource for ComResource {
    fn identity(&self) -> NativeIdentity {
        com_identity(&self.unknown)
    }

    fn kind(&self) -> NativeKind {
        self.kind
    }

    fn flags(&self) -> ResourceFlags {
        self.flags
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn bitmap_info(&self) -> Option<BitmapInfo> {
        self.info
    }
}
