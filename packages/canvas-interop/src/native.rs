//! Contracts for the native graphics objects brokered by this crate.
//!
//! The core never looks inside a native resource. It only needs an identity to key
//! the wrapper cache on, a kind plus capability flags for picking a wrapper type,
//! and for devices a way to mint new device contexts.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::error::Result;

/// Address-equality key of a native object.
///
/// Two handles to the same native object must report the same identity even if they
/// were obtained through different interfaces (for COM: the canonical `IUnknown` pointer).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeIdentity(usize);

impl NativeIdentity {
    pub const NULL: NativeIdentity = NativeIdentity(0);

    pub const fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    pub fn of<T: ?Sized>(ptr: *const T) -> Self {
        Self(ptr.cast::<()>() as usize)
    }

    pub const fn addr(self) -> usize {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for NativeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeIdentity(0x{:x})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeKind {
    Device,
    DeviceContext,
    Bitmap,
    SolidColorBrush,
    StrokeStyle,
    GradientStopCollection,
    Effect,
    Other,
}

impl NativeKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Device => "ID2D1Device",
            Self::DeviceContext => "ID2D1DeviceContext",
            Self::Bitmap => "ID2D1Bitmap1",
            Self::SolidColorBrush => "ID2D1SolidColorBrush",
            Self::StrokeStyle => "ID2D1StrokeStyle1",
            Self::GradientStopCollection => "ID2D1GradientStopCollection1",
            Self::Effect => "ID2D1Effect",
            Self::Other => "IUnknown",
        }
    }
}

/// Pixel size and resolution of a native bitmap, read once at wrap time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitmapInfo {
    pub width: u32,
    pub height: u32,
    pub dpi: f32,
}

bitflags! {
    /// Capabilities baked into a native resource at creation time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResourceFlags: u32 {
        /// Bitmap can be bound as a drawing target.
        const TARGET = 0x1;
        /// Bitmap can be mapped for CPU reads.
        const CPU_READ = 0x2;
        /// Bitmap cannot be used as a drawing source.
        const CANNOT_DRAW = 0x4;
    }
}

pub trait NativeResource: Any + Send + Sync {
    /// Defaults to the address of the object itself.
    fn identity(&self) -> NativeIdentity {
        NativeIdentity::of(self as *const Self)
    }

    fn kind(&self) -> NativeKind;

    fn flags(&self) -> ResourceFlags {
        ResourceFlags::empty()
    }

    fn as_any(&self) -> &dyn Any;

    fn bitmap_info(&self) -> Option<BitmapInfo> {
        None
    }

    /// Upgrade to the device contract when this resource is a device.
    fn as_device(self: Arc<Self>) -> Option<Arc<dyn NativeDevice>> {
        None
    }
}

pub trait NativeDevice: NativeResource {
    fn as_resource(self: Arc<Self>) -> Arc<dyn NativeResource>;

    fn create_device_context(&self) -> Result<Box<dyn NativeDeviceContext>>;

    /// Whether the underlying adapter has been removed or reset.
    fn is_removed(&self) -> bool {
        false
    }
}

pub trait NativeDeviceContext: Send {
    /// Create a bitmap owned by this context's device.
    fn create_bitmap(
        &mut self,
        width: u32,
        height: u32,
        dpi: f32,
        flags: ResourceFlags,
    ) -> Result<Arc<dyn NativeResource>>;
    fn set_target(&mut self, target: Option<&dyn NativeResource>) -> Result<()>;
    fn begin_draw(&mut self);
    fn end_draw(&mut self) -> Result<()>;
    fn clear(&mut self, color: Color);
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}
