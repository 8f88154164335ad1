//! Concrete wrapper types and the capability interfaces they implement.

mod bitmap;
mod brush;
mod drawing_session;
mod gradient;
mod stroke_style;

use std::sync::Arc;

pub use bitmap::{BitmapWrapper, RenderTargetWrapper};
pub use brush::SolidColorBrushWrapper;
pub use drawing_session::DrawingSession;
pub use gradient::GradientStopCollectionWrapper;
pub use stroke_style::StrokeStyleWrapper;

use crate::error::Result;
use crate::native::ResourceFlags;
use crate::wrapper::{Interface, ResourceWrapper};

/// A bitmap. Every property read fails once the bitmap or its device is closed.
pub trait CanvasBitmap: ResourceWrapper {
    fn size_in_pixels(&self) -> Result<(u32, u32)>;
    fn dpi(&self) -> Result<f32>;
    fn flags(&self) -> Result<ResourceFlags>;
}

/// A bitmap that can be drawn to.
pub trait CanvasRenderTarget: CanvasBitmap {
    fn create_drawing_session(&self) -> Result<DrawingSession>;
}

pub trait CanvasBrush: ResourceWrapper {
    fn opacity(&self) -> Result<f32>;
    fn set_opacity(&self, opacity: f32) -> Result<()>;
}

impl Interface for dyn CanvasBitmap {
    const NAME: &'static str = "CanvasBitmap";

    fn query(wrapper: Arc<dyn ResourceWrapper>) -> Option<Arc<Self>> {
        wrapper.query_bitmap()
    }
}

impl Interface for dyn CanvasRenderTarget {
    const NAME: &'static str = "CanvasRenderTarget";

    fn query(wrapper: Arc<dyn ResourceWrapper>) -> Option<Arc<Self>> {
        wrapper.query_render_target()
    }
}

impl Interface for dyn CanvasBrush {
    const NAME: &'static str = "CanvasBrush";

    fn query(wrapper: Arc<dyn ResourceWrapper>) -> Option<Arc<Self>> {
        wrapper.query_brush()
    }
}
