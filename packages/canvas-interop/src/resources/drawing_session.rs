use std::fmt;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::error::Result;
use crate::native::{Color, NativeDeviceContext, NativeResource};
use crate::pool::DeviceContextLease;

pub type ContextLease = DeviceContextLease<Box<dyn NativeDeviceContext>>;

/// Drawing into one render target through a leased device context.
///
/// The context goes back to the device's pool when the session ends.
pub struct DrawingSession {
    lease: ContextLease,
    _target: Arc<dyn NativeResource>,
    drawing: bool,
}

impl DrawingSession {
    pub(crate) fn begin(mut lease: ContextLease, target: Arc<dyn NativeResource>) -> Result<Self> {
        let context = lease.get_mut()?;
        context.set_target(Some(target.as_ref()))?;
        context.begin_draw();
        trace!(identity = ?target.identity(), "drawing session started");
        Ok(Self {
            lease,
            _target: target,
            drawing: true,
        })
    }

    pub fn clear(&mut self, color: Color) -> Result<()> {
        self.lease.get_mut()?.clear(color);
        Ok(())
    }

    /// End drawing and report the native result.
    pub fn close(mut self) -> Result<()> {
        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        if !std::mem::take(&mut self.drawing) {
            return Ok(());
        }
        let result = match self.lease.get_mut() {
            Ok(context) => {
                let ended = context.end_draw();
                ended.and(context.set_target(None))
            }
            Err(err) => Err(err),
        };
        self.lease.release();
        result
    }
}

impl Drop for DrawingSession {
    fn drop(&mut self) {
        if let Err(err) = self.finish() {
            warn!("drawing session ended with an error: {err}");
        }
    }
}

impl fmt::Debug for DrawingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawingSession")
            .field("drawing", &self.drawing)
            .finish()
    }
}
