#![cfg_attr(docsrs, feature(doc_cfg))]

//! Wrapper identity and lifetime management for native 2D graphics resources.
//!
//! This crate sits between a native graphics library and its callers and provides:
//! - exactly one live wrapper per native resource, found again from the native side
//!   through a [`ResourceManager`]
//! - wrapper types picked from the native resource's own capability flags, viewed through
//!   capability interfaces such as [`CanvasBitmap`] and [`CanvasRenderTarget`]
//! - explicit close that propagates from a [`Device`] to everything created on it
//! - a non-blocking pool of device contexts per device
//! - weakly held singletons, process-wide or keyed off an application's [`PropertyBag`]
//!
//! Native objects plug in through the traits in [`native`]. The Windows adapter crate
//! implements them for Direct2D.

pub mod closable;
pub mod device;
pub mod error;
pub mod event;
pub mod factory;
pub mod native;
pub mod pool;
pub mod resolver;
pub mod resource_manager;
pub mod resources;
pub mod singleton;
pub mod wrapper;

pub use closable::ClosablePtr;
pub use device::{Device, DeviceContext};
pub use error::{InteropError, Result};
pub use event::{EventSource, EventToken, RegisteredEvent};
pub use factory::{DeviceFactory, DeviceOptions, DeviceProvider, SHARED_DEVICE_STATE_KEY};
pub use native::{
    BitmapInfo, Color, NativeDevice, NativeDeviceContext, NativeIdentity, NativeKind,
    NativeResource, ResourceFlags,
};
pub use pool::{DeviceContextLease, DeviceContextPool, PoolStats};
pub use resolver::{CreateContext, TryCreateFn, WrapperKind};
pub use resource_manager::ResourceManager;
pub use resources::{
    BitmapWrapper, CanvasBitmap, CanvasBrush, CanvasRenderTarget, DrawingSession,
    GradientStopCollectionWrapper, RenderTargetWrapper, SolidColorBrushWrapper,
    StrokeStyleWrapper,
};
pub use singleton::{PerApplicationManager, PropertyBag, SingletonRegistry};
pub use wrapper::{Interface, ResourceCore, ResourceWrapper, is_same_instance};
