#![cfg(windows)]

//! Direct2D / Direct3D 11 adapter for `canvas-interop`.
//! This crate provides:
//! - [`ComResource`] and [`D2DDevice`], which plug COM objects into the wrapper cache under
//!   their COM identity
//! - [`HardwareDeviceProvider`] for creating hardware or WARP devices
//! - raw pointer interop in both directions and HRESULT conversion
//! - a debugger-output `tracing` subscriber
//!
//! On other targets the crate is empty.

mod com;
mod d2d;
mod debug_output;
mod interop;

pub use com::ComResource;
pub use d2d::{D2DDevice, D2DDeviceContext, HardwareDeviceProvider};
pub use debug_output::{DebugOutput, init_debug_output_logging};
pub use interop::{from_windows_error, raw_native_pointer, to_windows_error, wrap_raw_resource};
