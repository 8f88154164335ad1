//! Crossing between raw COM pointers, `windows` errors and wrappers.

use std::ffi::c_void;
use std::sync::Arc;

use canvas_interop::error::{E_OUTOFMEMORY, RO_E_CLOSED};
use canvas_interop::{
    Device, InteropError, NativeResource, ResourceManager, ResourceWrapper, Result,
};
use windows::Win32::Graphics::Direct2D::ID2D1Device;
use windows::core::{HRESULT, IUnknown, Interface};

use crate::com::ComResource;
use crate::d2d::D2DDevice;

pub fn from_windows_error(err: windows::core::Error) -> InteropError {
    match err.code().0 {
        E_OUTOFMEMORY => InteropError::OutOfMemory,
        RO_E_CLOSED => InteropError::ObjectClosed,
        hresult => InteropError::native(hresult, err.message()),
    }
}

pub fn to_windows_error(err: &InteropError) -> windows::core::Error {
    windows::core::Error::new(HRESULT(err.hresult()), &err.to_string())
}

/// Native to wrapper: find or create the wrapper for a raw COM pointer.
///
/// # Safety
///
/// `raw` must be null or a valid COM interface pointer. The caller keeps its own
/// reference; the wrapper takes a new one.
pub unsafe fn wrap_raw_resource(
    manager: &Arc<ResourceManager>,
    device: Option<&Arc<Device>>,
    raw: *mut c_void,
) -> Result<Arc<dyn ResourceWrapper>> {
    let unknown = unsafe { IUnknown::from_raw_borrowed(&raw) }
        .ok_or(InteropError::InvalidArgument("resource pointer is null"))?;
    let native: Arc<dyn NativeResource> = match unknown.cast::<ID2D1Device>() {
        Ok(d2d_device) => D2DDevice::new(d2d_device, None)?,
        Err(_) => ComResource::new(unknown)?,
    };
    manager.get_or_create(device, &native)
}

/// Wrapper to native: an AddRef'd `IUnknown` pointer the caller must release.
pub fn raw_native_pointer(wrapper: &dyn ResourceWrapper) -> Result<*mut c_void> {
    let native = wrapper.native_resource()?;
    let any = native.as_any();
    let unknown = if let Some(resource) = any.downcast_ref::<ComResource>() {
        resource.unknown()
    } else if let Some(device) = any.downcast_ref::<D2DDevice>() {
        device.unknown()
    } else {
        return Err(InteropError::InterfaceNotSupported {
            requested: "IUnknown",
            actual: native.kind().name(),
        });
    };
    Ok(unknown.clone().into_raw())
}
