#![cfg(windows)]

use std::sync::Arc;

use canvas_interop::{
    CanvasBitmap, CanvasRenderTarget, Color, DeviceFactory, DeviceOptions, PropertyBag,
    RenderTargetWrapper, ResourceFlags, ResourceManager, ResourceWrapper, is_same_instance,
};
use canvas_interop_winrt::{HardwareDeviceProvider, raw_native_pointer, wrap_raw_resource};
use windows::core::{IUnknown, Interface};

fn software_factory() -> DeviceFactory {
    let provider = Arc::new(HardwareDeviceProvider::new().unwrap());
    DeviceFactory::new(&PropertyBag::new(), provider, ResourceManager::new()).unwrap()
}

#[test]
fn draws_into_a_warp_render_target() {
    let factory = software_factory();
    let device = factory
        .create_device(&DeviceOptions {
            force_software: true,
        })
        .unwrap();
    let target = RenderTargetWrapper::create(&device, 32, 16, 96.0).unwrap();
    assert_eq!(target.size_in_pixels(), Ok((32, 16)));
    assert!(target.flags().unwrap().contains(ResourceFlags::TARGET));

    let mut session = target.create_drawing_session().unwrap();
    session.clear(Color::rgba(0.2, 0.4, 0.6, 1.0)).unwrap();
    session.close().unwrap();
}

#[test]
fn raw_pointers_round_trip_to_the_same_wrapper() {
    let factory = software_factory();
    let device = factory.get_shared_device(true).unwrap();
    let target = RenderTargetWrapper::create(&device, 8, 8, 96.0).unwrap();

    let raw = raw_native_pointer(target.as_ref()).unwrap();
    let wrapped = unsafe { wrap_raw_resource(factory.manager(), Some(&device), raw) }.unwrap();
    assert!(is_same_instance(&wrapped, &target));
    // Balance the reference handed out by raw_native_pointer.
    drop(unsafe { IUnknown::from_raw(raw) });

    let raw_device = raw_native_pointer(device.as_ref()).unwrap();
    let wrapped_device = unsafe { wrap_raw_resource(factory.manager(), None, raw_device) }.unwrap();
    assert!(is_same_instance(&wrapped_device, &device));
    drop(unsafe { IUnknown::from_raw(raw_device) });
}

#[test]
fn closed_wrapper_has_no_native_pointer() {
    let factory = software_factory();
    let device = factory.get_shared_device(true).unwrap();
    let target = RenderTargetWrapper::create(&device, 8, 8, 96.0).unwrap();
    target.close();
    assert!(raw_native_pointer(target.as_ref()).unwrap_err().is_closed());
}
