use thiserror::Error;

/// `RO_E_CLOSED`: the object has been closed.
pub const RO_E_CLOSED: i32 = 0x8000_0013_u32 as i32;
/// `E_INVALIDARG`
pub const E_INVALIDARG: i32 = 0x8007_0057_u32 as i32;
/// `E_NOINTERFACE`
pub const E_NOINTERFACE: i32 = 0x8000_4002_u32 as i32;
/// `E_OUTOFMEMORY`
pub const E_OUTOFMEMORY: i32 = 0x8007_000E_u32 as i32;
/// `DXGI_ERROR_DEVICE_REMOVED`
pub const DXGI_ERROR_DEVICE_REMOVED: i32 = 0x887A_0005_u32 as i32;
/// `DXGI_ERROR_DEVICE_RESET`
pub const DXGI_ERROR_DEVICE_RESET: i32 = 0x887A_0007_u32 as i32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InteropError {
    #[error("the object has been closed")]
    ObjectClosed,
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("{actual} does not support the {requested} interface")]
    InterfaceNotSupported {
        requested: &'static str,
        actual: &'static str,
    },
    #[error("out of memory")]
    OutOfMemory,
    #[error("native call failed (0x{hresult:08X}): {message}")]
    Native { hresult: i32, message: String },
}

impl InteropError {
    pub fn native(hresult: i32, message: impl Into<String>) -> Self {
        Self::Native {
            hresult,
            message: message.into(),
        }
    }

    /// HRESULT reported for this error when it crosses the component boundary.
    pub fn hresult(&self) -> i32 {
        match self {
            Self::ObjectClosed => RO_E_CLOSED,
            Self::InvalidArgument(_) => E_INVALIDARG,
            Self::InterfaceNotSupported { .. } => E_NOINTERFACE,
            Self::OutOfMemory => E_OUTOFMEMORY,
            Self::Native { hresult, .. } => *hresult,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ObjectClosed)
    }
}

pub type Result<T> = std::result::Result<T, InteropError>;

/// True for the HRESULTs DXGI uses to report a lost device.
pub fn is_device_lost_hresult(hresult: i32) -> bool {
    matches!(hresult, DXGI_ERROR_DEVICE_REMOVED | DXGI_ERROR_DEVICE_RESET)
}
