use std::io;

use canvas_interop::{InteropError, Result};
use tracing_subscriber::EnvFilter;
use windows::Win32::System::Diagnostics::Debug::OutputDebugStringA;
use windows::core::PCSTR;

/// Sends formatted log lines to the attached debugger (DebugView, Visual Studio).
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugOutput;

impl io::Write for DebugOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut bytes = Vec::with_capacity(buf.len() + 1);
        // Interior NULs would truncate the message.
        bytes.extend(buf.iter().map(|&b| if b == 0 { b' ' } else { b }));
        bytes.push(0);
        unsafe { OutputDebugStringA(PCSTR(bytes.as_ptr())) };
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Install a global `tracing` subscriber that writes to the debugger output.
/// Verbosity follows `RUST_LOG`, defaulting to `info`.
pub fn init_debug_output_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(|| DebugOutput)
        .try_init()
        .map_err(|_| InteropError::InvalidArgument("a global subscriber is already installed"))
}
