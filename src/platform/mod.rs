#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "windows")]
mod windows;

use crate::errors::FanControlError;

/// Size of the argument buffer passed to the management method.
pub const ARG_BUF_LEN: usize = 40;

/// Platform-agnostic handle to the vendor EC management method.
///
/// The method takes a fixed 40-byte argument buffer (register address
/// little-endian at bytes 0–1, value at byte 2, operation selector at
/// byte 5) and, for reads, returns a byte buffer whose first byte is the
/// register value. Implementations perform exactly one blocking method
/// evaluation per call; serialization and retries live above this trait.
pub trait EcTransport: Send + Sync {
    fn evaluate(&self, args: &[u8; ARG_BUF_LEN]) -> Result<Vec<u8>, FanControlError>;
}

/// Create the platform-appropriate transport.
///
/// Fails with [`FanControlError::InterfaceMissing`] when the vendor
/// interface is not exposed on this machine — a fatal startup condition.
pub fn create_transport() -> Result<Box<dyn EcTransport>, FanControlError> {
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(linux::AcpiCallTransport::probe()?))
    }
    #[cfg(target_os = "windows")]
    {
        Ok(Box::new(windows::WmiMethodTransport::probe()?))
    }
    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        compile_error!("Unsupported platform: only Linux and Windows are supported");
    }
}
