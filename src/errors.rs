use thiserror::Error;

#[derive(Error, Debug)]
pub enum FanControlError {
    /// Communication with the EC failed (transport error or short reply).
    #[error("EC communication failed for register {0:#06x}")]
    Ec(u16),

    #[error("management interface not present: {0}")]
    InterfaceMissing(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("platform error: {0}")]
    Platform(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
