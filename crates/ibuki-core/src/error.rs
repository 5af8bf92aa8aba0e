//! Error types for ibuki-core.

use thiserror::Error;

/// Error type for ibuki-core operations.
///
/// These only ever surface at the device-port boundary; the scheduler and
/// unlock controller consume them and degrade to visual-only operation.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid device: {0}")]
    InvalidDevice(String),

    #[error("Audio device not available")]
    DeviceNotAvailable(#[from] cpal::DefaultStreamConfigError),

    #[error("Failed to build audio stream")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Failed to play audio stream")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Failed to enumerate devices")]
    DevicesError(#[from] cpal::DevicesError),

    #[error("Failed to get device name")]
    DeviceNameError(#[from] cpal::DeviceNameError),

    #[error("Output port is not open")]
    PortClosed,

    #[error("Probe tone did not complete in time")]
    ProbeTimeout,
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
