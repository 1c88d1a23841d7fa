//! Typed errors for the engine crate.
//!
//! Every fallible operation returns a distinguishable result; nothing
//! unwinds across component boundaries.

use thiserror::Error;

/// Errors that terminate engine operation.
#[derive(Debug, Error)]
pub enum SvisError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("logging setup failed: {0}")]
    Logging(String),
}

/// HID transport failures. All of these are fatal to the run loop;
/// a receive timeout is a zero-byte read, not an error.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no sensor device found (VID={vid:04X} PID={pid:04X})")]
    NotFound { vid: u16, pid: u16 },

    #[error("hid: {0}")]
    Hid(#[from] hidapi::HidError),

    #[error("device went offline")]
    Offline,
}

/// Report frames that fail to decode. The frame is dropped and the loop
/// continues.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("{0}")]
    Checksum(svis_shared::ChecksumMismatch),
}

/// Image blobs that cannot carry the camera metadata block.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image blob too short for metadata block: {len} < {need} bytes")]
    TooShort { len: usize, need: usize },
}

/// Invalid engine configuration, rejected before the loop starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} selector {value} is out of range 0..=3")]
    SelectorOutOfRange { name: &'static str, value: u8 },

    #[error("{name} must be at least 1")]
    ZeroCount { name: &'static str },

    #[error("{name} must be non-negative, got {value}")]
    NegativeSeconds { name: &'static str, value: f64 },

    #[error("imu_filter_size {window} exceeds the IMU buffer capacity {capacity}")]
    FilterWindowTooLarge { window: usize, capacity: usize },
}
