#![doc = include_str!("../README.md")]

pub mod assoc;
pub mod clock;
pub mod codec;
pub mod config;
pub mod counter;
pub mod engine;
pub mod error;
pub mod filter;
pub mod logging;
pub mod output;
pub mod ring;
pub mod transport;
pub mod types;

pub use config::Config;
pub use engine::Synchronizer;
pub use error::SvisError;
pub use output::{AveragedImu, Outputs, RawImuBatch, Timing};
pub use transport::{HidTransport, UsbHid};
pub use types::{ImageRecord, MatchedImage};
