//! Outbound control frames sent from the host to the microcontroller.
//!
//! Control frames share the 64-byte report length. Byte 0 is a fixed magic
//! value, byte 1 selects the command, and the remaining bytes are
//! command-specific parameters with zero padding to the full frame.

use crate::REPORT_LEN;

/// Magic value in byte 0 of every host-to-device frame.
pub const COMMAND_MAGIC: u8 = 0xAB;

const KIND_SETUP: u8 = 0;
const KIND_PULSE: u8 = 2;
const KIND_DISABLE_PULSE: u8 = 3;

/// Host-to-device control commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Configure the camera trigger rate and IMU sensitivity selectors.
    Setup {
        /// [Hz] Camera trigger rate
        camera_rate: u8,
        /// Gyro full-scale selector, 0..=3
        gyro_sel: u8,
        /// Accelerometer full-scale selector, 0..=3
        acc_sel: u8,
    },

    /// Request a single strobe pulse for clock alignment.
    Pulse,

    /// Stop emitting alignment pulses.
    DisablePulse,
}

impl Command {
    /// Serialize to a full zero-padded frame.
    pub fn encode(&self) -> [u8; REPORT_LEN] {
        let mut buf = [0_u8; REPORT_LEN];
        buf[0] = COMMAND_MAGIC;
        match *self {
            Command::Setup {
                camera_rate,
                gyro_sel,
                acc_sel,
            } => {
                buf[1] = KIND_SETUP;
                buf[2] = camera_rate;
                buf[3] = gyro_sel;
                buf[4] = acc_sel;
            }
            Command::Pulse => buf[1] = KIND_PULSE,
            Command::DisablePulse => buf[1] = KIND_DISABLE_PULSE,
        }
        buf
    }

    /// Deserialize a host-to-device frame, if it is one.
    ///
    /// Returns `None` for frames without the command magic or with an
    /// unrecognized command byte.
    pub fn decode(buf: &[u8; REPORT_LEN]) -> Option<Self> {
        if buf[0] != COMMAND_MAGIC {
            return None;
        }

        match buf[1] {
            KIND_SETUP => Some(Command::Setup {
                camera_rate: buf[2],
                gyro_sel: buf[3],
                acc_sel: buf[4],
            }),
            KIND_PULSE => Some(Command::Pulse),
            KIND_DISABLE_PULSE => Some(Command::DisablePulse),
            _ => None,
        }
    }
}
