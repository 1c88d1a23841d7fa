//! Host-side records flowing through the synchronization pipeline.
//!
//! Timestamps come in two epochs: the device epoch is the
//! microcontroller's monotonic microsecond clock starting at power-on; the
//! host epoch is the wall clock of this process. `t_host` fields are 0
//! until the clock aligner has produced an offset.

use crate::error::ImageError;

/// Per-report header after decoding.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Header {
    /// [s] Host-epoch time the report was received
    pub t_host_rx: f64,

    /// Running count of reports sent since device power-on
    pub send_count: u16,

    /// Number of valid IMU slots in the report, 0..=3
    pub imu_count: u8,

    /// Number of valid strobe slots in the report, 0..=2
    pub strobe_count: u8,
}

/// One IMU reading in both raw counts and physical units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ImuSample {
    /// [s] Host-epoch time the carrying report was received
    pub t_host_rx: f64,

    /// [s] Reading time in the host epoch; 0 until the clock is aligned
    pub t_host: f64,

    /// [us] Reading time in the device epoch
    pub t_device_raw: u32,

    /// [s] Reading time in the device epoch
    pub t_device: f64,

    /// Accelerometer counts, x/y/z
    pub acc_raw: [i16; 3],

    /// [m/s^2] Acceleration, x/y/z
    pub acc: [f32; 3],

    /// Gyro counts, x/y/z
    pub gyro_raw: [i16; 3],

    /// [rad/s] Angular rate, x/y/z
    pub gyro: [f32; 3],
}

/// One camera-strobe capture.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StrobeEvent {
    /// [s] Host-epoch time the carrying report was received
    pub t_host_rx: f64,

    /// [s] Pulse time in the host epoch; 0 until the clock is aligned
    pub t_host: f64,

    /// [us] Pulse time in the device epoch
    pub t_device_raw: u32,

    /// [s] Pulse time in the device epoch
    pub t_device: f64,

    /// Wrapping 8-bit exposure count as sent by the device
    pub count: u8,

    /// Monotone exposure count after normalization
    pub count_total: u32,
}

/// Byte length of the metadata block at the front of each image.
pub const IMAGE_METADATA_LEN: usize = 32;

/// Camera metadata embedded in the first bytes of each image.
///
/// All fields are little-endian in the image bytes except the frame
/// counter, which the camera writes big-endian at bytes 24..28. Fields
/// other than the frame counter are preserved but not interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImageMetadata {
    pub timestamp: u32,
    pub gain: u32,
    pub shutter: u32,
    pub brightness: u32,
    pub exposure: u32,
    pub white_balance: u32,

    /// Hardware frame counter, strictly increasing per source (mod 2^32)
    pub frame_counter: u32,

    pub roi_position: u32,
}

impl ImageMetadata {
    /// Extract the metadata block from the front of an image buffer.
    pub fn parse(data: &[u8]) -> Result<Self, ImageError> {
        if data.len() < IMAGE_METADATA_LEN {
            return Err(ImageError::TooShort {
                len: data.len(),
                need: IMAGE_METADATA_LEN,
            });
        }

        let le = |off: usize| u32::from_le_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]]);

        Ok(Self {
            timestamp: le(0),
            gain: le(4),
            shutter: le(8),
            brightness: le(12),
            exposure: le(16),
            white_balance: le(20),
            frame_counter: u32::from_be_bytes([data[24], data[25], data[26], data[27]]),
            roi_position: le(28),
        })
    }
}

/// Calibration and geometry info delivered alongside each image.
/// Opaque to the engine; forwarded with the matched image.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CameraInfo {
    pub height: u32,
    pub width: u32,
    pub distortion_model: String,
    pub d: Vec<f64>,
    pub k: [f64; 9],
    pub r: [f64; 9],
    pub p: [f64; 12],
    pub binning_x: u32,
    pub binning_y: u32,
}

/// One image frame awaiting association with a strobe.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageRecord {
    pub metadata: ImageMetadata,
    pub info: CameraInfo,
    pub data: Vec<u8>,

    /// [s] Host-epoch time the image was delivered by the camera driver
    pub t_host_arrival: f64,
}

impl ImageRecord {
    /// Build a record from a raw image buffer and its driver info,
    /// parsing the embedded metadata block.
    pub fn from_raw(data: Vec<u8>, info: CameraInfo, t_host_arrival: f64) -> Result<Self, ImageError> {
        let metadata = ImageMetadata::parse(&data)?;
        Ok(Self {
            metadata,
            info,
            data,
            t_host_arrival,
        })
    }
}

/// An image matched to the strobe pulse that exposed it.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchedImage {
    pub image: ImageRecord,
    pub strobe: StrobeEvent,
}

impl MatchedImage {
    /// [s] Host-epoch timestamp the image should be republished under.
    pub fn stamp(&self) -> f64 {
        self.strobe.t_host
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_parse_endianness() {
        let mut data = vec![0_u8; 64];
        data[4..8].copy_from_slice(&77_u32.to_le_bytes()); // gain
        data[24..28].copy_from_slice(&0x01020304_u32.to_be_bytes()); // frame counter

        let meta = ImageMetadata::parse(&data).unwrap();
        assert_eq!(meta.gain, 77);
        assert_eq!(meta.frame_counter, 0x01020304);
    }

    #[test]
    fn metadata_rejects_short_blob() {
        let err = ImageMetadata::parse(&[0_u8; 16]).unwrap_err();
        match err {
            crate::error::ImageError::TooShort { len, need } => {
                assert_eq!(len, 16);
                assert_eq!(need, IMAGE_METADATA_LEN);
            }
        }
    }

    #[test]
    fn matched_image_stamp_is_strobe_host_time() {
        let matched = MatchedImage {
            image: ImageRecord::default(),
            strobe: StrobeEvent {
                t_host: 1234.5,
                ..Default::default()
            },
        };
        assert_eq!(matched.stamp(), 1234.5);
    }
}
