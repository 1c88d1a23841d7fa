//! The 64-byte report frame streamed by the microcontroller over raw HID.
//!
//! Every report carries a header, up to 3 IMU readings, and up to 2 strobe
//! events, padded to a fixed layout so the frame length never changes. The
//! final two bytes are a wrapping byte-sum checksum over the rest of the
//! frame.

use byte_struct::*;

use crate::{CHECKSUM_OFFSET, REPORT_LEN};

/// One IMU slot: device-epoch timestamp plus raw sensor counts.
#[derive(ByteStruct, Clone, Copy, Debug, Default, PartialEq)]
#[byte_struct_le]
pub struct ImuSlot {
    /// [us] Reading time in the device epoch
    pub t_device_us: u32,

    /// Accelerometer counts, x/y/z
    pub acc: [i16; 3],

    /// Gyro counts, x/y/z
    pub gyro: [i16; 3],
}

/// One strobe slot: device-epoch timestamp of the exposure pulse plus the
/// wrapping 8-bit exposure counter.
#[derive(ByteStruct, Clone, Copy, Debug, Default, PartialEq)]
#[byte_struct_le]
pub struct StrobeSlot {
    /// [us] Pulse capture time in the device epoch
    pub t_device_us: u32,

    /// Wrapping exposure count
    pub count: u8,
}

/// Full report frame as it appears on the wire.
///
/// Slots beyond `imu_count`/`strobe_count` are transmitted but carry stale
/// or zeroed data; the header counts are authoritative.
#[derive(ByteStruct, Clone, Copy, Debug, Default, PartialEq)]
#[byte_struct_le]
pub struct ReportFrame {
    /// Running count of reports sent since device power-on
    pub send_count: u16,

    /// Number of valid IMU slots, 0..=3
    pub imu_count: u8,

    /// Number of valid strobe slots, 0..=2
    pub strobe_count: u8,

    pub imu: [ImuSlot; 3],

    pub strobe: [StrobeSlot; 2],

    /// Wrapping u16 sum of every preceding byte zero-extended from u8
    pub checksum: u16,
}

/// Stored and computed checksum values for a frame that failed verification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChecksumMismatch {
    pub computed: u16,
    pub stored: u16,
}

impl core::fmt::Display for ChecksumMismatch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "report checksum mismatch: computed {:#06X}, stored {:#06X}",
            self.computed, self.stored
        )
    }
}

/// Wrapping u16 sum of the checksummed region of a frame buffer.
pub fn checksum_of(frame: &[u8; REPORT_LEN]) -> u16 {
    frame[..CHECKSUM_OFFSET]
        .iter()
        .fold(0_u16, |acc, &b| acc.wrapping_add(b as u16))
}

impl ReportFrame {
    /// Serialize to wire bytes with the checksum filled in.
    pub fn encode(&self) -> [u8; REPORT_LEN] {
        let mut buf = [0_u8; REPORT_LEN];
        self.write_bytes(&mut buf);
        let sum = checksum_of(&buf);
        buf[CHECKSUM_OFFSET..].copy_from_slice(&sum.to_le_bytes());
        buf
    }

    /// Verify the checksum and deserialize.
    pub fn decode(buf: &[u8; REPORT_LEN]) -> Result<Self, ChecksumMismatch> {
        let computed = checksum_of(buf);
        let stored = u16::from_le_bytes([buf[CHECKSUM_OFFSET], buf[CHECKSUM_OFFSET + 1]]);
        if computed != stored {
            return Err(ChecksumMismatch { computed, stored });
        }

        Ok(Self::read_bytes(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_layout_is_fixed() {
        assert_eq!(ReportFrame::BYTE_LEN, REPORT_LEN);
        assert_eq!(ImuSlot::BYTE_LEN, 16);
        assert_eq!(StrobeSlot::BYTE_LEN, 5);

        // Field offsets must match the firmware exactly.
        let frame = ReportFrame {
            send_count: 0x1234,
            imu_count: 3,
            strobe_count: 2,
            imu: [
                ImuSlot {
                    t_device_us: 0xAABBCCDD,
                    ..Default::default()
                },
                ImuSlot::default(),
                ImuSlot::default(),
            ],
            strobe: [
                StrobeSlot {
                    t_device_us: 0x11223344,
                    count: 7,
                },
                StrobeSlot::default(),
            ],
            ..Default::default()
        };
        let buf = frame.encode();

        assert_eq!(&buf[0..2], &[0x34, 0x12]); // send_count, little-endian
        assert_eq!(buf[2], 3); // imu_count
        assert_eq!(buf[3], 2); // strobe_count
        assert_eq!(&buf[4..8], &[0xDD, 0xCC, 0xBB, 0xAA]); // imu slot 0 timestamp
        assert_eq!(&buf[52..57], &[0x44, 0x33, 0x22, 0x11, 7]); // strobe slot 0
    }

    #[test]
    fn encode_decode_roundtrip() {
        let frame = ReportFrame {
            send_count: 0x1234,
            imu_count: 3,
            strobe_count: 2,
            ..Default::default()
        };

        let buf = frame.encode();
        let decoded = ReportFrame::decode(&buf).unwrap();

        assert_eq!(decoded.send_count, 0x1234);
        assert_eq!(decoded.imu_count, 3);
        assert_eq!(decoded.strobe_count, 2);
        assert_eq!(decoded.imu, frame.imu);
        assert_eq!(decoded.strobe, frame.strobe);
    }

    #[test]
    fn corrupted_checksum_is_rejected() {
        let frame = ReportFrame {
            send_count: 0x1234,
            imu_count: 3,
            strobe_count: 2,
            ..Default::default()
        };

        let mut buf = frame.encode();
        buf[CHECKSUM_OFFSET] ^= 0xFF;

        let err = ReportFrame::decode(&buf).unwrap_err();
        assert_eq!(err.computed, checksum_of(&buf));
        assert_ne!(err.computed, err.stored);
    }

    #[test]
    fn corrupted_payload_is_rejected() {
        let mut buf = ReportFrame::default().encode();
        buf[10] ^= 0x01;
        assert!(ReportFrame::decode(&buf).is_err());
    }
}
