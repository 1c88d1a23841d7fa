//! IMU full-scale range selectors and their count-to-physical-unit scales.
//!
//! The selectors are written into the setup command verbatim; the scale
//! tables must match what the firmware programs into the IMU registers.

use crate::enum_with_unknown;

/// [m/s^2] Standard gravity, used to convert accelerometer g counts.
pub const STANDARD_GRAVITY: f32 = 9.80665;

const RAD_PER_DEG: f32 = core::f32::consts::PI / 180.0;

enum_with_unknown! {
    /// Accelerometer full-scale range selector (AFS_SEL).
    pub enum AccelRange(u8) {
        G2 = 0,
        G4 = 1,
        G8 = 2,
        G16 = 3,
    }
}

enum_with_unknown! {
    /// Gyro full-scale range selector (FS_SEL).
    pub enum GyroRange(u8) {
        Dps250 = 0,
        Dps500 = 1,
        Dps1000 = 2,
        Dps2000 = 3,
    }
}

impl AccelRange {
    /// [LSB/g] Counts per g at this range.
    ///
    /// Out-of-range selectors fall back to the finest range.
    pub fn counts_per_g(&self) -> f32 {
        match self {
            AccelRange::G2 => 16384.0,
            AccelRange::G4 => 8192.0,
            AccelRange::G8 => 4096.0,
            AccelRange::G16 => 2048.0,
            AccelRange::Unknown(_) => 16384.0,
        }
    }

    /// Convert raw counts to m/s^2.
    pub fn counts_to_ms2(&self, raw: i16) -> f32 {
        raw as f32 / self.counts_per_g() * STANDARD_GRAVITY
    }
}

impl GyroRange {
    /// [LSB/(deg/s)] Counts per degree-per-second at this range.
    ///
    /// Out-of-range selectors fall back to the finest range.
    pub fn counts_per_dps(&self) -> f32 {
        match self {
            GyroRange::Dps250 => 131.0,
            GyroRange::Dps500 => 65.5,
            GyroRange::Dps1000 => 32.8,
            GyroRange::Dps2000 => 16.4,
            GyroRange::Unknown(_) => 131.0,
        }
    }

    /// Convert raw counts to rad/s.
    pub fn counts_to_rads(&self, raw: i16) -> f32 {
        raw as f32 / self.counts_per_dps() * RAD_PER_DEG
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accel_conversion_at_full_scale() {
        // One g of counts at the 2g range reads back as standard gravity.
        let ms2 = AccelRange::G2.counts_to_ms2(16384);
        assert!((ms2 - STANDARD_GRAVITY).abs() < 1e-4);

        let ms2 = AccelRange::G16.counts_to_ms2(2048);
        assert!((ms2 - STANDARD_GRAVITY).abs() < 1e-4);
    }

    #[test]
    fn gyro_conversion_at_one_dps() {
        // 131 counts at the 250 dps range is one degree per second.
        let rads = GyroRange::Dps250.counts_to_rads(131);
        assert!((rads - core::f32::consts::PI / 180.0).abs() < 1e-6);
    }

    #[test]
    fn selector_roundtrip() {
        for sel in 0..=3_u8 {
            assert_eq!(u8::from(AccelRange::from(sel)), sel);
            assert_eq!(u8::from(GyroRange::from(sel)), sel);
        }
        assert_eq!(AccelRange::from(7), AccelRange::Unknown(7));
    }

    #[test]
    fn unknown_selector_falls_back() {
        assert_eq!(
            AccelRange::Unknown(9).counts_per_g(),
            AccelRange::G2.counts_per_g()
        );
        assert_eq!(
            GyroRange::Unknown(9).counts_per_dps(),
            GyroRange::Dps250.counts_per_dps()
        );
    }
}
