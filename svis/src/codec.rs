//! Decoding of verified report frames into host-side samples.
//!
//! The wire layout lives in `svis_shared`; this module layers on the
//! host-receive timestamp, the device-to-host clock offset, and the
//! conversion of raw counts to physical units.

use svis_shared::{AccelRange, GyroRange, ReportFrame, REPORT_LEN};
use tracing::warn;

use crate::error::DecodeError;
use crate::types::{Header, ImuSample, StrobeEvent};

const MICROS_PER_SEC: f64 = 1.0e6;

/// A decoded report fanned out into its host-side records.
#[derive(Clone, Debug, Default)]
pub struct Decoded {
    pub header: Header,
    pub imu: Vec<ImuSample>,
    pub strobes: Vec<StrobeEvent>,
}

/// Verify and decode one report frame.
///
/// `time_offset` is `None` while the clock aligner is still collecting;
/// in that state every `t_host` field is 0.
pub fn decode_report(
    buf: &[u8; REPORT_LEN],
    t_host_rx: f64,
    time_offset: Option<f64>,
    acc_range: AccelRange,
    gyro_range: GyroRange,
) -> Result<Decoded, DecodeError> {
    let frame = ReportFrame::decode(buf).map_err(DecodeError::Checksum)?;

    let header = Header {
        t_host_rx,
        send_count: frame.send_count,
        imu_count: frame.imu_count,
        strobe_count: frame.strobe_count,
    };

    // The checksum protects the counts, but a misbehaving firmware could
    // still claim more slots than the frame carries.
    let imu_count = frame.imu_count as usize;
    if imu_count > frame.imu.len() {
        warn!(imu_count, "imu slot count exceeds frame capacity, clamping");
    }
    let strobe_count = frame.strobe_count as usize;
    if strobe_count > frame.strobe.len() {
        warn!(strobe_count, "strobe slot count exceeds frame capacity, clamping");
    }

    let host_time = |t_device: f64| match time_offset {
        Some(offset) => t_device + offset,
        None => 0.0,
    };

    let mut imu = Vec::with_capacity(imu_count.min(frame.imu.len()));
    for slot in frame.imu.iter().take(imu_count) {
        let t_device = slot.t_device_us as f64 / MICROS_PER_SEC;
        imu.push(ImuSample {
            t_host_rx,
            t_host: host_time(t_device),
            t_device_raw: slot.t_device_us,
            t_device,
            acc_raw: slot.acc,
            acc: slot.acc.map(|raw| acc_range.counts_to_ms2(raw)),
            gyro_raw: slot.gyro,
            gyro: slot.gyro.map(|raw| gyro_range.counts_to_rads(raw)),
        });
    }

    let mut strobes = Vec::with_capacity(strobe_count.min(frame.strobe.len()));
    for slot in frame.strobe.iter().take(strobe_count) {
        let t_device = slot.t_device_us as f64 / MICROS_PER_SEC;
        strobes.push(StrobeEvent {
            t_host_rx,
            t_host: host_time(t_device),
            t_device_raw: slot.t_device_us,
            t_device,
            count: slot.count,
            count_total: 0,
        });
    }

    Ok(Decoded {
        header,
        imu,
        strobes,
    })
}
