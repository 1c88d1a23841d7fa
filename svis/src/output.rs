//! Downstream fan-out over a fixed, statically typed set of channels.
//!
//! One channel per output stream: raw IMU batches, averaged IMU samples,
//! raw strobe events, matched images, and per-stage timing. The engine
//! holds the sending half; the embedding process drains the receivers.
//! Sends never block and a vanished consumer is not an error.

use crossbeam::channel::{unbounded, Receiver, Sender};

use crate::types::{ImuSample, MatchedImage, StrobeEvent};

/// Fixed record size of the raw IMU batch message.
pub const RAW_IMU_BATCH_LEN: usize = 3;

/// All IMU slots of one report, published as a single batch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawImuBatch {
    /// [s] Host-epoch time of publication
    pub stamp: f64,

    pub samples: [ImuSample; RAW_IMU_BATCH_LEN],
}

/// One window-averaged IMU sample in the host epoch.
///
/// Orientation is not estimated: the quaternion and every covariance field
/// carry NaN sentinels.
#[derive(Clone, Copy, Debug)]
pub struct AveragedImu {
    /// [s] Host-epoch timestamp of the averaged reading
    pub t_host: f64,

    /// [m/s^2] Mean acceleration, x/y/z
    pub acc: [f32; 3],

    /// [rad/s] Mean angular rate, x/y/z
    pub gyro: [f32; 3],

    /// Orientation quaternion, x/y/z/w; unknown
    pub orientation: [f64; 4],

    pub orientation_covariance: [f64; 9],
    pub angular_velocity_covariance: [f64; 9],
    pub linear_acceleration_covariance: [f64; 9],
}

impl AveragedImu {
    /// Stamp an averaged sample into the host epoch.
    pub fn from_sample(sample: &ImuSample, time_offset: f64) -> Self {
        Self {
            t_host: sample.t_device + time_offset,
            acc: sample.acc,
            gyro: sample.gyro,
            orientation: [f64::NAN; 4],
            orientation_covariance: [f64::NAN; 9],
            angular_velocity_covariance: [f64::NAN; 9],
            linear_acceleration_covariance: [f64::NAN; 9],
        }
    }
}

/// [s] Wall time spent in each stage of one loop iteration.
///
/// Stages that did not run in an iteration stay NaN.
#[derive(Clone, Copy, Debug)]
pub struct Timing {
    pub recv: f32,
    pub decode: f32,
    pub normalize: f32,
    pub publish_raw: f32,
    pub push: f32,
    pub align: f32,
    pub filter: f32,
    pub associate: f32,
    pub publish: f32,
    pub update: f32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            recv: f32::NAN,
            decode: f32::NAN,
            normalize: f32::NAN,
            publish_raw: f32::NAN,
            push: f32::NAN,
            align: f32::NAN,
            filter: f32::NAN,
            associate: f32::NAN,
            publish: f32::NAN,
            update: f32::NAN,
        }
    }
}

/// Sending half of the output fan-out, owned by the engine.
#[derive(Clone, Debug)]
pub(crate) struct Publisher {
    pub imu_raw: Sender<RawImuBatch>,
    pub imu: Sender<AveragedImu>,
    pub strobe_raw: Sender<StrobeEvent>,
    pub camera: Sender<MatchedImage>,
    pub timing: Sender<Timing>,
}

/// Receiving half of the output fan-out, handed to the embedding process.
#[derive(Clone, Debug)]
pub struct Outputs {
    pub imu_raw: Receiver<RawImuBatch>,
    pub imu: Receiver<AveragedImu>,
    pub strobe_raw: Receiver<StrobeEvent>,
    pub camera: Receiver<MatchedImage>,
    pub timing: Receiver<Timing>,
}

pub(crate) fn channels() -> (Publisher, Outputs) {
    let (imu_raw_tx, imu_raw_rx) = unbounded();
    let (imu_tx, imu_rx) = unbounded();
    let (strobe_raw_tx, strobe_raw_rx) = unbounded();
    let (camera_tx, camera_rx) = unbounded();
    let (timing_tx, timing_rx) = unbounded();

    (
        Publisher {
            imu_raw: imu_raw_tx,
            imu: imu_tx,
            strobe_raw: strobe_raw_tx,
            camera: camera_tx,
            timing: timing_tx,
        },
        Outputs {
            imu_raw: imu_raw_rx,
            imu: imu_rx,
            strobe_raw: strobe_raw_rx,
            camera: camera_rx,
            timing: timing_rx,
        },
    )
}

impl Publisher {
    pub fn publish_imu_raw(&self, batch: RawImuBatch) {
        let _ = self.imu_raw.send(batch);
    }

    pub fn publish_imu(&self, sample: AveragedImu) {
        let _ = self.imu.send(sample);
    }

    pub fn publish_strobe_raw(&self, strobe: StrobeEvent) {
        let _ = self.strobe_raw.send(strobe);
    }

    pub fn publish_camera(&self, matched: MatchedImage) {
        let _ = self.camera.send(matched);
    }

    pub fn publish_timing(&self, timing: Timing) {
        let _ = self.timing.send(timing);
    }
}
