//! Fixed-window moving average over buffered IMU samples.

use crate::ring::RingBuffer;
use crate::types::ImuSample;

const MICROS_PER_SEC: f64 = 1.0e6;

/// Drains the IMU buffer in consecutive windows and emits one averaged
/// sample per window. Samples left over after the last full window stay
/// buffered for the next pass.
#[derive(Clone, Copy, Debug)]
pub struct ImuFilter {
    window: usize,
}

impl ImuFilter {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Consume full windows from `buffer`, appending one averaged sample
    /// per window to `out`.
    ///
    /// The averaged `t_device` is the window mean rounded to the nearest
    /// microsecond; `acc` and `gyro` are component-wise means. `t_host` is
    /// left at 0 for the caller to stamp once the clock offset is known.
    pub fn drain(&self, buffer: &mut RingBuffer<ImuSample>, out: &mut Vec<ImuSample>) {
        while buffer.len() >= self.window {
            let mut t_device_total = 0.0_f64;
            let mut acc_total = [0.0_f32; 3];
            let mut gyro_total = [0.0_f32; 3];
            let mut averaged = ImuSample::default();

            for _ in 0..self.window {
                let Some(sample) = buffer.pop_front() else {
                    break;
                };
                t_device_total += sample.t_device;
                for axis in 0..3 {
                    acc_total[axis] += sample.acc[axis];
                    gyro_total[axis] += sample.gyro[axis];
                }
                averaged = sample;
            }

            let n = self.window as f64;
            let t_device_us = (t_device_total / n * MICROS_PER_SEC).round();
            averaged.t_device_raw = t_device_us as u32;
            averaged.t_device = t_device_us / MICROS_PER_SEC;
            averaged.t_host = 0.0;
            for axis in 0..3 {
                averaged.acc[axis] = acc_total[axis] / self.window as f32;
                averaged.gyro[axis] = gyro_total[axis] / self.window as f32;
            }

            out.push(averaged);
        }
    }
}
