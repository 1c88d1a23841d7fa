//! Estimation of the scalar offset between the device and host epochs.
//!
//! At startup the engine commands single strobe pulses and correlates each
//! resulting strobe/image pair: the difference between the image's host
//! arrival stamp and the strobe's device timestamp is one offset sample.
//! Once enough samples are collected the offset is frozen and applied as a
//! constant for the rest of the run; drift is not modeled.

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use crate::ring::RingBuffer;
use crate::types::{ImageRecord, StrobeEvent};

/// Spread between the oldest and newest retained offset samples above
/// which the leading samples are considered stale and trimmed.
const STALE_OFFSET_SPREAD: f64 = 0.1;

/// Transport action requested by an alignment step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockCommand {
    SendPulse,
    DisablePulse,
}

/// Result of one alignment step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClockUpdate {
    /// Control frame the caller should send, if any.
    pub command: Option<ClockCommand>,

    /// Newly observed strobe-count-to-frame-counter offset, if a pair was
    /// accepted this step.
    pub count_offset: Option<u32>,
}

#[derive(Debug)]
pub struct ClockAligner {
    offset_samples: VecDeque<f64>,
    time_offset: f64,
    initialized: bool,
    pulse_sent: bool,
    t_pulse_host: f64,

    /// Samples to collect before freezing the offset.
    sample_count: usize,

    /// [s] Minimum wait after a pulse before inspecting the buffers.
    sample_wait: f64,
}

impl ClockAligner {
    pub fn new(sample_count: usize, sample_wait: f64) -> Self {
        Self {
            offset_samples: VecDeque::with_capacity(sample_count),
            time_offset: 0.0,
            initialized: false,
            pulse_sent: false,
            t_pulse_host: 0.0,
            sample_count: sample_count.max(1),
            sample_wait,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// [s] Frozen host-minus-device offset; 0 until initialized.
    pub fn time_offset(&self) -> f64 {
        self.time_offset
    }

    /// The offset to apply to device-epoch timestamps, once known.
    pub fn applied_offset(&self) -> Option<f64> {
        self.initialized.then_some(self.time_offset)
    }

    /// Advance the alignment state machine by one step.
    ///
    /// Called once per accepted report while uninitialized. Consumes
    /// matched strobe/image pairs out of the buffers; clears both buffers
    /// when their contents cannot be attributed to a single pulse.
    pub fn update(
        &mut self,
        now: f64,
        strobes: &mut RingBuffer<StrobeEvent>,
        images: &mut RingBuffer<ImageRecord>,
    ) -> ClockUpdate {
        let mut update = ClockUpdate::default();
        if self.initialized {
            return update;
        }

        if self.offset_samples.len() >= self.sample_count {
            self.finalize();
            update.command = Some(ClockCommand::DisablePulse);
            return update;
        }

        if !self.pulse_sent {
            self.pulse_sent = true;
            self.t_pulse_host = now;
            debug!("requesting alignment pulse");
            update.command = Some(ClockCommand::SendPulse);
            return update;
        }

        if now - self.t_pulse_host < self.sample_wait {
            return update;
        }

        if strobes.is_empty() && images.is_empty() {
            // Pulse response has not arrived yet; keep waiting.
            return update;
        }

        if strobes.len() == 1 && images.len() == 1 {
            let (Some(strobe), Some(image)) = (strobes.pop_front(), images.pop_front()) else {
                return update;
            };
            self.offset_samples
                .push_back(image.t_host_arrival - strobe.t_device);
            let count_offset = image.metadata.frame_counter.wrapping_sub(strobe.count_total);
            debug!(
                samples = self.offset_samples.len(),
                count_offset, "collected offset sample"
            );
            update.count_offset = Some(count_offset);
        } else {
            warn!(
                strobes = strobes.len(),
                images = images.len(),
                "ambiguous pulse response, clearing buffers"
            );
            strobes.clear();
            images.clear();
        }

        self.pulse_sent = false;
        update
    }

    fn finalize(&mut self) {
        // The earliest samples are often built from stale buffer contents;
        // drop them until the remaining window is self-consistent.
        while self.offset_samples.len() > 1 {
            let (Some(&front), Some(&back)) =
                (self.offset_samples.front(), self.offset_samples.back())
            else {
                break;
            };
            if (front - back).abs() > STALE_OFFSET_SPREAD {
                self.offset_samples.pop_front();
            } else {
                break;
            }
        }

        let sum: f64 = self.offset_samples.iter().sum();
        self.time_offset = sum / self.offset_samples.len().max(1) as f64;
        self.initialized = true;
        info!(
            time_offset = self.time_offset,
            retained = self.offset_samples.len(),
            "clock alignment complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageMetadata;

    fn strobe(t_device: f64, count_total: u32) -> StrobeEvent {
        StrobeEvent {
            t_device,
            count_total,
            ..Default::default()
        }
    }

    fn image(frame_counter: u32, t_host_arrival: f64) -> ImageRecord {
        ImageRecord {
            metadata: ImageMetadata {
                frame_counter,
                ..Default::default()
            },
            t_host_arrival,
            ..Default::default()
        }
    }

    fn buffers() -> (RingBuffer<StrobeEvent>, RingBuffer<ImageRecord>) {
        (RingBuffer::new("strobe", 10), RingBuffer::new("image", 20))
    }

    #[test]
    fn first_step_requests_a_pulse() {
        let mut aligner = ClockAligner::new(10, 0.5);
        let (mut strobes, mut images) = buffers();

        let update = aligner.update(0.0, &mut strobes, &mut images);
        assert_eq!(update.command, Some(ClockCommand::SendPulse));

        // Still inside the wait window: nothing happens.
        let update = aligner.update(0.1, &mut strobes, &mut images);
        assert_eq!(update, ClockUpdate::default());
    }

    #[test]
    fn single_pair_is_the_only_accepted_sampling_condition() {
        let mut aligner = ClockAligner::new(10, 0.5);
        let (mut strobes, mut images) = buffers();
        aligner.update(0.0, &mut strobes, &mut images); // pulse

        strobes.push(strobe(1.0, 1));
        strobes.push(strobe(1.1, 2));
        images.push(image(40, 101.0));

        // Two strobes for one pulse: both buffers are cleared.
        let update = aligner.update(1.0, &mut strobes, &mut images);
        assert_eq!(update.count_offset, None);
        assert!(strobes.is_empty());
        assert!(images.is_empty());

        // Next round with exactly one of each is accepted.
        aligner.update(2.0, &mut strobes, &mut images); // pulse again
        strobes.push(strobe(2.0, 3));
        images.push(image(42, 102.0));
        let update = aligner.update(3.0, &mut strobes, &mut images);
        assert_eq!(update.count_offset, Some(39));
        assert!(strobes.is_empty());
        assert!(images.is_empty());
    }

    #[test]
    fn stale_leading_samples_are_trimmed_before_averaging() {
        let mut aligner = ClockAligner::new(100, 0.0);
        let (mut strobes, mut images) = buffers();

        let mut now = 0.0;
        let mut fed = 0_u32;
        while !aligner.is_initialized() {
            let update = aligner.update(now, &mut strobes, &mut images);
            if update.command == Some(ClockCommand::SendPulse) {
                let t_device = now;
                let offset = if fed < 20 { -42.0 } else { 0.001 };
                strobes.push(strobe(t_device, fed + 1));
                images.push(image(fed + 11, t_device + offset));
                fed += 1;
            }
            now += 1.0;
            assert!(fed <= 150, "alignment did not converge");
        }

        assert!((aligner.time_offset() - 0.001).abs() < 1e-4);
        assert_eq!(aligner.applied_offset(), Some(aligner.time_offset()));
    }

    #[test]
    fn finalization_disables_the_pulse() {
        let mut aligner = ClockAligner::new(1, 0.0);
        let (mut strobes, mut images) = buffers();

        aligner.update(0.0, &mut strobes, &mut images);
        strobes.push(strobe(0.5, 1));
        images.push(image(1, 0.5));
        aligner.update(1.0, &mut strobes, &mut images);

        let update = aligner.update(2.0, &mut strobes, &mut images);
        assert_eq!(update.command, Some(ClockCommand::DisablePulse));
        assert!(aligner.is_initialized());

        // Terminal state: further steps are no-ops.
        let update = aligner.update(3.0, &mut strobes, &mut images);
        assert_eq!(update, ClockUpdate::default());
    }
}
