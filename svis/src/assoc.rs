//! Association of strobe events with the images they exposed.
//!
//! A strobe and an image belong together when the strobe's normalized
//! count, shifted by a global offset, equals the image's hardware frame
//! counter. The offset is learned during clock alignment and re-estimated
//! from timestamps if association goes completely dry.

use tracing::{debug, info, warn};

use crate::ring::RingBuffer;
use crate::types::{ImageRecord, MatchedImage, StrobeEvent};

/// Mean strobe-to-image time difference below which a resync candidate
/// offset is accepted. One frame period at the nominal camera rate.
const RESYNC_MEAN_THRESHOLD: f64 = 1.0 / 30.0;

#[derive(Debug)]
pub struct Associator {
    count_offset: u32,
    need_resync: bool,

    /// [s] Age beyond which unmatched strobes and images are dropped.
    stale_age: f64,
}

impl Associator {
    pub fn new(stale_age: f64) -> Self {
        Self {
            count_offset: 0,
            need_resync: false,
            stale_age,
        }
    }

    pub fn count_offset(&self) -> u32 {
        self.count_offset
    }

    pub fn set_count_offset(&mut self, count_offset: u32) {
        self.count_offset = count_offset;
    }

    pub fn needs_resync(&self) -> bool {
        self.need_resync
    }

    /// Run one association pass over the buffers.
    ///
    /// Strobes are visited oldest-first and each takes the oldest image
    /// whose frame counter matches. Entries older than the stale age are
    /// dropped in passing. A pass in which a full strobe buffer produces
    /// no matches schedules a resync.
    pub fn pass(
        &mut self,
        now: f64,
        strobes: &mut RingBuffer<StrobeEvent>,
        images: &mut RingBuffer<ImageRecord>,
        matched: &mut Vec<MatchedImage>,
    ) {
        let mut fail_count = 0;
        let mut match_count = 0;

        let mut i = 0;
        while i < strobes.len() {
            let Some(&strobe) = strobes.get(i) else {
                break;
            };
            let target = strobe.count_total.wrapping_add(self.count_offset);
            let mut found = false;

            let mut j = 0;
            while j < images.len() {
                let Some(image) = images.get(j) else {
                    break;
                };
                if image.metadata.frame_counter == target {
                    if let Some(image) = images.remove(j) {
                        matched.push(MatchedImage { image, strobe });
                    }
                    found = true;
                    match_count += 1;
                    break;
                } else if now - image.t_host_arrival > self.stale_age {
                    debug!(
                        frame_counter = image.metadata.frame_counter,
                        "dropping stale image"
                    );
                    images.remove(j);
                } else {
                    j += 1;
                }
            }

            if found {
                strobes.remove(i);
            } else {
                fail_count += 1;
                if now - strobe.t_host_rx > self.stale_age {
                    warn!(count_total = strobe.count_total, "dropping stale strobe");
                    strobes.remove(i);
                } else {
                    i += 1;
                }
            }
        }

        if match_count == 0 && fail_count == strobes.capacity() {
            warn!("association failed across a full strobe buffer, scheduling resync");
            self.need_resync = true;
        }
    }

    /// Re-estimate the count offset from timestamps.
    ///
    /// For each strobe, find the image minimizing the absolute difference
    /// between the strobe's host time and the image's arrival time; take
    /// the globally best pair, and accept it only when the mean of the
    /// per-strobe best differences is within one frame period.
    pub fn resync(&mut self, strobes: &RingBuffer<StrobeEvent>, images: &RingBuffer<ImageRecord>) {
        if strobes.is_empty() || images.is_empty() {
            return;
        }

        let mut best_image = vec![0_usize; strobes.len()];
        let mut best_diff = vec![f64::INFINITY; strobes.len()];
        for (i, strobe) in strobes.iter().enumerate() {
            for (j, image) in images.iter().enumerate() {
                let diff = (strobe.t_host - image.t_host_arrival).abs();
                if diff < best_diff[i] {
                    best_diff[i] = diff;
                    best_image[i] = j;
                }
            }
        }

        let mut global_best = f64::INFINITY;
        let mut global_best_strobe = 0;
        let mut diff_sum = 0.0;
        for (i, &diff) in best_diff.iter().enumerate() {
            diff_sum += diff;
            if diff < global_best {
                global_best = diff;
                global_best_strobe = i;
            }
        }

        let diff_mean = diff_sum / best_diff.len() as f64;
        if diff_mean >= RESYNC_MEAN_THRESHOLD {
            debug!(diff_mean, "resync candidate rejected");
            return;
        }

        let (Some(strobe), Some(image)) = (
            strobes.get(global_best_strobe),
            images.get(best_image[global_best_strobe]),
        ) else {
            return;
        };
        self.count_offset = image
            .metadata
            .frame_counter
            .wrapping_sub(strobe.count_total);
        self.need_resync = false;
        info!(count_offset = self.count_offset, "resynchronized count offset");
    }
}
