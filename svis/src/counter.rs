//! Normalization of the wrapping 8-bit strobe count into a monotone total.
//!
//! The device counts exposures in a single byte, so the host has to unwrap
//! rollovers and keep a running 32-bit total that downstream association
//! can trust to be monotone non-decreasing.

use tracing::warn;

use crate::types::StrobeEvent;

#[derive(Debug, Default)]
pub struct StrobeCounter {
    primed: bool,
    last_count: u8,
    count_total: u32,
}

impl StrobeCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Running total after the most recent event.
    pub fn count_total(&self) -> u32 {
        self.count_total
    }

    /// Assign `count_total` to each event in arrival order.
    ///
    /// `aligned` suppresses jump warnings while the clock aligner is still
    /// initializing, where gaps are expected.
    pub fn normalize(&mut self, strobes: &mut [StrobeEvent], aligned: bool) {
        for strobe in strobes {
            if !self.primed {
                self.primed = true;
                self.count_total = 1;
                self.last_count = strobe.count;
                strobe.count_total = self.count_total;
                continue;
            }

            let diff = if strobe.count > self.last_count {
                strobe.count - self.last_count
            } else if strobe.count < self.last_count {
                // Rollover. A sum of 255 means the count stepped to the
                // adjacent value across the 8-bit wrap.
                let diff = self.last_count.wrapping_add(strobe.count);
                if diff == 255 {
                    1
                } else {
                    diff
                }
            } else {
                warn!(count = strobe.count, "no change in strobe count");
                0
            };

            if diff > 1 && aligned {
                warn!(
                    diff,
                    last = self.last_count,
                    count = strobe.count,
                    "jump in strobe count"
                );
            }

            self.count_total += diff as u32;
            strobe.count_total = self.count_total;
            self.last_count = strobe.count;
        }
    }
}
