//! Byte-level HID transport seam.
//!
//! The engine only needs two entry points: a fire-and-forget send of one
//! 64-byte frame, and a blocking receive with a millisecond timeout that
//! returns zero bytes when nothing arrived. `UsbHid` implements the seam
//! over hidapi for the real microcontroller; tests script their own
//! implementations.

use hidapi::{HidApi, HidDevice};
use tracing::info;

use svis_shared::{REPORT_LEN, USB_PRODUCT_ID, USB_VENDOR_ID};

use crate::error::TransportError;

pub trait HidTransport {
    /// Send one frame. Fire-and-forget; errors are fatal.
    fn send(&mut self, frame: &[u8; REPORT_LEN]) -> Result<(), TransportError>;

    /// Receive up to one frame, blocking at most `timeout_ms`.
    ///
    /// Returns the number of bytes read; 0 means the timeout elapsed with
    /// no data, which is not an error. A transport error means the device
    /// went offline and the run loop must stop.
    fn recv(&mut self, buf: &mut [u8; REPORT_LEN], timeout_ms: i32) -> Result<usize, TransportError>;
}

/// Raw HID connection to the sensor microcontroller.
pub struct UsbHid {
    device: HidDevice,
}

impl UsbHid {
    /// Open the microcontroller at its default vendor/product ids.
    pub fn open() -> Result<Self, TransportError> {
        Self::open_ids(USB_VENDOR_ID, USB_PRODUCT_ID)
    }

    /// Open a device at explicit vendor/product ids.
    pub fn open_ids(vid: u16, pid: u16) -> Result<Self, TransportError> {
        let api = HidApi::new()?;
        let device = api
            .open(vid, pid)
            .map_err(|_| TransportError::NotFound { vid, pid })?;
        info!("opened sensor device {vid:04X}:{pid:04X}");
        Ok(Self { device })
    }
}

impl HidTransport for UsbHid {
    fn send(&mut self, frame: &[u8; REPORT_LEN]) -> Result<(), TransportError> {
        self.device.write(frame)?;
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8; REPORT_LEN], timeout_ms: i32) -> Result<usize, TransportError> {
        self.device
            .read_timeout(buf, timeout_ms)
            .map_err(|_| TransportError::Offline)
    }
}
