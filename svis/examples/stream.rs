//! Stream synchronized data from a connected sensor rig.
//!
//! Opens the microcontroller over raw HID, runs the engine on the main
//! thread, and prints matched images and averaged IMU samples as they
//! arrive. The camera driver would feed image records into the returned
//! sender; here it is left unconnected so only IMU traffic flows.

use std::sync::atomic::AtomicBool;
use std::thread;

use tracing::info;

use svis::{logging, Config, Synchronizer, SvisError, UsbHid};

// Wire this to the process signal handler for a clean shutdown.
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

fn main() -> Result<(), SvisError> {
    let _guards = logging::init_logging(None)?;

    let (mut engine, outputs, _images) = Synchronizer::new(Config::default())?;

    thread::spawn(move || {
        loop {
            crossbeam::channel::select! {
                recv(outputs.camera) -> matched => {
                    let Ok(matched) = matched else { break };
                    info!(
                        frame = matched.image.metadata.frame_counter,
                        stamp = matched.stamp(),
                        "synchronized image"
                    );
                }
                recv(outputs.imu) -> sample => {
                    let Ok(sample) = sample else { break };
                    info!(t_host = sample.t_host, acc = ?sample.acc, "averaged imu");
                }
            }
        }
    });

    let mut hid = UsbHid::open()?;
    engine.run(&mut hid, &SHUTDOWN)
}
