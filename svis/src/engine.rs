//! The synchronization engine and its run loop.
//!
//! One `Synchronizer` owns the three stream buffers, the clock aligner,
//! the strobe counter, the IMU filter, and the association engine, and
//! paces them at the tempo of incoming HID reports. Everything runs on
//! the caller's thread; the image source feeds a channel that the loop
//! drains between receives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crossbeam::channel::{unbounded, Receiver, Sender};
use tracing::{debug, error, info, trace, warn};

use svis_shared::{AccelRange, Command, GyroRange, REPORT_LEN};

use crate::assoc::Associator;
use crate::clock::{ClockAligner, ClockCommand};
use crate::codec::decode_report;
use crate::config::Config;
use crate::counter::StrobeCounter;
use crate::error::{ConfigError, DecodeError, SvisError};
use crate::filter::ImuFilter;
use crate::output::{
    channels, AveragedImu, Outputs, Publisher, RawImuBatch, Timing, RAW_IMU_BATCH_LEN,
};
use crate::ring::RingBuffer;
use crate::transport::HidTransport;
use crate::types::{ImageRecord, ImuSample, MatchedImage, StrobeEvent};

pub const IMU_BUFFER_CAPACITY: usize = 10;
pub const STROBE_BUFFER_CAPACITY: usize = 10;

/// Twice the strobe capacity, to absorb images that arrive before the
/// strobe that exposed them.
pub const IMAGE_BUFFER_CAPACITY: usize = 20;

/// [ms] HID receive timeout per loop iteration.
pub const RECV_TIMEOUT_MS: i32 = 220;

/// Host-epoch time source, injectable for tests.
pub type TimeSource = Box<dyn Fn() -> f64 + Send>;

fn wall_clock() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn elapsed(since: Instant) -> f32 {
    since.elapsed().as_secs_f32()
}

fn hex_dump(buf: &[u8]) -> String {
    let mut out = String::with_capacity(buf.len() * 3);
    for b in buf {
        out.push_str(&format!("{b:02X} "));
    }
    out
}

pub struct Synchronizer {
    config: Config,
    acc_range: AccelRange,
    gyro_range: GyroRange,

    imu_buffer: RingBuffer<ImuSample>,
    strobe_buffer: RingBuffer<StrobeEvent>,
    image_buffer: RingBuffer<ImageRecord>,

    aligner: ClockAligner,
    counter: StrobeCounter,
    filter: ImuFilter,
    associator: Associator,

    publisher: Publisher,
    images_rx: Receiver<ImageRecord>,
    time_source: TimeSource,

    // Scratch space reused across iterations
    filtered: Vec<ImuSample>,
    matched: Vec<MatchedImage>,
}

impl Synchronizer {
    /// Build an engine from a validated configuration.
    ///
    /// Returns the engine, the receiving half of the output channels, and
    /// the sender the image source should deliver records into.
    pub fn new(config: Config) -> Result<(Self, Outputs, Sender<ImageRecord>), SvisError> {
        Self::with_time_source(config, Box::new(wall_clock))
    }

    /// Like [`Synchronizer::new`], with an explicit host-epoch time source.
    pub fn with_time_source(
        config: Config,
        time_source: TimeSource,
    ) -> Result<(Self, Outputs, Sender<ImageRecord>), SvisError> {
        config.validate()?;
        if config.imu_filter_size > IMU_BUFFER_CAPACITY {
            return Err(SvisError::Config(ConfigError::FilterWindowTooLarge {
                window: config.imu_filter_size,
                capacity: IMU_BUFFER_CAPACITY,
            }));
        }

        let (publisher, outputs) = channels();
        let (images_tx, images_rx) = unbounded();

        let engine = Self {
            acc_range: AccelRange::from(config.acc_sens),
            gyro_range: GyroRange::from(config.gyro_sens),
            imu_buffer: RingBuffer::new("imu", IMU_BUFFER_CAPACITY),
            strobe_buffer: RingBuffer::new("strobe", STROBE_BUFFER_CAPACITY),
            image_buffer: RingBuffer::new("image", IMAGE_BUFFER_CAPACITY),
            aligner: ClockAligner::new(config.offset_sample_count, config.offset_sample_time),
            counter: StrobeCounter::new(),
            filter: ImuFilter::new(config.imu_filter_size),
            associator: Associator::new(config.stale_age),
            publisher,
            images_rx,
            time_source,
            filtered: Vec::new(),
            matched: Vec::new(),
            config,
        };

        Ok((engine, outputs, images_tx))
    }

    /// [s] Frozen host-minus-device clock offset; 0 until initialized.
    pub fn time_offset(&self) -> f64 {
        self.aligner.time_offset()
    }

    /// Whether the clock aligner has frozen its offset.
    pub fn is_initialized(&self) -> bool {
        self.aligner.is_initialized()
    }

    /// Whether association has gone dry and a resync is pending.
    pub fn needs_resync(&self) -> bool {
        self.associator.needs_resync()
    }

    /// Number of images currently awaiting association.
    pub fn image_buffer_len(&self) -> usize {
        self.image_buffer.len()
    }

    /// Deliver one image record directly (same-thread image sources).
    pub fn push_image(&mut self, image: ImageRecord) {
        self.image_buffer.push(image);
    }

    /// Send the setup frame configuring the camera rate and IMU ranges.
    pub fn start(&mut self, transport: &mut dyn HidTransport) -> Result<(), SvisError> {
        info!(
            camera_rate = self.config.camera_rate,
            gyro_sens = self.config.gyro_sens,
            acc_sens = self.config.acc_sens,
            "sending setup frame"
        );
        transport.send(
            &Command::Setup {
                camera_rate: self.config.camera_rate,
                gyro_sel: self.config.gyro_sens,
                acc_sel: self.config.acc_sens,
            }
            .encode(),
        )?;
        Ok(())
    }

    /// Drive the pipeline until the shutdown flag is raised or the
    /// transport fails.
    pub fn run(
        &mut self,
        transport: &mut dyn HidTransport,
        shutdown: &AtomicBool,
    ) -> Result<(), SvisError> {
        // The loop is the only hot thread; pin it and ask for priority,
        // failing soft where the platform does not allow either.
        if let Some(core) = core_affinity::get_core_ids().unwrap_or_default().first() {
            core_affinity::set_for_current(*core);
        }
        let _ = thread_priority::set_current_thread_priority(thread_priority::ThreadPriority::Max);

        self.start(transport)?;

        while !shutdown.load(Ordering::Relaxed) {
            if let Err(e) = self.update(transport) {
                error!("stopping: {e}");
                return Err(e);
            }
        }

        info!("shutdown signal observed");
        Ok(())
    }

    /// Run one loop iteration: drain the image source, receive and decode
    /// one report, and advance whichever pipeline stage is due.
    pub fn update(&mut self, transport: &mut dyn HidTransport) -> Result<(), SvisError> {
        let t_update = Instant::now();
        let mut timing = Timing::default();

        self.drain_images();

        let mut buf = [0_u8; REPORT_LEN];
        let t_stage = Instant::now();
        let n = transport.recv(&mut buf, RECV_TIMEOUT_MS)?;
        timing.recv = elapsed(t_stage);

        if n == 0 {
            // Timeout; not an error.
            if !self.aligner.is_initialized() {
                debug!("no report within receive timeout");
            }
            return Ok(());
        }
        if n < REPORT_LEN {
            warn!(len = n, "short report, dropping");
            return Ok(());
        }

        if self.config.dump_frames {
            trace!(frame = %hex_dump(&buf), "received report");
        }

        let now = (self.time_source)();
        let t_stage = Instant::now();
        let mut decoded = match decode_report(
            &buf,
            now,
            self.aligner.applied_offset(),
            self.acc_range,
            self.gyro_range,
        ) {
            Ok(decoded) => decoded,
            Err(DecodeError::Checksum(mismatch)) => {
                warn!("dropping report: {mismatch}");
                return Ok(());
            }
        };
        timing.decode = elapsed(t_stage);

        let t_stage = Instant::now();
        self.counter
            .normalize(&mut decoded.strobes, self.aligner.is_initialized());
        timing.normalize = elapsed(t_stage);

        let t_stage = Instant::now();
        if decoded.imu.len() == RAW_IMU_BATCH_LEN {
            self.publisher.publish_imu_raw(RawImuBatch {
                stamp: now,
                samples: [decoded.imu[0], decoded.imu[1], decoded.imu[2]],
            });
        } else {
            warn!(
                imu_count = decoded.imu.len(),
                "imu batch size mismatch, skipping raw publish"
            );
        }
        for strobe in &decoded.strobes {
            self.publisher.publish_strobe_raw(*strobe);
        }
        timing.publish_raw = elapsed(t_stage);

        let t_stage = Instant::now();
        for sample in decoded.imu.drain(..) {
            self.imu_buffer.push(sample);
        }
        for strobe in decoded.strobes.drain(..) {
            self.strobe_buffer.push(strobe);
        }
        timing.push = elapsed(t_stage);

        if !self.aligner.is_initialized() {
            let t_stage = Instant::now();
            let step = self
                .aligner
                .update(now, &mut self.strobe_buffer, &mut self.image_buffer);
            if let Some(count_offset) = step.count_offset {
                self.associator.set_count_offset(count_offset);
            }
            match step.command {
                Some(ClockCommand::SendPulse) => {
                    debug!("sending pulse frame");
                    transport.send(&Command::Pulse.encode())?;
                }
                Some(ClockCommand::DisablePulse) => {
                    info!("sending disable-pulse frame");
                    transport.send(&Command::DisablePulse.encode())?;
                }
                None => {}
            }
            timing.align = elapsed(t_stage);
            return Ok(());
        }

        let t_stage = Instant::now();
        self.filtered.clear();
        self.filter.drain(&mut self.imu_buffer, &mut self.filtered);
        timing.filter = elapsed(t_stage);

        let t_stage = Instant::now();
        if self.associator.needs_resync() {
            self.associator.resync(&self.strobe_buffer, &self.image_buffer);
        }
        self.matched.clear();
        self.associator.pass(
            now,
            &mut self.strobe_buffer,
            &mut self.image_buffer,
            &mut self.matched,
        );
        timing.associate = elapsed(t_stage);

        let t_stage = Instant::now();
        let time_offset = self.aligner.time_offset();
        for sample in &self.filtered {
            self.publisher
                .publish_imu(AveragedImu::from_sample(sample, time_offset));
        }
        for matched in self.matched.drain(..) {
            self.publisher.publish_camera(matched);
        }
        timing.publish = elapsed(t_stage);

        timing.update = elapsed(t_update);
        self.publisher.publish_timing(timing);

        Ok(())
    }

    fn drain_images(&mut self) {
        while let Ok(image) = self.images_rx.try_recv() {
            self.image_buffer.push(image);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use std::collections::VecDeque;
    use svis_shared::ReportFrame;

    enum Step {
        Frame([u8; REPORT_LEN]),
        Silence,
        Offline,
    }

    struct ScriptedHid {
        incoming: VecDeque<Step>,
        sent: Vec<[u8; REPORT_LEN]>,
    }

    impl ScriptedHid {
        fn new() -> Self {
            Self {
                incoming: VecDeque::new(),
                sent: Vec::new(),
            }
        }

        fn enqueue(&mut self, step: Step) {
            self.incoming.push_back(step);
        }
    }

    impl HidTransport for ScriptedHid {
        fn send(&mut self, frame: &[u8; REPORT_LEN]) -> Result<(), TransportError> {
            self.sent.push(*frame);
            Ok(())
        }

        fn recv(
            &mut self,
            buf: &mut [u8; REPORT_LEN],
            _timeout_ms: i32,
        ) -> Result<usize, TransportError> {
            match self.incoming.pop_front() {
                Some(Step::Frame(frame)) => {
                    buf.copy_from_slice(&frame);
                    Ok(REPORT_LEN)
                }
                Some(Step::Silence) | None => Ok(0),
                Some(Step::Offline) => Err(TransportError::Offline),
            }
        }
    }

    fn engine() -> (Synchronizer, Outputs, Sender<ImageRecord>) {
        Synchronizer::with_time_source(Config::default(), Box::new(|| 0.0)).unwrap()
    }

    #[test]
    fn start_sends_the_setup_frame() {
        let (mut engine, _outputs, _images) = engine();
        let mut hid = ScriptedHid::new();

        engine.start(&mut hid).unwrap();

        assert_eq!(hid.sent.len(), 1);
        assert_eq!(
            Command::decode(&hid.sent[0]),
            Some(Command::Setup {
                camera_rate: 30,
                gyro_sel: 0,
                acc_sel: 0,
            })
        );
    }

    #[test]
    fn zero_byte_read_is_a_non_event() {
        let (mut engine, outputs, _images) = engine();
        let mut hid = ScriptedHid::new();
        hid.enqueue(Step::Silence);

        engine.update(&mut hid).unwrap();
        assert!(outputs.timing.try_recv().is_err());
        assert!(hid.sent.is_empty());
    }

    #[test]
    fn corrupt_report_leaves_buffers_unchanged() {
        let (mut engine, outputs, _images) = engine();
        let mut hid = ScriptedHid::new();

        let mut buf = ReportFrame {
            imu_count: 3,
            strobe_count: 2,
            ..Default::default()
        }
        .encode();
        buf[62] ^= 0xFF;
        hid.enqueue(Step::Frame(buf));

        engine.update(&mut hid).unwrap();
        assert_eq!(engine.imu_buffer.len(), 0);
        assert_eq!(engine.strobe_buffer.len(), 0);
        assert!(outputs.imu_raw.try_recv().is_err());
    }

    #[test]
    fn offline_transport_is_fatal() {
        let (mut engine, _outputs, _images) = engine();
        let mut hid = ScriptedHid::new();
        hid.enqueue(Step::Offline);

        let err = engine.update(&mut hid).unwrap_err();
        assert!(matches!(
            err,
            SvisError::Transport(TransportError::Offline)
        ));
    }

    #[test]
    fn first_accepted_report_triggers_an_alignment_pulse() {
        let (mut engine, _outputs, _images) = engine();
        let mut hid = ScriptedHid::new();
        hid.enqueue(Step::Frame(ReportFrame::default().encode()));

        engine.update(&mut hid).unwrap();

        assert_eq!(hid.sent.len(), 1);
        assert_eq!(Command::decode(&hid.sent[0]), Some(Command::Pulse));
    }

    #[test]
    fn oversized_filter_window_is_rejected() {
        let config = Config {
            imu_filter_size: IMU_BUFFER_CAPACITY + 1,
            ..Default::default()
        };
        assert!(Synchronizer::new(config).is_err());
    }

    #[test]
    fn raw_imu_publish_skipped_for_partial_batches() {
        let (mut engine, outputs, _images) = engine();
        let mut hid = ScriptedHid::new();

        hid.enqueue(Step::Frame(
            ReportFrame {
                imu_count: 2,
                ..Default::default()
            }
            .encode(),
        ));
        engine.update(&mut hid).unwrap();
        assert!(outputs.imu_raw.try_recv().is_err());

        hid.enqueue(Step::Frame(
            ReportFrame {
                imu_count: 3,
                ..Default::default()
            }
            .encode(),
        ));
        engine.update(&mut hid).unwrap();
        assert!(outputs.imu_raw.try_recv().is_ok());
    }
}
