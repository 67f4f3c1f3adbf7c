//! The producer side of the pipeline.
//!
//! A background thread owns the hardware channel for the whole session. It
//! polls buffer occupancy until a full batch is available, reads it and hands
//! every frame to storage, while the display only sees the latest frame of each
//! kind at a capped rate. Nothing that goes wrong in the loop ends it: errors
//! become notifications and the next batch is attempted.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Condvar, Mutex,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::Sender;
use tracing::{debug, error, info, trace, warn};

use crate::{
    display::{DisplayMessage, Throttle},
    error::{AcquisitionError, Result},
    frame::{Frame, FrameKind},
    hardware::{HardwareChannel, HardwareError},
    join_timeout,
    monitoring::{buffer_megabytes, AcquisitionStats, Notification, Notifier, StatsSnapshot},
    session::{AcquisitionSession, DataSource},
    writer::FrameSaver,
};

/// Timing of the polling loop
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollConfig {
    /// Sleep between occupancy queries
    pub poll_interval: Duration,
    /// Queries before a batch is abandoned
    pub timeout_iterations: u32,
    /// Report occupancy upstream every this many queries
    pub report_every: u32,
    /// Minimum time between display updates
    pub display_interval: Duration,
    /// Pause after a failed read before trying the next batch
    pub error_backoff: Duration,
    /// How long `stop` waits for the loop to exit
    pub stop_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            timeout_iterations: 5000,
            report_every: 100,
            display_interval: Duration::from_millis(50),
            error_backoff: Duration::from_millis(100),
            stop_timeout: Duration::from_secs(3),
        }
    }
}

/// Run flag plus the pause flag and its condition variable
#[derive(Debug, Default)]
struct Control {
    running: AtomicBool,
    paused: Mutex<bool>,
    resumed: Condvar,
}

impl Control {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn set_paused(&self, paused: bool) {
        if let Ok(mut guard) = self.paused.lock() {
            *guard = paused;
        }
        self.resumed.notify_all();
    }

    fn is_paused(&self) -> bool {
        self.paused.lock().map(|p| *p).unwrap_or(false)
    }

    /// Clear the run flag and wake a paused loop so it can see it
    fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.set_paused(false);
    }

    /// Block while paused. Returns whether the loop should keep going.
    fn wait_while_paused(&self) -> bool {
        let Ok(mut paused) = self.paused.lock() else {
            return false;
        };
        while *paused && self.is_running() {
            paused = match self.resumed.wait(paused) {
                Ok(guard) => guard,
                Err(_) => return false,
            };
        }
        self.is_running()
    }
}

enum Wait {
    Ready,
    TimedOut { available: usize },
    Stopped,
}

/// Everything the polling thread owns
struct Poller<H> {
    hw: H,
    session: AcquisitionSession,
    config: PollConfig,
    control: Arc<Control>,
    stats: Arc<AcquisitionStats>,
    notifier: Notifier,
    throttle: Option<Throttle>,
    storage: Option<FrameSaver>,
}

impl<H: HardwareChannel> Poller<H> {
    fn run(mut self) -> H {
        let expected = self.session.expected_points();
        info!(
            expected_points = expected,
            channels = self.session.channel_count,
            source = ?self.session.source,
            "Acquisition loop started"
        );
        while self.control.wait_while_paused() {
            match self.wait_for_batch(expected) {
                Ok(Wait::Ready) => {}
                Ok(Wait::Stopped) => break,
                Ok(Wait::TimedOut { available }) => {
                    warn!(available, expected, "Timeout waiting for data, abandoning batch");
                    self.stats.record_timeout();
                    self.notifier
                        .error(AcquisitionError::BufferTimeout { expected, available });
                    continue;
                }
                Err(e) => {
                    self.read_failed(e);
                    continue;
                }
            }
            match self.read_batch() {
                Ok(frames) => self.fan_out(frames),
                Err(e) => self.read_failed(e),
            }
        }
        // Whatever is still parked is the newest data, show it before leaving
        if let Some(throttle) = &mut self.throttle {
            throttle.flush();
        }
        let totals = self.stats.snapshot();
        info!(
            frames = totals.frames,
            bytes = totals.bytes,
            timeouts = totals.timeouts,
            read_errors = totals.read_errors,
            "Acquisition loop exited"
        );
        self.notifier.notify(Notification::Stopped {
            frames: totals.frames,
            bytes: totals.bytes,
        });
        self.hw
    }

    fn wait_for_batch(&mut self, expected: usize) -> std::result::Result<Wait, HardwareError> {
        let report_every = self.config.report_every.max(1);
        let mut available = 0;
        for iteration in 0..self.config.timeout_iterations {
            if !self.control.is_running() {
                return Ok(Wait::Stopped);
            }
            available = self.hw.query_buffer_points()?;
            if iteration % report_every == 0 {
                self.report_occupancy(available);
            }
            if available >= expected {
                return Ok(Wait::Ready);
            }
            if let Some(throttle) = &mut self.throttle {
                throttle.flush_due(Instant::now());
            }
            thread::sleep(self.config.poll_interval);
        }
        Ok(Wait::TimedOut { available })
    }

    fn report_occupancy(&self, points: usize) {
        let megabytes = buffer_megabytes(points, self.session.channel_count);
        trace!(points, megabytes, "Buffer occupancy");
        if let Some(throttle) = &self.throttle {
            throttle.buffer_status(points, megabytes);
        }
    }

    fn read_batch(&mut self) -> std::result::Result<Vec<Frame>, HardwareError> {
        let points = self.session.expected_points();
        let channels = self.session.channel_count;
        if self.session.source != DataSource::Phase {
            let raw = self.hw.read_raw(points, channels)?;
            return Ok(vec![Frame::raw(raw, channels)]);
        }
        let mut frames = vec![Frame::phase(self.hw.read_phase(points, channels)?, channels)];
        match self
            .hw
            .read_monitor(self.session.points_after_merge(), channels)
        {
            Ok(monitor) => frames.push(Frame::monitor(monitor, channels)),
            // Monitor data is a nice-to-have
            Err(e) => debug!("Monitor read failed: {}", e),
        }
        Ok(frames)
    }

    fn read_failed(&self, e: HardwareError) {
        warn!("Hardware error: {}", e);
        self.stats.record_read_error();
        self.notifier.error(e);
        thread::sleep(self.config.error_backoff);
    }

    fn fan_out(&mut self, frames: Vec<Frame>) {
        for frame in frames {
            if frame.kind() != FrameKind::Monitor {
                self.stats
                    .record_batch(self.session.frames_per_batch as u64, frame.byte_len() as u64);
                if let Some(storage) = &self.storage {
                    storage.save_frame(&frame);
                }
            }
            if let Some(throttle) = &mut self.throttle {
                throttle.offer(frame.into_planar());
            }
        }
        if let Some(throttle) = &mut self.throttle {
            throttle.flush_due(Instant::now());
        }
    }
}

/// Owns the hardware channel and the thread that polls it
pub struct AcquisitionLoop<H: HardwareChannel + 'static> {
    hardware: Option<H>,
    session: Option<AcquisitionSession>,
    config: PollConfig,
    control: Arc<Control>,
    stats: Arc<AcquisitionStats>,
    notifier: Notifier,
    display: Option<Sender<DisplayMessage>>,
    storage: Option<FrameSaver>,
    worker: Option<JoinHandle<H>>,
}

impl<H: HardwareChannel + 'static> AcquisitionLoop<H> {
    pub fn new(hardware: H, config: PollConfig) -> Self {
        Self {
            hardware: Some(hardware),
            session: None,
            config,
            control: Arc::new(Control::default()),
            stats: Arc::new(AcquisitionStats::default()),
            notifier: Notifier::default(),
            display: None,
            storage: None,
            worker: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_display(mut self, display: Sender<DisplayMessage>) -> Self {
        self.display = Some(display);
        self
    }

    /// Where every acquired frame goes. Takes effect on the next `start`.
    pub fn set_storage(&mut self, storage: Option<FrameSaver>) {
        self.storage = storage;
    }

    /// Validate and store the session for the next `start`. Doesn't touch the hardware.
    pub fn configure(&mut self, session: AcquisitionSession) -> Result<()> {
        if self.is_running() {
            return Err(AcquisitionError::AlreadyRunning);
        }
        session.validate()?;
        debug!(
            points = session.points_per_scan,
            merged = session.points_per_frame(),
            frames = session.frames_per_batch,
            channels = session.channel_count,
            "Session configured"
        );
        self.session = Some(session);
        Ok(())
    }

    pub fn session(&self) -> Option<&AcquisitionSession> {
        self.session.as_ref()
    }

    /// Launch the polling thread
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err(AcquisitionError::AlreadyRunning);
        }
        let session = self.session.clone().ok_or(AcquisitionError::NotConfigured)?;
        let hw = self.hardware.take().ok_or(AcquisitionError::NoHardware)?;

        self.stats.reset();
        self.control.running.store(true, Ordering::Release);
        self.control.set_paused(false);

        let poller = Poller {
            hw,
            session,
            config: self.config.clone(),
            control: self.control.clone(),
            stats: self.stats.clone(),
            notifier: self.notifier.clone(),
            throttle: self
                .display
                .clone()
                .map(|tx| Throttle::new(tx, self.config.display_interval)),
            storage: self.storage.clone(),
        };
        self.notifier.notify(Notification::Started);
        let handle = thread::Builder::new()
            .name("acquisition".to_owned())
            .spawn(move || poller.run())
            .map_err(|source| {
                self.control.running.store(false, Ordering::Release);
                AcquisitionError::Spawn {
                    name: "acquisition",
                    source,
                }
            })?;
        self.worker = Some(handle);
        Ok(())
    }

    /// Suspend polling. The device keeps streaming into its buffer.
    pub fn pause(&self) {
        if self.is_running() {
            debug!("Pausing acquisition");
            self.control.set_paused(true);
        }
    }

    pub fn resume(&self) {
        debug!("Resuming acquisition");
        self.control.set_paused(false);
    }

    /// Stop the loop and take the hardware back. Waits up to `stop_timeout`;
    /// a loop that won't exit by then is abandoned along with the hardware.
    pub fn stop(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        self.control.stop();
        match join_timeout(handle, self.config.stop_timeout) {
            Some(Ok(hw)) => {
                self.hardware = Some(hw);
                info!(frames = self.stats.snapshot().frames, "Acquisition stopped");
            }
            Some(Err(_)) => {
                error!("Acquisition thread panicked");
                self.notifier
                    .notify(Notification::Warning("acquisition thread panicked".to_owned()));
            }
            None => {
                warn!(
                    timeout = ?self.config.stop_timeout,
                    "Acquisition thread did not exit in time, abandoning it"
                );
                self.notifier.notify(Notification::Warning(
                    "acquisition thread did not exit in time".to_owned(),
                ));
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().map_or(false, |h| !h.is_finished()) && self.control.is_running()
    }

    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// The hardware, while the loop isn't holding it
    pub fn hardware_mut(&mut self) -> Option<&mut H> {
        self.hardware.as_mut()
    }

    pub fn take_hardware(&mut self) -> Option<H> {
        self.stop();
        self.hardware.take()
    }
}

impl<H: HardwareChannel + 'static> Drop for AcquisitionLoop<H> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        hardware::HwResult,
        writer::{FrameFileWriter, WriterConfig},
        ValidationError,
    };
    use crossbeam_channel::{bounded, Receiver};

    /// Reports an empty buffer for the first `ready_after` queries, then a full
    /// one until `max_reads` batches have been read
    #[derive(Default)]
    struct Scripted {
        queries: usize,
        ready_after: usize,
        max_reads: Option<usize>,
        failing_reads: usize,
        failing_monitor: bool,
        reads: usize,
        read_delay: Duration,
        // Fill each batch with its 1-based number instead of a ramp
        numbered: bool,
    }

    impl Scripted {
        fn ready() -> Self {
            Self {
                read_delay: Duration::from_millis(1),
                ..Default::default()
            }
        }

        fn read<T>(&mut self, n: usize, op: &str, f: impl Fn(usize) -> T) -> HwResult<Vec<T>> {
            thread::sleep(self.read_delay);
            if self.failing_reads > 0 {
                self.failing_reads -= 1;
                return Err(HardwareError::new(-5, op));
            }
            self.reads += 1;
            let batch = self.reads;
            Ok((0..n).map(|i| f(if self.numbered { batch } else { i })).collect())
        }
    }

    impl HardwareChannel for Scripted {
        fn query_buffer_points(&mut self) -> HwResult<usize> {
            self.queries += 1;
            let exhausted = self.max_reads.map_or(false, |max| self.reads >= max);
            Ok(if self.queries > self.ready_after && !exhausted { 1 << 20 } else { 0 })
        }

        fn read_raw(&mut self, points: usize, channels: usize) -> HwResult<Vec<i16>> {
            self.read(points * channels, "read_raw", |i| i as i16)
        }

        fn read_phase(&mut self, points: usize, channels: usize) -> HwResult<Vec<i32>> {
            self.read(points * channels, "read_phase", |i| i as i32)
        }

        fn read_monitor(&mut self, points: usize, channels: usize) -> HwResult<Vec<u32>> {
            if self.failing_monitor {
                return Err(HardwareError::new(-5, "read_monitor"));
            }
            Ok(vec![7; points * channels])
        }
    }

    fn session() -> AcquisitionSession {
        AcquisitionSession {
            points_per_scan: 512,
            merge_points: 4,
            frames_per_batch: 4,
            ..Default::default()
        }
    }

    fn fast() -> PollConfig {
        PollConfig {
            poll_interval: Duration::from_micros(100),
            timeout_iterations: 50,
            report_every: 10,
            display_interval: Duration::from_millis(5),
            error_backoff: Duration::from_millis(1),
            stop_timeout: Duration::from_secs(3),
        }
    }

    fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for {}", what);
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn notifications() -> (Notifier, Receiver<Notification>) {
        let (tx, rx) = bounded(10_000);
        (Notifier::new(tx), rx)
    }

    #[test]
    fn lifecycle_errors() {
        let mut acq = AcquisitionLoop::new(Scripted::ready(), fast());
        assert!(matches!(acq.start(), Err(AcquisitionError::NotConfigured)));
        let bad = AcquisitionSession {
            points_per_scan: 300,
            ..session()
        };
        assert!(matches!(
            acq.configure(bad),
            Err(AcquisitionError::Validation(ValidationError::Misaligned { .. }))
        ));
        acq.configure(session()).unwrap();
        acq.start().unwrap();
        assert!(acq.is_running());
        assert!(matches!(acq.start(), Err(AcquisitionError::AlreadyRunning)));
        assert!(matches!(
            acq.configure(session()),
            Err(AcquisitionError::AlreadyRunning)
        ));
        assert!(acq.hardware_mut().is_none());
        acq.stop();
        acq.stop();
        assert!(!acq.is_running());
        assert!(acq.hardware_mut().is_some());
        // A second run reuses the returned hardware
        acq.start().unwrap();
        wait_for("a batch", || acq.stats().batches > 0);
        let hw = acq.take_hardware().unwrap();
        assert!(hw.reads > 0);
    }

    #[test]
    fn timeout_does_not_end_the_loop() {
        let (notifier, rx) = notifications();
        let hw = Scripted {
            // One full timeout, then data shows up
            ready_after: 55,
            ..Scripted::ready()
        };
        let mut acq = AcquisitionLoop::new(hw, fast()).with_notifier(notifier);
        acq.configure(session()).unwrap();
        acq.start().unwrap();
        wait_for("recovery", || acq.stats().batches >= 3);
        acq.stop();

        let stats = acq.stats();
        assert_eq!(stats.timeouts, 1);
        let seen: Vec<_> = rx.try_iter().collect();
        assert!(matches!(seen[0], Notification::Started));
        assert!(seen.iter().any(|n| matches!(
            n,
            Notification::Error(AcquisitionError::BufferTimeout {
                expected: 512,
                available: 0
            })
        )));
        assert!(matches!(seen.last(), Some(Notification::Stopped { .. })));
    }

    #[test]
    fn read_errors_are_retried_on_the_next_batch() {
        let (notifier, rx) = notifications();
        let hw = Scripted {
            failing_reads: 2,
            ..Scripted::ready()
        };
        let mut acq = AcquisitionLoop::new(hw, fast()).with_notifier(notifier);
        acq.configure(session()).unwrap();
        acq.start().unwrap();
        wait_for("a good batch", || acq.stats().batches >= 1);
        acq.stop();

        assert_eq!(acq.stats().read_errors, 2);
        let errors = rx
            .try_iter()
            .filter(|n| matches!(n, Notification::Error(AcquisitionError::HardwareRead(e)) if e.code == -5))
            .count();
        assert_eq!(errors, 2);
    }

    #[test]
    fn monitor_failure_is_quiet() {
        let (notifier, rx) = notifications();
        let (tx, display) = bounded(10_000);
        let hw = Scripted {
            failing_monitor: true,
            ..Scripted::ready()
        };
        let mut acq = AcquisitionLoop::new(hw, fast())
            .with_notifier(notifier)
            .with_display(tx);
        acq.configure(session()).unwrap();
        acq.start().unwrap();
        wait_for("batches", || acq.stats().batches >= 3);
        acq.stop();

        assert_eq!(acq.stats().read_errors, 0);
        assert!(!rx.try_iter().any(|n| matches!(n, Notification::Error(_))));
        assert!(!display
            .try_iter()
            .any(|m| matches!(m, DisplayMessage::Monitor(_))));
    }

    #[test]
    fn pause_and_resume() {
        let mut acq = AcquisitionLoop::new(Scripted::ready(), fast());
        acq.configure(session()).unwrap();
        acq.start().unwrap();
        wait_for("first batch", || acq.stats().batches > 0);

        acq.pause();
        assert!(acq.is_paused());
        // Let any batch already in flight finish
        thread::sleep(Duration::from_millis(20));
        let paused_at = acq.stats().batches;
        thread::sleep(Duration::from_millis(30));
        assert_eq!(acq.stats().batches, paused_at);

        acq.resume();
        assert!(!acq.is_paused());
        wait_for("batches after resume", || acq.stats().batches > paused_at);

        // Stopping a paused loop must not hang
        acq.pause();
        acq.stop();
        assert!(!acq.is_running());
    }

    #[test]
    fn storage_sees_every_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = FrameFileWriter::new(WriterConfig {
            directory: dir.path().to_path_buf(),
            frames_per_file: 1000,
            dequeue_timeout: Duration::from_millis(5),
            ..Default::default()
        });
        let session = session();
        writer
            .start(Some(1), session.scan_rate, session.points_per_frame())
            .unwrap();

        let (tx, display) = bounded(10_000);
        let mut acq = AcquisitionLoop::new(Scripted::ready(), fast()).with_display(tx);
        acq.set_storage(Some(writer.saver()));
        acq.configure(session).unwrap();
        acq.start().unwrap();
        wait_for("batches", || acq.stats().batches >= 10);
        acq.stop();
        writer.stop();

        let acquired = acq.stats();
        let written = writer.stats();
        // Monitor frames are display-only
        assert_eq!(written.frames_written + written.dropped, acquired.batches);
        assert_eq!(acquired.frames, acquired.batches * 4);
        assert_eq!(acquired.bytes, acquired.batches * 512 * 4);

        let shown = display
            .try_iter()
            .filter(|m| matches!(m, DisplayMessage::Phase(_)))
            .count() as u64;
        assert!(shown >= 1);
        assert!(shown <= acquired.batches);
    }

    #[test]
    fn display_is_throttled_latest_wins() {
        let (tx, display) = bounded(10_000);
        let config = PollConfig {
            display_interval: Duration::from_secs(3600),
            ..fast()
        };
        let mut acq = AcquisitionLoop::new(Scripted::ready(), config).with_display(tx);
        acq.configure(session()).unwrap();
        acq.start().unwrap();
        wait_for("batches", || acq.stats().batches >= 5);
        acq.stop();

        let messages: Vec<_> = display.try_iter().collect();
        let count = |f: fn(&DisplayMessage) -> bool| messages.iter().filter(|m| f(m)).count();
        // The first flush, then the forced one on the way out
        assert_eq!(count(|m| matches!(m, DisplayMessage::Phase(_))), 2);
        assert_eq!(count(|m| matches!(m, DisplayMessage::Monitor(_))), 2);
        assert!(count(|m| matches!(m, DisplayMessage::BufferStatus { .. })) >= 1);
    }

    fn phase_values(display: &Receiver<DisplayMessage>) -> Vec<i32> {
        display
            .try_iter()
            .filter_map(|m| match m {
                DisplayMessage::Phase(frame) => match frame.samples() {
                    crate::Samples::I32(values) => values.first().copied(),
                    _ => None,
                },
                _ => None,
            })
            .collect()
    }

    #[test]
    fn parked_frame_is_shown_while_waiting_for_data() {
        let (tx, display) = bounded(10_000);
        let config = PollConfig {
            display_interval: Duration::from_millis(200),
            ..fast()
        };
        let hw = Scripted {
            max_reads: Some(2),
            numbered: true,
            ..Scripted::ready()
        };
        let mut acq = AcquisitionLoop::new(hw, config).with_display(tx);
        acq.configure(session()).unwrap();
        acq.start().unwrap();
        wait_for("both batches", || acq.stats().batches >= 2);

        // No third batch ever arrives, the second still has to be shown
        let mut shown = Vec::new();
        wait_for("the second batch on display", || {
            shown.extend(phase_values(&display));
            shown.last() == Some(&2)
        });
        assert!(acq.is_running());
        acq.stop();
        assert_eq!(shown, vec![1, 2]);
    }

    #[test]
    fn stop_flushes_the_newest_frame() {
        let (tx, display) = bounded(10_000);
        let config = PollConfig {
            display_interval: Duration::from_secs(3600),
            ..fast()
        };
        let hw = Scripted {
            numbered: true,
            ..Scripted::ready()
        };
        let mut acq = AcquisitionLoop::new(hw, config).with_display(tx);
        acq.configure(session()).unwrap();
        acq.start().unwrap();
        wait_for("batches", || acq.stats().batches >= 3);
        let hw = acq.take_hardware().unwrap();

        let shown = phase_values(&display);
        assert_eq!(shown.first(), Some(&1));
        assert_eq!(shown.last(), Some(&(hw.reads as i32)));
        assert_eq!(shown.len(), 2);
    }

    #[test]
    fn stuck_loop_is_abandoned_after_the_stop_timeout() {
        let (notifier, rx) = notifications();
        let config = PollConfig {
            stop_timeout: Duration::from_millis(50),
            ..fast()
        };
        let hw = Scripted {
            read_delay: Duration::from_millis(800),
            ..Default::default()
        };
        let mut acq = AcquisitionLoop::new(hw, config).with_notifier(notifier);
        acq.configure(session()).unwrap();
        acq.start().unwrap();
        // Let the loop get stuck inside the first read
        thread::sleep(Duration::from_millis(20));

        let t0 = Instant::now();
        acq.stop();
        assert!(t0.elapsed() < Duration::from_millis(500));
        assert!(!acq.is_running());
        assert!(rx
            .try_iter()
            .any(|n| matches!(n, Notification::Warning(w) if w.contains("did not exit"))));
        // The hardware went with the abandoned thread
        assert!(acq.hardware_mut().is_none());
        assert!(matches!(acq.start(), Err(AcquisitionError::NoHardware)));
        assert!(acq.take_hardware().is_none());
    }

    #[test]
    fn multichannel_frames_are_planar_for_display_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = FrameFileWriter::new(WriterConfig {
            directory: dir.path().to_path_buf(),
            ..Default::default()
        });
        let session = AcquisitionSession {
            points_per_scan: 256,
            channel_count: 2,
            source: DataSource::Raw,
            frames_per_batch: 2,
            ..Default::default()
        };
        writer.start(Some(1), 2000, session.points_per_frame()).unwrap();

        let (tx, display) = bounded(10_000);
        let mut acq = AcquisitionLoop::new(Scripted::ready(), fast()).with_display(tx);
        acq.set_storage(Some(writer.saver()));
        acq.configure(session).unwrap();
        acq.start().unwrap();
        wait_for("a batch", || acq.stats().batches >= 1);
        acq.stop();
        writer.stop();

        let acquisition_order: Vec<i16> = (0..1024).map(|i| i as i16).collect();
        let shown = display
            .try_iter()
            .find_map(|m| match m {
                DisplayMessage::Raw(frame) => Some(frame),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            shown.channel(0),
            Some(crate::Samples::I16((0..512).map(|i| (2 * i) as i16).collect()))
        );
        assert_eq!(shown.encode_le(), Frame::raw(acquisition_order.clone(), 2).encode_le());

        let file = std::fs::read_dir(dir.path()).unwrap().next().unwrap().unwrap().path();
        let stored = std::fs::read(file).unwrap();
        assert_eq!(&stored[..2048], &Frame::raw(acquisition_order, 2).encode_le()[..]);
    }
}
