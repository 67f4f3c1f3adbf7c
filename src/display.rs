//! Display side of the fan-out.
//!
//! The display only ever needs the newest frame of each kind, so frames are
//! parked as pending and overwritten until the throttle interval lets them
//! through. Spectra are computed downstream from what was actually shown.

use std::{
    f64::consts::PI,
    time::{Duration, Instant},
};

use crossbeam_channel::{Sender, TrySendError};
use tracing::{debug, trace};

use crate::{
    frame::{Frame, FrameKind, Samples},
    spectrum::{Spectrum, SpectrumEngine},
};

/// What the display sink receives
#[derive(Clone, Debug, PartialEq)]
pub enum DisplayMessage {
    Phase(Frame),
    Raw(Frame),
    Monitor(Frame),
    /// Device buffer occupancy
    BufferStatus { points: usize, megabytes: usize },
}

impl DisplayMessage {
    fn for_frame(frame: Frame) -> Self {
        match frame.kind() {
            FrameKind::Phase => DisplayMessage::Phase(frame),
            FrameKind::RawIq => DisplayMessage::Raw(frame),
            FrameKind::Monitor => DisplayMessage::Monitor(frame),
        }
    }
}

/// Phase counts to radians, for display only
pub fn phase_to_radians(value: i32) -> f64 {
    f64::from(value) / 32767.0 * PI
}

/// Latest-wins rate limiter in front of the display channel
pub struct Throttle {
    tx: Sender<DisplayMessage>,
    min_interval: Duration,
    last_flush: Option<Instant>,
    // One slot per kind, indexed by `slot`
    pending: [Option<Frame>; 3],
    sent: u64,
    superseded: u64,
}

fn slot(kind: FrameKind) -> usize {
    match kind {
        FrameKind::RawIq => 0,
        FrameKind::Phase => 1,
        FrameKind::Monitor => 2,
    }
}

impl Throttle {
    pub fn new(tx: Sender<DisplayMessage>, min_interval: Duration) -> Self {
        Self {
            tx,
            min_interval,
            last_flush: None,
            pending: [None, None, None],
            sent: 0,
            superseded: 0,
        }
    }

    /// Park a frame, replacing any unsent frame of the same kind
    pub fn offer(&mut self, frame: Frame) {
        if self.pending[slot(frame.kind())].replace(frame).is_some() {
            self.superseded += 1;
        }
    }

    /// Send everything pending if the interval since the last flush has passed.
    /// Returns how many frames went out.
    pub fn flush_due(&mut self, now: Instant) -> usize {
        if let Some(last) = self.last_flush {
            if now.saturating_duration_since(last) < self.min_interval {
                return 0;
            }
        }
        self.flush_at(now)
    }

    /// Send everything pending, interval or not
    pub fn flush(&mut self) -> usize {
        self.flush_at(Instant::now())
    }

    fn flush_at(&mut self, now: Instant) -> usize {
        if !self.has_pending() {
            return 0;
        }
        self.last_flush = Some(now);
        let frames: Vec<Frame> = self.pending.iter_mut().filter_map(Option::take).collect();
        let mut sent = 0;
        for frame in frames {
            if self.send(DisplayMessage::for_frame(frame)) {
                sent += 1;
            }
        }
        self.sent += sent as u64;
        trace!(sent, "Flushed display frames");
        sent
    }

    /// Occupancy reports are already sparse, so they skip the pending slots
    pub fn buffer_status(&self, points: usize, megabytes: usize) {
        self.send(DisplayMessage::BufferStatus { points, megabytes });
    }

    pub fn has_pending(&self) -> bool {
        self.pending.iter().any(Option::is_some)
    }

    /// Frames delivered to the display so far
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Frames overwritten before they were ever shown
    pub fn superseded(&self) -> u64 {
        self.superseded
    }

    fn send(&self, message: DisplayMessage) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Display channel full, skipping update");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Which samples of a displayed frame go into the spectrum
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TapMode {
    /// The first scan of channel 0 (spectrum along the fiber)
    #[default]
    FirstScan,
    /// One fiber position followed through every scan in the batch
    Region(usize),
}

/// Runs a [`SpectrumEngine`] on frames the display received.
///
/// Always consumes the stored integer samples, never display-converted values.
pub struct SpectrumTap {
    engine: SpectrumEngine,
    sample_rate: f64,
    points_per_frame: usize,
    psd_mode: bool,
    mode: TapMode,
}

impl SpectrumTap {
    pub fn new(engine: SpectrumEngine, sample_rate: f64, points_per_frame: usize, psd_mode: bool) -> Self {
        Self {
            engine,
            sample_rate,
            points_per_frame: points_per_frame.max(1),
            psd_mode,
            mode: TapMode::FirstScan,
        }
    }

    pub fn with_mode(mut self, mode: TapMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn engine(&self) -> &SpectrumEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SpectrumEngine {
        &mut self.engine
    }

    /// Averaged spectrum of `frame`, or `None` for monitor frames and frames too short to use
    pub fn process(&mut self, frame: &Frame) -> Option<Spectrum> {
        let kind = frame.kind();
        if kind == FrameKind::Monitor {
            return None;
        }
        let samples = frame.channel(0)?;
        let series = self.select(&samples);
        if series.len() < 2 {
            return None;
        }
        let mut spectrum = self.engine.update(&series, self.sample_rate, self.psd_mode, kind);
        if kind == FrameKind::Phase {
            // Phase is relative, nothing below 1 Hz carries information
            let below = spectrum.freqs.iter().take_while(|f| **f < 1.0).count();
            spectrum.freqs.drain(..below);
            spectrum.power_db.drain(..below);
        }
        Some(spectrum)
    }

    fn select(&self, samples: &Samples) -> Vec<f64> {
        let values = samples.to_f64();
        match self.mode {
            TapMode::FirstScan => {
                if values.len() < self.points_per_frame {
                    return Vec::new();
                }
                values[..self.points_per_frame].to_vec()
            }
            TapMode::Region(index) => {
                let index = index.min(self.points_per_frame - 1);
                values
                    .iter()
                    .skip(index)
                    .step_by(self.points_per_frame)
                    .copied()
                    .collect()
            }
        }
    }
}
