//! A software stand-in for the acquisition card.
//!
//! Scans accumulate in a virtual buffer at the configured scan rate while the
//! device is started; reads hand back uniformly random samples in the ranges
//! the card produces.

use std::time::Instant;

use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, warn};

use crate::{
    hardware::{HardwareChannel, HardwareError, HwResult, PhaseDemodParams},
    session::DataSource,
};

/// Driver return code for "Device not started"
const NOT_STARTED: i32 = -4;
/// Driver return code for "Device open failed"
const NOT_OPEN: i32 = -1;
/// Driver return code for "Invalid parameter"
const INVALID: i32 = -2;

/// Default on-board buffer, in bytes
pub const BUFFER_BYTES: usize = 512 * 1024 * 1024;

pub struct SimulatedChannel {
    rng: StdRng,
    opened: bool,
    started_at: Option<Instant>,
    scan_rate: u32,
    points_per_scan: usize,
    merge_points: usize,
    channels: usize,
    source: DataSource,
    /// Points per channel already handed out
    consumed: usize,
    capacity_bytes: usize,
    overflowed: bool,
}

impl Default for SimulatedChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedChannel {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic samples, for tests and benches
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            opened: false,
            started_at: None,
            scan_rate: 2000,
            points_per_scan: 20480,
            merge_points: 25,
            channels: 1,
            source: DataSource::Phase,
            consumed: 0,
            capacity_bytes: BUFFER_BYTES,
            overflowed: false,
        }
    }

    pub fn with_capacity(mut self, bytes: usize) -> Self {
        self.capacity_bytes = bytes;
        self
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    /// Points per channel one scan adds to the buffer
    fn points_per_produced_scan(&self) -> usize {
        match self.source {
            DataSource::Phase => self.points_per_scan / self.merge_points.max(1),
            _ => self.points_per_scan,
        }
    }

    fn capacity_points(&self) -> usize {
        self.capacity_bytes / (2 * self.channels.max(1))
    }

    fn buffered(&mut self) -> usize {
        let Some(started) = self.started_at else {
            return 0;
        };
        let scans = (started.elapsed().as_secs_f64() * f64::from(self.scan_rate)) as usize;
        let produced = scans * self.points_per_produced_scan();
        let available = produced.saturating_sub(self.consumed);
        let capacity = self.capacity_points();
        if available > capacity {
            if !self.overflowed {
                warn!(capacity, "Simulated buffer overflowed, discarding oldest scans");
                self.overflowed = true;
            }
            self.consumed = produced - capacity;
            return capacity;
        }
        available
    }

    fn take(&mut self, points: usize, operation: &str) -> HwResult<usize> {
        if !self.opened {
            return Err(HardwareError::new(NOT_OPEN, operation));
        }
        if !self.is_started() {
            return Err(HardwareError::new(NOT_STARTED, operation));
        }
        let available = self.buffered();
        let taken = points.min(available);
        self.consumed += taken;
        Ok(taken)
    }
}

impl HardwareChannel for SimulatedChannel {
    fn open(&mut self) -> HwResult {
        debug!("Opened simulated device");
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) -> HwResult {
        self.started_at = None;
        self.opened = false;
        Ok(())
    }

    fn set_scan_rate(&mut self, hz: u32) -> HwResult {
        if hz == 0 {
            return Err(HardwareError::new(INVALID, "set_scan_rate"));
        }
        self.scan_rate = hz;
        Ok(())
    }

    fn set_point_count(&mut self, points: usize) -> HwResult {
        if points == 0 {
            return Err(HardwareError::new(INVALID, "set_point_count"));
        }
        self.points_per_scan = points;
        Ok(())
    }

    fn set_upload(&mut self, channels: usize, source: DataSource, _data_rate_ns: u32) -> HwResult {
        if !matches!(channels, 1 | 2 | 4) {
            return Err(HardwareError::new(INVALID, "set_upload"));
        }
        self.channels = channels;
        self.source = source;
        Ok(())
    }

    fn set_phase_demod(&mut self, params: &PhaseDemodParams) -> HwResult {
        self.merge_points = params.merge_points.max(1);
        Ok(())
    }

    fn start(&mut self) -> HwResult {
        if !self.opened {
            return Err(HardwareError::new(NOT_OPEN, "start"));
        }
        self.started_at = Some(Instant::now());
        self.consumed = 0;
        self.overflowed = false;
        debug!(
            scan_rate = self.scan_rate,
            points = self.points_per_scan,
            channels = self.channels,
            "Started simulated device"
        );
        Ok(())
    }

    fn stop(&mut self) -> HwResult {
        self.started_at = None;
        Ok(())
    }

    fn query_buffer_points(&mut self) -> HwResult<usize> {
        if !self.is_started() {
            return Err(HardwareError::new(NOT_STARTED, "query_buffer_points"));
        }
        Ok(self.buffered())
    }

    fn read_raw(&mut self, points: usize, channels: usize) -> HwResult<Vec<i16>> {
        self.take(points, "read_raw")?;
        let rng = &mut self.rng;
        Ok((0..points * channels).map(|_| rng.gen_range(-32767..=32767)).collect())
    }

    fn read_phase(&mut self, points: usize, channels: usize) -> HwResult<Vec<i32>> {
        self.take(points, "read_phase")?;
        let rng = &mut self.rng;
        Ok((0..points * channels).map(|_| rng.gen_range(-100_000..=100_000)).collect())
    }

    fn read_monitor(&mut self, points: usize, channels: usize) -> HwResult<Vec<u32>> {
        // Monitor data rides along with phase and doesn't drain the buffer
        if !self.is_started() {
            return Err(HardwareError::new(NOT_STARTED, "read_monitor"));
        }
        let rng = &mut self.rng;
        Ok((0..points * channels).map(|_| rng.gen_range(0..65536)).collect())
    }
}
