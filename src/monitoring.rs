//! Runtime counters and the notifications the background contexts send upstream.
//! Nothing here blocks: a notification nobody has room for is dropped.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::Sender;

use crate::error::AcquisitionError;

/// Upstream events from the acquisition and writer contexts
#[derive(Debug)]
pub enum Notification {
    Started,
    Stopped { frames: u64, bytes: u64 },
    Error(AcquisitionError),
    Warning(String),
    FileOpened(String),
}

/// Optional, non-blocking handle for sending [`Notification`]s
#[derive(Clone, Debug, Default)]
pub struct Notifier(Option<Sender<Notification>>);

impl Notifier {
    pub fn new(sender: Sender<Notification>) -> Self {
        Self(Some(sender))
    }

    pub fn notify(&self, notification: Notification) {
        if let Some(tx) = &self.0 {
            // A full or closed receiver is the listener's problem, not ours
            let _ = tx.try_send(notification);
        }
    }

    pub fn error(&self, error: impl Into<AcquisitionError>) {
        self.notify(Notification::Error(error.into()))
    }
}

/// Cumulative acquisition counters, shared between the loop and its owner
#[derive(Debug, Default)]
pub struct AcquisitionStats {
    frames: AtomicU64,
    bytes: AtomicU64,
    batches: AtomicU64,
    timeouts: AtomicU64,
    read_errors: AtomicU64,
}

/// Point-in-time copy of [`AcquisitionStats`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames: u64,
    pub bytes: u64,
    pub batches: u64,
    pub timeouts: u64,
    pub read_errors: u64,
}

impl AcquisitionStats {
    pub fn reset(&self) {
        for counter in [
            &self.frames,
            &self.bytes,
            &self.batches,
            &self.timeouts,
            &self.read_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub fn record_batch(&self, frames: u64, bytes: u64) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.frames.fetch_add(frames, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
        }
    }
}

/// Device buffer occupancy in MB, assuming 2 bytes per point per channel
pub fn buffer_megabytes(points: usize, channel_count: usize) -> usize {
    points * channel_count * 2 / (1024 * 1024)
}

/// Average throughput in MB/s
pub fn throughput_mbps(bytes: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= 0.0 {
        return 0.0;
    }
    bytes as f64 / 1024.0 / 1024.0 / elapsed_secs
}
