//! Error taxonomy for the acquisition pipeline

use std::path::PathBuf;

use thiserror::Error;

use crate::hardware::HardwareError;

/// Session parameters the device cannot run with. These are the only errors
/// returned synchronously, before anything touches the hardware.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{channels} channel mode: point count must be <= {max}, got {points}")]
    TooManyPoints {
        channels: usize,
        max: usize,
        points: usize,
    },
    #[error("{channels} channel mode: point count must be a multiple of {align}, got {points}")]
    Misaligned {
        channels: usize,
        align: usize,
        points: usize,
    },
    #[error("unsupported channel count {0} (expected 1, 2 or 4)")]
    ChannelCount(usize),
    #[error("4 channel mode only supports the phase data source")]
    QuadChannelSource,
    #[error("merge factor must be at least 1")]
    MergeFactor,
    #[error("merge factor {merge} leaves no points out of {points}")]
    EmptyMergedFrame { points: usize, merge: usize },
    #[error("frames per batch must be at least 1")]
    BatchSize,
    #[error("scan rate must be at least 1 Hz")]
    ScanRate,
}

/// Everything the producer and writer contexts can report upstream
#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("hardware read failed: {0}")]
    HardwareRead(#[from] HardwareError),
    #[error("timeout waiting for data: {available} of {expected} points buffered")]
    BufferTimeout { expected: usize, available: usize },
    #[error("storage queue full, frame dropped ({dropped} total)")]
    QueueOverflow { dropped: u64 },
    #[error("write to {path:?} failed: {source}")]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid session: {0}")]
    Validation(#[from] ValidationError),
    #[error("acquisition loop has no session configured")]
    NotConfigured,
    #[error("acquisition loop is already running")]
    AlreadyRunning,
    #[error("acquisition loop has no hardware channel (lost after a forced stop)")]
    NoHardware,
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, AcquisitionError>;
