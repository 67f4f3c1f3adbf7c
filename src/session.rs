//! Acquisition session parameters and the device's point-count constraints

use crate::{error::ValidationError, frame::FrameKind};

// Single channel: 256K points max, 512 point alignment
pub const MAX_POINT_NUM_1CH: usize = 262_144;
pub const POINT_NUM_ALIGN_1CH: usize = 512;
// Dual channel shares bandwidth
pub const MAX_POINT_NUM_2CH: usize = 131_072;
pub const POINT_NUM_ALIGN_2CH: usize = 256;
// Quad channel is phase-only
pub const MAX_POINT_NUM_4CH: usize = 65_536;
pub const POINT_NUM_ALIGN_4CH: usize = 128;

/// Which stage of the device pipeline gets uploaded to the host
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DataSource {
    /// Raw backscatter from the ADC
    Raw,
    /// I/Q demodulated
    Iq,
    /// arctan(Q/I)
    Arctan,
    /// Fully phase-demodulated
    Phase,
}

impl DataSource {
    /// Code the device expects in its upload parameters
    pub fn code(self) -> i32 {
        match self {
            DataSource::Raw => 0,
            DataSource::Iq => 2,
            DataSource::Arctan => 3,
            DataSource::Phase => 4,
        }
    }

    /// Everything except phase comes back as int16 raw reads
    pub fn frame_kind(self) -> FrameKind {
        match self {
            DataSource::Phase => FrameKind::Phase,
            _ => FrameKind::RawIq,
        }
    }
}

/// Parameters fixed for the lifetime of one acquisition run
#[derive(Clone, Debug, PartialEq)]
pub struct AcquisitionSession {
    /// Spatial points per laser scan, before merging
    pub points_per_scan: usize,
    /// Frames read per batch
    pub frames_per_batch: usize,
    pub channel_count: usize,
    pub source: DataSource,
    /// Spatial merge factor applied by phase demodulation
    pub merge_points: usize,
    /// Laser scan rate in Hz, also the sample rate of every fiber position
    pub scan_rate: u32,
    /// Sampling interval in ns
    pub data_rate_ns: u32,
    /// Phase decimation factor
    pub rate2phase: u32,
}

impl Default for AcquisitionSession {
    fn default() -> Self {
        Self {
            points_per_scan: 20480,
            frames_per_batch: 1024,
            channel_count: 1,
            source: DataSource::Phase,
            merge_points: 25,
            scan_rate: 2000,
            data_rate_ns: 1,
            rate2phase: 1,
        }
    }
}

impl AcquisitionSession {
    /// Check the session against the device limits for its channel count
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_point_num(self.points_per_scan, self.channel_count)?;
        if self.channel_count == 4 && self.source != DataSource::Phase {
            return Err(ValidationError::QuadChannelSource);
        }
        if self.merge_points == 0 {
            return Err(ValidationError::MergeFactor);
        }
        if self.source == DataSource::Phase && self.points_after_merge() == 0 {
            return Err(ValidationError::EmptyMergedFrame {
                points: self.points_per_scan,
                merge: self.merge_points,
            });
        }
        if self.frames_per_batch == 0 {
            return Err(ValidationError::BatchSize);
        }
        if self.scan_rate == 0 {
            return Err(ValidationError::ScanRate);
        }
        Ok(())
    }

    pub fn frame_kind(&self) -> FrameKind {
        self.source.frame_kind()
    }

    pub fn points_after_merge(&self) -> usize {
        self.points_per_scan / self.merge_points.max(1)
    }

    /// Points per channel in a single frame, merged when in phase mode
    pub fn points_per_frame(&self) -> usize {
        match self.source {
            DataSource::Phase => self.points_after_merge(),
            _ => self.points_per_scan,
        }
    }

    /// Buffered points needed before a batch can be read
    pub fn expected_points(&self) -> usize {
        self.points_per_frame() * self.frames_per_batch
    }

    /// Bytes one batch occupies across all channels
    pub fn batch_bytes(&self) -> usize {
        self.expected_points() * self.channel_count * self.frame_kind().sample_size()
    }

    /// Sample rate of the spectrum input: the scan rate for phase (one sample
    /// per position per scan), the ADC rate for everything else.
    pub fn spectrum_sample_rate(&self) -> f64 {
        match self.source {
            DataSource::Phase => f64::from(self.scan_rate),
            _ => 1e9 / f64::from(self.data_rate_ns.max(1)),
        }
    }

    /// Monitored fiber length in km
    pub fn fiber_length_km(&self) -> f64 {
        let meters_per_point = match self.source {
            DataSource::Phase => 0.4 * f64::from(self.rate2phase),
            _ => 0.1 * f64::from(self.data_rate_ns),
        };
        self.points_per_scan as f64 * meters_per_point / 1000.0
    }

    /// Sustained device throughput in MB/s, counting 2 bytes per point
    pub fn data_rate_mbps(&self) -> f64 {
        f64::from(self.scan_rate) * self.points_per_scan as f64 * 2.0 * self.channel_count as f64
            / 1024.0
            / 1024.0
    }
}

/// Check a point count against the limits for `channel_count`
pub fn validate_point_num(points: usize, channel_count: usize) -> Result<(), ValidationError> {
    let (max, align) = match channel_count {
        1 => (MAX_POINT_NUM_1CH, POINT_NUM_ALIGN_1CH),
        2 => (MAX_POINT_NUM_2CH, POINT_NUM_ALIGN_2CH),
        4 => (MAX_POINT_NUM_4CH, POINT_NUM_ALIGN_4CH),
        n => return Err(ValidationError::ChannelCount(n)),
    };
    if points > max {
        return Err(ValidationError::TooManyPoints {
            channels: channel_count,
            max,
            points,
        });
    }
    if points % align != 0 {
        return Err(ValidationError::Misaligned {
            channels: channel_count,
            align,
            points,
        });
    }
    Ok(())
}
