//! The hardware channel the acquisition loop drives.
//!
//! The driver binding itself lives outside this crate; anything that can open,
//! configure and read the device implements [`HardwareChannel`]. Every call
//! either succeeds or fails with a [`HardwareError`] carrying the device code.

use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::session::{AcquisitionSession, DataSource};

/// Human-readable text for a device return code
pub fn error_message(code: i32) -> String {
    match code {
        0 => "Success".to_owned(),
        -1 => "Device open failed".to_owned(),
        -2 => "Invalid parameter".to_owned(),
        -3 => "Buffer overflow".to_owned(),
        -4 => "Device not started".to_owned(),
        -5 => "DMA error".to_owned(),
        n => format!("Unknown error ({})", n),
    }
}

fn message_for(code: &i32) -> String {
    error_message(*code)
}

/// A failed device call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation}: {} ({code})", message_for(.code))]
pub struct HardwareError {
    pub code: i32,
    pub operation: String,
}

impl HardwareError {
    pub fn new(code: i32, operation: impl Into<String>) -> Self {
        Self {
            code,
            operation: operation.into(),
        }
    }

    /// Turn a raw return code into a result, as the driver reports it
    pub fn check(code: i32, operation: &str) -> Result<(), Self> {
        if code == 0 {
            Ok(())
        } else {
            Err(Self::new(code, operation))
        }
    }
}

pub type HwResult<T = ()> = Result<T, HardwareError>;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ClockSource {
    #[default]
    Internal,
    External,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum TriggerDirection {
    Input,
    #[default]
    Output,
}

impl fmt::Display for ClockSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockSource::Internal => write!(f, "internal"),
            ClockSource::External => write!(f, "external"),
        }
    }
}

/// Phase demodulation settings, applied on the device
#[derive(Clone, Debug, PartialEq)]
pub struct PhaseDemodParams {
    pub rate2phase: u32,
    pub space_avg_order: u32,
    pub merge_points: usize,
    pub diff_order: u32,
    pub detrend_bw_hz: f64,
    pub polarization_diversity: bool,
}

impl Default for PhaseDemodParams {
    fn default() -> Self {
        Self {
            rate2phase: 1,
            space_avg_order: 25,
            merge_points: 25,
            diff_order: 1,
            detrend_bw_hz: 10.0,
            polarization_diversity: true,
        }
    }
}

/// Device settings that don't change the shape of the data
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceSettings {
    pub clock_source: ClockSource,
    pub trigger_direction: TriggerDirection,
    pub pulse_width_ns: u32,
    pub bypass_points: usize,
    pub center_freq_mhz: u32,
    pub phase_demod: PhaseDemodParams,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            clock_source: ClockSource::Internal,
            trigger_direction: TriggerDirection::Output,
            pulse_width_ns: 100,
            bypass_points: 60,
            center_freq_mhz: 200,
            phase_demod: PhaseDemodParams::default(),
        }
    }
}

/// Stable call interface to the acquisition device.
///
/// Setters and lifecycle calls default to no-ops so software devices only
/// implement what they need; the occupancy query and the reads are required.
pub trait HardwareChannel: Send {
    fn open(&mut self) -> HwResult {
        Ok(())
    }

    fn close(&mut self) -> HwResult {
        Ok(())
    }

    fn set_clock_source(&mut self, _source: ClockSource) -> HwResult {
        Ok(())
    }

    fn set_trigger_direction(&mut self, _direction: TriggerDirection) -> HwResult {
        Ok(())
    }

    fn set_scan_rate(&mut self, _hz: u32) -> HwResult {
        Ok(())
    }

    fn set_pulse_width(&mut self, _ns: u32) -> HwResult {
        Ok(())
    }

    fn set_point_count(&mut self, _points: usize) -> HwResult {
        Ok(())
    }

    fn set_bypass_points(&mut self, _points: usize) -> HwResult {
        Ok(())
    }

    fn set_center_frequency(&mut self, _hz: u32) -> HwResult {
        Ok(())
    }

    fn set_upload(&mut self, _channels: usize, _source: DataSource, _data_rate_ns: u32) -> HwResult {
        Ok(())
    }

    fn set_phase_demod(&mut self, _params: &PhaseDemodParams) -> HwResult {
        Ok(())
    }

    fn start(&mut self) -> HwResult {
        Ok(())
    }

    fn stop(&mut self) -> HwResult {
        Ok(())
    }

    /// Points currently sitting in the device buffer (per channel)
    fn query_buffer_points(&mut self) -> HwResult<usize>;

    /// Read `points` per channel of raw ADC data, interleaved by channel
    fn read_raw(&mut self, points: usize, channels: usize) -> HwResult<Vec<i16>>;

    /// Read `points` per channel of phase data, interleaved by channel
    fn read_phase(&mut self, points: usize, channels: usize) -> HwResult<Vec<i32>>;

    /// Read `points` per channel of monitor data
    fn read_monitor(&mut self, points: usize, channels: usize) -> HwResult<Vec<u32>>;
}

/// Push a session and its device settings to the hardware, stopping at the first failure
pub fn configure_device<H: HardwareChannel + ?Sized>(
    hw: &mut H,
    session: &AcquisitionSession,
    settings: &DeviceSettings,
) -> HwResult {
    debug!(
        clock = %settings.clock_source,
        scan_rate = session.scan_rate,
        points = session.points_per_scan,
        channels = session.channel_count,
        "Configuring device"
    );
    hw.set_clock_source(settings.clock_source)?;
    hw.set_trigger_direction(settings.trigger_direction)?;
    hw.set_scan_rate(session.scan_rate)?;
    hw.set_pulse_width(settings.pulse_width_ns)?;
    hw.set_point_count(session.points_per_scan)?;
    hw.set_bypass_points(settings.bypass_points)?;
    hw.set_center_frequency(settings.center_freq_mhz * 1_000_000)?;
    hw.set_upload(session.channel_count, session.source, session.data_rate_ns)?;
    // The session owns the shape of the data, so its merge factor wins
    let demod = PhaseDemodParams {
        merge_points: session.merge_points,
        rate2phase: session.rate2phase,
        ..settings.phase_demod.clone()
    };
    hw.set_phase_demod(&demod)
}
