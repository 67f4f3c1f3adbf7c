//! Argument parsing for running from the command line

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use das_slurper::{display::TapMode, AcquisitionSession, DataSource, WindowType};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Spatial points per scan, before merging
    #[clap(short, long, default_value_t = 20480)]
    pub points: usize,
    /// Scans read per batch
    #[clap(short, long, default_value_t = 1024)]
    pub frames: usize,
    /// Number of channels (1, 2 or 4)
    #[clap(short, long, default_value_t = 1)]
    pub channels: usize,
    /// Data uploaded by the device
    #[clap(long, value_enum, default_value_t = Source::Phase)]
    pub source: Source,
    /// Spatial merge factor for phase demodulation
    #[clap(short, long, default_value_t = 25)]
    pub merge: usize,
    /// Laser scan rate in Hz
    #[clap(short = 'r', long, default_value_t = 2000)]
    #[clap(value_parser = clap::value_parser!(u32).range(1..))]
    pub scan_rate: u32,
    /// Sampling interval in ns
    #[clap(long, default_value_t = 1)]
    pub data_rate: u32,
    /// Phase decimation factor
    #[clap(long, default_value_t = 1)]
    pub rate2phase: u32,
    /// Directory to save frames into. Nothing is saved without it.
    #[clap(short, long)]
    pub save: Option<PathBuf>,
    /// Frames per output file
    #[clap(long, default_value_t = 10)]
    pub frames_per_file: usize,
    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[clap(short, long)]
    pub duration: Option<f64>,
    /// Spectrum window
    #[clap(short, long, value_enum, default_value_t = Window::Hanning)]
    pub window: Window,
    /// Spectra to average
    #[clap(short, long, default_value_t = 10)]
    pub averaging: usize,
    /// Report power spectral density instead of power
    #[clap(long)]
    pub psd: bool,
    /// Follow one fiber position through time instead of taking the spectrum along the fiber
    #[clap(long, value_name = "INDEX")]
    pub region: Option<usize>,
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Raw,
    Iq,
    Arctan,
    Phase,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Window {
    Rectangular,
    Hanning,
    Hamming,
    Blackman,
    FlatTop,
}

impl From<Source> for DataSource {
    fn from(source: Source) -> Self {
        match source {
            Source::Raw => DataSource::Raw,
            Source::Iq => DataSource::Iq,
            Source::Arctan => DataSource::Arctan,
            Source::Phase => DataSource::Phase,
        }
    }
}

impl From<Window> for WindowType {
    fn from(window: Window) -> Self {
        match window {
            Window::Rectangular => WindowType::Rectangular,
            Window::Hanning => WindowType::Hanning,
            Window::Hamming => WindowType::Hamming,
            Window::Blackman => WindowType::Blackman,
            Window::FlatTop => WindowType::FlatTop,
        }
    }
}

impl Args {
    pub fn session(&self) -> AcquisitionSession {
        AcquisitionSession {
            points_per_scan: self.points,
            frames_per_batch: self.frames,
            channel_count: self.channels,
            source: self.source.into(),
            merge_points: self.merge,
            scan_rate: self.scan_rate,
            data_rate_ns: self.data_rate,
            rate2phase: self.rate2phase,
        }
    }

    pub fn tap_mode(&self) -> TapMode {
        self.region.map_or(TapMode::FirstScan, TapMode::Region)
    }
}

/// Match verbosity filter with tracing subscriber log levels
pub fn convert_filter(filter: log::LevelFilter) -> tracing_subscriber::filter::LevelFilter {
    match filter {
        log::LevelFilter::Off => tracing_subscriber::filter::LevelFilter::OFF,
        log::LevelFilter::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        log::LevelFilter::Warn => tracing_subscriber::filter::LevelFilter::WARN,
        log::LevelFilter::Info => tracing_subscriber::filter::LevelFilter::INFO,
        log::LevelFilter::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
        log::LevelFilter::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
    }
}
