//! Windowed power spectrum / PSD estimation with running averages.
//!
//! For a frame of N samples:
//! * Multiply by a window, remembering its coherent gain `sum(w)/N` and
//!   equivalent noise bandwidth `N·sum(w²)/sum(w)²`
//! * FFT and keep the first N/2 bins
//! * Power = |X|²/N², divided by the coherent gain squared, non-DC bins doubled
//! * PSD additionally divides by `df · noise_bandwidth`
//! * Everything leaves in dB as `10·log10(p + 1e-20)`

use std::collections::{HashMap, VecDeque};
use std::f64::consts::PI;
use std::sync::Arc;

use num_traits::AsPrimitive;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use tracing::{debug, trace};

use crate::frame::FrameKind;

/// Floor added before taking logs so silent bins stay finite
pub const EPSILON: f64 = 1e-20;
/// Voltage the ADC full scale maps to
pub const ADC_FULL_SCALE_VOLTS: f64 = 0.95;
/// Largest int16 ADC count
pub const ADC_MAX_COUNT: f64 = 32767.0;

/// dB of a linear power value, floored at [`EPSILON`]
pub fn to_db(power: f64) -> f64 {
    10.0 * (power + EPSILON).log10()
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum WindowType {
    Rectangular,
    #[default]
    Hanning,
    Hamming,
    Blackman,
    FlatTop,
}

impl WindowType {
    /// Symmetric window coefficients of length `n`
    pub fn coefficients(self, n: usize) -> Vec<f64> {
        if n <= 1 {
            return vec![1.0; n];
        }
        let m = (n - 1) as f64;
        let cosine_sum = |a: &[f64]| -> Vec<f64> {
            (0..n)
                .map(|i| {
                    let x = 2.0 * PI * i as f64 / m;
                    a.iter()
                        .enumerate()
                        .map(|(k, ak)| {
                            let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
                            sign * ak * (k as f64 * x).cos()
                        })
                        .sum()
                })
                .collect()
        };
        match self {
            WindowType::Rectangular => vec![1.0; n],
            WindowType::Hanning => cosine_sum(&[0.5, 0.5]),
            WindowType::Hamming => cosine_sum(&[0.54, 0.46]),
            WindowType::Blackman => cosine_sum(&[0.42, 0.5, 0.08]),
            WindowType::FlatTop => cosine_sum(&[
                0.215_578_95,
                0.416_631_58,
                0.277_263_158,
                0.083_578_947,
                0.006_947_368,
            ]),
        }
    }
}

/// Window coefficients with their correction factors, computed once per length
#[derive(Debug)]
struct Window {
    coefficients: Vec<f64>,
    coherent_gain: f64,
    noise_bandwidth: f64,
}

impl Window {
    fn new(kind: WindowType, n: usize) -> Self {
        let coefficients = kind.coefficients(n);
        let sum: f64 = coefficients.iter().sum();
        let sum_sq: f64 = coefficients.iter().map(|w| w * w).sum();
        Self {
            coherent_gain: sum / n as f64,
            noise_bandwidth: n as f64 * sum_sq / (sum * sum),
            coefficients,
        }
    }
}

/// One single-sided spectrum
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Spectrum {
    /// Bin frequencies in Hz, `k·df`
    pub freqs: Vec<f64>,
    /// dB re V² (power) or V²/Hz (PSD); phase input is in its own units
    pub power_db: Vec<f64>,
    /// Frequency resolution in Hz
    pub df: f64,
}

impl Spectrum {
    pub fn len(&self) -> usize {
        self.power_db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.power_db.is_empty()
    }

    /// Strongest bin as (frequency, dB), skipping DC
    pub fn peak(&self) -> Option<(f64, f64)> {
        self.freqs
            .iter()
            .zip(&self.power_db)
            .filter(|(f, _)| **f > 0.0)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(&f, &p)| (f, p))
    }

    /// Median level in dB, a cheap noise floor estimate
    pub fn noise_floor(&self) -> Option<f64> {
        if self.power_db.is_empty() {
            return None;
        }
        let mut sorted = self.power_db.clone();
        sorted.sort_by(f64::total_cmp);
        Some(sorted[sorted.len() / 2])
    }
}

/// Spectrum estimator with its window cache and averaging history.
///
/// One engine belongs to one consumer; it is `Send` but not meant to be shared.
pub struct SpectrumEngine {
    window_type: WindowType,
    windows: HashMap<usize, Arc<Window>>,
    planner: FftPlanner<f64>,
    averaging_count: usize,
    // Linear power spectra, newest at the back
    history: VecDeque<Vec<f64>>,
    freqs: Option<Vec<f64>>,
    df: f64,
}

impl Default for SpectrumEngine {
    fn default() -> Self {
        Self::new(WindowType::default(), 1)
    }
}

impl SpectrumEngine {
    pub fn new(window_type: WindowType, averaging_count: usize) -> Self {
        Self {
            window_type,
            windows: HashMap::new(),
            planner: FftPlanner::new(),
            averaging_count: averaging_count.max(1),
            history: VecDeque::new(),
            freqs: None,
            df: 0.0,
        }
    }

    pub fn window_type(&self) -> WindowType {
        self.window_type
    }

    pub fn averaging_count(&self) -> usize {
        self.averaging_count
    }

    /// Spectra currently held for averaging
    pub fn averaged_spectra(&self) -> usize {
        self.history.len()
    }

    /// Number of frame lengths with a cached window
    pub fn cached_windows(&self) -> usize {
        self.windows.len()
    }

    /// Frequency axis of the last update, if any
    pub fn freqs(&self) -> Option<&[f64]> {
        self.freqs.as_deref()
    }

    /// Change the window function. Cached windows belong to the old type and are dropped.
    pub fn set_window(&mut self, window_type: WindowType) {
        self.window_type = window_type;
        self.windows.clear();
    }

    /// Resize the averaging history, keeping the newest spectra when shrinking
    pub fn set_averaging_count(&mut self, count: usize) {
        self.averaging_count = count.max(1);
        while self.history.len() > self.averaging_count {
            self.history.pop_front();
        }
    }

    /// Forget the averaging history. Windows stay cached.
    pub fn reset(&mut self) {
        self.history.clear();
        self.freqs = None;
        self.df = 0.0;
    }

    fn window(&mut self, n: usize) -> Arc<Window> {
        let kind = self.window_type;
        self.windows
            .entry(n)
            .or_insert_with(|| {
                debug!(?kind, n, "Building window");
                Arc::new(Window::new(kind, n))
            })
            .clone()
    }

    /// Spectrum of a single frame, without touching the averaging history
    pub fn analyze<T>(&mut self, data: &[T], sample_rate: f64, psd_mode: bool, kind: FrameKind) -> Spectrum
    where
        T: AsPrimitive<f64>,
    {
        let n = data.len();
        if n == 0 {
            return Spectrum::default();
        }
        let window = self.window(n);
        if window.coherent_gain <= f64::EPSILON {
            // Too short for this window to carry any energy
            trace!(n, "Degenerate window, no spectrum");
            return Spectrum::default();
        }

        // Raw ADC counts become volts, phase stays in its native units
        let scale = match kind {
            FrameKind::RawIq => ADC_FULL_SCALE_VOLTS / ADC_MAX_COUNT,
            FrameKind::Phase | FrameKind::Monitor => 1.0,
        };
        let mut buffer: Vec<Complex<f64>> = data
            .iter()
            .zip(&window.coefficients)
            .map(|(x, w)| Complex::new(x.as_() * scale * w, 0.0))
            .collect();
        let fft: Arc<dyn Fft<f64>> = self.planner.plan_fft_forward(n);
        fft.process(&mut buffer);

        let n_half = n / 2;
        let norm = (n * n) as f64 * window.coherent_gain * window.coherent_gain;
        let df = sample_rate / n as f64;
        let psd_scale = if psd_mode {
            1.0 / (df * window.noise_bandwidth)
        } else {
            1.0
        };

        let power_db = buffer[..n_half]
            .iter()
            .enumerate()
            .map(|(k, x)| {
                let single_sided = if k == 0 { 1.0 } else { 2.0 };
                to_db(x.norm_sqr() / norm * single_sided * psd_scale)
            })
            .collect();
        let freqs = (0..n_half).map(|k| k as f64 * df).collect();

        Spectrum {
            freqs,
            power_db,
            df,
        }
    }

    /// Analyze a frame and fold it into the running average.
    ///
    /// Averaging happens on linear power; the mean is converted back to dB.
    /// A change of frame length or resolution restarts the average.
    pub fn update<T>(&mut self, data: &[T], sample_rate: f64, psd_mode: bool, kind: FrameKind) -> Spectrum
    where
        T: AsPrimitive<f64>,
    {
        let spectrum = self.analyze(data, sample_rate, psd_mode, kind);
        if spectrum.is_empty() {
            return spectrum;
        }

        let shape_changed = self
            .history
            .back()
            .map_or(false, |last| last.len() != spectrum.len())
            || (self.df != 0.0 && self.df != spectrum.df);
        if shape_changed {
            debug!(bins = spectrum.len(), df = spectrum.df, "Spectrum shape changed, restarting average");
            self.history.clear();
        }

        self.history
            .push_back(spectrum.power_db.iter().map(|db| 10f64.powf(db / 10.0)).collect());
        while self.history.len() > self.averaging_count {
            self.history.pop_front();
        }

        let count = self.history.len() as f64;
        let mut mean = vec![0.0; spectrum.len()];
        for linear in &self.history {
            for (m, p) in mean.iter_mut().zip(linear) {
                *m += p;
            }
        }
        // Every entry already carries the epsilon floor, so the mean is strictly positive
        let power_db = mean.iter().map(|m| 10.0 * (m / count).log10()).collect();

        self.freqs = Some(spectrum.freqs.clone());
        self.df = spectrum.df;
        Spectrum {
            power_db,
            ..spectrum
        }
    }
}
