//! Acquisition core for a phase-sensitive DAS interrogator.
//!
//! An [`acquisition::AcquisitionLoop`] polls a [`hardware::HardwareChannel`] for
//! full batches and fans each one out: every frame goes to the
//! [`writer::FrameFileWriter`] for storage, the latest frame of each kind goes to
//! the display at a capped rate, and display consumers run
//! [`spectrum::SpectrumEngine`] on what they were shown.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub mod acquisition;
pub mod display;
pub mod error;
pub mod frame;
pub mod hardware;
pub mod monitoring;
pub mod session;
pub mod sim;
pub mod spectrum;
pub mod writer;

pub use acquisition::{AcquisitionLoop, PollConfig};
pub use error::{AcquisitionError, ValidationError};
pub use frame::{Frame, FrameKind, Samples};
pub use hardware::HardwareChannel;
pub use session::{AcquisitionSession, DataSource};
pub use spectrum::{Spectrum, SpectrumEngine, WindowType};
pub use writer::{FrameFileWriter, WriterConfig};

/// Join a background thread, giving up after `timeout`.
///
/// `None` means the thread is still running; it is detached and left to exit on its own.
pub(crate) fn join_timeout<T>(handle: JoinHandle<T>, timeout: Duration) -> Option<thread::Result<T>> {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return None;
        }
        thread::sleep(Duration::from_millis(1));
    }
    Some(handle.join())
}
