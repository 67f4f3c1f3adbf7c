use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::Context;
use clap::Parser;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use das_slurper::{
    display::{DisplayMessage, SpectrumTap},
    hardware::{configure_device, DeviceSettings, HardwareChannel},
    monitoring::{throughput_mbps, Notification, Notifier},
    sim::SimulatedChannel,
    AcquisitionLoop, AcquisitionSession, FrameFileWriter, PollConfig, SpectrumEngine, WriterConfig,
};
use tracing::{debug, error, info, warn};

mod args;

fn display_consumer(receiver: Receiver<DisplayMessage>, mut tap: SpectrumTap) {
    for message in receiver {
        match message {
            DisplayMessage::Phase(frame) | DisplayMessage::Raw(frame) => {
                let Some(spectrum) = tap.process(&frame) else {
                    continue;
                };
                if let (Some((freq, peak)), Some(floor)) = (spectrum.peak(), spectrum.noise_floor()) {
                    info!(
                        peak_hz = freq,
                        peak_db = peak,
                        floor_db = floor,
                        averaged = tap.engine().averaged_spectra(),
                        "Spectrum"
                    );
                }
            }
            DisplayMessage::Monitor(frame) => debug!(points = frame.len(), "Monitor frame"),
            DisplayMessage::BufferStatus { points, megabytes } => {
                debug!(points, megabytes, "Buffer status")
            }
        }
    }
}

fn log_notification(notification: Notification) {
    match notification {
        Notification::Started => info!("Acquisition started"),
        Notification::Stopped { frames, bytes } => info!(frames, bytes, "Acquisition stopped"),
        Notification::Error(e) => warn!("{}", e),
        Notification::Warning(w) => warn!("{}", w),
        Notification::FileOpened(name) => debug!(file = %name, "Writing"),
    }
}

fn main() -> anyhow::Result<()> {
    let args = args::Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(args::convert_filter(args.verbose.log_level_filter()))
        .init();

    let session: AcquisitionSession = args.session();
    session.validate().context("Invalid acquisition parameters")?;
    info!(
        fiber_km = session.fiber_length_km(),
        data_rate_mbps = session.data_rate_mbps(),
        points_per_frame = session.points_per_frame(),
        "Session"
    );

    // Setup the exit handler
    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = stop.clone();
    ctrlc::set_handler(move || {
        println!("\nStopping!");
        stop_handler.store(true, Ordering::Release);
    })
    .context("Error setting Ctrl-C handler")?;

    // Bring up the device
    let mut hw = SimulatedChannel::new();
    hw.open().context("Failed to open device")?;
    configure_device(&mut hw, &session, &DeviceSettings::default())
        .context("Failed to configure device")?;
    hw.start().context("Failed to start device")?;

    let (notify_tx, notify_rx) = bounded(1024);
    let notifier = Notifier::new(notify_tx);

    let mut writer = match &args.save {
        Some(directory) => {
            let mut writer = FrameFileWriter::new(WriterConfig {
                directory: directory.clone(),
                frames_per_file: args.frames_per_file,
                ..Default::default()
            })
            .with_notifier(notifier.clone());
            let file = writer.start(None, session.scan_rate, session.points_per_frame())?;
            info!(file = %file, "Saving frames");
            Some(writer)
        }
        None => None,
    };

    // Display side
    let (display_tx, display_rx) = bounded(16);
    let tap = SpectrumTap::new(
        SpectrumEngine::new(args.window.into(), args.averaging),
        session.spectrum_sample_rate(),
        session.points_per_frame(),
        args.psd,
    )
    .with_mode(args.tap_mode());
    let display_handle = thread::Builder::new()
        .name("display".to_owned())
        .spawn(move || display_consumer(display_rx, tap))?;

    let mut acquisition = AcquisitionLoop::new(hw, PollConfig::default())
        .with_notifier(notifier)
        .with_display(display_tx);
    acquisition.set_storage(writer.as_ref().map(FrameFileWriter::saver));
    acquisition.configure(session)?;
    let started = Instant::now();
    acquisition.start()?;

    let deadline = args.duration.map(Duration::from_secs_f64);
    while !stop.load(Ordering::Acquire) && deadline.map_or(true, |d| started.elapsed() < d) {
        match notify_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(notification) => log_notification(notification),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    // The loop has to let go of the hardware before the device is stopped
    let returned = match acquisition.take_hardware() {
        Some(mut hw) => {
            if let Err(e) = hw.stop().and_then(|_| hw.close()) {
                error!("Failed to shut down device: {}", e);
            }
            true
        }
        None => {
            warn!("Hardware was not returned by the acquisition loop");
            false
        }
    };
    let stats = acquisition.stats();
    if let Some(writer) = writer.as_mut() {
        writer.stop();
        let totals = writer.stats();
        info!(
            files = totals.files_created,
            frames = totals.frames_written,
            dropped = totals.dropped,
            "Saved"
        );
    }
    drop(acquisition);
    // An abandoned loop still holds a display sender, so the display can't be waited on
    if returned {
        if display_handle.join().is_err() {
            error!("Display thread panicked");
        }
    } else {
        warn!("Leaving the display thread behind");
    }
    for notification in notify_rx.try_iter() {
        log_notification(notification);
    }

    let elapsed = started.elapsed().as_secs_f64();
    info!(
        frames = stats.frames,
        bytes = stats.bytes,
        timeouts = stats.timeouts,
        read_errors = stats.read_errors,
        mbps = throughput_mbps(stats.bytes, elapsed),
        "Done"
    );
    Ok(())
}
