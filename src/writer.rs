//! This module is responsible for getting frames onto disk.
//!
//! The producer only ever does a non-blocking push onto a bounded queue. A
//! single consumer thread owns the open file, writes frames in queue order and
//! rolls over to a new file once the current one holds `frames_per_file`
//! frames. Files are flat little-endian samples with no header; the session
//! metadata lives in the file name.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use chrono::{DateTime, Local, TimeZone};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, error, info, warn};

use crate::{
    error::{AcquisitionError, Result},
    frame::Frame,
    join_timeout,
    monitoring::{Notification, Notifier},
};

/// Where and how frames get written
#[derive(Clone, Debug)]
pub struct WriterConfig {
    pub directory: PathBuf,
    /// Frames per file before rolling over
    pub frames_per_file: usize,
    /// Frames the queue holds before new ones are dropped
    pub queue_capacity: usize,
    /// How long `stop` waits for the consumer thread
    pub join_timeout: Duration,
    /// How long the consumer blocks on an empty queue before checking for shutdown
    pub dequeue_timeout: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("eDAS_DATA"),
            frames_per_file: 10,
            queue_capacity: 200,
            join_timeout: Duration::from_secs(2),
            dequeue_timeout: Duration::from_millis(100),
        }
    }
}

/// Sequence number of the file after `sequence`. Numbering restarts at 1.
fn following(sequence: u32) -> u32 {
    sequence.checked_add(1).unwrap_or(1)
}

/// Build a file name like `00001-eDAS-2000Hz-0162pt-20260126T014051.256.bin`
pub fn file_name<Tz: TimeZone>(
    sequence: u32,
    sample_rate: u32,
    points_per_frame: usize,
    time: &DateTime<Tz>,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{:05}-eDAS-{:04}Hz-{:04}pt-{}.{:03}.bin",
        sequence,
        sample_rate,
        points_per_frame,
        time.format("%Y%m%dT%H%M%S"),
        // Leap seconds report up to 1999
        time.timestamp_subsec_millis().min(999)
    )
}

/// Session metadata carried in every file name
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FileMeta {
    sample_rate: u32,
    points_per_frame: usize,
}

/// The file currently being written and how full it is
#[derive(Debug)]
pub struct RotatingFile {
    writer: BufWriter<File>,
    path: PathBuf,
    sequence: u32,
    frame_count: usize,
    frame_limit: usize,
    bytes: u64,
}

impl RotatingFile {
    fn create(directory: &Path, sequence: u32, meta: FileMeta, frame_limit: usize) -> Result<Self> {
        let name = file_name(sequence, meta.sample_rate, meta.points_per_frame, &Local::now());
        let path = directory.join(name);
        let file = File::create(&path).map_err(|source| AcquisitionError::FileIo {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
            sequence,
            frame_count: 0,
            frame_limit: frame_limit.max(1),
            bytes: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn is_full(&self) -> bool {
        self.frame_count >= self.frame_limit
    }

    fn write_frame(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes).map_err(|source| self.io_error(source))?;
        self.frame_count += 1;
        self.bytes += bytes.len() as u64;
        if self.is_full() {
            // Complete files hit the disk now rather than when the next frame arrives
            self.writer.flush().map_err(|source| self.io_error(source))?;
        }
        Ok(())
    }

    /// Flush and close
    fn finish(mut self) -> Result<()> {
        self.writer.flush().map_err(|source| self.io_error(source))?;
        debug!(
            file = %self.path.display(),
            frames = self.frame_count,
            bytes = self.bytes,
            "Closed file"
        );
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> AcquisitionError {
        AcquisitionError::FileIo {
            path: self.path.clone(),
            source,
        }
    }
}

enum Message {
    Frame(Vec<u8>),
    Shutdown,
}

/// Fixed-capacity FIFO between the producer and the writer thread.
/// Offering never blocks: when full, the new frame is rejected and counted.
#[derive(Clone)]
pub struct BoundedFrameQueue {
    tx: Sender<Message>,
    rx: Receiver<Message>,
    dropped: Arc<AtomicU64>,
}

impl BoundedFrameQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self {
            tx,
            rx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Enqueue without blocking. `false` means the queue was full and the frame is gone.
    pub fn offer(&self, bytes: Vec<u8>) -> bool {
        match self.tx.try_send(Message::Frame(bytes)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.rx.capacity().unwrap_or(0)
    }

    fn reset(&self) {
        while self.rx.try_recv().is_ok() {}
        self.dropped.store(0, Ordering::Relaxed);
    }

    fn wake(&self) {
        // Best effort: a full queue wakes the consumer anyway
        let _ = self.tx.try_send(Message::Shutdown);
    }
}

#[derive(Debug, Default)]
struct Shared {
    running: AtomicBool,
    frames_written: AtomicU64,
    bytes_written: AtomicU64,
    files_created: AtomicU64,
    sequence: AtomicU32,
    frame_count: AtomicUsize,
    current_name: Mutex<String>,
}

impl Shared {
    fn opened(&self, file: &RotatingFile) {
        self.files_created.fetch_add(1, Ordering::Relaxed);
        self.sequence.store(file.sequence, Ordering::Relaxed);
        self.frame_count.store(0, Ordering::Relaxed);
        if let Ok(mut name) = self.current_name.lock() {
            *name = file.name();
        }
    }
}

/// Snapshot of the writer's counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub frames_written: u64,
    pub bytes_written: u64,
    pub dropped: u64,
    pub files_created: u64,
    pub queued: usize,
    pub sequence: u32,
    pub frame_count: usize,
    pub current_file: String,
}

/// Cheap, cloneable producer side of a [`FrameFileWriter`]
#[derive(Clone)]
pub struct FrameSaver {
    queue: BoundedFrameQueue,
    shared: Arc<Shared>,
    notifier: Notifier,
}

impl FrameSaver {
    /// Queue a frame for writing in its canonical on-disk form. Never blocks;
    /// returns `false` if the writer isn't running or the queue is full.
    pub fn save_frame(&self, frame: &Frame) -> bool {
        if !self.shared.running.load(Ordering::Acquire) {
            return false;
        }
        if self.queue.offer(frame.encode_le()) {
            return true;
        }
        let dropped = self.queue.dropped();
        warn!(dropped, "Storage queue full, dropping frame");
        self.notifier.error(AcquisitionError::QueueOverflow { dropped });
        false
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }
}

/// What the consumer thread owns: the open file and what it needs to open the next one
struct Sink {
    directory: PathBuf,
    meta: FileMeta,
    frame_limit: usize,
    file: Option<RotatingFile>,
    next_sequence: u32,
    shared: Arc<Shared>,
    notifier: Notifier,
}

impl Sink {
    fn write(&mut self, bytes: &[u8]) {
        if let Err(e) = self.try_write(bytes) {
            error!("Frame writer error: {}", e);
            self.notifier.error(e);
        }
    }

    fn try_write(&mut self, bytes: &[u8]) -> Result<()> {
        if !matches!(&self.file, Some(f) if !f.is_full()) {
            self.rotate()?;
        }
        if let Some(file) = self.file.as_mut() {
            file.write_frame(bytes)?;
            self.shared.frames_written.fetch_add(1, Ordering::Relaxed);
            self.shared
                .bytes_written
                .fetch_add(bytes.len() as u64, Ordering::Relaxed);
            self.shared
                .frame_count
                .store(file.frame_count(), Ordering::Relaxed);
        }
        Ok(())
    }

    /// Close the current file (if any) and open the next in sequence
    fn rotate(&mut self) -> Result<()> {
        if let Some(old) = self.file.take() {
            old.finish()?;
        }
        let file = RotatingFile::create(&self.directory, self.next_sequence, self.meta, self.frame_limit)?;
        self.next_sequence = following(self.next_sequence);
        self.shared.opened(&file);
        info!(
            file = %file.name(),
            files = self.shared.files_created.load(Ordering::Relaxed),
            total_bytes = self.shared.bytes_written.load(Ordering::Relaxed),
            "Split to new file"
        );
        self.notifier.notify(Notification::FileOpened(file.name()));
        self.file = Some(file);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = file.finish() {
                error!("Failed to close file: {}", e);
                self.notifier.error(e);
            }
        }
    }
}

fn consume(queue: BoundedFrameQueue, mut sink: Sink, dequeue_timeout: Duration) -> Sink {
    while sink.shared.running.load(Ordering::Acquire) {
        match queue.rx.recv_timeout(dequeue_timeout) {
            Ok(Message::Frame(bytes)) => sink.write(&bytes),
            Ok(Message::Shutdown) => break,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    sink
}

/// Asynchronous, ordered, frame-count-split persistence
pub struct FrameFileWriter {
    config: WriterConfig,
    queue: BoundedFrameQueue,
    shared: Arc<Shared>,
    notifier: Notifier,
    consumer: Option<JoinHandle<Sink>>,
    next_sequence: u32,
}

impl FrameFileWriter {
    pub fn new(config: WriterConfig) -> Self {
        Self {
            queue: BoundedFrameQueue::new(config.queue_capacity),
            config,
            shared: Arc::new(Shared::default()),
            notifier: Notifier::default(),
            consumer: None,
            next_sequence: 1,
        }
    }

    /// Report disk errors and overflows on `notifier` as well as in the log
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Open the first file and launch the writer thread.
    ///
    /// Without an explicit `sequence`, numbering continues after the last file written.
    /// Calling this while running returns the current file name and changes nothing.
    pub fn start(&mut self, sequence: Option<u32>, sample_rate: u32, points_per_frame: usize) -> Result<String> {
        if self.is_running() {
            return Ok(self.current_file());
        }
        let directory = self.config.directory.clone();
        fs::create_dir_all(&directory).map_err(|source| AcquisitionError::FileIo {
            path: directory.clone(),
            source,
        })?;

        let sequence = sequence.unwrap_or(self.next_sequence);
        let meta = FileMeta {
            sample_rate,
            points_per_frame,
        };
        self.shared.frames_written.store(0, Ordering::Relaxed);
        self.shared.bytes_written.store(0, Ordering::Relaxed);
        self.shared.files_created.store(0, Ordering::Relaxed);
        let file = RotatingFile::create(&directory, sequence, meta, self.config.frames_per_file)?;
        self.shared.opened(&file);
        let name = file.name();
        info!(file = %file.path().display(), "Started frame-based saving");
        self.notifier.notify(Notification::FileOpened(name.clone()));

        // Leftovers from an earlier run must not end up in this one
        self.queue.reset();
        self.shared.running.store(true, Ordering::Release);

        let sink = Sink {
            directory,
            meta,
            frame_limit: self.config.frames_per_file,
            file: Some(file),
            next_sequence: following(sequence),
            shared: self.shared.clone(),
            notifier: self.notifier.clone(),
        };
        let queue = self.queue.clone();
        let dequeue_timeout = self.config.dequeue_timeout;
        let spawned = thread::Builder::new()
            .name("frame-writer".to_owned())
            .spawn(move || consume(queue, sink, dequeue_timeout));
        match spawned {
            Ok(handle) => self.consumer = Some(handle),
            Err(source) => {
                self.shared.running.store(false, Ordering::Release);
                return Err(AcquisitionError::Spawn {
                    name: "frame-writer",
                    source,
                });
            }
        }
        Ok(name)
    }

    /// Producer handle for another thread
    pub fn saver(&self) -> FrameSaver {
        FrameSaver {
            queue: self.queue.clone(),
            shared: self.shared.clone(),
            notifier: self.notifier.clone(),
        }
    }

    /// See [`FrameSaver::save_frame`]
    pub fn save_frame(&self, frame: &Frame) -> bool {
        self.saver().save_frame(frame)
    }

    /// Stop the writer thread, write whatever is still queued and close the file.
    /// Calling it again does nothing.
    pub fn stop(&mut self) {
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.queue.wake();
        let Some(handle) = self.consumer.take() else {
            return;
        };
        let mut sink = match join_timeout(handle, self.config.join_timeout) {
            Some(Ok(sink)) => sink,
            Some(Err(_)) => {
                error!("Frame writer thread panicked");
                self.notifier
                    .notify(Notification::Warning("frame writer thread panicked".to_owned()));
                return;
            }
            None => {
                warn!(
                    timeout = ?self.config.join_timeout,
                    queued = self.queue.len(),
                    "Frame writer did not exit in time, abandoning it"
                );
                self.notifier.notify(Notification::Warning(
                    "frame writer did not exit in time".to_owned(),
                ));
                return;
            }
        };

        // The consumer is gone, so draining here keeps the order
        let mut drained = 0usize;
        while let Ok(message) = self.queue.rx.try_recv() {
            if let Message::Frame(bytes) = message {
                sink.write(&bytes);
                drained += 1;
            }
        }
        sink.close();
        self.next_sequence = sink.next_sequence;

        let stats = self.stats();
        info!(
            drained,
            files = stats.files_created,
            frames = stats.frames_written,
            bytes = stats.bytes_written,
            dropped = stats.dropped,
            "Stopped saving"
        );
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn current_file(&self) -> String {
        self.shared
            .current_name
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> WriterStats {
        WriterStats {
            frames_written: self.shared.frames_written.load(Ordering::Relaxed),
            bytes_written: self.shared.bytes_written.load(Ordering::Relaxed),
            dropped: self.queue.dropped(),
            files_created: self.shared.files_created.load(Ordering::Relaxed),
            queued: self.queue.len(),
            sequence: self.shared.sequence.load(Ordering::Relaxed),
            frame_count: self.shared.frame_count.load(Ordering::Relaxed),
            current_file: self.current_file(),
        }
    }
}

impl Drop for FrameFileWriter {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::time::Instant;

    fn config(dir: &Path, frames_per_file: usize) -> WriterConfig {
        WriterConfig {
            directory: dir.to_path_buf(),
            frames_per_file,
            queue_capacity: 64,
            join_timeout: Duration::from_secs(2),
            dequeue_timeout: Duration::from_millis(10),
        }
    }

    fn files_in(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        files.sort();
        files
    }

    fn phase_frame(seed: i32, len: usize) -> Frame {
        Frame::phase((0..len as i32).map(|i| seed * 1000 + i).collect(), 1)
    }

    #[test]
    fn file_name_format() {
        let time = Local
            .from_local_datetime(
                &NaiveDate::from_ymd_opt(2026, 1, 26)
                    .unwrap()
                    .and_hms_milli_opt(1, 40, 51, 256)
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(
            file_name(1, 1000, 162, &time),
            "00001-eDAS-1000Hz-0162pt-20260126T014051.256.bin"
        );
        assert_eq!(
            file_name(123456, 20000, 65536, &time),
            "123456-eDAS-20000Hz-65536pt-20260126T014051.256.bin"
        );
    }

    #[test]
    fn three_frames_two_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = FrameFileWriter::new(config(dir.path(), 2));
        let first = writer.start(Some(1), 2000, 162).unwrap();
        assert!(first.starts_with("00001-eDAS-2000Hz-0162pt-"));
        for i in 0..3 {
            assert!(writer.save_frame(&phase_frame(i, 162)));
        }
        writer.stop();

        let files = files_in(dir.path());
        assert_eq!(files.len(), 2);
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names[0].starts_with("00001-eDAS-2000Hz-0162pt-") && names[0].ends_with(".bin"));
        assert!(names[1].starts_with("00002-eDAS-2000Hz-0162pt-") && names[1].ends_with(".bin"));
        assert_eq!(fs::metadata(&files[0]).unwrap().len(), 2 * 162 * 4);
        assert_eq!(fs::metadata(&files[1]).unwrap().len(), 162 * 4);
        let stats = writer.stats();
        assert_eq!(stats.frames_written, 3);
        assert_eq!(stats.files_created, 2);
        assert_eq!(stats.dropped, 0);
    }

    #[test]
    fn split_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = FrameFileWriter::new(config(dir.path(), 3));
        writer.start(Some(7), 1000, 16).unwrap();
        let frames: Vec<Frame> = (0..7).map(|i| phase_frame(i, 16)).collect();
        for frame in &frames {
            assert!(writer.save_frame(frame));
        }
        writer.stop();

        let files = files_in(dir.path());
        assert_eq!(files.len(), 3);
        for (file, chunk) in files.iter().zip(frames.chunks(3)) {
            let expected: Vec<u8> = chunk.iter().flat_map(|f| f.encode_le()).collect();
            assert_eq!(fs::read(file).unwrap(), expected);
        }
        assert!(files[2]
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("00009-"));
    }

    #[test]
    fn raw_frames_stay_int16() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = FrameFileWriter::new(config(dir.path(), 10));
        writer.start(None, 2000, 4).unwrap();
        writer.save_frame(&Frame::raw(vec![1, -1, 300, -300], 1));
        writer.stop();
        let files = files_in(dir.path());
        assert_eq!(
            fs::read(&files[0]).unwrap(),
            vec![1, 0, 0xff, 0xff, 0x2c, 0x01, 0xd4, 0xfe]
        );
    }

    #[test]
    fn start_is_idempotent_and_stop_twice_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = FrameFileWriter::new(config(dir.path(), 10));
        let a = writer.start(Some(1), 2000, 100).unwrap();
        let b = writer.start(Some(5), 1000, 50).unwrap();
        assert_eq!(a, b);
        writer.stop();
        writer.stop();
        assert!(!writer.is_running());
        assert_eq!(files_in(dir.path()).len(), 1);
        assert!(!writer.save_frame(&phase_frame(0, 4)));
    }

    #[test]
    fn sequence_continues_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = FrameFileWriter::new(config(dir.path(), 1));
        writer.start(Some(3), 2000, 4).unwrap();
        writer.save_frame(&phase_frame(0, 4));
        writer.save_frame(&phase_frame(1, 4));
        writer.stop();
        let name = writer.start(None, 2000, 4).unwrap();
        assert!(name.starts_with("00005-"), "{}", name);
        writer.stop();
    }

    #[test]
    fn creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let mut writer = FrameFileWriter::new(config(&nested, 10));
        writer.start(Some(1), 2000, 4).unwrap();
        writer.stop();
        assert_eq!(files_in(&nested).len(), 1);
    }

    #[test]
    fn sequence_restarts_after_the_last_number() {
        assert_eq!(following(1), 2);
        assert_eq!(following(u32::MAX), 1);

        let dir = tempfile::tempdir().unwrap();
        let mut writer = FrameFileWriter::new(config(dir.path(), 1));
        writer.start(Some(u32::MAX), 2000, 4).unwrap();
        writer.save_frame(&phase_frame(0, 4));
        writer.save_frame(&phase_frame(1, 4));
        writer.stop();
        let names: Vec<String> = files_in(dir.path())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names[0].starts_with("00001-"), "{:?}", names);
        assert!(names[1].starts_with("4294967295-"), "{:?}", names);
        let name = writer.start(None, 2000, 4).unwrap();
        assert!(name.starts_with("00002-"), "{}", name);
        writer.stop();
    }

    #[test]
    fn disk_errors_are_reported_and_writing_recovers() {
        let (tx, rx) = bounded(64);
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("out");
        let mut writer = FrameFileWriter::new(config(&dir, 1)).with_notifier(Notifier::new(tx));
        writer.start(Some(1), 2000, 4).unwrap();
        let wait_for = |what: &str, cond: &dyn Fn() -> bool| {
            let deadline = Instant::now() + Duration::from_secs(5);
            while !cond() {
                assert!(Instant::now() < deadline, "timed out waiting for {}", what);
                thread::sleep(Duration::from_millis(1));
            }
        };

        assert!(writer.save_frame(&phase_frame(0, 4)));
        wait_for("the first frame", &|| writer.stats().frames_written == 1);

        // The next file can't be opened while the directory is gone
        fs::remove_dir_all(&dir).unwrap();
        assert!(writer.save_frame(&phase_frame(1, 4)));
        wait_for("a file error", &|| {
            rx.try_iter()
                .any(|n| matches!(n, Notification::Error(AcquisitionError::FileIo { .. })))
        });
        assert!(writer.is_running());
        assert_eq!(writer.stats().frames_written, 1);

        fs::create_dir_all(&dir).unwrap();
        assert!(writer.save_frame(&phase_frame(2, 4)));
        writer.stop();

        let files = files_in(&dir);
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("00002-"), "{}", name);
        assert_eq!(fs::read(&files[0]).unwrap(), phase_frame(2, 4).encode_le());
        assert_eq!(writer.stats().frames_written, 2);
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let queue = BoundedFrameQueue::new(4);
        let start = Instant::now();
        let accepted = (0..10).filter(|i| queue.offer(vec![*i as u8])).count();
        assert!(start.elapsed() < Duration::from_millis(500));
        assert_eq!(accepted, 4);
        assert_eq!(queue.dropped(), 6);
        assert_eq!(queue.len(), 4);
        assert_eq!(queue.capacity(), 4);
    }

    #[test]
    fn saver_reports_overflow() {
        let (tx, rx) = bounded(16);
        let saver = FrameSaver {
            queue: BoundedFrameQueue::new(1),
            shared: Arc::new(Shared::default()),
            notifier: Notifier::new(tx),
        };
        saver.shared.running.store(true, Ordering::Release);
        assert!(saver.save_frame(&phase_frame(0, 4)));
        assert!(!saver.save_frame(&phase_frame(1, 4)));
        assert!(matches!(
            rx.try_recv(),
            Ok(Notification::Error(AcquisitionError::QueueOverflow { dropped: 1 }))
        ));
    }
}
