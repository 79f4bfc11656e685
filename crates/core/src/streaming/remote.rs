//! Live ingest from a remote (or local) media URL via ffmpeg's raw output.
//!
//! One background thread per source does the blocking reads. A seek kills
//! the running process and starts a new one under the slot lock; every frame
//! carries the generation of the process it came from, and frames of an older
//! generation are never handed out after the swap.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::transport::FrameSource;
use super::types::StreamError;
use crate::frame::{Frame, Resolution};
use crate::tools::{FfmpegArgs, RawFrameReader, ToolError};

const CHANNEL_FRAMES: usize = 4;

/// What to read and how.
#[derive(Debug, Clone)]
pub struct RemoteStreamOptions {
    pub url: String,
    pub resolution: Resolution,
    pub fps: f64,
    pub start_secs: f64,
    pub user_agent: Option<String>,
}

/// Lets the owner stop a spawned stream.
pub trait StreamHandle: Send {
    fn terminate(&mut self);
}

/// A running producer of raw frames.
pub struct RawStream {
    pub reader: Box<dyn Read + Send>,
    pub handle: Box<dyn StreamHandle>,
}

/// Starts raw frame producers from an argument vector.
pub trait RawStreamSpawner: Send + Sync {
    fn spawn(&self, args: &[String]) -> std::io::Result<RawStream>;
}

/// Spawns ffmpeg as a child process.
pub struct ProcessSpawner {
    program: PathBuf,
}

impl ProcessSpawner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

struct ChildHandle(Child);

impl StreamHandle for ChildHandle {
    fn terminate(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

impl Drop for ChildHandle {
    fn drop(&mut self) {
        self.terminate();
    }
}

impl RawStreamSpawner for ProcessSpawner {
    fn spawn(&self, args: &[String]) -> std::io::Result<RawStream> {
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("ffmpeg stdout not captured"))?;
        Ok(RawStream {
            reader: Box::new(stdout),
            handle: Box::new(ChildHandle(child)),
        })
    }
}

/// A frame read from a remote stream.
#[derive(Debug, Clone)]
pub struct RemoteFrame {
    pub generation: u64,
    /// Position in the source, counting from frame 0 at time 0.
    pub index: u64,
    pub frame: Frame,
}

struct Slot {
    generation: u64,
    pending: Option<Box<dyn Read + Send>>,
    handle: Option<Box<dyn StreamHandle>>,
    start_index: u64,
    stopped: bool,
}

/// Seek and stop control shared between the session and the reader thread.
pub struct RemoteControl {
    options: RemoteStreamOptions,
    args: FfmpegArgs,
    spawner: Arc<dyn RawStreamSpawner>,
    slot: Mutex<Slot>,
    generation: AtomicU64,
}

fn start_index(position_secs: f64, fps: f64) -> u64 {
    (position_secs.max(0.0) * fps).floor() as u64
}

impl RemoteControl {
    fn spawn_at(&self, start_secs: f64) -> std::io::Result<RawStream> {
        let args = self.args.stream_raw_video(
            &self.options.url,
            self.options.resolution,
            start_secs,
            self.options.user_agent.as_deref(),
        );
        self.spawner.spawn(&args)
    }

    pub fn options(&self) -> &RemoteStreamOptions {
        &self.options
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Restarts the stream at `position_secs` and returns the new start frame.
    pub fn seek(&self, position_secs: f64) -> Result<u64, StreamError> {
        let position = position_secs.max(0.0);
        let mut slot = self.slot.lock();
        if slot.stopped {
            return Err(StreamError::Closed);
        }
        if let Some(mut handle) = slot.handle.take() {
            handle.terminate();
        }
        slot.pending = None;
        slot.generation += 1;
        self.generation.store(slot.generation, Ordering::Release);
        slot.start_index = start_index(position, self.options.fps);

        let stream = self
            .spawn_at(position)
            .map_err(|e| StreamError::Tool(ToolError::Io(e)))?;
        slot.pending = Some(stream.reader);
        slot.handle = Some(stream.handle);

        info!(
            url = %self.options.url,
            position,
            start_index = slot.start_index,
            generation = slot.generation,
            "Remote stream restarted"
        );
        Ok(slot.start_index)
    }

    /// Terminates the stream for good.
    pub fn stop(&self) {
        let mut slot = self.slot.lock();
        if slot.stopped {
            return;
        }
        slot.stopped = true;
        slot.pending = None;
        if let Some(mut handle) = slot.handle.take() {
            handle.terminate();
        }
        slot.generation += 1;
        self.generation.store(slot.generation, Ordering::Release);
        debug!(url = %self.options.url, "Remote stream stopped");
    }
}

/// Reads frames for `generation` until the stream ends or a seek swaps in a new reader.
fn read_loop(
    control: Arc<RemoteControl>,
    tx: mpsc::Sender<RemoteFrame>,
    reader: Box<dyn Read + Send>,
    mut generation: u64,
    mut index: u64,
) {
    let resolution = control.options.resolution;
    let frame_interval = if control.options.fps > 0.0 {
        1.0 / control.options.fps
    } else {
        0.0
    };
    let mut frames = RawFrameReader::new(reader, resolution);
    let mut epoch = Instant::now();
    let mut paced = 0u64;

    loop {
        let result = frames.read_frame();

        {
            let mut slot = control.slot.lock();
            if slot.stopped {
                return;
            }
            if slot.generation != generation {
                let Some(reader) = slot.pending.take() else {
                    return;
                };
                generation = slot.generation;
                index = slot.start_index;
                frames = RawFrameReader::new(reader, resolution);
                epoch = Instant::now();
                paced = 0;
                continue;
            }
        }

        match result {
            Ok(Some(frame)) => {
                let due = epoch + Duration::from_secs_f64(paced as f64 * frame_interval);
                let now = Instant::now();
                if due > now {
                    thread::sleep(due - now);
                }
                paced += 1;
                let item = RemoteFrame {
                    generation,
                    index,
                    frame,
                };
                if tx.blocking_send(item).is_err() {
                    return;
                }
                index += 1;
            }
            Ok(None) => {
                debug!(generation, "Remote stream ended");
                return;
            }
            Err(e) => {
                warn!(generation, error = %e, "Remote stream read failed");
                return;
            }
        }
    }
}

/// Frame source backed by a raw ffmpeg stream.
pub struct RemoteSource {
    control: Arc<RemoteControl>,
    rx: mpsc::Receiver<RemoteFrame>,
}

impl RemoteSource {
    /// Spawns the first process and the reader thread.
    pub fn start(
        options: RemoteStreamOptions,
        args: FfmpegArgs,
        spawner: Arc<dyn RawStreamSpawner>,
    ) -> Result<(Self, Arc<RemoteControl>), StreamError> {
        let first_index = start_index(options.start_secs, options.fps);
        let control = Arc::new(RemoteControl {
            options,
            args,
            spawner,
            slot: Mutex::new(Slot {
                generation: 0,
                pending: None,
                handle: None,
                start_index: first_index,
                stopped: false,
            }),
            generation: AtomicU64::new(0),
        });

        let stream = control
            .spawn_at(control.options.start_secs)
            .map_err(|e| StreamError::Tool(ToolError::Io(e)))?;
        control.slot.lock().handle = Some(stream.handle);

        let (tx, rx) = mpsc::channel(CHANNEL_FRAMES);
        let thread_control = Arc::clone(&control);
        let reader = stream.reader;
        thread::Builder::new()
            .name("remote-ingest".to_string())
            .spawn(move || read_loop(thread_control, tx, reader, 0, first_index))
            .map_err(|e| StreamError::Tool(ToolError::Io(e)))?;

        info!(url = %control.options.url, resolution = %control.options.resolution, fps = control.options.fps, "Remote stream started");
        Ok((Self { control: Arc::clone(&control), rx }, control))
    }

    /// Next frame of the current generation.
    pub async fn next_remote_frame(&mut self) -> Option<RemoteFrame> {
        loop {
            let item = self.rx.recv().await?;
            if item.generation == self.control.generation() {
                return Some(item);
            }
            debug!(generation = item.generation, "Discarding frame from replaced stream");
        }
    }
}

#[async_trait]
impl FrameSource for RemoteSource {
    async fn next_frame(&mut self) -> Result<Option<Frame>, StreamError> {
        Ok(self.next_remote_frame().await.map(|item| item.frame))
    }
}

impl Drop for RemoteSource {
    fn drop(&mut self) {
        self.control.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputConfig;
    use crate::testing::MockStreamSpawner;

    fn options(fps: f64) -> RemoteStreamOptions {
        RemoteStreamOptions {
            url: "https://cdn.example.com/live.m3u8".to_string(),
            resolution: Resolution::new(4, 4),
            fps,
            start_secs: 0.0,
            user_agent: None,
        }
    }

    fn args() -> FfmpegArgs {
        FfmpegArgs::new("error", OutputConfig::default())
    }

    #[tokio::test]
    async fn test_reads_until_end_of_stream() {
        let spawner = Arc::new(MockStreamSpawner::new());
        spawner.push_finite_stream(Resolution::new(4, 4), [1, 2, 3], 3);

        let (mut source, _control) =
            RemoteSource::start(options(200.0), args(), spawner.clone()).unwrap();

        let mut indices = Vec::new();
        while let Some(item) = source.next_remote_frame().await {
            assert_eq!(item.frame.first_pixel(), Some([1, 2, 3]));
            indices.push(item.index);
        }
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(spawner.spawned().len(), 1);
    }

    #[tokio::test]
    async fn test_seek_swaps_stream() {
        let spawner = Arc::new(MockStreamSpawner::new());
        spawner.push_open_stream(Resolution::new(4, 4), [10, 10, 10], 2);
        spawner.push_open_stream(Resolution::new(4, 4), [20, 20, 20], 2);

        let (mut source, control) =
            RemoteSource::start(options(100.0), args(), spawner.clone()).unwrap();

        let first = source.next_remote_frame().await.unwrap();
        assert_eq!(first.frame.first_pixel(), Some([10, 10, 10]));

        let start = control.seek(2.5).unwrap();
        assert_eq!(start, 250);
        assert_eq!(spawner.terminated(), 1);

        let spawned = spawner.spawned();
        assert_eq!(spawned.len(), 2);
        assert!(spawned[1].windows(2).any(|w| w[0] == "-ss" && w[1] == "2.500"));

        let next = source.next_remote_frame().await.unwrap();
        assert_eq!(next.frame.first_pixel(), Some([20, 20, 20]));
        assert_eq!(next.index, 250);
        assert_eq!(next.generation, 1);
    }
}
