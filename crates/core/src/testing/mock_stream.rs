//! Mock raw stream spawner for testing remote ingest.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::frame::Resolution;
use crate::streaming::{RawStream, RawStreamSpawner, StreamHandle};

#[derive(Default)]
struct Signal {
    terminated: Mutex<bool>,
    wake: Condvar,
}

impl Signal {
    fn is_terminated(&self) -> bool {
        *self.terminated.lock()
    }

    fn wait(&self) {
        let mut terminated = self.terminated.lock();
        while !*terminated {
            self.wake.wait(&mut terminated);
        }
    }

    /// Returns whether this call did the termination.
    fn terminate(&self) -> bool {
        let mut terminated = self.terminated.lock();
        if *terminated {
            return false;
        }
        *terminated = true;
        self.wake.notify_all();
        true
    }
}

struct ScriptedReader {
    data: Cursor<Vec<u8>>,
    stay_open: bool,
    signal: Arc<Signal>,
}

impl Read for ScriptedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.signal.is_terminated() {
            return Ok(0);
        }
        let n = self.data.read(buf)?;
        if n > 0 || !self.stay_open {
            return Ok(n);
        }
        // A live stream with nothing more to say: wait to be killed.
        self.signal.wait();
        Ok(0)
    }
}

struct ScriptedHandle {
    signal: Arc<Signal>,
    terminated: Arc<AtomicUsize>,
}

impl StreamHandle for ScriptedHandle {
    fn terminate(&mut self) {
        if self.signal.terminate() {
            self.terminated.fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct Script {
    data: Vec<u8>,
    stay_open: bool,
}

/// Mock implementation of the RawStreamSpawner trait.
///
/// Each spawn consumes the next scripted stream: a number of solid-colour
/// raw frames, after which the stream either ends or stays open until
/// terminated, like a live source would.
#[derive(Default)]
pub struct MockStreamSpawner {
    scripts: Mutex<VecDeque<Script>>,
    spawned: Mutex<Vec<Vec<String>>>,
    terminated: Arc<AtomicUsize>,
}

impl MockStreamSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, resolution: Resolution, rgb: [u8; 3], frames: usize, stay_open: bool) {
        let frame: Vec<u8> = rgb
            .iter()
            .copied()
            .cycle()
            .take(resolution.rgb_frame_size())
            .collect();
        self.scripts.lock().push_back(Script {
            data: frame.repeat(frames),
            stay_open,
        });
    }

    /// A stream of `frames` frames followed by end of stream.
    pub fn push_finite_stream(&self, resolution: Resolution, rgb: [u8; 3], frames: usize) {
        self.push(resolution, rgb, frames, false);
    }

    /// A stream of `frames` frames that then stays open until terminated.
    pub fn push_open_stream(&self, resolution: Resolution, rgb: [u8; 3], frames: usize) {
        self.push(resolution, rgb, frames, true);
    }

    /// Argument vectors of every spawn so far.
    pub fn spawned(&self) -> Vec<Vec<String>> {
        self.spawned.lock().clone()
    }

    /// Number of streams terminated so far.
    pub fn terminated(&self) -> usize {
        self.terminated.load(Ordering::SeqCst)
    }
}

impl RawStreamSpawner for MockStreamSpawner {
    fn spawn(&self, args: &[String]) -> std::io::Result<RawStream> {
        self.spawned.lock().push(args.to_vec());
        let script = self
            .scripts
            .lock()
            .pop_front()
            .ok_or_else(|| std::io::Error::other("no scripted stream left"))?;
        let signal = Arc::new(Signal::default());
        Ok(RawStream {
            reader: Box::new(ScriptedReader {
                data: Cursor::new(script.data),
                stay_open: script.stay_open,
                signal: Arc::clone(&signal),
            }),
            handle: Box::new(ScriptedHandle {
                signal,
                terminated: Arc::clone(&self.terminated),
            }),
        })
    }
}
