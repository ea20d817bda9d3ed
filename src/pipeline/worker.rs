//! Background decompression worker.
//!
//! One long-lived thread decodes exactly one frame per request. The status
//! enum, the pending job and the finished frame all live behind a single
//! mutex, and the same condition variable carries both directions of the
//! handoff:
//!
//! ```text
//! Idle --request()--> RequestWork --worker wakes--> Working --done--> Idle
//!   \--shutdown()--> Destroy (worker exits)
//! ```
//!
//! Frame buffers travel with the job and come back with the result, so the
//! worker never touches a buffer the driver is reading.

use std::io;
use std::ops::Range;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::decoder::{DecodeError, decode_frame};
use crate::package::ByteSource;

/// Worker status shared between the tick driver and the worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkStatus {
    /// No work; the worker is waiting.
    Idle,
    /// A decode was requested but not yet picked up.
    RequestWork,
    /// The worker is decoding.
    Working,
    /// The worker has been told to exit.
    Destroy,
}

/// One decode request.
pub struct DecodeJob {
    /// Frame index, reported back with the result.
    pub index: usize,
    pub source: Arc<dyn ByteSource>,
    /// Compressed byte range within the source.
    pub range: Range<usize>,
    /// Compression tag from the package header.
    pub algorithm: i32,
    /// Output buffer, exactly the decoded frame size.
    pub buffer: Vec<u8>,
}

/// A finished decode, successful or not.
#[derive(Debug)]
pub struct DecodedFrame {
    pub index: usize,
    pub buffer: Vec<u8>,
    pub result: Result<(), DecodeError>,
    pub decode_time: Duration,
}

/// Result of polling the worker from the tick side.
#[derive(Debug)]
pub enum Poll {
    /// A request is queued or being decoded.
    Busy,
    /// The last request finished.
    Ready(DecodedFrame),
    /// Idle with nothing to hand over.
    Empty,
}

struct Slot {
    status: WorkStatus,
    job: Option<DecodeJob>,
    done: Option<DecodedFrame>,
}

struct Shared {
    slot: Mutex<Slot>,
    signal: Condvar,
}

/// Handle to the decompression thread. Dropping it shuts the thread down.
pub struct DecompressionWorker {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl DecompressionWorker {
    /// Spawn the worker thread.
    pub fn spawn() -> io::Result<Self> {
        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot {
                status: WorkStatus::Idle,
                job: None,
                done: None,
            }),
            signal: Condvar::new(),
        });

        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("frame-decoder".into())
            .spawn(move || run(&thread_shared))?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    pub fn status(&self) -> WorkStatus {
        self.shared.slot.lock().status
    }

    pub fn is_idle(&self) -> bool {
        self.status() == WorkStatus::Idle
    }

    /// Hand a job to the worker.
    ///
    /// # Panics
    ///
    /// If the worker is not idle. Only one frame may be in flight.
    pub fn request(&self, job: DecodeJob) {
        let mut slot = self.shared.slot.lock();
        assert_eq!(
            slot.status,
            WorkStatus::Idle,
            "decode of frame {} requested while worker is {:?}",
            job.index,
            slot.status
        );
        slot.done = None;
        slot.job = Some(job);
        slot.status = WorkStatus::RequestWork;
        self.shared.signal.notify_all();
    }

    /// Take the finished frame if the worker is idle.
    pub fn poll(&self) -> Poll {
        let mut slot = self.shared.slot.lock();
        match slot.status {
            WorkStatus::Idle => match slot.done.take() {
                Some(frame) => Poll::Ready(frame),
                None => Poll::Empty,
            },
            WorkStatus::Destroy => Poll::Empty,
            WorkStatus::RequestWork | WorkStatus::Working => Poll::Busy,
        }
    }

    /// Block until the worker is idle (or gone). Never interrupts a decode.
    pub fn wait_idle(&self) {
        let mut slot = self.shared.slot.lock();
        while matches!(slot.status, WorkStatus::RequestWork | WorkStatus::Working) {
            self.shared.signal.wait(&mut slot);
        }
    }

    /// Drop any finished frame still parked in the worker.
    pub fn discard(&self) -> Option<DecodedFrame> {
        let mut slot = self.shared.slot.lock();
        if slot.status == WorkStatus::Idle {
            slot.done.take()
        } else {
            None
        }
    }

    /// Wait for the current decode, then tell the worker to exit and join it.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        self.wait_idle();
        {
            let mut slot = self.shared.slot.lock();
            slot.status = WorkStatus::Destroy;
            slot.done = None;
            self.shared.signal.notify_all();
        }

        if handle.join().is_err() {
            log::error!("Decompression thread panicked");
        }
    }
}

impl Drop for DecompressionWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(shared: &Shared) {
    log::debug!("Decompression thread started");

    loop {
        let job = {
            let mut slot = shared.slot.lock();
            while slot.status == WorkStatus::Idle {
                shared.signal.wait(&mut slot);
            }
            if slot.status == WorkStatus::Destroy {
                break;
            }
            slot.status = WorkStatus::Working;
            slot.job.take()
        };

        let done = job.map(decode_job);

        let mut slot = shared.slot.lock();
        slot.done = done;
        if slot.status == WorkStatus::Working {
            slot.status = WorkStatus::Idle;
        }
        shared.signal.notify_all();
    }

    log::debug!("Decompression thread will be destroyed");
}

fn decode_job(job: DecodeJob) -> DecodedFrame {
    let DecodeJob {
        index,
        source,
        range,
        algorithm,
        mut buffer,
    } = job;

    let start = Instant::now();
    let result = match source.bytes() {
        Some(bytes) => match bytes.get(range.clone()) {
            Some(input) => decode_frame(algorithm, input, &mut buffer),
            None => Err(DecodeError::InputOutOfRange {
                start: range.start,
                end: range.end,
                len: bytes.len(),
            }),
        },
        None => Err(DecodeError::SourceUnavailable),
    };
    let decode_time = start.elapsed();
    log::trace!("Decoded frame {} in {:?}", index, decode_time);

    DecodedFrame {
        index,
        buffer,
        result,
        decode_time,
    }
}
