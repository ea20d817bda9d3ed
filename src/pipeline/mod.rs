//! Frame pipeline: background decode and timed playback of texture packages.
//!
//! # Architecture
//!
//! - `decoder`: Dispatches a compressed frame to the LZ4 or zlib codec
//! - `worker`: Single background thread decoding one frame per request
//! - `timer`: Fixed-interval tick schedule
//! - `driver`: Per-tick state machine (publish, advance, request next)
//! - `controller`: [`FramePipeline`], the host-facing Load/Play/Pause/Stop API
//!
//! At most one decode is in flight. A tick that finds the worker busy does
//! nothing, so the visible frame simply repeats until the next one is ready.

mod controller;
mod decoder;
mod driver;
mod timer;
mod worker;

pub use controller::{FramePipeline, LoadError, PipelineEvent, PlaybackState};
pub use decoder::{DecodeError, decode_frame};
pub use driver::{PlaybackCursor, Session, Step, TickOutcome, VisibleFrame};
pub use timer::FrameTimer;
pub use worker::{DecodeJob, DecodedFrame, DecompressionWorker, Poll, WorkStatus};
