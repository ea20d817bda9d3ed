//! Sequence frame playback - compressed texture packages decoded in the background.
//!
//! A texture package holds a run of equally sized frames, each compressed
//! independently with LZ4 or zlib. The pipeline decodes one frame at a time
//! on a worker thread and advances through the sequence at a fixed rate,
//! optionally looping or playing in reverse.
//!
//! # Architecture
//!
//! The crate is split into three modules:
//!
//! - `package`: Package format (header, offset table), byte sources and writer
//! - `pipeline`: Decoder, worker thread, playback driver and controller
//! - `schema`: Playback configuration
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Instant;
//! use sequence_frame::{FramePipeline, PipelineEvent, PlaybackConfig};
//!
//! let config = PlaybackConfig {
//!     package_path: Some("frames.pkg".into()),
//!     fps: 30.0,
//!     ..Default::default()
//! };
//!
//! let mut pipeline = FramePipeline::new(config).unwrap();
//! let events = pipeline.events();
//! pipeline.play().unwrap();
//!
//! loop {
//!     pipeline.update(Instant::now());
//!     if let Some(frame) = pipeline.visible_frame() {
//!         println!("showing frame {}", frame.index);
//!     }
//!     if events.try_iter().any(|e| e == PipelineEvent::PlayingFinished) {
//!         break;
//!     }
//! }
//! ```

pub mod package;
pub mod pipeline;
pub mod schema;

// Re-export commonly used types
pub use package::{ByteSource, FileSource, MemorySource, PackageHeader, PackageWriter};
pub use pipeline::{FramePipeline, LoadError, PipelineEvent, PlaybackState, VisibleFrame};
pub use schema::PlaybackConfig;
