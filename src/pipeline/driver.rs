//! Playback driver: the per-tick state machine.
//!
//! Each tick checks whether the worker has finished the requested frame,
//! publishes it, moves the cursor one step in the playback direction and
//! requests the next frame. Ticks that find the worker busy do nothing, so
//! a frame rate above decode throughput simply repeats the visible frame.

use std::sync::Arc;

use super::worker::{DecodeJob, DecompressionWorker, Poll};
use crate::package::{ByteSource, FrameOffsetTable, PackageHeader, PixelFormat};

/// Result of moving the cursor one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Moved to the neighbouring frame.
    Next(usize),
    /// Ran off the end and wrapped to the opposite end.
    Wrapped(usize),
    /// Ran off the end with looping disabled.
    End,
}

/// Current frame index and playback direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackCursor {
    current: usize,
    reversed: bool,
}

impl PlaybackCursor {
    /// Start at frame 0, or at the last frame when reversed.
    pub fn new(frame_count: usize, reversed: bool) -> Self {
        let current = if reversed {
            frame_count.saturating_sub(1)
        } else {
            0
        };
        Self { current, reversed }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Move one frame in the playback direction.
    pub fn advance(&mut self, frame_count: usize, looping: bool) -> Step {
        let next = if self.reversed {
            self.current.checked_sub(1)
        } else {
            self.current.checked_add(1).filter(|&i| i < frame_count)
        };

        match next {
            Some(index) if index < frame_count => {
                self.current = index;
                Step::Next(index)
            }
            _ if looping && frame_count > 0 => {
                self.current = if self.reversed { frame_count - 1 } else { 0 };
                Step::Wrapped(self.current)
            }
            _ => Step::End,
        }
    }
}

/// The frame currently shown to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleFrame {
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub pixels: Vec<u8>,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not playing.
    Inactive,
    /// The requested frame is not decoded yet.
    Pending,
    /// Frame `index` was handled and the next one requested. `stale` means
    /// its decode failed and the previous frame stayed visible.
    Presented { index: usize, stale: bool },
    /// The sequence ended. `presented` is the frame published on this tick.
    Finished { presented: Option<usize> },
}

/// A loaded package and its playback position.
pub struct Session {
    header: PackageHeader,
    table: FrameOffsetTable,
    source: Arc<dyn ByteSource>,
    cursor: PlaybackCursor,
    /// Decode buffer not currently owned by the worker or the visible frame.
    spare: Option<Vec<u8>>,
}

impl Session {
    pub fn new(
        header: PackageHeader,
        table: FrameOffsetTable,
        source: Arc<dyn ByteSource>,
        reversed: bool,
    ) -> Self {
        let cursor = PlaybackCursor::new(header.frame_count(), reversed);
        Self {
            header,
            table,
            source,
            cursor,
            spare: None,
        }
    }

    pub fn header(&self) -> &PackageHeader {
        &self.header
    }

    pub fn table(&self) -> &FrameOffsetTable {
        &self.table
    }

    pub fn cursor(&self) -> &PlaybackCursor {
        &self.cursor
    }

    /// Ask the worker to decode the frame under the cursor.
    ///
    /// Returns false if the package has no frames.
    pub fn request_current(&mut self, worker: &DecompressionWorker) -> bool {
        let index = self.cursor.current();
        let Some(range) = self.table.range(index) else {
            return false;
        };

        let frame_size = self.header.frame_size;
        let buffer = self
            .spare
            .take()
            .filter(|b| b.len() == frame_size)
            .unwrap_or_else(|| vec![0u8; frame_size]);

        worker.request(DecodeJob {
            index,
            source: Arc::clone(&self.source),
            range,
            algorithm: self.header.algorithm,
            buffer,
        });
        true
    }

    /// Run one playback tick.
    pub fn tick(
        &mut self,
        worker: &DecompressionWorker,
        visible: &mut Option<VisibleFrame>,
        looping: bool,
    ) -> TickOutcome {
        let frame_count = self.header.frame_count();
        if frame_count == 0 {
            return TickOutcome::Finished { presented: None };
        }

        let frame = match worker.poll() {
            Poll::Busy => return TickOutcome::Pending,
            Poll::Ready(frame) => frame,
            Poll::Empty => {
                log::warn!(
                    "No decode in flight for frame {}, requesting it again",
                    self.cursor.current()
                );
                self.request_current(worker);
                return TickOutcome::Pending;
            }
        };

        let index = frame.index;
        let stale = match frame.result {
            Ok(()) => {
                let previous = visible.replace(VisibleFrame {
                    index,
                    width: self.header.width,
                    height: self.header.height,
                    pixel_format: self.header.pixel_format,
                    pixels: frame.buffer,
                });
                self.spare = previous.map(|f| f.pixels);
                false
            }
            Err(e) => {
                log::warn!("Frame {} failed to decode, keeping previous frame: {}", index, e);
                self.spare = Some(frame.buffer);
                true
            }
        };

        match self.cursor.advance(frame_count, looping) {
            Step::End => TickOutcome::Finished {
                presented: (!stale).then_some(index),
            },
            Step::Next(_) | Step::Wrapped(_) => {
                self.request_current(worker);
                TickOutcome::Presented { index, stale }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{Compression, MemorySource, PackageLayout, encode_package, parse};
    use proptest::prelude::*;

    fn session(frame_count: u8, reversed: bool) -> Session {
        let frames: Vec<Vec<u8>> = (0..frame_count).map(|i| vec![i; 4]).collect();
        let layout = PackageLayout {
            width: 1,
            height: 1,
            pixel_format: PixelFormat::R8G8B8A8,
            compression: Compression::Zlib,
        };
        let bytes = encode_package(layout, frames.iter().map(|f| f.as_slice())).unwrap();
        let (header, table) = parse(&bytes).unwrap();
        Session::new(header, table, Arc::new(MemorySource::new(bytes)), reversed)
    }

    /// Tick until something other than `Pending` happens.
    fn settle(
        session: &mut Session,
        worker: &DecompressionWorker,
        visible: &mut Option<VisibleFrame>,
        looping: bool,
    ) -> TickOutcome {
        loop {
            worker.wait_idle();
            match session.tick(worker, visible, looping) {
                TickOutcome::Pending => continue,
                outcome => return outcome,
            }
        }
    }

    #[test]
    fn test_cursor_forward() {
        let mut cursor = PlaybackCursor::new(3, false);
        assert_eq!(cursor.current(), 0);
        assert_eq!(cursor.advance(3, false), Step::Next(1));
        assert_eq!(cursor.advance(3, false), Step::Next(2));
        assert_eq!(cursor.advance(3, false), Step::End);
    }

    #[test]
    fn test_cursor_reverse_wrap() {
        let mut cursor = PlaybackCursor::new(3, true);
        assert_eq!(cursor.current(), 2);
        assert_eq!(cursor.advance(3, true), Step::Next(1));
        assert_eq!(cursor.advance(3, true), Step::Next(0));
        assert_eq!(cursor.advance(3, true), Step::Wrapped(2));
    }

    #[test]
    fn test_cursor_single_frame_loop() {
        let mut cursor = PlaybackCursor::new(1, false);
        assert_eq!(cursor.advance(1, true), Step::Wrapped(0));
        let mut cursor = PlaybackCursor::new(1, true);
        assert_eq!(cursor.advance(1, true), Step::Wrapped(0));
    }

    #[test]
    fn test_empty_package_finishes_immediately() {
        let worker = DecompressionWorker::spawn().unwrap();
        let mut session = session(0, false);
        let mut visible = None;

        assert!(!session.request_current(&worker));
        assert_eq!(
            session.tick(&worker, &mut visible, true),
            TickOutcome::Finished { presented: None }
        );
        assert!(visible.is_none());
    }

    #[test]
    fn test_tick_publishes_in_order() {
        let worker = DecompressionWorker::spawn().unwrap();
        let mut session = session(3, false);
        let mut visible = None;
        assert!(session.request_current(&worker));

        for i in 0..2 {
            assert_eq!(
                settle(&mut session, &worker, &mut visible, false),
                TickOutcome::Presented {
                    index: i,
                    stale: false
                }
            );
            let frame = visible.as_ref().unwrap();
            assert_eq!(frame.index, i);
            assert_eq!(frame.pixels, vec![i as u8; 4]);
        }
        assert_eq!(
            settle(&mut session, &worker, &mut visible, false),
            TickOutcome::Finished { presented: Some(2) }
        );
        assert!(worker.is_idle());
    }

    #[test]
    fn test_busy_worker_is_pending() {
        let worker = DecompressionWorker::spawn().unwrap();
        let mut session = session(2, false);
        let mut visible = None;
        session.request_current(&worker);

        // Either the decode is still running or it is done; a pending tick
        // must not touch the visible frame.
        if let TickOutcome::Pending = session.tick(&worker, &mut visible, false) {
            assert!(visible.is_none());
        }
    }

    #[test]
    fn test_failed_decode_keeps_previous_frame() {
        let worker = DecompressionWorker::spawn().unwrap();
        let mut session = session(3, false);
        let mut visible = None;
        session.request_current(&worker);
        settle(&mut session, &worker, &mut visible, false);

        // Frame 1 is already in flight; corrupt the tag so frame 2 fails.
        session.header.algorithm = 9;
        worker.wait_idle();
        let outcome = session.tick(&worker, &mut visible, false);
        assert_eq!(
            outcome,
            TickOutcome::Presented {
                index: 1,
                stale: false
            }
        );
        worker.wait_idle();
        assert_eq!(
            session.tick(&worker, &mut visible, false),
            TickOutcome::Finished { presented: None }
        );
        assert_eq!(visible.as_ref().unwrap().index, 1);
    }

    proptest! {
        #[test]
        fn prop_forward_visits_every_frame(count in 1usize..64) {
            let mut cursor = PlaybackCursor::new(count, false);
            let mut seen = vec![cursor.current()];
            while let Step::Next(i) = cursor.advance(count, false) {
                seen.push(i);
            }
            prop_assert_eq!(seen, (0..count).collect::<Vec<_>>());
        }

        #[test]
        fn prop_reverse_visits_every_frame(count in 1usize..64) {
            let mut cursor = PlaybackCursor::new(count, true);
            let mut seen = vec![cursor.current()];
            while let Step::Next(i) = cursor.advance(count, false) {
                seen.push(i);
            }
            prop_assert_eq!(seen, (0..count).rev().collect::<Vec<_>>());
        }

        #[test]
        fn prop_loop_never_ends(count in 1usize..16, reversed: bool, steps in 1usize..200) {
            let mut cursor = PlaybackCursor::new(count, reversed);
            for _ in 0..steps {
                let step = cursor.advance(count, true);
                prop_assert_ne!(step, Step::End);
                prop_assert!(cursor.current() < count);
                if let Step::Wrapped(i) = step {
                    prop_assert_eq!(i, if reversed { count - 1 } else { 0 });
                }
            }
        }
    }
}
