// src/common/sync.rs

//! Frame synchronization over an unframed byte stream.
//!
//! The controller chatters continuously and frames carry no reliable
//! delimiter, so the synchronizer keeps a rolling window of the most recent
//! bytes and, after every byte, asks each registered layout whether the tail
//! of the window carries its signature. Bytes that never become part of a
//! matched frame simply fall out of the window.

use super::{
    error::BusError,
    frame::RawFrame,
    hal_traits::{BusTimer, Rs485Serial},
    layout::FrameLayout,
    timing,
};
use heapless::Vec;
use log::{debug, trace};

/// Capacity of the rolling window. Comfortably above the largest frame plus
/// the widest signature span.
pub const SYNC_WINDOW_LEN: usize = 64;

/// Rolling-window signature matcher.
///
/// A signature match only makes a candidate. The caller validates it and
/// then either [`accept`](Self::accept)s it, consuming the matched bytes, or
/// [`reject`](Self::reject)s it, which drops only the candidate's first byte
/// so a real frame overlapping a false match can still line up.
#[derive(Debug)]
pub struct FrameSynchronizer<'a> {
    layouts: &'a [&'static FrameLayout],
    window: Vec<u8, SYNC_WINDOW_LEN>,
    dropped: usize,
    /// Window index where the last returned candidate starts.
    candidate_start: Option<usize>,
}

impl<'a> FrameSynchronizer<'a> {
    /// Creates a synchronizer matching any of `layouts`, earliest entry first.
    pub fn new(layouts: &'a [&'static FrameLayout]) -> Self {
        FrameSynchronizer {
            layouts,
            window: Vec::new(),
            dropped: 0,
            candidate_start: None,
        }
    }

    /// Feeds one byte. Returns a candidate frame when the window's tail
    /// matches a layout. The window is left intact until the candidate is
    /// accepted or rejected.
    pub fn push<I: Copy>(&mut self, byte: u8, now: I) -> Option<RawFrame<I>> {
        self.candidate_start = None;
        if self.window.is_full() {
            self.window.remove(0);
            self.dropped += 1;
        }
        // Cannot fail: a slot was freed above if needed.
        let _ = self.window.push(byte);

        let layout = self
            .layouts
            .iter()
            .copied()
            .find(|layout| layout.matches_tail(&self.window))?;

        let start = self.window.len() - layout.frame_len;
        let frame = RawFrame::new(&self.window[start..], layout, now)?;
        trace!("{} candidate at window offset {}", layout.name, start);
        self.candidate_start = Some(start);
        Some(frame)
    }

    /// Consumes the last candidate: it and everything before it leave the
    /// window so its bytes are never matched again.
    pub fn accept(&mut self) {
        if let Some(start) = self.candidate_start.take() {
            debug!("Synchronized after {} skipped bytes", self.dropped + start);
            self.window.clear();
            self.dropped = 0;
        }
    }

    /// Discards the last candidate's first byte, keeping the rest of the
    /// window for later alignments.
    pub fn reject(&mut self) {
        if let Some(start) = self.candidate_start.take() {
            let skip = start + 1;
            let keep = self.window.len() - skip;
            self.window.rotate_left(skip);
            self.window.truncate(keep);
            self.dropped += skip;
        }
    }

    /// Discards buffered bytes.
    pub fn reset(&mut self) {
        self.window.clear();
        self.dropped = 0;
        self.candidate_start = None;
    }

    /// Bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.window.len()
    }

    /// Reads from `interface` until a candidate matches or `deadline`
    /// passes. The caller must [`accept`](Self::accept) or
    /// [`reject`](Self::reject) the returned frame.
    ///
    /// The deadline is checked after every byte as well as while the line
    /// is idle, so a stream that never stops but never matches still times
    /// out.
    pub fn synchronize<IF>(
        &mut self,
        interface: &mut IF,
        deadline: IF::Instant,
    ) -> Result<RawFrame<IF::Instant>, BusError<IF::Error>>
    where
        IF: Rs485Serial + BusTimer,
    {
        loop {
            match interface.read_byte() {
                Ok(byte) => {
                    trace!("rx {:#04x}", byte);
                    if let Some(frame) = self.push(byte, interface.now()) {
                        return Ok(frame);
                    }
                    if interface.now() >= deadline {
                        return Err(BusError::SyncTimeout);
                    }
                }
                Err(nb::Error::WouldBlock) => {
                    if interface.now() >= deadline {
                        return Err(BusError::SyncTimeout);
                    }
                    interface.delay_us(timing::IO_RETRY_DELAY_US);
                }
                Err(nb::Error::Other(e)) => return Err(BusError::Io(e)),
            }
        }
    }
}
