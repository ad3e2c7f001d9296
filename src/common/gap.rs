// src/common/gap.rs

//! Inter-frame gap detection in the controller's broadcast stream.
//!
//! The controller talks unprompted on the shared pair, so a write can only
//! go out right after one of its broadcast lines ends. The scanner follows
//! the line structure described by [`BroadcastFraming`] byte by byte and
//! reports [`GapState::Gap`] once the announced payload has been consumed.

use super::layout::BroadcastFraming;
use log::trace;

/// Position of the scanner within a broadcast line.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GapState {
    /// Looking for the line prefix; `matched` prefix bytes seen so far.
    AwaitPrefix { matched: usize },
    /// Prefix seen; skipping fixed header bytes.
    SkipHeader { remaining: usize },
    /// Next byte announces the payload length.
    AwaitLength,
    /// Skipping payload and trailer bytes.
    SkipPayload { remaining: usize },
    /// Line fully consumed; the bus is quiet.
    Gap,
}

#[derive(Debug, Clone)]
pub struct GapScanner {
    framing: BroadcastFraming,
    state: GapState,
}

impl GapScanner {
    pub fn new(framing: BroadcastFraming) -> Self {
        let mut scanner = GapScanner {
            framing,
            state: GapState::AwaitPrefix { matched: 0 },
        };
        scanner.state = scanner.after_prefix_progress(0);
        scanner
    }

    pub fn state(&self) -> GapState {
        self.state
    }

    /// Starts over, waiting for the next line prefix.
    pub fn reset(&mut self) {
        self.state = self.after_prefix_progress(0);
    }

    /// Advances on one received byte and returns the new state.
    ///
    /// Once [`GapState::Gap`] is reached further bytes are ignored until
    /// [`reset`](Self::reset).
    pub fn feed(&mut self, byte: u8) -> GapState {
        let next = match self.state {
            GapState::AwaitPrefix { matched } => {
                if self.framing.prefix.get(matched) == Some(&byte) {
                    self.after_prefix_progress(matched + 1)
                } else if self.framing.prefix.first() == Some(&byte) {
                    self.after_prefix_progress(1)
                } else {
                    GapState::AwaitPrefix { matched: 0 }
                }
            }
            GapState::SkipHeader { remaining } => match remaining {
                0 | 1 => GapState::AwaitLength,
                n => GapState::SkipHeader { remaining: n - 1 },
            },
            GapState::AwaitLength => {
                let remaining = usize::from(byte) + self.framing.trailer_len;
                trace!("broadcast line announces {} bytes", byte);
                if remaining == 0 {
                    GapState::Gap
                } else {
                    GapState::SkipPayload { remaining }
                }
            }
            GapState::SkipPayload { remaining } => match remaining {
                0 | 1 => GapState::Gap,
                n => GapState::SkipPayload { remaining: n - 1 },
            },
            GapState::Gap => GapState::Gap,
        };
        self.state = next;
        next
    }

    fn after_prefix_progress(&self, matched: usize) -> GapState {
        if matched < self.framing.prefix.len() {
            GapState::AwaitPrefix { matched }
        } else if self.framing.header_skip == 0 {
            GapState::AwaitLength
        } else {
            GapState::SkipHeader { remaining: self.framing.header_skip }
        }
    }
}
