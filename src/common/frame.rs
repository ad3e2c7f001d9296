// src/common/frame.rs

use super::layout::{FrameLayout, MAX_FRAME_LEN};
use heapless::Vec;

/// Candidate frame cut out of the byte stream by the synchronizer.
///
/// Immutable once built; consumed by the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame<I> {
    bytes: Vec<u8, MAX_FRAME_LEN>,
    layout: &'static FrameLayout,
    captured_at: I,
}

impl<I: Copy> RawFrame<I> {
    /// Copies `bytes` into a new frame. Returns `None` when `bytes` exceeds
    /// [`MAX_FRAME_LEN`].
    pub fn new(bytes: &[u8], layout: &'static FrameLayout, captured_at: I) -> Option<Self> {
        let bytes = Vec::from_slice(bytes).ok()?;
        Some(RawFrame { bytes, layout, captured_at })
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Layout whose signature matched this frame.
    #[inline]
    pub fn layout(&self) -> &'static FrameLayout {
        self.layout
    }

    #[inline]
    pub fn captured_at(&self) -> I {
        self.captured_at
    }
}
