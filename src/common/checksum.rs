// src/common/checksum.rs

//! Checksum schemes observed on the Flexit bus.
//!
//! Two schemes show up in practice: a one-byte additive sum trailing the
//! poll/command frames, and a two-accumulator Fletcher-style sum sealing the
//! 18-byte settings frame that is injected into the CS50 broadcast stream.
//! Where the summed window starts and where the checksum bytes sit is a
//! property of the frame, described by [`ChecksumSpec`].

use super::error::{DecodeError, EncodeError};
use super::layout::FrameLayout;
use arrayvec::ArrayVec;
use core::ops::Range;

/// Checksum bytes as they appear on the wire (0, 1 or 2 bytes).
pub type ChecksumBytes = ArrayVec<u8, 2>;

/// The checksum algorithm used by a frame variant.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ChecksumScheme {
    /// No checksum; validation always succeeds and decoding is best-effort.
    None,
    /// One byte: sum of the covered bytes modulo 256.
    AdditiveSum,
    /// Two bytes: `s1 += b; s2 += s1` over the covered bytes, emitted as
    /// `s1 mod 256, s2 mod 256`.
    FletcherAB,
}

impl ChecksumScheme {
    /// Number of checksum bytes this scheme places on the wire.
    pub const fn width(self) -> usize {
        match self {
            ChecksumScheme::None => 0,
            ChecksumScheme::AdditiveSum => 1,
            ChecksumScheme::FletcherAB => 2,
        }
    }

    /// Computes the checksum over `bytes`. Pure and deterministic.
    pub fn compute(self, bytes: &[u8]) -> ChecksumBytes {
        let mut out = ChecksumBytes::new();
        match self {
            ChecksumScheme::None => {}
            ChecksumScheme::AdditiveSum => {
                out.push(bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b)));
            }
            ChecksumScheme::FletcherAB => {
                let (s1, s2) = bytes.iter().fold((0u8, 0u8), |(s1, s2), b| {
                    let s1 = s1.wrapping_add(*b);
                    (s1, s2.wrapping_add(s1))
                });
                out.push(s1);
                out.push(s2);
            }
        }
        out
    }
}

/// Packs checksum bytes big-endian into a `u16` for error reporting.
pub fn checksum_value(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |acc, b| (acc << 8) | u16::from(*b))
}

/// Where the checksum bytes sit inside a frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ChecksumPosition {
    /// Last `width` bytes of the frame.
    Trailing,
    /// Fixed byte offset.
    At(usize),
}

/// Scheme plus the window it covers within one frame variant.
///
/// The covered window runs from `start` up to (excluding) the first checksum
/// byte.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ChecksumSpec {
    pub scheme: ChecksumScheme,
    pub start: usize,
    pub position: ChecksumPosition,
}

impl ChecksumSpec {
    /// Unverified frame variant.
    pub const NONE: ChecksumSpec = ChecksumSpec {
        scheme: ChecksumScheme::None,
        start: 0,
        position: ChecksumPosition::Trailing,
    };

    /// Sum of every preceding byte, stored in the last byte.
    pub const ADDITIVE_TRAILING: ChecksumSpec = ChecksumSpec {
        scheme: ChecksumScheme::AdditiveSum,
        start: 0,
        position: ChecksumPosition::Trailing,
    };

    /// `scheme` over every byte before the trailing checksum.
    pub const fn trailing(scheme: ChecksumScheme) -> ChecksumSpec {
        ChecksumSpec {
            scheme,
            start: 0,
            position: ChecksumPosition::Trailing,
        }
    }

    /// Fletcher-style sum over `start..at`, stored at `at` and `at + 1`.
    pub const fn fletcher_at(start: usize, at: usize) -> ChecksumSpec {
        ChecksumSpec {
            scheme: ChecksumScheme::FletcherAB,
            start,
            position: ChecksumPosition::At(at),
        }
    }

    /// Returns `(covered window, checksum byte range)` for a frame of
    /// `frame_len` bytes, or `None` when the frame cannot hold them.
    pub fn locate(&self, frame_len: usize) -> Option<(Range<usize>, Range<usize>)> {
        let width = self.scheme.width();
        let at = match self.position {
            ChecksumPosition::Trailing => frame_len.checked_sub(width)?,
            ChecksumPosition::At(at) => at,
        };
        let end = at.checked_add(width)?;
        if end > frame_len || self.start > at {
            return None;
        }
        Some((self.start..at, at..end))
    }

    /// Computes the checksum over the covered window and writes it into
    /// the frame.
    pub fn seal(&self, frame: &mut [u8]) -> Result<(), EncodeError> {
        if self.scheme == ChecksumScheme::None {
            return Ok(());
        }
        let (covered, slot) = self.locate(frame.len()).ok_or(EncodeError::NoRoomForChecksum {
            needed: self.start + self.scheme.width(),
            got: frame.len(),
        })?;
        let sum = self.scheme.compute(&frame[covered]);
        frame[slot].copy_from_slice(&sum);
        Ok(())
    }

    /// Recomputes the checksum and compares it with the bytes in the frame.
    pub fn verify(&self, frame: &[u8]) -> Result<(), DecodeError> {
        if self.scheme == ChecksumScheme::None {
            return Ok(());
        }
        let (covered, slot) = self.locate(frame.len()).ok_or(DecodeError::ShortFrame {
            len: frame.len(),
            min: self.start + self.scheme.width(),
        })?;
        let calculated = self.scheme.compute(&frame[covered]);
        let received = &frame[slot];

        if calculated.as_slice() == received {
            Ok(())
        } else {
            Err(DecodeError::ChecksumMismatch {
                expected: checksum_value(received),
                calculated: checksum_value(&calculated),
            })
        }
    }
}

/// Validates `frame` against the checksum declared by `layout`.
///
/// Always true for layouts whose scheme is [`ChecksumScheme::None`].
#[inline]
pub fn validate(frame: &[u8], layout: &FrameLayout) -> bool {
    layout.checksum.verify(frame).is_ok()
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    /// The SL4R settings frame as captured before sealing.
    const SETTINGS_FRAME: [u8; 18] =
        [195, 4, 0, 199, 81, 193, 4, 8, 32, 15, 0, 34, 128, 4, 0, 22, 0, 0];

    #[test]
    fn test_additive_sum_wraps() {
        assert_eq!(ChecksumScheme::AdditiveSum.compute(&[0xC3, 0x06, 0x1A, 0x00]).as_slice(), &[0xE3]);
        assert_eq!(ChecksumScheme::AdditiveSum.compute(&[0xFF, 0x02]).as_slice(), &[0x01]);
        assert_eq!(ChecksumScheme::AdditiveSum.compute(&[]).as_slice(), &[0x00]);
    }

    #[test]
    fn test_fletcher_settings_frame_worked_example() {
        let sum = ChecksumScheme::FletcherAB.compute(&SETTINGS_FRAME[5..=15]);
        assert_eq!(sum.as_slice(), &[184, 240]);
    }

    #[test]
    fn test_none_scheme_is_empty_and_always_valid() {
        assert!(ChecksumScheme::None.compute(&[1, 2, 3]).is_empty());
        assert_eq!(ChecksumSpec::NONE.verify(&[0xde, 0xad]), Ok(()));
    }

    #[test]
    fn test_seal_settings_frame() {
        let mut frame = SETTINGS_FRAME;
        ChecksumSpec::fletcher_at(5, 16).seal(&mut frame).unwrap();
        assert_eq!(&frame[16..], &[184, 240]);
        assert_eq!(&frame[..16], &SETTINGS_FRAME[..16]);
        assert!(ChecksumSpec::fletcher_at(5, 16).verify(&frame).is_ok());
    }

    #[test]
    fn test_verify_reports_both_values() {
        let frame = [0xC3, 0x06, 0x1A, 0x00, 0x42];
        assert_eq!(
            ChecksumSpec::ADDITIVE_TRAILING.verify(&frame),
            Err(DecodeError::ChecksumMismatch { expected: 0x42, calculated: 0xE3 })
        );
    }

    #[test]
    fn test_flipping_any_covered_byte_fails() {
        let mut frame = SETTINGS_FRAME;
        let spec = ChecksumSpec::fletcher_at(5, 16);
        spec.seal(&mut frame).unwrap();
        for i in 5..16 {
            let mut corrupted = frame;
            corrupted[i] ^= 0x01;
            assert!(spec.verify(&corrupted).is_err(), "flip at {} went unnoticed", i);
        }
    }

    #[test]
    fn test_locate_rejects_frames_too_small() {
        assert_eq!(ChecksumSpec::fletcher_at(5, 16).locate(17), None);
        assert_eq!(ChecksumSpec::ADDITIVE_TRAILING.locate(0), None);
        assert_eq!(ChecksumSpec::ADDITIVE_TRAILING.locate(5), Some((0..4, 4..5)));
    }

    #[test]
    fn test_seal_without_room() {
        let mut frame = [0u8; 10];
        assert!(matches!(
            ChecksumSpec::fletcher_at(5, 16).seal(&mut frame),
            Err(EncodeError::NoRoomForChecksum { .. })
        ));
    }

    #[test]
    fn test_checksum_value_packing() {
        assert_eq!(checksum_value(&[184, 240]), 0xB8F0);
        assert_eq!(checksum_value(&[0x42]), 0x42);
        assert_eq!(checksum_value(&[]), 0);
    }

    #[test]
    fn test_validate_against_layout() {
        use crate::common::layout::layouts::{CS50_POLL_REPLY, CS50_POLL_REPLY_SUMMED};
        use crate::common::test_support::fixtures;

        let mut summed = fixtures::cs50_poll_reply_summed();
        assert!(validate(&summed, &CS50_POLL_REPLY_SUMMED));
        summed[3] ^= 0x40;
        assert!(!validate(&summed, &CS50_POLL_REPLY_SUMMED));
        // Unverified layouts accept anything.
        assert!(validate(&summed, &CS50_POLL_REPLY));
    }
}
