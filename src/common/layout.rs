// src/common/layout.rs

//! Declarative frame layouts.
//!
//! A [`FrameLayout`] says how to recognise one protocol variant in the byte
//! stream (length + signature bytes) and where every reading field lives in
//! it. Layouts are plain data: adding a controller revision means adding a
//! table to [`layouts`], not writing a decoder.
//!
//! The byte offsets come from reverse engineering. Several of them are
//! unconfirmed (rotor/filter bits, the width of the operational-hours
//! counter); they are kept here as configuration, not as settled protocol.

use super::checksum::ChecksumSpec;
use super::error::DecodeError;

/// Largest frame any built-in layout extracts.
pub const MAX_FRAME_LEN: usize = 32;

/// One byte that must hold a fixed value for a window to match a layout.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SignatureByte {
    /// Offset from the first byte of the frame.
    pub offset: usize,
    pub value: u8,
}

impl SignatureByte {
    pub const fn new(offset: usize, value: u8) -> Self {
        SignatureByte { offset, value }
    }
}

/// The reading fields a layout can populate.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Field {
    /// Temperature sensor 1..=4 (zero-based index).
    Temperature(u8),
    FanLevel,
    HeaterActive,
    RotorActive,
    FilterAlarm,
    OperationalHours,
    Setpoint,
}

/// How the bytes at a field's offset turn into a value.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FieldKind {
    /// Signed 16-bit big-endian, tenths of a degree.
    TenthsI16Be,
    /// Unsigned byte, whole degrees.
    WholeDegreesU8,
    /// Unsigned byte divided by `divisor` (integer division).
    ScaledU8 { divisor: u8 },
    /// Boolean: any bit of `mask` set.
    Bit { mask: u8 },
    /// Boolean: byte equals `value`.
    Equals { value: u8 },
    /// Unsigned big-endian accumulator, `width` bytes (1..=4).
    UnsignedBe { width: u8 },
}

impl FieldKind {
    /// Number of frame bytes the field reads.
    pub const fn span(self) -> usize {
        match self {
            FieldKind::TenthsI16Be => 2,
            FieldKind::UnsignedBe { width } => width as usize,
            _ => 1,
        }
    }
}

/// One row of a layout's field table.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FieldSpec {
    pub field: Field,
    pub offset: usize,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn new(field: Field, offset: usize, kind: FieldKind) -> Self {
        FieldSpec { field, offset, kind }
    }
}

/// A named, versioned description of one frame variant.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FrameLayout {
    pub name: &'static str,
    pub revision: u8,
    /// Bytes the synchronizer extracts once the signature matches.
    pub frame_len: usize,
    /// Shortest frame the decoder accepts.
    pub min_len: usize,
    pub signature: &'static [SignatureByte],
    pub checksum: ChecksumSpec,
    pub fields: &'static [FieldSpec],
}

impl FrameLayout {
    /// Checks every signature byte against `frame`.
    ///
    /// Offsets past the end of `frame` count as mismatches with a found
    /// value of `0`.
    pub fn check_signature(&self, frame: &[u8]) -> Result<(), DecodeError> {
        for sig in self.signature {
            let found = frame.get(sig.offset).copied();
            if found != Some(sig.value) {
                return Err(DecodeError::SignatureMismatch {
                    offset: sig.offset,
                    expected: sig.value,
                    found: found.unwrap_or(0),
                });
            }
        }
        Ok(())
    }

    /// True when the last `frame_len` bytes of `window` carry this layout's
    /// signature.
    pub fn matches_tail(&self, window: &[u8]) -> bool {
        match window.len().checked_sub(self.frame_len) {
            Some(start) => self.check_signature(&window[start..]).is_ok(),
            None => false,
        }
    }

    /// True when every field and the checksum fit inside `min_len`.
    pub fn is_consistent(&self) -> bool {
        let fields_fit = self
            .fields
            .iter()
            .all(|f| f.offset + f.kind.span() <= self.min_len);
        let signature_fits = self.signature.iter().all(|s| s.offset < self.min_len);
        let checksum_fits = self.checksum.locate(self.min_len).is_some();
        fields_fit
            && signature_fits
            && checksum_fits
            && self.min_len <= self.frame_len
            && self.frame_len <= MAX_FRAME_LEN
    }
}

/// How to find the inter-frame gap in the controller's broadcast stream.
///
/// A broadcast line starts with `prefix`, followed by `header_skip` header
/// bytes, a one-byte announced payload length, then that many payload bytes
/// plus `trailer_len` checksum bytes. Once all of it has been consumed the
/// line is quiet until the controller's next broadcast.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BroadcastFraming {
    pub prefix: &'static [u8],
    pub header_skip: usize,
    pub trailer_len: usize,
}

impl BroadcastFraming {
    /// CS50/SL4R broadcast line: `195, 1`, eight header bytes, length, payload + 2.
    pub const SL4R: BroadcastFraming = BroadcastFraming {
        prefix: &[195, 1],
        header_skip: 8,
        trailer_len: 2,
    };
}

/// Built-in layout tables.
pub mod layouts {
    use super::*;
    use Field::*;
    use FieldKind::*;

    const CS50_FIELDS: &[FieldSpec] = &[
        FieldSpec::new(Temperature(0), 9, TenthsI16Be),
        FieldSpec::new(Temperature(1), 11, TenthsI16Be),
        FieldSpec::new(Temperature(2), 13, TenthsI16Be),
        FieldSpec::new(Temperature(3), 17, TenthsI16Be),
        FieldSpec::new(FanLevel, 5, ScaledU8 { divisor: 1 }),
        FieldSpec::new(FilterAlarm, 15, Bit { mask: 0x01 }),
        FieldSpec::new(HeaterActive, 15, Bit { mask: 0x08 }),
        FieldSpec::new(RotorActive, 15, Bit { mask: 0x10 }),
        FieldSpec::new(OperationalHours, 22, UnsignedBe { width: 4 }),
    ];

    /// CS50 reply to a direct poll. The trailing checksum has never been
    /// confirmed on real units, so this revision decodes best-effort.
    pub const CS50_POLL_REPLY: FrameLayout = FrameLayout {
        name: "cs50-poll-reply",
        revision: 1,
        frame_len: 26,
        min_len: 26,
        signature: &[SignatureByte::new(0, 0xC3)],
        checksum: ChecksumSpec::NONE,
        fields: CS50_FIELDS,
    };

    /// CS50 poll reply followed by a one-byte additive checksum.
    pub const CS50_POLL_REPLY_SUMMED: FrameLayout = FrameLayout {
        name: "cs50-poll-reply-summed",
        revision: 2,
        frame_len: 27,
        min_len: 27,
        signature: &[SignatureByte::new(0, 0xC3)],
        checksum: ChecksumSpec::ADDITIVE_TRAILING,
        fields: CS50_FIELDS,
    };

    /// SL4R "line 15": 25-byte status window inside the continuous broadcast
    /// stream, found by the `195 .. 193 . 22` bytes near its end.
    ///
    /// The 24-bit operational-hours counter is a best guess for this unit.
    pub const SL4R_STATUS_LINE: FrameLayout = FrameLayout {
        name: "sl4r-status-line",
        revision: 1,
        frame_len: 25,
        min_len: 25,
        signature: &[
            SignatureByte::new(16, 195),
            SignatureByte::new(22, 193),
            SignatureByte::new(24, 22),
        ],
        checksum: ChecksumSpec::NONE,
        fields: &[
            FieldSpec::new(FanLevel, 6, ScaledU8 { divisor: 17 }),
            FieldSpec::new(HeaterActive, 7, Equals { value: 128 }),
            FieldSpec::new(Temperature(0), 10, WholeDegreesU8),
            FieldSpec::new(OperationalHours, 21, UnsignedBe { width: 3 }),
        ],
    };

    /// Every layout shipped with the crate.
    pub const BUILTIN: &[&FrameLayout] =
        &[&CS50_POLL_REPLY, &CS50_POLL_REPLY_SUMMED, &SL4R_STATUS_LINE];

    /// Looks up a built-in layout by its configured name.
    pub fn by_name(name: &str) -> Option<&'static FrameLayout> {
        BUILTIN.iter().copied().find(|l| l.name == name)
    }
}
