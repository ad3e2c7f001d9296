// src/common/error.rs

/// Reasons a candidate frame was rejected by the decoder.
///
/// None of these are fatal: the caller keeps its previous reading and tries
/// again on the next cycle.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum DecodeError {
    /// Frame is shorter than the layout's minimum length.
    #[error("Short frame: got {len} bytes, layout needs {min}")]
    ShortFrame { len: usize, min: usize },

    /// A signature byte did not match the layout.
    #[error("Signature mismatch at offset {offset}: expected {expected:#04x}, found {found:#04x}")]
    SignatureMismatch { offset: usize, expected: u8, found: u8 },

    /// Received checksum does not match the calculated one.
    #[error("Checksum mismatch: expected {expected:#06x}, calculated {calculated:#06x}")]
    ChecksumMismatch { expected: u16, calculated: u16 },
}

/// Errors raised while sealing an outbound frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum EncodeError {
    /// Register does not address a byte inside the command template.
    #[error("Register {register:#04x} is outside the command frame")]
    RegisterOutOfRange { register: u8 },

    /// The frame does not have room for the checksum bytes.
    #[error("Frame too small for checksum: needed {needed}, got {got}")]
    NoRoomForChecksum { needed: usize, got: usize },
}

/// Errors surfaced by the bus arbiter for one cycle.
#[derive(Debug, thiserror::Error)]
pub enum BusError<E = ()>
where
    E: core::fmt::Debug,
{
    /// Underlying I/O error from the transceiver implementation.
    #[error("I/O error: {0:?}")]
    Io(E),

    /// No recognizable frame arrived before the deadline.
    #[error("No frame synchronized before the deadline")]
    SyncTimeout,

    /// No quiet gap was found in the broadcast stream before the deadline.
    #[error("No injection gap found before the deadline")]
    InjectionTimeout,

    /// The transmit buffer did not accept a byte before the deadline.
    #[error("Write timed out")]
    WriteTimeout,

    /// The transmit buffer did not drain before the deadline.
    #[error("Flush timed out")]
    FlushTimeout,

    /// A frame was synchronized but failed validation.
    #[error("Frame rejected: {0}")]
    Decode(DecodeError),

    /// The pending command could not be sealed into a frame.
    #[error("Command rejected: {0}")]
    Encode(EncodeError),
}

impl<E: core::fmt::Debug> BusError<E> {
    /// True for outcomes that only mean "try again next cycle".
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            BusError::SyncTimeout
                | BusError::InjectionTimeout
                | BusError::WriteTimeout
                | BusError::FlushTimeout
        )
    }
}

impl<E: core::fmt::Debug> From<DecodeError> for BusError<E> {
    fn from(e: DecodeError) -> Self {
        BusError::Decode(e)
    }
}

impl<E: core::fmt::Debug> From<EncodeError> for BusError<E> {
    fn from(e: EncodeError) -> Self {
        BusError::Encode(e)
    }
}
