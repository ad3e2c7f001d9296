// src/common/command.rs

//! Outbound command frames.
//!
//! Two shapes go out on the bus:
//!
//! * the short frame `[0xC3, opcode, register, value, checksum..]` used for
//!   polls and direct writes on a master-polled bus, and
//! * the 18-byte SL4R settings frame injected into the controller's
//!   broadcast stream, where the "register" is a byte offset inside the
//!   frame and a Fletcher-style checksum seals bytes 5..=15.
//!
//! Encoding is pure: nothing here touches the bus.

use super::checksum::{ChecksumScheme, ChecksumSpec};
use super::error::EncodeError;
use arrayvec::ArrayVec;

/// Frame start byte shared by polls, writes and replies.
pub const START_BYTE: u8 = 0xC3;
/// Read-request opcode.
pub const OPCODE_READ: u8 = 0x02;
/// Write opcode.
pub const OPCODE_WRITE: u8 = 0x06;

/// Longest frame the encoder produces.
pub const MAX_COMMAND_LEN: usize = 18;

/// A transmit-ready frame.
pub type EncodedFrame = ArrayVec<u8, MAX_COMMAND_LEN>;

/// Known register numbers.
pub mod registers {
    /// Direct write: after-heater permission (0 = blocked, 1 = allowed).
    pub const HEATER_ENABLE: u8 = 0x1A;
    /// Direct write: 1 resets the filter alarm.
    pub const FILTER_RESET: u8 = 0x1F;

    /// Settings frame offset: fan level × 17.
    pub const SETTINGS_FAN: u8 = 11;
    /// Settings frame offset: 128 = heater on, 0 = off.
    pub const SETTINGS_HEATER: u8 = 12;
    /// Settings frame offset: heat-exchanger setpoint in whole degrees.
    pub const SETTINGS_SETPOINT: u8 = 15;
}

/// A single register write waiting to go out.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct OutboundCommand {
    pub register: u8,
    pub value: u8,
}

impl OutboundCommand {
    pub const fn new(register: u8, value: u8) -> Self {
        OutboundCommand { register, value }
    }

    /// Allow or block the after-heater (load shedding).
    pub const fn heater_enable(allow: bool) -> Self {
        Self::new(registers::HEATER_ENABLE, allow as u8)
    }

    /// Reset the filter alarm.
    pub const fn filter_reset() -> Self {
        Self::new(registers::FILTER_RESET, 0x01)
    }

    /// Settings frame: fan level 1..=3.
    pub const fn fan_level(level: u8) -> Self {
        Self::new(registers::SETTINGS_FAN, level.saturating_mul(17))
    }

    /// Settings frame: heater on/off.
    pub const fn heater(on: bool) -> Self {
        Self::new(registers::SETTINGS_HEATER, if on { 128 } else { 0 })
    }

    /// Settings frame: setpoint in whole degrees.
    pub const fn setpoint(degrees: u8) -> Self {
        Self::new(registers::SETTINGS_SETPOINT, degrees)
    }
}

/// Builds a short `[START, opcode, register, value, checksum..]` frame.
fn encode_short(opcode: u8, register: u8, value: u8, scheme: ChecksumScheme) -> EncodedFrame {
    let mut frame = EncodedFrame::new();
    frame.extend([START_BYTE, opcode, register, value]);
    let sum = scheme.compute(&frame);
    frame.extend(sum);
    frame
}

/// Encodes a direct write of `value` to `register`.
pub fn encode(register: u8, value: u8, scheme: ChecksumScheme) -> EncodedFrame {
    encode_short(OPCODE_WRITE, register, value, scheme)
}

/// Encodes a read request (poll).
pub fn encode_poll(register: u8, value: u8, scheme: ChecksumScheme) -> EncodedFrame {
    encode_short(OPCODE_READ, register, value, scheme)
}

/// Checks the trailing checksum of a short frame built with `scheme`.
pub fn verify_short(frame: &[u8], scheme: ChecksumScheme) -> bool {
    ChecksumSpec::trailing(scheme).verify(frame).is_ok()
}

/// Fixed-shape frame whose bytes are overwritten per command, then sealed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct InjectionTemplate {
    pub bytes: [u8; MAX_COMMAND_LEN],
    pub checksum: ChecksumSpec,
}

impl InjectionTemplate {
    /// SL4R settings frame as captured from a CS50 panel (fan 2, heater on,
    /// setpoint 22), checksum bytes zeroed.
    pub const SL4R_SETTINGS: InjectionTemplate = InjectionTemplate {
        bytes: [195, 4, 0, 199, 81, 193, 4, 8, 32, 15, 0, 34, 128, 4, 0, 22, 0, 0],
        checksum: ChecksumSpec::fletcher_at(5, 16),
    };

    /// Returns a copy with `value` written at offset `register`, sealed.
    ///
    /// Offsets that land on the checksum bytes or past the frame are
    /// rejected.
    pub fn with_register(&self, register: u8, value: u8) -> Result<InjectionTemplate, EncodeError> {
        let mut next = *self;
        let (_, slot) = next.checksum.locate(next.bytes.len()).ok_or(EncodeError::NoRoomForChecksum {
            needed: next.checksum.start + next.checksum.scheme.width(),
            got: next.bytes.len(),
        })?;
        let offset = usize::from(register);
        if offset >= next.bytes.len() || slot.contains(&offset) {
            return Err(EncodeError::RegisterOutOfRange { register });
        }
        next.bytes[offset] = value;
        next.checksum.seal(&mut next.bytes)?;
        Ok(next)
    }

    /// The frame as it goes on the wire.
    pub fn frame(&self) -> EncodedFrame {
        EncodedFrame::from(self.bytes)
    }

    /// Copies the template, writes `value` at offset `register` and seals it.
    pub fn encode(&self, register: u8, value: u8) -> Result<EncodedFrame, EncodeError> {
        self.with_register(register, value).map(|next| next.frame())
    }
}

/// How pending commands are turned into frames.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CommandFormat {
    /// Short write frame sealed with the given scheme.
    Direct(ChecksumScheme),
    /// Settings frame written into a template.
    Injection(InjectionTemplate),
}

impl CommandFormat {
    pub fn encode(&self, command: &OutboundCommand) -> Result<EncodedFrame, EncodeError> {
        match self {
            CommandFormat::Direct(scheme) => Ok(encode(command.register, command.value, *scheme)),
            CommandFormat::Injection(template) => template.encode(command.register, command.value),
        }
    }
}

impl Default for CommandFormat {
    fn default() -> Self {
        CommandFormat::Direct(ChecksumScheme::AdditiveSum)
    }
}
