// src/common/reading.rs

use core::fmt;

/// A temperature in tenths of a degree Celsius.
///
/// Stored as the raw signed value from the wire so that decoding is exact;
/// no range checks are applied.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Temperature(i16);

impl Temperature {
    pub const fn from_tenths(tenths: i16) -> Self {
        Temperature(tenths)
    }

    pub const fn from_whole_degrees(degrees: i16) -> Self {
        Temperature(degrees.saturating_mul(10))
    }

    #[inline]
    pub const fn tenths(&self) -> i16 {
        self.0
    }

    #[inline]
    pub fn celsius(&self) -> f32 {
        f32::from(self.0) / 10.0
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{}", sign, abs / 10, abs % 10)
    }
}

/// A decoded status snapshot from one validated frame.
///
/// Fields a layout does not carry are `None`; every `Some` value came from
/// the same frame. A `Reading` only exists for frames that passed length,
/// signature and checksum validation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Reading {
    /// Name of the layout that produced this reading.
    pub layout: &'static str,
    pub temperatures: [Option<Temperature>; 4],
    pub fan_level: Option<u8>,
    pub heater_active: Option<bool>,
    pub rotor_active: Option<bool>,
    pub filter_alarm: Option<bool>,
    pub operational_hours: Option<u32>,
    pub setpoint: Option<u8>,
}

impl Reading {
    /// An empty reading for `layout`, to be filled by the decoder.
    pub(crate) const fn empty(layout: &'static str) -> Self {
        Reading {
            layout,
            temperatures: [None; 4],
            fan_level: None,
            heater_active: None,
            rotor_active: None,
            filter_alarm: None,
            operational_hours: None,
            setpoint: None,
        }
    }

    /// Temperature sensor `n` (1-based, as labelled on the unit).
    pub fn temperature(&self, n: usize) -> Option<Temperature> {
        n.checked_sub(1)
            .and_then(|i| self.temperatures.get(i).copied())
            .flatten()
    }
}

/// What the arbiter can report to consumers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReadingState {
    /// No frame has been decoded since start-up.
    NeverSynchronized,
    /// The last successfully validated reading.
    Valid(Reading),
}

impl ReadingState {
    pub fn reading(&self) -> Option<&Reading> {
        match self {
            ReadingState::NeverSynchronized => None,
            ReadingState::Valid(r) => Some(r),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ReadingState::Valid(_))
    }
}
