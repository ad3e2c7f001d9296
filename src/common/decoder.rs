// src/common/decoder.rs

//! Turns a candidate frame into a [`Reading`].
//!
//! Validation runs in a fixed order: length, signature, checksum. Only a
//! frame that passes all three is read field by field; values are reported
//! exactly as the bytes encode them, with no range checks.

use super::{
    error::DecodeError,
    frame::RawFrame,
    layout::{Field, FieldKind, FieldSpec, FrameLayout},
    reading::{Reading, Temperature},
};

/// Decodes `frame` according to `layout`.
pub fn decode(frame: &[u8], layout: &'static FrameLayout) -> Result<Reading, DecodeError> {
    // 1. Structure
    if frame.len() < layout.min_len {
        return Err(DecodeError::ShortFrame { len: frame.len(), min: layout.min_len });
    }
    layout.check_signature(frame)?;

    // 2. Integrity
    layout.checksum.verify(frame)?;

    // 3. Fields
    let mut reading = Reading::empty(layout.name);
    for spec in layout.fields {
        apply_field(&mut reading, spec, frame);
    }
    Ok(reading)
}

/// Decodes a synchronized frame with the layout that matched it.
pub fn decode_raw<I: Copy>(frame: &RawFrame<I>) -> Result<Reading, DecodeError> {
    decode(frame.as_bytes(), frame.layout())
}

/// Decoded value of one field before it is stored in a [`Reading`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Value {
    Temperature(Temperature),
    Number(u32),
    Flag(bool),
}

fn read_value(kind: FieldKind, bytes: &[u8]) -> Value {
    match kind {
        FieldKind::TenthsI16Be => {
            Value::Temperature(Temperature::from_tenths(i16::from_be_bytes([bytes[0], bytes[1]])))
        }
        FieldKind::WholeDegreesU8 => {
            Value::Temperature(Temperature::from_whole_degrees(i16::from(bytes[0])))
        }
        FieldKind::ScaledU8 { divisor } => Value::Number(u32::from(bytes[0] / divisor.max(1))),
        FieldKind::Bit { mask } => Value::Flag(bytes[0] & mask != 0),
        FieldKind::Equals { value } => Value::Flag(bytes[0] == value),
        FieldKind::UnsignedBe { .. } => {
            Value::Number(bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
        }
    }
}

/// Multi-byte counters mapped onto byte-sized fields clamp at `u8::MAX`.
fn saturate_u8(n: u32) -> u8 {
    u8::try_from(n).unwrap_or(u8::MAX)
}

fn apply_field(reading: &mut Reading, spec: &FieldSpec, frame: &[u8]) {
    // Layouts are checked against min_len, but a hand-written table may
    // still reach past the end; such a field is left unset.
    let Some(bytes) = frame.get(spec.offset..spec.offset + spec.kind.span()) else {
        return;
    };
    let value = read_value(spec.kind, bytes);

    match (spec.field, value) {
        (Field::Temperature(i), Value::Temperature(t)) => {
            if let Some(slot) = reading.temperatures.get_mut(usize::from(i)) {
                *slot = Some(t);
            }
        }
        (Field::FanLevel, Value::Number(n)) => reading.fan_level = Some(saturate_u8(n)),
        (Field::Setpoint, Value::Number(n)) => reading.setpoint = Some(saturate_u8(n)),
        // A setpoint below zero or above 255 degrees has no byte value.
        (Field::Setpoint, Value::Temperature(t)) => {
            reading.setpoint = u8::try_from(t.tenths() / 10).ok()
        }
        (Field::OperationalHours, Value::Number(n)) => reading.operational_hours = Some(n),
        (Field::HeaterActive, Value::Flag(f)) => reading.heater_active = Some(f),
        (Field::RotorActive, Value::Flag(f)) => reading.rotor_active = Some(f),
        (Field::FilterAlarm, Value::Flag(f)) => reading.filter_alarm = Some(f),
        (Field::HeaterActive | Field::RotorActive | Field::FilterAlarm, Value::Number(n)) => {
            let flag = Some(n != 0);
            match spec.field {
                Field::HeaterActive => reading.heater_active = flag,
                Field::RotorActive => reading.rotor_active = flag,
                _ => reading.filter_alarm = flag,
            }
        }
        // Field/kind pairs with no sensible meaning leave the field unset.
        _ => {}
    }
}
