// src/common/timing.rs

use core::time::Duration;

// Values below are the defaults used by the bridge firmware in the field.
// None of them are protocol constants; every one can be overridden through
// `ArbiterConfig`.

// === Line settings ===

/// Baud rate of the CS50 controller bus.
pub const BAUD_19200: u32 = 19_200;
/// Baud rate seen on older controller revisions.
pub const BAUD_9600: u32 = 9_600;
/// 8N1 framing: start bit + 8 data bits + stop bit.
pub const BITS_PER_BYTE: u32 = 10;

// === Scheduling ===

/// Interval between scheduled polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);
/// How long to wait for a poll reply (or a status line in broadcast mode).
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(2);
/// How long to look for a gap in the broadcast stream before giving up.
pub const INJECTION_TIMEOUT: Duration = Duration::from_secs(3);

// === Direction control ===

/// Settle time between asserting RE/DE and the first transmitted byte.
/// Transceivers in the field needed between 5 and 15 ms.
pub const DIRECTION_GUARD: Duration = Duration::from_millis(5);
/// Extra slack added to byte-time derived write/flush deadlines.
pub const TX_DEADLINE_SLACK: Duration = Duration::from_millis(20);

// === Busy-wait granularity ===

/// Delay between non-blocking I/O attempts that returned `WouldBlock`.
pub const IO_RETRY_DELAY_US: u32 = 100;

/// Nominal duration of one 8N1 byte at `baud_rate`.
///
/// A baud rate of zero is treated as one baud rather than dividing by zero.
pub const fn byte_duration(baud_rate: u32) -> Duration {
    let baud = if baud_rate == 0 { 1 } else { baud_rate as u64 };
    Duration::from_nanos(BITS_PER_BYTE as u64 * 1_000_000_000 / baud)
}

/// Deadline budget for writing and flushing `len` bytes.
pub fn transmit_budget(baud_rate: u32, len: usize) -> Duration {
    byte_duration(baud_rate) * len as u32 + TX_DEADLINE_SLACK
}
