// src/common/test_support.rs

//! Mock RS485 interface with a virtual clock, plus golden frames.

use super::hal_traits::{BusTimer, Direction, Rs485Serial};
use super::timing;
use core::time::Duration;
use std::collections::VecDeque;
use std::vec::Vec;

// --- Mock Instant ---
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MockInstant(pub u64);

impl MockInstant {
    pub fn from_millis(ms: u64) -> Self {
        MockInstant(ms * 1000)
    }
}

impl core::ops::Add<Duration> for MockInstant {
    type Output = Self;
    fn add(self, rhs: Duration) -> Self {
        MockInstant(self.0.saturating_add(rhs.as_micros() as u64))
    }
}

impl core::ops::Sub<MockInstant> for MockInstant {
    type Output = Duration;
    fn sub(self, rhs: MockInstant) -> Duration {
        Duration::from_micros(self.0.saturating_sub(rhs.0))
    }
}

// --- Mock Comm Error ---
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MockCommError;

/// A byte written by the code under test.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WrittenByte {
    pub byte: u8,
    pub direction: Direction,
    pub at_us: u64,
}

// --- Mock Interface ---
pub struct MockInterface {
    pub current_time_us: u64,
    /// Time one received byte takes on the wire.
    pub byte_time_us: u64,
    read_queue: VecDeque<(u64, u8)>,
    pub write_log: Vec<WrittenByte>,
    pub direction: Direction,
    /// Every direction change with its timestamp.
    pub direction_log: Vec<(u64, Direction)>,
    unflushed: usize,
    /// Times the line was released while bytes were still unflushed.
    pub released_unflushed: usize,
    pub flush_count: usize,
    read_error: bool,
    write_blocks: bool,
    flush_blocks: bool,
}

impl MockInterface {
    pub fn new() -> Self {
        MockInterface {
            current_time_us: 0,
            byte_time_us: timing::byte_duration(timing::BAUD_19200).as_micros() as u64,
            read_queue: VecDeque::new(),
            write_log: Vec::new(),
            direction: Direction::Receive,
            direction_log: Vec::new(),
            unflushed: 0,
            released_unflushed: 0,
            flush_count: 0,
            read_error: false,
            write_blocks: false,
            flush_blocks: false,
        }
    }

    pub fn advance_time(&mut self, us: u64) {
        self.current_time_us = self.current_time_us.saturating_add(us);
    }

    /// Queues bytes that are available immediately (after anything already
    /// queued).
    pub fn stage_read_data(&mut self, data: &[u8]) {
        self.stage_read_data_at(0, data);
    }

    /// Queues bytes that only become readable once the clock reaches `at_us`.
    pub fn stage_read_data_at(&mut self, at_us: u64, data: &[u8]) {
        for byte in data {
            self.read_queue.push_back((at_us, *byte));
        }
    }

    pub fn pending_reads(&self) -> usize {
        self.read_queue.len()
    }

    pub fn fail_reads(&mut self) {
        self.read_error = true;
    }

    pub fn block_writes(&mut self) {
        self.write_blocks = true;
    }

    pub fn block_flush(&mut self) {
        self.flush_blocks = true;
    }

    pub fn written(&self) -> Vec<u8> {
        self.write_log.iter().map(|w| w.byte).collect()
    }
}

impl BusTimer for MockInterface {
    type Instant = MockInstant;
    fn now(&self) -> Self::Instant {
        MockInstant(self.current_time_us)
    }
    fn delay_us(&mut self, us: u32) {
        self.advance_time(us as u64);
    }
    fn delay_ms(&mut self, ms: u32) {
        self.advance_time((ms as u64) * 1000);
    }
}

impl Rs485Serial for MockInterface {
    type Error = MockCommError;

    fn read_byte(&mut self) -> nb::Result<u8, Self::Error> {
        if self.read_error {
            return Err(nb::Error::Other(MockCommError));
        }
        match self.read_queue.front() {
            Some(&(at, byte)) if at <= self.current_time_us => {
                self.read_queue.pop_front();
                self.advance_time(self.byte_time_us);
                Ok(byte)
            }
            _ => Err(nb::Error::WouldBlock),
        }
    }

    fn write_byte(&mut self, byte: u8) -> nb::Result<(), Self::Error> {
        if self.write_blocks {
            return Err(nb::Error::WouldBlock);
        }
        self.write_log.push(WrittenByte {
            byte,
            direction: self.direction,
            at_us: self.current_time_us,
        });
        self.unflushed += 1;
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        if self.flush_blocks {
            return Err(nb::Error::WouldBlock);
        }
        self.advance_time(self.byte_time_us * self.unflushed as u64);
        self.unflushed = 0;
        self.flush_count += 1;
        Ok(())
    }

    fn set_direction(&mut self, direction: Direction) -> Result<(), Self::Error> {
        if direction == Direction::Receive && self.unflushed > 0 {
            self.released_unflushed += 1;
        }
        self.direction = direction;
        self.direction_log.push((self.current_time_us, direction));
        Ok(())
    }
}

/// Golden frames, one per built-in layout.
pub mod fixtures {
    use std::vec::Vec;

    /// CS50 poll reply: T1 21.5, T2 -3.5, T3 18.0, T4 4.2, fan 2,
    /// filter alarm + heater on, rotor off, 76 878 operating hours.
    pub fn cs50_poll_reply() -> [u8; 26] {
        [
            0xC3, 0x02, 0x00, 0x00, 0x00, // header
            0x02, // fan level
            0x00, 0x00, 0x00, //
            0x00, 0xD7, // T1
            0xFF, 0xDD, // T2
            0x00, 0xB4, // T3
            0x09, // flags
            0x00, //
            0x00, 0x2A, // T4
            0x00, 0x00, 0x00, //
            0x00, 0x01, 0x2C, 0x4E, // hours
        ]
    }

    /// Same payload followed by its additive checksum.
    pub fn cs50_poll_reply_summed() -> [u8; 27] {
        let mut frame = [0u8; 27];
        let reply = cs50_poll_reply();
        frame[..26].copy_from_slice(&reply);
        frame[26] = reply.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        frame
    }

    /// SL4R line 15: fan 2 (34), heater on (128), 21 degrees, hours 49 450.
    pub fn sl4r_status_line() -> [u8; 25] {
        [
            0x03, 0x00, 0x40, 0x0B, 0x19, 0x01, 34, 128, 0x00, 0x00, 21, 0x00, 0x00, 0x00,
            0x00, 0x00, 195, 0x04, 0x00, 0x01, 0x00, 0x00, 193, 0x2A, 22,
        ]
    }

    /// A broadcast line per `BroadcastFraming::SL4R` announcing `len` payload bytes.
    pub fn sl4r_broadcast_line(len: u8) -> Vec<u8> {
        let mut line = std::vec![195, 1, 0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70, 0x80, len];
        line.extend((0..len).map(|i| i.wrapping_mul(3)));
        line.extend([0xEE, 0xEF]);
        line
    }
}
