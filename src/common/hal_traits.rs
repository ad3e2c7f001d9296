// src/common/hal_traits.rs

use core::fmt::Debug;
use core::ops::{Add, Sub};
use core::time::Duration;

/// A point in time from the interface's clock.
///
/// Real hardware backs this with a monotonic tick counter; tests use a
/// virtual clock so deadline handling can be exercised without waiting.
pub trait BusInstant:
    Copy + Ord + Debug + Add<Duration, Output = Self> + Sub<Self, Output = Duration>
{
}

impl<T> BusInstant for T where
    T: Copy + Ord + Debug + Add<Duration, Output = T> + Sub<T, Output = Duration>
{
}

/// Abstraction for clock and delay operations.
pub trait BusTimer {
    type Instant: BusInstant;

    /// Current time.
    fn now(&self) -> Self::Instant;

    /// Delay for at least the specified number of microseconds.
    fn delay_us(&mut self, us: u32);

    /// Delay for at least the specified number of milliseconds.
    fn delay_ms(&mut self, ms: u32);
}

/// Transceiver direction on the half-duplex pair.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Direction {
    /// Driver disabled, receiver enabled (RE/DE low).
    Receive,
    /// Driver enabled (RE/DE high).
    Transmit,
}

/// Abstraction for a non-blocking RS485 serial link with a direction line.
pub trait Rs485Serial {
    /// Associated error type for communication errors.
    type Error: Debug;

    /// Attempts to read a single byte.
    ///
    /// Returns `Err(nb::Error::WouldBlock)` if no byte is available yet.
    fn read_byte(&mut self) -> nb::Result<u8, Self::Error>;

    /// Attempts to write a single byte.
    ///
    /// Returns `Err(nb::Error::WouldBlock)` if the transmit buffer is full.
    fn write_byte(&mut self, byte: u8) -> nb::Result<(), Self::Error>;

    /// Attempts to flush the transmit buffer.
    ///
    /// Returns `Ok(())` only once every written byte has left the shift
    /// register; `Err(nb::Error::WouldBlock)` while transmission is ongoing.
    fn flush(&mut self) -> nb::Result<(), Self::Error>;

    /// Drives the transceiver's direction-control line.
    fn set_direction(&mut self, direction: Direction) -> Result<(), Self::Error>;
}

/// Interface adapters over `embedded-hal` 1.0 pins and `embedded-hal-nb`
/// serial ports.
#[cfg(feature = "impl-native")]
pub mod native {
    use super::{Direction, Rs485Serial};
    use embedded_hal::digital::OutputPin;
    use embedded_hal_nb::serial::{Read, Write};

    /// Error from either half of a [`NativeRs485`].
    #[derive(Debug)]
    pub enum NativeError<U, P> {
        Uart(U),
        Pin(P),
    }

    /// Combines a UART and a RE/DE output pin (high = transmit).
    #[derive(Debug)]
    pub struct NativeRs485<U, P> {
        uart: U,
        re_de: P,
    }

    impl<U, P> NativeRs485<U, P>
    where
        U: Read<u8> + Write<u8>,
        P: OutputPin,
    {
        pub fn new(uart: U, re_de: P) -> Self {
            NativeRs485 { uart, re_de }
        }

        pub fn release(self) -> (U, P) {
            (self.uart, self.re_de)
        }
    }

    impl<U, P> Rs485Serial for NativeRs485<U, P>
    where
        U: Read<u8> + Write<u8>,
        P: OutputPin,
    {
        type Error = NativeError<U::Error, P::Error>;

        fn read_byte(&mut self) -> nb::Result<u8, Self::Error> {
            self.uart.read().map_err(|e| e.map(NativeError::Uart))
        }

        fn write_byte(&mut self, byte: u8) -> nb::Result<(), Self::Error> {
            self.uart.write(byte).map_err(|e| e.map(NativeError::Uart))
        }

        fn flush(&mut self) -> nb::Result<(), Self::Error> {
            self.uart.flush().map_err(|e| e.map(NativeError::Uart))
        }

        fn set_direction(&mut self, direction: Direction) -> Result<(), Self::Error> {
            match direction {
                Direction::Transmit => self.re_de.set_high(),
                Direction::Receive => self.re_de.set_low(),
            }
            .map_err(NativeError::Pin)
        }
    }
}
