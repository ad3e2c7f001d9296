// src/arbiter/io_helpers.rs

use super::{BusArbiter, BusState};
use crate::common::{
    error::BusError,
    hal_traits::{BusTimer, Direction, Rs485Serial},
    timing,
};
use log::{debug, trace, warn};
use nb::Result as NbResult;

// Implementation block for I/O related helpers
impl<IF> BusArbiter<IF>
where
    IF: Rs485Serial + BusTimer,
{
    /// Executes a non-blocking I/O operation (`f`) repeatedly until it
    /// stops returning `WouldBlock`, returning the final result or
    /// `on_timeout` once `deadline` has passed.
    pub(super) fn execute_blocking_io_until<FN, T>(
        &mut self,
        deadline: IF::Instant,
        on_timeout: BusError<IF::Error>,
        mut f: FN,
    ) -> Result<T, BusError<IF::Error>>
    where
        FN: FnMut(&mut IF) -> NbResult<T, IF::Error>,
    {
        loop {
            match f(&mut self.interface) {
                Ok(result) => return Ok(result),
                Err(nb::Error::WouldBlock) => {
                    if self.interface.now() >= deadline {
                        return Err(on_timeout);
                    }
                    self.interface.delay_us(timing::IO_RETRY_DELAY_US);
                }
                Err(nb::Error::Other(e)) => return Err(BusError::Io(e)),
            }
        }
    }

    /// Drives `frame` onto the bus.
    ///
    /// Asserts transmit direction, waits the guard delay, writes and flushes,
    /// then hands the line back to the receiver. The line is released even
    /// when the write or flush fails.
    pub(super) fn transmit(&mut self, frame: &[u8]) -> Result<(), BusError<IF::Error>> {
        if let Err(e) = self.interface.set_direction(Direction::Transmit) {
            // The pin may have toggled anyway.
            let _ = self.interface.set_direction(Direction::Receive);
            self.state = BusState::Idle;
            return Err(BusError::Io(e));
        }
        self.state = BusState::AssertedTransmit;

        let guard_us = u32::try_from(self.config.direction_guard.as_micros()).unwrap_or(u32::MAX);
        self.interface.delay_us(guard_us);

        let sent = self.write_and_flush(frame);
        let released = self.interface.set_direction(Direction::Receive);
        self.state = BusState::Idle;

        match (sent, released) {
            (Ok(()), Ok(())) => {
                debug!("tx {} bytes", frame.len());
                Ok(())
            }
            (Ok(()), Err(e)) => Err(BusError::Io(e)),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_err)) => {
                warn!("Releasing the line after a failed transmit also failed: {:?}", release_err);
                Err(e)
            }
        }
    }

    fn write_and_flush(&mut self, frame: &[u8]) -> Result<(), BusError<IF::Error>> {
        let budget = timing::transmit_budget(self.config.baud_rate, frame.len());

        let write_deadline = self.interface.now() + budget;
        for byte in frame {
            trace!("tx {:#04x}", byte);
            self.execute_blocking_io_until(write_deadline, BusError::WriteTimeout, |iface| {
                iface.write_byte(*byte)
            })?;
        }

        let flush_deadline = self.interface.now() + budget;
        self.execute_blocking_io_until(flush_deadline, BusError::FlushTimeout, |iface| iface.flush())
    }
}
