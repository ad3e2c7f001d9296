// src/arbiter/injection.rs

//! Writing into a bus the controller is already driving.
//!
//! The arbiter listens until a complete broadcast line has gone by, then
//! transmits in the gap that follows it. Nothing is written unless the line
//! prefix was seen and its announced payload fully consumed.

use super::{BusArbiter, BusState};
use crate::common::{
    error::BusError,
    gap::{GapScanner, GapState},
    hal_traits::{BusTimer, Rs485Serial},
    layout::BroadcastFraming,
    timing,
};
use log::{debug, trace};

impl<IF> BusArbiter<IF>
where
    IF: Rs485Serial + BusTimer,
{
    /// Waits for the gap after the next broadcast line, then transmits
    /// `frame`. Gives up with `InjectionTimeout` once the configured
    /// injection timeout passes.
    pub(super) fn inject(
        &mut self,
        frame: &[u8],
        framing: BroadcastFraming,
    ) -> Result<(), BusError<IF::Error>> {
        self.wait_for_gap(framing)?;
        debug!("Gap found, injecting {} bytes", frame.len());
        self.transmit(frame)
    }

    fn wait_for_gap(&mut self, framing: BroadcastFraming) -> Result<(), BusError<IF::Error>> {
        self.state = BusState::Listening;
        let deadline = self.interface.now() + self.config.injection_timeout;
        let mut scanner = GapScanner::new(framing);

        let outcome = loop {
            match self.interface.read_byte() {
                Ok(byte) => {
                    trace!("rx {:#04x}", byte);
                    if scanner.feed(byte) == GapState::Gap {
                        break Ok(());
                    }
                    if self.interface.now() >= deadline {
                        break Err(BusError::InjectionTimeout);
                    }
                }
                Err(nb::Error::WouldBlock) => {
                    if self.interface.now() >= deadline {
                        break Err(BusError::InjectionTimeout);
                    }
                    self.interface.delay_us(timing::IO_RETRY_DELAY_US);
                }
                Err(nb::Error::Other(e)) => break Err(BusError::Io(e)),
            }
        };

        if outcome.is_err() {
            debug!("No gap found, scanner stopped in {:?}", scanner.state());
            self.state = BusState::Idle;
        }
        outcome
    }
}
