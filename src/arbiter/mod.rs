// src/arbiter/mod.rs

//! The bus arbiter: sole owner of the transceiver and of all mutable
//! protocol state.
//!
//! One instance drives one RS485 link from a single cooperative loop. Each
//! call to [`BusArbiter::service`] first tries to get a pending command onto
//! the bus, then runs the scheduled poll if it is due. Every wait inside is
//! bounded by a deadline from [`ArbiterConfig`]; a failure leaves the last
//! good reading and the pending command in place for the next cycle.

mod config;
mod injection;
mod io_helpers;
mod transaction;

pub use config::{ArbiterConfig, BusMode};

use crate::common::{
    command::{CommandFormat, EncodedFrame, InjectionTemplate, OutboundCommand},
    error::{BusError, EncodeError},
    hal_traits::{BusTimer, Rs485Serial},
    reading::{Reading, ReadingState},
};
use log::{debug, warn};

/// Direction/activity state of the bus as seen by the arbiter.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BusState {
    /// Receiver enabled, nothing in progress.
    Idle,
    /// Driver enabled; bytes may be on the wire.
    AssertedTransmit,
    /// Receiver enabled, waiting for a reply, status line or gap.
    Listening,
}

/// Outcome of one [`BusArbiter::service`] cycle.
#[derive(Debug)]
pub struct CycleReport<E: core::fmt::Debug> {
    /// `None` when no command was pending.
    pub command: Option<Result<OutboundCommand, BusError<E>>>,
    /// `None` when no poll was due (or the cycle stopped on an I/O error).
    pub poll: Option<Result<Reading, BusError<E>>>,
}

impl<E: core::fmt::Debug> CycleReport<E> {
    /// True when nothing in this cycle failed.
    pub fn is_clean(&self) -> bool {
        !matches!(self.command, Some(Err(_))) && !matches!(self.poll, Some(Err(_)))
    }
}

/// RS485 protocol engine for one controller link.
#[derive(Debug)]
pub struct BusArbiter<IF>
where
    IF: Rs485Serial + BusTimer,
{
    interface: IF,
    config: ArbiterConfig,
    state: BusState,
    last_reading: Option<Reading>,
    last_sync_at: Option<IF::Instant>,
    pending: Option<OutboundCommand>,
    /// Settings frame as last sent, for injection formats. Each command
    /// changes one byte of it, so earlier settings carry over.
    settings: Option<InjectionTemplate>,
    next_poll_at: Option<IF::Instant>,
}

impl<IF> BusArbiter<IF>
where
    IF: Rs485Serial + BusTimer,
{
    pub fn new(interface: IF, config: ArbiterConfig) -> Self {
        let settings = match config.command_format {
            CommandFormat::Injection(template) => Some(template),
            CommandFormat::Direct(_) => None,
        };
        BusArbiter {
            interface,
            config,
            state: BusState::Idle,
            last_reading: None,
            last_sync_at: None,
            pending: None,
            settings,
            next_poll_at: None,
        }
    }

    /// Gives the interface back.
    pub fn release(self) -> IF {
        self.interface
    }

    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    pub fn bus_state(&self) -> BusState {
        self.state
    }

    /// Last valid reading, or `NeverSynchronized` before the first success.
    pub fn current_reading(&self) -> ReadingState {
        match self.last_reading {
            Some(reading) => ReadingState::Valid(reading),
            None => ReadingState::NeverSynchronized,
        }
    }

    /// When the last valid reading was captured.
    pub fn last_sync_at(&self) -> Option<IF::Instant> {
        self.last_sync_at
    }

    /// Queues a register write, replacing any command not yet sent.
    ///
    /// Returns the command that was overwritten, if any.
    pub fn request_command(&mut self, register: u8, value: u8) -> Option<OutboundCommand> {
        self.submit(OutboundCommand::new(register, value))
    }

    /// Same as [`request_command`](Self::request_command) for a prepared command.
    pub fn submit(&mut self, command: OutboundCommand) -> Option<OutboundCommand> {
        let replaced = self.pending.replace(command);
        if let Some(old) = replaced {
            debug!("Pending command {:?} replaced by {:?}", old, command);
        }
        replaced
    }

    pub fn pending_command(&self) -> Option<OutboundCommand> {
        self.pending
    }

    /// Settings frame the next injected command builds on; `None` for direct
    /// write formats.
    pub fn settings(&self) -> Option<&InjectionTemplate> {
        self.settings.as_ref()
    }

    /// When the next scheduled poll is due; `None` before the first cycle.
    pub fn next_poll_at(&self) -> Option<IF::Instant> {
        self.next_poll_at
    }

    /// Runs one cycle of the control loop.
    ///
    /// A pending command is attempted first. The poll then runs if it is due,
    /// whether or not the command got through, unless the command attempt
    /// hit an I/O error: a broken link is reported once per cycle.
    pub fn service(&mut self) -> CycleReport<IF::Error> {
        let cycle_start = self.interface.now();

        let command = self.send_pending();

        if let Some(Err(BusError::Io(ref e))) = command {
            warn!("Skipping poll this cycle after I/O error: {:?}", e);
            return CycleReport { command, poll: None };
        }

        let poll_due = self.next_poll_at.map_or(true, |due| cycle_start >= due);
        let poll = if poll_due {
            self.next_poll_at = Some(cycle_start + self.config.poll_interval);
            Some(self.poll_now())
        } else {
            None
        };

        CycleReport { command, poll }
    }

    /// Sends the pending command now, by the path the bus mode requires.
    ///
    /// Returns `None` when nothing is pending. On success the command is
    /// cleared and returned. On failure it stays pending, except when it
    /// cannot be encoded at all: that error is reported and the command
    /// dropped.
    pub fn send_pending(&mut self) -> Option<Result<OutboundCommand, BusError<IF::Error>>> {
        let command = self.pending?;

        let (frame, next_settings) = match self.encode_command(&command) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Dropping unencodable command {:?}: {}", command, e);
                self.pending = None;
                return Some(Err(e.into()));
            }
        };

        let result = match self.config.mode {
            BusMode::Polled { .. } => self.transmit(&frame),
            BusMode::Broadcast { framing } => self.inject(&frame, framing),
        };
        self.state = BusState::Idle;

        Some(match result {
            Ok(()) => {
                debug!("Command {:?} sent", command);
                if next_settings.is_some() {
                    self.settings = next_settings;
                }
                self.pending = None;
                Ok(command)
            }
            Err(e) => {
                warn!("Command {:?} not sent, keeping it pending: {}", command, e);
                Err(e)
            }
        })
    }

    /// Frame for `command`, plus the settings it leaves behind when the
    /// format is a settings template. Settings are only committed once the
    /// frame is on the wire.
    fn encode_command(
        &self,
        command: &OutboundCommand,
    ) -> Result<(EncodedFrame, Option<InjectionTemplate>), EncodeError> {
        match self.settings {
            Some(current) => {
                let next = current.with_register(command.register, command.value)?;
                Ok((next.frame(), Some(next)))
            }
            None => self.config.command_format.encode(command).map(|frame| (frame, None)),
        }
    }
}
