// src/arbiter/config.rs

use crate::common::{
    checksum::ChecksumScheme,
    command::{CommandFormat, InjectionTemplate},
    layout::{layouts, BroadcastFraming, FrameLayout},
    timing,
};
use core::time::Duration;

/// How the controller uses the bus.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BusMode {
    /// The bridge is master: it sends a read request and the controller
    /// answers. Writes go out directly; the line is quiet between polls.
    Polled {
        register: u8,
        value: u8,
        scheme: ChecksumScheme,
    },
    /// The controller broadcasts on its own. Readings are picked out of the
    /// stream and writes are injected into the gap after a broadcast line.
    Broadcast { framing: BroadcastFraming },
}

/// Every tunable of the bus arbiter.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ArbiterConfig {
    pub mode: BusMode,
    pub layout: &'static FrameLayout,
    pub command_format: CommandFormat,
    pub baud_rate: u32,
    pub poll_interval: Duration,
    pub reply_timeout: Duration,
    pub injection_timeout: Duration,
    /// Settle time after asserting RE/DE before the first byte.
    pub direction_guard: Duration,
}

impl ArbiterConfig {
    /// CS50 panel answering direct polls at 19200 baud.
    pub const fn cs50_polled() -> Self {
        ArbiterConfig {
            mode: BusMode::Polled {
                register: 0x00,
                value: 0x00,
                scheme: ChecksumScheme::AdditiveSum,
            },
            layout: &layouts::CS50_POLL_REPLY,
            command_format: CommandFormat::Direct(ChecksumScheme::AdditiveSum),
            baud_rate: timing::BAUD_19200,
            poll_interval: timing::POLL_INTERVAL,
            reply_timeout: timing::REPLY_TIMEOUT,
            injection_timeout: timing::INJECTION_TIMEOUT,
            direction_guard: timing::DIRECTION_GUARD,
        }
    }

    /// SL4R unit behind a CS50 panel that broadcasts continuously.
    pub const fn sl4r_broadcast() -> Self {
        ArbiterConfig {
            mode: BusMode::Broadcast { framing: BroadcastFraming::SL4R },
            layout: &layouts::SL4R_STATUS_LINE,
            command_format: CommandFormat::Injection(InjectionTemplate::SL4R_SETTINGS),
            baud_rate: timing::BAUD_19200,
            poll_interval: timing::POLL_INTERVAL,
            reply_timeout: timing::REPLY_TIMEOUT,
            injection_timeout: timing::INJECTION_TIMEOUT,
            direction_guard: timing::DIRECTION_GUARD,
        }
    }

    /// Swaps the layout for a built-in one selected by name.
    pub fn with_layout_named(self, name: &str) -> Option<Self> {
        layouts::by_name(name).map(|layout| self.with_layout(layout))
    }

    pub fn with_layout(mut self, layout: &'static FrameLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_command_format(mut self, format: CommandFormat) -> Self {
        self.command_format = format;
        self
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn with_injection_timeout(mut self, timeout: Duration) -> Self {
        self.injection_timeout = timeout;
        self
    }

    pub fn with_direction_guard(mut self, guard: Duration) -> Self {
        self.direction_guard = guard;
        self
    }
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self::cs50_polled()
    }
}
