// src/arbiter/transaction.rs

use super::{BusArbiter, BusMode, BusState};
use crate::common::{
    command,
    decoder,
    error::{BusError, DecodeError},
    hal_traits::{BusTimer, Rs485Serial},
    reading::Reading,
    sync::FrameSynchronizer,
};
use log::{debug, info, warn};

impl<IF> BusArbiter<IF>
where
    IF: Rs485Serial + BusTimer,
{
    /// Performs one poll: sends the read request (polled buses only), then
    /// listens for a frame of the configured layout until the reply
    /// timeout.
    ///
    /// On success the reading replaces the cached one. On any failure the
    /// cached reading is left untouched.
    pub fn poll_now(&mut self) -> Result<Reading, BusError<IF::Error>> {
        if let BusMode::Polled { register, value, scheme } = self.config.mode {
            let request = command::encode_poll(register, value, scheme);
            if let Err(e) = self.transmit(&request) {
                warn!("Poll request not sent: {}", e);
                return Err(e);
            }
        }

        let result = self.await_reading();
        self.state = BusState::Idle;

        if let Err(e) = &result {
            if e.is_timeout() {
                debug!("Poll timed out; keeping previous reading");
            } else {
                warn!("Poll failed: {}", e);
            }
        }
        result
    }

    /// Synchronizes and decodes until a frame validates or the deadline
    /// passes. Frames that fail validation are skipped; if one was seen, its
    /// rejection is reported instead of a bare timeout.
    fn await_reading(&mut self) -> Result<Reading, BusError<IF::Error>> {
        self.state = BusState::Listening;
        let deadline = self.interface.now() + self.config.reply_timeout;

        let layouts = [self.config.layout];
        let mut sync = FrameSynchronizer::new(&layouts);
        let mut rejected: Option<DecodeError> = None;

        loop {
            let frame = match sync.synchronize(&mut self.interface, deadline) {
                Ok(frame) => frame,
                Err(BusError::SyncTimeout) => {
                    return Err(rejected.map_or(BusError::SyncTimeout, BusError::Decode));
                }
                Err(e) => return Err(e),
            };

            match decoder::decode_raw(&frame) {
                Ok(reading) => {
                    sync.accept();
                    if self.last_reading.is_none() {
                        info!("First valid reading from {}", frame.layout().name);
                    }
                    self.last_reading = Some(reading);
                    self.last_sync_at = Some(frame.captured_at());
                    return Ok(reading);
                }
                Err(e) => {
                    debug!("Discarding {} frame: {}", frame.layout().name, e);
                    sync.reject();
                    rejected = Some(e);
                }
            }
        }
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbiter::ArbiterConfig;
    use crate::common::{
        hal_traits::Direction,
        layout::layouts,
        reading::{ReadingState, Temperature},
        test_support::{fixtures, MockInstant, MockInterface},
    };
    use core::time::Duration;

    /// Reply staged to arrive shortly after the poll request.
    fn mock_with_reply(reply: &[u8]) -> MockInterface {
        let mut mock = MockInterface::new();
        mock.stage_read_data_at(20_000, &[0x00, 0x7F]);
        mock.stage_read_data_at(20_000, reply);
        mock
    }

    #[test]
    fn test_poll_sends_request_then_decodes_reply() {
        let mut arb = BusArbiter::new(
            mock_with_reply(&fixtures::cs50_poll_reply()),
            ArbiterConfig::cs50_polled(),
        );
        assert_eq!(arb.current_reading(), ReadingState::NeverSynchronized);

        let reading = arb.poll_now().unwrap();
        assert_eq!(reading.temperature(1), Some(Temperature::from_tenths(215)));
        assert_eq!(reading.fan_level, Some(2));
        assert_eq!(arb.current_reading(), ReadingState::Valid(reading));
        assert!(arb.last_sync_at().is_some());
        assert_eq!(arb.bus_state(), BusState::Idle);

        let mock = arb.release();
        assert_eq!(mock.written(), std::vec![0xC3, 0x02, 0x00, 0x00, 0xC5]);
        assert_eq!(mock.direction, Direction::Receive);
    }

    #[test]
    fn test_poll_timeout_keeps_previous_reading() {
        let mut arb = BusArbiter::new(
            mock_with_reply(&fixtures::cs50_poll_reply()),
            ArbiterConfig::cs50_polled(),
        );
        let first = arb.poll_now().unwrap();
        let synced_at = arb.last_sync_at();

        // Nothing more on the line.
        let result = arb.poll_now();
        assert!(matches!(result, Err(BusError::SyncTimeout)));
        assert_eq!(arb.current_reading(), ReadingState::Valid(first));
        assert_eq!(arb.last_sync_at(), synced_at);
    }

    #[test]
    fn test_poll_timeout_is_bounded() {
        let config = ArbiterConfig::cs50_polled().with_reply_timeout(Duration::from_millis(300));
        let mut arb = BusArbiter::new(MockInterface::new(), config);
        assert!(matches!(arb.poll_now(), Err(BusError::SyncTimeout)));
        let now = arb.interface.now();
        assert!(now >= MockInstant::from_millis(300));
        assert!(now < MockInstant::from_millis(400));
        assert_eq!(arb.current_reading(), ReadingState::NeverSynchronized);
    }

    #[test]
    fn test_poll_reports_checksum_rejection() {
        let config = ArbiterConfig::cs50_polled()
            .with_layout(&layouts::CS50_POLL_REPLY_SUMMED)
            .with_reply_timeout(Duration::from_millis(200));
        let mut reply = fixtures::cs50_poll_reply_summed();
        reply[10] ^= 0x01;
        let mut arb = BusArbiter::new(mock_with_reply(&reply), config);

        let result = arb.poll_now();
        assert!(matches!(
            result,
            Err(BusError::Decode(DecodeError::ChecksumMismatch { .. }))
        ));
        assert_eq!(arb.current_reading(), ReadingState::NeverSynchronized);
    }

    #[test]
    fn test_poll_skips_corrupt_frame_and_takes_next() {
        let config = ArbiterConfig::cs50_polled().with_layout(&layouts::CS50_POLL_REPLY_SUMMED);
        let mut corrupt = fixtures::cs50_poll_reply_summed();
        corrupt[10] ^= 0x01;
        let mut mock = mock_with_reply(&corrupt);
        mock.stage_read_data(&fixtures::cs50_poll_reply_summed());
        let mut arb = BusArbiter::new(mock, config);

        let reading = arb.poll_now().unwrap();
        assert_eq!(reading.layout, "cs50-poll-reply-summed");
        assert_eq!(reading.temperature(1), Some(Temperature::from_tenths(215)));
    }

    #[test]
    fn test_stray_start_byte_does_not_hide_reply() {
        let config = ArbiterConfig::cs50_polled().with_layout(&layouts::CS50_POLL_REPLY_SUMMED);
        let mut mock = MockInterface::new();
        mock.stage_read_data_at(20_000, &[0xC3, 0x11, 0x22]);
        mock.stage_read_data_at(20_000, &fixtures::cs50_poll_reply_summed());
        let mut arb = BusArbiter::new(mock, config);

        let reading = arb.poll_now().unwrap();
        assert_eq!(reading.temperature(1), Some(Temperature::from_tenths(215)));
        assert_eq!(reading.operational_hours, Some(76_878));
        assert_eq!(arb.release().pending_reads(), 0);
    }

    #[test]
    fn test_broadcast_mode_listens_without_transmitting() {
        let mut mock = MockInterface::new();
        mock.stage_read_data(&[0x11; 30]);
        mock.stage_read_data(&fixtures::sl4r_status_line());
        let mut arb = BusArbiter::new(mock, ArbiterConfig::sl4r_broadcast());

        let reading = arb.poll_now().unwrap();
        assert_eq!(reading.fan_level, Some(2));
        assert_eq!(reading.heater_active, Some(true));
        assert_eq!(reading.operational_hours, Some(49_450));

        let mock = arb.release();
        assert!(mock.written().is_empty());
        assert!(mock.direction_log.is_empty());
    }

    #[test]
    fn test_poll_io_error_is_reported() {
        let mut mock = MockInterface::new();
        mock.fail_reads();
        let mut arb = BusArbiter::new(mock, ArbiterConfig::cs50_polled());
        assert!(matches!(arb.poll_now(), Err(BusError::Io(_))));
        assert_eq!(arb.bus_state(), BusState::Idle);
    }
}
