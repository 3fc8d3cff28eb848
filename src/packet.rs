//! CC1101 packet mode operation
//!
//! Strobe sequencing, FIFO handling and the GDO0 handshake used for framing,
//! plus the `radio` trait implementations built on top of these.
//!
//! Copyright 2019 Ryan Kurte

use core::fmt::Debug;

use crate::base::{poll_until, Base as Cc1101Base, Wait};
use crate::device::regs::{self, Register, Status, Strobe};
use crate::device::{self, Cc1101Channel, PacketInfo, RadioMode};
use crate::{Cc1101, Error};

/// Result of a handshaken transmission
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum TxOutcome {
    /// GDO0 signalled both start and end of packet
    Confirmed,
    /// Packet started but end of packet was not observed in time
    Unconfirmed,
}

impl<Base, CommsError, PinError> Cc1101<Base, CommsError, PinError>
where
    Base: Cc1101Base<CommsError, PinError>,
{
    /// Load length prefix and payload into the TX FIFO
    fn load_tx_fifo(&mut self, data: &[u8]) -> Result<(), Error<CommsError, PinError>> {
        if data.len() > device::MAX_PAYLOAD {
            warn!("Payload of {} bytes exceeds maximum of {}", data.len(), device::MAX_PAYLOAD);
            return Err(Error::BufferSize);
        }

        self.hal.write_reg(Register::FIFO, data.len() as u8)?;
        self.hal.write_burst(Register::FIFO, data)?;

        Ok(())
    }

    /// Idle then start transmitting the FIFO contents
    fn start_tx(&mut self) -> Result<(), Error<CommsError, PinError>> {
        self.hal.strobe(Strobe::SIDLE)?;
        self.hal.strobe(Strobe::STX)?;
        self.mode = RadioMode::Transmitting;
        Ok(())
    }

    /// Idle, flush and restart receive
    fn rearm_rx(&mut self) -> Result<(), Error<CommsError, PinError>> {
        self.hal.strobe(Strobe::SIDLE)?;
        self.hal.strobe(Strobe::SFRX)?;
        self.hal.strobe(Strobe::SRX)?;
        self.mode = RadioMode::Receiving;
        Ok(())
    }

    /// Send a packet using the GDO0 sync handshake
    ///
    /// Fails with `HandshakeTimeout` (after flushing the TX FIFO) if the packet never starts,
    /// and reports `Unconfirmed` if the end of packet is not observed.
    pub fn transmit(&mut self, data: &[u8]) -> Result<TxOutcome, Error<CommsError, PinError>> {
        if !self.hal.has_gdo0() {
            return Err(Error::Unwired);
        }

        debug!("Transmit {} bytes", data.len());

        self.load_tx_fifo(data)?;
        self.start_tx()?;

        // Sync word / preamble started
        let started = poll_until::<_, _, CommsError, PinError>(
            &mut self.hal,
            device::TX_HANDSHAKE_TIMEOUT_MS,
            |h| h.gdo0_is_high(),
        )?;
        if started == Wait::TimedOut {
            warn!("Transmit handshake timeout, TX never started (check GDO0 wiring)");
            self.hal.strobe(Strobe::SFTX)?;
            return Err(Error::HandshakeTimeout);
        }

        // End of packet
        let ended = poll_until::<_, _, CommsError, PinError>(&mut self.hal, device::TX_HANDSHAKE_TIMEOUT_MS, |h| {
            h.gdo0_is_high().map(|high| !high)
        })?;
        let outcome = match ended {
            Wait::Ready => TxOutcome::Confirmed,
            Wait::TimedOut => {
                warn!("Transmit end of packet timeout, GDO0 stuck high");
                TxOutcome::Unconfirmed
            }
        };

        self.hal.strobe(Strobe::SFTX)?;

        Ok(outcome)
    }

    /// Send a packet without the GDO0 handshake, waiting a fixed time before flushing
    pub fn transmit_timed(&mut self, data: &[u8], duration_ms: u32) -> Result<(), Error<CommsError, PinError>> {
        debug!("Transmit {} bytes (timed {} ms)", data.len(), duration_ms);

        self.load_tx_fifo(data)?;
        self.start_tx()?;

        self.hal.delay_ms(duration_ms);

        self.hal.strobe(Strobe::SFTX)?;

        Ok(())
    }

    /// Read a pending packet into the provided buffer and re-arm receive
    ///
    /// Returns zero bytes (after re-arming) when nothing is pending.
    pub fn receive(&mut self, buff: &mut [u8]) -> Result<(usize, PacketInfo), Error<CommsError, PinError>> {
        let pending = self.hal.read_status(Status::RXBYTES)? & regs::NUM_BYTES_MASK;

        if pending == 0 {
            self.rearm_rx()?;
            return Ok((0, PacketInfo::default()));
        }

        let mut len = self.hal.read_reg(Register::FIFO)? as usize;

        // Never read past what the chip holds, a corrupt length byte would underrun the FIFO
        let available = (pending as usize).saturating_sub(1 + device::RX_STATUS_LEN);
        if len > available {
            warn!("Received length {} exceeds {} pending bytes, truncating", len, available);
            len = available;
        }

        let n = if len > buff.len() {
            warn!("Received length {} exceeds buffer of {}, truncating", len, buff.len());
            buff.len()
        } else {
            len
        };

        self.hal.read_burst(Register::FIFO, &mut buff[..n])?;

        // Drop the remainder so the status bytes line up
        let mut scratch = [0u8; 8];
        let mut remaining = len - n;
        while remaining > 0 {
            let chunk = remaining.min(scratch.len());
            self.hal.read_burst(Register::FIFO, &mut scratch[..chunk])?;
            remaining -= chunk;
        }

        let mut status = [0u8; device::RX_STATUS_LEN];
        self.hal.read_burst(Register::FIFO, &mut status)?;
        let info = PacketInfo::from_status(status);

        trace!("Received {} bytes: {:02x?} ({:?})", n, &buff[..n], info);

        self.rearm_rx()?;

        Ok((n, info))
    }

    /// Check the CRC_OK flag of the last packet, flushing and re-arming receive on failure
    pub fn check_crc(&mut self) -> Result<bool, Error<CommsError, PinError>> {
        let lqi = self.hal.read_status(Status::LQI)?;

        if lqi & regs::LQI_CRC_OK != 0 {
            return Ok(true);
        }

        warn!("Received packet CRC check failed");
        self.rearm_rx()?;

        Ok(false)
    }

    /// Enter receive mode
    pub fn set_rx(&mut self) -> Result<(), Error<CommsError, PinError>> {
        self.hal.strobe(Strobe::SIDLE)?;
        self.hal.strobe(Strobe::SRX)?;
        self.mode = RadioMode::Receiving;
        Ok(())
    }

    /// Retune then enter receive mode
    pub fn set_rx_at(&mut self, mhz: f32) -> Result<(), Error<CommsError, PinError>> {
        self.hal.strobe(Strobe::SIDLE)?;
        self.set_frequency(mhz)?;
        self.hal.strobe(Strobe::SRX)?;
        self.mode = RadioMode::Receiving;
        Ok(())
    }

    /// Enter transmit mode
    pub fn set_tx(&mut self) -> Result<(), Error<CommsError, PinError>> {
        self.start_tx()
    }

    /// Retune then enter transmit mode
    pub fn set_tx_at(&mut self, mhz: f32) -> Result<(), Error<CommsError, PinError>> {
        self.hal.strobe(Strobe::SIDLE)?;
        self.set_frequency(mhz)?;
        self.hal.strobe(Strobe::STX)?;
        self.mode = RadioMode::Transmitting;
        Ok(())
    }

    /// Exit RX / TX
    pub fn set_idle(&mut self) -> Result<(), Error<CommsError, PinError>> {
        self.hal.strobe(Strobe::SIDLE)?;
        self.mode = RadioMode::Idle;
        Ok(())
    }

    /// Power down, the chip sleeps once chip select is released
    pub fn sleep(&mut self) -> Result<(), Error<CommsError, PinError>> {
        debug!("Entering power down");
        self.mode = RadioMode::Idle;
        self.hal.strobe(Strobe::SIDLE)?;
        self.hal.strobe(Strobe::SPWD)?;
        Ok(())
    }

    /// Poll the RX FIFO, entering receive if required
    ///
    /// When data is pending, waits `settle_ms` for the packet to complete.
    pub fn check_rx_fifo(&mut self, settle_ms: u32) -> Result<bool, Error<CommsError, PinError>> {
        if self.mode != RadioMode::Receiving {
            self.set_rx()?;
        }

        if self.hal.read_status(Status::RXBYTES)? & regs::NUM_BYTES_MASK == 0 {
            return Ok(false);
        }

        self.hal.delay_ms(settle_ms);
        Ok(true)
    }

    /// Check GDO0 for a packet in progress, waiting for it to complete
    pub fn check_receive_flag(&mut self) -> Result<bool, Error<CommsError, PinError>> {
        if self.mode != RadioMode::Receiving {
            self.set_rx()?;
        }

        if !self.hal.gdo0_is_high()? {
            return Ok(false);
        }

        let ended = poll_until::<_, _, CommsError, PinError>(&mut self.hal, device::RX_END_TIMEOUT_MS, |h| {
            h.gdo0_is_high().map(|high| !high)
        })?;
        if ended == Wait::TimedOut {
            warn!("Receive end of packet timeout, GDO0 stuck high");
        }

        Ok(true)
    }
}

impl<Base, CommsError, PinError> radio::Transmit for Cc1101<Base, CommsError, PinError>
where
    Base: Cc1101Base<CommsError, PinError>,
    CommsError: Debug,
    PinError: Debug,
{
    type Error = Error<CommsError, PinError>;

    /// Start sending a packet
    fn start_transmit(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        debug!("Starting send (data: {:?})", data);

        self.load_tx_fifo(data)?;
        self.start_tx()
    }

    /// Check for packet send completion, the chip returns to idle once sent
    fn check_transmit(&mut self) -> Result<bool, Self::Error> {
        let state = self.hal.read_status(Status::MARCSTATE)? & regs::MARCSTATE_MASK;

        if state != regs::MARCSTATE_IDLE {
            return Ok(false);
        }

        debug!("Send complete");
        self.hal.strobe(Strobe::SFTX)?;
        self.mode = RadioMode::Idle;

        Ok(true)
    }
}

impl<Base, CommsError, PinError> radio::Receive for Cc1101<Base, CommsError, PinError>
where
    Base: Cc1101Base<CommsError, PinError>,
    CommsError: Debug,
    PinError: Debug,
{
    type Info = PacketInfo;
    type Error = Error<CommsError, PinError>;

    fn start_receive(&mut self) -> Result<(), Self::Error> {
        debug!("Starting receive");
        self.set_rx()
    }

    /// Check for pending received data
    ///
    /// On RX FIFO overflow the restart option flushes and re-arms receive (returning Ok(false)),
    /// otherwise the overflow is reported as a buffer size error.
    fn check_receive(&mut self, restart: bool) -> Result<bool, Self::Error> {
        let rxbytes = self.hal.read_status(Status::RXBYTES)?;

        if rxbytes & !regs::NUM_BYTES_MASK != 0 {
            warn!("RX FIFO overflow");
            return match restart {
                true => self.rearm_rx().map(|_| false),
                false => Err(Error::BufferSize),
            };
        }

        Ok(rxbytes & regs::NUM_BYTES_MASK != 0)
    }

    /// Fetch a received packet
    fn get_received(&mut self, buff: &mut [u8]) -> Result<(usize, Self::Info), Self::Error> {
        self.receive(buff)
    }
}

impl<Base, CommsError, PinError> radio::Rssi for Cc1101<Base, CommsError, PinError>
where
    Base: Cc1101Base<CommsError, PinError>,
    CommsError: Debug,
    PinError: Debug,
{
    type Error = Error<CommsError, PinError>;

    /// Poll for the current channel RSSI, this should only be called in receive mode
    fn poll_rssi(&mut self) -> Result<i16, Self::Error> {
        self.rssi()
    }
}

impl<Base, CommsError, PinError> radio::Power for Cc1101<Base, CommsError, PinError>
where
    Base: Cc1101Base<CommsError, PinError>,
    CommsError: Debug,
    PinError: Debug,
{
    type Error = Error<CommsError, PinError>;

    /// Set output power in dBm
    fn set_power(&mut self, power: i8) -> Result<(), Self::Error> {
        Cc1101::set_power(self, power)
    }
}

impl<Base, CommsError, PinError> radio::Channel for Cc1101<Base, CommsError, PinError>
where
    Base: Cc1101Base<CommsError, PinError>,
    CommsError: Debug,
    PinError: Debug,
{
    type Channel = Cc1101Channel;
    type Error = Error<CommsError, PinError>;

    /// Set the channel for future receive or transmit operations
    fn set_channel(&mut self, channel: &Cc1101Channel) -> Result<(), Self::Error> {
        debug!("Setting channel: {:?}", channel);

        self.set_frequency(channel.frequency_mhz)?;
        self.set_data_rate(channel.data_rate_kbps)?;
        self.set_deviation(channel.deviation_khz)?;
        self.set_rx_bandwidth(channel.rx_bandwidth_khz)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Config;
    use crate::mock::{Gdo0, MockBase, MockError};
    use radio::{Receive as _, Transmit as _};

    type Radio = Cc1101<MockBase, MockError, MockError>;

    fn radio() -> Radio {
        let mut r = Radio::new(MockBase::new(), &Config::default()).unwrap();
        r.hal.clear_log();
        r
    }

    #[test]
    fn transmit_confirmed() {
        let mut r = radio();
        r.hal.gdo0 = Gdo0::Packet { rise_ms: 3, fall_ms: 20 };

        assert_eq!(r.transmit(&[0xaa, 0xbb, 0xcc]), Ok(TxOutcome::Confirmed));

        assert_eq!(r.hal.tx_log, &[3, 0xaa, 0xbb, 0xcc]);
        assert_eq!(r.hal.strobes, &[Strobe::SIDLE, Strobe::STX, Strobe::SFTX]);
        assert!(r.hal.tx_fifo.is_empty());
        assert_eq!(r.mode(), RadioMode::Transmitting);
    }

    #[test]
    fn transmit_start_timeout_flushes_fifo() {
        let mut r = radio();
        r.hal.gdo0 = Gdo0::Stuck(false);

        let start = r.hal.clock;
        assert_eq!(r.transmit(&[1, 2, 3]), Err(Error::HandshakeTimeout));

        assert_eq!(r.hal.strobes.last(), Some(&Strobe::SFTX));
        assert!(r.hal.tx_fifo.is_empty());
        assert_eq!(r.mode(), RadioMode::Transmitting);

        let waited = r.hal.clock - start;
        assert!(waited > device::TX_HANDSHAKE_TIMEOUT_MS as u64);
        assert!(waited < 2 * device::TX_HANDSHAKE_TIMEOUT_MS as u64);
    }

    #[test]
    fn transmit_end_timeout_is_unconfirmed() {
        let mut r = radio();
        r.hal.gdo0 = Gdo0::Stuck(true);

        assert_eq!(r.transmit(&[1]), Ok(TxOutcome::Unconfirmed));
        assert_eq!(r.hal.strobes.last(), Some(&Strobe::SFTX));
        assert!(r.hal.tx_fifo.is_empty());
    }

    #[test]
    fn transmit_requires_gdo0() {
        let mut r = radio();
        r.hal.gdo0 = Gdo0::Unwired;

        assert_eq!(r.transmit(&[1]), Err(Error::Unwired));
        assert!(r.hal.headers().is_empty());
    }

    #[test]
    fn transmit_rejects_oversized_payload() {
        let mut r = radio();
        r.hal.gdo0 = Gdo0::Stuck(false);

        let data = [0u8; device::MAX_PAYLOAD + 1];
        assert_eq!(r.transmit(&data), Err(Error::BufferSize));
        assert!(r.hal.tx_fifo.is_empty());
        assert!(r.hal.strobes.is_empty());
    }

    #[test]
    fn timed_transmit() {
        let mut r = radio();
        r.hal.gdo0 = Gdo0::Unwired;

        let start = r.hal.clock;
        r.transmit_timed(b"hello", 50).unwrap();

        assert!(r.hal.clock - start >= 50);
        assert_eq!(r.hal.tx_log, &[5, b'h', b'e', b'l', b'l', b'o']);
        assert_eq!(r.hal.strobes, &[Strobe::SIDLE, Strobe::STX, Strobe::SFTX]);
    }

    #[test]
    fn receive_nothing_pending_rearms() {
        let mut r = radio();
        let mut buff = [0u8; 64];

        let (n, _info) = r.receive(&mut buff).unwrap();

        assert_eq!(n, 0);
        assert_eq!(r.mode(), RadioMode::Receiving);
        assert_eq!(r.hal.strobes, &[Strobe::SIDLE, Strobe::SFRX, Strobe::SRX]);
    }

    #[test]
    fn receive_packet() {
        let mut r = radio();
        r.hal.rx_fifo.extend([3, 0x11, 0x22, 0x33, 0xC8, 0x9E].iter());

        let mut buff = [0u8; 64];
        let (n, info) = r.receive(&mut buff).unwrap();

        assert_eq!(&buff[..n], &[0x11, 0x22, 0x33]);
        assert_eq!(info.rssi, -102);
        assert_eq!(info.lqi, 0x1E);
        assert!(info.crc_ok);

        assert_eq!(r.mode(), RadioMode::Receiving);
        assert!(r.hal.rx_fifo.is_empty());
    }

    #[test]
    fn receive_truncates_to_buffer() {
        let mut r = radio();
        r.hal.rx_fifo.extend([4, 1, 2, 3, 4, 0x00, 0x80].iter());

        let mut buff = [0u8; 2];
        let (n, info) = r.receive(&mut buff).unwrap();

        assert_eq!(n, 2);
        assert_eq!(buff, [1, 2]);
        assert!(info.crc_ok);
        assert!(r.hal.rx_fifo.is_empty());
    }

    #[test]
    fn receive_caps_length_to_pending_bytes() {
        let mut r = radio();
        // Length byte claims more than the FIFO holds
        r.hal.rx_fifo.extend([10, 0x11, 0x22, 0xC8, 0x9E].iter());

        let mut buff = [0u8; 64];
        let (n, info) = r.receive(&mut buff).unwrap();

        assert_eq!(&buff[..n], &[0x11, 0x22]);
        assert_eq!(info.rssi, -102);
        assert!(info.crc_ok);
        assert!(r.hal.rx_fifo.is_empty());
        assert_eq!(r.mode(), RadioMode::Receiving);
    }

    #[test]
    fn crc_failure_rearms() {
        let mut r = radio();

        r.hal.lqi = 0x80 | 0x20;
        assert_eq!(r.check_crc(), Ok(true));
        assert!(r.hal.strobes.is_empty());

        r.hal.lqi = 0x20;
        assert_eq!(r.check_crc(), Ok(false));
        assert_eq!(r.hal.strobes, &[Strobe::SIDLE, Strobe::SFRX, Strobe::SRX]);
        assert_eq!(r.mode(), RadioMode::Receiving);
    }

    #[test]
    fn sleep_powers_down() {
        let mut r = radio();
        r.set_rx().unwrap();
        r.sleep().unwrap();

        assert_eq!(r.mode(), RadioMode::Idle);
        assert_eq!(&r.hal.strobes[2..], &[Strobe::SIDLE, Strobe::SPWD]);
    }

    #[test]
    fn mode_transitions_pass_through_idle() {
        let mut r = radio();

        r.set_tx().unwrap();
        assert_eq!(r.mode(), RadioMode::Transmitting);
        r.set_rx_at(868.3).unwrap();
        assert_eq!(r.mode(), RadioMode::Receiving);
        r.set_tx_at(433.92).unwrap();
        r.set_idle().unwrap();
        assert_eq!(r.mode(), RadioMode::Idle);

        assert_eq!(
            r.hal.strobes,
            &[
                Strobe::SIDLE, Strobe::STX,
                Strobe::SIDLE, Strobe::SRX,
                Strobe::SIDLE, Strobe::STX,
                Strobe::SIDLE,
            ]
        );
    }

    #[test]
    fn check_rx_fifo_arms_receive() {
        let mut r = radio();

        assert_eq!(r.check_rx_fifo(10), Ok(false));
        assert_eq!(r.mode(), RadioMode::Receiving);

        r.hal.rx_fifo.extend([1, 0xff, 0, 0].iter());
        let start = r.hal.clock;
        assert_eq!(r.check_rx_fifo(10), Ok(true));
        assert!(r.hal.clock - start >= 10);

        // Only the first call entered receive
        assert_eq!(r.hal.strobes, &[Strobe::SIDLE, Strobe::SRX]);
    }

    #[test]
    fn check_receive_flag_waits_for_packet_end() {
        let mut r = radio();

        r.hal.gdo0 = Gdo0::Stuck(false);
        assert_eq!(r.check_receive_flag(), Ok(false));

        r.hal.gdo0 = Gdo0::Stuck(true);
        let start = r.hal.clock;
        assert_eq!(r.check_receive_flag(), Ok(true));
        assert!(r.hal.clock - start > device::RX_END_TIMEOUT_MS as u64);
    }

    #[test]
    fn radio_transmit_completes_on_idle() {
        let mut r = radio();
        r.hal.tx_duration_ms = 5;

        r.start_transmit(&[1, 2]).unwrap();
        assert_eq!(r.check_transmit(), Ok(false));

        r.hal.delay_ms(10);
        assert_eq!(r.check_transmit(), Ok(true));
        assert_eq!(r.mode(), RadioMode::Idle);
        assert!(r.hal.tx_fifo.is_empty());
    }

    #[test]
    fn radio_receive() {
        let mut r = radio();

        r.start_receive().unwrap();
        assert_eq!(r.check_receive(false), Ok(false));

        r.hal.rx_fifo.extend([2, 0xab, 0xcd, 0x10, 0x85].iter());
        assert_eq!(r.check_receive(false), Ok(true));

        let mut buff = [0u8; 32];
        let (n, info) = r.get_received(&mut buff).unwrap();
        assert_eq!(&buff[..n], &[0xab, 0xcd]);
        assert_eq!(info.rssi, -66);
        assert!(info.crc_ok);
    }

    #[test]
    fn radio_receive_overflow() {
        let mut r = radio();
        r.start_receive().unwrap();
        r.hal.rx_overflow = true;

        assert_eq!(r.check_receive(false), Err(Error::BufferSize));
        assert_eq!(r.check_receive(true), Ok(false));
        assert!(!r.hal.rx_overflow);
    }

    #[test]
    fn radio_channel() {
        use radio::Channel as _;

        let mut r = radio();
        let ch = Cc1101Channel {
            frequency_mhz: 868.3,
            data_rate_kbps: 38.4,
            deviation_khz: 20.0,
            rx_bandwidth_khz: 100.0,
        };
        r.set_channel(&ch).unwrap();

        assert!((r.frequency_word().unwrap().to_mhz() - 868.3).abs() < 0.001);
        assert!((r.data_rate().unwrap() - 38.4).abs() < 0.4);
        assert!(r.deviation().unwrap() >= 20.0);
        assert!(r.rx_bandwidth().unwrap() <= 101.6);
    }
}
