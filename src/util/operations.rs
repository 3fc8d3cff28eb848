use std::time::Duration;

use log::{debug, info, warn};

use radio_cc1101::base::Base;
use radio_cc1101::prelude::*;
use radio_cc1101::transceiver::ChipTransceiver;

use super::options::*;

pub fn do_command<B, CE, PE>(radio: Cc1101<B, CE, PE>, command: Command) -> Result<(), Error<CE, PE>>
where
    B: Base<CE, PE>,
    CE: std::fmt::Debug,
    PE: std::fmt::Debug,
{
    match command {
        Command::ChipVersion => do_version(radio),
        Command::Transmit(config) => do_transmit(radio, &config),
        Command::Receive(config) => {
            let mut buff = [0u8; 64];
            do_receive(radio, &mut buff, config.continuous, *config.poll_interval).map(|_| ())
        }
        Command::Rssi(config) => do_rssi(radio, config.continuous, *config.period),
        Command::Sweep(config) => do_sweep(radio, &config),
    }
}

pub fn do_version<B, CE, PE>(mut radio: Cc1101<B, CE, PE>) -> Result<(), Error<CE, PE>>
where
    B: Base<CE, PE>,
{
    let part = radio.part_number()?;
    let version = radio.version()?;

    info!("Part number: 0x{:02X} version: 0x{:02X}", part, version);

    Ok(())
}

pub fn do_transmit<B, CE, PE>(mut radio: Cc1101<B, CE, PE>, config: &Transmit) -> Result<(), Error<CE, PE>>
where
    B: Base<CE, PE>,
{
    radio.set_power(config.power)?;

    let data = config.data.as_bytes();

    loop {
        match &config.timed {
            Some(t) => {
                radio.transmit_timed(data, t.as_millis() as u32)?;
                debug!("Send complete (timed)");
            }
            None => match radio.transmit(data) {
                Ok(TxOutcome::Confirmed) => debug!("Send complete"),
                Ok(TxOutcome::Unconfirmed) => warn!("Send unconfirmed"),
                Err(Error::HandshakeTimeout) => warn!("Send failed, transmit never started"),
                Err(e) => return Err(e),
            },
        }

        if !config.continuous {
            break;
        }
        std::thread::sleep(*config.period);
    }

    Ok(())
}

pub fn do_receive<T, I, E>(mut radio: T, buff: &mut [u8], continuous: bool, poll_interval: Duration) -> Result<usize, E>
where
    T: radio::Receive<Info = I, Error = E>,
    I: std::fmt::Debug,
{
    // Start receive mode
    radio.start_receive()?;

    loop {
        if radio.check_receive(true)? {
            let (n, info) = radio.get_received(buff)?;

            match std::str::from_utf8(&buff[0..n]) {
                Ok(s) => info!("Received: '{}' info: {:?}", s, info),
                Err(_) => info!("Received: '{:02x?}' info: {:?}", &buff[0..n], info),
            }

            if !continuous {
                return Ok(n);
            }
        }

        std::thread::sleep(poll_interval);
    }
}

pub fn do_rssi<T, E>(mut radio: T, continuous: bool, period: Duration) -> Result<(), E>
where
    T: radio::Receive<Error = E> + radio::Rssi<Error = E>,
{
    // Enter receive mode
    radio.start_receive()?;

    // Poll for RSSI
    loop {
        let rssi = radio.poll_rssi()?;

        info!("rssi: {}", rssi);

        radio.check_receive(true)?;

        std::thread::sleep(period);

        if !continuous {
            break;
        }
    }

    Ok(())
}

pub fn do_sweep<B, CE, PE>(radio: Cc1101<B, CE, PE>, config: &Sweep) -> Result<(), Error<CE, PE>>
where
    B: Base<CE, PE>,
{
    let mut t = ChipTransceiver::new(radio, ModuleId::Cc1101Primary, Modulation::Unknown);
    t.set_band(ScanBand::new(config.low, config.high));

    if !t.set_modulation(&config.modulation)? {
        warn!("Unrecognised modulation '{}', sweeping with default step", config.modulation);
    }

    let flag = ScanFlag::new(true);

    let mut log_sample = |s: RadioSignalSample| {
        info!("{:>10} ms {:8.3} MHz {:4} dBm ({})", s.timestamp_ms, s.frequency_mhz, s.rssi_dbm, s.extra);
    };

    loop {
        let n = t.scan_range(&flag, &mut log_sample)?;
        debug!("Sweep complete, {} samples", n);

        if !config.continuous {
            break;
        }
        std::thread::sleep(*config.period);
    }

    Ok(())
}
