//! CC1101 Integration testing
//!
//! Loopback between two radios attached to a linux host, configured via environment
//! (`CC1101_TEST_SPI0` / `CC1101_TEST_CS0` / `CC1101_TEST_GDO0_0` for the receiver and
//! the same with a `1` suffix for the transmitter).
//!
//! Copyright 2019 Ryan Kurte

use std::thread;
use std::time::Duration;

extern crate linux_embedded_hal;
use linux_embedded_hal::sysfs_gpio::Direction;
use linux_embedded_hal::{spidev, Delay, SpidevBus, SysfsPin};

extern crate radio_cc1101;
use radio_cc1101::base::StdClock;
use radio_cc1101::prelude::*;

extern crate radio;
use radio::{Receive, Transmit};

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_owned())
}

// Built inline so the linux-embedded-hal error types are inferred
macro_rules! load {
    ($index:expr) => {{
        let index: usize = $index;
        let spi_path = env_or(&format!("CC1101_TEST_SPI{}", index), &format!("/dev/spidev0.{}", index));
        let cs_num: u64 = env_or(&format!("CC1101_TEST_CS{}", index), if index == 0 { "8" } else { "7" }).parse().unwrap();
        let ready_num: u64 = env_or(&format!("CC1101_TEST_READY{}", index), "9").parse().unwrap();
        let gdo0_num: u64 = env_or(&format!("CC1101_TEST_GDO0_{}", index), if index == 0 { "24" } else { "25" }).parse().unwrap();

        let mut spi = SpidevBus::open(&spi_path).expect("error opening spi device");
        let mut config = spidev::SpidevOptions::new();
        config.mode(spidev::SpiModeFlags::SPI_MODE_0 | spidev::SpiModeFlags::SPI_NO_CS);
        config.max_speed_hz(1_000_000);
        spi.configure(&config).unwrap();

        let cs = SysfsPin::new(cs_num);
        cs.export().unwrap();
        cs.set_direction(Direction::High).unwrap();

        let ready = SysfsPin::new(ready_num);
        ready.export().unwrap();
        ready.set_direction(Direction::In).unwrap();

        let gdo0 = SysfsPin::new(gdo0_num);
        gdo0.export().unwrap();
        gdo0.set_direction(Direction::In).unwrap();

        let base = SpiBase::new(spi, cs, ready, Some(gdo0), None, StdClock::new(), Delay);

        Cc1101::new(base, &Config::default()).expect("error creating radio")
    }};
}

#[test]
#[ignore]
fn integration() {
    color_backtrace::install();

    let mut radio1 = load!(0);
    let mut radio2 = load!(1);

    assert!(radio1.probe().unwrap(), "radio 0 not responding");
    assert!(radio2.probe().unwrap(), "radio 1 not responding");

    println!("Testing send/receive");

    let data = &[0xaa, 0xbb, 0xcc];

    // Configure receive
    radio1.start_receive().unwrap();

    // Start transmit
    radio2.start_transmit(data).unwrap();

    // Poll on tx and rx complete
    let mut sent = false;
    let mut received = false;
    let mut buff = [0u8; 64];
    let mut n = 0;

    for _i in 0..10 {
        // Check TX state
        if !sent && radio2.check_transmit().unwrap() {
            println!("TX complete");
            sent = true;
        }

        // Check RX state
        if !received && radio1.check_receive(false).unwrap() {
            thread::sleep(Duration::from_millis(10));

            let (len, info) = radio1.get_received(&mut buff).unwrap();
            n = len;
            received = true;
            println!("RX complete ({:?} {:?})", info, &buff[..n]);
        }

        thread::sleep(Duration::from_millis(100));
    }

    assert!(sent, "Send not completed");
    assert!(received, "Receive not completed");
    assert_eq!(data, &buff[..n]);

    println!("Testing handshaken transmit");

    radio1.start_receive().unwrap();
    assert_eq!(radio2.transmit(data).unwrap(), TxOutcome::Confirmed);
}
