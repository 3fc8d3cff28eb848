//! CC1101 command line utility
//!
//! Provides mechanisms for command line interaction with CC1101 devices using linux spidev and sysfs_gpio
//!
//! Copyright 2019 Ryan Kurte

#[macro_use] extern crate log;
extern crate simplelog;
use simplelog::{ColorChoice, TermLogger, TerminalMode};

extern crate structopt;
use structopt::StructOpt;

extern crate humantime;

extern crate linux_embedded_hal;
use linux_embedded_hal::{spidev, Delay, SpidevBus, SysfsPin};
use linux_embedded_hal::sysfs_gpio::Direction;

use embedded_hal::digital::{ErrorType, InputPin};

extern crate radio;

extern crate radio_cc1101;
use radio_cc1101::base::StdClock;
use radio_cc1101::prelude::*;

mod options;
use options::*;

mod operations;
use operations::*;

/// Chip ready input, either the SO line on a GPIO or assumed always ready
enum ReadyLine {
    Pin(SysfsPin),
    Assumed,
}

impl ErrorType for ReadyLine {
    type Error = <SysfsPin as ErrorType>::Error;
}

impl InputPin for ReadyLine {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.is_low().map(|low| !low)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        match self {
            ReadyLine::Pin(p) => p.is_low(),
            ReadyLine::Assumed => Ok(true),
        }
    }
}

fn input_pin(num: u64, name: &str) -> SysfsPin {
    let p = SysfsPin::new(num);
    p.export().unwrap_or_else(|e| panic!("error exporting {} pin: {:?}", name, e));
    p.set_direction(Direction::In).unwrap_or_else(|e| panic!("error setting {} pin direction: {:?}", name, e));
    p
}

fn main() {
    // Load options
    let opts = Options::from_args();

    // Setup logging
    TermLogger::init(opts.level, simplelog::Config::default(), TerminalMode::Mixed, ColorChoice::Auto).unwrap();

    debug!("Connecting to SPI device");

    // Connect to hardware
    let mut spi = SpidevBus::open(&opts.spi).expect("error opening spi device");
    let mut config = spidev::SpidevOptions::new();
    config.mode(spidev::SpiModeFlags::SPI_MODE_0 | spidev::SpiModeFlags::SPI_NO_CS);
    config.max_speed_hz(opts.baud);
    spi.configure(&config).expect("error configuring spi device");

    debug!("Configuring I/O pins");

    let cs = SysfsPin::new(opts.cs);
    cs.export().expect("error exporting cs pin");
    cs.set_direction(Direction::High).expect("error setting cs pin direction");

    let ready = match opts.ready {
        Some(n) => ReadyLine::Pin(input_pin(n, "ready")),
        None => ReadyLine::Assumed,
    };

    let gdo0 = opts.gdo0.map(|n| input_pin(n, "gdo0"));

    debug!("Creating radio instance");

    let base = SpiBase::new(spi, cs, ready, gdo0, None, StdClock::new(), Delay);

    let config = Config {
        frequency_mhz: opts.freq_mhz,
        ..Config::default()
    };

    let radio = Cc1101::new(base, &config).expect("error creating device");

    debug!("Executing command");

    do_command(radio, opts.command).expect("error executing command");
}
