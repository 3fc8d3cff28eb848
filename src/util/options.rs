use structopt::StructOpt;
use simplelog::LevelFilter;
use humantime::Duration as HumanDuration;

#[derive(StructOpt)]
#[structopt(name = "cc1101-util")]
/// A Command Line Interface (CLI) for interacting with a local CC1101 radio device
pub struct Options {
    #[structopt(subcommand)]
    /// Subcommand to execute
    pub command: Command,

    /// SPI device for radio connection
    #[structopt(long = "spi", default_value = "/dev/spidev0.0", env = "CC1101_SPI")]
    pub spi: String,

    /// Chip Select (output) pin
    #[structopt(long = "cs-pin", default_value = "8", env = "CC1101_CS")]
    pub cs: u64,

    /// Chip ready (input) pin, wired to the SO line, assumed ready if not set
    #[structopt(long = "ready-pin", env = "CC1101_READY")]
    pub ready: Option<u64>,

    /// GDO0 (input) pin, required for handshaken transmit
    #[structopt(long = "gdo0-pin", env = "CC1101_GDO0")]
    pub gdo0: Option<u64>,

    /// Baud rate setting
    #[structopt(long = "baud", default_value = "1000000", env = "CC1101_BAUD")]
    pub baud: u32,

    /// Carrier frequency in MHz
    #[structopt(long = "freq-mhz", default_value = "433.92")]
    pub freq_mhz: f32,

    /// Log verbosity setting
    #[structopt(long = "log-level", default_value = "info")]
    pub level: LevelFilter,
}

#[derive(StructOpt, PartialEq, Debug)]
pub enum Command {
    #[structopt(name = "chip-version")]
    /// Fetch the device part number and version
    ChipVersion,

    #[structopt(name = "tx")]
    /// Transmit a (string) packet
    Transmit(Transmit),

    #[structopt(name = "rx")]
    /// Receive a (string) packet
    Receive(Receive),

    #[structopt(name = "rssi")]
    /// Poll for RSSI on the configured frequency
    Rssi(Rssi),

    #[structopt(name = "sweep")]
    /// Sweep a band, logging RSSI per step
    Sweep(Sweep),
}

#[derive(StructOpt, PartialEq, Debug)]
pub struct Transmit {
    /// Data to be transmitted
    #[structopt(long = "data")]
    pub data: String,

    /// Run continuously
    #[structopt(long = "continuous")]
    pub continuous: bool,

    /// Power in dBm
    #[structopt(long = "power", default_value = "10")]
    pub power: i8,

    /// Specify period for transmission
    #[structopt(long = "period", default_value = "1s")]
    pub period: HumanDuration,

    /// Transmit without the GDO0 handshake, flushing after this duration
    #[structopt(long = "timed")]
    pub timed: Option<HumanDuration>,
}

#[derive(StructOpt, PartialEq, Debug)]
pub struct Receive {
    /// Run continuously
    #[structopt(long = "continuous")]
    pub continuous: bool,

    /// Specify period for polling for device status
    #[structopt(long = "poll-interval", default_value = "1ms")]
    pub poll_interval: HumanDuration,
}

#[derive(StructOpt, PartialEq, Debug)]
pub struct Rssi {
    /// Specify period for RSSI polling
    #[structopt(long = "period", default_value = "1s")]
    pub period: HumanDuration,

    /// Run continuously
    #[structopt(long = "continuous")]
    pub continuous: bool,
}

#[derive(StructOpt, PartialEq, Debug)]
pub struct Sweep {
    /// Sweep lower bound in MHz
    #[structopt(long = "low", default_value = "430.0")]
    pub low: f32,

    /// Sweep upper bound in MHz
    #[structopt(long = "high", default_value = "440.0")]
    pub high: f32,

    /// Modulation (OOK, ASK, 2-FSK, GFSK, MSK)
    #[structopt(long = "modulation", default_value = "OOK")]
    pub modulation: String,

    /// Repeat sweeps until interrupted
    #[structopt(long = "continuous")]
    pub continuous: bool,

    /// Pause between sweeps
    #[structopt(long = "period", default_value = "1s")]
    pub period: HumanDuration,
}
