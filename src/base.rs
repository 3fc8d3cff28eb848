//! Basic HAL functions for communicating with the radio device
//!
//! This provides decoupling between embedded hal traits and the RF device implementation.
//! Every register access is a complete select / wait-ready / transfer / deselect transaction,
//! and the wait on the ready line is bounded so an absent chip can never stall the caller.
// Copyright 2019 Ryan Kurte

use core::cell::RefCell;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::{ErrorType, SpiBus};

use crate::device::regs::{Access, Register, Status, Strobe};
use crate::device::TRANSPORT_TIMEOUT_MS;
use crate::Error;

/// Millisecond time source for the bounded waits used throughout the driver
pub trait Clock {
    /// Milliseconds elapsed since an arbitrary fixed point
    fn now_ms(&mut self) -> u64;
}

/// Pause between iterations of a bounded wait on `SpiBase`
pub const POLL_INTERVAL_US: u32 = 100;

/// Wall clock time source for hosted targets
#[cfg(feature = "std")]
pub struct StdClock {
    start: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdClock {
    pub fn new() -> Self {
        Self { start: std::time::Instant::now() }
    }
}

#[cfg(feature = "std")]
impl Clock for StdClock {
    fn now_ms(&mut self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Outcome of a bounded wait
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Wait {
    /// The awaited condition was observed
    Ready,
    /// The timeout elapsed first
    TimedOut,
}

impl Wait {
    pub fn is_ready(&self) -> bool {
        *self == Wait::Ready
    }
}

/// Spin on `cond` for at most `timeout_ms`, yielding on every iteration
pub fn poll_until<B, F, CommsError, PinError>(
    base: &mut B,
    timeout_ms: u32,
    mut cond: F,
) -> Result<Wait, Error<CommsError, PinError>>
where
    B: Base<CommsError, PinError> + ?Sized,
    F: FnMut(&mut B) -> Result<bool, Error<CommsError, PinError>>,
{
    let start = base.now_ms();

    loop {
        if cond(&mut *base)? {
            return Ok(Wait::Ready);
        }

        if base.now_ms().saturating_sub(start) > timeout_ms as u64 {
            return Ok(Wait::TimedOut);
        }

        base.yield_now();
    }
}

/// Base implementation of the CC1101 serial interface
///
/// Implementers provide the raw line and bus primitives, the register level
/// transactions are provided on top of these.
pub trait Base<CommsError, PinError> {
    /// Bring up the bus lines, this must be a no-op if already initialised
    fn begin(&mut self) -> Result<(), Error<CommsError, PinError>>;

    /// Assert chip select
    fn select(&mut self) -> Result<(), Error<CommsError, PinError>>;
    /// De-assert chip select
    fn deselect(&mut self) -> Result<(), Error<CommsError, PinError>>;

    /// Check the chip ready indicator (SO pulled low once the oscillator is stable)
    fn is_ready(&mut self) -> Result<bool, Error<CommsError, PinError>>;

    /// Write bytes on the bus within an open transaction
    fn spi_write(&mut self, data: &[u8]) -> Result<(), Error<CommsError, PinError>>;
    /// Read bytes from the bus within an open transaction
    fn spi_read(&mut self, data: &mut [u8]) -> Result<(), Error<CommsError, PinError>>;

    /// Whether the GDO0 line is wired to the host
    fn has_gdo0(&self) -> bool;
    /// Read the GDO0 line
    fn gdo0_is_high(&mut self) -> Result<bool, Error<CommsError, PinError>>;
    /// Read the GDO2 line
    fn gdo2_is_high(&mut self) -> Result<bool, Error<CommsError, PinError>>;

    /// Current time in milliseconds
    fn now_ms(&mut self) -> u64;
    /// Pause briefly between iterations of a bounded wait
    fn yield_now(&mut self);
    /// Delay for the specified time
    fn delay_ms(&mut self, ms: u32);

    /// Wait (bounded) for the ready indicator following chip select
    fn wait_ready(&mut self) -> Result<(), Error<CommsError, PinError>> {
        match poll_until::<Self, _, CommsError, PinError>(self, TRANSPORT_TIMEOUT_MS, |b| b.is_ready())? {
            Wait::Ready => Ok(()),
            Wait::TimedOut => Err(Error::TransportTimeout),
        }
    }

    /// Open a transaction: select and wait for ready, aborting on timeout
    fn open(&mut self) -> Result<(), Error<CommsError, PinError>> {
        self.select()?;

        if let Err(e) = self.wait_ready() {
            warn!("Transport timeout waiting on chip ready");
            if self.deselect().is_err() {
                debug!("Deselect failed after transport timeout");
            }
            return Err(e);
        }

        Ok(())
    }

    /// Issue a header byte followed by a write data phase
    fn write_transaction(&mut self, header: u8, data: &[u8]) -> Result<(), Error<CommsError, PinError>> {
        self.open()?;

        let r = self.spi_write(&[header]).and_then(|_| {
            if data.is_empty() {
                Ok(())
            } else {
                self.spi_write(data)
            }
        });

        self.deselect()?;
        r
    }

    /// Issue a header byte followed by a read data phase
    fn read_transaction(&mut self, header: u8, data: &mut [u8]) -> Result<(), Error<CommsError, PinError>> {
        self.open()?;

        let r = self.spi_write(&[header]).and_then(|_| self.spi_read(data));

        self.deselect()?;
        r
    }

    /// Write a single configuration register
    fn write_reg(&mut self, reg: Register, value: u8) -> Result<(), Error<CommsError, PinError>> {
        trace!("Write reg {:?}: 0x{:02x}", reg, value);
        self.write_transaction(reg as u8, &[value])
    }

    /// Write consecutive registers (or the FIFO / PA table) in one burst
    fn write_burst(&mut self, reg: Register, data: &[u8]) -> Result<(), Error<CommsError, PinError>> {
        trace!("Write burst {:?}: {:02x?}", reg, data);
        self.write_transaction(reg as u8 | Access::BURST.bits(), data)
    }

    /// Issue a command strobe
    fn strobe(&mut self, strobe: Strobe) -> Result<(), Error<CommsError, PinError>> {
        trace!("Strobe {:?}", strobe);
        self.write_transaction(strobe as u8, &[])
    }

    /// Read a single configuration register
    fn read_reg(&mut self, reg: Register) -> Result<u8, Error<CommsError, PinError>> {
        let mut incoming = [0u8; 1];
        self.read_transaction(reg as u8 | Access::READ.bits(), &mut incoming)?;
        Ok(incoming[0])
    }

    /// Read consecutive registers (or the FIFO) in one burst
    fn read_burst(&mut self, reg: Register, data: &mut [u8]) -> Result<(), Error<CommsError, PinError>> {
        self.read_transaction(reg as u8 | (Access::READ | Access::BURST).bits(), data)
    }

    /// Read a status register, these share addresses with the strobes and need the burst bit
    fn read_status(&mut self, status: Status) -> Result<u8, Error<CommsError, PinError>> {
        let mut incoming = [0u8; 1];
        self.read_transaction(status as u8 | (Access::READ | Access::BURST).bits(), &mut incoming)?;
        Ok(incoming[0])
    }
}

/// CC1101 transport over an embedded-hal SPI bus with manually driven chip select
///
/// The chip signals readiness on its SO line, `ready` must be an input reading that line.
pub struct SpiBase<Spi, Cs, Ready, Gdo, C, Delay> {
    spi: Spi,
    cs: Cs,
    ready: Ready,
    gdo0: Option<Gdo>,
    gdo2: Option<Gdo>,
    clock: C,
    delay: Delay,
    initialised: bool,
}

impl<Spi, Cs, Ready, Gdo, C, Delay> SpiBase<Spi, Cs, Ready, Gdo, C, Delay> {
    /// Create a new transport from board supplied bus and line assignments
    pub fn new(spi: Spi, cs: Cs, ready: Ready, gdo0: Option<Gdo>, gdo2: Option<Gdo>, clock: C, delay: Delay) -> Self {
        Self {
            spi,
            cs,
            ready,
            gdo0,
            gdo2,
            clock,
            delay,
            initialised: false,
        }
    }

    /// Whether `begin` has completed
    pub fn initialised(&self) -> bool {
        self.initialised
    }

    /// Release the underlying bus and lines
    pub fn free(self) -> (Spi, Cs, Ready, Option<Gdo>, Option<Gdo>, C, Delay) {
        (self.spi, self.cs, self.ready, self.gdo0, self.gdo2, self.clock, self.delay)
    }
}

impl<Spi, Cs, Ready, Gdo, C, Delay, CommsError, PinError> Base<CommsError, PinError>
    for SpiBase<Spi, Cs, Ready, Gdo, C, Delay>
where
    Spi: SpiBus<u8, Error = CommsError>,
    Cs: OutputPin<Error = PinError>,
    Ready: InputPin<Error = PinError>,
    Gdo: InputPin<Error = PinError>,
    C: Clock,
    Delay: DelayNs,
{
    fn begin(&mut self) -> Result<(), Error<CommsError, PinError>> {
        // Reconfiguring a shared bus would break routing for other devices
        if self.initialised {
            return Ok(());
        }

        self.cs.set_high().map_err(Error::Pin)?;
        self.initialised = true;

        Ok(())
    }

    fn select(&mut self) -> Result<(), Error<CommsError, PinError>> {
        self.cs.set_low().map_err(Error::Pin)
    }

    fn deselect(&mut self) -> Result<(), Error<CommsError, PinError>> {
        let r = self.spi.flush().map_err(Error::Comms);
        self.cs.set_high().map_err(Error::Pin)?;
        r
    }

    fn is_ready(&mut self) -> Result<bool, Error<CommsError, PinError>> {
        self.ready.is_low().map_err(Error::Pin)
    }

    fn spi_write(&mut self, data: &[u8]) -> Result<(), Error<CommsError, PinError>> {
        self.spi.write(data).map_err(Error::Comms)
    }

    fn spi_read(&mut self, data: &mut [u8]) -> Result<(), Error<CommsError, PinError>> {
        self.spi.read(data).map_err(Error::Comms)
    }

    fn has_gdo0(&self) -> bool {
        self.gdo0.is_some()
    }

    fn gdo0_is_high(&mut self) -> Result<bool, Error<CommsError, PinError>> {
        match &mut self.gdo0 {
            Some(p) => p.is_high().map_err(Error::Pin),
            None => Err(Error::Unwired),
        }
    }

    fn gdo2_is_high(&mut self) -> Result<bool, Error<CommsError, PinError>> {
        match &mut self.gdo2 {
            Some(p) => p.is_high().map_err(Error::Pin),
            None => Err(Error::Unwired),
        }
    }

    fn now_ms(&mut self) -> u64 {
        self.clock.now_ms()
    }

    fn yield_now(&mut self) {
        self.delay.delay_us(POLL_INTERVAL_US)
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms)
    }
}

/// Shares one SPI bus between several chips on a single execution context
///
/// Each call borrows the bus only for its own duration, callers must keep
/// transactions on different chips from interleaving.
pub struct SharedBus<'a, Spi> {
    bus: &'a RefCell<Spi>,
}

impl<'a, Spi> SharedBus<'a, Spi> {
    pub fn new(bus: &'a RefCell<Spi>) -> Self {
        Self { bus }
    }
}

impl<'a, Spi: ErrorType> ErrorType for SharedBus<'a, Spi> {
    type Error = Spi::Error;
}

impl<'a, Spi: SpiBus<u8>> SpiBus<u8> for SharedBus<'a, Spi> {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.bus.borrow_mut().read(words)
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        self.bus.borrow_mut().write(words)
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        self.bus.borrow_mut().transfer(read, write)
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.bus.borrow_mut().transfer_in_place(words)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.bus.borrow_mut().flush()
    }
}
