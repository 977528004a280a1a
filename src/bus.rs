//! Chip-select-framed command transport.
//!
//! One frame is one logical transaction on the shared bus: chip select is
//! driven low, the opcode and any address bytes go out, an optional payload
//! phase runs in either direction, and chip select is released again. Chip
//! select is released on every exit path, a bus error included, so a failed
//! frame cannot leave the chip selected.

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use crate::nor_flash::Error;

/// The SPI bus and chip-select line, owned together for the driver's
/// lifetime.
pub(crate) struct CommandBus<SPI, CS> {
    spi: SPI,
    cs: CS,
}

impl<SPI, CS> CommandBus<SPI, CS>
where
    SPI: SpiBus,
    CS: OutputPin,
{
    /// Take ownership of the bus and chip-select pin, driving the pin to its
    /// idle-high state.
    pub fn new(spi: SPI, mut cs: CS) -> Result<Self, Error<SPI::Error, CS::Error>> {
        cs.set_high().map_err(Error::Pin)?;
        Ok(Self { spi, cs })
    }

    /// Send an opcode(+address) frame with no payload phase.
    pub fn command(&mut self, header: &[u8]) -> Result<(), Error<SPI::Error, CS::Error>> {
        self.frame(|spi| spi.write(header))
    }

    /// Send an opcode(+address) frame followed by an outgoing payload, all
    /// under one chip-select assertion.
    pub fn command_write(
        &mut self,
        header: &[u8],
        data: &[u8],
    ) -> Result<(), Error<SPI::Error, CS::Error>> {
        self.frame(|spi| {
            spi.write(header)?;
            spi.write(data)
        })
    }

    /// Send an opcode(+address) frame, then clock `data.len()` bytes back in
    /// from the chip within the same chip-select assertion.
    pub fn command_read(
        &mut self,
        header: &[u8],
        data: &mut [u8],
    ) -> Result<(), Error<SPI::Error, CS::Error>> {
        self.frame(|spi| {
            spi.write(header)?;
            spi.read(data)
        })
    }

    /// Give the bus and chip-select pin back.
    pub fn release(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }

    /// Run one chip-select-framed transaction. The bus is flushed before the
    /// chip select is raised so the frame is complete on the wire first.
    fn frame(
        &mut self,
        op: impl FnOnce(&mut SPI) -> Result<(), SPI::Error>,
    ) -> Result<(), Error<SPI::Error, CS::Error>> {
        self.cs.set_low().map_err(Error::Pin)?;
        let transferred = op(&mut self.spi).and_then(|()| self.spi.flush());
        let deselected = self.cs.set_high();
        transferred.map_err(Error::Spi)?;
        deselected.map_err(Error::Pin)
    }
}
