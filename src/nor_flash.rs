//! Flash command driver.

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use crate::bus::CommandBus;
use crate::{opcode, MAX_PAGE, PAGE_SIZE};

/// Default bound for busy polling. Each poll is a two-byte status frame, so
/// this covers the worst-case 3 s chip erase with a wide margin at any
/// practical clock rate.
const DEFAULT_POLL_ATTEMPTS: u32 = 4_000_000;

/// AT25SF041B driver.
///
/// Owns the SPI bus and chip-select line for its lifetime; [`release()`]
/// hands them back. One logical owner must serialize all calls, and calls on
/// the same instance must not overlap.
///
/// [`release()`]: Self::release
pub struct At25sf041b<SPI, CS> {
    bus: CommandBus<SPI, CS>,
    poll_limit: PollLimit,
}

impl<SPI, CS> At25sf041b<SPI, CS>
where
    SPI: SpiBus,
    CS: OutputPin,
{
    /// Create the driver and probe the chip.
    ///
    /// Drives chip select to its idle-high state, reads the JEDEC
    /// identification and compares it against [`JedecId::AT25SF041B`]. A
    /// mismatch means a wrong or absent device and fails with
    /// [`Error::UnknownDevice`] carrying the bytes that were returned. No
    /// retry is attempted.
    pub fn new(spi: SPI, cs: CS) -> Result<Self, Error<SPI::Error, CS::Error>> {
        let mut flash = Self::new_unchecked(spi, cs)?;
        let id = flash.jedec_id()?;
        if id != JedecId::AT25SF041B {
            return Err(Error::UnknownDevice(id));
        }
        Ok(flash)
    }

    /// Create the driver without probing the chip identification.
    pub fn new_unchecked(spi: SPI, cs: CS) -> Result<Self, Error<SPI::Error, CS::Error>> {
        Ok(Self {
            bus: CommandBus::new(spi, cs)?,
            poll_limit: PollLimit::default(),
        })
    }

    /// Set the busy-poll bound used by [`wait_until_ready()`](Self::wait_until_ready).
    pub fn set_poll_limit(&mut self, limit: PollLimit) {
        self.poll_limit = limit;
    }

    /// Builder-style variant of [`set_poll_limit()`](Self::set_poll_limit).
    #[must_use]
    pub fn with_poll_limit(mut self, limit: PollLimit) -> Self {
        self.poll_limit = limit;
        self
    }

    /// Read the JEDEC identification bytes.
    pub fn jedec_id(&mut self) -> Result<JedecId, Error<SPI::Error, CS::Error>> {
        let mut id = [0u8; 3];
        self.bus.command_read(&[opcode::READ_JEDEC_ID], &mut id)?;
        Ok(JedecId {
            manufacturer: id[0],
            device: [id[1], id[2]],
        })
    }

    /// Read status register 1.
    ///
    /// The snapshot is read fresh from the chip on every call, never cached.
    pub fn read_status(&mut self) -> Result<Status, Error<SPI::Error, CS::Error>> {
        let mut status = [0u8; 1];
        self.bus.command_read(&[opcode::READ_STATUS_1], &mut status)?;
        Ok(Status { raw: status[0] })
    }

    /// Whether an erase or program operation is still in progress.
    pub fn busy(&mut self) -> Result<bool, Error<SPI::Error, CS::Error>> {
        Ok(self.read_status()?.busy())
    }

    /// Poll status until the busy bit clears.
    ///
    /// Polling is bounded by the configured [`PollLimit`]; exceeding it
    /// yields [`Error::PollTimeout`]. With [`PollLimit::Unbounded`] a faulty
    /// chip that never clears busy blocks the caller indefinitely.
    pub fn wait_until_ready(&mut self) -> Result<(), Error<SPI::Error, CS::Error>> {
        match self.poll_limit {
            PollLimit::Unbounded => {
                while self.read_status()?.busy() {}
                Ok(())
            }
            PollLimit::Attempts(attempts) => {
                for _ in 0..attempts {
                    if !self.read_status()?.busy() {
                        return Ok(());
                    }
                }
                Err(Error::PollTimeout)
            }
        }
    }

    /// Erase the 4 KiB sector containing `page`.
    ///
    /// The chip ignores address bits A11..A0, so any page within the sector
    /// selects the same sector; pass a sector-aligned page for predictable
    /// addressing. Returns once the command is sent (the erase itself takes
    /// around 90 ms); poll [`busy()`](Self::busy) for completion.
    pub fn erase_sector(&mut self, page: u16) -> Result<(), Error<SPI::Error, CS::Error>> {
        self.block_erase(opcode::ERASE_4K, page)
    }

    /// Erase the 32 KiB block containing `page`.
    ///
    /// Address bits A14..A0 are ignored by the chip. The erase takes around
    /// 210 ms; poll [`busy()`](Self::busy) for completion.
    pub fn erase_block_32k(&mut self, page: u16) -> Result<(), Error<SPI::Error, CS::Error>> {
        self.block_erase(opcode::ERASE_32K, page)
    }

    /// Erase the 64 KiB block containing `page`.
    ///
    /// Address bits A15..A0 are ignored by the chip. The erase takes around
    /// 360 ms; poll [`busy()`](Self::busy) for completion.
    pub fn erase_block_64k(&mut self, page: u16) -> Result<(), Error<SPI::Error, CS::Error>> {
        self.block_erase(opcode::ERASE_64K, page)
    }

    /// Erase the entire chip.
    ///
    /// Takes up to 3 s inside the chip; poll [`busy()`](Self::busy) for
    /// completion.
    pub fn erase_chip(&mut self) -> Result<(), Error<SPI::Error, CS::Error>> {
        if self.read_status()?.busy() {
            return Err(Error::Busy);
        }
        self.write_enable()?;
        #[cfg(feature = "defmt")]
        defmt::trace!("chip erase");
        self.bus.command(&[opcode::CHIP_ERASE])
    }

    /// Program up to 256 bytes within one page.
    ///
    /// If `offset + data.len()` exceeds the 256-byte page, the chip wraps
    /// the excess around to the start of the same page; that is device
    /// behavior, not checked here. Returns once the frame is sent; poll
    /// [`busy()`](Self::busy) before the next mutating command. Programming
    /// only clears bits, so the range should be erased first.
    pub fn page_program(
        &mut self,
        page: u16,
        offset: u8,
        data: &[u8],
    ) -> Result<(), Error<SPI::Error, CS::Error>> {
        if data.len() > PAGE_SIZE {
            return Err(Error::DataTooLong);
        }
        self.check_writable(page)?;
        self.write_enable()?;
        #[cfg(feature = "defmt")]
        defmt::trace!(
            "page program: page {=u16:#x} offset {=u8:#x} len {=usize}",
            page,
            offset,
            data.len()
        );
        let [high, low] = address_bytes(page);
        self.bus
            .command_write(&[opcode::PAGE_PROGRAM, high, low, offset], data)
    }

    /// Read `data.len()` bytes starting at `page`/`offset`.
    ///
    /// Reads are always permitted, even while the chip is busy, but data
    /// read during an in-progress erase or program is undefined. The read
    /// continues across page boundaries.
    pub fn read(
        &mut self,
        page: u16,
        offset: u8,
        data: &mut [u8],
    ) -> Result<(), Error<SPI::Error, CS::Error>> {
        let [high, low] = address_bytes(page);
        self.bus
            .command_read(&[opcode::READ_ARRAY, high, low, offset], data)
    }

    /// Consume the driver and hand the SPI bus and chip-select pin back.
    pub fn release(self) -> (SPI, CS) {
        self.bus.release()
    }

    /// Guard for mutating operations: bounds first (no bus traffic), then a
    /// single status read for the busy check. Nothing is sent on rejection.
    fn check_writable(&mut self, page: u16) -> Result<(), Error<SPI::Error, CS::Error>> {
        if page > MAX_PAGE {
            return Err(Error::OutOfBounds);
        }
        if self.read_status()?.busy() {
            return Err(Error::Busy);
        }
        Ok(())
    }

    /// Set the write-enable latch. The latch self-clears after each erase or
    /// program command, so this runs as a separate transaction before every
    /// mutating command.
    fn write_enable(&mut self) -> Result<(), Error<SPI::Error, CS::Error>> {
        self.bus.command(&[opcode::WRITE_ENABLE])
    }

    fn block_erase(&mut self, op: u8, page: u16) -> Result<(), Error<SPI::Error, CS::Error>> {
        self.check_writable(page)?;
        self.write_enable()?;
        #[cfg(feature = "defmt")]
        defmt::trace!("block erase: opcode {=u8:#x} page {=u16:#x}", op, page);
        let [high, low] = address_bytes(page);
        self.bus.command(&[op, high, low, 0x00])
    }
}

/// A page index split into the two high address bytes of a command frame.
/// The third (lowest) byte is the offset within the page.
fn address_bytes(page: u16) -> [u8; 2] {
    [(page >> 8) as u8, page as u8]
}

/// JEDEC identification bytes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct JedecId {
    /// Manufacturer id.
    pub manufacturer: u8,
    /// Device id bytes.
    pub device: [u8; 2],
}

impl JedecId {
    /// The AT25SF041B: Adesto, AT25SFxxx series, 4 Mbit.
    pub const AT25SF041B: JedecId = JedecId {
        manufacturer: 0x1F,
        device: [0x84, 0x01],
    };
}

/// Snapshot of status register 1.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status {
    /// The raw status byte returned by the chip.
    pub raw: u8,
}

impl Status {
    /// An erase or program operation is in progress.
    pub fn busy(self) -> bool {
        self.raw & 0x01 != 0
    }

    /// The write-enable latch is set.
    pub fn write_enabled(self) -> bool {
        self.raw & 0x02 != 0
    }

    /// The block-protect bits BP4..BP0.
    pub fn block_protect(self) -> u8 {
        (self.raw >> 2) & 0x1F
    }

    /// The status-register-protect bit SRP0.
    pub fn status_register_protect(self) -> bool {
        self.raw & 0x80 != 0
    }
}

/// Bound on busy polling in [`At25sf041b::wait_until_ready`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollLimit {
    /// Poll forever. A chip that never clears busy blocks the caller
    /// indefinitely.
    Unbounded,
    /// Give up with [`Error::PollTimeout`] after this many status reads.
    Attempts(u32),
}

impl Default for PollLimit {
    fn default() -> Self {
        PollLimit::Attempts(DEFAULT_POLL_ATTEMPTS)
    }
}

/// Errors reported by the driver.
///
/// `S` and `P` are the error types of the SPI bus and the chip-select pin.
/// No operation is retried on error.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<S, P> {
    /// The SPI bus failed.
    Spi(S),
    /// The chip-select pin failed.
    Pin(P),
    /// The identification probe returned bytes that do not match the
    /// AT25SF041B.
    UnknownDevice(JedecId),
    /// A mutating operation was rejected because the chip reports busy.
    Busy,
    /// An address lies outside the chip's 512 KiB array.
    OutOfBounds,
    /// An erase range was not aligned to the erase unit.
    NotAligned,
    /// A program payload exceeds the 256-byte page-program limit.
    DataTooLong,
    /// The busy bit did not clear within the configured [`PollLimit`].
    PollTimeout,
    /// The output sink rejected formatted text.
    Fmt,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_bytes() {
        assert_eq!(address_bytes(0x0000), [0x00, 0x00]);
        assert_eq!(address_bytes(0x0010), [0x00, 0x10]);
        assert_eq!(address_bytes(0x07FF), [0x07, 0xFF]);
        assert_eq!(address_bytes(0x0123), [0x01, 0x23]);
    }

    #[test]
    fn test_status_bits() {
        let status = Status { raw: 0x01 };
        assert!(status.busy());
        assert!(!status.write_enabled());

        let status = Status { raw: 0x02 };
        assert!(!status.busy());
        assert!(status.write_enabled());

        // All five block-protect bits plus SRP0.
        let status = Status { raw: 0xFC };
        assert_eq!(status.block_protect(), 0x1F);
        assert!(status.status_register_protect());

        let status = Status { raw: 0x00 };
        assert_eq!(status.block_protect(), 0);
        assert!(!status.status_register_protect());
    }

    #[test]
    fn test_poll_limit_default_is_bounded() {
        assert_eq!(PollLimit::default(), PollLimit::Attempts(DEFAULT_POLL_ATTEMPTS));
    }

    #[test]
    fn test_expected_jedec_id() {
        let id = JedecId::AT25SF041B;
        assert_eq!(id.manufacturer, 0x1F);
        assert_eq!(id.device, [0x84, 0x01]);
    }
}
