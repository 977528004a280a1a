//! `embedded-storage` NOR flash trait implementations.
//!
//! Exposes the chip as a linearly addressed [`NorFlash`] with single-byte
//! read/write granularity and a 4 KiB erase unit. Unlike the raw driver
//! methods, these wait for each erase or program to complete before moving
//! on, so a call returns with the chip ready.

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use embedded_storage::nor_flash::{
    ErrorType, MultiwriteNorFlash, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};

use crate::nor_flash::{At25sf041b, Error};
use crate::{CAPACITY, PAGE_SIZE, SECTOR_SIZE};

impl<S: core::fmt::Debug, P: core::fmt::Debug> NorFlashError for Error<S, P> {
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            Error::OutOfBounds => NorFlashErrorKind::OutOfBounds,
            Error::NotAligned => NorFlashErrorKind::NotAligned,
            _ => NorFlashErrorKind::Other,
        }
    }
}

impl<SPI, CS> ErrorType for At25sf041b<SPI, CS>
where
    SPI: SpiBus,
    CS: OutputPin,
{
    type Error = Error<SPI::Error, CS::Error>;
}

impl<SPI, CS> ReadNorFlash for At25sf041b<SPI, CS>
where
    SPI: SpiBus,
    CS: OutputPin,
{
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        check_range(offset, bytes.len())?;
        At25sf041b::read(self, (offset >> 8) as u16, offset as u8, bytes)
    }

    fn capacity(&self) -> usize {
        CAPACITY as usize
    }
}

impl<SPI, CS> NorFlash for At25sf041b<SPI, CS>
where
    SPI: SpiBus,
    CS: OutputPin,
{
    const WRITE_SIZE: usize = 1;
    const ERASE_SIZE: usize = SECTOR_SIZE as usize;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if from > to || to > CAPACITY {
            return Err(Error::OutOfBounds);
        }
        if from % SECTOR_SIZE != 0 || to % SECTOR_SIZE != 0 {
            return Err(Error::NotAligned);
        }
        let mut sector = from;
        while sector < to {
            self.erase_sector((sector >> 8) as u16)?;
            self.wait_until_ready()?;
            sector += SECTOR_SIZE;
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        check_range(offset, bytes.len())?;
        let mut address = offset;
        let mut data = bytes;
        // Split at page boundaries so the chip's intra-page wraparound never
        // kicks in.
        while !data.is_empty() {
            let room = PAGE_SIZE - address as usize % PAGE_SIZE;
            let chunk = room.min(data.len());
            self.page_program((address >> 8) as u16, address as u8, &data[..chunk])?;
            self.wait_until_ready()?;
            address += chunk as u32;
            data = &data[chunk..];
        }
        Ok(())
    }
}

// Programming can only clear bits, which is exactly the multiwrite contract.
impl<SPI, CS> MultiwriteNorFlash for At25sf041b<SPI, CS>
where
    SPI: SpiBus,
    CS: OutputPin,
{
}

fn check_range<S, P>(offset: u32, len: usize) -> Result<(), Error<S, P>> {
    let end = (offset as u64) + len as u64;
    if end > CAPACITY as u64 {
        return Err(Error::OutOfBounds);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range() {
        assert!(check_range::<(), ()>(0, CAPACITY as usize).is_ok());
        assert!(check_range::<(), ()>(CAPACITY - 1, 1).is_ok());
        assert!(matches!(
            check_range::<(), ()>(CAPACITY, 1),
            Err(Error::OutOfBounds)
        ));
        assert!(matches!(
            check_range::<(), ()>(1, CAPACITY as usize),
            Err(Error::OutOfBounds)
        ));
    }
}
