//! Page dump formatting helper.

use core::fmt;

use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use crate::nor_flash::{At25sf041b, Error};
use crate::PAGE_SIZE;

/// How [`At25sf041b::dump_page`] renders each byte.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DumpFormat {
    /// Raw characters, no separator.
    Ascii,
    /// Space-separated binary numbers.
    Binary,
    /// Space-separated decimal numbers.
    Decimal,
    /// Space-separated hexadecimal numbers.
    Hex,
}

impl<SPI, CS> At25sf041b<SPI, CS>
where
    SPI: SpiBus,
    CS: OutputPin,
{
    /// Read one full 256-byte page and render it to `out`, followed by a
    /// newline.
    pub fn dump_page<W: fmt::Write>(
        &mut self,
        page: u16,
        out: &mut W,
        format: DumpFormat,
    ) -> Result<(), Error<SPI::Error, CS::Error>> {
        let mut data = [0u8; PAGE_SIZE];
        self.read(page, 0, &mut data)?;
        render(out, &data, format).map_err(|_| Error::Fmt)
    }
}

fn render<W: fmt::Write>(out: &mut W, data: &[u8], format: DumpFormat) -> fmt::Result {
    for &byte in data {
        match format {
            DumpFormat::Ascii => out.write_char(byte as char)?,
            DumpFormat::Binary => write!(out, "{byte:b} ")?,
            DumpFormat::Decimal => write!(out, "{byte} ")?,
            DumpFormat::Hex => write!(out, "{byte:X} ")?,
        }
    }
    out.write_char('\n')
}
