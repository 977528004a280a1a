//! Blocking driver for the Adesto AT25SF041B 4-Mbit serial NOR flash.
//!
//! The driver owns an [`embedded_hal::spi::SpiBus`] and a chip-select
//! [`embedded_hal::digital::OutputPin`] and frames every command by holding
//! chip select low for the duration of one opcode sequence. Configure the bus
//! for SPI mode 0 (clock idle low, sample on the leading edge), MSB-first bit
//! order, and at most the chip's rated clock before handing it over.
//!
//! Every call blocks until its bus transaction completes. The driver performs
//! no internal locking: exactly one owner must serialize all calls, and calls
//! on the same instance must not overlap.
//!
//! Erase and program commands return as soon as the command sequence has been
//! sent; the physical operation continues inside the chip (90 ms up to 3 s
//! for a full chip erase). Poll [`At25sf041b::busy`] or call
//! [`At25sf041b::wait_until_ready`] before the next mutating command.

#![no_std]
#![deny(unsafe_code)]

mod bus;
mod dump;
mod nor_flash;
mod storage;

pub use dump::DumpFormat;
pub use nor_flash::{At25sf041b, Error, JedecId, PollLimit, Status};

/// Size of one program page in bytes.
pub const PAGE_SIZE: usize = 256;

/// Size of the smallest erase unit in bytes.
pub const SECTOR_SIZE: u32 = 4 * 1024;

/// Size of a 32 KiB erase block in bytes.
pub const BLOCK_32K_SIZE: u32 = 32 * 1024;

/// Size of a 64 KiB erase block in bytes.
pub const BLOCK_64K_SIZE: u32 = 64 * 1024;

/// Total capacity in bytes (4 Mbit).
pub const CAPACITY: u32 = 512 * 1024;

/// Highest valid linear byte address.
pub const MAX_ADDRESS: u32 = CAPACITY - 1;

/// Highest valid page index.
pub const MAX_PAGE: u16 = (CAPACITY / PAGE_SIZE as u32 - 1) as u16;

/// Command opcodes from the AT25SF041B datasheet.
pub(crate) mod opcode {
    pub const PAGE_PROGRAM: u8 = 0x02;
    pub const READ_ARRAY: u8 = 0x03;
    pub const READ_STATUS_1: u8 = 0x05;
    pub const WRITE_ENABLE: u8 = 0x06;
    pub const ERASE_4K: u8 = 0x20;
    pub const ERASE_32K: u8 = 0x52;
    pub const READ_JEDEC_ID: u8 = 0x9F;
    pub const CHIP_ERASE: u8 = 0xC7;
    pub const ERASE_64K: u8 = 0xD8;
}
