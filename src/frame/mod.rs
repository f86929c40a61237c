//! The shared command frame - wire layout, header codec and frame access.
//!
//! See [`crate`] for the byte layout.  Both sides must treat this module as the
//! single definition of the frame, whatever path they use to access it.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[cfg(feature = "async")]
pub mod futures;
pub mod sync;

#[cfg(feature = "async")]
pub use futures::{AsyncFrame, AsyncFrameIo, ReaderWriterFrame, ReaderWriterFrameIo};
pub use sync::{Frame, FrameIo, MemFrameIo, RamFrameIo};

use crate::{Error, Result};

/// Address the frame lives at, unless both sides agree otherwise
pub const DEFAULT_FRAME_ADDR: u32 = 0x0803_8000;

/// Total size of the frame in bytes, header included
pub const FRAME_SIZE: usize = 128;

/// Size of the header word in bytes
pub const HEADER_SIZE: usize = 4;

/// Size of the data area in bytes
pub const DATA_CAPACITY: usize = FRAME_SIZE - HEADER_SIZE;

/// Size of the frame in 32-bit words
pub const FRAME_WORDS: usize = FRAME_SIZE / 4;

/// Requests understood by the target
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Rest state.  Any other value hands the frame to the target.
    Idle = 0,
    /// Radio stack version and build information
    InfoStack = 1,
    /// Firmware version and build information
    InfoFirmware = 2,
    /// LoRaWAN key material
    Keys = 3,
    /// Fresh ADC sample, in millivolts
    AdcValue = 4,
    /// Indicator LED bitmask
    Leds = 5,
    /// Leave the dispatch loop
    Exit = 0xFF,
}

impl Command {
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Command::Idle),
            1 => Some(Command::InfoStack),
            2 => Some(Command::InfoFirmware),
            3 => Some(Command::Keys),
            4 => Some(Command::AdcValue),
            5 => Some(Command::Leds),
            0xFF => Some(Command::Exit),
            _ => None,
        }
    }

    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Command::from_u8(value).ok_or(Error::UnknownCommand(value))
    }
}

/// Decoded frame header.
///
/// The command is held as the raw byte, as the target must be able to see
/// (and flag) values outside of [`Command`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Raw command byte
    pub command: u8,
    /// Target -> host when set, host -> target when clear
    pub read: bool,
    /// Set by the target when the declared length did not match
    pub size_invalid: bool,
    /// Set by the target when the command was not recognised
    pub command_invalid: bool,
    /// Reserved
    pub reset: bool,
    /// Number of meaningful bytes in the data area
    pub data_length: u16,
}

/// Header bit positions
impl Header {
    const COMMAND_MASK: u32 = 0x0000_00FF;
    const READ_BIT: u32 = 1 << 8;
    const SIZE_INVALID_BIT: u32 = 1 << 12;
    const COMMAND_INVALID_BIT: u32 = 1 << 13;
    const RESET_BIT: u32 = 1 << 14;
    const DATA_LENGTH_SHIFT: u32 = 16;

    /// Header for a host request to read `len` bytes of target state
    pub const fn read_request(command: Command, len: u16) -> Self {
        Self {
            command: command as u8,
            read: true,
            size_invalid: false,
            command_invalid: false,
            reset: false,
            data_length: len,
        }
    }

    /// Header for a host request writing `len` bytes into target state
    pub const fn write_request(command: Command, len: u16) -> Self {
        Self {
            command: command as u8,
            read: false,
            size_invalid: false,
            command_invalid: false,
            reset: false,
            data_length: len,
        }
    }

    /// Decode the little-endian header word.  Reserved bits are ignored.
    pub const fn from_word(word: u32) -> Self {
        Self {
            command: (word & Self::COMMAND_MASK) as u8,
            read: word & Self::READ_BIT != 0,
            size_invalid: word & Self::SIZE_INVALID_BIT != 0,
            command_invalid: word & Self::COMMAND_INVALID_BIT != 0,
            reset: word & Self::RESET_BIT != 0,
            data_length: (word >> Self::DATA_LENGTH_SHIFT) as u16,
        }
    }

    /// Encode as the header word.  Reserved bits are always written as zero.
    pub const fn to_word(&self) -> u32 {
        let mut word = self.command as u32;
        if self.read {
            word |= Self::READ_BIT;
        }
        if self.size_invalid {
            word |= Self::SIZE_INVALID_BIT;
        }
        if self.command_invalid {
            word |= Self::COMMAND_INVALID_BIT;
        }
        if self.reset {
            word |= Self::RESET_BIT;
        }
        word | ((self.data_length as u32) << Self::DATA_LENGTH_SHIFT)
    }

    pub fn from_bytes(bytes: [u8; HEADER_SIZE]) -> Self {
        Self::from_word(u32::from_le_bytes(bytes))
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        self.to_word().to_le_bytes()
    }

    /// Decoded command, if it is a known one
    pub fn command(&self) -> Option<Command> {
        Command::from_u8(self.command)
    }

    /// Whether the frame is at rest, and the host owns it
    pub fn is_idle(&self) -> bool {
        self.command == Command::Idle as u8
    }
}

/// Frame offsets, relative to the frame's base address
pub struct FrameLayout;

impl FrameLayout {
    pub const fn header_offset() -> u32 {
        0
    }

    pub const fn data_offset() -> u32 {
        HEADER_SIZE as u32
    }

    pub const fn header_address(base: u32) -> u32 {
        base + Self::header_offset()
    }

    pub const fn data_address(base: u32) -> u32 {
        base + Self::data_offset()
    }
}

// Helper functions

fn check_base_addr(addr: u32) -> Result<()> {
    if addr % 4 != 0 {
        Err(Error::NotAligned)
    } else if addr.checked_add(FRAME_SIZE as u32 - 1).is_none() {
        Err(Error::AddressOverflow)
    } else {
        Ok(())
    }
}

fn check_payload_len(len: usize) -> Result<()> {
    if len > DATA_CAPACITY {
        Err(Error::PayloadTooLarge)
    } else {
        Ok(())
    }
}

/// Pack bytes into little-endian words, zero padding the final word
fn pack_words(bytes: &[u8], words: &mut [u32]) {
    for (word, chunk) in words.iter_mut().zip(bytes.chunks(4)) {
        let mut le = [0u8; 4];
        le[..chunk.len()].copy_from_slice(chunk);
        *word = u32::from_le_bytes(le);
    }
}

/// Unpack little-endian words into bytes, for as many bytes as `bytes` holds
fn unpack_words(words: &[u32], bytes: &mut [u8]) {
    for (chunk, word) in bytes.chunks_mut(4).zip(words.iter()) {
        let le = word.to_le_bytes();
        let len = chunk.len();
        chunk.copy_from_slice(&le[..len]);
    }
}
