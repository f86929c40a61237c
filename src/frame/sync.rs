//! Synchronous frame access - used by the Target, and by simulations.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::frame::{DATA_CAPACITY, FRAME_SIZE, FRAME_WORDS, FrameLayout, Header};
use crate::frame::{check_base_addr, check_payload_len, pack_words, unpack_words};
use crate::{Error, Result};

/// Words in the data area
const DATA_WORDS: usize = DATA_CAPACITY / 4;

/// Trait for accessing the frame in a shared medium (usually RAM).
///
/// Sync version, typically used for direct RAM access on the Target.
pub trait FrameIo {
    /// Atomic read u32 operation
    fn read_u32(&mut self, addr: u32) -> Result<u32>;

    /// Atomic write u32 operation
    fn write_u32(&mut self, addr: u32, value: u32) -> Result<()>;

    /// Bulk read access, no need for atomicity
    fn read_bulk(&mut self, addr: u32, buf: &mut [u32]) -> Result<()> {
        for (i, word) in buf.iter_mut().enumerate() {
            *word = self.read_u32(word_addr(addr, i)?)?;
        }
        Ok(())
    }

    /// Bulk write access, no need for atomicity
    fn write_bulk(&mut self, addr: u32, data: &[u32]) -> Result<()> {
        for (i, word) in data.iter().enumerate() {
            self.write_u32(word_addr(addr, i)?, *word)?;
        }
        Ok(())
    }
}

/// Address of the `index`th word from `addr`
fn word_addr(addr: u32, index: usize) -> Result<u32> {
    u32::try_from(index)
        .ok()
        .and_then(|i| i.checked_mul(4))
        .and_then(|offset| addr.checked_add(offset))
        .ok_or(Error::AddressOverflow)
}

impl<T: FrameIo + ?Sized> FrameIo for &mut T {
    fn read_u32(&mut self, addr: u32) -> Result<u32> {
        (**self).read_u32(addr)
    }

    fn write_u32(&mut self, addr: u32, value: u32) -> Result<()> {
        (**self).write_u32(addr, value)
    }

    fn read_bulk(&mut self, addr: u32, buf: &mut [u32]) -> Result<()> {
        (**self).read_bulk(addr, buf)
    }

    fn write_bulk(&mut self, addr: u32, data: &[u32]) -> Result<()> {
        (**self).write_bulk(addr, data)
    }
}

/// Synchronous view of a command frame at a fixed base address.
///
/// The header is always accessed as a single word, so each side's header
/// update is seen by the other side in one piece.
pub struct Frame<I: FrameIo> {
    io: I,
    base_addr: u32,
}

impl<I: FrameIo> Frame<I> {
    /// Attach to the frame at `base_addr`.  Does not touch the frame's
    /// contents.
    ///
    /// Arguments:
    /// - `io` - Object implementing [`FrameIo`] to access the shared medium
    /// - `base_addr` - Base address of the frame on that medium
    pub fn new(io: I, base_addr: u32) -> Result<Self> {
        check_base_addr(base_addr)?;
        Ok(Self { io, base_addr })
    }

    /// Base address of this frame
    pub fn base_addr(&self) -> u32 {
        self.base_addr
    }

    /// Read and decode the header word
    pub fn read_header(&mut self) -> Result<Header> {
        let word = self
            .io
            .read_u32(FrameLayout::header_address(self.base_addr))?;
        Ok(Header::from_word(word))
    }

    /// Encode and write the header word
    pub fn write_header(&mut self, header: &Header) -> Result<()> {
        self.io
            .write_u32(FrameLayout::header_address(self.base_addr), header.to_word())
    }

    /// Return the frame to its rest state - idle, no flags, no data.
    pub fn reset(&mut self) -> Result<()> {
        trace!("Resetting frame at {:#010X}", self.base_addr);
        self.write_header(&Header::default())
    }

    /// Read the first `buf.len()` bytes of the data area.
    pub fn read_data(&mut self, buf: &mut [u8]) -> Result<()> {
        check_payload_len(buf.len())?;

        let mut words = [0u32; DATA_WORDS];
        let word_count = buf.len().div_ceil(4);
        self.io.read_bulk(
            FrameLayout::data_address(self.base_addr),
            &mut words[..word_count],
        )?;
        unpack_words(&words[..word_count], buf);

        Ok(())
    }

    /// Write `data` to the start of the data area.  A trailing partial word
    /// is padded with zeros.
    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        check_payload_len(data.len())?;

        let mut words = [0u32; DATA_WORDS];
        let word_count = data.len().div_ceil(4);
        pack_words(data, &mut words[..word_count]);
        self.io
            .write_bulk(FrameLayout::data_address(self.base_addr), &words[..word_count])
    }

    /// Access the underlying medium
    pub fn io_mut(&mut self) -> &mut I {
        &mut self.io
    }

    /// Give back the underlying medium
    pub fn into_io(self) -> I {
        self.io
    }
}

/// Frame I/O implementation using direct RAM access.  Used by the Target.
#[derive(Clone, Copy)]
pub struct RamFrameIo;

impl RamFrameIo {
    /// Create a new RamFrameIo instance.
    ///
    /// ```ignore
    /// static mut FRAME_IO: RamFrameIo = RamFrameIo::new();
    /// ```
    // We need a new() rather than a default() as it must be const.
    #[allow(clippy::new_without_default)]
    pub const fn new() -> Self {
        Self {}
    }
}

impl FrameIo for RamFrameIo {
    fn read_u32(&mut self, addr: u32) -> Result<u32> {
        Ok(unsafe { core::ptr::read_volatile(addr as *const u32) })
    }

    fn write_u32(&mut self, addr: u32, value: u32) -> Result<()> {
        unsafe { core::ptr::write_volatile(addr as *mut u32, value) };
        Ok(())
    }
}

/// Frame I/O implementation over an owned frame image.
///
/// Stands in for the Target's memory when simulating a Target on the Host.
/// Accesses outside `base_addr..base_addr + FRAME_SIZE` fail with
/// [`Error::Io`].
#[derive(Debug, Clone)]
pub struct MemFrameIo {
    base_addr: u32,
    words: [u32; FRAME_WORDS],
}

impl MemFrameIo {
    pub const fn new(base_addr: u32) -> Self {
        Self {
            base_addr,
            words: [0; FRAME_WORDS],
        }
    }

    /// Byte-granular read, as a debug probe would perform it
    pub fn read_bytes(&self, addr: u32, buf: &mut [u8]) -> Result<()> {
        let start = self.byte_offset(addr, buf.len())?;
        for (i, byte) in buf.iter_mut().enumerate() {
            let offset = start + i;
            *byte = self.words[offset / 4].to_le_bytes()[offset % 4];
        }
        Ok(())
    }

    /// Byte-granular write, as a debug probe would perform it
    pub fn write_bytes(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        let start = self.byte_offset(addr, data.len())?;
        for (i, byte) in data.iter().enumerate() {
            let offset = start + i;
            let mut le = self.words[offset / 4].to_le_bytes();
            le[offset % 4] = *byte;
            self.words[offset / 4] = u32::from_le_bytes(le);
        }
        Ok(())
    }

    /// Snapshot of the whole frame, as it would appear in Target memory
    pub fn to_bytes(&self) -> [u8; FRAME_SIZE] {
        let mut bytes = [0u8; FRAME_SIZE];
        unpack_words(&self.words, &mut bytes);
        bytes
    }

    fn byte_offset(&self, addr: u32, len: usize) -> Result<usize> {
        let offset = addr.checked_sub(self.base_addr).ok_or(Error::Io)? as usize;
        if offset + len > FRAME_SIZE {
            Err(Error::Io)
        } else {
            Ok(offset)
        }
    }

    fn word_index(&self, addr: u32) -> Result<usize> {
        if addr % 4 != 0 {
            return Err(Error::NotAligned);
        }
        let offset = self.byte_offset(addr, 4)?;
        Ok(offset / 4)
    }
}

impl FrameIo for MemFrameIo {
    fn read_u32(&mut self, addr: u32) -> Result<u32> {
        let index = self.word_index(addr)?;
        Ok(self.words[index])
    }

    fn write_u32(&mut self, addr: u32, value: u32) -> Result<()> {
        let index = self.word_index(addr)?;
        self.words[index] = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Command, DEFAULT_FRAME_ADDR};

    #[test]
    fn test_header_lands_in_first_word() {
        let mut frame = Frame::new(MemFrameIo::new(DEFAULT_FRAME_ADDR), DEFAULT_FRAME_ADDR).unwrap();
        frame
            .write_header(&Header::read_request(Command::Keys, 66))
            .unwrap();

        let bytes = frame.io_mut().to_bytes();
        assert_eq!(&bytes[..4], &[0x03, 0x01, 0x42, 0x00]);
        assert_eq!(
            frame.read_header().unwrap(),
            Header::read_request(Command::Keys, 66)
        );
    }

    #[test]
    fn test_data_roundtrip_unaligned_length() {
        let mut frame = Frame::new(MemFrameIo::new(0x2000_0000), 0x2000_0000).unwrap();
        let data = [0xA5u8; 7];
        frame.write_data(&data).unwrap();

        let bytes = frame.io_mut().to_bytes();
        assert_eq!(&bytes[4..11], &data);
        assert_eq!(bytes[11], 0);

        let mut buf = [0u8; 7];
        frame.read_data(&mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn test_full_data_area() {
        let mut frame = Frame::new(MemFrameIo::new(0), 0).unwrap();
        let mut data = [0u8; DATA_CAPACITY];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = i as u8;
        }
        frame.write_data(&data).unwrap();
        assert_eq!(frame.io_mut().to_bytes()[FRAME_SIZE - 1], 123);

        let too_big = [0u8; DATA_CAPACITY + 1];
        assert_eq!(frame.write_data(&too_big), Err(Error::PayloadTooLarge));
    }

    #[test]
    fn test_reset_clears_header() {
        let mut frame = Frame::new(MemFrameIo::new(0), 0).unwrap();
        frame
            .write_header(&Header {
                command: 0x42,
                read: true,
                size_invalid: true,
                command_invalid: true,
                reset: true,
                data_length: 0xFFFF,
            })
            .unwrap();
        frame.reset().unwrap();
        assert_eq!(frame.read_header().unwrap(), Header::default());
    }

    #[test]
    fn test_unaligned_base_rejected() {
        assert!(matches!(
            Frame::new(MemFrameIo::new(0), 2),
            Err(Error::NotAligned)
        ));
    }

    #[test]
    fn test_base_at_top_of_memory_rejected() {
        assert!(matches!(
            Frame::new(MemFrameIo::new(0xFFFF_FFFC), 0xFFFF_FFFC),
            Err(Error::AddressOverflow)
        ));

        // The highest base whose frame still fits
        let mut frame = Frame::new(MemFrameIo::new(0xFFFF_FF80), 0xFFFF_FF80).unwrap();
        let data = [0x5Au8; DATA_CAPACITY];
        frame.write_data(&data).unwrap();
        let mut buf = [0u8; DATA_CAPACITY];
        frame.read_data(&mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn test_bulk_past_address_space_fails() {
        let mut io = MemFrameIo::new(0xFFFF_FF80);
        let mut words = [0u32; 2];
        assert_eq!(
            io.read_bulk(0xFFFF_FFFC, &mut words),
            Err(Error::AddressOverflow)
        );
        assert_eq!(
            io.write_bulk(0xFFFF_FFFC, &[1, 2]),
            Err(Error::AddressOverflow)
        );
    }

    #[test]
    fn test_mem_io_bounds() {
        let mut io = MemFrameIo::new(0x1000);
        assert_eq!(io.read_u32(0x0FFC), Err(Error::Io));
        assert_eq!(io.read_u32(0x1080), Err(Error::Io));
        assert_eq!(io.read_u32(0x1002), Err(Error::NotAligned));
        assert_eq!(io.write_bytes(0x107F, &[1, 2]), Err(Error::Io));

        io.write_bytes(0x1005, &[0xAB]).unwrap();
        assert_eq!(io.read_u32(0x1004).unwrap(), 0x0000_AB00);
    }
}
