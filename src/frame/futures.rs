//! Asynchronous frame access - typically used by a Host.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use alloc::boxed::Box;
use async_trait::async_trait;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::frame::{DATA_CAPACITY, FRAME_SIZE, FRAME_WORDS, FrameLayout, Header};
use crate::frame::{check_base_addr, check_payload_len, pack_words, unpack_words};
use crate::io::{Reader, Writer};
use crate::{Error, Result};

/// Words in the data area
const DATA_WORDS: usize = DATA_CAPACITY / 4;

/// Trait for accessing the frame in a shared medium (usually RAM).
///
/// Async version, typically used for accessing the medium over SWD or
/// other asynchronous protocols.
#[async_trait(?Send)]
pub trait AsyncFrameIo {
    /// Atomic read u32 operation
    async fn read_u32(&mut self, addr: u32) -> Result<u32>;

    /// Atomic write u32 operation
    async fn write_u32(&mut self, addr: u32, value: u32) -> Result<()>;

    /// Bulk read access, no need for atomicity
    async fn read_bulk(&mut self, addr: u32, buf: &mut [u32]) -> Result<()>;

    /// Bulk write access, no need for atomicity
    async fn write_bulk(&mut self, addr: u32, data: &[u32]) -> Result<()>;
}

/// Asynchronous view of a command frame at a fixed base address.
pub struct AsyncFrame<'a, I: AsyncFrameIo> {
    io: &'a mut I,
    base_addr: u32,
}

impl<'a, I: AsyncFrameIo> AsyncFrame<'a, I> {
    /// Attach to the frame at `base_addr`.  Does not touch the frame's
    /// contents.
    ///
    /// Arguments:
    /// - `io` - Object implementing [`AsyncFrameIo`] to access the shared
    ///   medium
    /// - `base_addr` - Base address of the frame on that medium
    pub fn new(io: &'a mut I, base_addr: u32) -> Result<Self> {
        check_base_addr(base_addr)?;
        Ok(Self { io, base_addr })
    }

    /// Read and decode the header word
    pub async fn read_header(&mut self) -> Result<Header> {
        let word = self
            .io
            .read_u32(FrameLayout::header_address(self.base_addr))
            .await?;
        Ok(Header::from_word(word))
    }

    /// Encode and write the header word
    pub async fn write_header(&mut self, header: &Header) -> Result<()> {
        self.io
            .write_u32(FrameLayout::header_address(self.base_addr), header.to_word())
            .await
    }

    /// Read the first `buf.len()` bytes of the data area.
    pub async fn read_data(&mut self, buf: &mut [u8]) -> Result<()> {
        check_payload_len(buf.len())?;

        let mut words = [0u32; DATA_WORDS];
        let word_count = buf.len().div_ceil(4);
        self.io
            .read_bulk(
                FrameLayout::data_address(self.base_addr),
                &mut words[..word_count],
            )
            .await?;
        unpack_words(&words[..word_count], buf);

        Ok(())
    }

    /// Write `data` to the start of the data area.  A trailing partial word
    /// is padded with zeros.
    pub async fn write_data(&mut self, data: &[u8]) -> Result<()> {
        check_payload_len(data.len())?;

        let mut words = [0u32; DATA_WORDS];
        let word_count = data.len().div_ceil(4);
        pack_words(data, &mut words[..word_count]);
        self.io
            .write_bulk(
                FrameLayout::data_address(self.base_addr),
                &words[..word_count],
            )
            .await
    }
}

/// Async Reader/Writer frame type.  Typically used by a Host.
// AsyncFrame and ReaderWriterFrameIo have different lifetimes so that
// borrowing of both is decoupled.
pub type ReaderWriterFrame<'a, 'b, R, W> = AsyncFrame<'a, ReaderWriterFrameIo<'b, R, W>>;

/// Frame I/O implementation using [`crate::io::Reader`] and
/// [`crate::io::Writer`] traits.
pub struct ReaderWriterFrameIo<'a, R: Reader, W: Writer> {
    reader: &'a mut R,
    writer: &'a mut W,
}

impl<'a, R: Reader, W: Writer> ReaderWriterFrameIo<'a, R, W> {
    /// Create new instance
    pub fn new(reader: &'a mut R, writer: &'a mut W) -> Self {
        Self { reader, writer }
    }
}

#[async_trait(?Send)]
impl<R: Reader, W: Writer> AsyncFrameIo for ReaderWriterFrameIo<'_, R, W> {
    async fn read_u32(&mut self, addr: u32) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.reader.read(addr, &mut buf).await.map_err(|e| {
            warn!("Read of {addr:#010X} failed: {e:?}");
            Error::Io
        })?;
        Ok(u32::from_le_bytes(buf))
    }

    async fn write_u32(&mut self, addr: u32, value: u32) -> Result<()> {
        self.writer
            .write(addr, &value.to_le_bytes())
            .await
            .map_err(|e| {
                warn!("Write of {addr:#010X} failed: {e:?}");
                Error::Io
            })
    }

    async fn read_bulk(&mut self, addr: u32, buf: &mut [u32]) -> Result<()> {
        if buf.len() > FRAME_WORDS {
            return Err(Error::BufferTooSmall);
        }

        let mut bytes = [0u8; FRAME_SIZE];
        let byte_buf = &mut bytes[..buf.len() * 4];
        self.reader.read(addr, byte_buf).await.map_err(|e| {
            warn!("Bulk read of {addr:#010X} failed: {e:?}");
            Error::Io
        })?;

        for (word, chunk) in buf.iter_mut().zip(byte_buf.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(())
    }

    async fn write_bulk(&mut self, addr: u32, data: &[u32]) -> Result<()> {
        if data.len() > FRAME_WORDS {
            return Err(Error::PayloadTooLarge);
        }

        let mut bytes = [0u8; FRAME_SIZE];
        for (chunk, word) in bytes.chunks_exact_mut(4).zip(data.iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        self.writer
            .write(addr, &bytes[..data.len() * 4])
            .await
            .map_err(|e| {
                warn!("Bulk write of {addr:#010X} failed: {e:?}");
                Error::Io
            })
    }
}
