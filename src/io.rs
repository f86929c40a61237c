//! Async I/O traits for reaching the Target's memory through a debug probe.
//!
//! The Host never loads or stores the frame directly.  Every access goes out
//! over the probe's own wire protocol, for example CMSIS-DAP over USB HID
//! driving SWD memory access port transfers, while the Target keeps running.
//! These traits are the seam between this crate and that transport.
//!
//! # Possible implementations
//!
//! - CMSIS-DAP, J-Link or ST-Link probes performing AHB-AP reads/writes
//! - An SWD bit-bang implementation on a co-processor
//! - A simulated Target's memory, for testing
//!
//! # Address Space
//!
//! Addresses are absolute, as they appear in the Target's memory map, e.g.
//! [`crate::frame::DEFAULT_FRAME_ADDR`].  Header accesses are always 4 bytes
//! at a 4-byte aligned address, and implementations must perform them as a
//! single word transfer so neither side observes a torn header.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

/// Reader trait.
pub trait Reader {
    /// The error type returned by read operations, usually the probe
    /// transport's own error.
    type Error: core::fmt::Debug;

    /// Read `buf.len()` bytes of Target memory starting at `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe transfer fails, for example because
    /// the Target is not attached, or the access port reports a fault.
    fn read(
        &mut self,
        addr: u32,
        buf: &mut [u8],
    ) -> impl core::future::Future<Output = Result<(), Self::Error>> + Send;
}

/// Writer trait.
pub trait Writer {
    /// The error type returned by write operations.
    type Error: core::fmt::Debug;

    /// Write `data` into Target memory starting at `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe transfer fails.
    fn write(
        &mut self,
        addr: u32,
        data: &[u8],
    ) -> impl core::future::Future<Output = Result<(), Self::Error>> + Send;
}
