//! Shared-memory command frame for talking to a running microcontroller through a debug
//! probe, while the target's CPU keeps executing.
//!
//! A single fixed-layout frame lives at a pre-agreed address in the target's memory.  The
//! host writes a request into it over the debug channel (SWD via CMSIS-DAP, for example),
//! the target notices, services the request against its own state, writes the response
//! back into the same frame and signals completion by returning the command byte to idle.
//!
//! `no_std`.  Requires `alloc` for the async host driver.
//!
//! ## Frame layout
//!
//! All multi-byte values are little-endian.  The header is a single 32-bit word so that
//! the host and target can each update it with one atomic word access.
//!
//! ```text
//! offset 0x00: header (4 bytes)
//!   bits  0-7  : command        (0 = idle, 0xFF = exit)
//!   bit   8    : read           (1 = target -> host, 0 = host -> target)
//!   bits  9-11 : reserved
//!   bit   12   : size invalid   (set by target)
//!   bit   13   : command invalid(set by target)
//!   bit   14   : reset          (reserved)
//!   bit   15   : reserved
//!   bits 16-31 : data length
//! offset 0x04: data (124 bytes)
//! ```
//!
//! ## Protocol
//!
//! The command byte is the only synchronisation primitive.  There are no sequence
//! numbers, so the host must:
//! 1. Check the command is idle before starting an exchange
//! 2. Write any payload into the data area
//! 3. Write the header word last - a non-idle command hands the frame to the target
//! 4. Poll the header until the command returns to idle
//! 5. Check the invalid flags and read `data length` bytes of response
//!
//! The target services each request exactly once and always completes it, flagging
//! unknown commands and length mismatches in the response header rather than failing.
//!
//! ## Modules
//!
//! - [`frame`] - The wire contract, and frame access over a memory medium
//! - [`device`] - Target state the dispatcher serves, and the records it exchanges
//! - [`dispatcher`] - Target-side state machine servicing the frame
//! - [`client`] - Host driver implementing the host's protocol obligations
//! - [`io`] - Async I/O traits for debug interface access to target memory
//!
//! **Target setup**:
//! 1. Reserve 128 bytes at the agreed address, e.g. in the linker script
//! 2. Build a [`device::DeviceContext`] from your key store, indicator outputs and ADC
//! 3. Create a [`dispatcher::Dispatcher`] with a [`frame::RamFrameIo`]
//! 4. Call [`dispatcher::Dispatcher::run()`] - it returns when the host sends `Exit`
//!
//! **Host setup**:
//! 1. Implement [`io::Reader`] and [`io::Writer`] over your debug probe
//! 2. Create a [`client::AsyncCommClient`] with a [`client::CommClientConfig`]
//! 3. Use its typed operations, then [`client::AsyncCommClient::exit()`] to release the
//!    target
//!
//! ## Features
//!
//! Default features:
//! - `async` - Enable the async frame accessor and host driver (requires `alloc`).
//!
//! Optional features:
//! - `mock` - Fake device collaborators, for simulating a target on the host.
//!
//! Compile with `--no-default-features` for a target.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#![no_std]

#[cfg(feature = "async")]
extern crate alloc;

pub mod client;
pub mod device;
pub mod dispatcher;
pub mod frame;
pub mod io;

/// Frame access and protocol errors
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// Frame is not idle, an exchange is already in flight
    Busy,
    /// Timeout waiting for the target to return the frame to idle
    Timeout,
    /// Invalid operation for the current state
    InvalidOperation,
    /// Payload too large for the frame's data area
    PayloadTooLarge,
    /// Buffer too small for operation
    BufferTooSmall,
    /// Command byte is not one of the known commands
    UnknownCommand(u8),
    /// Target flagged the command as invalid
    CommandInvalid,
    /// Target flagged a mismatch between declared and actual data length
    SizeInvalid,
    /// Target reports it has been reset
    TargetReset,
    /// I/O error
    Io,
    /// Frame address not aligned
    NotAligned,
    /// Frame would extend past the end of the address space
    AddressOverflow,
}

/// Type to represent the result of a frame operation
pub type Result<T> = core::result::Result<T, Error>;
