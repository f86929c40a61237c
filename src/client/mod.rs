//! Host driver for the command frame.
//!
//! The driver carries the Host's side of the protocol, which the Target does
//! not enforce:
//! - Never start an exchange while the frame is not idle
//! - Write the payload before the header, so the Target never sees a request
//!   without its data
//! - Wait for the command to return to idle before touching the response,
//!   giving up after a bounded number of polls
//!
//! See [`AsyncCommClient`] for async client usage, for example on a Host.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[cfg(feature = "async")]
pub mod futures;

#[cfg(feature = "async")]
pub use futures::{AsyncCommClient, AsyncDelay};

use crate::frame::DEFAULT_FRAME_ADDR;

/// Default number of header polls before giving up on the Target
pub const DEFAULT_MAX_POLLS: u32 = 100;

/// Configuration for creating a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommClientConfig {
    /// Address of the frame in Target memory
    pub frame_addr: u32,
    /// Header polls to wait for the Target to complete a request, with a
    /// delay between each
    pub max_polls: u32,
}

impl Default for CommClientConfig {
    fn default() -> Self {
        Self {
            frame_addr: DEFAULT_FRAME_ADDR,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }
}
