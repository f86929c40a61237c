//! Asynchronous Client - typically used by a Host.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use alloc::vec;
use alloc::vec::Vec;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::client::CommClientConfig;
use crate::device::{FirmwareInfo, LoRaWanKeys, StackInfo};
use crate::frame::{AsyncFrame, AsyncFrameIo, Command, DATA_CAPACITY, Header};
use crate::frame::{ReaderWriterFrame, ReaderWriterFrameIo};
use crate::io::{Reader, Writer};
use crate::{Error, Result};

/// Yield delay for async polling loops.
///
/// Application must provide an implementation of this trait in order for the
/// async client to be able to yield while the Target services a request.
///
/// This trait keeps `dap-comm` free of any specific async runtime.
///
/// Example:
///
/// ```ignore
/// use embassy_time::{Duration, Timer};
/// struct Delay;
/// impl AsyncDelay for Delay {
///     async fn delay() {
///         Timer::after(Duration::from_millis(1)).await;
///     }
/// }
/// ```
pub trait AsyncDelay {
    fn delay() -> impl Future<Output = ()>;
}

/// Async Host driver for the command frame.
///
/// See [`AsyncDelay`] for required delay trait.
///
/// Example usage:
///
/// ```ignore
/// use dap_comm::client::{AsyncCommClient, CommClientConfig};
///
/// let mut reader = ...; // implement Reader trait over your probe
/// let mut writer = ...; // implement Writer trait over your probe
/// let mut client =
///     AsyncCommClient::<_, _, Delay>::new(&mut reader, &mut writer, CommClientConfig::default());
/// let firmware = client.firmware_info().await?;
/// client.set_leds(0x0000_0101).await?;
/// client.exit().await?;
/// ```
pub struct AsyncCommClient<'a, R: Reader, W: Writer, D: AsyncDelay> {
    io: ReaderWriterFrameIo<'a, R, W>,
    config: CommClientConfig,
    _delay: core::marker::PhantomData<D>,
}

impl<'a, R: Reader, W: Writer, D: AsyncDelay> AsyncCommClient<'a, R, W, D> {
    /// Create a new AsyncCommClient
    ///
    /// Arguments:
    /// - `reader`: Reader object to read from target
    /// - `writer`: Writer object to write to target
    /// - `config`: Frame location and polling limit
    pub fn new(reader: &'a mut R, writer: &'a mut W, config: CommClientConfig) -> Self {
        Self {
            io: ReaderWriterFrameIo::new(reader, writer),
            config,
            _delay: core::marker::PhantomData,
        }
    }

    pub fn config(&self) -> &CommClientConfig {
        &self.config
    }

    /// Read the Target's radio stack status and version
    pub async fn stack_info(&mut self) -> Result<StackInfo> {
        let data = self.read_command(Command::InfoStack, StackInfo::SIZE).await?;
        StackInfo::from_bytes(&data)
    }

    /// Read the Target's firmware build metadata
    pub async fn firmware_info(&mut self) -> Result<FirmwareInfo> {
        let data = self
            .read_command(Command::InfoFirmware, FirmwareInfo::SIZE)
            .await?;
        FirmwareInfo::from_bytes(&data)
    }

    /// Read the Target's LoRaWAN key material
    pub async fn keys(&mut self) -> Result<LoRaWanKeys> {
        let data = self.read_command(Command::Keys, LoRaWanKeys::SIZE).await?;
        LoRaWanKeys::from_bytes(&data)
    }

    /// Replace the Target's LoRaWAN key material
    pub async fn set_keys(&mut self, keys: &LoRaWanKeys) -> Result<()> {
        self.write_command(Command::Keys, &keys.to_bytes()).await
    }

    /// Have the Target take a fresh ADC sample, returned in millivolts
    pub async fn adc_millivolts(&mut self) -> Result<i32> {
        let data = self.read_command(Command::AdcValue, 4).await?;
        Ok(i32::from_le_bytes(word_bytes(&data)?))
    }

    /// Read the Target's indicator bitmask
    pub async fn leds(&mut self) -> Result<u32> {
        let data = self.read_command(Command::Leds, 4).await?;
        Ok(u32::from_le_bytes(word_bytes(&data)?))
    }

    /// Set the Target's indicator bitmask.  Bit 0 is red, bit 8 is blue.
    pub async fn set_leds(&mut self, state: u32) -> Result<()> {
        self.write_command(Command::Leds, &state.to_le_bytes())
            .await
    }

    /// Release the Target from its dispatch loop.  Nothing services the
    /// frame afterwards, so further requests will time out.
    pub async fn exit(&mut self) -> Result<()> {
        self.write_command(Command::Exit, &0u32.to_le_bytes())
            .await
    }

    /// Ask the Target for `len` bytes of the state named by `command`.
    ///
    /// Returns:
    /// - `Ok(response_data)`: exactly the number of bytes the Target produced
    /// - `Err(error)`: the frame was busy, the Target did not respond in
    ///   time, or it flagged the request
    pub async fn read_command(&mut self, command: Command, len: usize) -> Result<Vec<u8>> {
        if len > DATA_CAPACITY {
            return Err(Error::PayloadTooLarge);
        }
        debug!("Starting {command:?} read ({len} bytes)");

        let max_polls = self.config.max_polls;
        let mut frame = self.frame()?;
        check_idle(&mut frame).await?;

        frame
            .write_header(&Header::read_request(command, len as u16))
            .await?;

        let response = wait_for_idle::<_, D>(&mut frame, max_polls).await?;
        let response_len = response.data_length as usize;
        if response_len > DATA_CAPACITY {
            return Err(Error::PayloadTooLarge);
        }

        let mut data = vec![0u8; response_len];
        frame.read_data(&mut data).await?;

        debug!("{command:?} read completed ({response_len} bytes)");
        Ok(data)
    }

    /// Hand `data` to the state named by `command`.
    pub async fn write_command(&mut self, command: Command, data: &[u8]) -> Result<()> {
        if data.len() > DATA_CAPACITY {
            return Err(Error::PayloadTooLarge);
        }
        debug!("Starting {command:?} write ({} bytes)", data.len());

        let max_polls = self.config.max_polls;
        let mut frame = self.frame()?;
        check_idle(&mut frame).await?;

        // Data first - the header hands the frame to the Target
        frame.write_data(data).await?;
        frame
            .write_header(&Header::write_request(command, data.len() as u16))
            .await?;

        wait_for_idle::<_, D>(&mut frame, max_polls).await?;

        debug!("{command:?} write completed");
        Ok(())
    }

    fn frame<'method>(&'method mut self) -> Result<ReaderWriterFrame<'method, 'a, R, W>> {
        ReaderWriterFrame::new(&mut self.io, self.config.frame_addr)
    }
}

async fn check_idle<I: AsyncFrameIo>(frame: &mut AsyncFrame<'_, I>) -> Result<()> {
    let header = frame.read_header().await?;
    if header.is_idle() {
        Ok(())
    } else {
        warn!(
            "Frame busy with command {:#04X}, not starting request",
            header.command
        );
        Err(Error::Busy)
    }
}

async fn wait_for_idle<I: AsyncFrameIo, D: AsyncDelay>(
    frame: &mut AsyncFrame<'_, I>,
    max_polls: u32,
) -> Result<Header> {
    for _ in 0..max_polls {
        let header = frame.read_header().await?;
        if header.is_idle() {
            return check_response(header);
        }

        D::delay().await;
    }

    warn!("No response from target after {max_polls} polls");
    Err(Error::Timeout)
}

fn check_response(header: Header) -> Result<Header> {
    if header.command_invalid {
        warn!("Target flagged command as invalid");
        Err(Error::CommandInvalid)
    } else if header.size_invalid {
        warn!(
            "Target flagged data length, actual length {}",
            header.data_length
        );
        Err(Error::SizeInvalid)
    } else if header.reset {
        warn!("Target reports reset");
        Err(Error::TargetReset)
    } else {
        Ok(header)
    }
}

fn word_bytes(data: &[u8]) -> Result<[u8; 4]> {
    match data {
        [a, b, c, d, ..] => Ok([*a, *b, *c, *d]),
        _ => Err(Error::BufferTooSmall),
    }
}
