//! Target-side dispatcher, servicing requests the Host leaves in the frame.
//!
//! On the Target the dispatcher is run once, early in startup, and owns the
//! CPU until the Host sends [`Command::Exit`]:
//!
//! ```ignore
//! let io = RamFrameIo::new();
//! let mut dispatcher = Dispatcher::new(io, DEFAULT_FRAME_ADDR, device)?;
//! dispatcher.run()?;
//! // Carry on with normal startup
//! ```
//!
//! Elsewhere, e.g. in a simulation, [`Dispatcher::poll()`] services at most
//! one request per call, so the caller decides when the "Target" runs.
//!
//! Each non-idle request is serviced to completion in the pass that sees it.
//! Unknown commands and length mismatches are reported through the response
//! header's flags, and the exchange still completes.  The response header is
//! always written last, as a single word, with the command back at idle.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::device::{Device, LoRaWanKeys};
use crate::frame::{Command, Frame, FrameIo, Header};
use crate::{Error, Result};

/// Dispatcher lifecycle.  `Exited` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Servicing the frame, no request pending
    Idle,
    /// Host sent `Exit`
    Exited,
}

/// Summary of one serviced request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exchange {
    /// Raw command byte as the Host wrote it
    pub command: u8,
    pub read: bool,
    /// Length the Host declared
    pub declared_length: u16,
    /// Length actually produced or consumed
    pub actual_length: u16,
    pub size_invalid: bool,
    pub command_invalid: bool,
}

/// Result of a single [`Dispatcher::poll()`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing pending, the frame was not modified
    Idle,
    /// A request was serviced and the frame returned to idle
    Serviced(Exchange),
    /// Host sent `Exit`.  The frame is idle and the dispatcher is done.
    Exited,
}

/// Services the command frame on behalf of a [`Device`].
pub struct Dispatcher<I: FrameIo, D: Device> {
    frame: Frame<I>,
    device: D,
    state: DispatcherState,
}

impl<I: FrameIo, D: Device> Dispatcher<I, D> {
    /// Create the dispatcher and reset the frame to idle, discarding
    /// anything the Host left there before the Target started.
    ///
    /// Arguments:
    /// - `io` - Object implementing [`FrameIo`] to access the frame
    /// - `base_addr` - Address of the frame, as agreed with the Host
    /// - `device` - Target state to serve
    pub fn new(io: I, base_addr: u32, device: D) -> Result<Self> {
        let mut frame = Frame::new(io, base_addr)?;
        frame.reset()?;

        debug!("Dispatcher ready, frame at {base_addr:#010X}");

        Ok(Self {
            frame,
            device,
            state: DispatcherState::Idle,
        })
    }

    /// Busy-poll the frame until the Host sends `Exit`.
    ///
    /// Only returns early if the frame medium fails, which direct RAM
    /// access never does.
    pub fn run(&mut self) -> Result<()> {
        loop {
            if let PollOutcome::Exited = self.poll()? {
                return Ok(());
            }
        }
    }

    /// Look at the frame once, servicing any pending request.
    ///
    /// Returns [`Error::InvalidOperation`] once the dispatcher has exited.
    pub fn poll(&mut self) -> Result<PollOutcome> {
        if self.state == DispatcherState::Exited {
            return Err(Error::InvalidOperation);
        }

        let request = self.frame.read_header()?;
        if request.is_idle() {
            return Ok(PollOutcome::Idle);
        }

        if !request.read && request.command() == Some(Command::Exit) {
            return self.exit(request);
        }

        // Snapshot the declared length before the response overwrites it
        let declared_length = request.data_length;

        let actual = if request.read {
            self.service_read(request.command())?
        } else {
            self.service_write(request.command())?
        };

        let command_invalid = actual.is_none();
        let actual_length = actual.unwrap_or(0) as u16;
        let size_invalid = declared_length != actual_length;

        let response = Header {
            command: Command::Idle.as_u8(),
            read: request.read,
            size_invalid,
            command_invalid,
            reset: request.reset,
            data_length: actual_length,
        };

        // Completion signal - must be the last write of the exchange
        self.frame.write_header(&response)?;

        let exchange = Exchange {
            command: request.command,
            read: request.read,
            declared_length,
            actual_length,
            size_invalid,
            command_invalid,
        };

        if command_invalid {
            warn!(
                "Invalid command {:#04X} ({})",
                request.command,
                direction(request.read)
            );
        } else if size_invalid {
            warn!(
                "{:?} {}: declared {declared_length} bytes, actual {actual_length}",
                request.command(),
                direction(request.read)
            );
        } else {
            debug!(
                "{:?} {}: {actual_length} bytes",
                request.command(),
                direction(request.read)
            );
        }

        Ok(PollOutcome::Serviced(exchange))
    }

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Access the frame medium, e.g. to stand in for the Host in a
    /// simulation
    pub fn io_mut(&mut self) -> &mut I {
        self.frame.io_mut()
    }

    /// Give back the frame medium and the device
    pub fn into_parts(self) -> (I, D) {
        (self.frame.into_io(), self.device)
    }
}

// Internal functions
impl<I: FrameIo, D: Device> Dispatcher<I, D> {
    /// Copy a snapshot of the requested state into the data area.
    ///
    /// Returns the number of bytes produced, or `None` if the command cannot
    /// be read.
    fn service_read(&mut self, command: Option<Command>) -> Result<Option<usize>> {
        let len = match command {
            Some(Command::InfoStack) => {
                let info = self.device.stack_info();
                self.put(&info.to_bytes())?
            }
            Some(Command::InfoFirmware) => {
                let info = self.device.firmware_info();
                self.put(&info.to_bytes())?
            }
            Some(Command::Keys) => {
                let keys = self.device.keys();
                self.put(&keys.to_bytes())?
            }
            Some(Command::AdcValue) => {
                let millivolts = self.device.sample_adc_millivolts();
                trace!("ADC sample {millivolts} mV");
                self.put(&millivolts.to_le_bytes())?
            }
            Some(Command::Leds) => {
                let state = self.device.indicators();
                self.put(&state.to_le_bytes())?
            }
            _ => return Ok(None),
        };
        Ok(Some(len))
    }

    /// Apply the data area to the requested state, consuming exactly that
    /// state's size regardless of the declared length.
    ///
    /// Returns the number of bytes consumed, or `None` if the command cannot
    /// be written.
    fn service_write(&mut self, command: Option<Command>) -> Result<Option<usize>> {
        match command {
            Some(Command::Keys) => {
                let mut buf = [0u8; LoRaWanKeys::SIZE];
                self.frame.read_data(&mut buf)?;
                let keys = LoRaWanKeys::from_bytes(&buf)?;
                self.device.store_keys(keys);
                Ok(Some(buf.len()))
            }
            Some(Command::Leds) => {
                let mut buf = [0u8; 4];
                self.frame.read_data(&mut buf)?;
                let state = u32::from_le_bytes(buf);
                trace!("Indicators {state:#010X}");
                self.device.set_indicators(state);
                Ok(Some(buf.len()))
            }
            _ => Ok(None),
        }
    }

    /// Return the frame to idle without touching the data area, and stop.
    fn exit(&mut self, request: Header) -> Result<PollOutcome> {
        let response = Header {
            command: Command::Idle.as_u8(),
            ..request
        };
        self.frame.write_header(&response)?;
        self.state = DispatcherState::Exited;

        info!("Host requested exit, leaving dispatcher");

        Ok(PollOutcome::Exited)
    }

    fn put(&mut self, bytes: &[u8]) -> Result<usize> {
        self.frame.write_data(bytes)?;
        Ok(bytes.len())
    }
}

fn direction(read: bool) -> &'static str {
    if read { "read" } else { "write" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::{self, MockDevice};
    use crate::device::{FirmwareInfo, OtaaKeys, StackInfo};
    use crate::frame::{DATA_CAPACITY, FRAME_SIZE, MemFrameIo};

    const BASE: u32 = 0x0803_8000;

    fn dispatcher() -> Dispatcher<MemFrameIo, MockDevice> {
        Dispatcher::new(MemFrameIo::new(BASE), BASE, mock::device()).unwrap()
    }

    /// Stand in for the Host: payload first, header last
    fn host_request(d: &mut Dispatcher<MemFrameIo, MockDevice>, header: Header, data: &[u8]) {
        let mut frame = Frame::new(d.io_mut(), BASE).unwrap();
        frame.write_data(data).unwrap();
        frame.write_header(&header).unwrap();
    }

    fn host_header(d: &mut Dispatcher<MemFrameIo, MockDevice>) -> Header {
        Frame::new(d.io_mut(), BASE).unwrap().read_header().unwrap()
    }

    fn host_data(d: &mut Dispatcher<MemFrameIo, MockDevice>, len: usize) -> [u8; DATA_CAPACITY] {
        let mut buf = [0u8; DATA_CAPACITY];
        Frame::new(d.io_mut(), BASE)
            .unwrap()
            .read_data(&mut buf[..len])
            .unwrap();
        buf
    }

    #[test]
    fn test_new_resets_frame() {
        let mut io = MemFrameIo::new(BASE);
        io.write_u32(BASE, 0xFFFF_FFFF).unwrap();
        let mut d = Dispatcher::new(io, BASE, mock::device()).unwrap();
        assert_eq!(host_header(&mut d), Header::default());
        assert!(!host_header(&mut d).reset);
        assert_eq!(d.state(), DispatcherState::Idle);
    }

    #[test]
    fn test_idle_poll_is_idempotent() {
        let mut d = dispatcher();
        d.io_mut().write_bytes(BASE + 4, &[0x5A; DATA_CAPACITY]).unwrap();
        // Idle command, but length and flags set
        d.io_mut().write_u32(BASE, 0x0010_3000).unwrap();
        let before = d.io_mut().to_bytes();

        for _ in 0..10 {
            assert_eq!(d.poll(), Ok(PollOutcome::Idle));
        }
        assert_eq!(d.io_mut().to_bytes(), before);
    }

    #[test]
    fn test_read_firmware_info() {
        let mut d = dispatcher();
        host_request(
            &mut d,
            Header::read_request(Command::InfoFirmware, FirmwareInfo::SIZE as u16),
            &[],
        );

        let outcome = d.poll().unwrap();
        let PollOutcome::Serviced(exchange) = outcome else {
            panic!("Expected a serviced request, got {outcome:?}");
        };
        assert!(!exchange.size_invalid);
        assert!(!exchange.command_invalid);

        let header = host_header(&mut d);
        assert!(header.is_idle());
        assert!(header.read);
        assert!(!header.size_invalid);
        assert_eq!(header.data_length as usize, FirmwareInfo::SIZE);

        let data = host_data(&mut d, FirmwareInfo::SIZE);
        assert_eq!(
            FirmwareInfo::from_bytes(&data[..FirmwareInfo::SIZE]).unwrap(),
            mock::firmware_info()
        );
    }

    #[test]
    fn test_read_stack_info() {
        let mut d = dispatcher();
        host_request(&mut d, Header::read_request(Command::InfoStack, 40), &[]);
        d.poll().unwrap();

        let header = host_header(&mut d);
        assert_eq!(header.data_length as usize, StackInfo::SIZE);
        let data = host_data(&mut d, StackInfo::SIZE);
        let info = StackInfo::from_bytes(&data[..StackInfo::SIZE]).unwrap();
        assert_eq!(info, mock::stack_info());
        assert_eq!(info.code_name_str(), Some("Maestro"));
    }

    #[test]
    fn test_size_mismatch_flagged() {
        let mut d = dispatcher();
        host_request(&mut d, Header::read_request(Command::InfoFirmware, 1), &[]);

        let outcome = d.poll().unwrap();
        let PollOutcome::Serviced(exchange) = outcome else {
            panic!("Expected a serviced request, got {outcome:?}");
        };
        assert_eq!(exchange.declared_length, 1);
        assert_eq!(exchange.actual_length as usize, FirmwareInfo::SIZE);

        let header = host_header(&mut d);
        assert!(header.is_idle());
        assert!(header.size_invalid);
        assert!(!header.command_invalid);
        assert_eq!(header.data_length as usize, FirmwareInfo::SIZE);
    }

    #[test]
    fn test_unknown_command_flagged() {
        let mut d = dispatcher();
        host_request(
            &mut d,
            Header {
                command: 0x42,
                read: true,
                ..Header::default()
            },
            &[],
        );
        d.poll().unwrap();

        let header = host_header(&mut d);
        assert!(header.is_idle());
        assert!(header.command_invalid);
        assert!(!header.size_invalid);
        assert_eq!(header.data_length, 0);
    }

    #[test]
    fn test_unknown_write_with_length_flags_both() {
        let mut d = dispatcher();
        host_request(
            &mut d,
            Header::write_request(Command::InfoStack, 4),
            &[1, 2, 3, 4],
        );
        d.poll().unwrap();

        let header = host_header(&mut d);
        assert!(header.is_idle());
        assert!(header.command_invalid);
        assert!(header.size_invalid);
        assert_eq!(header.data_length, 0);
    }

    #[test]
    fn test_exit_read_is_invalid() {
        let mut d = dispatcher();
        host_request(&mut d, Header::read_request(Command::Exit, 0), &[]);

        assert!(matches!(d.poll(), Ok(PollOutcome::Serviced(_))));
        assert!(host_header(&mut d).command_invalid);
        assert_eq!(d.state(), DispatcherState::Idle);
    }

    #[test]
    fn test_key_write_then_read() {
        let mut d = dispatcher();
        let keys = LoRaWanKeys::otaa(
            &OtaaKeys {
                dev_eui: [1, 2, 3, 4, 5, 6, 7, 8],
                app_eui: [9; 8],
                app_key: [0xAB; 16],
            },
            true,
        );
        let bytes = keys.to_bytes();

        host_request(
            &mut d,
            Header::write_request(Command::Keys, LoRaWanKeys::SIZE as u16),
            &bytes,
        );
        d.poll().unwrap();
        let header = host_header(&mut d);
        assert!(!header.size_invalid);
        assert_eq!(header.data_length as usize, LoRaWanKeys::SIZE);
        assert_eq!(d.device().keys.keys, keys);

        // Scribble over the data area before reading back
        d.io_mut().write_bytes(BASE + 4, &[0xFF; DATA_CAPACITY]).unwrap();

        host_request(
            &mut d,
            Header::read_request(Command::Keys, LoRaWanKeys::SIZE as u16),
            &[],
        );
        d.poll().unwrap();
        let header = host_header(&mut d);
        assert!(!header.size_invalid);
        assert_eq!(header.data_length as usize, LoRaWanKeys::SIZE);
        assert_eq!(&host_data(&mut d, LoRaWanKeys::SIZE)[..LoRaWanKeys::SIZE], &bytes);
    }

    #[test]
    fn test_key_write_consumes_fixed_size() {
        let mut d = dispatcher();
        let bytes = [0x77u8; DATA_CAPACITY];
        host_request(&mut d, Header::write_request(Command::Keys, 124), &bytes);
        d.poll().unwrap();

        let header = host_header(&mut d);
        assert!(header.size_invalid);
        assert_eq!(header.data_length as usize, LoRaWanKeys::SIZE);
        assert_eq!(d.device().keys.stores, 1);
        assert_eq!(d.device().keys.keys.key_data, [0x77; 32]);
    }

    #[test]
    fn test_indicator_write_drives_outputs() {
        let mut d = dispatcher();
        host_request(
            &mut d,
            Header::write_request(Command::Leds, 4),
            &0x0000_0001u32.to_le_bytes(),
        );
        d.poll().unwrap();

        assert!(host_header(&mut d).is_idle());
        let outputs = d.device().indicators.outputs();
        assert!(outputs.red);
        assert!(!outputs.blue);

        host_request(&mut d, Header::read_request(Command::Leds, 4), &[]);
        d.poll().unwrap();
        assert_eq!(&host_data(&mut d, 4)[..4], &1u32.to_le_bytes());
    }

    #[test]
    fn test_adc_read_samples_each_time() {
        let mut d = dispatcher();
        d.device_mut().adc.queue(-125);

        for expected in 1..=2 {
            host_request(&mut d, Header::read_request(Command::AdcValue, 4), &[]);
            d.poll().unwrap();
            assert_eq!(d.device().adc.samples, expected);
        }
        assert_eq!(&host_data(&mut d, 4)[..4], &(-125i32).to_le_bytes());
        assert_eq!(host_header(&mut d).data_length, 4);
    }

    #[test]
    fn test_exit_leaves_data_untouched() {
        let mut d = dispatcher();
        host_request(
            &mut d,
            Header::write_request(Command::Exit, 4),
            &[0xDE, 0xAD, 0xBE, 0xEF],
        );
        let data_before = d.io_mut().to_bytes();

        assert_eq!(d.poll(), Ok(PollOutcome::Exited));
        assert_eq!(d.state(), DispatcherState::Exited);

        let data_after = d.io_mut().to_bytes();
        assert_eq!(&data_after[4..FRAME_SIZE], &data_before[4..FRAME_SIZE]);
        let header = host_header(&mut d);
        assert!(header.is_idle());
        assert_eq!(header.data_length, 4);

        assert_eq!(d.poll(), Err(Error::InvalidOperation));
    }

    #[test]
    fn test_run_returns_on_exit() {
        let mut d = dispatcher();
        host_request(&mut d, Header::write_request(Command::Exit, 0), &[]);
        assert_eq!(d.run(), Ok(()));
        assert!(host_header(&mut d).is_idle());

        let (mut io, device) = d.into_parts();
        assert_eq!(io.read_u32(BASE), Ok(0));
        assert_eq!(device.keys.stores, 0);
    }
}
