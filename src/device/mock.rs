//! Fake Target collaborators, for tests and Host-side simulation.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use crate::device::{
    AdcSampler, BuildStamp, DeviceContext, FirmwareInfo, IndicatorLine, IndicatorOutputs,
    KeyStore, LoRaWanKeys, StackInfo, StackStatus,
};

/// Reports a fixed [`StackInfo`]
#[derive(Debug, Default, Clone)]
pub struct MockStack {
    pub info: StackInfo,
}

impl StackStatus for MockStack {
    fn stack_info(&self) -> StackInfo {
        self.info
    }
}

/// Holds keys in memory, counting stores
#[derive(Debug, Default, Clone)]
pub struct MockKeyStore {
    pub keys: LoRaWanKeys,
    pub stores: usize,
}

impl KeyStore for MockKeyStore {
    fn keys(&self) -> LoRaWanKeys {
        self.keys
    }

    fn store_keys(&mut self, keys: LoRaWanKeys) {
        self.keys = keys;
        self.stores += 1;
    }
}

/// Records the last level driven onto each line
#[derive(Debug, Default, Clone)]
pub struct MockOutputs {
    pub red: bool,
    pub blue: bool,
    pub writes: usize,
}

impl IndicatorOutputs for MockOutputs {
    fn set_line(&mut self, line: IndicatorLine, on: bool) {
        match line {
            IndicatorLine::Red => self.red = on,
            IndicatorLine::Blue => self.blue = on,
        }
        self.writes += 1;
    }
}

/// Returns a fixed reading, counting conversions
#[derive(Debug, Default, Clone)]
pub struct MockAdc {
    pub next_mv: i32,
    pub samples: usize,
}

impl MockAdc {
    pub fn queue(&mut self, millivolts: i32) {
        self.next_mv = millivolts;
    }
}

impl AdcSampler for MockAdc {
    fn sample_millivolts(&mut self) -> i32 {
        self.samples += 1;
        self.next_mv
    }
}

pub type MockDevice = DeviceContext<MockStack, MockKeyStore, MockOutputs, MockAdc>;

pub fn firmware_info() -> FirmwareInfo {
    FirmwareInfo {
        version: 0x0000_0100,
        build: BuildStamp {
            year: 25,
            month: 6,
            day: 25,
            hour: 18,
            minute: 37,
            second: 25,
        },
        build_number: 7177,
    }
}

pub fn stack_info() -> StackInfo {
    let mut code_name = [0u8; 16];
    code_name[..7].copy_from_slice(b"Maestro");
    StackInfo {
        stack_version: 0x0100_0304,
        build: BuildStamp {
            year: 24,
            month: 11,
            day: 2,
            hour: 9,
            minute: 15,
            second: 0,
        },
        build_number: 512,
        dev_eui: [0x00, 0x4A, 0x77, 0x00, 0x66, 0x01, 0x02, 0x03],
        build_type: b'R',
        region: 6,
        option: b'S',
        stage: b'R',
        code_name,
    }
}

/// A device with known stack and firmware info, everything else zeroed
pub fn device() -> MockDevice {
    DeviceContext::new(
        MockStack { info: stack_info() },
        firmware_info(),
        MockKeyStore::default(),
        MockOutputs::default(),
        MockAdc::default(),
    )
}
