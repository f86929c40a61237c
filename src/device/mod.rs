//! Target state served through the frame.
//!
//! The dispatcher does not reach for globals.  Everything it reads or changes
//! is handed to it up front as a [`Device`], normally a [`DeviceContext`]
//! built from the Target's stack, key storage, indicator outputs and ADC.
//! Each of those is a trait, so a simulation can swap in fakes - see
//! `device::mock` (test builds, or the `mock` feature).

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod records;

pub use records::{
    AbpKeys, BuildStamp, BuildType, FirmwareInfo, KeyType, LoRaWanKeys, OtaaKeys, Region,
    StackInfo, StackOption, StackStage,
};

/// Radio stack status source.  Must be cheap and synchronous.
pub trait StackStatus {
    fn stack_info(&self) -> StackInfo;
}

/// Storage for the key material the radio stack joins with.
pub trait KeyStore {
    fn keys(&self) -> LoRaWanKeys;

    /// Replace the keys.  Takes effect for the stack's next use of them.
    fn store_keys(&mut self, keys: LoRaWanKeys);
}

/// Physical indicator lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorLine {
    Red,
    Blue,
}

/// Drives the physical indicator lines.
pub trait IndicatorOutputs {
    fn set_line(&mut self, line: IndicatorLine, on: bool);
}

/// Analog input.
pub trait AdcSampler {
    /// Start a conversion, block until it completes, and return the result
    /// in millivolts.
    fn sample_millivolts(&mut self) -> i32;
}

/// Indicator bitmask, with bits mapped onto physical lines.
///
/// Bit 0 drives [`IndicatorLine::Red`], bit 8 drives [`IndicatorLine::Blue`].
/// Other bits are stored but drive nothing.
pub struct Indicators<O: IndicatorOutputs> {
    state: u32,
    outputs: O,
}

impl<O: IndicatorOutputs> Indicators<O> {
    pub const RED_BIT: u32 = 1 << 0;
    pub const BLUE_BIT: u32 = 1 << 8;

    /// All indicators off.  The outputs are not driven until the first
    /// [`Self::set()`].
    pub fn new(outputs: O) -> Self {
        Self { state: 0, outputs }
    }

    pub fn state(&self) -> u32 {
        self.state
    }

    /// Store the new bitmask and drive the mapped lines before returning.
    pub fn set(&mut self, state: u32) {
        self.state = state;
        self.outputs
            .set_line(IndicatorLine::Red, state & Self::RED_BIT != 0);
        self.outputs
            .set_line(IndicatorLine::Blue, state & Self::BLUE_BIT != 0);
    }

    pub fn outputs(&self) -> &O {
        &self.outputs
    }
}

/// Everything the dispatcher needs from the Target.
pub trait Device {
    fn stack_info(&self) -> StackInfo;
    fn firmware_info(&self) -> FirmwareInfo;
    fn keys(&self) -> LoRaWanKeys;
    fn store_keys(&mut self, keys: LoRaWanKeys);
    /// Blocks for the duration of an ADC conversion
    fn sample_adc_millivolts(&mut self) -> i32;
    fn indicators(&self) -> u32;
    fn set_indicators(&mut self, state: u32);
}

/// Owns the Target state the dispatcher serves.
pub struct DeviceContext<S, K, O, A>
where
    S: StackStatus,
    K: KeyStore,
    O: IndicatorOutputs,
    A: AdcSampler,
{
    pub stack: S,
    pub firmware: FirmwareInfo,
    pub keys: K,
    pub indicators: Indicators<O>,
    pub adc: A,
}

impl<S, K, O, A> DeviceContext<S, K, O, A>
where
    S: StackStatus,
    K: KeyStore,
    O: IndicatorOutputs,
    A: AdcSampler,
{
    pub fn new(stack: S, firmware: FirmwareInfo, keys: K, outputs: O, adc: A) -> Self {
        Self {
            stack,
            firmware,
            keys,
            indicators: Indicators::new(outputs),
            adc,
        }
    }
}

impl<S, K, O, A> Device for DeviceContext<S, K, O, A>
where
    S: StackStatus,
    K: KeyStore,
    O: IndicatorOutputs,
    A: AdcSampler,
{
    fn stack_info(&self) -> StackInfo {
        self.stack.stack_info()
    }

    fn firmware_info(&self) -> FirmwareInfo {
        self.firmware
    }

    fn keys(&self) -> LoRaWanKeys {
        self.keys.keys()
    }

    fn store_keys(&mut self, keys: LoRaWanKeys) {
        self.keys.store_keys(keys)
    }

    fn sample_adc_millivolts(&mut self) -> i32 {
        self.adc.sample_millivolts()
    }

    fn indicators(&self) -> u32 {
        self.indicators.state()
    }

    fn set_indicators(&mut self, state: u32) {
        self.indicators.set(state)
    }
}
