//! Fixed-size records exchanged through the frame's data area.
//!
//! All records are packed and little-endian, with the byte layouts the Host
//! tooling parses independently.  Each has a `SIZE`, which is the exact
//! number of bytes the Target produces or consumes for its command.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use crate::{Error, Result};

/// Build timestamp, packed into a single word.
///
/// Bit layout, from bit 0: year (6), month (4), day (5), hour (5),
/// minute (6), second (6).  The year is relative to 2000.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildStamp {
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl BuildStamp {
    pub const fn from_word(word: u32) -> Self {
        Self {
            year: (word & 0x3F) as u8,
            month: ((word >> 6) & 0x0F) as u8,
            day: ((word >> 10) & 0x1F) as u8,
            hour: ((word >> 15) & 0x1F) as u8,
            minute: ((word >> 20) & 0x3F) as u8,
            second: ((word >> 26) & 0x3F) as u8,
        }
    }

    /// Out of range fields are truncated to their bit width.
    pub const fn to_word(&self) -> u32 {
        (self.year as u32 & 0x3F)
            | ((self.month as u32 & 0x0F) << 6)
            | ((self.day as u32 & 0x1F) << 10)
            | ((self.hour as u32 & 0x1F) << 15)
            | ((self.minute as u32 & 0x3F) << 20)
            | ((self.second as u32 & 0x3F) << 26)
    }
}

/// Firmware version and build metadata.  Immutable at runtime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareInfo {
    /// Version, one byte per component, major in the top byte
    pub version: u32,
    pub build: BuildStamp,
    /// Incremented on every build
    pub build_number: u32,
}

impl FirmwareInfo {
    pub const SIZE: usize = 12;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.version.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.build.to_word().to_le_bytes());
        bytes[8..12].copy_from_slice(&self.build_number.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        check_len(bytes, Self::SIZE)?;
        Ok(Self {
            version: le_u32(&bytes[0..4]),
            build: BuildStamp::from_word(le_u32(&bytes[4..8])),
            build_number: le_u32(&bytes[8..12]),
        })
    }
}

/// Radio stack status and version, as reported by the stack.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StackInfo {
    /// Stack version from the last status snapshot
    pub stack_version: u32,
    pub build: BuildStamp,
    pub build_number: u32,
    pub dev_eui: [u8; 8],
    /// Raw build type byte, see [`BuildType`]
    pub build_type: u8,
    /// Raw region byte, see [`Region`]
    pub region: u8,
    /// Raw option byte, see [`StackOption`]
    pub option: u8,
    /// Raw release stage byte, see [`StackStage`]
    pub stage: u8,
    /// NUL padded ASCII
    pub code_name: [u8; 16],
}

impl StackInfo {
    pub const SIZE: usize = 40;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.stack_version.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.build.to_word().to_le_bytes());
        bytes[8..12].copy_from_slice(&self.build_number.to_le_bytes());
        bytes[12..20].copy_from_slice(&self.dev_eui);
        bytes[20] = self.build_type;
        bytes[21] = self.region;
        bytes[22] = self.option;
        bytes[23] = self.stage;
        bytes[24..40].copy_from_slice(&self.code_name);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        check_len(bytes, Self::SIZE)?;
        let mut dev_eui = [0u8; 8];
        dev_eui.copy_from_slice(&bytes[12..20]);
        let mut code_name = [0u8; 16];
        code_name.copy_from_slice(&bytes[24..40]);
        Ok(Self {
            stack_version: le_u32(&bytes[0..4]),
            build: BuildStamp::from_word(le_u32(&bytes[4..8])),
            build_number: le_u32(&bytes[8..12]),
            dev_eui,
            build_type: bytes[20],
            region: bytes[21],
            option: bytes[22],
            stage: bytes[23],
            code_name,
        })
    }

    /// Code name up to the first NUL, if it is valid UTF-8
    pub fn code_name_str(&self) -> Option<&str> {
        let len = self
            .code_name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.code_name.len());
        core::str::from_utf8(&self.code_name[..len]).ok()
    }

    pub fn build_type(&self) -> Option<BuildType> {
        BuildType::from_u8(self.build_type)
    }

    pub fn region(&self) -> Option<Region> {
        Region::from_u8(self.region)
    }

    pub fn option(&self) -> Option<StackOption> {
        StackOption::from_u8(self.option)
    }

    pub fn stage(&self) -> Option<StackStage> {
        StackStage::from_u8(self.stage)
    }
}

/// LoRaWAN regional parameters the stack was built for
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// Asia 923 MHz
    As923 = 1,
    /// Australia 915-928 MHz
    Au915 = 2,
    /// China 470-510 MHz
    Cn470 = 3,
    /// China 779-787 MHz
    Cn779 = 4,
    /// Europe 433 MHz
    Eu433 = 5,
    /// Europe 863-870 MHz
    Eu868 = 6,
    /// India 865-867 MHz
    In865 = 7,
    /// Korea 920-923 MHz
    Kr920 = 8,
    /// North America 902-928 MHz
    Us915 = 9,
    /// Russia 864-870 MHz
    Ru864 = 10,
}

impl Region {
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Region::As923),
            2 => Some(Region::Au915),
            3 => Some(Region::Cn470),
            4 => Some(Region::Cn779),
            5 => Some(Region::Eu433),
            6 => Some(Region::Eu868),
            7 => Some(Region::In865),
            8 => Some(Region::Kr920),
            9 => Some(Region::Us915),
            10 => Some(Region::Ru864),
            _ => None,
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildType {
    Release = b'R',
    Debug = b'D',
}

impl BuildType {
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            b'R' => Some(BuildType::Release),
            b'D' => Some(BuildType::Debug),
            _ => None,
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOption {
    Secure = b'S',
    Psa = b'P',
    Configurable = b'C',
}

impl StackOption {
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            b'S' => Some(StackOption::Secure),
            b'P' => Some(StackOption::Psa),
            b'C' => Some(StackOption::Configurable),
            _ => None,
        }
    }
}

/// Release stage of the radio stack
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackStage {
    PreAlpha = b'a',
    Alpha = b'A',
    PerpetualBeta = b'b',
    Beta = b'B',
    ReleaseCandidate = b'r',
    Release = b'R',
}

impl StackStage {
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            b'a' => Some(StackStage::PreAlpha),
            b'A' => Some(StackStage::Alpha),
            b'b' => Some(StackStage::PerpetualBeta),
            b'B' => Some(StackStage::Beta),
            b'r' => Some(StackStage::ReleaseCandidate),
            b'R' => Some(StackStage::Release),
            _ => None,
        }
    }
}

/// How the key data in [`LoRaWanKeys`] is to be interpreted
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Abp10x = 0x01,
    Otaa10x = 0x02,
    Otaa11x = 0x03,
    PreStored = 0xF0,
    UserStored = 0xF1,
}

impl KeyType {
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(KeyType::Abp10x),
            0x02 => Some(KeyType::Otaa10x),
            0x03 => Some(KeyType::Otaa11x),
            0xF0 => Some(KeyType::PreStored),
            0xF1 => Some(KeyType::UserStored),
            _ => None,
        }
    }
}

/// Key material used by the radio stack when joining.
///
/// Layout: flags (u16: bits 0-7 key type, 8-14 reserved, 15 public
/// network), key data (32 bytes), reserved (32 bytes).  The reserved
/// bits and bytes are carried through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoRaWanKeys {
    /// Raw key type byte, see [`KeyType`]
    pub key_type: u8,
    pub public_network: bool,
    pub reserved_flags: u8,
    pub key_data: [u8; 32],
    pub reserved: [u8; 32],
}

impl Default for LoRaWanKeys {
    fn default() -> Self {
        Self {
            key_type: 0,
            public_network: false,
            reserved_flags: 0,
            key_data: [0; 32],
            reserved: [0; 32],
        }
    }
}

impl LoRaWanKeys {
    pub const SIZE: usize = 66;

    const PUBLIC_NETWORK_BIT: u16 = 0x8000;

    /// LoRaWAN 1.0.x OTAA keys
    pub fn otaa(keys: &OtaaKeys, public_network: bool) -> Self {
        Self {
            key_type: KeyType::Otaa10x as u8,
            public_network,
            key_data: keys.to_key_data(),
            ..Self::default()
        }
    }

    /// LoRaWAN 1.0.x ABP keys.  These run past the key data into the first
    /// bytes of the reserved area.
    pub fn abp(keys: &AbpKeys, public_network: bool) -> Self {
        let data = keys.to_key_data();
        let mut result = Self {
            key_type: KeyType::Abp10x as u8,
            public_network,
            ..Self::default()
        };
        result.key_data.copy_from_slice(&data[..32]);
        result.reserved[..AbpKeys::SIZE - 32].copy_from_slice(&data[32..]);
        result
    }

    pub fn key_type(&self) -> Option<KeyType> {
        KeyType::from_u8(self.key_type)
    }

    /// Key data as OTAA keys.  Only meaningful for the OTAA key types.
    pub fn otaa_keys(&self) -> OtaaKeys {
        OtaaKeys::from_key_data(&self.key_data)
    }

    /// Key data as ABP keys.  Only meaningful for [`KeyType::Abp10x`].
    pub fn abp_keys(&self) -> AbpKeys {
        let mut data = [0u8; AbpKeys::SIZE];
        data[..32].copy_from_slice(&self.key_data);
        data[32..].copy_from_slice(&self.reserved[..AbpKeys::SIZE - 32]);
        AbpKeys::from_key_data(&data)
    }

    fn flags(&self) -> u16 {
        let mut flags = self.key_type as u16 | ((self.reserved_flags as u16 & 0x7F) << 8);
        if self.public_network {
            flags |= Self::PUBLIC_NETWORK_BIT;
        }
        flags
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..2].copy_from_slice(&self.flags().to_le_bytes());
        bytes[2..34].copy_from_slice(&self.key_data);
        bytes[34..66].copy_from_slice(&self.reserved);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        check_len(bytes, Self::SIZE)?;
        let flags = u16::from_le_bytes([bytes[0], bytes[1]]);
        let mut key_data = [0u8; 32];
        key_data.copy_from_slice(&bytes[2..34]);
        let mut reserved = [0u8; 32];
        reserved.copy_from_slice(&bytes[34..66]);
        Ok(Self {
            key_type: (flags & 0xFF) as u8,
            public_network: flags & Self::PUBLIC_NETWORK_BIT != 0,
            reserved_flags: ((flags >> 8) & 0x7F) as u8,
            key_data,
            reserved,
        })
    }
}

/// LoRaWAN 1.0.x over-the-air activation keys, as packed into
/// [`LoRaWanKeys::key_data`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OtaaKeys {
    pub dev_eui: [u8; 8],
    pub app_eui: [u8; 8],
    pub app_key: [u8; 16],
}

impl OtaaKeys {
    pub fn to_key_data(&self) -> [u8; 32] {
        let mut data = [0u8; 32];
        data[0..8].copy_from_slice(&self.dev_eui);
        data[8..16].copy_from_slice(&self.app_eui);
        data[16..32].copy_from_slice(&self.app_key);
        data
    }

    pub fn from_key_data(data: &[u8; 32]) -> Self {
        let mut keys = Self::default();
        keys.dev_eui.copy_from_slice(&data[0..8]);
        keys.app_eui.copy_from_slice(&data[8..16]);
        keys.app_key.copy_from_slice(&data[16..32]);
        keys
    }
}

/// LoRaWAN 1.0.x activation-by-personalisation keys.
///
/// Laid out from the start of [`LoRaWanKeys::key_data`]: DevEUI (8), DevAddr
/// (u32), NwkSKey (16), AppSKey (16).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AbpKeys {
    pub dev_eui: [u8; 8],
    pub dev_addr: u32,
    pub nwk_skey: [u8; 16],
    pub app_skey: [u8; 16],
}

impl AbpKeys {
    pub const SIZE: usize = 44;

    pub fn to_key_data(&self) -> [u8; Self::SIZE] {
        let mut data = [0u8; Self::SIZE];
        data[0..8].copy_from_slice(&self.dev_eui);
        data[8..12].copy_from_slice(&self.dev_addr.to_le_bytes());
        data[12..28].copy_from_slice(&self.nwk_skey);
        data[28..44].copy_from_slice(&self.app_skey);
        data
    }

    pub fn from_key_data(data: &[u8; Self::SIZE]) -> Self {
        let mut keys = Self {
            dev_addr: le_u32(&data[8..12]),
            ..Self::default()
        };
        keys.dev_eui.copy_from_slice(&data[0..8]);
        keys.nwk_skey.copy_from_slice(&data[12..28]);
        keys.app_skey.copy_from_slice(&data[28..44]);
        keys
    }
}

fn check_len(bytes: &[u8], size: usize) -> Result<()> {
    if bytes.len() < size {
        Err(Error::BufferTooSmall)
    } else {
        Ok(())
    }
}

fn le_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_stamp_bits() {
        let stamp = BuildStamp {
            year: 25,
            month: 6,
            day: 25,
            hour: 18,
            minute: 37,
            second: 25,
        };
        let word = stamp.to_word();
        assert_eq!(word & 0x3F, 25);
        assert_eq!((word >> 6) & 0x0F, 6);
        assert_eq!((word >> 10) & 0x1F, 25);
        assert_eq!((word >> 15) & 0x1F, 18);
        assert_eq!((word >> 20) & 0x3F, 37);
        assert_eq!(word >> 26, 25);
        assert_eq!(BuildStamp::from_word(word), stamp);
    }

    #[test]
    fn test_firmware_info_layout() {
        let info = FirmwareInfo {
            version: 0x0000_0100,
            build: BuildStamp::default(),
            build_number: 7177,
        };
        let bytes = info.to_bytes();
        assert_eq!(&bytes[0..4], &[0x00, 0x01, 0x00, 0x00]);
        assert_eq!(&bytes[8..12], &7177u32.to_le_bytes());
        assert_eq!(FirmwareInfo::from_bytes(&bytes), Ok(info));
        assert_eq!(
            FirmwareInfo::from_bytes(&bytes[..11]),
            Err(Error::BufferTooSmall)
        );
    }

    #[test]
    fn test_stack_info_layout() {
        let mut code_name = [0u8; 16];
        code_name[..6].copy_from_slice(b"Maestr");
        let info = StackInfo {
            stack_version: 0x0101_0203,
            build_number: 42,
            dev_eui: [1, 2, 3, 4, 5, 6, 7, 8],
            build_type: b'R',
            region: 6,
            option: b'S',
            stage: b'B',
            code_name,
            ..StackInfo::default()
        };
        let bytes = info.to_bytes();
        assert_eq!(bytes[12], 1);
        assert_eq!(bytes[20], b'R');
        assert_eq!(bytes[21], 6);
        assert_eq!(&bytes[24..30], b"Maestr");

        let decoded = StackInfo::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, info);
        assert_eq!(decoded.code_name_str(), Some("Maestr"));
    }

    #[test]
    fn test_keys_flags_layout() {
        let otaa = OtaaKeys {
            dev_eui: [0x11; 8],
            app_eui: [0x22; 8],
            app_key: [0x33; 16],
        };
        let keys = LoRaWanKeys::otaa(&otaa, true);
        let bytes = keys.to_bytes();

        assert_eq!(&bytes[0..2], &[0x02, 0x80]);
        assert_eq!(bytes[2], 0x11);
        assert_eq!(bytes[10], 0x22);
        assert_eq!(bytes[18], 0x33);
        assert_eq!(&bytes[34..], &[0u8; 32]);

        let decoded = LoRaWanKeys::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.key_type(), Some(KeyType::Otaa10x));
        assert!(decoded.public_network);
        assert_eq!(decoded.otaa_keys(), otaa);
    }

    #[test]
    fn test_abp_keys_layout() {
        let abp = AbpKeys {
            dev_eui: [0x11; 8],
            dev_addr: 0x2601_1F3A,
            nwk_skey: [0x44; 16],
            app_skey: [0x55; 16],
        };
        let keys = LoRaWanKeys::abp(&abp, false);
        assert_eq!(&keys.key_data[0..8], &[0x11; 8]);
        assert_eq!(&keys.key_data[8..12], &[0x3A, 0x1F, 0x01, 0x26]);
        assert_eq!(&keys.key_data[12..28], &[0x44; 16]);
        assert_eq!(&keys.key_data[28..32], &[0x55; 4]);
        assert_eq!(&keys.reserved[..12], &[0x55; 12]);
        assert_eq!(&keys.reserved[12..], &[0u8; 20]);

        let bytes = keys.to_bytes();
        assert_eq!(&bytes[0..2], &[0x01, 0x00]);
        assert_eq!(&bytes[10..14], &0x2601_1F3Au32.to_le_bytes());
        assert_eq!(&bytes[30..46], &[0x55; 16]);

        let decoded = LoRaWanKeys::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.key_type(), Some(KeyType::Abp10x));
        assert_eq!(decoded.abp_keys(), abp);
    }

    #[test]
    fn test_stack_info_typed_fields() {
        let info = StackInfo {
            build_type: b'D',
            region: 9,
            option: b'C',
            stage: b'r',
            ..StackInfo::default()
        };
        assert_eq!(info.build_type(), Some(BuildType::Debug));
        assert_eq!(info.region(), Some(Region::Us915));
        assert_eq!(info.option(), Some(StackOption::Configurable));
        assert_eq!(info.stage(), Some(StackStage::ReleaseCandidate));

        let unknown = StackInfo {
            region: 11,
            stage: b'x',
            ..StackInfo::default()
        };
        assert_eq!(unknown.region(), None);
        assert_eq!(unknown.build_type(), None);
        assert_eq!(unknown.stage(), None);
        assert_eq!(Region::from_u8(Region::Eu868 as u8), Some(Region::Eu868));
    }

    #[test]
    fn test_keys_preserve_reserved_bits() {
        let mut bytes = [0u8; LoRaWanKeys::SIZE];
        bytes[0] = 0xF1;
        bytes[1] = 0x7F;
        bytes[65] = 0xEE;

        let keys = LoRaWanKeys::from_bytes(&bytes).unwrap();
        assert_eq!(keys.key_type(), Some(KeyType::UserStored));
        assert!(!keys.public_network);
        assert_eq!(keys.reserved_flags, 0x7F);
        assert_eq!(keys.to_bytes(), bytes);
    }
}
