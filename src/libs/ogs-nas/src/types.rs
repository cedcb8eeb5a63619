//! EPS NAS information element value types

use bytes::Bytes;

use crate::error::{NasError, NasResult};

/// Protocol discriminator values (TS 24.007 11.2.3.1.1)
pub mod protocol_discriminator {
    pub const ESM: u8 = 0x02;
    pub const EMM: u8 = 0x07;
}

/// Security header type (TS 24.301 9.3.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum SecurityHeaderType {
    /// Plain NAS message, not security protected
    #[default]
    Plain = 0,
    /// Integrity protected
    IntegrityProtected = 1,
    /// Integrity protected and ciphered
    IntegrityProtectedAndCiphered = 2,
    /// Integrity protected with new EPS security context
    IntegrityProtectedNewContext = 3,
    /// Integrity protected and ciphered with new EPS security context
    IntegrityProtectedAndCipheredNewContext = 4,
}

impl SecurityHeaderType {
    pub fn from_u8(value: u8) -> NasResult<Self> {
        match value {
            0 => Ok(Self::Plain),
            1 => Ok(Self::IntegrityProtected),
            2 => Ok(Self::IntegrityProtectedAndCiphered),
            3 => Ok(Self::IntegrityProtectedNewContext),
            4 => Ok(Self::IntegrityProtectedAndCipheredNewContext),
            other => Err(NasError::InvalidSecurityHeaderType(other)),
        }
    }

    pub fn is_protected(self) -> bool {
        self != Self::Plain
    }

    pub fn is_ciphered(self) -> bool {
        matches!(
            self,
            Self::IntegrityProtectedAndCiphered | Self::IntegrityProtectedAndCipheredNewContext
        )
    }

    pub fn is_new_context(self) -> bool {
        matches!(
            self,
            Self::IntegrityProtectedNewContext | Self::IntegrityProtectedAndCipheredNewContext
        )
    }
}

/// PLMN Identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PlmnId {
    /// Mobile Country Code (3 digits)
    pub mcc: [u8; 3],
    /// Mobile Network Code (2 or 3 digits)
    pub mnc: [u8; 3],
    /// MNC length (2 or 3)
    pub mnc_len: u8,
}

impl PlmnId {
    pub fn new(mcc: [u8; 3], mnc: [u8; 3], mnc_len: u8) -> Self {
        Self { mcc, mnc, mnc_len }
    }

    /// Build from decimal strings such as `("001", "01")`.
    pub fn from_digits(mcc: &str, mnc: &str) -> NasResult<Self> {
        if mcc.len() != 3 {
            return Err(NasError::InvalidDigitCount(mcc.len()));
        }
        if mnc.len() != 2 && mnc.len() != 3 {
            return Err(NasError::InvalidDigitCount(mnc.len()));
        }

        let mut out = Self { mnc_len: mnc.len() as u8, ..Default::default() };
        for (slot, c) in out.mcc.iter_mut().zip(mcc.chars()) {
            *slot = c.to_digit(10).ok_or(NasError::InvalidBcdDigit(c))? as u8;
        }
        for (slot, c) in out.mnc.iter_mut().zip(mnc.chars()) {
            *slot = c.to_digit(10).ok_or(NasError::InvalidBcdDigit(c))? as u8;
        }
        Ok(out)
    }

    /// Encode to the 3-octet wire form
    pub fn to_bytes(&self) -> [u8; 3] {
        // MNC digit 3 is 0xF for a 2-digit MNC
        let mnc3 = if self.mnc_len == 2 { 0x0F } else { self.mnc[2] };
        [
            (self.mcc[1] << 4) | self.mcc[0],
            (mnc3 << 4) | self.mcc[2],
            (self.mnc[1] << 4) | self.mnc[0],
        ]
    }

    /// Decode from the 3-octet wire form
    pub fn from_bytes(b: [u8; 3]) -> Self {
        let mcc = [b[0] & 0x0F, (b[0] >> 4) & 0x0F, b[1] & 0x0F];
        let mnc3 = (b[1] >> 4) & 0x0F;
        let mnc_len = if mnc3 == 0x0F { 2 } else { 3 };
        let mnc = [b[2] & 0x0F, (b[2] >> 4) & 0x0F, if mnc_len == 3 { mnc3 } else { 0 }];
        Self { mcc, mnc, mnc_len }
    }
}

impl std::fmt::Display for PlmnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for d in self.mcc {
            write!(f, "{d}")?;
        }
        for d in &self.mnc[..self.mnc_len as usize] {
            write!(f, "{d}")?;
        }
        Ok(())
    }
}

/// EPS Tracking Area Identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EpsTai {
    pub plmn_id: PlmnId,
    pub tac: u16,
}

/// EPS GUTI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EpsGuti {
    pub plmn_id: PlmnId,
    pub mme_gid: u16,
    pub mme_code: u8,
    pub m_tmsi: u32,
}

/// UE network capability (TS 24.301 9.9.3.34).
///
/// Octets beyond UIA are kept opaque; the MME only echoes the first four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UeNetworkCapability {
    pub length: u8,
    pub eea: u8,
    pub eia: u8,
    pub uea: u8,
    /// UCS2 bit (8) and UIA1-7
    pub uia: u8,
    pub extra: [u8; 9],
}

/// MS network capability (TS 24.008 10.5.5.12), GEA bits only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MsNetworkCapability {
    pub length: u8,
    /// GEA/1 support bit
    pub gea1: u8,
    /// GEA/2 .. GEA/7 as a 6-bit field
    pub extended_gea: u8,
    pub extra: [u8; 7],
}

/// Replayed UE security capabilities (TS 24.301 9.9.3.36)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UeSecurityCapability {
    pub length: u8,
    pub eea: u8,
    pub eia: u8,
    pub uea: u8,
    pub uia: u8,
    pub gea: u8,
}

/// NAS key set identifier (TS 24.301 9.9.3.21)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeySetIdentifier {
    /// Type of security context flag
    pub tsc: u8,
    pub ksi: u8,
}

impl KeySetIdentifier {
    /// No key is available
    pub const NO_KEY: u8 = 7;

    pub fn new(tsc: u8, ksi: u8) -> Self {
        Self { tsc, ksi }
    }

    /// Half-octet value
    pub fn to_nibble(self) -> u8 {
        ((self.tsc & 0x01) << 3) | (self.ksi & 0x07)
    }
}

/// NAS security algorithms (TS 24.301 9.9.3.23)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SecurityAlgorithms {
    pub ciphering: u8,
    pub integrity: u8,
}

impl SecurityAlgorithms {
    pub fn to_byte(self) -> u8 {
        ((self.ciphering & 0x07) << 4) | (self.integrity & 0x07)
    }
}

/// Detach type classification (TS 24.301 9.9.3.7, UE to network)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetachKind {
    EpsDetach,
    ImsiDetach,
    CombinedEpsImsiDetach,
    Reserved(u8),
}

/// Detach type IE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DetachType {
    pub switch_off: bool,
    /// 3-bit detach type value
    pub value: u8,
}

impl DetachType {
    pub fn kind(self) -> DetachKind {
        match self.value & 0x07 {
            1 => DetachKind::EpsDetach,
            2 => DetachKind::ImsiDetach,
            3 => DetachKind::CombinedEpsImsiDetach,
            // 6, 7 are reserved; everything else is treated as combined
            6 | 7 => DetachKind::Reserved(self.value & 0x07),
            _ => DetachKind::CombinedEpsImsiDetach,
        }
    }
}

/// GPRS timer (TS 24.008 10.5.7.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GprsTimer {
    /// 3-bit unit
    pub unit: u8,
    /// 5-bit value
    pub value: u8,
}

impl GprsTimer {
    pub const UNIT_2_SECONDS: u8 = 0;
    pub const UNIT_1_MINUTE: u8 = 1;
    pub const UNIT_DECIHOURS: u8 = 2;
    pub const UNIT_DEACTIVATED: u8 = 7;

    const MAX_VALUE: u32 = 0x1F;

    /// Pick the finest unit that can carry `seconds`, rounding up so the
    /// timer never runs shorter than asked.
    pub fn from_seconds(seconds: u32) -> Self {
        [(Self::UNIT_2_SECONDS, 2), (Self::UNIT_1_MINUTE, 60), (Self::UNIT_DECIHOURS, 360)]
            .into_iter()
            .map(|(unit, step)| (unit, seconds.div_ceil(step)))
            .find(|&(_, value)| value <= Self::MAX_VALUE)
            .map(|(unit, value)| Self { unit, value: value as u8 })
            .unwrap_or(Self { unit: Self::UNIT_DEACTIVATED, value: 0 })
    }

    pub fn to_byte(self) -> u8 {
        ((self.unit & 0x07) << 5) | (self.value & 0x1F)
    }
}

/// Swap the decimal digits of a value below 100 into semi-octet order.
pub fn time_to_bcd(value: u8) -> u8 {
    ((value % 10) << 4) | (value / 10)
}

/// Time zone and time (TS 24.008 10.5.3.9), stored in wire semi-octet form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeZoneAndTime {
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// Quarter-hour offset digits with the sign in bit 3
    pub timezone: u8,
}

impl TimeZoneAndTime {
    /// Build from calendar fields (year within century, 1-based month) and a
    /// UTC offset in seconds.
    pub fn new(
        year: u8,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
        utc_offset_seconds: i32,
    ) -> Self {
        let quarters = (utc_offset_seconds.unsigned_abs() / 900).min(79) as u8;
        let mut timezone = time_to_bcd(quarters);
        if utc_offset_seconds < 0 {
            timezone |= 0x08;
        }
        Self {
            year: time_to_bcd(year % 100),
            month: time_to_bcd(month),
            day: time_to_bcd(day),
            hour: time_to_bcd(hour),
            minute: time_to_bcd(minute),
            second: time_to_bcd(second),
            timezone,
        }
    }

    pub fn to_bytes(&self) -> [u8; 7] {
        [self.year, self.month, self.day, self.hour, self.minute, self.second, self.timezone]
    }
}

/// ESM message container: opaque session-management PDU
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EsmMessageContainer {
    pub buffer: Bytes,
}

impl EsmMessageContainer {
    pub fn new(buffer: impl Into<Bytes>) -> Self {
        Self { buffer: buffer.into() }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
