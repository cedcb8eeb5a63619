//! EPS mobile identity and IMSI BCD conversion

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{NasError, NasResult};
use crate::types::EpsGuti;

/// Maximum IMSI digits (TS 23.003 2.2)
pub const MAX_IMSI_DIGITS: usize = 15;
/// Maximum packed IMSI length in octets
pub const MAX_IMSI_LEN: usize = 8;

/// Identity type values (TS 24.301 9.9.3.12 / 9.9.3.17)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IdentityType {
    Imsi = 1,
    Imei = 2,
    Imeisv = 3,
    Tmsi = 4,
    Guti = 6,
}

impl IdentityType {
    pub fn from_u8(value: u8) -> NasResult<Self> {
        match value & 0x07 {
            1 => Ok(Self::Imsi),
            2 => Ok(Self::Imei),
            3 => Ok(Self::Imeisv),
            4 => Ok(Self::Tmsi),
            6 => Ok(Self::Guti),
            other => Err(NasError::InvalidMobileIdentityType(other)),
        }
    }
}

/// IMSI as carried in the mobile identity IE value.
///
/// Octet 0 holds digit 1, the odd/even indicator and the type; the rest hold
/// two digits each, low nibble first, with 0xF filling an even-length tail.
#[derive(Clone, PartialEq, Eq, Default, Zeroize, ZeroizeOnDrop)]
pub struct ImsiIdentity {
    octets: Vec<u8>,
}

impl std::fmt::Debug for ImsiIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ImsiIdentity({})", imsi_to_bcd(self))
    }
}

const ODD_INDICATOR: u8 = 0x08;

impl ImsiIdentity {
    /// Wrap an IE value received from the codec.
    pub fn from_octets(octets: impl Into<Vec<u8>>) -> NasResult<Self> {
        let octets = octets.into();
        if let Some(first) = octets.first() {
            if first & 0x07 != IdentityType::Imsi as u8 {
                return Err(NasError::InvalidMobileIdentityType(first & 0x07));
            }
        }
        if octets.len() > MAX_IMSI_LEN {
            return Err(NasError::InvalidDigitCount(octets.len() * 2));
        }
        Ok(Self { octets })
    }

    /// Encode a decimal digit string as an IMSI mobile identity value.
    pub fn from_digits(digits: &str) -> NasResult<Self> {
        let nibbles = parse_digits(digits)?;
        if nibbles.is_empty() || nibbles.len() > MAX_IMSI_DIGITS {
            return Err(NasError::InvalidDigitCount(nibbles.len()));
        }

        let odd = nibbles.len() % 2 == 1;
        let mut octets = Vec::with_capacity(MAX_IMSI_LEN);
        octets.push(
            (nibbles[0] << 4)
                | if odd { ODD_INDICATOR } else { 0 }
                | IdentityType::Imsi as u8,
        );
        for pair in nibbles[1..].chunks(2) {
            let hi = pair.get(1).copied().unwrap_or(0x0F);
            octets.push((hi << 4) | pair[0]);
        }
        Ok(Self { octets })
    }

    pub fn as_octets(&self) -> &[u8] {
        &self.octets
    }

    /// Decimal digits, failing when nothing decodes.
    pub fn digits(&self) -> NasResult<String> {
        let s = imsi_to_bcd(self);
        if s.is_empty() {
            return Err(NasError::InvalidDigitCount(0));
        }
        Ok(s)
    }
}

/// EPS mobile identity (TS 24.301 9.9.3.12) and mobile identity (TS 24.008 10.5.1.4)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MobileIdentity {
    Imsi(ImsiIdentity),
    Guti(EpsGuti),
    Imei(String),
    Imeisv(String),
    Tmsi(u32),
}

impl MobileIdentity {
    pub fn identity_type(&self) -> IdentityType {
        match self {
            Self::Imsi(_) => IdentityType::Imsi,
            Self::Guti(_) => IdentityType::Guti,
            Self::Imei(_) => IdentityType::Imei,
            Self::Imeisv(_) => IdentityType::Imeisv,
            Self::Tmsi(_) => IdentityType::Tmsi,
        }
    }
}

fn parse_digits(digits: &str) -> NasResult<Vec<u8>> {
    digits
        .chars()
        .map(|c| c.to_digit(10).map(|d| d as u8).ok_or(NasError::InvalidBcdDigit(c)))
        .collect()
}

fn push_digit(out: &mut String, nibble: u8) -> bool {
    if nibble > 9 {
        return false;
    }
    out.push(char::from(b'0' + nibble));
    true
}

/// Decode the IMSI mobile identity value into its digit string.
///
/// Decoding stops at the first filler or non-decimal nibble, so a damaged
/// value yields a short (possibly empty) string rather than an error.
pub fn imsi_to_bcd(imsi: &ImsiIdentity) -> String {
    let mut out = String::with_capacity(MAX_IMSI_DIGITS);
    let Some((&first, rest)) = imsi.octets.split_first() else {
        return out;
    };
    if !push_digit(&mut out, first >> 4) {
        return out;
    }
    for &octet in rest {
        if !push_digit(&mut out, octet & 0x0F) || !push_digit(&mut out, octet >> 4) {
            break;
        }
    }
    out
}

/// Pack a digit string two digits per octet, low nibble first, 0xF filler.
pub fn bcd_to_buffer(bcd: &str) -> NasResult<Vec<u8>> {
    let nibbles = parse_digits(bcd)?;
    Ok(nibbles
        .chunks(2)
        .map(|pair| (pair.get(1).copied().unwrap_or(0x0F) << 4) | pair[0])
        .collect())
}

/// Inverse of [`bcd_to_buffer`]; `digits` bounds the output length.
pub fn buffer_to_bcd(buf: &[u8], digits: usize) -> String {
    let mut out = String::with_capacity(digits);
    for &octet in buf {
        for nibble in [octet & 0x0F, octet >> 4] {
            if out.len() == digits || !push_digit(&mut out, nibble) {
                return out;
            }
        }
    }
    out
}
