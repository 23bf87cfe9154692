//! Value types, plaintexts and party identities.
//!
//! A `Plaintext` never lives inside the engine: it only appears on the way in
//! (trivial encryption of a public constant) and on the way out (the values a
//! decryption committee attests to when a reveal is finalized).

use serde::Deserialize;
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Type tag carried by every handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    any(test, feature = "property-test-api"),
    derive(test_strategy::Arbitrary)
)]
pub enum ValueType {
    Bool,
    U8,
    U16,
    U32,
    U64,
    U128,
    Address,
}

impl ValueType {
    pub const ALL: [ValueType; 7] = [
        ValueType::Bool,
        ValueType::U8,
        ValueType::U16,
        ValueType::U32,
        ValueType::U64,
        ValueType::U128,
        ValueType::Address,
    ];

    /// one byte tag used in canonical encodings
    pub fn tag(self) -> u8 {
        match self {
            ValueType::Bool => 0,
            ValueType::U8 => 2,
            ValueType::U16 => 3,
            ValueType::U32 => 4,
            ValueType::U64 => 5,
            ValueType::U128 => 6,
            ValueType::Address => 7,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|ty| ty.tag() == tag)
    }

    pub fn bits(self) -> u32 {
        match self {
            ValueType::Bool => 1,
            ValueType::U8 => 8,
            ValueType::U16 => 16,
            ValueType::U32 => 32,
            ValueType::U64 => 64,
            ValueType::U128 => 128,
            ValueType::Address => 160,
        }
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            ValueType::U8 | ValueType::U16 | ValueType::U32 | ValueType::U64 | ValueType::U128
        )
    }

    /// Bit mask of the type when its values fit in a `u128`.
    pub fn mask(self) -> Option<u128> {
        match self {
            ValueType::Bool => Some(1),
            ValueType::U128 => Some(u128::MAX),
            ValueType::Address => None,
            ty => Some((1u128 << ty.bits()) - 1),
        }
    }

    /// number of bytes of the big endian encoding of a value of this type
    pub fn byte_len(self) -> usize {
        match self {
            ValueType::Bool => 1,
            ty => (ty.bits() / 8) as usize,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Bool => "ebool",
            ValueType::U8 => "euint8",
            ValueType::U16 => "euint16",
            ValueType::U32 => "euint32",
            ValueType::U64 => "euint64",
            ValueType::U128 => "euint128",
            ValueType::Address => "eaddress",
        };
        f.write_str(name)
    }
}

/// A 20 bytes identity: a contract, a user, or the engine host itself.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub struct Party([u8; Party::BYTES_LEN]);

impl Party {
    pub const BYTES_LEN: usize = 20;

    pub const fn new(bytes: [u8; Self::BYTES_LEN]) -> Self {
        Party(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; Self::BYTES_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Party({})", self)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PartyParseError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("a party is {} bytes long; got {} bytes", Party::BYTES_LEN, .0)]
    InvalidLength(usize),
}

impl FromStr for Party {
    type Err = PartyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        let bytes: [u8; Self::BYTES_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| PartyParseError::InvalidLength(bytes.len()))?;
        Ok(Party(bytes))
    }
}

impl TryFrom<String> for Party {
    type Error = PartyParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A decrypted (or not yet encrypted) value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Plaintext {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    Address(Party),
}

impl Plaintext {
    pub fn value_type(&self) -> ValueType {
        match self {
            Plaintext::Bool(_) => ValueType::Bool,
            Plaintext::U8(_) => ValueType::U8,
            Plaintext::U16(_) => ValueType::U16,
            Plaintext::U32(_) => ValueType::U32,
            Plaintext::U64(_) => ValueType::U64,
            Plaintext::U128(_) => ValueType::U128,
            Plaintext::Address(_) => ValueType::Address,
        }
    }

    /// Numeric view of the value. Booleans are 0 or 1, addresses have none.
    pub fn to_u128(&self) -> Option<u128> {
        match *self {
            Plaintext::Bool(b) => Some(b as u128),
            Plaintext::U8(v) => Some(v as u128),
            Plaintext::U16(v) => Some(v as u128),
            Plaintext::U32(v) => Some(v as u128),
            Plaintext::U64(v) => Some(v as u128),
            Plaintext::U128(v) => Some(v),
            Plaintext::Address(_) => None,
        }
    }

    /// Build a value of type `ty` from `value`, failing if it does not fit.
    pub fn from_u128(ty: ValueType, value: u128) -> Option<Self> {
        let mask = ty.mask()?;
        if value & !mask != 0 {
            return None;
        }
        Self::from_masked(ty, value)
    }

    /// Build a value of type `ty` keeping only the low bits of `value`
    /// (wrapping semantics).
    pub fn wrapping(ty: ValueType, value: u128) -> Option<Self> {
        let mask = ty.mask()?;
        Self::from_masked(ty, value & mask)
    }

    fn from_masked(ty: ValueType, value: u128) -> Option<Self> {
        let p = match ty {
            ValueType::Bool => Plaintext::Bool(value == 1),
            ValueType::U8 => Plaintext::U8(value as u8),
            ValueType::U16 => Plaintext::U16(value as u16),
            ValueType::U32 => Plaintext::U32(value as u32),
            ValueType::U64 => Plaintext::U64(value as u64),
            ValueType::U128 => Plaintext::U128(value),
            ValueType::Address => return None,
        };
        Some(p)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Plaintext::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Plaintext::U8(_) | Plaintext::U16(_) | Plaintext::U32(_) | Plaintext::U64(_) => {
                self.to_u128().map(|v| v as u64)
            }
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Party> {
        match self {
            Plaintext::Address(p) => Some(*p),
            _ => None,
        }
    }

    /// Canonical encoding: the type tag followed by the big endian value.
    pub fn to_bytes(&self) -> Vec<u8> {
        let ty = self.value_type();
        let mut out = Vec::with_capacity(1 + ty.byte_len());
        out.push(ty.tag());
        match self {
            Plaintext::Address(p) => out.extend_from_slice(p.as_bytes()),
            _ => {
                // address aside, every value has a numeric view
                let v = self.to_u128().unwrap_or_default().to_be_bytes();
                out.extend_from_slice(&v[16 - ty.byte_len()..]);
            }
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (tag, body) = bytes.split_first()?;
        let ty = ValueType::from_tag(*tag)?;
        if body.len() != ty.byte_len() {
            return None;
        }
        if ty == ValueType::Address {
            let bytes: [u8; Party::BYTES_LEN] = body.try_into().ok()?;
            return Some(Plaintext::Address(Party::new(bytes)));
        }
        let mut buf = [0u8; 16];
        buf[16 - body.len()..].copy_from_slice(body);
        Self::from_u128(ty, u128::from_be_bytes(buf))
    }
}

impl fmt::Display for Plaintext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plaintext::Bool(b) => write!(f, "{}", b),
            Plaintext::Address(p) => write!(f, "{}", p),
            other => write!(f, "{}", other.to_u128().unwrap_or_default()),
        }
    }
}

impl From<bool> for Plaintext {
    fn from(v: bool) -> Self {
        Plaintext::Bool(v)
    }
}

impl From<u8> for Plaintext {
    fn from(v: u8) -> Self {
        Plaintext::U8(v)
    }
}

impl From<u16> for Plaintext {
    fn from(v: u16) -> Self {
        Plaintext::U16(v)
    }
}

impl From<u32> for Plaintext {
    fn from(v: u32) -> Self {
        Plaintext::U32(v)
    }
}

impl From<u64> for Plaintext {
    fn from(v: u64) -> Self {
        Plaintext::U64(v)
    }
}

impl From<u128> for Plaintext {
    fn from(v: u128) -> Self {
        Plaintext::U128(v)
    }
}

impl From<Party> for Plaintext {
    fn from(v: Party) -> Self {
        Plaintext::Address(v)
    }
}
