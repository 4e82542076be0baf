use std::fmt;

use crate::properties::PeType;


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Error {
    InvalidDirectoryId { id: u32, count: u32 },
    AddressOverflow { address: u64 },
    WidthMismatch { active: PeType, requested: PeType },
    MalformedHeader(MalformedHeaderKind),
    TruncatedRecord { record: &'static str, expected: usize, obtained: usize },
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDirectoryId { id, count }
                => write!(f, "directory {} is beyond the declared directory count {}", id, count),
            Self::AddressOverflow { address }
                => write!(f, "address {:#X} cannot be converted without overflow", address),
            Self::WidthMismatch { active, requested }
                => write!(f, "{} accessor used on a {} image", requested, active),
            Self::MalformedHeader(kind)
                => write!(f, "malformed header: {}", kind),
            Self::TruncatedRecord { record, expected, obtained }
                => write!(f, "{} record too short (expected {} bytes, obtained {})", record, expected, obtained),
        }
    }
}
impl std::error::Error for Error {
}
impl From<MalformedHeaderKind> for Error {
    fn from(value: MalformedHeaderKind) -> Self { Self::MalformedHeader(value) }
}


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum MalformedHeaderKind {
    TooShort { expected: usize, obtained: usize },
    WrongSignature { obtained: u32 },
    UnknownMagic { magic: u16 },
    WrongMagic { expected: u16, obtained: u16 },
}
impl fmt::Display for MalformedHeaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { expected, obtained }
                => write!(f, "NT headers too short (expected at least {} bytes, obtained {})", expected, obtained),
            Self::WrongSignature { obtained }
                => write!(f, "wrong NT signature {:#010X}", obtained),
            Self::UnknownMagic { magic }
                => write!(f, "unknown optional header magic {:#06X}", magic),
            Self::WrongMagic { expected, obtained }
                => write!(f, "wrong optional header magic (expected {:#06X}, obtained {:#06X})", expected, obtained),
        }
    }
}
