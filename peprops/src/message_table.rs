//! Message table strings, as found in `RT_MESSAGETABLE` resources.

use std::fmt;

pub use display_bytes::DisplayBytesVec;

use crate::le_int::{LeInt, LeReader};


/// Bit in the entry flags marking UTF-16LE text.
pub const MESSAGE_RESOURCE_UNICODE: u16 = 0x0001;

const ENTRY_HEADER_SIZE: usize = 4;


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Error {
    TooShort { expected: usize, obtained: usize },
    InvalidLength { length: u16 },
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { expected, obtained }
                => write!(f, "message entry too short (expected {} bytes, obtained {})", expected, obtained),
            Self::InvalidLength { length }
                => write!(f, "invalid message entry length {}", length),
        }
    }
}
impl std::error::Error for Error {
}


/// One message string. Both slots may hold data; `unicode` decides which one is authoritative.
///
/// The 8-bit slot holds raw bytes in an unspecified code page.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MessageTableItem {
    unicode: bool,
    ansi: DisplayBytesVec,
    wide: Vec<u16>,
}
impl MessageTableItem {
    pub fn from_ansi(string: DisplayBytesVec) -> Self {
        let mut item = Self::default();
        item.set_ansi_string(string);
        item
    }

    pub fn from_unicode(string: Vec<u16>) -> Self {
        let mut item = Self::default();
        item.set_unicode_string(string);
        item
    }

    pub fn is_unicode(&self) -> bool {
        self.unicode
    }

    /// The 8-bit slot, whether or not it is the active one.
    pub fn ansi_string(&self) -> &DisplayBytesVec {
        &self.ansi
    }

    /// The UTF-16 slot, whether or not it is the active one.
    pub fn unicode_string(&self) -> &[u16] {
        &self.wide
    }

    pub fn unicode_string_lossy(&self) -> String {
        String::from_utf16_lossy(&self.wide)
    }

    pub fn set_ansi_string(&mut self, string: DisplayBytesVec) {
        self.ansi = string;
        self.unicode = false;
    }

    pub fn set_unicode_string(&mut self, string: Vec<u16>) {
        self.wide = string;
        self.unicode = true;
    }

    /// Decodes one `MESSAGE_RESOURCE_ENTRY` from the front of `bytes`.
    ///
    /// The entry length includes the four header bytes; trailing NUL padding is dropped.
    pub fn take_from_bytes(bytes: &[u8]) -> Result<(&[u8], Self), Error> {
        if bytes.len() < ENTRY_HEADER_SIZE {
            return Err(Error::TooShort { expected: ENTRY_HEADER_SIZE, obtained: bytes.len() });
        }

        let mut reader = LeReader::new(bytes);
        let length: u16 = reader.read();
        let flags: u16 = reader.read();

        let length_usize = usize::from(length);
        if length_usize < ENTRY_HEADER_SIZE {
            return Err(Error::InvalidLength { length });
        }
        if bytes.len() < length_usize {
            return Err(Error::TooShort { expected: length_usize, obtained: bytes.len() });
        }
        let text = &bytes[ENTRY_HEADER_SIZE..length_usize];

        let item = if flags & MESSAGE_RESOURCE_UNICODE != 0 {
            if text.len() % 2 != 0 {
                return Err(Error::InvalidLength { length });
            }
            let mut units: Vec<u16> = text.chunks_exact(2)
                .map(u16::from_le_byte_slice)
                .collect();
            while units.last() == Some(&0) {
                units.pop();
            }
            Self::from_unicode(units)
        } else {
            let mut chars = text.to_vec();
            while chars.last() == Some(&0) {
                chars.pop();
            }
            Self::from_ansi(DisplayBytesVec::from(chars))
        };
        Ok((&bytes[length_usize..], item))
    }

    /// Encodes the active string as a `MESSAGE_RESOURCE_ENTRY`, NUL-terminated and padded to a
    /// multiple of four bytes.
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<(), Error> {
        let mut text = Vec::new();
        let flags = if self.unicode {
            for unit in self.wide.iter().copied().chain(std::iter::once(0)) {
                unit.write_le_bytes(&mut text);
            }
            MESSAGE_RESOURCE_UNICODE
        } else {
            text.extend_from_slice(self.ansi.as_slice());
            text.push(0x00);
            0
        };
        while (ENTRY_HEADER_SIZE + text.len()) % 4 != 0 {
            text.push(0x00);
        }

        let total = ENTRY_HEADER_SIZE + text.len();
        let length = u16::try_from(total)
            .map_err(|_| Error::InvalidLength { length: u16::MAX })?;
        length.write_le_bytes(out);
        flags.write_le_bytes(out);
        out.extend_from_slice(&text);
        Ok(())
    }
}
