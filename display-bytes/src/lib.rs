//! Byte strings that print like Rust byte string literals.

use std::fmt;
use std::ops::{Index, IndexMut};


fn write_escaped(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    write!(f, "b\"")?;
    for &b in bytes {
        match b {
            0x00 => write!(f, "\\0")?,
            0x09 => write!(f, "\\t")?,
            0x0A => write!(f, "\\n")?,
            0x0D => write!(f, "\\r")?,
            0x22 => write!(f, "\\\"")?,
            // 0x27 needs no escape inside double quotes
            0x5C => write!(f, "\\\\")?,
            0x20..=0x7E => write!(f, "{}", char::from(b))?,
            other => write!(f, "\\x{:02X}", other)?,
        }
    }
    write!(f, "\"")
}


/// An owned byte string in no particular encoding.
#[derive(Clone, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct DisplayBytesVec(Vec<u8>);
impl DisplayBytesVec {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
impl fmt::Debug for DisplayBytesVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DisplayBytesVec({})", self)
    }
}
impl fmt::Display for DisplayBytesVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_escaped(f, &self.0)
    }
}
impl From<Vec<u8>> for DisplayBytesVec {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}
impl From<&[u8]> for DisplayBytesVec {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}
impl From<DisplayBytesVec> for Vec<u8> {
    fn from(value: DisplayBytesVec) -> Self {
        value.0
    }
}
impl AsRef<[u8]> for DisplayBytesVec {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
impl Index<usize> for DisplayBytesVec {
    type Output = u8;
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}
impl IndexMut<usize> for DisplayBytesVec {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}
