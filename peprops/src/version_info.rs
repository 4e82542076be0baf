//! Fixed file version information, the binary part of a version resource.

use std::fmt;

use bitflags::bitflags;

use crate::le_int::{LeInt, LeReader};


pub const FIXED_FILE_INFO_SIGNATURE: u32 = 0xFEEF_04BD;

/// Structure version written into freshly encoded records.
pub const FIXED_FILE_INFO_STRUC_VERSION: u32 = 0x0001_0000;


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Error {
    TooShort { expected: usize, obtained: usize },
    WrongSignature { obtained: u32 },
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { expected, obtained }
                => write!(f, "fixed file info too short (expected {} bytes, obtained {})", expected, obtained),
            Self::WrongSignature { obtained }
                => write!(f, "wrong fixed file info signature {:#010X}", obtained),
        }
    }
}
impl std::error::Error for Error {
}


/// `VS_FIXEDFILEINFO` as stored in the resource.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FixedFileInfo {
    pub signature: u32,
    pub struc_version: u32,
    pub file_version_ms: u32,
    pub file_version_ls: u32,
    pub product_version_ms: u32,
    pub product_version_ls: u32,
    pub file_flags_mask: u32,
    pub file_flags: u32,
    pub file_os: u32,
    pub file_type: u32,
    pub file_subtype: u32,
    pub file_date_ms: u32,
    pub file_date_ls: u32,
}
impl FixedFileInfo {
    pub const SIZE: usize = 13 * 4;

    pub fn take_from_bytes(bytes: &[u8]) -> Result<(&[u8], Self), Error> {
        if bytes.len() < Self::SIZE {
            return Err(Error::TooShort { expected: Self::SIZE, obtained: bytes.len() });
        }

        let mut reader = LeReader::new(bytes);
        let signature: u32 = reader.read();
        if signature != FIXED_FILE_INFO_SIGNATURE {
            return Err(Error::WrongSignature { obtained: signature });
        }

        let info = Self {
            signature,
            struc_version: reader.read(),
            file_version_ms: reader.read(),
            file_version_ls: reader.read(),
            product_version_ms: reader.read(),
            product_version_ls: reader.read(),
            file_flags_mask: reader.read(),
            file_flags: reader.read(),
            file_os: reader.read(),
            file_type: reader.read(),
            file_subtype: reader.read(),
            file_date_ms: reader.read(),
            file_date_ls: reader.read(),
        };
        Ok((reader.rest(), info))
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        for value in [
            self.signature, self.struc_version,
            self.file_version_ms, self.file_version_ls,
            self.product_version_ms, self.product_version_ls,
            self.file_flags_mask, self.file_flags,
            self.file_os, self.file_type, self.file_subtype,
            self.file_date_ms, self.file_date_ls,
        ] {
            value.write_le_bytes(out);
        }
    }
}


bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
    #[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
    pub struct FileFlags : u32 {
        const DEBUG = 0x0000_0001;
        const PRERELEASE = 0x0000_0002;
        const PATCHED = 0x0000_0004;
        const PRIVATE_BUILD = 0x0000_0008;
        const INFO_INFERRED = 0x0000_0010;
        const SPECIAL_BUILD = 0x0000_0020;
    }
}


/// The operating system a file was designed for.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FileOs {
    /// A raw code without a name; setting it leaves the raw code unchanged.
    Unknown,
    Dos,
    Os216,
    Os232,
    Nt,
    WindowsCe,
    Windows16,
    PresentationManager16,
    PresentationManager32,
    Windows32,
    DosWindows16,
    DosWindows32,
    Os216PresentationManager16,
    Os232PresentationManager32,
    NtWindows32,
}
const FILE_OS_CODES: [(FileOs, u32); 14] = [
    (FileOs::Dos, 0x0001_0000),
    (FileOs::Os216, 0x0002_0000),
    (FileOs::Os232, 0x0003_0000),
    (FileOs::Nt, 0x0004_0000),
    (FileOs::WindowsCe, 0x0005_0000),
    (FileOs::Windows16, 0x0000_0001),
    (FileOs::PresentationManager16, 0x0000_0002),
    (FileOs::PresentationManager32, 0x0000_0003),
    (FileOs::Windows32, 0x0000_0004),
    (FileOs::DosWindows16, 0x0001_0001),
    (FileOs::DosWindows32, 0x0001_0004),
    (FileOs::Os216PresentationManager16, 0x0002_0002),
    (FileOs::Os232PresentationManager32, 0x0003_0003),
    (FileOs::NtWindows32, 0x0004_0004),
];
impl FileOs {
    pub fn from_raw(raw: u32) -> Self {
        FILE_OS_CODES.iter()
            .find(|(_, code)| *code == raw)
            .map(|(os, _)| *os)
            .unwrap_or(Self::Unknown)
    }

    /// The raw code, or `None` for [`FileOs::Unknown`].
    pub fn to_raw(self) -> Option<u32> {
        FILE_OS_CODES.iter()
            .find(|(os, _)| *os == self)
            .map(|(_, code)| *code)
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FileType {
    /// A raw code without a name; setting it leaves the raw code unchanged.
    Unknown,
    Application,
    Dll,
    Driver,
    Font,
    Vxd,
    StaticLib,
}
const FILE_TYPE_CODES: [(FileType, u32); 6] = [
    (FileType::Application, 1),
    (FileType::Dll, 2),
    (FileType::Driver, 3),
    (FileType::Font, 4),
    (FileType::Vxd, 5),
    (FileType::StaticLib, 7),
];
impl FileType {
    pub fn from_raw(raw: u32) -> Self {
        FILE_TYPE_CODES.iter()
            .find(|(_, code)| *code == raw)
            .map(|(file_type, _)| *file_type)
            .unwrap_or(Self::Unknown)
    }

    /// The raw code, or `None` for [`FileType::Unknown`].
    pub fn to_raw(self) -> Option<u32> {
        FILE_TYPE_CODES.iter()
            .find(|(file_type, _)| *file_type == self)
            .map(|(_, code)| *code)
    }
}


/// Decoded fixed file version information.
///
/// Every field is stored raw; the flag word and the OS and type codes have named views on top.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FileVersionInfo {
    file_version_ms: u32,
    file_version_ls: u32,
    product_version_ms: u32,
    product_version_ls: u32,
    file_flags: FileFlags,
    file_os: u32,
    file_type: u32,
    file_subtype: u32,
    file_date_ms: u32,
    file_date_ls: u32,
}
impl From<FixedFileInfo> for FileVersionInfo {
    fn from(info: FixedFileInfo) -> Self {
        Self {
            file_version_ms: info.file_version_ms,
            file_version_ls: info.file_version_ls,
            product_version_ms: info.product_version_ms,
            product_version_ls: info.product_version_ls,
            file_flags: FileFlags::from_bits_retain(info.file_flags),
            file_os: info.file_os,
            file_type: info.file_type,
            file_subtype: info.file_subtype,
            file_date_ms: info.file_date_ms,
            file_date_ls: info.file_date_ls,
        }
    }
}
impl FileVersionInfo {
    /// Encodes the information as a fresh `VS_FIXEDFILEINFO` with every known flag in the mask.
    pub fn to_fixed_file_info(&self) -> FixedFileInfo {
        FixedFileInfo {
            signature: FIXED_FILE_INFO_SIGNATURE,
            struc_version: FIXED_FILE_INFO_STRUC_VERSION,
            file_version_ms: self.file_version_ms,
            file_version_ls: self.file_version_ls,
            product_version_ms: self.product_version_ms,
            product_version_ls: self.product_version_ls,
            file_flags_mask: FileFlags::all().bits(),
            file_flags: self.file_flags.bits(),
            file_os: self.file_os,
            file_type: self.file_type,
            file_subtype: self.file_subtype,
            file_date_ms: self.file_date_ms,
            file_date_ls: self.file_date_ls,
        }
    }

    pub fn is_debug(&self) -> bool { self.file_flags.contains(FileFlags::DEBUG) }
    pub fn is_prerelease(&self) -> bool { self.file_flags.contains(FileFlags::PRERELEASE) }
    pub fn is_patched(&self) -> bool { self.file_flags.contains(FileFlags::PATCHED) }
    pub fn is_private_build(&self) -> bool { self.file_flags.contains(FileFlags::PRIVATE_BUILD) }
    pub fn is_special_build(&self) -> bool { self.file_flags.contains(FileFlags::SPECIAL_BUILD) }
    pub fn is_info_inferred(&self) -> bool { self.file_flags.contains(FileFlags::INFO_INFERRED) }

    pub fn set_debug(&mut self, value: bool) { self.file_flags.set(FileFlags::DEBUG, value) }
    pub fn set_prerelease(&mut self, value: bool) { self.file_flags.set(FileFlags::PRERELEASE, value) }
    pub fn set_patched(&mut self, value: bool) { self.file_flags.set(FileFlags::PATCHED, value) }
    pub fn set_private_build(&mut self, value: bool) { self.file_flags.set(FileFlags::PRIVATE_BUILD, value) }
    pub fn set_special_build(&mut self, value: bool) { self.file_flags.set(FileFlags::SPECIAL_BUILD, value) }
    pub fn set_info_inferred(&mut self, value: bool) { self.file_flags.set(FileFlags::INFO_INFERRED, value) }

    /// The raw flag word, including bits without a name.
    pub fn file_flags(&self) -> u32 { self.file_flags.bits() }
    pub fn set_file_flags(&mut self, flags: u32) { self.file_flags = FileFlags::from_bits_retain(flags) }

    pub fn file_version_ms(&self) -> u32 { self.file_version_ms }
    pub fn file_version_ls(&self) -> u32 { self.file_version_ls }
    pub fn product_version_ms(&self) -> u32 { self.product_version_ms }
    pub fn product_version_ls(&self) -> u32 { self.product_version_ls }
    pub fn set_file_version_ms(&mut self, value: u32) { self.file_version_ms = value }
    pub fn set_file_version_ls(&mut self, value: u32) { self.file_version_ls = value }
    pub fn set_product_version_ms(&mut self, value: u32) { self.product_version_ms = value }
    pub fn set_product_version_ls(&mut self, value: u32) { self.product_version_ls = value }

    pub fn file_os_raw(&self) -> u32 { self.file_os }
    pub fn set_file_os_raw(&mut self, file_os: u32) { self.file_os = file_os }
    pub fn file_os(&self) -> FileOs { FileOs::from_raw(self.file_os) }

    /// Sets the OS code; [`FileOs::Unknown`] leaves the raw code as it is.
    pub fn set_file_os(&mut self, file_os: FileOs) {
        if let Some(raw) = file_os.to_raw() {
            self.file_os = raw;
        }
    }

    pub fn file_type_raw(&self) -> u32 { self.file_type }
    pub fn set_file_type_raw(&mut self, file_type: u32) { self.file_type = file_type }
    pub fn file_type(&self) -> FileType { FileType::from_raw(self.file_type) }

    /// Sets the type code; [`FileType::Unknown`] leaves the raw code as it is.
    pub fn set_file_type(&mut self, file_type: FileType) {
        if let Some(raw) = file_type.to_raw() {
            self.file_type = raw;
        }
    }

    /// Usually only non-zero for drivers and fonts.
    pub fn file_subtype(&self) -> u32 { self.file_subtype }
    pub fn set_file_subtype(&mut self, subtype: u32) { self.file_subtype = subtype }

    pub fn file_date_ms(&self) -> u32 { self.file_date_ms }
    pub fn file_date_ls(&self) -> u32 { self.file_date_ls }
    pub fn set_file_date_ms(&mut self, value: u32) { self.file_date_ms = value }
    pub fn set_file_date_ls(&mut self, value: u32) { self.file_date_ls = value }

    pub fn file_version_string(&self) -> String {
        version_string(self.file_version_ms, self.file_version_ls)
    }

    pub fn product_version_string(&self) -> String {
        version_string(self.product_version_ms, self.product_version_ls)
    }
}

fn version_string(ms: u32, ls: u32) -> String {
    format!("{}.{}.{}.{}", ms >> 16, ms & 0xFFFF, ls >> 16, ls & 0xFFFF)
}


#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        for value in [
            0xFEEF_04BDu32, 0x0001_0000,
            0x000A_0000, 0x4A61_0001, // 10.0.19041.1
            0x000A_0000, 0x4A61_0000,
            0x0000_003F, 0x0000_0000,
            0x0004_0004, 0x0000_0002, 0x0000_0000,
            0x0000_0000, 0x0000_0000,
        ] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_decode_fixed_file_info() {
        let bytes = sample_bytes();
        let (rest, fixed) = FixedFileInfo::take_from_bytes(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(fixed.file_os, 0x0004_0004);

        let info = FileVersionInfo::from(fixed);
        assert_eq!(info.file_version_string(), "10.0.19041.1");
        assert_eq!(info.product_version_string(), "10.0.19041.0");
        assert_eq!(info.file_os(), FileOs::NtWindows32);
        assert_eq!(info.file_type(), FileType::Dll);

        let mut out = Vec::new();
        info.to_fixed_file_info().write_to(&mut out);
        assert_eq!(out, bytes);
    }

    #[test]
    fn test_fixed_file_info_errors() {
        let mut bytes = sample_bytes();
        assert_eq!(
            FixedFileInfo::take_from_bytes(&bytes[..51]),
            Err(Error::TooShort { expected: 52, obtained: 51 }),
        );

        bytes[0] = 0xBC;
        assert_eq!(
            FixedFileInfo::take_from_bytes(&bytes),
            Err(Error::WrongSignature { obtained: 0xFEEF_04BC }),
        );
    }

    #[test]
    fn test_flags_are_independent() {
        let mut info = FileVersionInfo::default();
        info.set_file_flags(0x1);
        assert!(info.is_debug());
        assert!(!info.is_prerelease());
        assert!(!info.is_patched());
        assert!(!info.is_private_build());
        assert!(!info.is_special_build());
        assert!(!info.is_info_inferred());

        info.set_prerelease(true);
        assert!(info.is_debug());
        assert!(info.is_prerelease());

        info.set_debug(false);
        assert_eq!(info.file_flags(), 0x2);
    }

    #[test]
    fn test_unnamed_flag_bits_survive() {
        let mut info = FileVersionInfo::default();
        info.set_file_flags(0x8000_0001);
        info.set_special_build(true);
        assert_eq!(info.file_flags(), 0x8000_0021);
    }

    #[test]
    fn test_unknown_os_is_preserved() {
        let mut info = FileVersionInfo::default();
        info.set_file_os_raw(0xFFFF);
        assert_eq!(info.file_os(), FileOs::Unknown);

        info.set_file_os(FileOs::Unknown);
        assert_eq!(info.file_os_raw(), 0xFFFF);

        info.set_file_os(FileOs::Windows32);
        assert_eq!(info.file_os_raw(), 0x0000_0004);
    }

    #[test]
    fn test_unknown_type_is_preserved() {
        let mut info = FileVersionInfo::default();
        info.set_file_type_raw(6);
        assert_eq!(info.file_type(), FileType::Unknown);
        info.set_file_type(FileType::Unknown);
        assert_eq!(info.file_type_raw(), 6);
        info.set_file_type(FileType::StaticLib);
        assert_eq!(info.file_type_raw(), 7);
    }

    #[test]
    fn test_os_table_is_bijective() {
        for (os, code) in FILE_OS_CODES {
            assert_eq!(FileOs::from_raw(code), os);
            assert_eq!(os.to_raw(), Some(code));
        }
        assert_eq!(FileOs::Unknown.to_raw(), None);
    }
}
