//! Raw NT header records of the Portable Executable format.
//!
//! The NT headers follow the `PE\0\0` signature: a COFF file header, an optional header whose
//! layout depends on the image width (PE32 or PE32+), and a table of data directory entries whose
//! length is declared by the last field of the optional header.
//!
//! All records are read from and written to little-endian bytes at exactly the offsets the format
//! prescribes.

use std::fmt;

use bitflags::bitflags;
use from_to_repr::from_to_other;
use tracing::debug;

use crate::error::{Error, MalformedHeaderKind};
use crate::le_int::{LeInt, LeReader};
use crate::width::BaseSize;


/// `PE\0\0`
pub const NT_SIGNATURE: u32 = 0x0000_4550;

pub const PE32_MAGIC: u16 = 0x010B;
pub const PE64_MAGIC: u16 = 0x020B;

pub const ORDINAL_FLAG_32: u32 = 0x8000_0000;
pub const ORDINAL_FLAG_64: u64 = 0x8000_0000_0000_0000;

/// Number of data directory slots defined by the format.
pub const DIRECTORY_COUNT: usize = 16;

pub const SIGNATURE_SIZE: usize = 4;
pub const FILE_HEADER_SIZE: usize = 20;
pub const DATA_DIRECTORY_ENTRY_SIZE: usize = 8;
const STANDARD_FIELDS_SIZE: usize = 24;


#[derive(Clone, Copy, Debug)]
#[from_to_other(base_type = u16, derive_compare = "as_int")]
pub enum MachineType {
    Unknown = 0x0000,
    AlphaAxp = 0x0184,
    Alpha64 = 0x0284,
    Amd64 = 0x8664,
    Arm = 0x01C0,
    Arm64 = 0xAA64,
    ArmThumb = 0x01C2,
    ArmThumb2 = 0x01C4,
    EfiByteCode = 0x0EBC,
    I386 = 0x014C,
    Itanium = 0x0200,
    LoongArch32 = 0x6232,
    LoongArch64 = 0x6264,
    MipsR4k = 0x0166,
    PowerPc = 0x01F0,
    RiscV32 = 0x5032,
    RiscV64 = 0x5064,
    HitachiSh3 = 0x01A2,
    HitachiSh4 = 0x01A6,
    Other(u16),
}

/// The environment an image expects to run in.
#[derive(Clone, Copy, Debug)]
#[from_to_other(base_type = u16, derive_compare = "as_int")]
pub enum Subsystem {
    /// No subsystem recorded.
    Unknown = 0,

    /// Kernel-mode driver or native user-mode process without Win32.
    Native = 1,

    /// Win32 process with a graphical interface.
    WindowsGui = 2,

    /// Win32 process attached to a console.
    WindowsCui = 3,

    // 4 reserved

    /// OS/2 console process.
    Os2Cui = 5,

    // 6 reserved

    /// POSIX console process.
    PosixCui = 7,

    /// Driver for Windows 9x.
    NativeWindows = 8,

    /// Windows CE process with a graphical interface.
    WindowsCeGui = 9,

    /// EFI application.
    EfiApplication = 10,

    /// EFI driver that stays resident until boot services are exited.
    EfiBootServiceDriver = 11,

    /// EFI driver that remains loaded at runtime.
    EfiRuntimeDriver = 12,

    /// EFI option ROM image.
    EfiRom = 13,

    /// Original Xbox executable.
    Xbox = 14,

    // 15 reserved

    /// Boot manager or other boot application.
    WindowsBootApplication = 16,

    Other(u16),
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
    pub struct Characteristics : u16 {
        /// Image has no base relocations and must be loaded at its preferred address.
        ///
        /// Set whenever the base relocation directory is removed.
        const RELOCS_STRIPPED = 0x0001;

        /// Image is valid and may be run. A missing flag points to a failed link.
        const EXECUTABLE_IMAGE = 0x0002;

        /// COFF line numbers were removed. Deprecated along with COFF debug information.
        const LINE_NUMS_STRIPPED = 0x0004;

        /// COFF local symbols were removed. Deprecated along with COFF debug information.
        const LOCAL_SYMS_STRIPPED = 0x0008;

        /// Trim the working set aggressively. Ignored since Windows 2000.
        const AGGRESSIVE_WS_TRIM = 0x0010;

        /// Image copes with addresses above 2 GiB.
        const LARGE_ADDRESS_AWARE = 0x0020;

        // 0x0040 reserved

        /// Bytes of a word are stored little-endian. Deprecated.
        const BYTES_REVERSED_LO = 0x0080;

        /// Target machine uses 32-bit words.
        const IS_32BIT_MACHINE = 0x0100;

        /// Debug information lives outside the image.
        const DEBUG_STRIPPED = 0x0200;

        /// Copy to the swap file before running when started from removable media.
        const REMOVABLE_RUN_FROM_SWAP = 0x0400;

        /// Copy to the swap file before running when started from the network.
        const NET_RUN_FROM_SWAP = 0x0800;

        /// Image is a system file such as a driver.
        const SYSTEM = 0x1000;

        /// Image is a dynamic-link library.
        const DLL = 0x2000;

        /// Only run on a uniprocessor machine.
        const UP_SYSTEM_ONLY = 0x4000;

        /// Bytes of a word are stored big-endian. Deprecated.
        const BYTES_REVERSED_HI = 0x8000;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
    pub struct DllCharacteristics : u16 {
        // 0x0001 through 0x0010 reserved

        /// 64-bit image supports a high-entropy address space layout.
        const HIGH_ENTROPY_VIRTUAL_ADDRESSES = 0x0020;

        /// Image may be rebased at load time.
        ///
        /// Cleared whenever the base relocation directory is removed.
        const DYNAMIC_BASE = 0x0040;

        /// Code integrity checks are enforced on load.
        const FORCE_INTEGRITY = 0x0080;

        /// Image is compatible with data execution prevention.
        const NX_COMPATIBILITY = 0x0100;

        /// Image knows about isolation but must not be isolated.
        const NO_ISOLATION = 0x0200;

        /// Image uses no structured exception handlers.
        const NO_SEH = 0x0400;

        /// Image must not be bound.
        const NO_BIND = 0x0800;

        /// Image must run inside an AppContainer.
        const APPCONTAINER = 0x1000;

        /// Image is a Windows Driver Model driver.
        const WDM_DRIVER = 0x2000;

        /// Image supports Control Flow Guard.
        const GUARD_CF = 0x4000;

        /// Image is aware of Terminal Server sessions.
        const TERMINAL_SERVER_AWARE = 0x8000;
    }
}


/// Well-known positions in the data directory table.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum DirectoryId {
    ExportTable,
    ImportTable,
    ResourceTable,
    ExceptionTable,
    CertificateTable,
    BaseRelocationTable,
    Debug,
    Architecture,
    GlobalPtr,
    TlsTable,
    LoadConfigTable,
    BoundImport,
    ImportAddressTable,
    DelayImportDescriptor,
    ClrRuntimeHeader,
    Reserved15,
}
impl DirectoryId {
    pub const ALL: [DirectoryId; DIRECTORY_COUNT] = [
        Self::ExportTable,
        Self::ImportTable,
        Self::ResourceTable,
        Self::ExceptionTable,
        Self::CertificateTable,
        Self::BaseRelocationTable,
        Self::Debug,
        Self::Architecture,
        Self::GlobalPtr,
        Self::TlsTable,
        Self::LoadConfigTable,
        Self::BoundImport,
        Self::ImportAddressTable,
        Self::DelayImportDescriptor,
        Self::ClrRuntimeHeader,
        Self::Reserved15,
    ];

    pub fn from_index(index: u32) -> Option<Self> {
        let index_usize = usize::try_from(index).ok()?;
        Self::ALL.get(index_usize).copied()
    }
}
impl From<DirectoryId> for u32 {
    fn from(value: DirectoryId) -> Self {
        match value {
            DirectoryId::ExportTable => 0,
            DirectoryId::ImportTable => 1,
            DirectoryId::ResourceTable => 2,
            DirectoryId::ExceptionTable => 3,
            DirectoryId::CertificateTable => 4,
            DirectoryId::BaseRelocationTable => 5,
            DirectoryId::Debug => 6,
            DirectoryId::Architecture => 7,
            DirectoryId::GlobalPtr => 8,
            DirectoryId::TlsTable => 9,
            DirectoryId::LoadConfigTable => 10,
            DirectoryId::BoundImport => 11,
            DirectoryId::ImportAddressTable => 12,
            DirectoryId::DelayImportDescriptor => 13,
            DirectoryId::ClrRuntimeHeader => 14,
            DirectoryId::Reserved15 => 15,
        }
    }
}
impl fmt::Display for DirectoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}


#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DataDirectoryEntry {
    pub address: u32,
    pub size: u32,
}
impl DataDirectoryEntry {
    /// An entry is absent iff both its address and its size are zero.
    pub fn is_empty(&self) -> bool {
        self.address == 0 && self.size == 0
    }
}

/// The data directory table: a fixed number of slots and the count of slots the header declares.
///
/// Slots at or beyond the declared count are always zero, so shrinking and growing the table never
/// resurrects stale entries.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DataDirectoryTable {
    entries: [DataDirectoryEntry; DIRECTORY_COUNT],
    len: u32,
}
impl DataDirectoryTable {
    pub fn with_len(len: u32) -> Self {
        let mut table = Self::default();
        table.resize(len);
        table
    }

    /// The declared number of entries (`NumberOfRvaAndSizes`).
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_entries(&self) -> &[DataDirectoryEntry] {
        // len never exceeds DIRECTORY_COUNT
        &self.entries[..self.len as usize]
    }

    pub fn entry(&self, id: u32) -> Option<&DataDirectoryEntry> {
        if id < self.len {
            self.entries.get(id as usize)
        } else {
            None
        }
    }

    pub fn entry_mut(&mut self, id: u32) -> Option<&mut DataDirectoryEntry> {
        if id < self.len {
            self.entries.get_mut(id as usize)
        } else {
            None
        }
    }

    /// Changes the declared number of entries, zeroing every slot that falls outside the new
    /// length. Lengths beyond the slot capacity are clamped. Returns the resulting length.
    pub fn resize(&mut self, new_len: u32) -> u32 {
        let capacity = DIRECTORY_COUNT as u32;
        let clamped = if new_len > capacity {
            debug!("clamping declared directory count {} to {}", new_len, capacity);
            capacity
        } else {
            new_len
        };
        for entry in &mut self.entries[clamped as usize..] {
            *entry = DataDirectoryEntry::default();
        }
        self.len = clamped;
        clamped
    }

    /// Reads `declared_len` entries (clamped to the slot capacity) from the front of `bytes`.
    pub fn take_from_bytes(bytes: &[u8], declared_len: u32) -> Result<(&[u8], Self), Error> {
        let mut table = Self::default();
        let len = table.resize(declared_len);

        let byte_count = len as usize * DATA_DIRECTORY_ENTRY_SIZE;
        if bytes.len() < byte_count {
            return Err(MalformedHeaderKind::TooShort { expected: byte_count, obtained: bytes.len() }.into());
        }

        let mut reader = LeReader::new(bytes);
        for entry in &mut table.entries[..len as usize] {
            entry.address = reader.read();
            entry.size = reader.read();
        }
        Ok((reader.rest(), table))
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        for entry in self.as_entries() {
            entry.address.write_le_bytes(out);
            entry.size.write_le_bytes(out);
        }
    }
}


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct FileHeader {
    pub machine: MachineType, // u16
    pub number_of_sections: u16,
    pub time_date_stamp: u32,
    pub pointer_to_symbol_table: u32, // COFF debug info, deprecated
    pub number_of_symbols: u32, // COFF debug info, deprecated
    pub size_of_optional_header: u16,
    pub characteristics: Characteristics, // u16
}
impl Default for FileHeader {
    fn default() -> Self {
        Self {
            machine: MachineType::Unknown,
            number_of_sections: 0,
            time_date_stamp: 0,
            pointer_to_symbol_table: 0,
            number_of_symbols: 0,
            size_of_optional_header: 0,
            characteristics: Characteristics::empty(),
        }
    }
}
impl FileHeader {
    pub fn take_from_bytes(bytes: &[u8]) -> Result<(&[u8], Self), Error> {
        if bytes.len() < FILE_HEADER_SIZE {
            return Err(MalformedHeaderKind::TooShort { expected: FILE_HEADER_SIZE, obtained: bytes.len() }.into());
        }

        let mut reader = LeReader::new(bytes);
        let machine = MachineType::from_base_type(reader.read());
        let number_of_sections = reader.read();
        let time_date_stamp = reader.read();
        let pointer_to_symbol_table = reader.read();
        let number_of_symbols = reader.read();
        let size_of_optional_header = reader.read();
        let characteristics = Characteristics::from_bits_retain(reader.read());

        let header = Self {
            machine,
            number_of_sections,
            time_date_stamp,
            pointer_to_symbol_table,
            number_of_symbols,
            size_of_optional_header,
            characteristics,
        };
        Ok((reader.rest(), header))
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        self.machine.to_base_type().write_le_bytes(out);
        self.number_of_sections.write_le_bytes(out);
        self.time_date_stamp.write_le_bytes(out);
        self.pointer_to_symbol_table.write_le_bytes(out);
        self.number_of_symbols.write_le_bytes(out);
        self.size_of_optional_header.write_le_bytes(out);
        self.characteristics.bits().write_le_bytes(out);
    }
}


/// Optional header fields shared verbatim by PE32 and PE32+.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct StandardFields {
    pub magic: u16,
    pub major_linker_version: u8,
    pub minor_linker_version: u8,
    pub size_of_code: u32,
    pub size_of_initialized_data: u32,
    pub size_of_uninitialized_data: u32,
    pub address_of_entry_point: u32,
    pub base_of_code: u32,
}
impl StandardFields {
    fn read(reader: &mut LeReader<'_>) -> Self {
        Self {
            magic: reader.read(),
            major_linker_version: reader.read(),
            minor_linker_version: reader.read(),
            size_of_code: reader.read(),
            size_of_initialized_data: reader.read(),
            size_of_uninitialized_data: reader.read(),
            address_of_entry_point: reader.read(),
            base_of_code: reader.read(),
        }
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        self.magic.write_le_bytes(out);
        self.major_linker_version.write_le_bytes(out);
        self.minor_linker_version.write_le_bytes(out);
        self.size_of_code.write_le_bytes(out);
        self.size_of_initialized_data.write_le_bytes(out);
        self.size_of_uninitialized_data.write_le_bytes(out);
        self.address_of_entry_point.write_le_bytes(out);
        self.base_of_code.write_le_bytes(out);
    }
}

/// Windows-specific optional header fields. `B` is `u32` on PE32 and `u64` on PE32+.
///
/// The trailing `NumberOfRvaAndSizes` field is not stored here; it is the length of the
/// [`DataDirectoryTable`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct WindowsFields<B> {
    pub image_base: B,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub major_os_version: u16,
    pub minor_os_version: u16,
    pub major_image_version: u16,
    pub minor_image_version: u16,
    pub major_subsystem_version: u16,
    pub minor_subsystem_version: u16,
    pub win32_version_value: u32,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub checksum: u32,
    pub subsystem: Subsystem, // u16
    pub dll_characteristics: DllCharacteristics, // u16
    pub size_of_stack_reserve: B,
    pub size_of_stack_commit: B,
    pub size_of_heap_reserve: B,
    pub size_of_heap_commit: B,
    pub loader_flags: u32,
}
impl<B: BaseSize> Default for WindowsFields<B> {
    fn default() -> Self {
        Self {
            image_base: B::default(),
            section_alignment: 0,
            file_alignment: 0,
            major_os_version: 0,
            minor_os_version: 0,
            major_image_version: 0,
            minor_image_version: 0,
            major_subsystem_version: 0,
            minor_subsystem_version: 0,
            win32_version_value: 0,
            size_of_image: 0,
            size_of_headers: 0,
            checksum: 0,
            subsystem: Subsystem::Unknown,
            dll_characteristics: DllCharacteristics::empty(),
            size_of_stack_reserve: B::default(),
            size_of_stack_commit: B::default(),
            size_of_heap_reserve: B::default(),
            size_of_heap_commit: B::default(),
            loader_flags: 0,
        }
    }
}
impl<B: BaseSize> WindowsFields<B> {
    /// Encoded size, not counting `NumberOfRvaAndSizes`.
    pub const SIZE: usize = 5 * B::SIZE + 44;

    fn read(reader: &mut LeReader<'_>) -> Self {
        Self {
            image_base: reader.read(),
            section_alignment: reader.read(),
            file_alignment: reader.read(),
            major_os_version: reader.read(),
            minor_os_version: reader.read(),
            major_image_version: reader.read(),
            minor_image_version: reader.read(),
            major_subsystem_version: reader.read(),
            minor_subsystem_version: reader.read(),
            win32_version_value: reader.read(),
            size_of_image: reader.read(),
            size_of_headers: reader.read(),
            checksum: reader.read(),
            subsystem: Subsystem::from_base_type(reader.read()),
            dll_characteristics: DllCharacteristics::from_bits_retain(reader.read()),
            size_of_stack_reserve: reader.read(),
            size_of_stack_commit: reader.read(),
            size_of_heap_reserve: reader.read(),
            size_of_heap_commit: reader.read(),
            loader_flags: reader.read(),
        }
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        self.image_base.write_le_bytes(out);
        self.section_alignment.write_le_bytes(out);
        self.file_alignment.write_le_bytes(out);
        self.major_os_version.write_le_bytes(out);
        self.minor_os_version.write_le_bytes(out);
        self.major_image_version.write_le_bytes(out);
        self.minor_image_version.write_le_bytes(out);
        self.major_subsystem_version.write_le_bytes(out);
        self.minor_subsystem_version.write_le_bytes(out);
        self.win32_version_value.write_le_bytes(out);
        self.size_of_image.write_le_bytes(out);
        self.size_of_headers.write_le_bytes(out);
        self.checksum.write_le_bytes(out);
        self.subsystem.to_base_type().write_le_bytes(out);
        self.dll_characteristics.bits().write_le_bytes(out);
        self.size_of_stack_reserve.write_le_bytes(out);
        self.size_of_stack_commit.write_le_bytes(out);
        self.size_of_heap_reserve.write_le_bytes(out);
        self.size_of_heap_commit.write_le_bytes(out);
        self.loader_flags.write_le_bytes(out);
    }
}


/// Access to the width-specific optional header records.
pub trait OptionalHeaderRecord : Clone + fmt::Debug + Default + Eq + Send + Sync {
    type BaseSize: BaseSize;

    /// Encoded size up to and including `NumberOfRvaAndSizes`.
    const SIZE_WITHOUT_DIRECTORIES: usize;

    fn standard(&self) -> &StandardFields;
    fn standard_mut(&mut self) -> &mut StandardFields;
    fn windows(&self) -> &WindowsFields<Self::BaseSize>;
    fn windows_mut(&mut self) -> &mut WindowsFields<Self::BaseSize>;

    /// Reads the optional header up to, but not including, `NumberOfRvaAndSizes`.
    ///
    /// The caller guarantees that `reader` holds at least `SIZE_WITHOUT_DIRECTORIES` bytes.
    fn read(reader: &mut LeReader<'_>) -> Self;

    /// Writes the optional header up to, but not including, `NumberOfRvaAndSizes`.
    fn write_to(&self, out: &mut Vec<u8>);
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct OptionalHeader32 {
    pub standard: StandardFields,
    pub base_of_data: u32,
    pub windows: WindowsFields<u32>,
}
impl OptionalHeaderRecord for OptionalHeader32 {
    type BaseSize = u32;
    const SIZE_WITHOUT_DIRECTORIES: usize = STANDARD_FIELDS_SIZE + 4 + WindowsFields::<u32>::SIZE + 4;

    fn standard(&self) -> &StandardFields { &self.standard }
    fn standard_mut(&mut self) -> &mut StandardFields { &mut self.standard }
    fn windows(&self) -> &WindowsFields<u32> { &self.windows }
    fn windows_mut(&mut self) -> &mut WindowsFields<u32> { &mut self.windows }

    fn read(reader: &mut LeReader<'_>) -> Self {
        let standard = StandardFields::read(reader);
        let base_of_data = reader.read();
        let windows = WindowsFields::read(reader);
        Self {
            standard,
            base_of_data,
            windows,
        }
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        self.standard.write_to(out);
        self.base_of_data.write_le_bytes(out);
        self.windows.write_to(out);
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct OptionalHeader64 {
    pub standard: StandardFields,
    // no base_of_data; the 64-bit image base takes its place
    pub windows: WindowsFields<u64>,
}
impl OptionalHeaderRecord for OptionalHeader64 {
    type BaseSize = u64;
    const SIZE_WITHOUT_DIRECTORIES: usize = STANDARD_FIELDS_SIZE + WindowsFields::<u64>::SIZE + 4;

    fn standard(&self) -> &StandardFields { &self.standard }
    fn standard_mut(&mut self) -> &mut StandardFields { &mut self.standard }
    fn windows(&self) -> &WindowsFields<u64> { &self.windows }
    fn windows_mut(&mut self) -> &mut WindowsFields<u64> { &mut self.windows }

    fn read(reader: &mut LeReader<'_>) -> Self {
        let standard = StandardFields::read(reader);
        let windows = WindowsFields::read(reader);
        Self {
            standard,
            windows,
        }
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        self.standard.write_to(out);
        self.windows.write_to(out);
    }
}


/// The complete NT header region: signature, file header, optional header and directory table.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NtHeaders<O> {
    pub signature: u32,
    pub file_header: FileHeader,
    pub optional_header: O,
    pub data_directories: DataDirectoryTable,
}
impl<O: OptionalHeaderRecord> NtHeaders<O> {
    /// Size of the record with every directory slot present.
    pub const FULL_SIZE: usize = SIGNATURE_SIZE + FILE_HEADER_SIZE + Self::FULL_OPTIONAL_HEADER_SIZE;

    /// Size of the optional header with every directory slot present.
    pub const FULL_OPTIONAL_HEADER_SIZE: usize = O::SIZE_WITHOUT_DIRECTORIES + DIRECTORY_COUNT * DATA_DIRECTORY_ENTRY_SIZE;

    /// Reads the NT headers from the front of `bytes`, which must start with the `PE\0\0`
    /// signature.
    ///
    /// The optional header magic is not checked here; that is up to the width the caller selected.
    pub fn take_from_bytes(bytes: &[u8]) -> Result<(&[u8], Self), Error> {
        let fixed_size = SIGNATURE_SIZE + FILE_HEADER_SIZE + O::SIZE_WITHOUT_DIRECTORIES;
        if bytes.len() < fixed_size {
            return Err(MalformedHeaderKind::TooShort { expected: fixed_size, obtained: bytes.len() }.into());
        }

        let signature = u32::from_le_byte_slice(&bytes[0..4]);
        if signature != NT_SIGNATURE {
            return Err(MalformedHeaderKind::WrongSignature { obtained: signature }.into());
        }

        let (rest, file_header) = FileHeader::take_from_bytes(&bytes[4..])?;

        let mut reader = LeReader::new(rest);
        let optional_header = O::read(&mut reader);
        let declared_directory_count: u32 = reader.read();

        let (rest, data_directories) = DataDirectoryTable::take_from_bytes(reader.rest(), declared_directory_count)
            .map_err(|e| match e {
                // report the shortfall relative to the whole record
                Error::MalformedHeader(MalformedHeaderKind::TooShort { expected, .. }) => Error::MalformedHeader(
                    MalformedHeaderKind::TooShort { expected: fixed_size + expected, obtained: bytes.len() }
                ),
                other => other,
            })?;

        let headers = Self {
            signature,
            file_header,
            optional_header,
            data_directories,
        };
        Ok((rest, headers))
    }

    /// Encoded size with the currently declared number of directory entries.
    pub fn encoded_size(&self) -> usize {
        SIGNATURE_SIZE
            + FILE_HEADER_SIZE
            + O::SIZE_WITHOUT_DIRECTORIES
            + self.data_directories.len() as usize * DATA_DIRECTORY_ENTRY_SIZE
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        self.signature.write_le_bytes(out);
        self.file_header.write_to(out);
        self.optional_header.write_to(out);
        self.data_directories.len().write_le_bytes(out);
        self.data_directories.write_to(out);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_size());
        self.write_to(&mut out);
        out
    }
}

pub type NtHeaders32 = NtHeaders<OptionalHeader32>;
pub type NtHeaders64 = NtHeaders<OptionalHeader64>;


/// Peeks at the optional header magic of NT headers starting at the front of `bytes`.
pub fn peek_optional_header_magic(bytes: &[u8]) -> Result<u16, Error> {
    let magic_offset = SIGNATURE_SIZE + FILE_HEADER_SIZE;
    if bytes.len() < magic_offset + 2 {
        return Err(MalformedHeaderKind::TooShort { expected: magic_offset + 2, obtained: bytes.len() }.into());
    }
    let signature = u32::from_le_byte_slice(&bytes[0..4]);
    if signature != NT_SIGNATURE {
        return Err(MalformedHeaderKind::WrongSignature { obtained: signature }.into());
    }
    Ok(u16::from_le_byte_slice(&bytes[magic_offset..magic_offset+2]))
}


#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn test_record_sizes() {
        assert_eq!(OptionalHeader32::SIZE_WITHOUT_DIRECTORIES, 96);
        assert_eq!(OptionalHeader64::SIZE_WITHOUT_DIRECTORIES, 112);
        assert_eq!(NtHeaders32::FULL_OPTIONAL_HEADER_SIZE, 224);
        assert_eq!(NtHeaders64::FULL_OPTIONAL_HEADER_SIZE, 240);
        assert_eq!(NtHeaders32::FULL_SIZE, 248);
        assert_eq!(NtHeaders64::FULL_SIZE, 264);
    }

    #[test]
    fn test_file_header_offsets() {
        let bytes = b"\x64\x86\x05\x00\x78\x56\x34\x12\x00\x00\x00\x00\x00\x00\x00\x00\xF0\x00\x22\x00";
        let (rest, header) = FileHeader::take_from_bytes(bytes).unwrap();
        assert_eq!(rest.len(), 0);
        assert_eq!(header.machine, MachineType::Amd64);
        assert_eq!(header.number_of_sections, 5);
        assert_eq!(header.time_date_stamp, 0x1234_5678);
        assert_eq!(header.size_of_optional_header, 0xF0);
        assert_eq!(header.characteristics, Characteristics::EXECUTABLE_IMAGE | Characteristics::LARGE_ADDRESS_AWARE);

        let mut out = Vec::new();
        header.write_to(&mut out);
        assert_eq!(&out, bytes);
    }

    #[test]
    fn test_pe32_image_base_offset() {
        let mut headers = NtHeaders32::default();
        headers.signature = NT_SIGNATURE;
        headers.optional_header.standard.magic = PE32_MAGIC;
        headers.optional_header.base_of_data = 0xAAAA_AAAA;
        headers.optional_header.windows.image_base = 0x0040_0000;
        headers.optional_header.windows.size_of_heap_commit = 0x1000;
        let bytes = headers.to_bytes();

        assert_eq!(bytes.len(), 24 + 96);
        // optional header starts at 24; BaseOfData at +24, ImageBase at +28, SizeOfHeapCommit at +84
        assert_eq!(&bytes[24..26], b"\x0B\x01");
        assert_eq!(&bytes[48..52], b"\xAA\xAA\xAA\xAA");
        assert_eq!(&bytes[52..56], b"\x00\x00\x40\x00");
        assert_eq!(&bytes[108..112], b"\x00\x10\x00\x00");
    }

    #[test]
    fn test_pe64_image_base_offset() {
        let mut headers = NtHeaders64::default();
        headers.signature = NT_SIGNATURE;
        headers.optional_header.standard.magic = PE64_MAGIC;
        headers.optional_header.windows.image_base = 0x0000_0001_4000_0000;
        headers.optional_header.windows.size_of_heap_commit = 0x2000;
        headers.data_directories = DataDirectoryTable::with_len(16);
        headers.data_directories.entry_mut(1).unwrap().address = 0x3000;
        let bytes = headers.to_bytes();

        assert_eq!(bytes.len(), 264);
        // ImageBase at +24, SizeOfHeapCommit at +96, NumberOfRvaAndSizes at +108
        assert_eq!(&bytes[48..56], b"\x00\x00\x00\x40\x01\x00\x00\x00");
        assert_eq!(&bytes[120..128], b"\x00\x20\x00\x00\x00\x00\x00\x00");
        assert_eq!(&bytes[132..136], b"\x10\x00\x00\x00");
        // import table is the second entry
        assert_eq!(&bytes[144..148], b"\x00\x30\x00\x00");

        let (rest, reread) = NtHeaders64::take_from_bytes(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(reread, headers);
    }

    #[test]
    fn test_wrong_signature() {
        let mut bytes = NtHeaders32::default().to_bytes();
        bytes[0..4].copy_from_slice(b"NE\0\0");
        let err = NtHeaders32::take_from_bytes(&bytes).unwrap_err();
        assert_eq!(err, Error::MalformedHeader(MalformedHeaderKind::WrongSignature { obtained: 0x0000_454E }));
    }

    #[test]
    fn test_truncated_directory_table() {
        let mut headers = NtHeaders32::default();
        headers.signature = NT_SIGNATURE;
        headers.data_directories = DataDirectoryTable::with_len(16);
        let bytes = headers.to_bytes();

        let err = NtHeaders32::take_from_bytes(&bytes[..bytes.len() - 1]).unwrap_err();
        assert_eq!(err, Error::MalformedHeader(MalformedHeaderKind::TooShort { expected: 248, obtained: 247 }));
    }

    #[test]
    #[traced_test]
    fn test_oversized_declared_count_is_clamped() {
        let mut headers = NtHeaders32::default();
        headers.signature = NT_SIGNATURE;
        headers.data_directories = DataDirectoryTable::with_len(16);
        let mut bytes = headers.to_bytes();
        // NumberOfRvaAndSizes lives at 24 + 92
        bytes[116..120].copy_from_slice(&0x20u32.to_le_bytes());

        let (_, reread) = NtHeaders32::take_from_bytes(&bytes).unwrap();
        assert_eq!(reread.data_directories.len(), 16);
        assert!(logs_contain("clamping declared directory count 32 to 16"));
    }

    #[test]
    fn test_resize_zeroes_dropped_entries() {
        let mut table = DataDirectoryTable::with_len(16);
        *table.entry_mut(10).unwrap() = DataDirectoryEntry { address: 0x1000, size: 0x40 };
        table.resize(4);
        assert_eq!(table.entry(10), None);
        table.resize(16);
        assert!(table.entry(10).unwrap().is_empty());
    }

    #[test]
    fn test_directory_id_positions() {
        assert_eq!(u32::from(DirectoryId::ImportAddressTable), 12);
        for (i, id) in DirectoryId::ALL.iter().enumerate() {
            assert_eq!(u32::from(*id) as usize, i);
            assert_eq!(DirectoryId::from_index(i as u32), Some(*id));
        }
        assert_eq!(DirectoryId::from_index(16), None);
    }

    #[test]
    fn test_reserved_codes_stay_raw() {
        for code in [4u16, 6, 15] {
            assert_eq!(Subsystem::from_base_type(code), Subsystem::Other(code));
            assert_eq!(Subsystem::from_base_type(code).to_base_type(), code);
        }
        assert_eq!(Subsystem::from_base_type(16), Subsystem::WindowsBootApplication);

        // the reserved bit in the middle of the file characteristics survives decoding
        let characteristics = Characteristics::from_bits_retain(0x0042);
        assert!(characteristics.contains(Characteristics::EXECUTABLE_IMAGE));
        assert_eq!(characteristics.bits() & 0x0040, 0x0040);
        assert_eq!((characteristics & Characteristics::all()).bits(), 0x0002);
        assert_eq!((DllCharacteristics::all().bits() & 0x001F), 0);
    }
}
