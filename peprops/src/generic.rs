//! The properties contract implemented once for every image width.

use std::marker::PhantomData;

use tracing::debug;

use crate::error::{Error, MalformedHeaderKind};
use crate::headers::{
    Characteristics, DIRECTORY_COUNT, DataDirectoryEntry, DataDirectoryTable, DirectoryId,
    DllCharacteristics, MachineType, NT_SIGNATURE, NtHeaders, OptionalHeaderRecord, Subsystem,
    WindowsFields,
};
use crate::load_config::LoadConfigDirectory64;
use crate::properties::{PeProperties, PeType};
use crate::tls::TlsDirectory;
use crate::width::{BaseSize, ImageRecord, PeWidth, Width32, Width64};


const DEFAULT_IMAGE_BASE: u32 = 0x0040_0000;
const DEFAULT_FILE_ALIGNMENT: u32 = 0x200;
const DEFAULT_SIZE_OF_HEADERS: u32 = 0x400;
const DEFAULT_RESERVE: u32 = 0x10_0000;
const DEFAULT_COMMIT: u32 = 0x1000;


/// The Windows-specific optional header fields whose width follows the image width.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
enum WideField {
    ImageBase,
    HeapCommit,
    HeapReserve,
    StackCommit,
    StackReserve,
}
impl WideField {
    fn get<B: Copy>(self, windows: &WindowsFields<B>) -> B {
        match self {
            Self::ImageBase => windows.image_base,
            Self::HeapCommit => windows.size_of_heap_commit,
            Self::HeapReserve => windows.size_of_heap_reserve,
            Self::StackCommit => windows.size_of_stack_commit,
            Self::StackReserve => windows.size_of_stack_reserve,
        }
    }

    fn slot<B>(self, windows: &mut WindowsFields<B>) -> &mut B {
        match self {
            Self::ImageBase => &mut windows.image_base,
            Self::HeapCommit => &mut windows.size_of_heap_commit,
            Self::HeapReserve => &mut windows.size_of_heap_reserve,
            Self::StackCommit => &mut windows.size_of_stack_commit,
            Self::StackReserve => &mut windows.size_of_stack_reserve,
        }
    }
}


/// Header properties of an image whose width is fixed by `W`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct GenericProperties<W: PeWidth> {
    nt_headers: NtHeaders<W::OptionalHeader>,
    width: PhantomData<W>,
}
impl<W: PeWidth> GenericProperties<W> {
    /// Creates the headers of a fresh image; see [`PeProperties::create_pe`].
    pub fn new(section_alignment: u32, subsystem: u16) -> Self {
        let mut properties = Self::default();
        properties.create_pe(section_alignment, subsystem);
        properties
    }

    /// Wraps already-decoded NT headers, which must carry this width's magic.
    pub fn from_nt_headers(nt_headers: NtHeaders<W::OptionalHeader>) -> Result<Self, Error> {
        let magic = nt_headers.optional_header.standard().magic;
        if magic != W::MAGIC {
            return Err(MalformedHeaderKind::WrongMagic { expected: W::MAGIC, obtained: magic }.into());
        }
        Ok(Self {
            nt_headers,
            width: PhantomData,
        })
    }

    /// Decodes NT headers starting with the `PE\0\0` signature.
    pub fn from_nt_headers_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let (_rest, nt_headers) = NtHeaders::take_from_bytes(bytes)?;
        Self::from_nt_headers(nt_headers)
    }

    pub fn nt_headers(&self) -> &NtHeaders<W::OptionalHeader> {
        &self.nt_headers
    }

    fn windows(&self) -> &WindowsFields<W::BaseSize> {
        self.nt_headers.optional_header.windows()
    }

    fn windows_mut(&mut self) -> &mut WindowsFields<W::BaseSize> {
        self.nt_headers.optional_header.windows_mut()
    }

    fn width_mismatch(requested: PeType) -> Error {
        debug!("refusing {} accessor on a {} image", requested, W::PE_TYPE);
        Error::WidthMismatch { active: W::PE_TYPE, requested }
    }

    fn read_32(&self, field: WideField) -> Result<u32, Error> {
        field.get(self.windows())
            .to_32()
            .ok_or_else(|| Self::width_mismatch(PeType::Pe32))
    }

    fn read_64(&self, field: WideField) -> u64 {
        field.get(self.windows()).into()
    }

    fn write_32(&mut self, field: WideField, value: u32) -> Result<(), Error> {
        let value = W::BaseSize::from_32(value)
            .ok_or_else(|| Self::width_mismatch(PeType::Pe32))?;
        *field.slot(self.windows_mut()) = value;
        Ok(())
    }

    fn write_64(&mut self, field: WideField, value: u64) -> Result<(), Error> {
        let value = W::BaseSize::from_64(value)
            .ok_or_else(|| Self::width_mismatch(PeType::Pe64))?;
        *field.slot(self.windows_mut()) = value;
        Ok(())
    }

    fn directory_entry(&self, id: u32) -> Result<&DataDirectoryEntry, Error> {
        let count = self.nt_headers.data_directories.len();
        self.nt_headers.data_directories.entry(id)
            .ok_or(Error::InvalidDirectoryId { id, count })
    }

    fn directory_entry_mut(&mut self, id: u32) -> Result<&mut DataDirectoryEntry, Error> {
        let count = self.nt_headers.data_directories.len();
        self.nt_headers.data_directories.entry_mut(id)
            .ok_or(Error::InvalidDirectoryId { id, count })
    }
}

pub type Properties32 = GenericProperties<Width32>;
pub type Properties64 = GenericProperties<Width64>;


impl<W: PeWidth> PeProperties for GenericProperties<W> {
    fn duplicate(&self) -> Box<dyn PeProperties> {
        Box::new(self.clone())
    }

    fn create_pe(&mut self, section_alignment: u32, subsystem: u16) {
        let mut headers: NtHeaders<W::OptionalHeader> = NtHeaders::default();
        headers.signature = NT_SIGNATURE;
        headers.file_header.machine = W::DEFAULT_MACHINE;
        headers.file_header.size_of_optional_header = NtHeaders::<W::OptionalHeader>::FULL_OPTIONAL_HEADER_SIZE
            .try_into().unwrap();

        headers.optional_header.standard_mut().magic = W::MAGIC;

        let windows = headers.optional_header.windows_mut();
        windows.image_base = DEFAULT_IMAGE_BASE.into();
        windows.section_alignment = section_alignment;
        windows.file_alignment = DEFAULT_FILE_ALIGNMENT;
        windows.size_of_headers = DEFAULT_SIZE_OF_HEADERS;
        windows.subsystem = Subsystem::from_base_type(subsystem);
        windows.size_of_heap_reserve = DEFAULT_RESERVE.into();
        windows.size_of_heap_commit = DEFAULT_COMMIT.into();
        windows.size_of_stack_reserve = DEFAULT_RESERVE.into();
        windows.size_of_stack_commit = DEFAULT_COMMIT.into();

        headers.data_directories = DataDirectoryTable::with_len(DIRECTORY_COUNT as u32);

        self.nt_headers = headers;
    }

    fn directory_exists(&self, id: u32) -> bool {
        self.nt_headers.data_directories.entry(id)
            .map(|entry| !entry.is_empty())
            .unwrap_or(false)
    }

    fn remove_directory(&mut self, id: u32) -> Result<(), Error> {
        *self.directory_entry_mut(id)? = DataDirectoryEntry::default();

        match DirectoryId::from_index(id) {
            Some(DirectoryId::BaseRelocationTable) => {
                // without relocations, the image must be loaded at its preferred base
                self.nt_headers.file_header.characteristics.insert(Characteristics::RELOCS_STRIPPED);
                self.windows_mut().dll_characteristics.remove(DllCharacteristics::DYNAMIC_BASE);
            },
            Some(DirectoryId::ExportTable) => {
                self.nt_headers.file_header.characteristics.remove(Characteristics::DLL);
            },
            _ => {},
        }
        Ok(())
    }

    fn directory_rva(&self, id: u32) -> Result<u32, Error> {
        Ok(self.directory_entry(id)?.address)
    }

    fn directory_size(&self, id: u32) -> Result<u32, Error> {
        Ok(self.directory_entry(id)?.size)
    }

    fn set_directory_rva(&mut self, id: u32, rva: u32) -> Result<(), Error> {
        self.directory_entry_mut(id)?.address = rva;
        Ok(())
    }

    fn set_directory_size(&mut self, id: u32, size: u32) -> Result<(), Error> {
        self.directory_entry_mut(id)?.size = size;
        Ok(())
    }

    fn strip_data_directories(&mut self, min_count: u32, strip_iat_directory: bool) -> u32 {
        let iat_index: u32 = DirectoryId::ImportAddressTable.into();
        let table = &mut self.nt_headers.data_directories;
        let old_count = table.len();

        let mut new_count = old_count;
        while new_count > min_count {
            let last_index = new_count - 1;
            let removable = match table.entry(last_index) {
                Some(entry) => entry.is_empty() || (strip_iat_directory && last_index == iat_index),
                None => false,
            };
            if !removable {
                break;
            }
            new_count -= 1;
        }

        if new_count != old_count {
            debug!("stripping data directories from {} to {}", old_count, new_count);
            table.resize(new_count);
        }
        new_count
    }

    fn pe_type(&self) -> PeType {
        W::PE_TYPE
    }

    fn image_base_32(&self) -> Result<u32, Error> { self.read_32(WideField::ImageBase) }
    fn image_base_64(&self) -> u64 { self.read_64(WideField::ImageBase) }
    fn set_image_base_32(&mut self, base: u32) -> Result<(), Error> { self.write_32(WideField::ImageBase, base) }
    fn set_image_base_64(&mut self, base: u64) -> Result<(), Error> { self.write_64(WideField::ImageBase, base) }

    fn entry_point(&self) -> u32 {
        self.nt_headers.optional_header.standard().address_of_entry_point
    }

    fn set_entry_point(&mut self, entry_point: u32) {
        self.nt_headers.optional_header.standard_mut().address_of_entry_point = entry_point;
    }

    fn file_alignment(&self) -> u32 { self.windows().file_alignment }
    fn set_file_alignment_unchecked(&mut self, alignment: u32) { self.windows_mut().file_alignment = alignment; }

    fn section_alignment(&self) -> u32 { self.windows().section_alignment }
    fn set_section_alignment(&mut self, alignment: u32) { self.windows_mut().section_alignment = alignment; }

    fn heap_size_commit_32(&self) -> Result<u32, Error> { self.read_32(WideField::HeapCommit) }
    fn heap_size_commit_64(&self) -> u64 { self.read_64(WideField::HeapCommit) }
    fn set_heap_size_commit_32(&mut self, size: u32) -> Result<(), Error> { self.write_32(WideField::HeapCommit, size) }
    fn set_heap_size_commit_64(&mut self, size: u64) -> Result<(), Error> { self.write_64(WideField::HeapCommit, size) }

    fn heap_size_reserve_32(&self) -> Result<u32, Error> { self.read_32(WideField::HeapReserve) }
    fn heap_size_reserve_64(&self) -> u64 { self.read_64(WideField::HeapReserve) }
    fn set_heap_size_reserve_32(&mut self, size: u32) -> Result<(), Error> { self.write_32(WideField::HeapReserve, size) }
    fn set_heap_size_reserve_64(&mut self, size: u64) -> Result<(), Error> { self.write_64(WideField::HeapReserve, size) }

    fn stack_size_commit_32(&self) -> Result<u32, Error> { self.read_32(WideField::StackCommit) }
    fn stack_size_commit_64(&self) -> u64 { self.read_64(WideField::StackCommit) }
    fn set_stack_size_commit_32(&mut self, size: u32) -> Result<(), Error> { self.write_32(WideField::StackCommit, size) }
    fn set_stack_size_commit_64(&mut self, size: u64) -> Result<(), Error> { self.write_64(WideField::StackCommit, size) }

    fn stack_size_reserve_32(&self) -> Result<u32, Error> { self.read_32(WideField::StackReserve) }
    fn stack_size_reserve_64(&self) -> u64 { self.read_64(WideField::StackReserve) }
    fn set_stack_size_reserve_32(&mut self, size: u32) -> Result<(), Error> { self.write_32(WideField::StackReserve, size) }
    fn set_stack_size_reserve_64(&mut self, size: u64) -> Result<(), Error> { self.write_64(WideField::StackReserve, size) }

    fn size_of_image(&self) -> u32 { self.windows().size_of_image }
    fn set_size_of_image(&mut self, size: u32) { self.windows_mut().size_of_image = size; }

    fn size_of_headers(&self) -> u32 { self.windows().size_of_headers }
    fn set_size_of_headers(&mut self, size: u32) { self.windows_mut().size_of_headers = size; }

    fn size_of_optional_header(&self) -> u16 { self.nt_headers.file_header.size_of_optional_header }
    fn set_size_of_optional_header(&mut self, size: u16) { self.nt_headers.file_header.size_of_optional_header = size; }

    fn number_of_rvas_and_sizes(&self) -> u32 {
        self.nt_headers.data_directories.len()
    }

    fn set_number_of_rvas_and_sizes(&mut self, number: u32) {
        self.nt_headers.data_directories.resize(number);
    }

    fn characteristics(&self) -> u16 { self.nt_headers.file_header.characteristics.bits() }
    fn set_characteristics(&mut self, characteristics: u16) {
        self.nt_headers.file_header.characteristics = Characteristics::from_bits_retain(characteristics);
    }

    fn dll_characteristics(&self) -> u16 { self.windows().dll_characteristics.bits() }
    fn set_dll_characteristics(&mut self, characteristics: u16) {
        self.windows_mut().dll_characteristics = DllCharacteristics::from_bits_retain(characteristics);
    }

    fn subsystem(&self) -> u16 { self.windows().subsystem.to_base_type() }
    fn set_subsystem(&mut self, subsystem: u16) { self.windows_mut().subsystem = Subsystem::from_base_type(subsystem); }

    fn major_subsystem_version(&self) -> u16 { self.windows().major_subsystem_version }
    fn minor_subsystem_version(&self) -> u16 { self.windows().minor_subsystem_version }
    fn set_subsystem_version(&mut self, major: u16, minor: u16) {
        let windows = self.windows_mut();
        windows.major_subsystem_version = major;
        windows.minor_subsystem_version = minor;
    }

    fn major_os_version(&self) -> u16 { self.windows().major_os_version }
    fn minor_os_version(&self) -> u16 { self.windows().minor_os_version }
    fn set_os_version(&mut self, major: u16, minor: u16) {
        let windows = self.windows_mut();
        windows.major_os_version = major;
        windows.minor_os_version = minor;
    }

    fn checksum(&self) -> u32 { self.windows().checksum }
    fn set_checksum(&mut self, checksum: u32) { self.windows_mut().checksum = checksum; }

    fn time_date_stamp(&self) -> u32 { self.nt_headers.file_header.time_date_stamp }
    fn set_time_date_stamp(&mut self, timestamp: u32) { self.nt_headers.file_header.time_date_stamp = timestamp; }

    fn machine(&self) -> u16 { self.nt_headers.file_header.machine.to_base_type() }
    fn set_machine(&mut self, machine: u16) { self.nt_headers.file_header.machine = MachineType::from_base_type(machine); }

    fn number_of_sections(&self) -> u16 { self.nt_headers.file_header.number_of_sections }
    fn set_number_of_sections(&mut self, number: u16) { self.nt_headers.file_header.number_of_sections = number; }

    fn base_of_code(&self) -> u32 { self.nt_headers.optional_header.standard().base_of_code }
    fn set_base_of_code(&mut self, base: u32) { self.nt_headers.optional_header.standard_mut().base_of_code = base; }

    fn pe_signature(&self) -> u32 {
        self.nt_headers.signature
    }

    fn magic(&self) -> u16 {
        self.nt_headers.optional_header.standard().magic
    }

    fn needed_magic(&self) -> u16 {
        W::MAGIC
    }

    fn sizeof_nt_header(&self) -> u32 {
        NtHeaders::<W::OptionalHeader>::FULL_SIZE.try_into().unwrap()
    }

    fn sizeof_opt_headers(&self) -> u32 {
        NtHeaders::<W::OptionalHeader>::FULL_OPTIONAL_HEADER_SIZE.try_into().unwrap()
    }

    fn nt_headers_bytes(&self) -> Vec<u8> {
        self.nt_headers.to_bytes()
    }

    fn va_to_rva(&self, va: u64, bound_check: bool) -> Result<u32, Error> {
        let image_base = self.image_base_64();
        if !bound_check {
            // truncation is the documented unchecked behavior
            return Ok(va.wrapping_sub(image_base) as u32);
        }

        va.checked_sub(image_base)
            .and_then(|rva| u32::try_from(rva).ok())
            .ok_or_else(|| {
                debug!("VA {:#X} is not within 4 GiB above image base {:#X}", va, image_base);
                Error::AddressOverflow { address: va }
            })
    }

    fn rva_to_va_32(&self, rva: u32) -> Result<u32, Error> {
        let va = self.image_base_64().checked_add(rva.into());
        va.and_then(|va| u32::try_from(va).ok())
            .ok_or_else(|| {
                debug!("RVA {:#X} overflows a 32-bit VA", rva);
                Error::AddressOverflow { address: rva.into() }
            })
    }

    fn rva_to_va_64(&self, rva: u32) -> u64 {
        self.image_base_64().wrapping_add(rva.into())
    }

    fn import_ordinal_flag(&self) -> u64 {
        W::IMPORT_ORDINAL_FLAG.into()
    }

    fn read_tls_directory(&self, bytes: &[u8]) -> Result<TlsDirectory<u64>, Error> {
        let (_rest, directory) = <W::TlsDirectory as ImageRecord>::take_from_bytes(bytes)?;
        Ok(directory.widen())
    }

    fn read_load_config_directory(&self, bytes: &[u8]) -> Result<LoadConfigDirectory64, Error> {
        let (_rest, directory) = <W::LoadConfigDirectory as ImageRecord>::take_from_bytes(bytes)?;
        Ok(directory.widen())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    const IMAGE_SUBSYSTEM_WINDOWS_GUI: u16 = 2;

    fn pe32() -> Properties32 {
        Properties32::new(0x1000, IMAGE_SUBSYSTEM_WINDOWS_GUI)
    }

    fn pe64() -> Properties64 {
        Properties64::new(0x1000, IMAGE_SUBSYSTEM_WINDOWS_GUI)
    }

    #[test]
    fn test_create_pe32_defaults() {
        let props = pe32();
        assert_eq!(props.pe_type(), PeType::Pe32);
        assert_eq!(props.pe_signature(), 0x0000_4550);
        assert_eq!(props.magic(), 0x010B);
        assert_eq!(props.needed_magic(), 0x010B);
        assert_eq!(props.machine(), 0x014C);
        assert_eq!(props.image_base_32().unwrap(), 0x0040_0000);
        assert_eq!(props.section_alignment(), 0x1000);
        assert_eq!(props.file_alignment(), 0x200);
        assert_eq!(props.size_of_headers(), 0x400);
        assert_eq!(props.size_of_optional_header(), 224);
        assert_eq!(props.subsystem(), IMAGE_SUBSYSTEM_WINDOWS_GUI);
        assert_eq!(props.heap_size_reserve_32().unwrap(), 0x10_0000);
        assert_eq!(props.stack_size_commit_32().unwrap(), 0x1000);
        assert_eq!(props.number_of_rvas_and_sizes(), 16);
        for id in 0..16 {
            assert!(!props.directory_exists(id));
        }
        assert_eq!(props.nt_headers_bytes().len(), 248);
    }

    #[test]
    fn test_create_pe64_defaults() {
        let props = pe64();
        assert_eq!(props.pe_type(), PeType::Pe64);
        assert_eq!(props.magic(), 0x020B);
        assert_eq!(props.machine(), 0x8664);
        assert_eq!(props.image_base_64(), 0x0040_0000);
        assert_eq!(props.size_of_optional_header(), 240);
        assert_eq!(props.sizeof_nt_header(), 264);
        assert_eq!(props.sizeof_opt_headers(), 240);
        assert_eq!(props.nt_headers_bytes().len(), 264);
    }

    #[test]
    fn test_create_pe_resets_state() {
        let mut props = pe32();
        props.set_directory_rva(1, 0x2000).unwrap();
        props.set_checksum(0xDEAD);
        props.set_number_of_rvas_and_sizes(4);

        props.create_pe(0x200, 3);
        assert_eq!(props.number_of_rvas_and_sizes(), 16);
        assert_eq!(props.directory_rva(1).unwrap(), 0);
        assert_eq!(props.checksum(), 0);
        assert_eq!(props.section_alignment(), 0x200);
        assert_eq!(props.subsystem(), 3);
    }

    #[test]
    fn test_directory_roundtrip() {
        let mut props = pe64();
        for id in 0..16 {
            props.set_directory_rva(id, 0x1000 * (id + 1)).unwrap();
            props.set_directory_size(id, id + 7).unwrap();
        }
        for id in 0..16 {
            assert_eq!(props.directory_rva(id).unwrap(), 0x1000 * (id + 1));
            assert_eq!(props.directory_size(id).unwrap(), id + 7);
            assert!(props.directory_exists(id));
        }
    }

    #[test]
    fn test_directory_beyond_declared_count() {
        let mut props = pe32();
        props.set_number_of_rvas_and_sizes(10);

        assert!(!props.directory_exists(10));
        assert_eq!(props.directory_rva(10), Err(Error::InvalidDirectoryId { id: 10, count: 10 }));
        assert_eq!(props.set_directory_size(12, 5), Err(Error::InvalidDirectoryId { id: 12, count: 10 }));
        assert_eq!(props.remove_directory(200), Err(Error::InvalidDirectoryId { id: 200, count: 10 }));
        assert!(props.set_directory_rva(9, 0x3000).is_ok());
    }

    #[test]
    fn test_size_only_directory_exists() {
        let mut props = pe32();
        props.set_directory_size(4, 0x80).unwrap();
        assert!(props.directory_exists(4));
    }

    #[test]
    fn test_remove_directory_keeps_table_length() {
        let mut props = pe32();
        props.set_directory_rva(15, 0x1000).unwrap();
        props.set_directory_size(15, 0x10).unwrap();
        props.remove_directory(15).unwrap();
        assert!(!props.directory_exists(15));
        assert_eq!(props.number_of_rvas_and_sizes(), 16);
    }

    #[test]
    fn test_remove_relocations_pins_image() {
        let mut props = pe32();
        props.set_dll_characteristics(DllCharacteristics::DYNAMIC_BASE.bits() | DllCharacteristics::NX_COMPATIBILITY.bits());
        props.set_directory_rva(5, 0x5000).unwrap();

        props.remove_directory(5).unwrap();
        assert_eq!(props.characteristics() & Characteristics::RELOCS_STRIPPED.bits(), Characteristics::RELOCS_STRIPPED.bits());
        assert_eq!(props.dll_characteristics(), DllCharacteristics::NX_COMPATIBILITY.bits());
    }

    #[test]
    fn test_remove_exports_clears_dll_flag() {
        let mut props = pe64();
        props.set_characteristics((Characteristics::DLL | Characteristics::EXECUTABLE_IMAGE).bits());
        props.set_directory_rva(0, 0x7000).unwrap();

        props.remove_directory(0).unwrap();
        assert_eq!(props.characteristics(), Characteristics::EXECUTABLE_IMAGE.bits());
    }

    #[test]
    #[traced_test]
    fn test_strip_down_to_last_used_entry() {
        let mut props = pe32();
        props.set_directory_rva(2, 0x4000).unwrap();

        assert_eq!(props.strip_data_directories(1, true), 3);
        assert_eq!(props.number_of_rvas_and_sizes(), 3);
        assert!(logs_contain("stripping data directories from 16 to 3"));

        assert_eq!(props.strip_data_directories(1, true), 3);
        assert_eq!(props.directory_rva(2).unwrap(), 0x4000);
    }

    #[test]
    fn test_strip_respects_min_count() {
        let mut props = pe32();
        assert_eq!(props.strip_data_directories(5, true), 5);
        assert_eq!(props.strip_data_directories(0, true), 0);
        assert_eq!(props.nt_headers_bytes().len(), 248 - 16 * 8);

        // stripping never grows the table
        assert_eq!(props.strip_data_directories(8, true), 0);
    }

    #[test]
    fn test_strip_iat_directory() {
        let mut props = pe64();
        props.set_directory_rva(1, 0x2000).unwrap();
        props.set_directory_rva(12, 0x3000).unwrap();

        let mut keep = props.clone();
        assert_eq!(keep.strip_data_directories(1, false), 13);

        assert_eq!(props.strip_data_directories(1, true), 2);
        // the stripped slot is zeroed, so growing the table again does not resurrect it
        props.set_number_of_rvas_and_sizes(16);
        assert!(!props.directory_exists(12));
    }

    #[test]
    fn test_strip_does_not_skip_non_empty_entries() {
        let mut props = pe32();
        props.set_directory_rva(14, 0x9000).unwrap();
        props.set_directory_rva(3, 0x1000).unwrap();
        assert_eq!(props.strip_data_directories(1, true), 15);
    }

    #[test]
    #[traced_test]
    fn test_width_mismatch_on_pe64() {
        let mut props = pe64();
        props.set_image_base_64(0x0000_0001_4000_0000).unwrap();

        assert_eq!(props.image_base_32(), Err(Error::WidthMismatch { active: PeType::Pe64, requested: PeType::Pe32 }));
        assert_eq!(props.set_heap_size_commit_32(0x2000), Err(Error::WidthMismatch { active: PeType::Pe64, requested: PeType::Pe32 }));
        assert_eq!(props.heap_size_commit_64(), 0x1000);
        assert!(logs_contain("refusing PE32 accessor on a PE32+ image"));
    }

    #[test]
    fn test_width_mismatch_on_pe32() {
        let mut props = pe32();
        props.set_stack_size_reserve_32(0x20_0000).unwrap();

        // 64-bit getters widen losslessly
        assert_eq!(props.stack_size_reserve_64(), 0x20_0000);
        assert_eq!(props.image_base_64(), 0x0040_0000);

        assert_eq!(props.set_image_base_64(0x1000_0000), Err(Error::WidthMismatch { active: PeType::Pe32, requested: PeType::Pe64 }));
        assert_eq!(props.image_base_32().unwrap(), 0x0040_0000);
    }

    #[test]
    fn test_scalar_fields_are_raw() {
        let mut props = pe32();
        props.set_entry_point(0x1234);
        props.set_file_alignment_unchecked(3);
        props.set_subsystem_version(6, 1);
        props.set_os_version(10, 0);
        props.set_time_date_stamp(0x5F00_0000);
        props.set_machine(0xFFFF);
        props.set_number_of_sections(4);
        props.set_base_of_code(0x1000);
        props.set_size_of_image(0x8000);
        props.set_subsystem(0x7777);

        assert_eq!(props.entry_point(), 0x1234);
        assert_eq!(props.file_alignment(), 3);
        assert_eq!((props.major_subsystem_version(), props.minor_subsystem_version()), (6, 1));
        assert_eq!((props.major_os_version(), props.minor_os_version()), (10, 0));
        assert_eq!(props.time_date_stamp(), 0x5F00_0000);
        assert_eq!(props.machine(), 0xFFFF);
        assert_eq!(props.number_of_sections(), 4);
        assert_eq!(props.base_of_code(), 0x1000);
        assert_eq!(props.size_of_image(), 0x8000);
        assert_eq!(props.subsystem(), 0x7777);
    }

    #[test]
    #[traced_test]
    fn test_set_oversized_directory_count() {
        let mut props = pe32();
        props.set_number_of_rvas_and_sizes(17);
        assert_eq!(props.number_of_rvas_and_sizes(), 16);
        assert!(logs_contain("clamping declared directory count 17 to 16"));
    }

    #[test]
    #[traced_test]
    fn test_va_to_rva_below_image_base() {
        let props = pe32();
        assert_eq!(props.va_to_rva(0x003F_FFFF, true), Err(Error::AddressOverflow { address: 0x003F_FFFF }));
        assert!(logs_contain("is not within 4 GiB above image base"));
        assert_eq!(props.va_to_rva(0x003F_FFFF, false), Ok(0xFFFF_FFFF));
        assert_eq!(props.va_to_rva_32(0x0040_1000, true), Ok(0x1000));
    }

    #[test]
    fn test_va_to_rva_beyond_32_bits() {
        let props = pe64();
        let va = 0x0040_0000 + 0x1_0000_0000;
        assert_eq!(props.va_to_rva(va, true), Err(Error::AddressOverflow { address: va }));
        assert_eq!(props.va_to_rva(va, false), Ok(0));
        assert_eq!(props.va_to_rva(va - 1, true), Ok(0xFFFF_FFFF));
    }

    #[test]
    fn test_rva_to_va() {
        let mut props = pe64();
        props.set_image_base_64(0x0000_0001_4000_0000).unwrap();
        assert_eq!(props.rva_to_va_64(0x1000), 0x0000_0001_4000_1000);
        assert_eq!(props.rva_to_va_32(0x1000), Err(Error::AddressOverflow { address: 0x1000 }));

        for rva in [0u32, 1, 0x1000, 0x7FFF_FFFF, 0xFFFF_FFFF] {
            let va = props.rva_to_va_64(rva);
            assert_eq!(props.va_to_rva(va, true), Ok(rva));
        }

        let mut props = pe32();
        props.set_image_base_32(0xFFFF_0000).unwrap();
        assert_eq!(props.rva_to_va_32(0xFFFF), Ok(0xFFFF_FFFF));
        assert_eq!(props.rva_to_va_32(0x1_0000), Err(Error::AddressOverflow { address: 0x1_0000 }));
    }

    #[test]
    fn test_duplicate_is_independent() {
        let mut original = pe64();
        original.set_directory_rva(3, 0x3000).unwrap();

        let mut copy = original.duplicate();
        copy.set_directory_rva(3, 0x9999).unwrap();
        copy.set_image_base_64(0x1_0000_0000).unwrap();

        assert_eq!(original.directory_rva(3).unwrap(), 0x3000);
        assert_eq!(original.image_base_64(), 0x0040_0000);
        assert_eq!(copy.directory_rva(3).unwrap(), 0x9999);
        assert_eq!(copy.pe_type(), PeType::Pe64);
    }

    #[test]
    fn test_ordinal_imports() {
        let props = pe32();
        assert_eq!(props.import_ordinal_flag(), 0x8000_0000);
        assert!(props.is_ordinal_import(0x8000_0010));
        assert!(!props.is_ordinal_import(0x0000_2010));

        let props = pe64();
        assert!(!props.is_ordinal_import(0x8000_0010));
        assert!(props.is_ordinal_import(0x8000_0000_0000_0010));
    }

    #[test]
    fn test_read_tls_by_width() {
        let mut bytes = Vec::new();
        for value in [0x0040_1000u32, 0x0040_1010, 0x0040_2000, 0x0040_3000, 0, 0] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }

        let tls = pe32().read_tls_directory(&bytes).unwrap();
        assert_eq!(tls.address_of_index, 0x0040_2000);

        assert_eq!(
            pe64().read_tls_directory(&bytes),
            Err(Error::TruncatedRecord { record: "TLS directory", expected: 40, obtained: 24 }),
        );
    }

    #[test]
    fn test_from_nt_headers_checks_magic() {
        let bytes = pe32().nt_headers_bytes();
        let reread = Properties32::from_nt_headers_bytes(&bytes).unwrap();
        assert_eq!(reread, pe32());

        assert!(Properties64::from_nt_headers_bytes(&pe64().nt_headers_bytes()).is_ok());

        let mut wrong = pe32().nt_headers().clone();
        wrong.optional_header.standard.magic = 0x020B;
        assert_eq!(
            Properties32::from_nt_headers(wrong),
            Err(Error::MalformedHeader(MalformedHeaderKind::WrongMagic { expected: 0x010B, obtained: 0x020B })),
        );
    }
}
