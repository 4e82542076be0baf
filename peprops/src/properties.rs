//! The width-agnostic view of an image's NT headers.

use std::fmt;

use crate::error::Error;
use crate::load_config::LoadConfigDirectory64;
use crate::tls::TlsDirectory;


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum PeType {
    /// PE32, optional header magic 0x010B.
    Pe32,

    /// PE32+, optional header magic 0x020B.
    Pe64,
}
impl fmt::Display for PeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pe32 => write!(f, "PE32"),
            Self::Pe64 => write!(f, "PE32+"),
        }
    }
}


/// Every header-level query and mutation, independent of the image width.
///
/// Fields whose width depends on the image come as `_32`/`_64` pairs. The 64-bit getters are
/// lossless and therefore valid on both widths; every other member of a pair that does not match
/// the active width fails with [`Error::WidthMismatch`] and leaves the header untouched.
///
/// Plain header fields are stored raw: setters perform no validation against other fields.
pub trait PeProperties : fmt::Debug + Send + Sync {
    /// Deep-copies the header into a new, independently mutable instance.
    fn duplicate(&self) -> Box<dyn PeProperties>;

    /// Resets the header to a minimal valid image of the active width.
    fn create_pe(&mut self, section_alignment: u32, subsystem: u16);

    // directories

    /// Whether the directory slot is within the declared table and has a non-zero address or size.
    fn directory_exists(&self, id: u32) -> bool;

    /// Zeroes the directory entry without shrinking the table.
    fn remove_directory(&mut self, id: u32) -> Result<(), Error>;

    fn directory_rva(&self, id: u32) -> Result<u32, Error>;
    fn directory_size(&self, id: u32) -> Result<u32, Error>;

    /// Only changes the header value; no data is moved.
    fn set_directory_rva(&mut self, id: u32, rva: u32) -> Result<(), Error>;

    /// Only changes the header value; no data is moved.
    fn set_directory_size(&mut self, id: u32, size: u32) -> Result<(), Error>;

    /// Drops trailing empty directory entries (and a trailing import address table if
    /// `strip_iat_directory` is set) until a kept entry or `min_count` is reached. Returns the new
    /// declared directory count.
    fn strip_data_directories(&mut self, min_count: u32, strip_iat_directory: bool) -> u32;

    // image

    fn pe_type(&self) -> PeType;

    // header fields

    fn image_base_32(&self) -> Result<u32, Error>;
    fn image_base_64(&self) -> u64;
    fn set_image_base_32(&mut self, base: u32) -> Result<(), Error>;
    fn set_image_base_64(&mut self, base: u64) -> Result<(), Error>;

    fn entry_point(&self) -> u32;
    fn set_entry_point(&mut self, entry_point: u32);

    fn file_alignment(&self) -> u32;

    /// Sets the file alignment without checking or realigning anything.
    fn set_file_alignment_unchecked(&mut self, alignment: u32);

    fn section_alignment(&self) -> u32;
    fn set_section_alignment(&mut self, alignment: u32);

    fn heap_size_commit_32(&self) -> Result<u32, Error>;
    fn heap_size_commit_64(&self) -> u64;
    fn set_heap_size_commit_32(&mut self, size: u32) -> Result<(), Error>;
    fn set_heap_size_commit_64(&mut self, size: u64) -> Result<(), Error>;

    fn heap_size_reserve_32(&self) -> Result<u32, Error>;
    fn heap_size_reserve_64(&self) -> u64;
    fn set_heap_size_reserve_32(&mut self, size: u32) -> Result<(), Error>;
    fn set_heap_size_reserve_64(&mut self, size: u64) -> Result<(), Error>;

    fn stack_size_commit_32(&self) -> Result<u32, Error>;
    fn stack_size_commit_64(&self) -> u64;
    fn set_stack_size_commit_32(&mut self, size: u32) -> Result<(), Error>;
    fn set_stack_size_commit_64(&mut self, size: u64) -> Result<(), Error>;

    fn stack_size_reserve_32(&self) -> Result<u32, Error>;
    fn stack_size_reserve_64(&self) -> u64;
    fn set_stack_size_reserve_32(&mut self, size: u32) -> Result<(), Error>;
    fn set_stack_size_reserve_64(&mut self, size: u64) -> Result<(), Error>;

    fn size_of_image(&self) -> u32;
    fn set_size_of_image(&mut self, size: u32);

    fn size_of_headers(&self) -> u32;
    fn set_size_of_headers(&mut self, size: u32);

    fn size_of_optional_header(&self) -> u16;
    fn set_size_of_optional_header(&mut self, size: u16);

    /// The declared number of data directory entries.
    fn number_of_rvas_and_sizes(&self) -> u32;

    /// Changes the declared number of data directory entries, zeroing entries that fall outside the
    /// new count. Counts beyond the format's 16 slots are clamped.
    fn set_number_of_rvas_and_sizes(&mut self, number: u32);

    fn characteristics(&self) -> u16;
    fn set_characteristics(&mut self, characteristics: u16);

    fn dll_characteristics(&self) -> u16;
    fn set_dll_characteristics(&mut self, characteristics: u16);

    fn subsystem(&self) -> u16;
    fn set_subsystem(&mut self, subsystem: u16);

    fn major_subsystem_version(&self) -> u16;
    fn minor_subsystem_version(&self) -> u16;
    fn set_subsystem_version(&mut self, major: u16, minor: u16);

    fn major_os_version(&self) -> u16;
    fn minor_os_version(&self) -> u16;
    fn set_os_version(&mut self, major: u16, minor: u16);

    fn checksum(&self) -> u32;
    fn set_checksum(&mut self, checksum: u32);

    fn time_date_stamp(&self) -> u32;
    fn set_time_date_stamp(&mut self, timestamp: u32);

    fn machine(&self) -> u16;
    fn set_machine(&mut self, machine: u16);

    fn number_of_sections(&self) -> u16;
    fn set_number_of_sections(&mut self, number: u16);

    fn base_of_code(&self) -> u32;
    fn set_base_of_code(&mut self, base: u32);

    fn pe_signature(&self) -> u32;

    /// The magic currently stored in the optional header.
    fn magic(&self) -> u16;

    /// The magic an image of the active width must carry.
    fn needed_magic(&self) -> u16;

    /// Size of the NT headers with all 16 directory slots.
    fn sizeof_nt_header(&self) -> u32;

    /// Size of the optional header with all 16 directory slots.
    fn sizeof_opt_headers(&self) -> u32;

    /// The NT headers encoded with the declared number of directory entries.
    fn nt_headers_bytes(&self) -> Vec<u8>;

    // address conversions

    /// Converts a virtual address to an RVA by subtracting the image base.
    ///
    /// With `bound_check`, fails if `va` lies below the image base or the difference does not fit
    /// into 32 bits. Without it, the subtraction wraps and is truncated to 32 bits.
    fn va_to_rva(&self, va: u64, bound_check: bool) -> Result<u32, Error>;

    fn va_to_rva_32(&self, va: u32, bound_check: bool) -> Result<u32, Error> {
        self.va_to_rva(va.into(), bound_check)
    }

    /// Fails if the resulting address does not fit into 32 bits.
    fn rva_to_va_32(&self, rva: u32) -> Result<u32, Error>;

    fn rva_to_va_64(&self, rva: u32) -> u64;

    // width-dependent records

    /// The ordinal flag of an import thunk for this width, widened to 64 bits.
    fn import_ordinal_flag(&self) -> u64;

    fn is_ordinal_import(&self, thunk: u64) -> bool {
        thunk & self.import_ordinal_flag() != 0
    }

    /// Decodes this width's TLS directory from the front of `bytes`.
    fn read_tls_directory(&self, bytes: &[u8]) -> Result<TlsDirectory<u64>, Error>;

    /// Decodes this width's load configuration directory from the front of `bytes`.
    fn read_load_config_directory(&self, bytes: &[u8]) -> Result<LoadConfigDirectory64, Error>;
}
