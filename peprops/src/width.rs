//! Width descriptors binding each image width to its record types and constants.
//!
//! PE32 and PE32+ images differ only in the width of the image base, the stack and heap sizes,
//! and the records derived from them (TLS directory, load configuration, import thunks). A
//! [`PeWidth`] bundles those differences at compile time; the optional header magic is the only
//! thing that distinguishes the two at run time.

use std::fmt;
use std::hash::Hash;

use crate::error::Error;
use crate::headers::{
    MachineType, ORDINAL_FLAG_32, ORDINAL_FLAG_64, OptionalHeader32, OptionalHeader64,
    OptionalHeaderRecord, PE32_MAGIC, PE64_MAGIC,
};
use crate::le_int::LeInt;
use crate::load_config::{LoadConfigDirectory32, LoadConfigDirectory64};
use crate::properties::PeType;
use crate::tls::TlsDirectory;


/// The integer type of the width-dependent header fields: `u32` for PE32, `u64` for PE32+.
pub trait BaseSize : LeInt + Copy + Default + fmt::Debug + Eq + Hash + Ord + From<u32> + Into<u64> + 'static {
    /// Returns the value if the 32-bit accessor pair belongs to this width.
    fn from_32(value: u32) -> Option<Self>;

    /// Returns the value if the 64-bit accessor pair belongs to this width.
    fn from_64(value: u64) -> Option<Self>;

    /// Returns the value if the 32-bit accessor pair belongs to this width.
    fn to_32(self) -> Option<u32>;
}
impl BaseSize for u32 {
    fn from_32(value: u32) -> Option<Self> { Some(value) }
    fn from_64(_value: u64) -> Option<Self> { None }
    fn to_32(self) -> Option<u32> { Some(self) }
}
impl BaseSize for u64 {
    fn from_32(_value: u32) -> Option<Self> { None }
    fn from_64(value: u64) -> Option<Self> { Some(value) }
    fn to_32(self) -> Option<u32> { None }
}


/// A fixed-layout record whose width follows the image width.
pub trait ImageRecord : Clone + fmt::Debug + Sized {
    /// The same record with every width-dependent field widened to 64 bits.
    type Wide;

    fn take_from_bytes(bytes: &[u8]) -> Result<(&[u8], Self), Error>;
    fn write_to(&self, out: &mut Vec<u8>);
    fn widen(&self) -> Self::Wide;
}


pub trait PeWidth : Clone + Copy + fmt::Debug + Default + Eq + Hash + Send + Sync + 'static {
    type BaseSize: BaseSize;
    type OptionalHeader: OptionalHeaderRecord<BaseSize = Self::BaseSize>;
    type TlsDirectory: ImageRecord<Wide = TlsDirectory<u64>>;
    type LoadConfigDirectory: ImageRecord<Wide = LoadConfigDirectory64>;

    const PE_TYPE: PeType;

    /// The optional header magic an image of this width must carry.
    const MAGIC: u16;

    /// The bit of an import thunk that marks an import by ordinal.
    const IMPORT_ORDINAL_FLAG: Self::BaseSize;

    /// Machine type written into freshly created images.
    const DEFAULT_MACHINE: MachineType;
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Width32;
impl PeWidth for Width32 {
    type BaseSize = u32;
    type OptionalHeader = OptionalHeader32;
    type TlsDirectory = TlsDirectory<u32>;
    type LoadConfigDirectory = LoadConfigDirectory32;

    const PE_TYPE: PeType = PeType::Pe32;
    const MAGIC: u16 = PE32_MAGIC;
    const IMPORT_ORDINAL_FLAG: u32 = ORDINAL_FLAG_32;
    const DEFAULT_MACHINE: MachineType = MachineType::I386;
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Width64;
impl PeWidth for Width64 {
    type BaseSize = u64;
    type OptionalHeader = OptionalHeader64;
    type TlsDirectory = TlsDirectory<u64>;
    type LoadConfigDirectory = LoadConfigDirectory64;

    const PE_TYPE: PeType = PeType::Pe64;
    const MAGIC: u16 = PE64_MAGIC;
    const IMPORT_ORDINAL_FLAG: u64 = ORDINAL_FLAG_64;
    const DEFAULT_MACHINE: MachineType = MachineType::Amd64;
}
