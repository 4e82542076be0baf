//! Load configuration directory.
//!
//! The record has grown with nearly every Windows release; its first field states how many bytes
//! the linker actually emitted. Only the classic layout (up to the SafeSEH handler table) is
//! decoded here. Fields beyond the declared size read as zero.

use crate::error::Error;
use crate::le_int::{LeInt, LeReader};
use crate::width::ImageRecord;


/// Copies the declared prefix of a load configuration record into a zeroed buffer of the classic
/// layout size. Returns the buffer and the bytes following the whole declared record.
fn declared_prefix<'a, const N: usize>(bytes: &'a [u8], record: &'static str) -> Result<([u8; N], &'a [u8]), Error> {
    if bytes.len() < 4 {
        return Err(Error::TruncatedRecord { record, expected: 4, obtained: bytes.len() });
    }
    let declared_size = u32::from_le_byte_slice(&bytes[0..4]);
    let declared_usize = usize::try_from(declared_size).unwrap_or(usize::MAX);
    let record_end = declared_usize.max(4).min(bytes.len());
    let copied = record_end.min(N);

    let mut buf = [0u8; N];
    buf[..copied].copy_from_slice(&bytes[..copied]);
    Ok((buf, &bytes[record_end..]))
}


/// `IMAGE_LOAD_CONFIG_DIRECTORY32`
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct LoadConfigDirectory32 {
    pub size: u32,
    pub time_date_stamp: u32,
    pub major_version: u16,
    pub minor_version: u16,
    pub global_flags_clear: u32,
    pub global_flags_set: u32,
    pub critical_section_default_timeout: u32,
    pub de_commit_free_block_threshold: u32,
    pub de_commit_total_free_threshold: u32,
    pub lock_prefix_table: u32,
    pub maximum_allocation_size: u32,
    pub virtual_memory_threshold: u32,
    pub process_heap_flags: u32,
    pub process_affinity_mask: u32,
    pub csd_version: u16,
    pub reserved1: u16,
    pub edit_list: u32,
    pub security_cookie: u32,
    pub se_handler_table: u32,
    pub se_handler_count: u32,
}
impl LoadConfigDirectory32 {
    pub const SIZE: usize = 72;
}
impl ImageRecord for LoadConfigDirectory32 {
    type Wide = LoadConfigDirectory64;

    fn take_from_bytes(bytes: &[u8]) -> Result<(&[u8], Self), Error> {
        let (buf, rest) = declared_prefix::<{ LoadConfigDirectory32::SIZE }>(bytes, "load configuration")?;
        let mut reader = LeReader::new(&buf);
        let directory = Self {
            size: reader.read(),
            time_date_stamp: reader.read(),
            major_version: reader.read(),
            minor_version: reader.read(),
            global_flags_clear: reader.read(),
            global_flags_set: reader.read(),
            critical_section_default_timeout: reader.read(),
            de_commit_free_block_threshold: reader.read(),
            de_commit_total_free_threshold: reader.read(),
            lock_prefix_table: reader.read(),
            maximum_allocation_size: reader.read(),
            virtual_memory_threshold: reader.read(),
            process_heap_flags: reader.read(),
            process_affinity_mask: reader.read(),
            csd_version: reader.read(),
            reserved1: reader.read(),
            edit_list: reader.read(),
            security_cookie: reader.read(),
            se_handler_table: reader.read(),
            se_handler_count: reader.read(),
        };
        Ok((rest, directory))
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        self.size.write_le_bytes(out);
        self.time_date_stamp.write_le_bytes(out);
        self.major_version.write_le_bytes(out);
        self.minor_version.write_le_bytes(out);
        self.global_flags_clear.write_le_bytes(out);
        self.global_flags_set.write_le_bytes(out);
        self.critical_section_default_timeout.write_le_bytes(out);
        self.de_commit_free_block_threshold.write_le_bytes(out);
        self.de_commit_total_free_threshold.write_le_bytes(out);
        self.lock_prefix_table.write_le_bytes(out);
        self.maximum_allocation_size.write_le_bytes(out);
        self.virtual_memory_threshold.write_le_bytes(out);
        self.process_heap_flags.write_le_bytes(out);
        self.process_affinity_mask.write_le_bytes(out);
        self.csd_version.write_le_bytes(out);
        self.reserved1.write_le_bytes(out);
        self.edit_list.write_le_bytes(out);
        self.security_cookie.write_le_bytes(out);
        self.se_handler_table.write_le_bytes(out);
        self.se_handler_count.write_le_bytes(out);
    }

    fn widen(&self) -> LoadConfigDirectory64 {
        LoadConfigDirectory64::from(*self)
    }
}


/// `IMAGE_LOAD_CONFIG_DIRECTORY64`
///
/// Note that the process affinity mask precedes the process heap flags here, unlike in the 32-bit
/// record.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct LoadConfigDirectory64 {
    pub size: u32,
    pub time_date_stamp: u32,
    pub major_version: u16,
    pub minor_version: u16,
    pub global_flags_clear: u32,
    pub global_flags_set: u32,
    pub critical_section_default_timeout: u32,
    pub de_commit_free_block_threshold: u64,
    pub de_commit_total_free_threshold: u64,
    pub lock_prefix_table: u64,
    pub maximum_allocation_size: u64,
    pub virtual_memory_threshold: u64,
    pub process_affinity_mask: u64,
    pub process_heap_flags: u32,
    pub csd_version: u16,
    pub reserved1: u16,
    pub edit_list: u64,
    pub security_cookie: u64,
    pub se_handler_table: u64,
    pub se_handler_count: u64,
}
impl LoadConfigDirectory64 {
    pub const SIZE: usize = 112;
}
impl ImageRecord for LoadConfigDirectory64 {
    type Wide = LoadConfigDirectory64;

    fn take_from_bytes(bytes: &[u8]) -> Result<(&[u8], Self), Error> {
        let (buf, rest) = declared_prefix::<{ LoadConfigDirectory64::SIZE }>(bytes, "load configuration")?;
        let mut reader = LeReader::new(&buf);
        let directory = Self {
            size: reader.read(),
            time_date_stamp: reader.read(),
            major_version: reader.read(),
            minor_version: reader.read(),
            global_flags_clear: reader.read(),
            global_flags_set: reader.read(),
            critical_section_default_timeout: reader.read(),
            de_commit_free_block_threshold: reader.read(),
            de_commit_total_free_threshold: reader.read(),
            lock_prefix_table: reader.read(),
            maximum_allocation_size: reader.read(),
            virtual_memory_threshold: reader.read(),
            process_affinity_mask: reader.read(),
            process_heap_flags: reader.read(),
            csd_version: reader.read(),
            reserved1: reader.read(),
            edit_list: reader.read(),
            security_cookie: reader.read(),
            se_handler_table: reader.read(),
            se_handler_count: reader.read(),
        };
        Ok((rest, directory))
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        self.size.write_le_bytes(out);
        self.time_date_stamp.write_le_bytes(out);
        self.major_version.write_le_bytes(out);
        self.minor_version.write_le_bytes(out);
        self.global_flags_clear.write_le_bytes(out);
        self.global_flags_set.write_le_bytes(out);
        self.critical_section_default_timeout.write_le_bytes(out);
        self.de_commit_free_block_threshold.write_le_bytes(out);
        self.de_commit_total_free_threshold.write_le_bytes(out);
        self.lock_prefix_table.write_le_bytes(out);
        self.maximum_allocation_size.write_le_bytes(out);
        self.virtual_memory_threshold.write_le_bytes(out);
        self.process_affinity_mask.write_le_bytes(out);
        self.process_heap_flags.write_le_bytes(out);
        self.csd_version.write_le_bytes(out);
        self.reserved1.write_le_bytes(out);
        self.edit_list.write_le_bytes(out);
        self.security_cookie.write_le_bytes(out);
        self.se_handler_table.write_le_bytes(out);
        self.se_handler_count.write_le_bytes(out);
    }

    fn widen(&self) -> LoadConfigDirectory64 {
        *self
    }
}
impl From<LoadConfigDirectory32> for LoadConfigDirectory64 {
    fn from(value: LoadConfigDirectory32) -> Self {
        Self {
            size: value.size,
            time_date_stamp: value.time_date_stamp,
            major_version: value.major_version,
            minor_version: value.minor_version,
            global_flags_clear: value.global_flags_clear,
            global_flags_set: value.global_flags_set,
            critical_section_default_timeout: value.critical_section_default_timeout,
            de_commit_free_block_threshold: value.de_commit_free_block_threshold.into(),
            de_commit_total_free_threshold: value.de_commit_total_free_threshold.into(),
            lock_prefix_table: value.lock_prefix_table.into(),
            maximum_allocation_size: value.maximum_allocation_size.into(),
            virtual_memory_threshold: value.virtual_memory_threshold.into(),
            process_affinity_mask: value.process_affinity_mask.into(),
            process_heap_flags: value.process_heap_flags,
            csd_version: value.csd_version,
            reserved1: value.reserved1,
            edit_list: value.edit_list.into(),
            security_cookie: value.security_cookie.into(),
            se_handler_table: value.se_handler_table.into(),
            se_handler_count: value.se_handler_count.into(),
        }
    }
}
