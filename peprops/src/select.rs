use tracing::debug;

use crate::error::{Error, MalformedHeaderKind};
use crate::generic::{Properties32, Properties64};
use crate::headers::{PE32_MAGIC, PE64_MAGIC, peek_optional_header_magic};
use crate::properties::{PeProperties, PeType};


/// Decodes NT headers (starting with `PE\0\0`) and picks the implementation matching the optional
/// header magic.
pub fn properties_from_nt_headers(bytes: &[u8]) -> Result<Box<dyn PeProperties>, Error> {
    let magic = peek_optional_header_magic(bytes)?;
    debug!("optional header magic is {:#06X}", magic);
    match magic {
        PE32_MAGIC => Ok(Box::new(Properties32::from_nt_headers_bytes(bytes)?)),
        PE64_MAGIC => Ok(Box::new(Properties64::from_nt_headers_bytes(bytes)?)),
        other => Err(MalformedHeaderKind::UnknownMagic { magic: other }.into()),
    }
}

/// Creates the headers of a fresh image of the given width.
pub fn new_properties(pe_type: PeType, section_alignment: u32, subsystem: u16) -> Box<dyn PeProperties> {
    match pe_type {
        PeType::Pe32 => Box::new(Properties32::new(section_alignment, subsystem)),
        PeType::Pe64 => Box::new(Properties64::new(section_alignment, subsystem)),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_by_magic() {
        let pe32 = new_properties(PeType::Pe32, 0x1000, 2).nt_headers_bytes();
        let pe64 = new_properties(PeType::Pe64, 0x1000, 2).nt_headers_bytes();

        assert_eq!(properties_from_nt_headers(&pe32).unwrap().pe_type(), PeType::Pe32);
        assert_eq!(properties_from_nt_headers(&pe64).unwrap().pe_type(), PeType::Pe64);
    }

    #[test]
    fn test_unknown_magic() {
        let mut bytes = new_properties(PeType::Pe32, 0x1000, 2).nt_headers_bytes();
        // ROM image magic
        bytes[24..26].copy_from_slice(&0x0107u16.to_le_bytes());
        let err = properties_from_nt_headers(&bytes).unwrap_err();
        assert_eq!(err, Error::MalformedHeader(MalformedHeaderKind::UnknownMagic { magic: 0x0107 }));
    }

    #[test]
    fn test_short_input() {
        let err = properties_from_nt_headers(b"PE\0\0").unwrap_err();
        assert_eq!(err, Error::MalformedHeader(MalformedHeaderKind::TooShort { expected: 26, obtained: 4 }));
    }
}
