//! Thread-local storage directory.

use crate::error::Error;
use crate::le_int::{LeInt, LeReader};
use crate::width::{BaseSize, ImageRecord};


/// `IMAGE_TLS_DIRECTORY32` for `B = u32`, `IMAGE_TLS_DIRECTORY64` for `B = u64`.
///
/// The address fields are virtual addresses, not RVAs.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TlsDirectory<B> {
    pub start_address_of_raw_data: B,
    pub end_address_of_raw_data: B,
    pub address_of_index: B,
    pub address_of_callbacks: B,
    pub size_of_zero_fill: u32,
    pub characteristics: u32,
}
impl<B: BaseSize> TlsDirectory<B> {
    pub const SIZE: usize = 4 * B::SIZE + 8;
}
impl<B: BaseSize> ImageRecord for TlsDirectory<B> {
    type Wide = TlsDirectory<u64>;

    fn take_from_bytes(bytes: &[u8]) -> Result<(&[u8], Self), Error> {
        if bytes.len() < Self::SIZE {
            return Err(Error::TruncatedRecord { record: "TLS directory", expected: Self::SIZE, obtained: bytes.len() });
        }

        let mut reader = LeReader::new(bytes);
        let directory = Self {
            start_address_of_raw_data: reader.read(),
            end_address_of_raw_data: reader.read(),
            address_of_index: reader.read(),
            address_of_callbacks: reader.read(),
            size_of_zero_fill: reader.read(),
            characteristics: reader.read(),
        };
        Ok((reader.rest(), directory))
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        self.start_address_of_raw_data.write_le_bytes(out);
        self.end_address_of_raw_data.write_le_bytes(out);
        self.address_of_index.write_le_bytes(out);
        self.address_of_callbacks.write_le_bytes(out);
        self.size_of_zero_fill.write_le_bytes(out);
        self.characteristics.write_le_bytes(out);
    }

    fn widen(&self) -> TlsDirectory<u64> {
        TlsDirectory {
            start_address_of_raw_data: self.start_address_of_raw_data.into(),
            end_address_of_raw_data: self.end_address_of_raw_data.into(),
            address_of_index: self.address_of_index.into(),
            address_of_callbacks: self.address_of_callbacks.into(),
            size_of_zero_fill: self.size_of_zero_fill,
            characteristics: self.characteristics,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::TlsDirectory;
    use crate::error::Error;
    use crate::width::ImageRecord;

    #[test]
    fn test_tls32_widen() {
        let bytes = b"\x00\x10\x40\x00\x00\x20\x40\x00\x00\x30\x40\x00\x00\x40\x40\x00\x10\x00\x00\x00\x00\x00\x30\x00";
        let (rest, tls) = TlsDirectory::<u32>::take_from_bytes(bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(tls.address_of_callbacks, 0x0040_4000);
        assert_eq!(tls.size_of_zero_fill, 0x10);

        let wide = tls.widen();
        assert_eq!(wide.start_address_of_raw_data, 0x0040_1000);
        assert_eq!(wide.characteristics, 0x0030_0000);

        let mut out = Vec::new();
        tls.write_to(&mut out);
        assert_eq!(&out, bytes);
    }

    #[test]
    fn test_tls64_too_short() {
        let bytes = [0u8; 24];
        let err = TlsDirectory::<u64>::take_from_bytes(&bytes).unwrap_err();
        assert_eq!(err, Error::TruncatedRecord { record: "TLS directory", expected: 40, obtained: 24 });
    }
}
