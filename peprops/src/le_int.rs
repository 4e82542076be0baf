pub trait LeInt : Copy + Sized {
    const SIZE: usize;
    fn from_le_byte_slice(bytes: &[u8]) -> Self;
    fn write_le_bytes(self, out: &mut Vec<u8>);
}

macro_rules! impl_le_int {
    ($type:ty) => {
        impl LeInt for $type {
            const SIZE: usize = core::mem::size_of::<$type>();

            fn from_le_byte_slice(bytes: &[u8]) -> Self {
                Self::from_le_bytes(bytes.try_into().unwrap())
            }

            fn write_le_bytes(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
        }
    };
}
impl_le_int!(u8);
impl_le_int!(u16);
impl_le_int!(u32);
impl_le_int!(u64);


/// Reads little-endian integers off the front of a byte slice.
///
/// Callers check the total length up front; running past the end panics.
pub struct LeReader<'a> {
    rest: &'a [u8],
}
impl<'a> LeReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { rest: bytes }
    }

    pub fn read<T: LeInt>(&mut self) -> T {
        let value = T::from_le_byte_slice(&self.rest[0..T::SIZE]);
        self.rest = &self.rest[T::SIZE..];
        value
    }

    pub fn rest(&self) -> &'a [u8] {
        self.rest
    }
}
