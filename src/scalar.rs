//! Element types that can live in device buffers.

use std::fmt::Debug;
use std::ops::Add;

/// A numeric element storable in a [`Buffer`](crate::buffer::Buffer).
///
/// Elements are kept as 64-bit patterns so every buffer slot can be an
/// atomic cell; `to_bits`/`from_bits` must round-trip exactly.
pub trait Scalar:
    Copy + Default + PartialEq + Debug + Send + Sync + Add<Output = Self> + 'static
{
    /// Additive identity.
    const ZERO: Self;

    /// Encode into a 64-bit pattern.
    fn to_bits(self) -> u64;

    /// Decode from a pattern produced by [`Scalar::to_bits`].
    fn from_bits(bits: u64) -> Self;
}

macro_rules! impl_scalar_int {
    ($($t:ty),*) => {
        $(
            impl Scalar for $t {
                const ZERO: Self = 0;

                #[inline]
                fn to_bits(self) -> u64 {
                    self as u64
                }

                #[inline]
                fn from_bits(bits: u64) -> Self {
                    bits as $t
                }
            }
        )*
    };
}

impl_scalar_int!(i32, u32, i64, u64);

impl Scalar for f32 {
    const ZERO: Self = 0.0;

    #[inline]
    fn to_bits(self) -> u64 {
        f32::to_bits(self) as u64
    }

    #[inline]
    fn from_bits(bits: u64) -> Self {
        f32::from_bits(bits as u32)
    }
}

impl Scalar for f64 {
    const ZERO: Self = 0.0;

    #[inline]
    fn to_bits(self) -> u64 {
        f64::to_bits(self)
    }

    #[inline]
    fn from_bits(bits: u64) -> Self {
        f64::from_bits(bits)
    }
}
