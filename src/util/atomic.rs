use crate::scalar::Scalar;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

/// An atomic slot holding any [`Scalar`] as its bit pattern.
#[derive(Debug)]
pub struct AtomicScalar<T> {
    bits: AtomicU64,
    _marker: PhantomData<T>,
}

impl<T: Scalar> AtomicScalar<T> {
    pub fn new(value: T) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
            _marker: PhantomData,
        }
    }

    pub fn load(&self, ordering: Ordering) -> T {
        T::from_bits(self.bits.load(ordering))
    }

    pub fn store(&self, value: T, ordering: Ordering) {
        self.bits.store(value.to_bits(), ordering);
    }
}

impl<T: Scalar> Default for AtomicScalar<T> {
    fn default() -> Self {
        Self::new(T::ZERO)
    }
}
