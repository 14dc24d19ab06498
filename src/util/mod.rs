pub mod atomic;
pub mod backoff;

pub use atomic::AtomicScalar;
pub use backoff::Backoff;
