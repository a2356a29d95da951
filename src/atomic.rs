//! Atomic minimum and maximum.
//!
//! Lock-free compare-and-swap loops over the std atomic integers. They use relaxed
//! loads and an `AcqRel` exchange, and return the value held before the call.
//!
//! ```
//! use std::sync::atomic::AtomicI16;
//! use tessera::atomic::{fetch_max, fetch_min};
//!
//! let slot = AtomicI16::new(10);
//! assert_eq!(fetch_min(&slot, -3), 10);
//! assert_eq!(fetch_max(&slot, 4), -3);
//! assert_eq!(slot.into_inner(), 4);
//! ```

use std::sync::atomic::{
    AtomicI16, AtomicI32, AtomicI64, AtomicI8, AtomicIsize, AtomicU16, AtomicU32, AtomicU64,
    AtomicU8, AtomicUsize, Ordering,
};

/// An atomic integer cell.
pub trait AtomicOrd {
    /// The integer held.
    type Value: Copy + Ord;

    /// Relaxed load.
    fn load_relaxed(&self) -> Self::Value;

    /// Weak compare-and-swap; returns the observed value on failure.
    fn compare_exchange_weak_acq_rel(
        &self,
        current: Self::Value,
        new: Self::Value,
    ) -> Result<Self::Value, Self::Value>;
}

macro_rules! impl_atomic_ord {
    ($($atomic:ty => $value:ty),* $(,)?) => {
        $(
            impl AtomicOrd for $atomic {
                type Value = $value;

                #[inline]
                fn load_relaxed(&self) -> $value {
                    self.load(Ordering::Relaxed)
                }

                #[inline]
                fn compare_exchange_weak_acq_rel(
                    &self,
                    current: $value,
                    new: $value,
                ) -> Result<$value, $value> {
                    self.compare_exchange_weak(current, new, Ordering::AcqRel, Ordering::Relaxed)
                }
            }
        )*
    };
}

impl_atomic_ord!(
    AtomicI8 => i8,
    AtomicI16 => i16,
    AtomicI32 => i32,
    AtomicI64 => i64,
    AtomicIsize => isize,
    AtomicU8 => u8,
    AtomicU16 => u16,
    AtomicU32 => u32,
    AtomicU64 => u64,
    AtomicUsize => usize,
);

fn update_while<A, F>(cell: &A, value: A::Value, better: F) -> A::Value
where
    A: AtomicOrd + ?Sized,
    F: Fn(A::Value, A::Value) -> bool,
{
    let mut current = cell.load_relaxed();
    while better(value, current) {
        match cell.compare_exchange_weak_acq_rel(current, value) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
    current
}

/// Stores `min(*cell, value)` and returns the previous value.
pub fn fetch_min<A: AtomicOrd + ?Sized>(cell: &A, value: A::Value) -> A::Value {
    update_while(cell, value, |v, cur| v < cur)
}

/// Stores `max(*cell, value)` and returns the previous value.
pub fn fetch_max<A: AtomicOrd + ?Sized>(cell: &A, value: A::Value) -> A::Value {
    update_while(cell, value, |v, cur| v > cur)
}
