//! Shared utility functions and traits

/// Extension trait for fixed-width counters that must never wrap.
///
/// Every statistics bucket is bumped through this trait so that an
/// overflowing counter pins at its maximum instead of rolling over to zero.
///
/// # Example
///
/// ```
/// use typing_stats::utils::Saturating;
///
/// let mut presses: u16 = u16::MAX - 1;
///
/// assert!(presses.bump());
/// assert_eq!(presses, u16::MAX);
///
/// assert!(!presses.bump()); // already pinned
/// assert_eq!(presses, u16::MAX);
/// ```
pub trait Saturating: Copy {
    /// Adds one, stopping at the maximum. Returns whether the value moved.
    fn bump(&mut self) -> bool;

    /// Adds `amount`, stopping at the maximum. Returns whether the value moved.
    fn bump_by(&mut self, amount: Self) -> bool;
}

macro_rules! impl_saturating {
    ($($ty:ty),*) => {
        $(
            impl Saturating for $ty {
                fn bump(&mut self) -> bool {
                    self.bump_by(1)
                }

                fn bump_by(&mut self, amount: Self) -> bool {
                    let next = self.saturating_add(amount);
                    let moved = next != *self;
                    *self = next;
                    moved
                }
            }
        )*
    };
}

impl_saturating!(u8, u16, u32);

/// Milliseconds elapsed between two readings of a wrapping `u32` clock.
///
/// Correct across the wraparound boundary as long as the real interval is
/// shorter than one full clock period (~49.7 days).
pub fn elapsed_ms(now: u32, since: u32) -> u32 {
    now.wrapping_sub(since)
}
