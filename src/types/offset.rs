use super::NativeType;

/// Sealed trait describing the subset (`i32` and `i64`) of [`NativeType`] that can be used
/// as offsets of variable-length Arrow arrays.
pub trait Offset: NativeType + Ord + std::ops::Add<Output = Self> + std::ops::Sub<Output = Self> {
    /// Whether it is `i32` (false) or `i64` (true).
    fn is_large() -> bool;

    /// Converts itself to `usize`, returning `None` when negative.
    fn to_usize(self) -> Option<usize>;

    /// Converts a `usize` to itself, returning `None` on overflow.
    fn from_usize(value: usize) -> Option<Self>;
}

impl Offset for i32 {
    #[inline]
    fn is_large() -> bool {
        false
    }

    #[inline]
    fn to_usize(self) -> Option<usize> {
        usize::try_from(self).ok()
    }

    #[inline]
    fn from_usize(value: usize) -> Option<Self> {
        Self::try_from(value).ok()
    }
}

impl Offset for i64 {
    #[inline]
    fn is_large() -> bool {
        true
    }

    #[inline]
    fn to_usize(self) -> Option<usize> {
        usize::try_from(self).ok()
    }

    #[inline]
    fn from_usize(value: usize) -> Option<Self> {
        Self::try_from(value).ok()
    }
}
