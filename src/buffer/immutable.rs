use std::borrow::Cow;
use std::sync::Arc;

use crate::types::NativeType;

/// [`Buffer`] is a contiguous, reference-counted byte region that can
/// be shared across thread boundaries.
/// The easiest way to think about `Buffer` is being equivalent to
/// an immutable `Vec<u8>`, with the following differences:
/// * clone is `O(1)`
/// * slicing is `O(1)` and shares the same allocation
/// * memory is released when the last handle over it is dropped
#[derive(Clone)]
pub struct Buffer {
    /// the internal byte region.
    data: Arc<Vec<u8>>,

    /// The offset into the region.
    offset: usize,

    // the length of the buffer. Given a region `data` of N bytes, [offset..offset+length] is visible
    // to this buffer.
    length: usize,
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self.as_slice(), f)
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Default for Buffer {
    #[inline]
    fn default() -> Self {
        Vec::new().into()
    }
}

impl Buffer {
    /// Creates an empty [`Buffer`].
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new [`Buffer`] filled with `length` zeros.
    #[inline]
    pub fn new_zeroed(length: usize) -> Self {
        vec![0u8; length].into()
    }

    /// Creates a new [`Buffer`] holding the bytes of `values`, in native endianness.
    pub fn from_values<T: NativeType>(values: &[T]) -> Self {
        bytemuck::cast_slice::<T, u8>(values).to_vec().into()
    }

    /// Returns the number of bytes in the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns whether the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the byte slice stored in this buffer
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.offset..self.offset + self.length]
    }

    /// Returns a new [`Buffer`] that is a slice of this buffer starting at `offset`.
    /// Doing so allows the same memory region to be shared between buffers.
    /// # Panics
    /// Panics iff `offset + length` is larger than `len`.
    #[inline]
    #[must_use]
    pub fn sliced(mut self, offset: usize, length: usize) -> Self {
        self.slice(offset, length);
        self
    }

    /// Slices this buffer in place.
    /// # Panics
    /// Panics iff `offset + length` is larger than `len`.
    #[inline]
    pub fn slice(&mut self, offset: usize, length: usize) {
        assert!(
            offset + length <= self.len(),
            "the offset of the new Buffer cannot exceed the existing length"
        );
        self.offset += offset;
        self.length = length;
    }

    /// Whether this buffer and `other` are views over the same region of the same allocation.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
            && self.offset == other.offset
            && self.length == other.length
    }

    /// Whether this buffer is the only handle to its allocation
    #[inline]
    pub fn is_unique(&mut self) -> bool {
        Arc::get_mut(&mut self.data).is_some()
    }

    /// The number of bytes of the underlying allocation, including what this
    /// handle does not see.
    #[inline]
    pub fn allocated_len(&self) -> usize {
        self.data.len()
    }

    /// Returns a mutable slice over this buffer's bytes, copying the
    /// visible region first when the allocation is shared.
    pub fn make_mut(&mut self) -> &mut [u8] {
        if Arc::get_mut(&mut self.data).is_none() {
            *self = self.as_slice().to_vec().into();
        }
        let (offset, length) = (self.offset, self.length);
        let data = Arc::make_mut(&mut self.data);
        &mut data[offset..offset + length]
    }

    /// Interprets the bytes of this buffer as a slice of `T`.
    ///
    /// This is zero-copy when the region is aligned to `T` and a copy otherwise.
    /// Trailing bytes that do not form a whole `T` are ignored.
    pub fn typed<T: NativeType>(&self) -> Cow<'_, [T]> {
        let bytes = self.as_slice();
        let bytes = &bytes[..bytes.len() - bytes.len() % std::mem::size_of::<T>()];
        match bytemuck::try_cast_slice::<u8, T>(bytes) {
            Ok(values) => Cow::Borrowed(values),
            Err(_) => Cow::Owned(bytemuck::pod_collect_to_vec(bytes)),
        }
    }

    /// Returns the `T` at slot `index`.
    /// # Panics
    /// Panics iff the slot is out of bounds
    #[inline]
    pub fn value<T: NativeType>(&self, index: usize) -> T {
        let size = std::mem::size_of::<T>();
        let bytes = &self.as_slice()[index * size..(index + 1) * size];
        bytemuck::pod_read_unaligned(bytes)
    }
}

impl From<Vec<u8>> for Buffer {
    #[inline]
    fn from(data: Vec<u8>) -> Self {
        let length = data.len();
        Buffer {
            data: Arc::new(data),
            offset: 0,
            length,
        }
    }
}

impl From<&[u8]> for Buffer {
    #[inline]
    fn from(data: &[u8]) -> Self {
        data.to_vec().into()
    }
}

impl AsRef<[u8]> for Buffer {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}
