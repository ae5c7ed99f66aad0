use crate::buffer::Buffer;

use super::utils::{bytes_for, get_bit, set};

/// A container of booleans packed one per bit, used to build validity
/// buffers and boolean values.
#[derive(Debug, Clone, Default)]
pub struct MutableBitmap {
    buffer: Vec<u8>,
    length: usize,
}

impl MutableBitmap {
    /// Initializes an empty [`MutableBitmap`].
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Initializes a [`MutableBitmap`] with capacity for `capacity` bits.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(bytes_for(capacity)),
            length: 0,
        }
    }

    /// Pushes a new bit to the [`MutableBitmap`], re-sizing it if necessary.
    #[inline]
    pub fn push(&mut self, value: bool) {
        if self.length % 8 == 0 {
            self.buffer.push(0);
        }
        if let Some(byte) = self.buffer.last_mut() {
            *byte = set(*byte, self.length % 8, value);
        }
        self.length += 1;
    }

    /// Extends with `value` repeated `additional` times.
    pub fn extend_constant(&mut self, additional: usize, value: bool) {
        if self.length % 8 == 0 {
            let byte = if value { 0xff } else { 0 };
            self.buffer.resize(bytes_for(self.length + additional), byte);
            self.length += additional;
            // unused trailing bits are kept unset
            let rem = self.length % 8;
            if value && rem != 0 {
                if let Some(last) = self.buffer.last_mut() {
                    *last &= (1u8 << rem) - 1;
                }
            }
        } else {
            (0..additional).for_each(|_| self.push(value));
        }
    }

    /// Extends with the `length` bits of `slice` starting at bit `offset`.
    pub fn extend_from_slice(&mut self, slice: &[u8], offset: usize, length: usize) {
        if self.length % 8 == 0 && offset % 8 == 0 {
            let start = offset / 8;
            self.buffer
                .extend_from_slice(&slice[start..start + bytes_for(length)]);
            self.length += length;
            let rem = self.length % 8;
            if rem != 0 {
                if let Some(last) = self.buffer.last_mut() {
                    *last &= (1u8 << rem) - 1;
                }
            }
        } else {
            (offset..offset + length).for_each(|i| self.push(get_bit(slice, i)));
        }
    }

    /// The number of bits in this bitmap
    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Whether this bitmap is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns the packed bytes of this bitmap.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Converts this bitmap into a [`Buffer`] of `bytes_for(len)` bytes.
    #[inline]
    pub fn into_buffer(self) -> Buffer {
        self.buffer.into()
    }
}

impl FromIterator<bool> for MutableBitmap {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut bitmap = MutableBitmap::with_capacity(iter.size_hint().0);
        iter.for_each(|x| bitmap.push(x));
        bitmap
    }
}
