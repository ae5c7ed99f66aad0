//! Conversion of arrays between little and big endian byte orders.
//!
//! Every multi-byte value of an array tree is byte-reversed: fixed-width values, offsets,
//! sizes, dictionary keys, dense union offsets and the length, buffer index and offset of
//! views. Interval values are reversed per component and decimals as a whole. One-byte
//! values, bitmaps and variable-length data are left untouched.
use std::sync::Arc;

use crate::array::{Array, ArrayRef, MAX_INLINE_VIEW_LENGTH, VIEW_SIZE};
use crate::buffer::Buffer;
use crate::datatypes::{DataType, Endianness, PhysicalType, PrimitiveType, UnionMode};
use crate::error::{Error, Result};

use super::{has_validity_buffer, MetadataVersion};

/// Reverses each `width`-byte chunk of `buffer`. Trailing bytes are copied as is.
fn swap_chunks(buffer: &Buffer, width: usize) -> Buffer {
    if width <= 1 || buffer.is_empty() {
        return buffer.clone();
    }
    let mut swapped = buffer.as_slice().to_vec();
    swapped
        .chunks_exact_mut(width)
        .for_each(|chunk| chunk.reverse());
    swapped.into()
}

fn swap_month_day_nano(buffer: &Buffer) -> Buffer {
    let mut swapped = buffer.as_slice().to_vec();
    for value in swapped.chunks_exact_mut(16) {
        value[..4].reverse();
        value[4..8].reverse();
        value[8..].reverse();
    }
    swapped.into()
}

/// Swaps the integers of views. The inline bytes of short views are left untouched.
fn swap_views(buffer: &Buffer, from: Endianness) -> Buffer {
    let mut swapped = buffer.as_slice().to_vec();
    for view in swapped.chunks_exact_mut(VIEW_SIZE) {
        let length = [view[0], view[1], view[2], view[3]];
        let length = match from {
            Endianness::Little => u32::from_le_bytes(length),
            Endianness::Big => u32::from_be_bytes(length),
        } as usize;
        view[..4].reverse();
        if length > MAX_INLINE_VIEW_LENGTH {
            view[8..12].reverse();
            view[12..].reverse();
        }
    }
    swapped.into()
}

fn swap_primitive(buffer: &Buffer, primitive: PrimitiveType) -> Buffer {
    match primitive {
        PrimitiveType::DaysMs => swap_chunks(buffer, 4),
        PrimitiveType::MonthDayNano => swap_month_day_nano(buffer),
        other => swap_chunks(buffer, other.byte_width()),
    }
}

/// Swaps the byte order of `array`, whose values are in the `from` order. When
/// `dictionaries` is false, the values of dictionary-encoded arrays are kept as they are.
pub(crate) fn swap_array(array: &Array, from: Endianness, dictionaries: bool) -> Result<Array> {
    use PhysicalType::*;
    let buffers = array.buffers();
    let buffers = match array.physical_type() {
        Null | Boolean | FixedSizeBinary | FixedSizeList | Struct | RunEndEncoded => {
            buffers.to_vec()
        }
        Primitive(primitive) => vec![swap_primitive(&buffers[0], primitive)],
        Dictionary(key_type) => vec![swap_primitive(&buffers[0], key_type.to_primitive())],
        Binary | Utf8 => vec![swap_chunks(&buffers[0], 4), buffers[1].clone()],
        LargeBinary | LargeUtf8 => vec![swap_chunks(&buffers[0], 8), buffers[1].clone()],
        BinaryView | Utf8View => {
            let mut swapped = vec![swap_views(&buffers[0], from)];
            swapped.extend(buffers[1..].iter().cloned());
            swapped
        }
        List | Map => vec![swap_chunks(&buffers[0], 4)],
        LargeList => vec![swap_chunks(&buffers[0], 8)],
        ListView => vec![swap_chunks(&buffers[0], 4), swap_chunks(&buffers[1], 4)],
        LargeListView => vec![swap_chunks(&buffers[0], 8), swap_chunks(&buffers[1], 8)],
        Union => match array.data_type().to_logical_type() {
            DataType::Union(_, _, UnionMode::Dense) => {
                vec![buffers[0].clone(), swap_chunks(&buffers[1], 4)]
            }
            _ => buffers.to_vec(),
        },
    };

    let children = array
        .children()
        .iter()
        .map(|child| swap_array(child, from, dictionaries).map(Arc::new))
        .collect::<Result<Vec<ArrayRef>>>()?;

    let dictionary = match (array.dictionary(), dictionaries) {
        (Some(values), true) => Some(Arc::new(swap_array(values, from, dictionaries)?)),
        (values, _) => values.cloned(),
    };

    Ok(array.with_parts(buffers, children, dictionary))
}

/// Returns `array`, whose values are in the `endianness` byte order, with the byte order
/// of all its values, including those of its dictionaries, reversed.
pub fn swap_endianness(array: &Array, endianness: Endianness) -> Result<Array> {
    swap_array(array, endianness, true)
}

fn swap_next<'a, I: Iterator<Item = &'a mut Option<Buffer>>>(
    buffers: &mut I,
    swap: impl Fn(&Buffer) -> Buffer,
) -> Result<()> {
    let buffer = buffers
        .next()
        .ok_or_else(|| Error::oos("The payload has fewer buffers than its types declare"))?;
    if let Some(buffer) = buffer.as_mut() {
        *buffer = swap(buffer);
    }
    Ok(())
}

fn keep_next<'a, I: Iterator<Item = &'a mut Option<Buffer>>>(buffers: &mut I) -> Result<()> {
    buffers
        .next()
        .map(|_| ())
        .ok_or_else(|| Error::oos("The payload has fewer buffers than its types declare"))
}

/// Reverses the byte order of the native buffers written for an array of `data_type`,
/// consumed from `buffers` and `variadic_buffer_counts` in the order of
/// [`write`](super::write::write).
pub(crate) fn swap_payload<'a, I, V>(
    data_type: &DataType,
    buffers: &mut I,
    variadic_buffer_counts: &mut V,
) -> Result<()>
where
    I: Iterator<Item = &'a mut Option<Buffer>>,
    V: Iterator<Item = i64>,
{
    use PhysicalType::*;
    let physical_type = data_type.to_physical_type();
    if has_validity_buffer(&physical_type, MetadataVersion::V5) {
        keep_next(buffers)?;
    }
    match physical_type {
        Null | FixedSizeList | Struct | RunEndEncoded => {}
        Boolean | FixedSizeBinary => keep_next(buffers)?,
        Primitive(primitive) => swap_next(buffers, |b| swap_primitive(b, primitive))?,
        Dictionary(key_type) => {
            swap_next(buffers, |b| swap_primitive(b, key_type.to_primitive()))?
        }
        Binary | Utf8 | LargeBinary | LargeUtf8 => {
            let width = if matches!(physical_type, Binary | Utf8) { 4 } else { 8 };
            swap_next(buffers, |b| swap_chunks(b, width))?;
            keep_next(buffers)?;
        }
        BinaryView | Utf8View => {
            swap_next(buffers, |b| swap_views(b, Endianness::native()))?;
            let count = variadic_buffer_counts
                .next()
                .ok_or_else(|| Error::oos("A view array has no variadic buffer count"))?;
            for _ in 0..count {
                keep_next(buffers)?;
            }
        }
        List | Map => swap_next(buffers, |b| swap_chunks(b, 4))?,
        LargeList => swap_next(buffers, |b| swap_chunks(b, 8))?,
        ListView | LargeListView => {
            let width = if physical_type == ListView { 4 } else { 8 };
            swap_next(buffers, |b| swap_chunks(b, width))?;
            swap_next(buffers, |b| swap_chunks(b, width))?;
        }
        Union => {
            keep_next(buffers)?;
            if let DataType::Union(_, _, UnionMode::Dense) = data_type.to_logical_type() {
                swap_next(buffers, |b| swap_chunks(b, 4))?;
            }
        }
    }
    if !matches!(physical_type, Dictionary(_)) {
        for field in data_type.to_logical_type().children() {
            swap_payload(field.data_type(), buffers, variadic_buffer_counts)?;
        }
    }
    Ok(())
}
