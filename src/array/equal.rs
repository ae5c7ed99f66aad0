//! Logical equality of [`Array`]s.
//!
//! Two arrays are equal when they have the same [`DataType`](crate::datatypes::DataType),
//! the same length and, slot by slot, the same validity and the same value.
//! Equality is independent of offsets, of how the values are laid out in memory and of
//! the value of null slots. Floating point values compare by their bits, so `NaN == NaN`.
use crate::bitmap::utils::get_bit;
use crate::datatypes::{DataType, PhysicalType, PrimitiveType};
use crate::types::Offset;

use super::Array;

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        equal(self, other)
    }
}

/// Logically compares two [`Array`]s.
pub fn equal(lhs: &Array, rhs: &Array) -> bool {
    lhs.data_type() == rhs.data_type()
        && lhs.len() == rhs.len()
        && (0..lhs.len()).all(|i| slot_eq(lhs, i, rhs, i))
}

fn var_value<O: Offset>(array: &Array, index: usize) -> Option<&[u8]> {
    let start = array.buffers[0].value::<O>(index).to_usize()?;
    let end = array.buffers[0].value::<O>(index + 1).to_usize()?;
    array.buffers[1].as_slice().get(start..end)
}

fn range<O: Offset>(offsets: &Array, index: usize) -> Option<(usize, usize)> {
    let start = offsets.buffers[0].value::<O>(index).to_usize()?;
    let end = offsets.buffers[0].value::<O>(index + 1).to_usize()?;
    Some((start, end.checked_sub(start)?))
}

fn view_range<O: Offset>(array: &Array, index: usize) -> Option<(usize, usize)> {
    let start = array.buffers[0].value::<O>(index).to_usize()?;
    let size = array.buffers[1].value::<O>(index).to_usize()?;
    Some((start, size))
}

fn key(array: &Array, primitive: PrimitiveType, index: usize) -> Option<usize> {
    let buffer = &array.buffers[0];
    match primitive {
        PrimitiveType::Int8 => usize::try_from(buffer.value::<i8>(index)).ok(),
        PrimitiveType::Int16 => usize::try_from(buffer.value::<i16>(index)).ok(),
        PrimitiveType::Int32 => usize::try_from(buffer.value::<i32>(index)).ok(),
        PrimitiveType::Int64 => usize::try_from(buffer.value::<i64>(index)).ok(),
        PrimitiveType::UInt8 => Some(buffer.value::<u8>(index) as usize),
        PrimitiveType::UInt16 => Some(buffer.value::<u16>(index) as usize),
        PrimitiveType::UInt32 => usize::try_from(buffer.value::<u32>(index)).ok(),
        PrimitiveType::UInt64 => usize::try_from(buffer.value::<u64>(index)).ok(),
        _ => None,
    }
}

/// The index of the child of a union with `ids` holding values of `type_id`.
pub(crate) fn union_child(ids: &Option<Vec<i32>>, type_id: i8) -> Option<usize> {
    match ids {
        Some(ids) => ids.iter().position(|id| *id == type_id as i32),
        None => usize::try_from(type_id).ok(),
    }
}

fn ranges_eq(
    lhs: &Array,
    (lhs_start, lhs_len): (usize, usize),
    rhs: &Array,
    (rhs_start, rhs_len): (usize, usize),
) -> bool {
    lhs_len == rhs_len
        && lhs_start + lhs_len <= lhs.len()
        && rhs_start + rhs_len <= rhs.len()
        && (0..lhs_len).all(|k| slot_eq(lhs, lhs_start + k, rhs, rhs_start + k))
}

/// Whether slot `i` of `lhs` equals slot `j` of `rhs`. Both arrays must have the same type.
pub(crate) fn slot_eq(lhs: &Array, i: usize, rhs: &Array, j: usize) -> bool {
    let lhs_valid = lhs.is_valid(i);
    if lhs_valid != rhs.is_valid(j) {
        return false;
    }
    if !lhs_valid {
        return true;
    }
    let (i, j) = (lhs.offset + i, rhs.offset + j);

    use PhysicalType::*;
    match lhs.physical_type() {
        Null => true,
        Boolean => {
            get_bit(lhs.buffers[0].as_slice(), i) == get_bit(rhs.buffers[0].as_slice(), j)
        }
        Primitive(primitive) => {
            let width = primitive.byte_width();
            lhs.buffers[0].as_slice()[i * width..(i + 1) * width]
                == rhs.buffers[0].as_slice()[j * width..(j + 1) * width]
        }
        FixedSizeBinary => {
            let width = match lhs.data_type().to_logical_type() {
                DataType::FixedSizeBinary(width) => *width,
                _ => return false,
            };
            lhs.buffers[0].as_slice()[i * width..(i + 1) * width]
                == rhs.buffers[0].as_slice()[j * width..(j + 1) * width]
        }
        Binary | Utf8 => var_value::<i32>(lhs, i) == var_value::<i32>(rhs, j),
        LargeBinary | LargeUtf8 => var_value::<i64>(lhs, i) == var_value::<i64>(rhs, j),
        BinaryView | Utf8View => lhs.view_value(i) == rhs.view_value(j),
        List | Map => match (range::<i32>(lhs, i), range::<i32>(rhs, j)) {
            (Some(l), Some(r)) => ranges_eq(&lhs.children[0], l, &rhs.children[0], r),
            _ => false,
        },
        LargeList => match (range::<i64>(lhs, i), range::<i64>(rhs, j)) {
            (Some(l), Some(r)) => ranges_eq(&lhs.children[0], l, &rhs.children[0], r),
            _ => false,
        },
        ListView => match (view_range::<i32>(lhs, i), view_range::<i32>(rhs, j)) {
            (Some(l), Some(r)) => ranges_eq(&lhs.children[0], l, &rhs.children[0], r),
            _ => false,
        },
        LargeListView => match (view_range::<i64>(lhs, i), view_range::<i64>(rhs, j)) {
            (Some(l), Some(r)) => ranges_eq(&lhs.children[0], l, &rhs.children[0], r),
            _ => false,
        },
        FixedSizeList => {
            let size = match lhs.data_type().to_logical_type() {
                DataType::FixedSizeList(_, size) => *size,
                _ => return false,
            };
            ranges_eq(
                &lhs.children[0],
                (i * size, size),
                &rhs.children[0],
                (j * size, size),
            )
        }
        Struct => lhs
            .children
            .iter()
            .zip(rhs.children.iter())
            .all(|(l, r)| slot_eq(l, i, r, j)),
        Union => {
            let (ids, is_dense) = match lhs.data_type().to_logical_type() {
                DataType::Union(_, ids, mode) => (ids, mode.is_dense()),
                _ => return false,
            };
            let lhs_type = lhs.buffers[0].value::<i8>(i);
            if lhs_type != rhs.buffers[0].value::<i8>(j) {
                return false;
            }
            let child = match union_child(ids, lhs_type) {
                Some(child) if child < lhs.children.len() => child,
                _ => return false,
            };
            let (i, j) = if is_dense {
                let l = usize::try_from(lhs.buffers[1].value::<i32>(i));
                let r = usize::try_from(rhs.buffers[1].value::<i32>(j));
                match (l, r) {
                    (Ok(l), Ok(r)) => (l, r),
                    _ => return false,
                }
            } else {
                (i, j)
            };
            let (l, r) = (&lhs.children[child], &rhs.children[child]);
            i < l.len() && j < r.len() && slot_eq(l, i, r, j)
        }
        Dictionary(key_type) => {
            let primitive = key_type.to_primitive();
            let (l, r) = match (lhs.dictionary(), rhs.dictionary()) {
                (Some(l), Some(r)) => (l, r),
                _ => return false,
            };
            match (key(lhs, primitive, i), key(rhs, primitive, j)) {
                (Some(i), Some(j)) if i < l.len() && j < r.len() => slot_eq(l, i, r, j),
                _ => false,
            }
        }
        RunEndEncoded => {
            let i = Array::physical_index(&lhs.run_ends(), i);
            let j = Array::physical_index(&rhs.run_ends(), j);
            let (l, r) = (&lhs.children[1], &rhs.children[1]);
            i < l.len() && j < r.len() && slot_eq(l, i, r, j)
        }
    }
}
