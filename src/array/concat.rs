//! Contains the concatenate kernel
//!
//! Example:
//!
//! ```
//! use arrow_ipc_codec::array::{concatenate, Array};
//!
//! let arr = concatenate(&[
//!     &Array::from_strs(&[Some("hello"), Some("world")]),
//!     &Array::from_strs(&[Some("!")]),
//! ]).unwrap();
//! assert_eq!(arr.len(), 3);
//! ```
use std::sync::Arc;

use crate::bitmap::MutableBitmap;
use crate::buffer::Buffer;
use crate::datatypes::{DataType, PhysicalType};
use crate::error::{Error, Result};
use crate::types::Offset;

use super::equal::union_child;
use super::{can_have_validity, Array, ArrayRef, MAX_INLINE_VIEW_LENGTH, VIEW_SIZE};

/// Concatenate multiple [`Array`]s of the same type into a single [`Array`].
///
/// Dictionary-encoded arrays can only be concatenated when they share equal dictionaries.
pub fn concatenate(arrays: &[&Array]) -> Result<Array> {
    let first = arrays.first().ok_or_else(|| {
        Error::InvalidArgumentError("concat requires input of at least one array".to_string())
    })?;

    if arrays
        .iter()
        .any(|array| array.data_type() != first.data_type())
    {
        return Err(Error::InvalidArgumentError(
            "It is not possible to concatenate arrays of different data types.".to_string(),
        ));
    }

    let data_type = first.data_type().clone();
    let length = arrays.iter().map(|array| array.len()).sum();
    let validity = if can_have_validity(&first.physical_type()) {
        concatenate_validity(arrays)
    } else {
        None
    };

    use PhysicalType::*;
    let (buffers, children, dictionary) = match first.physical_type() {
        Null => (vec![], vec![], None),
        Boolean => {
            let mut values = MutableBitmap::with_capacity(length);
            for array in arrays {
                values.extend_from_slice(array.buffers[0].as_slice(), array.offset, array.len());
            }
            (vec![values.into_buffer()], vec![], None)
        }
        Primitive(primitive) => (
            vec![concatenate_fixed(arrays, primitive.byte_width())],
            vec![],
            None,
        ),
        FixedSizeBinary => {
            let size = match data_type.to_logical_type() {
                DataType::FixedSizeBinary(size) => *size,
                _ => unreachable!(),
            };
            (vec![concatenate_fixed(arrays, size)], vec![], None)
        }
        Dictionary(key_type) => {
            let dictionary = first.dictionary.clone();
            if arrays.iter().any(|array| {
                match (&array.dictionary, &dictionary) {
                    (Some(lhs), Some(rhs)) => !(Arc::ptr_eq(lhs, rhs) || lhs == rhs),
                    _ => true,
                }
            }) {
                return Err(Error::NotYetImplemented(
                    "Concatenating dictionary arrays with different dictionaries".to_string(),
                ));
            }
            let keys = concatenate_fixed(arrays, key_type.to_primitive().byte_width());
            (vec![keys], vec![], dictionary)
        }
        Binary | Utf8 => (concatenate_var::<i32>(arrays)?, vec![], None),
        LargeBinary | LargeUtf8 => (concatenate_var::<i64>(arrays)?, vec![], None),
        BinaryView | Utf8View => (concatenate_views(arrays)?, vec![], None),
        List | Map => {
            let (offsets, values) = concatenate_list::<i32>(arrays)?;
            (vec![offsets], vec![values], None)
        }
        LargeList => {
            let (offsets, values) = concatenate_list::<i64>(arrays)?;
            (vec![offsets], vec![values], None)
        }
        ListView => {
            let (buffers, values) = concatenate_list_view::<i32>(arrays)?;
            (buffers, vec![values], None)
        }
        LargeListView => {
            let (buffers, values) = concatenate_list_view::<i64>(arrays)?;
            (buffers, vec![values], None)
        }
        FixedSizeList => {
            let size = match data_type.to_logical_type() {
                DataType::FixedSizeList(_, size) => *size,
                _ => unreachable!(),
            };
            let values = arrays
                .iter()
                .map(|array| sliced(&array.children[0], array.offset * size, array.len() * size))
                .collect::<Vec<_>>();
            (vec![], vec![concatenate_owned(&values)?], None)
        }
        Struct => {
            let children = (0..first.children.len())
                .map(|i| {
                    let values = arrays
                        .iter()
                        .map(|array| sliced(&array.children[i], array.offset, array.len()))
                        .collect::<Vec<_>>();
                    concatenate_owned(&values)
                })
                .collect::<Result<Vec<_>>>()?;
            (vec![], children, None)
        }
        Union => concatenate_union(arrays, &data_type)?,
        RunEndEncoded => concatenate_run_end_encoded(arrays, &data_type)?,
    };

    Array::try_new(data_type, length, validity, buffers, children, dictionary)
}

fn sliced(array: &ArrayRef, offset: usize, length: usize) -> Array {
    array.as_ref().clone().sliced(offset, length)
}

fn concatenate_owned(arrays: &[Array]) -> Result<ArrayRef> {
    let arrays = arrays.iter().collect::<Vec<_>>();
    concatenate(&arrays).map(Arc::new)
}

fn concatenate_validity(arrays: &[&Array]) -> Option<Buffer> {
    if arrays.iter().all(|array| array.null_count() == 0) {
        return None;
    }
    let mut validity = MutableBitmap::with_capacity(arrays.iter().map(|a| a.len()).sum());
    for array in arrays {
        match &array.validity {
            Some(bitmap) => validity.extend_from_slice(bitmap.as_slice(), array.offset, array.len()),
            None => validity.extend_constant(array.len(), true),
        }
    }
    Some(validity.into_buffer())
}

fn concatenate_fixed(arrays: &[&Array], width: usize) -> Buffer {
    let mut values = Vec::with_capacity(arrays.iter().map(|a| a.len() * width).sum());
    for array in arrays {
        let start = array.offset * width;
        values.extend_from_slice(&array.buffers[0].as_slice()[start..start + array.len() * width]);
    }
    values.into()
}

fn concatenate_var<O: Offset>(arrays: &[&Array]) -> Result<Vec<Buffer>> {
    let mut offsets = vec![O::default()];
    let mut values = vec![];
    for array in arrays {
        let array_offsets = array.offsets::<O>();
        let start = array_offsets[0].to_usize().ok_or(Error::Overflow)?;
        let end = array_offsets[array_offsets.len() - 1]
            .to_usize()
            .ok_or(Error::Overflow)?;
        let base = values.len();
        for offset in array_offsets.iter().skip(1) {
            let offset = offset.to_usize().ok_or(Error::Overflow)? - start + base;
            offsets.push(O::from_usize(offset).ok_or(Error::Overflow)?);
        }
        values.extend_from_slice(&array.buffers[1].as_slice()[start..end]);
    }
    Ok(vec![Buffer::from_values(&offsets), values.into()])
}

fn concatenate_views(arrays: &[&Array]) -> Result<Vec<Buffer>> {
    let mut views = Vec::with_capacity(arrays.iter().map(|a| a.len() * VIEW_SIZE).sum());
    let mut data_buffers = vec![];
    for array in arrays {
        let shift = u32::try_from(data_buffers.len()).map_err(|_| Error::Overflow)?;
        let start = array.offset * VIEW_SIZE;
        let array_views = &array.buffers[0].as_slice()[start..start + array.len() * VIEW_SIZE];
        for view in array_views.chunks_exact(VIEW_SIZE) {
            let mut view: [u8; VIEW_SIZE] = view.try_into().map_err(|_| Error::Overflow)?;
            let length = u32::from_ne_bytes([view[0], view[1], view[2], view[3]]) as usize;
            if length > MAX_INLINE_VIEW_LENGTH {
                let index = u32::from_ne_bytes([view[8], view[9], view[10], view[11]]);
                view[8..12].copy_from_slice(&(index + shift).to_ne_bytes());
            }
            views.extend_from_slice(&view);
        }
        data_buffers.extend(array.buffers[1..].iter().cloned());
    }
    let mut buffers = vec![Buffer::from(views)];
    buffers.extend(data_buffers);
    Ok(buffers)
}

fn concatenate_list<O: Offset>(arrays: &[&Array]) -> Result<(Buffer, ArrayRef)> {
    let mut offsets = vec![O::default()];
    let mut values = Vec::with_capacity(arrays.len());
    let mut base = 0;
    for array in arrays {
        let array_offsets = array.offsets::<O>();
        let start = array_offsets[0].to_usize().ok_or(Error::Overflow)?;
        let end = array_offsets[array_offsets.len() - 1]
            .to_usize()
            .ok_or(Error::Overflow)?;
        for offset in array_offsets.iter().skip(1) {
            let offset = offset.to_usize().ok_or(Error::Overflow)? - start + base;
            offsets.push(O::from_usize(offset).ok_or(Error::Overflow)?);
        }
        values.push(sliced(&array.children[0], start, end - start));
        base += end - start;
    }
    Ok((Buffer::from_values(&offsets), concatenate_owned(&values)?))
}

/// List views may reference any range of their values, so the values are concatenated whole
/// and the offsets shifted accordingly.
fn concatenate_list_view<O: Offset>(arrays: &[&Array]) -> Result<(Vec<Buffer>, ArrayRef)> {
    let mut offsets = vec![];
    let mut sizes = vec![];
    let mut base = 0;
    for array in arrays {
        for offset in array.values::<O>(0).iter() {
            let offset = offset.to_usize().ok_or(Error::Overflow)? + base;
            offsets.push(O::from_usize(offset).ok_or(Error::Overflow)?);
        }
        sizes.extend_from_slice(&array.values::<O>(1));
        base += array.children[0].len();
    }
    let values = arrays
        .iter()
        .map(|array| array.children[0].as_ref())
        .collect::<Vec<_>>();
    Ok((
        vec![Buffer::from_values(&offsets), Buffer::from_values(&sizes)],
        Arc::new(concatenate(&values)?),
    ))
}

type Parts = (Vec<Buffer>, Vec<ArrayRef>, Option<ArrayRef>);

fn concatenate_union(arrays: &[&Array], data_type: &DataType) -> Result<Parts> {
    let (ids, is_dense) = match data_type.to_logical_type() {
        DataType::Union(_, ids, mode) => (ids, mode.is_dense()),
        _ => unreachable!(),
    };
    let num_children = arrays[0].children.len();
    let types = concatenate_fixed(arrays, 1);

    if !is_dense {
        let children = (0..num_children)
            .map(|i| {
                let values = arrays
                    .iter()
                    .map(|array| sliced(&array.children[i], array.offset, array.len()))
                    .collect::<Vec<_>>();
                concatenate_owned(&values)
            })
            .collect::<Result<Vec<_>>>()?;
        return Ok((vec![types], children, None));
    }

    let mut offsets = Vec::<i32>::with_capacity(types.len());
    let mut bases = vec![0usize; num_children];
    for array in arrays {
        let array_types = array.values::<i8>(0);
        let array_offsets = array.values::<i32>(1);
        for (type_id, offset) in array_types.iter().zip(array_offsets.iter()) {
            let child = union_child(ids, *type_id)
                .filter(|child| *child < num_children)
                .ok_or_else(|| Error::oos(format!("Union type id {type_id} has no child")))?;
            let offset = usize::try_from(*offset).map_err(|_| Error::Overflow)? + bases[child];
            offsets.push(i32::try_from(offset).map_err(|_| Error::Overflow)?);
        }
        for (base, child) in bases.iter_mut().zip(array.children.iter()) {
            *base += child.len();
        }
    }
    let children = (0..num_children)
        .map(|i| {
            let values = arrays
                .iter()
                .map(|array| array.children[i].as_ref())
                .collect::<Vec<_>>();
            concatenate(&values).map(Arc::new)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((vec![types, Buffer::from_values(&offsets)], children, None))
}

fn concatenate_run_end_encoded(arrays: &[&Array], data_type: &DataType) -> Result<Parts> {
    let mut run_ends = Vec::<usize>::new();
    let mut values = Vec::with_capacity(arrays.len());
    let mut base = 0;
    for array in arrays.iter().filter(|array| !array.is_empty()) {
        let ends = array.run_ends();
        let first = Array::physical_index(&ends, array.offset);
        let last = Array::physical_index(&ends, array.offset + array.len() - 1);
        for end in &ends[first..=last] {
            run_ends.push(base + (end - array.offset).min(array.len()));
        }
        values.push(sliced(&array.children[1], first, last + 1 - first));
        base += array.len();
    }

    let run_ends_type = match data_type.to_logical_type() {
        DataType::RunEndEncoded(run_ends, _) => run_ends.data_type().clone(),
        _ => unreachable!(),
    };
    let run_ends = match run_ends_type {
        DataType::Int16 => Array::from_slice(&narrow::<i16>(&run_ends)?),
        DataType::Int32 => Array::from_slice(&narrow::<i32>(&run_ends)?),
        _ => Array::from_slice(&narrow::<i64>(&run_ends)?),
    };
    let values = if values.is_empty() {
        Arc::new(Array::new_empty(arrays[0].children[1].data_type().clone())?)
    } else {
        concatenate_owned(&values)?
    };
    Ok((vec![], vec![Arc::new(run_ends), values], None))
}

fn narrow<T: TryFrom<usize>>(values: &[usize]) -> Result<Vec<T>> {
    values
        .iter()
        .map(|x| T::try_from(*x).map_err(|_| Error::Overflow))
        .collect()
}
