// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Flattening of arrays into the field nodes and buffers of a message body.
//!
//! Only the bytes addressed by the (possibly sliced) arrays are written: buffers of
//! fixed-width values are sliced, offsets starting at a non-zero value are rebased and
//! children are truncated to the range their parent refers to.
use arrow_format::ipc;

use crate::array::{union_child, Array, MAX_INLINE_VIEW_LENGTH, VIEW_SIZE};
use crate::bitmap::utils::bytes_for;
use crate::bitmap::MutableBitmap;
use crate::buffer::Buffer;
use crate::datatypes::{DataType, PhysicalType, UnionMode};
use crate::error::{Error, Result};
use crate::types::Offset;

use super::super::{has_validity_buffer, MetadataVersion};
use super::common::WriteOptions;

/// The flattened, depth-first, pre-order representation of a set of arrays.
#[derive(Debug, Default)]
pub struct Payload {
    /// One node per array
    pub nodes: Vec<ipc::FieldNode>,
    /// The buffers, where `None` declares an omitted validity bitmap
    pub buffers: Vec<Option<Buffer>>,
    /// The number of data buffers of each view array
    pub variadic_buffer_counts: Vec<i64>,
}

fn check_size(length: usize, what: &str, options: &WriteOptions) -> Result<()> {
    if !options.allow_64bit && length > i32::MAX as usize {
        return Err(Error::SizeLimit(format!(
            "A {what} of length {length} exceeds the 32-bit limit of the format"
        )));
    }
    Ok(())
}

fn write_bitmap(bitmap: &Buffer, offset: usize, length: usize) -> Buffer {
    if offset % 8 == 0 {
        bitmap.clone().sliced(offset / 8, bytes_for(length))
    } else {
        let mut shifted = MutableBitmap::with_capacity(length);
        shifted.extend_from_slice(bitmap.as_slice(), offset, length);
        shifted.into_buffer()
    }
}

fn write_fixed(buffer: &Buffer, offset: usize, length: usize, width: usize) -> Buffer {
    buffer.clone().sliced(offset * width, length * width)
}

fn view_field(view: &[u8], start: usize) -> usize {
    u32::from_ne_bytes([view[start], view[start + 1], view[start + 2], view[start + 3]]) as usize
}

/// Writes the views of `array` followed by the data buffers they refer to. Data buffers
/// that no view of the slice refers to are not written, and the buffer index of every
/// view is remapped to the written buffers.
fn write_views(array: &Array, payload: &mut Payload) {
    let buffers = array.buffers();
    let views = write_fixed(&buffers[0], array.offset(), array.len(), VIEW_SIZE);
    let data = &buffers[1..];

    let mut used = vec![false; data.len()];
    for view in views.as_slice().chunks_exact(VIEW_SIZE) {
        if view_field(view, 0) > MAX_INLINE_VIEW_LENGTH {
            if let Some(used) = used.get_mut(view_field(view, 8)) {
                *used = true;
            }
        }
    }

    let (views, data) = if used.iter().all(|used| *used) {
        (views, data.to_vec())
    } else {
        let mut indices = Vec::with_capacity(data.len());
        let mut kept = vec![];
        for (buffer, used) in data.iter().zip(used) {
            indices.push(kept.len() as u32);
            if used {
                kept.push(buffer.clone());
            }
        }
        let mut remapped = views.as_slice().to_vec();
        for view in remapped.chunks_exact_mut(VIEW_SIZE) {
            if view_field(view, 0) > MAX_INLINE_VIEW_LENGTH {
                if let Some(index) = indices.get(view_field(view, 8)) {
                    view[8..12].copy_from_slice(&index.to_ne_bytes());
                }
            }
        }
        (Buffer::from(remapped), kept)
    };

    payload.buffers.push(Some(views));
    payload.variadic_buffer_counts.push(data.len() as i64);
    payload.buffers.extend(data.into_iter().map(Some));
}

/// Writes the offsets of `array`, rebased to start at zero, and returns the range of
/// the values they address.
fn write_offsets<O: Offset>(array: &Array, payload: &mut Payload) -> Result<(usize, usize)> {
    let offsets = array.offsets::<O>();
    let first = offsets[0];
    let last = offsets[offsets.len() - 1];
    let start = first
        .to_usize()
        .ok_or_else(|| Error::oos("Offsets must be non-negative"))?;
    let end = last
        .to_usize()
        .filter(|end| *end >= start)
        .ok_or_else(|| Error::oos("Offsets must be monotonically increasing"))?;

    let buffer = if array.buffers()[0].is_empty() {
        Buffer::from_values(&[O::default()])
    } else if start == 0 {
        write_fixed(
            &array.buffers()[0],
            array.offset(),
            array.len() + 1,
            std::mem::size_of::<O>(),
        )
    } else {
        let rebased = offsets.iter().map(|x| *x - first).collect::<Vec<_>>();
        Buffer::from_values(&rebased)
    };
    payload.buffers.push(Some(buffer));
    Ok((start, end - start))
}

fn write_list_view<O: Offset>(
    array: &Array,
    payload: &mut Payload,
    options: &WriteOptions,
    depth: usize,
) -> Result<()> {
    let offsets = array.values::<O>(0);
    let sizes = array.values::<O>(1);
    let to_usize = |x: O| {
        x.to_usize()
            .ok_or_else(|| Error::oos("List view offsets and sizes must be non-negative"))
    };

    let mut range: Option<(usize, usize)> = None;
    for (offset, size) in offsets.iter().zip(sizes.iter()) {
        let size = to_usize(*size)?;
        if size == 0 {
            continue;
        }
        let start = to_usize(*offset)?;
        range = Some(match range {
            Some((lo, hi)) => (lo.min(start), hi.max(start + size)),
            None => (start, start + size),
        });
    }
    let (start, end) = range.unwrap_or((0, 0));
    let base = O::from_usize(start).ok_or(Error::Overflow)?;

    let rebased = offsets
        .iter()
        .zip(sizes.iter())
        .map(|(offset, size)| {
            if *size == O::default() {
                O::default()
            } else {
                *offset - base
            }
        })
        .collect::<Vec<_>>();
    payload.buffers.push(Some(Buffer::from_values(&rebased)));
    payload.buffers.push(Some(write_fixed(
        &array.buffers()[1],
        array.offset(),
        array.len(),
        std::mem::size_of::<O>(),
    )));

    let values = array.children()[0].as_ref().clone().sliced(start, end - start);
    write(&values, payload, options, depth + 1)
}

fn write_dense_union(
    array: &Array,
    ids: &Option<Vec<i32>>,
    payload: &mut Payload,
    options: &WriteOptions,
    depth: usize,
) -> Result<()> {
    let type_ids = array.values::<i8>(0);
    let offsets = array.values::<i32>(1);
    let children = array.children();

    let mut ranges = vec![None::<(i32, i32)>; children.len()];
    let mut slots = Vec::with_capacity(array.len());
    for (type_id, offset) in type_ids.iter().zip(offsets.iter()) {
        let child = union_child(ids, *type_id).ok_or_else(|| {
            Error::oos(format!("Type id {type_id} does not match any union child"))
        })?;
        ranges[child] = Some(match ranges[child] {
            Some((lo, hi)) => (lo.min(*offset), hi.max(*offset + 1)),
            None => (*offset, *offset + 1),
        });
        slots.push(child);
    }

    let rebased = slots
        .iter()
        .zip(offsets.iter())
        .map(|(child, offset)| ranges[*child].map(|(lo, _)| *offset - lo).unwrap_or(0))
        .collect::<Vec<_>>();
    payload.buffers.push(Some(Buffer::from_values(&rebased)));

    for (child, range) in children.iter().zip(ranges) {
        let (lo, hi) = range.unwrap_or((0, 0));
        let lo = usize::try_from(lo).map_err(|_| Error::oos("Union offsets must be non-negative"))?;
        let hi = usize::try_from(hi).map_err(|_| Error::oos("Union offsets must be non-negative"))?;
        let child = child.as_ref().clone().sliced(lo, hi - lo);
        write(&child, payload, options, depth + 1)?;
    }
    Ok(())
}

fn write_run_end_encoded(
    array: &Array,
    payload: &mut Payload,
    options: &WriteOptions,
    depth: usize,
) -> Result<()> {
    let run_ends = array.run_ends();
    let (offset, length) = (array.offset(), array.len());
    let children = array.children();

    if offset == 0 && run_ends.last().copied().unwrap_or(0) == length {
        write(&children[0], payload, options, depth + 1)?;
        return write(&children[1], payload, options, depth + 1);
    }

    let first_run = Array::physical_index(&run_ends, offset);
    let end_run = if length == 0 {
        first_run
    } else {
        Array::physical_index(&run_ends, offset + length - 1) + 1
    };
    let ends = run_ends[first_run..end_run]
        .iter()
        .map(|end| (*end).min(offset + length) - offset);

    let new_run_ends = match children[0].data_type() {
        DataType::Int16 => Array::from_slice(
            &ends
                .map(|x| i16::try_from(x).map_err(|_| Error::Overflow))
                .collect::<Result<Vec<_>>>()?,
        ),
        DataType::Int32 => Array::from_slice(
            &ends
                .map(|x| i32::try_from(x).map_err(|_| Error::Overflow))
                .collect::<Result<Vec<_>>>()?,
        ),
        _ => Array::from_slice(&ends.map(|x| x as i64).collect::<Vec<_>>()),
    };
    write(&new_run_ends, payload, options, depth + 1)?;

    let values = children[1]
        .as_ref()
        .clone()
        .sliced(first_run, end_run - first_run);
    write(&values, payload, options, depth + 1)
}

/// Appends the node and buffers of `array`, and recursively of its children, to `payload`.
pub fn write(
    array: &Array,
    payload: &mut Payload,
    options: &WriteOptions,
    depth: usize,
) -> Result<()> {
    if depth > options.max_recursion_depth {
        return Err(Error::RecursionLimit(options.max_recursion_depth));
    }
    check_size(array.len(), "array", options)?;

    let physical_type = array.physical_type();
    let (offset, length) = (array.offset(), array.len());
    payload.nodes.push(ipc::FieldNode {
        length: length as i64,
        null_count: array.null_count() as i64,
    });

    if has_validity_buffer(&physical_type, MetadataVersion::V5) {
        let validity = match array.validity() {
            Some(validity) if array.null_count() > 0 => {
                Some(write_bitmap(validity, offset, length))
            }
            _ => None,
        };
        payload.buffers.push(validity);
    }

    let buffers = array.buffers();
    let children = array.children();
    use PhysicalType::*;
    match physical_type {
        Null => {}
        Boolean => payload
            .buffers
            .push(Some(write_bitmap(&buffers[0], offset, length))),
        Primitive(primitive) => payload.buffers.push(Some(write_fixed(
            &buffers[0],
            offset,
            length,
            primitive.byte_width(),
        ))),
        Dictionary(key) => payload.buffers.push(Some(write_fixed(
            &buffers[0],
            offset,
            length,
            key.to_primitive().byte_width(),
        ))),
        FixedSizeBinary => {
            let size = match array.data_type().to_logical_type() {
                DataType::FixedSizeBinary(size) => *size,
                _ => unreachable!(),
            };
            payload
                .buffers
                .push(Some(write_fixed(&buffers[0], offset, length, size)))
        }
        Binary | Utf8 => {
            let (start, len) = write_offsets::<i32>(array, payload)?;
            payload
                .buffers
                .push(Some(buffers[1].clone().sliced(start, len)));
        }
        LargeBinary | LargeUtf8 => {
            let (start, len) = write_offsets::<i64>(array, payload)?;
            check_size(len, "values buffer", options)?;
            payload
                .buffers
                .push(Some(buffers[1].clone().sliced(start, len)));
        }
        BinaryView | Utf8View => write_views(array, payload),
        List | Map | LargeList => {
            let (start, len) = if physical_type == LargeList {
                write_offsets::<i64>(array, payload)?
            } else {
                write_offsets::<i32>(array, payload)?
            };
            let values = children[0].as_ref().clone().sliced(start, len);
            write(&values, payload, options, depth + 1)?;
        }
        ListView => write_list_view::<i32>(array, payload, options, depth)?,
        LargeListView => write_list_view::<i64>(array, payload, options, depth)?,
        FixedSizeList => {
            let size = match array.data_type().to_logical_type() {
                DataType::FixedSizeList(_, size) => *size,
                _ => unreachable!(),
            };
            let values = children[0]
                .as_ref()
                .clone()
                .sliced(offset * size, length * size);
            write(&values, payload, options, depth + 1)?;
        }
        Struct => {
            for child in children {
                let child = child.as_ref().clone().sliced(offset, length);
                write(&child, payload, options, depth + 1)?;
            }
        }
        Union => {
            payload
                .buffers
                .push(Some(write_fixed(&buffers[0], offset, length, 1)));
            match array.data_type().to_logical_type() {
                DataType::Union(_, ids, UnionMode::Dense) => {
                    write_dense_union(array, ids, payload, options, depth)?
                }
                _ => {
                    for child in children {
                        let child = child.as_ref().clone().sliced(offset, length);
                        write(&child, payload, options, depth + 1)?;
                    }
                }
            }
        }
        RunEndEncoded => write_run_end_encoded(array, payload, options, depth)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::datatypes::Field;

    fn payload_of(array: &Array) -> Result<Payload> {
        let mut payload = Payload::default();
        write(array, &mut payload, &WriteOptions::default(), 0)?;
        Ok(payload)
    }

    #[test]
    fn primitive_with_a_null() -> Result<()> {
        let array = Array::from_opt(&[Some(1i32), None, Some(3)]);
        let payload = payload_of(&array)?;
        assert_eq!(payload.nodes[0].length, 3);
        assert_eq!(payload.nodes[0].null_count, 1);
        assert_eq!(payload.buffers.len(), 2);
        assert_eq!(payload.buffers[0].as_ref().unwrap().as_slice(), &[0b101]);
        let values = payload.buffers[1].as_ref().unwrap();
        assert_eq!(values.len(), 12);
        let values = values.typed::<i32>();
        assert_eq!((values[0], values[2]), (1, 3));
        Ok(())
    }

    #[test]
    fn sliced_strings_are_rebased() -> Result<()> {
        let array = Array::from_strs(&[Some("aa"), Some("bbb"), None, Some("c")]).sliced(1, 2);
        let payload = payload_of(&array)?;
        assert_eq!(payload.nodes.len(), 1);
        assert_eq!(payload.nodes[0].null_count, 1);
        let offsets = payload.buffers[1].as_ref().unwrap();
        assert_eq!(offsets.typed::<i32>().as_ref(), &[0, 3, 3]);
        assert_eq!(payload.buffers[2].as_ref().unwrap().as_slice(), b"bbb");
        Ok(())
    }

    #[test]
    fn no_nulls_omits_validity() -> Result<()> {
        let array = Array::from_slice(&[1i32, 2, 3]);
        let payload = payload_of(&array)?;
        assert!(payload.buffers[0].is_none());
        assert_eq!(payload.buffers[1].as_ref().unwrap().len(), 12);
        Ok(())
    }

    #[test]
    fn unaligned_bitmap_is_shifted() -> Result<()> {
        let array = Array::from_bools(&[Some(true), None, Some(false), Some(true)]).sliced(1, 3);
        let payload = payload_of(&array)?;
        assert_eq!(payload.buffers[0].as_ref().unwrap().as_slice(), &[0b110]);
        assert_eq!(payload.buffers[1].as_ref().unwrap().as_slice(), &[0b100]);
        Ok(())
    }

    #[test]
    fn struct_children_are_sliced() -> Result<()> {
        let data_type = DataType::Struct(vec![Field::new("a", DataType::Int64, false)]);
        let child = Arc::new(Array::from_slice(&[1i64, 2, 3, 4]));
        let array = Array::new_struct(data_type, vec![child], None)?.sliced(2, 2);
        let payload = payload_of(&array)?;
        assert_eq!(payload.nodes.len(), 2);
        assert_eq!(payload.nodes[1].length, 2);
        // the validity slots of the struct and its child, then the child's values
        assert_eq!(payload.buffers.len(), 3);
        assert_eq!(
            payload.buffers[2].as_ref().unwrap().typed::<i64>().as_ref(),
            &[3, 4]
        );
        Ok(())
    }

    #[test]
    fn sliced_views_keep_referenced_buffers() -> Result<()> {
        let values = [
            Some(&b"the first long value"[..]),
            Some(&b"the second long value"[..]),
            Some(&b"short"[..]),
            Some(&b"the third long value"[..]),
        ];
        // every long value is in its own data buffer
        let array = Array::from_views(DataType::Utf8View, &values, 16)?;
        assert_eq!(array.buffers().len(), 4);
        assert_eq!(payload_of(&array)?.variadic_buffer_counts, vec![3]);

        let payload = payload_of(&array.sliced(1, 2))?;
        assert_eq!(payload.variadic_buffer_counts, vec![1]);
        assert_eq!(payload.buffers.len(), 3);
        let views = payload.buffers[1].as_ref().unwrap().as_slice();
        assert_eq!(view_field(&views[..VIEW_SIZE], 0), 21);
        assert_eq!(view_field(&views[..VIEW_SIZE], 8), 0);
        assert_eq!(
            payload.buffers[2].as_ref().unwrap().as_slice(),
            b"the second long value"
        );
        Ok(())
    }

    #[test]
    fn recursion_limit() {
        let mut data_type = DataType::Int32;
        let mut array = Array::from_slice(&[1i32]);
        for _ in 0..3 {
            data_type = DataType::Struct(vec![Field::new("a", data_type, false)]);
            array = Array::new_struct(data_type.clone(), vec![Arc::new(array)], None).unwrap();
        }
        let options = WriteOptions {
            max_recursion_depth: 2,
            ..Default::default()
        };
        let mut payload = Payload::default();
        assert!(matches!(
            write(&array, &mut payload, &options, 0),
            Err(Error::RecursionLimit(2))
        ));
    }
}
