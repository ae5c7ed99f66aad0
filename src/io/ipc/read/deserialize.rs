//! Reconstruction of arrays from the field nodes and buffers of a message body.
//!
//! Nodes, buffers and variadic buffer counts are consumed in the depth-first, pre-order
//! of the writer. Every buffer is a zero-copy slice of the body unless it is compressed.
use std::collections::VecDeque;
use std::sync::Arc;

use arrow_format::ipc::{CompressionType, RecordBatchRef};

use crate::array::{
    can_have_validity, union_child, Array, ArrayRef, MAX_INLINE_VIEW_LENGTH, VIEW_SIZE,
};
use crate::bitmap::utils::{bytes_for, get_bit};
use crate::buffer::Buffer;
use crate::datatypes::{DataType, Endianness, PhysicalType, UnionMode};
use crate::error::{Error, Result};

use super::super::compression::decompress_buffer;
use super::super::write::Compression;
use super::super::{has_validity_buffer, IpcField};
use super::{Dictionaries, IpcBuffer, Node, OutOfSpecKind, Version};

fn to_usize(value: i64) -> Result<usize> {
    value
        .try_into()
        .map_err(|_| Error::from(OutOfSpecKind::UnexpectedNegativeInteger))
}

/// Decodes `width`-byte integers of the given byte order.
fn integers(
    bytes: &[u8],
    width: usize,
    signed: bool,
    endianness: Endianness,
) -> impl Iterator<Item = i128> + '_ {
    bytes.chunks_exact(width).map(move |chunk| {
        let mut le = [0u8; 16];
        match endianness {
            Endianness::Little => le[..width].copy_from_slice(chunk),
            Endianness::Big => chunk
                .iter()
                .rev()
                .enumerate()
                .for_each(|(i, byte)| le[i] = *byte),
        }
        if signed && le[width - 1] & 0x80 != 0 {
            le[width..].iter_mut().for_each(|byte| *byte = 0xff);
        }
        i128::from_le_bytes(le)
    })
}

fn check_buffer(buffer: Buffer, length: usize, required: usize) -> Result<Buffer> {
    if buffer.len() < required {
        return Err(Error::from(OutOfSpecKind::InvalidBuffer {
            length,
            required_number_of_bytes: required,
            buffer_length: buffer.len(),
        }));
    }
    Ok(buffer)
}

/// The state of the reconstruction of the arrays of one message.
pub(super) struct Body<'a> {
    nodes: VecDeque<Node<'a>>,
    buffers: VecDeque<IpcBuffer<'a>>,
    variadic_buffer_counts: VecDeque<i64>,
    data: Buffer,
    compression: Option<Compression>,
    endianness: Endianness,
    version: Version,
    dictionaries: &'a Dictionaries,
    max_depth: usize,
}

impl<'a> Body<'a> {
    pub fn try_new(
        batch: RecordBatchRef<'a>,
        data: Buffer,
        endianness: Endianness,
        version: Version,
        dictionaries: &'a Dictionaries,
        max_depth: usize,
    ) -> Result<Self> {
        let nodes = batch
            .nodes()?
            .ok_or_else(|| Error::from(OutOfSpecKind::MissingMessageNodes))?
            .iter()
            .collect();
        let buffers = batch
            .buffers()?
            .ok_or_else(|| Error::from(OutOfSpecKind::MissingMessageBuffers))?
            .iter()
            .collect();
        let variadic_buffer_counts = batch
            .variadic_buffer_counts()?
            .map(|counts| counts.iter().collect())
            .unwrap_or_default();
        let compression = batch
            .compression()?
            .map(|compression| {
                Ok::<_, Error>(match compression.codec()? {
                    CompressionType::Lz4Frame => Compression::LZ4,
                    CompressionType::Zstd => Compression::ZSTD,
                })
            })
            .transpose()?;

        Ok(Self {
            nodes,
            buffers,
            variadic_buffer_counts,
            data,
            compression,
            endianness,
            version,
            dictionaries,
            max_depth,
        })
    }

    fn node(&mut self, data_type: &DataType) -> Result<(usize, usize)> {
        let node = self.nodes.pop_front().ok_or_else(|| {
            Error::oos(format!(
                "IPC: unable to fetch the field for {data_type:?}. The file or stream is corrupted."
            ))
        })?;
        Ok((to_usize(node.length())?, to_usize(node.null_count())?))
    }

    fn skip_buffer(&mut self) -> Result<()> {
        self.buffers
            .pop_front()
            .map(|_| ())
            .ok_or_else(|| Error::from(OutOfSpecKind::ExpectedBuffer))
    }

    /// Pops the next buffer, decompressing it if needed.
    fn buffer(&mut self) -> Result<Buffer> {
        let buffer = self
            .buffers
            .pop_front()
            .ok_or_else(|| Error::from(OutOfSpecKind::ExpectedBuffer))?;
        let offset = to_usize(buffer.offset())?;
        let length = to_usize(buffer.length())?;

        if offset
            .checked_add(length)
            .map_or(true, |end| end > self.data.len())
        {
            return Err(Error::from(OutOfSpecKind::InvalidBuffersLength {
                buffer_end: offset as u64 + length as u64,
                body_length: self.data.len() as u64,
            }));
        }
        let buffer = self.data.clone().sliced(offset, length);
        match self.compression {
            Some(compression) => decompress_buffer(compression, buffer),
            None => Ok(buffer),
        }
    }

    /// Pops the next buffer, which must hold at least `required` bytes for `length` slots.
    fn buffer_with(&mut self, length: usize, required: usize) -> Result<Buffer> {
        let buffer = self.buffer()?;
        check_buffer(buffer, length, required)
    }

    fn validity(
        &mut self,
        physical_type: &PhysicalType,
        length: usize,
        null_count: usize,
    ) -> Result<Option<Buffer>> {
        if !has_validity_buffer(physical_type, self.version) {
            return Ok(None);
        }
        if null_count == 0 || !can_have_validity(physical_type) {
            self.skip_buffer()?;
            return Ok(None);
        }
        let bitmap = self.buffer()?;
        if bitmap.len() * 8 < length {
            return Err(Error::from(OutOfSpecKind::InvalidBitmap {
                length,
                number_of_bits: bitmap.len() * 8,
            }));
        }
        Ok(Some(bitmap))
    }

    fn variadic_buffer_count(&mut self) -> Result<usize> {
        let count = self
            .variadic_buffer_counts
            .pop_front()
            .ok_or_else(|| Error::from(OutOfSpecKind::ExpectedVariadicBufferCount))?;
        to_usize(count)
    }

    fn offsets(&mut self, length: usize, width: usize) -> Result<Buffer> {
        let buffer = self.buffer()?;
        // an empty array may omit its single offset
        let required = if length == 0 && buffer.is_empty() {
            0
        } else {
            (length + 1) * width
        };
        check_buffer(buffer, length, required)
    }

    /// Errors unless the `length + 1` offsets of `offsets` are monotonic and within `values_length`.
    fn check_offsets(
        &self,
        offsets: &Buffer,
        length: usize,
        width: usize,
        values_length: usize,
    ) -> Result<()> {
        if offsets.is_empty() {
            return Ok(());
        }
        let bytes = offsets
            .as_slice()
            .get(..(length + 1) * width)
            .ok_or_else(|| Error::from(OutOfSpecKind::InvalidOffsets))?;
        let mut previous = 0;
        for (i, offset) in integers(bytes, width, true, self.endianness).enumerate() {
            if offset < 0 || (i > 0 && offset < previous) || offset > values_length as i128 {
                return Err(Error::from(OutOfSpecKind::InvalidOffsets));
            }
            previous = offset;
        }
        Ok(())
    }

    fn check_views(&self, views: &Buffer, length: usize, data: &[Buffer]) -> Result<()> {
        let views = &views.as_slice()[..length * VIEW_SIZE];
        for view in views.chunks_exact(VIEW_SIZE) {
            let mut fields = integers(view, 4, false, self.endianness);
            let (len, _, index, offset) = (
                fields.next().unwrap_or(0) as usize,
                fields.next(),
                fields.next().unwrap_or(0) as usize,
                fields.next().unwrap_or(0) as usize,
            );
            if len <= MAX_INLINE_VIEW_LENGTH {
                continue;
            }
            let in_bounds = data
                .get(index)
                .map_or(false, |buffer| offset + len <= buffer.len());
            if !in_bounds {
                return Err(Error::oos(
                    "IPC: a view refers to bytes outside of its data buffers",
                ));
            }
        }
        Ok(())
    }

    fn children(
        &mut self,
        data_type: &DataType,
        ipc_field: &IpcField,
        depth: usize,
    ) -> Result<Vec<ArrayRef>> {
        let fields = data_type.to_logical_type().children();
        if fields.len() != ipc_field.fields.len() {
            return Err(Error::from(OutOfSpecKind::InvalidChildren));
        }
        fields
            .into_iter()
            .zip(ipc_field.fields.iter())
            .map(|(field, ipc_field)| {
                self.read(field.data_type().clone(), ipc_field, depth + 1)
                    .map(Arc::new)
            })
            .collect()
    }

    /// Reads the next array of `data_type`.
    pub fn read(
        &mut self,
        data_type: DataType,
        ipc_field: &IpcField,
        depth: usize,
    ) -> Result<Array> {
        if depth > self.max_depth {
            return Err(Error::RecursionLimit(self.max_depth));
        }
        let physical_type = data_type.to_physical_type();
        let (length, null_count) = self.node(&data_type)?;
        let validity = self.validity(&physical_type, length, null_count)?;

        use PhysicalType::*;
        let (buffers, children, dictionary) = match physical_type {
            Null => (vec![], vec![], None),
            Boolean => (vec![self.buffer_with(length, bytes_for(length))?], vec![], None),
            Primitive(primitive) => (
                vec![self.buffer_with(length, length * primitive.byte_width())?],
                vec![],
                None,
            ),
            FixedSizeBinary => {
                let size = match data_type.to_logical_type() {
                    DataType::FixedSizeBinary(size) => *size,
                    _ => return Err(Error::from(OutOfSpecKind::InvalidDataType)),
                };
                (vec![self.buffer_with(length, length * size)?], vec![], None)
            }
            Binary | Utf8 | LargeBinary | LargeUtf8 => {
                let width = if matches!(physical_type, Binary | Utf8) { 4 } else { 8 };
                let offsets = self.offsets(length, width)?;
                let values = self.buffer()?;
                self.check_offsets(&offsets, length, width, values.len())?;
                (vec![offsets, values], vec![], None)
            }
            BinaryView | Utf8View => {
                let views = self.buffer_with(length, length * VIEW_SIZE)?;
                let count = self.variadic_buffer_count()?;
                let data = (0..count)
                    .map(|_| self.buffer())
                    .collect::<Result<Vec<_>>>()?;
                self.check_views(&views, length, &data)?;
                let mut buffers = vec![views];
                buffers.extend(data);
                (buffers, vec![], None)
            }
            List | Map | LargeList => {
                let width = if physical_type == LargeList { 8 } else { 4 };
                let offsets = self.offsets(length, width)?;
                let children = self.children(&data_type, ipc_field, depth)?;
                self.check_offsets(&offsets, length, width, children[0].len())?;
                (vec![offsets], children, None)
            }
            ListView | LargeListView => {
                let width = if physical_type == ListView { 4 } else { 8 };
                let offsets = self.buffer_with(length, length * width)?;
                let sizes = self.buffer_with(length, length * width)?;
                let children = self.children(&data_type, ipc_field, depth)?;
                let values_length = children[0].len() as i128;
                let bytes = length * width;
                let starts = integers(&offsets.as_slice()[..bytes], width, true, self.endianness);
                let lengths = integers(&sizes.as_slice()[..bytes], width, true, self.endianness);
                for (start, size) in starts.zip(lengths) {
                    if start < 0 || size < 0 || (size > 0 && start + size > values_length) {
                        return Err(Error::from(OutOfSpecKind::InvalidOffsets));
                    }
                }
                (vec![offsets, sizes], children, None)
            }
            FixedSizeList | Struct => {
                let children = self.children(&data_type, ipc_field, depth)?;
                (vec![], children, None)
            }
            Union => {
                let (ids, mode) = match data_type.to_logical_type() {
                    DataType::Union(_, ids, mode) => (ids.clone(), *mode),
                    _ => return Err(Error::from(OutOfSpecKind::InvalidDataType)),
                };
                let type_ids = self.buffer_with(length, length)?;
                let offsets = if mode == UnionMode::Dense {
                    Some(self.buffer_with(length, length * 4)?)
                } else {
                    None
                };
                let children = self.children(&data_type, ipc_field, depth)?;

                let slots = type_ids.as_slice()[..length]
                    .iter()
                    .map(|type_id| union_child(&ids, *type_id as i8))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| {
                        Error::oos("IPC: a union type id matches none of its children")
                    })?;
                if let Some(offsets) = &offsets {
                    let offsets =
                        integers(&offsets.as_slice()[..length * 4], 4, true, self.endianness);
                    for (child, offset) in slots.iter().zip(offsets) {
                        if offset < 0 || offset >= children[*child].len() as i128 {
                            return Err(Error::from(OutOfSpecKind::InvalidOffsets));
                        }
                    }
                }

                let mut buffers = vec![type_ids];
                buffers.extend(offsets);
                (buffers, children, None)
            }
            Dictionary(key_type) => {
                let id = ipc_field
                    .dictionary_id
                    .ok_or_else(|| Error::from(OutOfSpecKind::MissingDictionaryId))?;
                let values = self
                    .dictionaries
                    .get(&id)
                    .ok_or_else(|| Error::from(OutOfSpecKind::InvalidId { requested_id: id }))?
                    .clone();
                let primitive = key_type.to_primitive();
                let width = primitive.byte_width();
                let keys = self.buffer_with(length, length * width)?;

                let signed = !matches!(
                    key_type,
                    crate::datatypes::IntegerType::UInt8
                        | crate::datatypes::IntegerType::UInt16
                        | crate::datatypes::IntegerType::UInt32
                        | crate::datatypes::IntegerType::UInt64
                );
                let decoded =
                    integers(&keys.as_slice()[..length * width], width, signed, self.endianness);
                for (i, key) in decoded.enumerate() {
                    let is_valid = validity
                        .as_ref()
                        .map_or(true, |validity| get_bit(validity.as_slice(), i));
                    if is_valid && (key < 0 || key >= values.len() as i128) {
                        return Err(Error::oos(format!(
                            "IPC: the dictionary key {key} is out of bounds of the dictionary {id}"
                        )));
                    }
                }
                (vec![keys], vec![], Some(values))
            }
            RunEndEncoded => {
                let children = self.children(&data_type, ipc_field, depth)?;
                let (run_ends, values) = (&children[0], &children[1]);
                let width = match run_ends.data_type() {
                    DataType::Int16 => 2,
                    DataType::Int32 => 4,
                    DataType::Int64 => 8,
                    _ => return Err(Error::from(OutOfSpecKind::InvalidDataType)),
                };
                let bytes = &run_ends.buffers()[0].as_slice()[..run_ends.len() * width];
                let mut previous = 0;
                for end in integers(bytes, width, true, self.endianness) {
                    if end <= previous {
                        return Err(Error::oos(
                            "IPC: run ends must be positive and strictly increasing",
                        ));
                    }
                    previous = end;
                }
                if values.len() < run_ends.len() || (length > 0 && previous < length as i128) {
                    return Err(Error::oos(
                        "IPC: the runs of a run-end encoded array do not cover its length",
                    ));
                }
                (vec![], children, None)
            }
        };

        Array::try_new(data_type, length, validity, buffers, children, dictionary)
            .map_err(|err| Error::oos(format!("IPC: {err}")))
    }

    /// Advances past the next array of `data_type` without reading its buffers.
    pub fn skip(&mut self, data_type: &DataType, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(Error::RecursionLimit(self.max_depth));
        }
        let physical_type = data_type.to_physical_type();
        self.node(data_type)?;
        if has_validity_buffer(&physical_type, self.version) {
            self.skip_buffer()?;
        }

        use PhysicalType::*;
        let own_buffers = match physical_type {
            Null | FixedSizeList | Struct | RunEndEncoded => 0,
            Boolean | Primitive(_) | FixedSizeBinary | Dictionary(_) => 1,
            List | Map | LargeList => 1,
            Binary | Utf8 | LargeBinary | LargeUtf8 | ListView | LargeListView => 2,
            BinaryView | Utf8View => 1 + self.variadic_buffer_count()?,
            Union => match data_type.to_logical_type() {
                DataType::Union(_, _, UnionMode::Dense) => 2,
                _ => 1,
            },
        };
        for _ in 0..own_buffers {
            self.skip_buffer()?;
        }

        if !matches!(physical_type, Dictionary(_)) {
            for field in data_type.to_logical_type().children() {
                self.skip(field.data_type(), depth + 1)?;
            }
        }
        Ok(())
    }
}
