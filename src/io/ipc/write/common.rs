use std::sync::Arc;

use ahash::AHashMap;
use arrow_format::ipc;
use arrow_format::ipc::planus::Builder;

use crate::array::{Array, ArrayRef};
use crate::buffer::Buffer;
use crate::datatypes::{Endianness, PhysicalType};
use crate::error::{Error, Result};
use crate::record_batch::RecordBatch;

use super::super::swap::{swap_array, swap_payload};
use super::super::IpcField;
use super::compress::compress_buffers;
use super::serialize::{write, Payload};

/// Compression codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    /// LZ4 (framed)
    LZ4,
    /// ZSTD
    ZSTD,
}

impl From<Compression> for ipc::CompressionType {
    fn from(compression: Compression) -> Self {
        match compression {
            Compression::LZ4 => ipc::CompressionType::Lz4Frame,
            Compression::ZSTD => ipc::CompressionType::Zstd,
        }
    }
}

/// Options declaring the behaviour of writing to IPC
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WriteOptions {
    /// Whether the buffers should be compressed and which codec to use.
    /// Note: to use compression the crate must be compiled with feature `io_ipc_compression`.
    pub compression: Option<Compression>,
    /// The number of threads compressing the buffers of a message. `0` and `1` compress on the
    /// calling thread.
    pub compression_workers: usize,
    /// The minimum fraction of bytes, in `[0, 1]`, that compressing a buffer must save for
    /// it to be written compressed. Buffers saving less are written uncompressed.
    pub min_space_savings: Option<f64>,
    /// Whether dictionaries extending the previously written ones are written as deltas.
    pub emit_dictionary_deltas: bool,
    /// Whether arrays longer than `i32::MAX` can be written.
    pub allow_64bit: bool,
    /// The maximum nesting depth of the written types.
    pub max_recursion_depth: usize,
    /// The alignment, in bytes, of every buffer of a message body.
    pub alignment: usize,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compression: None,
            compression_workers: 1,
            min_space_savings: None,
            emit_dictionary_deltas: false,
            allow_64bit: false,
            max_recursion_depth: 64,
            alignment: 64,
        }
    }
}

impl WriteOptions {
    /// Errors iff these options are invalid.
    pub fn validate(&self) -> Result<()> {
        if let Some(savings) = self.min_space_savings {
            if !(0.0..=1.0).contains(&savings) {
                return Err(Error::InvalidArgumentError(format!(
                    "The minimum space savings must be in [0, 1], got {savings}"
                )));
            }
        }
        if self.alignment < 8 || !self.alignment.is_power_of_two() {
            return Err(Error::InvalidArgumentError(format!(
                "The alignment must be a power of two of at least 8, got {}",
                self.alignment
            )));
        }
        Ok(())
    }
}

/// Stores the encoded data, which is an ipc::Message, and optional Arrow data
#[derive(Debug, Default)]
pub struct EncodedData {
    /// An encoded ipc::Message
    pub ipc_message: Vec<u8>,
    /// Arrow buffers to be written, should be an empty vec for schema messages
    pub arrow_data: Vec<u8>,
}

/// What writing a dictionary requires, given the last one written with the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DictionaryUpdate {
    Unchanged,
    /// The values after the first `usize` ones
    Delta(usize),
    Replacement,
}

/// Keeps track of dictionaries that have been written, to avoid emitting the same dictionary
/// multiple times. Can optionally error if an update to an existing dictionary is attempted, which
/// isn't allowed in the `FileWriter`.
#[derive(Debug, Clone)]
pub struct DictionaryTracker {
    written: AHashMap<i64, ArrayRef>,
    cannot_replace: bool,
}

impl DictionaryTracker {
    /// Creates a new [`DictionaryTracker`]. When `cannot_replace` is true, writing a
    /// dictionary that is neither equal to nor an extension of the previous one errors.
    pub fn new(cannot_replace: bool) -> Self {
        Self {
            written: AHashMap::new(),
            cannot_replace,
        }
    }

    fn update(&self, id: i64, values: &ArrayRef, emit_deltas: bool) -> Result<DictionaryUpdate> {
        let last = match self.written.get(&id) {
            Some(last) => last,
            None => return Ok(DictionaryUpdate::Replacement),
        };
        if Arc::ptr_eq(last, values) || last.as_ref() == values.as_ref() {
            return Ok(DictionaryUpdate::Unchanged);
        }
        if emit_deltas
            && values.len() > last.len()
            && !values.data_type().has_dictionary()
            && values.as_ref().clone().sliced(0, last.len()) == *last.as_ref()
        {
            return Ok(DictionaryUpdate::Delta(last.len()));
        }
        if self.cannot_replace {
            return Err(Error::InvalidArgumentError(
                "Dictionary replacement detected when writing IPC file format. \
                 Arrow IPC files only support a single dictionary for a given field \
                 across all batches."
                    .to_string(),
            ));
        }
        Ok(DictionaryUpdate::Replacement)
    }

    /// The last dictionary values written with `id`.
    pub fn get(&self, id: i64) -> Option<&ArrayRef> {
        self.written.get(&id)
    }
}

fn encode_dictionary(
    field: &IpcField,
    array: &Array,
    options: &WriteOptions,
    endianness: Endianness,
    dictionary_tracker: &mut DictionaryTracker,
    encoded_dictionaries: &mut Vec<EncodedData>,
) -> Result<()> {
    if !array.data_type().has_dictionary() {
        return Ok(());
    }
    let children = array.children();
    if let PhysicalType::Dictionary(_) = array.physical_type() {
        let dict_id = field.dictionary_id.ok_or_else(|| {
            Error::InvalidArgumentError("Dictionaries must have an associated id".to_string())
        })?;
        let values = array
            .dictionary()
            .ok_or_else(|| Error::oos("A dictionary array must have values"))?;

        encode_dictionary(
            field,
            values,
            options,
            endianness,
            dictionary_tracker,
            encoded_dictionaries,
        )?;

        match dictionary_tracker.update(dict_id, values, options.emit_dictionary_deltas)? {
            DictionaryUpdate::Unchanged => {}
            DictionaryUpdate::Delta(written) => {
                tracing::debug!(dict_id, written, total = values.len(), "emitting dictionary delta");
                let delta = values.as_ref().clone().sliced(written, values.len() - written);
                encoded_dictionaries.push(dictionary_batch_to_bytes(
                    dict_id, &delta, true, options, endianness,
                )?);
            }
            DictionaryUpdate::Replacement => {
                tracing::debug!(dict_id, length = values.len(), "emitting dictionary");
                encoded_dictionaries.push(dictionary_batch_to_bytes(
                    dict_id, values, false, options, endianness,
                )?);
            }
        }
        dictionary_tracker.written.insert(dict_id, values.clone());
        return Ok(());
    }

    if children.len() != field.fields.len() {
        return Err(Error::InvalidArgumentError(format!(
            "The number of children of an array of type {:?} must equal the number of children in IpcField",
            array.data_type()
        )));
    }
    field
        .fields
        .iter()
        .zip(children.iter())
        .try_for_each(|(field, child)| {
            encode_dictionary(
                field,
                child,
                options,
                endianness,
                dictionary_tracker,
                encoded_dictionaries,
            )
        })
}

/// Encodes `batch` into the dictionary batches it requires followed by its record batch.
///
/// The buffers are written in the `endianness` byte order, converting the arrays of
/// `batch` from the order of its schema when they differ.
/// `dictionary_tracker` is only updated when the whole batch is encoded.
pub fn encode_record_batch(
    batch: &RecordBatch,
    fields: &[IpcField],
    endianness: Endianness,
    dictionary_tracker: &mut DictionaryTracker,
    options: &WriteOptions,
) -> Result<(Vec<EncodedData>, EncodedData)> {
    if fields.len() != batch.num_columns() {
        return Err(Error::InvalidArgumentError(format!(
            "The batch has {} columns but {} ipc fields were declared",
            batch.num_columns(),
            fields.len()
        )));
    }
    // arrays are serialized in the native order
    let batch_endianness = batch.schema().endianness;
    let columns = if batch_endianness.is_native() {
        batch.columns().to_vec()
    } else {
        batch
            .columns()
            .iter()
            .map(|column| swap_array(column, batch_endianness, true).map(Arc::new))
            .collect::<Result<Vec<_>>>()?
    };

    let mut tracker = dictionary_tracker.clone();
    let mut encoded_dictionaries = vec![];

    for (field, array) in fields.iter().zip(columns.iter()) {
        encode_dictionary(
            field,
            array,
            options,
            endianness,
            &mut tracker,
            &mut encoded_dictionaries,
        )?;
    }

    let encoded_message =
        record_batch_to_bytes(&columns, batch.num_rows(), options, endianness)?;

    *dictionary_tracker = tracker;
    Ok((encoded_dictionaries, encoded_message))
}

fn check_length(length: usize, options: &WriteOptions) -> Result<()> {
    if !options.allow_64bit && length > i32::MAX as usize {
        return Err(Error::SizeLimit(format!(
            "A batch of {length} rows exceeds the 32-bit limit; enable `allow_64bit` to write it"
        )));
    }
    Ok(())
}

fn encode_payload(
    arrays: &[&Array],
    options: &WriteOptions,
    endianness: Endianness,
) -> Result<Payload> {
    let mut payload = Payload::default();
    for array in arrays {
        write(array, &mut payload, options, 0)?;
    }
    if !endianness.is_native() {
        let mut buffers = payload.buffers.iter_mut();
        let mut counts = payload.variadic_buffer_counts.iter().copied();
        for array in arrays {
            swap_payload(array.data_type(), &mut buffers, &mut counts)?;
        }
    }
    Ok(payload)
}

/// Compresses and lays out the buffers of `payload` into a message body, returning
/// the metadata of each buffer and the body.
fn layout_body(
    buffers: Vec<Option<Buffer>>,
    options: &WriteOptions,
) -> Result<(Vec<ipc::Buffer>, Vec<u8>)> {
    let buffers = match options.compression {
        Some(compression) => compress_buffers(buffers, compression, options)?,
        None => buffers,
    };

    let mut arrow_data = Vec::with_capacity(
        buffers
            .iter()
            .flatten()
            .map(|buffer| pad_to_alignment(buffer.len(), options.alignment) + buffer.len())
            .sum(),
    );
    let mut metadata = Vec::with_capacity(buffers.len());
    for buffer in buffers {
        let offset = arrow_data.len() as i64;
        let length = buffer.as_ref().map(Buffer::len).unwrap_or(0);
        if let Some(buffer) = buffer {
            arrow_data.extend_from_slice(buffer.as_slice());
            let padding = pad_to_alignment(length, options.alignment);
            arrow_data.extend(std::iter::repeat(0u8).take(padding));
        }
        metadata.push(ipc::Buffer {
            offset,
            length: length as i64,
        });
    }
    Ok((metadata, arrow_data))
}

fn record_batch(
    length: usize,
    payload: Payload,
    options: &WriteOptions,
) -> Result<(ipc::RecordBatch, Vec<u8>)> {
    check_length(length, options)?;
    let Payload {
        nodes,
        buffers,
        variadic_buffer_counts,
    } = payload;
    let (buffers, arrow_data) = layout_body(buffers, options)?;

    let compression = options.compression.map(|compression| {
        Box::new(ipc::BodyCompression {
            codec: compression.into(),
            method: ipc::BodyCompressionMethod::Buffer,
        })
    });

    let batch = ipc::RecordBatch {
        length: length as i64,
        nodes: Some(nodes),
        buffers: Some(buffers),
        compression,
        variadic_buffer_counts: if variadic_buffer_counts.is_empty() {
            None
        } else {
            Some(variadic_buffer_counts)
        },
    };
    Ok((batch, arrow_data))
}

fn message_to_bytes(header: ipc::MessageHeader, arrow_data: Vec<u8>) -> EncodedData {
    let message = ipc::Message {
        version: ipc::MetadataVersion::V5,
        header: Some(header),
        body_length: arrow_data.len() as i64,
        custom_metadata: None,
    };
    let mut builder = Builder::new();
    let ipc_message = builder.finish(&message, None);
    EncodedData {
        ipc_message: ipc_message.to_vec(),
        arrow_data,
    }
}

/// Write a record batch's columns into two sets of bytes, one for the header (ipc::Message) and
/// the other for the batch's data
fn record_batch_to_bytes(
    columns: &[ArrayRef],
    length: usize,
    options: &WriteOptions,
    endianness: Endianness,
) -> Result<EncodedData> {
    let arrays = columns.iter().map(|x| x.as_ref()).collect::<Vec<_>>();
    let payload = encode_payload(&arrays, options, endianness)?;
    let (batch, arrow_data) = record_batch(length, payload, options)?;
    Ok(message_to_bytes(
        ipc::MessageHeader::RecordBatch(Box::new(batch)),
        arrow_data,
    ))
}

/// Write dictionary values into two sets of bytes, one for the header (ipc::Message) and the
/// other for the data
pub(crate) fn dictionary_batch_to_bytes(
    dict_id: i64,
    values: &Array,
    is_delta: bool,
    options: &WriteOptions,
    endianness: Endianness,
) -> Result<EncodedData> {
    let payload = encode_payload(&[values], options, endianness)?;
    let (batch, arrow_data) = record_batch(values.len(), payload, options)?;

    let dictionary = ipc::DictionaryBatch {
        id: dict_id,
        data: Some(Box::new(batch)),
        is_delta,
    };
    Ok(message_to_bytes(
        ipc::MessageHeader::DictionaryBatch(Box::new(dictionary)),
        arrow_data,
    ))
}

/// The number of bytes needed to pad `len` to a multiple of `alignment`, a power of two.
#[inline]
pub(crate) fn pad_to_alignment(len: usize, alignment: usize) -> usize {
    ((len + alignment - 1) & !(alignment - 1)) - len
}

/// Calculate an 8-byte boundary and return the number of bytes needed to pad to 8 bytes
#[inline]
pub(crate) fn pad_to_8(len: usize) -> usize {
    pad_to_alignment(len, 8)
}
