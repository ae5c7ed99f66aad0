//! APIs to read from and write to Arrow's IPC format.
//!
//! [Arrow's IPC format](https://arrow.apache.org/docs/format/Columnar.html#serialization-and-interprocess-communication-ipc)
//! moves record batches between processes as a sequence of messages: a schema, then
//! dictionary and record batches. Each message is a [FlatBuffers](https://google.github.io/flatbuffers/)
//! metadata block followed by a body holding the arrays' buffers, so a reader
//! reconstructs arrays by slicing the body rather than by parsing values.
//!
//! Messages are read and written in one of two containers: a stream,
//! [`StreamWriter`](struct@write::StreamWriter) -> [`StreamReader`](read::StreamReader),
//! consumed in the order it was written over any [`Read`](std::io::Read); or a file,
//! [`FileWriter`](struct@write::FileWriter) -> [`FileReader`](read::FileReader), whose footer
//! indexes every batch so that a [`Seek`](std::io::Seek)able reader can access them in any order.
//!
//! # Examples
//! Read and write to a file:
//! ```
//! use std::io::Cursor;
//! use std::sync::Arc;
//!
//! use arrow_ipc_codec::array::Array;
//! use arrow_ipc_codec::datatypes::{DataType, Field, Schema};
//! use arrow_ipc_codec::error::Result;
//! use arrow_ipc_codec::io::ipc::{read, write};
//! use arrow_ipc_codec::record_batch::RecordBatch;
//!
//! # fn main() -> Result<()> {
//! let schema = Arc::new(Schema::from(vec![
//!     Field::new("a", DataType::Int32, true),
//!     Field::new("b", DataType::Utf8, true),
//! ]));
//! let batch = RecordBatch::try_new(
//!     schema.clone(),
//!     vec![
//!         Arc::new(Array::from_opt(&[Some(1i32), None, Some(3)])),
//!         Arc::new(Array::from_strs(&[Some("a"), Some("b"), None])),
//!     ],
//! )?;
//!
//! let mut writer = write::FileWriter::try_new(vec![], &schema, None, Default::default())?;
//! writer.write(&batch, None)?;
//! writer.write(&batch, None)?;
//! writer.finish()?;
//! let bytes = writer.into_inner();
//!
//! let mut reader = Cursor::new(bytes);
//! let metadata = read::read_file_metadata(&mut reader)?;
//! let reader = read::FileReader::try_new(reader, metadata, None, Default::default())?;
//! let batches = reader.collect::<Result<Vec<_>>>()?;
//! assert_eq!(batches, vec![batch.clone(), batch]);
//! # Ok(())
//! # }
//! ```
use crate::datatypes::{Endianness, PhysicalType};

pub(crate) mod compression;

pub mod read;
pub mod swap;
pub mod write;

/// The metadata version of the messages this crate writes.
pub use arrow_format::ipc::MetadataVersion;

/// The magic number identifying Arrow files, at both ends of a file.
pub const ARROW_MAGIC: [u8; 6] = [b'A', b'R', b'R', b'O', b'W', b'1'];
/// The marker preceding the length of every message of the current framing.
pub(crate) const CONTINUATION_MARKER: [u8; 4] = [0xff; 4];

/// Struct containing `dictionary_id` and nested `IpcField`, allowing users
/// to specify the dictionary ids of the IPC fields when writing to IPC.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IpcField {
    /// optional children
    pub fields: Vec<IpcField>,
    /// dictionary id
    pub dictionary_id: Option<i64>,
}

/// Struct containing fields and whether the file is written in little or big endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpcSchema {
    /// The fields in the schema
    pub fields: Vec<IpcField>,
    /// Endianness of the file
    pub endianness: Endianness,
}

/// Whether an array of `data_type` has a validity slot in the buffers of a message of
/// metadata `version`.
///
/// | type             | < V5 | V5  |
/// |------------------|------|-----|
/// | null             | no   | no  |
/// | run-end encoded  | no   | no  |
/// | union            | yes  | no  |
/// | everything else  | yes  | yes |
pub fn has_validity_buffer(data_type: &PhysicalType, version: MetadataVersion) -> bool {
    match data_type {
        PhysicalType::Null | PhysicalType::RunEndEncoded => false,
        PhysicalType::Union => !matches!(version, MetadataVersion::V5),
        _ => true,
    }
}
