//! APIs to read Arrow's IPC format.
//!
//! The two important structs here are the [`FileReader`](reader::FileReader),
//! which provides arbitrary access to any of its messages, and the
//! [`StreamReader`](stream::StreamReader), which only supports reading
//! data in the order it was written in.
use ahash::AHashMap;

use crate::array::ArrayRef;
use crate::datatypes::Schema;

mod common;
mod deserialize;
mod error;
mod file;
mod message;
mod reader;
mod schema;
mod stream;
#[cfg(feature = "io_ipc_read_async")]
#[cfg_attr(docsrs, doc(cfg(feature = "io_ipc_read_async")))]
pub mod stream_async;

pub use common::{read_dictionary, read_record_batch};
pub use error::OutOfSpecKind;
pub use file::{
    read_file_dictionaries, read_file_metadata, read_file_metadata_with_options, FileMetadata,
};
pub use reader::FileReader;
pub use schema::deserialize_schema;
pub use stream::{
    read_stream_metadata, read_stream_metadata_with_options, StreamMetadata, StreamReader,
    StreamState,
};

/// how dictionaries are tracked in this crate
pub type Dictionaries = AHashMap<i64, ArrayRef>;

pub(crate) type Node<'a> = arrow_format::ipc::FieldNodeRef<'a>;
pub(crate) type IpcBuffer<'a> = arrow_format::ipc::BufferRef<'a>;
pub(crate) type Version = arrow_format::ipc::MetadataVersion;

/// Options to read Arrow files and streams.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOptions {
    /// When set, reading fails with [`Error::SchemaMismatch`](crate::error::Error::SchemaMismatch)
    /// unless the fields of the file or stream are these ones
    pub expected_schema: Option<Schema>,
    /// The position, in the reader, of the end of the Arrow file. Use it to read a file
    /// embedded in a larger container. Defaults to the end of the reader.
    pub footer_offset: Option<u64>,
    /// Whether arrays written in a non-native byte order are converted to the native one
    pub ensure_native_endian: bool,
    /// Whether [`StreamReader::open`] defers reading the schema to the first read
    pub delay_schema_read: bool,
    /// The maximum nesting depth of types and arrays
    pub max_recursion_depth: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            expected_schema: None,
            footer_offset: None,
            ensure_native_endian: true,
            delay_schema_read: false,
            max_recursion_depth: 64,
        }
    }
}
