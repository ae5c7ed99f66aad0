use crate::error::Error;

/// The different types of errors that reading from IPC can cause
#[derive(Debug)]
#[non_exhaustive]
pub enum OutOfSpecKind {
    /// The IPC file does not start with [b'A', b'R', b'R', b'O', b'W', b'1']
    InvalidHeader,
    /// The IPC file does not end with [b'A', b'R', b'R', b'O', b'W', b'1']
    InvalidFooter,
    /// The first 4 bytes of the last 10 bytes is < 0
    NegativeFooterLength,
    /// The IPC file is smaller than its header and footer
    FileTooSmall {
        /// The size of the file
        file_size: u64,
    },
    /// The footer is an invalid flatbuffer
    InvalidFlatbufferFooter(arrow_format::ipc::planus::Error),
    /// The file's footer does not contain record batches
    MissingRecordBatches,
    /// The file's footer does not contain a schema
    MissingSchema,
    /// The file's schema does not contain fields
    MissingFields,
    /// The message is an invalid flatbuffer
    InvalidFlatbufferMessage(arrow_format::ipc::planus::Error),
    /// The message does not contain a header
    MissingMessageHeader,
    /// Relative positions in the file is < 0
    UnexpectedNegativeInteger,
    /// dictionaries can only contain dictionary messages; record batches can only contain records
    UnexpectedMessageType,
    /// RecordBatch messages do not contain buffers
    MissingMessageBuffers,
    /// RecordBatch messages does not contain nodes
    MissingMessageNodes,
    /// The message does not contain data
    MissingData,
    /// The record contains fewer field nodes than required by the data types
    ExpectedNode,
    /// The record contains a number of buffers that does not match the required number by the data type
    ExpectedBuffer,
    /// A view array has no matching variadic buffer count
    ExpectedVariadicBufferCount,
    /// A buffer's size is smaller than the required for the number of elements
    InvalidBuffer {
        /// Declared number of elements in the buffer
        length: usize,
        /// Bytes required for the `length` slots
        required_number_of_bytes: usize,
        /// The size of the IPC buffer
        buffer_length: usize,
    },
    /// A buffer's size is larger than the body of its message
    InvalidBuffersLength {
        /// the end of the buffer
        buffer_end: u64,
        /// the size of the body
        body_length: u64,
    },
    /// A bitmap's size is smaller than the required for the number of elements
    InvalidBitmap {
        /// Declared length of the bitmap
        length: usize,
        /// Number of bits on the IPC buffer
        number_of_bits: usize,
    },
    /// The offsets of a variable-length array address bytes outside of its values
    InvalidOffsets,
    /// Invalid dictionary id
    InvalidId {
        /// The requested dictionary id
        requested_id: i64,
    },
    /// Field id is not a dictionary
    InvalidIdDataType {
        /// The requested dictionary id
        requested_id: i64,
    },
    /// A dictionary-encoded field has no dictionary id
    MissingDictionaryId,
    /// A delta dictionary batch was received for an id without a dictionary
    DeltaWithoutDictionary {
        /// The requested dictionary id
        requested_id: i64,
    },
    /// The file contains a dictionary batch replacing a dictionary of the same id
    DictionaryReplacement {
        /// The replaced dictionary id
        requested_id: i64,
    },
    /// The nested fields of a field do not match its type
    InvalidChildren,
    /// The data type of a field is not supported by the format
    InvalidDataType,
    /// The message's metadata version is unknown
    UnsupportedVersion,
}

impl From<OutOfSpecKind> for Error {
    fn from(kind: OutOfSpecKind) -> Self {
        Error::OutOfSpec(format!("{kind:?}"))
    }
}

impl From<arrow_format::ipc::planus::Error> for Error {
    fn from(error: arrow_format::ipc::planus::Error) -> Self {
        Error::OutOfSpec(error.to_string())
    }
}
