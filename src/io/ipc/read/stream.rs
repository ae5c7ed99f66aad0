use std::io::Read;
use std::sync::Arc;

use arrow_format::ipc::MessageHeaderRef;

use crate::datatypes::Schema;
use crate::error::{Error, Result};
use crate::record_batch::RecordBatch;

use super::super::{IpcSchema, CONTINUATION_MARKER};
use super::common::{
    check_expected_schema, check_projection, output_schema, read_dictionary, read_record_batch,
};
use super::message::{
    body_length, decode_length, header, parse_message, read_body, read_metadata,
    read_metadata_of_length,
};
use super::schema::deserialize_stream_metadata;
use super::{Dictionaries, OutOfSpecKind, ReadOptions, Version};

/// Metadata of an Arrow IPC stream, written in its first message
#[derive(Debug, Clone)]
pub struct StreamMetadata {
    /// The schema that is read from the stream's first message
    pub schema: Schema,

    /// The IPC version of the stream
    pub version: Version,

    /// The IPC fields tracking dictionaries
    pub ipc_schema: IpcSchema,
}

/// Reads the metadata of the stream
pub fn read_stream_metadata<R: Read>(reader: &mut R) -> Result<StreamMetadata> {
    read_stream_metadata_with_options(reader, &ReadOptions::default())
}

/// Reads the metadata of the stream, checking it against [`ReadOptions::expected_schema`].
pub fn read_stream_metadata_with_options<R: Read>(
    reader: &mut R,
    options: &ReadOptions,
) -> Result<StreamMetadata> {
    let mut buffer = vec![];
    read_metadata(reader, &mut buffer)?
        .ok_or_else(|| Error::from(OutOfSpecKind::MissingSchema))?;
    finish_metadata(&buffer, options)
}

fn finish_metadata(buffer: &[u8], options: &ReadOptions) -> Result<StreamMetadata> {
    let metadata = deserialize_stream_metadata(buffer, options.max_recursion_depth)?;
    check_expected_schema(&metadata.schema, options)?;
    tracing::debug!(fields = metadata.schema.fields.len(), "read stream schema");
    Ok(metadata)
}

/// Encodes the state of a stream: whether it is currently waiting for more data or
/// whether it has a new batch.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamState {
    /// A stream that does not have data yet, but it is not finished.
    Waiting,
    /// A stream that has a new batch
    Some(RecordBatch),
}

impl StreamState {
    /// Returns the [`RecordBatch`] of this state.
    /// # Panics
    /// Panics iff the state is [`StreamState::Waiting`].
    pub fn unwrap(self) -> RecordBatch {
        if let StreamState::Some(batch) = self {
            batch
        } else {
            panic!("The batch is not available")
        }
    }
}

/// An iterator of [`StreamState`]s of an Arrow stream.
///
/// The reader yields [`StreamState::Waiting`] when the underlying reader has no more
/// data but the stream has not ended, e.g. a socket on which nothing was sent yet, and
/// ends after the stream's end-of-stream marker. The bytes of a partially received
/// message prefix are kept until the rest arrives.
pub struct StreamReader<R: Read> {
    reader: R,
    metadata: Option<StreamMetadata>,
    schema: Option<Arc<Schema>>,
    dictionaries: Dictionaries,
    projection: Option<Vec<usize>>,
    options: ReadOptions,
    finished: bool,
    metadata_buffer: Vec<u8>,
    prefix: [u8; 8],
    prefix_length: usize,
}

impl<R: Read> StreamReader<R> {
    /// Creates a new [`StreamReader`] from a reader positioned after the stream's
    /// metadata, read with [`read_stream_metadata`].
    /// # Errors
    /// Errors iff the projection is not strictly increasing or out of bounds.
    pub fn try_new(
        reader: R,
        metadata: StreamMetadata,
        projection: Option<Vec<usize>>,
        options: ReadOptions,
    ) -> Result<Self> {
        let mut reader = Self::open_delayed(reader, projection, options);
        reader.set_metadata(metadata)?;
        Ok(reader)
    }

    /// Creates a new [`StreamReader`] from a reader at the start of a stream. The schema is
    /// read here or, when [`ReadOptions::delay_schema_read`] is set, on the first read.
    pub fn open(reader: R, projection: Option<Vec<usize>>, options: ReadOptions) -> Result<Self> {
        let delay = options.delay_schema_read;
        let mut reader = Self::open_delayed(reader, projection, options);
        if !delay {
            let metadata = read_stream_metadata_with_options(&mut reader.reader, &reader.options)?;
            reader.set_metadata(metadata)?;
        }
        Ok(reader)
    }

    fn open_delayed(reader: R, projection: Option<Vec<usize>>, options: ReadOptions) -> Self {
        Self {
            reader,
            metadata: None,
            schema: None,
            dictionaries: Default::default(),
            projection,
            options,
            finished: false,
            metadata_buffer: vec![],
            prefix: [0; 8],
            prefix_length: 0,
        }
    }

    fn set_metadata(&mut self, metadata: StreamMetadata) -> Result<()> {
        if let Some(projection) = &self.projection {
            check_projection(projection, &metadata.schema.fields)?;
        }
        self.schema = Some(output_schema(
            &metadata.schema,
            &metadata.ipc_schema,
            self.projection.as_deref(),
            &self.options,
        ));
        self.metadata = Some(metadata);
        Ok(())
    }

    /// Return the metadata of the stream, or `None` while its schema was not read.
    pub fn metadata(&self) -> Option<&StreamMetadata> {
        self.metadata.as_ref()
    }

    /// Return the schema of the batches read by this reader, or `None` while the stream's
    /// schema was not read.
    pub fn schema(&self) -> Option<&Arc<Schema>> {
        self.schema.as_ref()
    }

    /// Check if the stream is finished
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Consumes this reader, returning the underlying reader
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Reads the prefix of the next message and returns its metadata length, or `None`
    /// while the prefix is incomplete.
    fn read_prefix(&mut self) -> Result<Option<i32>> {
        loop {
            let required = if self.prefix_length >= 4 && self.prefix[..4] == CONTINUATION_MARKER {
                8
            } else {
                4
            };
            if self.prefix_length == required {
                break;
            }
            match self.reader.read(&mut self.prefix[self.prefix_length..required]) {
                Ok(0) => return Ok(None),
                Ok(read) => self.prefix_length += read,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::from(e)),
            }
        }
        let start = std::mem::take(&mut self.prefix_length) - 4;
        let mut length = [0; 4];
        length.copy_from_slice(&self.prefix[start..start + 4]);
        Ok(Some(i32::from_le_bytes(length)))
    }

    /// Reads the metadata of the next message into `metadata_buffer`, returning `None`
    /// while its prefix is incomplete and `Some(false)` at the end of the stream.
    fn read_next_metadata(&mut self) -> Result<Option<bool>> {
        let length = match self.read_prefix()? {
            Some(length) => length,
            None => return Ok(None),
        };
        match decode_length(length)? {
            Some(length) => {
                read_metadata_of_length(&mut self.reader, length, &mut self.metadata_buffer)?;
                Ok(Some(true))
            }
            None => Ok(Some(false)),
        }
    }

    fn end(&mut self) -> Result<Option<StreamState>> {
        tracing::debug!("reached the end of the stream");
        self.finished = true;
        Ok(None)
    }

    fn maybe_next(&mut self) -> Result<Option<StreamState>> {
        if self.finished {
            return Ok(None);
        }

        if self.metadata.is_none() {
            match self.read_next_metadata()? {
                Some(true) => {}
                Some(false) => return Err(Error::from(OutOfSpecKind::MissingSchema)),
                None => return Ok(Some(StreamState::Waiting)),
            }
            let metadata = finish_metadata(&self.metadata_buffer, &self.options)?;
            self.set_metadata(metadata)?;
        }

        loop {
            match self.read_next_metadata()? {
                Some(true) => {}
                Some(false) => return self.end(),
                None => return Ok(Some(StreamState::Waiting)),
            }

            let (metadata, schema) = match (&self.metadata, &self.schema) {
                (Some(metadata), Some(schema)) => (metadata, schema),
                _ => return Err(Error::from(OutOfSpecKind::MissingSchema)),
            };
            let message = parse_message(&self.metadata_buffer)?;
            let body = read_body(&mut self.reader, body_length(&message)?)?;

            match header(&message)? {
                MessageHeaderRef::RecordBatch(batch) => {
                    return read_record_batch(
                        batch,
                        body,
                        &metadata.schema.fields,
                        &metadata.ipc_schema,
                        self.projection.as_deref(),
                        schema.clone(),
                        &self.dictionaries,
                        message.version()?,
                        &self.options,
                    )
                    .map(|batch| Some(StreamState::Some(batch)));
                }
                MessageHeaderRef::DictionaryBatch(batch) => {
                    read_dictionary(
                        batch,
                        body,
                        &metadata.schema.fields,
                        &metadata.ipc_schema,
                        &mut self.dictionaries,
                        message.version()?,
                        &self.options,
                        false,
                    )?;
                    // read the next message until we encounter a record batch
                }
                _ => return Err(Error::from(OutOfSpecKind::UnexpectedMessageType)),
            }
        }
    }
}

impl<R: Read> Iterator for StreamReader<R> {
    type Item = Result<StreamState>;

    fn next(&mut self) -> Option<Self::Item> {
        self.maybe_next().transpose()
    }
}
