//! APIs to read Arrow streams asynchronously
use std::sync::Arc;

use arrow_format::ipc::MessageHeaderRef;
use futures::future::BoxFuture;
use futures::AsyncRead;
use futures::AsyncReadExt;
use futures::Stream;

use crate::buffer::Buffer;
use crate::datatypes::Schema;
use crate::error::{Error, Result};
use crate::record_batch::RecordBatch;

use super::super::CONTINUATION_MARKER;
use super::common::{
    check_expected_schema, check_projection, output_schema, read_dictionary, read_record_batch,
};
use super::message::{body_length, decode_length, header, parse_message};
use super::schema::deserialize_stream_metadata;
use super::{Dictionaries, OutOfSpecKind, ReadOptions, StreamMetadata};

/// Reads the length of the next message's metadata after its first 4 bytes, `prefix`.
async fn read_length<R: AsyncRead + Unpin + Send>(
    prefix: [u8; 4],
    reader: &mut R,
) -> Result<Option<usize>> {
    let length = if prefix == CONTINUATION_MARKER {
        let mut length = [0; 4];
        reader.read_exact(&mut length).await?;
        i32::from_le_bytes(length)
    } else {
        i32::from_le_bytes(prefix)
    };
    decode_length(length)
}

/// Reads exactly `length` bytes into `buffer`.
async fn read_to<R: AsyncRead + Unpin + Send>(
    reader: &mut R,
    length: usize,
    buffer: &mut Vec<u8>,
) -> Result<()> {
    buffer.clear();
    buffer.try_reserve(length)?;
    reader.take(length as u64).read_to_end(buffer).await?;
    if buffer.len() != length {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "the message is truncated",
        )));
    }
    Ok(())
}

/// Reads the [`StreamMetadata`] of the Arrow stream asynchronously
pub async fn read_stream_metadata_async<R: AsyncRead + Unpin + Send>(
    reader: &mut R,
) -> Result<StreamMetadata> {
    let mut prefix = [0; 4];
    reader.read_exact(&mut prefix).await?;
    let length = read_length(prefix, reader)
        .await?
        .ok_or_else(|| Error::from(OutOfSpecKind::MissingSchema))?;

    let mut buffer = vec![];
    read_to(reader, length, &mut buffer).await?;
    deserialize_stream_metadata(&buffer, ReadOptions::default().max_recursion_depth)
}

/// Everything a read of the next batch needs, moved in and out of each future.
struct ReadState<R> {
    reader: R,
    metadata: Arc<StreamMetadata>,
    schema: Arc<Schema>,
    projection: Option<Vec<usize>>,
    options: ReadOptions,
    dictionaries: Dictionaries,
    metadata_buffer: Vec<u8>,
}

/// Reads messages until the next record batch, yielding `None` once the stream ends,
/// either at its end-of-stream marker or at the end of the reader.
async fn read_next<R: AsyncRead + Unpin + Send>(
    mut state: ReadState<R>,
) -> Result<Option<(ReadState<R>, RecordBatch)>> {
    loop {
        let mut prefix = [0; 4];
        match state.reader.read_exact(&mut prefix).await {
            Ok(()) => (),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                tracing::debug!("the stream ended without an end-of-stream marker");
                return Ok(None);
            }
            Err(e) => return Err(Error::from(e)),
        }
        let length = match read_length(prefix, &mut state.reader).await? {
            Some(length) => length,
            None => {
                tracing::debug!("reached the end of the stream");
                return Ok(None);
            }
        };
        read_to(&mut state.reader, length, &mut state.metadata_buffer).await?;

        let length = body_length(&parse_message(&state.metadata_buffer)?)?;
        let mut body = vec![];
        read_to(&mut state.reader, length, &mut body).await?;
        let body = Buffer::from(body);

        let message = parse_message(&state.metadata_buffer)?;
        match header(&message)? {
            MessageHeaderRef::RecordBatch(batch) => {
                let batch = read_record_batch(
                    batch,
                    body,
                    &state.metadata.schema.fields,
                    &state.metadata.ipc_schema,
                    state.projection.as_deref(),
                    state.schema.clone(),
                    &state.dictionaries,
                    message.version()?,
                    &state.options,
                )?;
                return Ok(Some((state, batch)));
            }
            MessageHeaderRef::DictionaryBatch(batch) => {
                read_dictionary(
                    batch,
                    body,
                    &state.metadata.schema.fields,
                    &state.metadata.ipc_schema,
                    &mut state.dictionaries,
                    message.version()?,
                    &state.options,
                    false,
                )?;
            }
            _ => return Err(Error::from(OutOfSpecKind::UnexpectedMessageType)),
        }
    }
}

type ReadFuture<R> = BoxFuture<'static, Result<Option<(ReadState<R>, RecordBatch)>>>;

/// Arrow Stream reader.
///
/// A [`Stream`] of the [`RecordBatch`]es of an Arrow stream, positioned after the
/// stream's metadata (see [`read_stream_metadata_async`]).
pub struct AsyncStreamReader<R: AsyncRead + Unpin + Send + 'static> {
    metadata: Arc<StreamMetadata>,
    schema: Arc<Schema>,
    future: Option<ReadFuture<R>>,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncStreamReader<R> {
    /// Creates a new [`AsyncStreamReader`] reading every column.
    pub fn new(reader: R, metadata: StreamMetadata) -> Self {
        let options = ReadOptions::default();
        let schema = output_schema(&metadata.schema, &metadata.ipc_schema, None, &options);
        Self::start(reader, Arc::new(metadata), schema, None, options)
    }

    /// Creates a new [`AsyncStreamReader`] that only reads the columns in `projection`.
    /// # Errors
    /// Errors iff the projection is invalid or the metadata does not match
    /// [`ReadOptions::expected_schema`].
    pub fn try_new(
        reader: R,
        metadata: StreamMetadata,
        projection: Option<Vec<usize>>,
        options: ReadOptions,
    ) -> Result<Self> {
        check_expected_schema(&metadata.schema, &options)?;
        if let Some(projection) = &projection {
            check_projection(projection, &metadata.schema.fields)?;
        }
        let schema = output_schema(
            &metadata.schema,
            &metadata.ipc_schema,
            projection.as_deref(),
            &options,
        );
        Ok(Self::start(reader, Arc::new(metadata), schema, projection, options))
    }

    fn start(
        reader: R,
        metadata: Arc<StreamMetadata>,
        schema: Arc<Schema>,
        projection: Option<Vec<usize>>,
        options: ReadOptions,
    ) -> Self {
        let state = ReadState {
            reader,
            metadata: metadata.clone(),
            schema: schema.clone(),
            projection,
            options,
            dictionaries: Default::default(),
            metadata_buffer: vec![],
        };
        Self {
            metadata,
            schema,
            future: Some(Box::pin(read_next(state))),
        }
    }

    /// Return the metadata of the stream
    pub fn metadata(&self) -> &StreamMetadata {
        &self.metadata
    }

    /// Return the schema of the batches read by this reader
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

impl<R: AsyncRead + Unpin + Send> Stream for AsyncStreamReader<R> {
    type Item = Result<RecordBatch>;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::pin::Pin;
        use std::task::Poll;
        let me = Pin::into_inner(self);

        match &mut me.future {
            Some(fut) => match fut.as_mut().poll(cx) {
                Poll::Ready(Ok(None)) => {
                    me.future = None;
                    Poll::Ready(None)
                }
                Poll::Ready(Ok(Some((state, batch)))) => {
                    me.future = Some(Box::pin(read_next(state)));
                    Poll::Ready(Some(Ok(batch)))
                }
                Poll::Ready(Err(err)) => {
                    me.future = None;
                    Poll::Ready(Some(Err(err)))
                }
                Poll::Pending => Poll::Pending,
            },
            None => Poll::Ready(None),
        }
    }
}
