//! `async` writing of arrow streams

use std::{pin::Pin, task::Poll};

use futures::{future::BoxFuture, AsyncWrite, AsyncWriteExt, FutureExt, Sink};

use super::super::IpcField;
pub use super::common::WriteOptions;
use super::common::{encode_record_batch, DictionaryTracker, EncodedData};
use super::common_async::{write_continuation, write_message};
use super::{check_schema, default_ipc_fields, schema_to_bytes};

use crate::datatypes::*;
use crate::error::{Error, Result};
use crate::record_batch::RecordBatch;

/// A sink that writes [`RecordBatch`]es as an IPC stream.
///
/// The stream header is automatically written before writing the first batch.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use futures::SinkExt;
/// use arrow_ipc_codec::array::Array;
/// use arrow_ipc_codec::datatypes::{DataType, Field, Schema};
/// use arrow_ipc_codec::record_batch::RecordBatch;
/// # use arrow_ipc_codec::io::ipc::write::stream_async::StreamSink;
/// # futures::executor::block_on(async move {
/// let schema = Arc::new(Schema::from(vec![
///     Field::new("values", DataType::Int32, true),
/// ]));
///
/// let mut buffer = vec![];
/// let mut sink = StreamSink::new(
///     &mut buffer,
///     &schema,
///     None,
///     Default::default(),
/// )?;
///
/// for i in 0..3 {
///     let values = Array::from_opt(&[Some(i), None]);
///     let batch = RecordBatch::try_new(schema.clone(), vec![Arc::new(values)])?;
///     sink.feed(batch).await?;
/// }
/// sink.close().await?;
/// # arrow_ipc_codec::error::Result::Ok(())
/// # }).unwrap();
/// ```
pub struct StreamSink<'a, W: AsyncWrite + Unpin + Send + 'a> {
    writer: Option<W>,
    task: Option<BoxFuture<'a, Result<Option<W>>>>,
    options: WriteOptions,
    dictionary_tracker: DictionaryTracker,
    schema: Schema,
    fields: Vec<IpcField>,
}

impl<'a, W> StreamSink<'a, W>
where
    W: AsyncWrite + Unpin + Send + 'a,
{
    /// Create a new [`StreamSink`].
    pub fn new(
        writer: W,
        schema: &Schema,
        ipc_fields: Option<Vec<IpcField>>,
        write_options: WriteOptions,
    ) -> Result<Self> {
        write_options.validate()?;
        let fields = ipc_fields.unwrap_or_else(|| default_ipc_fields(&schema.fields));
        let task = Some(Self::start(writer, schema, &fields[..], write_options.alignment)?);
        Ok(Self {
            writer: None,
            task,
            fields,
            schema: schema.clone(),
            dictionary_tracker: DictionaryTracker::new(false),
            options: write_options,
        })
    }

    fn start(
        mut writer: W,
        schema: &Schema,
        ipc_fields: &[IpcField],
        alignment: usize,
    ) -> Result<BoxFuture<'a, Result<Option<W>>>> {
        let message = EncodedData {
            ipc_message: schema_to_bytes(schema, ipc_fields)?,
            arrow_data: vec![],
        };
        Ok(async move {
            write_message(&mut writer, message, alignment).await?;
            Ok(Some(writer))
        }
        .boxed())
    }

    fn write(&mut self, batch: RecordBatch) -> Result<()> {
        check_schema(&self.schema, &batch)?;
        let (dictionaries, message) = encode_record_batch(
            &batch,
            &self.fields,
            self.schema.endianness,
            &mut self.dictionary_tracker,
            &self.options,
        )?;
        let alignment = self.options.alignment;

        if let Some(mut writer) = self.writer.take() {
            self.task = Some(
                async move {
                    for d in dictionaries {
                        write_message(&mut writer, d, alignment).await?;
                    }
                    write_message(&mut writer, message, alignment).await?;
                    Ok(Some(writer))
                }
                .boxed(),
            );
            Ok(())
        } else {
            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "writer closed".to_string(),
            )))
        }
    }

    fn poll_complete(&mut self, cx: &mut std::task::Context<'_>) -> Poll<Result<()>> {
        if let Some(task) = &mut self.task {
            match futures::ready!(task.poll_unpin(cx)) {
                Ok(writer) => {
                    self.writer = writer;
                    self.task = None;
                    Poll::Ready(Ok(()))
                }
                Err(error) => {
                    self.task = None;
                    Poll::Ready(Err(error))
                }
            }
        } else {
            Poll::Ready(Ok(()))
        }
    }
}

impl<'a, W> Sink<RecordBatch> for StreamSink<'a, W>
where
    W: AsyncWrite + Unpin + Send + 'a,
{
    type Error = Error;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> Poll<Result<()>> {
        self.get_mut().poll_complete(cx)
    }

    fn start_send(self: Pin<&mut Self>, item: RecordBatch) -> Result<()> {
        self.get_mut().write(item)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> Poll<Result<()>> {
        self.get_mut().poll_complete(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> Poll<Result<()>> {
        let this = self.get_mut();
        match this.poll_complete(cx) {
            Poll::Ready(Ok(())) => {
                if let Some(mut writer) = this.writer.take() {
                    this.task = Some(
                        async move {
                            write_continuation(&mut writer, 0).await?;
                            writer.flush().await?;
                            writer.close().await?;
                            Ok(None)
                        }
                        .boxed(),
                    );
                    this.poll_complete(cx)
                } else {
                    Poll::Ready(Ok(()))
                }
            }
            res => res,
        }
    }
}
