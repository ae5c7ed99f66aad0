//! Arrow IPC File and Stream Writers
//!
//! The `FileWriter` and `StreamWriter` have similar interfaces,
//! however the `FileWriter` expects a reader that supports `Seek`ing

use std::io::Write;

use super::super::IpcField;
use super::common::{encode_record_batch, DictionaryTracker, EncodedData, WriteOptions};
use super::common_sync::{write_continuation, write_message};
use super::{check_schema, default_ipc_fields, schema_to_bytes};

use crate::datatypes::*;
use crate::error::{Error, Result};
use crate::record_batch::RecordBatch;

/// Arrow stream writer
///
/// The data written by this writer must be read in order. To signal that no more
/// data is arriving through the stream call [`self.finish()`](StreamWriter::finish);
pub struct StreamWriter<W: Write> {
    /// The object to write to
    writer: W,
    /// IPC write options
    write_options: WriteOptions,
    /// The schema and fields of the stream, set by `start`
    schema: Option<(Schema, Vec<IpcField>)>,
    /// Whether the stream has been finished
    finished: bool,
    /// Keeps track of dictionaries that have been written
    dictionary_tracker: DictionaryTracker,
}

impl<W: Write> StreamWriter<W> {
    /// Creates a new [`StreamWriter`]
    pub fn new(writer: W, write_options: WriteOptions) -> Self {
        Self {
            writer,
            write_options,
            schema: None,
            finished: false,
            dictionary_tracker: DictionaryTracker::new(false),
        }
    }

    /// Starts the stream by writing a Schema message to it.
    /// Use `ipc_fields` to declare dictionary ids in the schema, for dictionary-reuse
    pub fn start(&mut self, schema: &Schema, ipc_fields: Option<Vec<IpcField>>) -> Result<()> {
        if self.schema.is_some() {
            return Err(Error::InvalidArgumentError(
                "The stream has already been started".to_string(),
            ));
        }
        self.write_options.validate()?;

        let ipc_fields = ipc_fields.unwrap_or_else(|| default_ipc_fields(&schema.fields));
        let encoded_message = EncodedData {
            ipc_message: schema_to_bytes(schema, &ipc_fields)?,
            arrow_data: vec![],
        };
        write_message(&mut self.writer, &encoded_message, self.write_options.alignment)?;
        tracing::debug!(fields = schema.fields.len(), "started IPC stream");
        self.schema = Some((schema.clone(), ipc_fields));
        Ok(())
    }

    /// Writes a [`RecordBatch`] to the stream, preceded by the dictionaries it requires.
    pub fn write(&mut self, batch: &RecordBatch, ipc_fields: Option<&[IpcField]>) -> Result<()> {
        if self.finished {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Cannot write to a finished stream".to_string(),
            )));
        }
        let (schema, fields) = self.schema.as_ref().ok_or_else(|| {
            Error::InvalidArgumentError(
                "The stream must be started before writing batches".to_string(),
            )
        })?;
        check_schema(schema, batch)?;

        let fields = ipc_fields.unwrap_or(fields);
        let (encoded_dictionaries, encoded_message) = encode_record_batch(
            batch,
            fields,
            schema.endianness,
            &mut self.dictionary_tracker,
            &self.write_options,
        )?;

        let alignment = self.write_options.alignment;
        for encoded_dictionary in encoded_dictionaries {
            write_message(&mut self.writer, &encoded_dictionary, alignment)?;
        }

        write_message(&mut self.writer, &encoded_message, alignment)?;
        tracing::trace!(rows = batch.num_rows(), "wrote record batch");
        Ok(())
    }

    /// Write continuation bytes, and mark the stream as done
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        write_continuation(&mut self.writer, 0)?;
        self.writer.flush()?;

        self.finished = true;
        tracing::debug!("finished IPC stream");

        Ok(())
    }

    /// Consumes itself, returning the inner writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
