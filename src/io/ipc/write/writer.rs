use std::io::Write;

use arrow_format::ipc;
use arrow_format::ipc::planus::Builder;

use super::{
    super::IpcField,
    super::ARROW_MAGIC,
    check_schema,
    common::{encode_record_batch, DictionaryTracker, EncodedData, WriteOptions},
    common_sync::{write_continuation, write_message},
    default_ipc_fields, schema, schema_to_bytes,
};

use crate::datatypes::*;
use crate::error::{Error, Result};
use crate::record_batch::RecordBatch;

/// Arrow file writer
pub struct FileWriter<W: Write> {
    /// The object to write to
    writer: W,
    /// IPC write options
    options: WriteOptions,
    /// A reference to the schema, used in validating record batches
    schema: Schema,
    ipc_fields: Vec<IpcField>,
    /// The number of bytes between each block of bytes, as an offset for random access
    block_offsets: usize,
    /// Dictionary blocks that will be written as part of the IPC footer
    dictionary_blocks: Vec<ipc::Block>,
    /// Record blocks that will be written as part of the IPC footer
    record_blocks: Vec<ipc::Block>,
    /// Whether the writer footer has been written, and the writer is finished
    finished: bool,
    /// Keeps track of dictionaries that have been written
    dictionary_tracker: DictionaryTracker,
}

impl<W: Write> FileWriter<W> {
    /// Try create a new writer, with the schema written as part of the header
    pub fn try_new(
        mut writer: W,
        schema: &Schema,
        ipc_fields: Option<Vec<IpcField>>,
        options: WriteOptions,
    ) -> Result<Self> {
        options.validate()?;
        // write magic to header
        writer.write_all(&ARROW_MAGIC[..])?;
        // create an 8-byte boundary after the header
        writer.write_all(&[0, 0])?;

        let ipc_fields = ipc_fields.unwrap_or_else(|| default_ipc_fields(&schema.fields));
        let encoded_message = EncodedData {
            ipc_message: schema_to_bytes(schema, &ipc_fields)?,
            arrow_data: vec![],
        };

        let (meta, data) = write_message(&mut writer, &encoded_message, options.alignment)?;
        Ok(Self {
            writer,
            options,
            schema: schema.clone(),
            ipc_fields,
            block_offsets: meta + data + 8,
            dictionary_blocks: vec![],
            record_blocks: vec![],
            finished: false,
            dictionary_tracker: DictionaryTracker::new(true),
        })
    }

    /// Consumes itself into the inner writer
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// The blocks of the record batches written so far.
    pub fn record_blocks(&self) -> &[ipc::Block] {
        &self.record_blocks
    }

    /// The blocks of the dictionary batches written so far.
    pub fn dictionary_blocks(&self) -> &[ipc::Block] {
        &self.dictionary_blocks
    }

    fn write_block(&mut self, encoded: &EncodedData) -> Result<ipc::Block> {
        let (meta, data) = write_message(&mut self.writer, encoded, self.options.alignment)?;
        let block = ipc::Block {
            offset: self.block_offsets as i64,
            meta_data_length: meta as i32,
            body_length: data as i64,
        };
        self.block_offsets += meta + data;
        Ok(block)
    }

    /// Writes [`RecordBatch`] to the file
    pub fn write(&mut self, batch: &RecordBatch, ipc_fields: Option<&[IpcField]>) -> Result<()> {
        if self.finished {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Cannot write to a finished file".to_string(),
            )));
        }
        check_schema(&self.schema, batch)?;

        let ipc_fields = if let Some(ipc_fields) = ipc_fields {
            ipc_fields
        } else {
            self.ipc_fields.as_ref()
        };

        let (encoded_dictionaries, encoded_message) = encode_record_batch(
            batch,
            ipc_fields,
            self.schema.endianness,
            &mut self.dictionary_tracker,
            &self.options,
        )?;

        for encoded_dictionary in encoded_dictionaries {
            let block = self.write_block(&encoded_dictionary)?;
            self.dictionary_blocks.push(block);
        }

        let block = self.write_block(&encoded_message)?;
        self.record_blocks.push(block);
        Ok(())
    }

    /// Write footer and closing tag, then mark the writer as done.
    /// Calling it again is a no-op.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        // write EOS
        write_continuation(&mut self.writer, 0)?;

        let schema = schema::serialize_schema(&self.schema, &self.ipc_fields)?;

        let root = ipc::Footer {
            version: ipc::MetadataVersion::V5,
            schema: Some(Box::new(schema)),
            dictionaries: Some(self.dictionary_blocks.clone()),
            record_batches: Some(self.record_blocks.clone()),
            custom_metadata: None,
        };
        let mut builder = Builder::new();
        let footer_data = builder.finish(&root, None);
        self.writer.write_all(footer_data)?;
        self.writer
            .write_all(&(footer_data.len() as i32).to_le_bytes())?;
        self.writer.write_all(&ARROW_MAGIC)?;
        self.writer.flush()?;
        self.finished = true;
        tracing::debug!(footer_length = footer_data.len(), "finished IPC file");

        Ok(())
    }
}
