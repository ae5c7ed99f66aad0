use std::io::{Read, Seek};
use std::sync::Arc;

use crate::datatypes::Schema;
use crate::error::Result;
use crate::record_batch::RecordBatch;

use super::common::{check_projection, output_schema};
use super::file::{read_batch, read_file_dictionaries, FileMetadata};
use super::{Dictionaries, ReadOptions};

/// An iterator of [`RecordBatch`]es from an Arrow IPC file.
///
/// Batches can also be read in any order with [`FileReader::read_record_batch`].
pub struct FileReader<R: Read + Seek> {
    reader: R,
    metadata: FileMetadata,
    // the dictionaries are read on the first batch
    dictionaries: Option<Dictionaries>,
    current_block: usize,
    projection: Option<Vec<usize>>,
    schema: Arc<Schema>,
    options: ReadOptions,
    metadata_buffer: Vec<u8>,
}

impl<R: Read + Seek> FileReader<R> {
    /// Creates a new [`FileReader`]. Use `projection` to only take certain columns.
    /// # Errors
    /// Errors with [`Error::InvalidArgumentError`](crate::error::Error::InvalidArgumentError)
    /// iff the projection is not in increasing order (e.g. `[1, 0]` nor `[0, 1, 1]` are valid)
    /// or refers to columns that the file does not have.
    pub fn try_new(
        reader: R,
        metadata: FileMetadata,
        projection: Option<Vec<usize>>,
        options: ReadOptions,
    ) -> Result<Self> {
        if let Some(projection) = &projection {
            check_projection(projection, &metadata.schema.fields)?;
        }
        let schema = output_schema(
            &metadata.schema,
            &metadata.ipc_schema,
            projection.as_deref(),
            &options,
        );
        Ok(Self {
            reader,
            metadata,
            dictionaries: None,
            current_block: 0,
            projection,
            schema,
            options,
            metadata_buffer: vec![],
        })
    }

    /// Return the schema of the batches read by this reader: the file's schema, restricted
    /// to the projection and, when batches are converted to the native byte order, of
    /// native [`Endianness`](crate::datatypes::Endianness).
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Returns the [`FileMetadata`]
    pub fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    /// The number of record batches of the file.
    pub fn num_record_batches(&self) -> usize {
        self.metadata.blocks.len()
    }

    /// Consumes this FileReader, returning the underlying reader
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Reads the record batch at `index`, independently of any batch read before.
    pub fn read_record_batch(&mut self, index: usize) -> Result<RecordBatch> {
        let dictionaries = match &mut self.dictionaries {
            Some(dictionaries) => dictionaries,
            dictionaries => dictionaries.insert(read_file_dictionaries(
                &mut self.reader,
                &self.metadata,
                &self.options,
            )?),
        };
        read_batch(
            &mut self.reader,
            dictionaries,
            &self.metadata,
            self.projection.as_deref(),
            self.schema.clone(),
            index,
            &self.options,
            &mut self.metadata_buffer,
        )
    }
}

impl<R: Read + Seek> Iterator for FileReader<R> {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        // get current block
        if self.current_block < self.metadata.blocks.len() {
            let block = self.current_block;
            self.current_block += 1;
            Some(self.read_record_batch(block))
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.metadata.blocks.len() - self.current_block;
        (remaining, Some(remaining))
    }
}
