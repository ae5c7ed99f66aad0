use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

use arrow_format::ipc::planus::ReadAsRoot;
use arrow_format::ipc::{Block, FooterRef, MessageHeaderRef};

use crate::datatypes::Schema;
use crate::error::{Error, Result};
use crate::record_batch::RecordBatch;

use super::super::{IpcSchema, ARROW_MAGIC};
use super::common::{check_expected_schema, read_dictionary, read_record_batch};
use super::message::{body_length, header, parse_message, read_body, read_metadata};
use super::schema::fb_to_schema;
use super::{Dictionaries, OutOfSpecKind, ReadOptions, Version};

/// Metadata of an Arrow IPC file, written in its footer.
#[derive(Debug, Clone)]
pub struct FileMetadata {
    /// The schema that is read from the file footer
    pub schema: Schema,

    /// The files' [`IpcSchema`]
    pub ipc_schema: IpcSchema,

    /// The blocks in the file
    ///
    /// A block indicates the regions in the file to read to get data
    pub blocks: Vec<Block>,

    /// Dictionaries associated to each dict_id
    pub(crate) dictionaries: Option<Vec<Block>>,

    /// The metadata version of the file
    pub version: Version,

    /// The position of the end of the file in the reader
    pub size: u64,
}

impl FileMetadata {
    /// The blocks of the dictionary batches of the file, in the order they were written.
    pub fn dictionary_blocks(&self) -> &[Block] {
        self.dictionaries.as_deref().unwrap_or(&[])
    }
}

fn to_blocks(
    blocks: Option<arrow_format::ipc::planus::Vector<'_, arrow_format::ipc::BlockRef<'_>>>,
) -> Result<Option<Vec<Block>>> {
    blocks
        .map(|blocks| {
            blocks
                .iter()
                .map(|block| {
                    Block::try_from(block)
                        .map_err(|err| Error::from(OutOfSpecKind::InvalidFlatbufferFooter(err)))
                })
                .collect::<Result<Vec<_>>>()
        })
        .transpose()
}

pub(super) fn deserialize_footer(
    footer_data: &[u8],
    size: u64,
    options: &ReadOptions,
) -> Result<FileMetadata> {
    let footer = FooterRef::read_as_root(footer_data)
        .map_err(|err| Error::from(OutOfSpecKind::InvalidFlatbufferFooter(err)))?;

    let blocks = to_blocks(footer.record_batches()?)?
        .ok_or_else(|| Error::from(OutOfSpecKind::MissingRecordBatches))?;
    let dictionaries = to_blocks(footer.dictionaries()?)?;

    let ipc_schema = footer
        .schema()?
        .ok_or_else(|| Error::from(OutOfSpecKind::MissingSchema))?;
    let (schema, ipc_schema) = fb_to_schema(ipc_schema, options.max_recursion_depth)?;
    check_expected_schema(&schema, options)?;

    Ok(FileMetadata {
        schema,
        ipc_schema,
        blocks,
        dictionaries,
        version: footer.version()?,
        size,
    })
}

/// Reads the footer's length and checks the magic numbers around the file.
fn read_footer_len<R: Read + Seek>(reader: &mut R, end: u64, check_header: bool) -> Result<usize> {
    let minimum = (2 * ARROW_MAGIC.len() + 4) as u64;
    if end < minimum {
        return Err(Error::from(OutOfSpecKind::FileTooSmall { file_size: end }));
    }

    if check_header {
        let mut magic = [0; 6];
        reader.seek(SeekFrom::Start(0))?;
        reader.read_exact(&mut magic)?;
        if magic != ARROW_MAGIC {
            return Err(Error::from(OutOfSpecKind::InvalidHeader));
        }
    }

    reader.seek(SeekFrom::Start(end - 10))?;
    let mut footer: [u8; 10] = [0; 10];
    reader.read_exact(&mut footer)?;
    if footer[4..] != ARROW_MAGIC {
        return Err(Error::from(OutOfSpecKind::InvalidFooter));
    }
    let footer_len = i32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]);
    let footer_len: usize = footer_len
        .try_into()
        .map_err(|_| Error::from(OutOfSpecKind::NegativeFooterLength))?;
    if footer_len as u64 > end - minimum {
        return Err(Error::from(OutOfSpecKind::FileTooSmall { file_size: end }));
    }
    Ok(footer_len)
}

/// Read the Arrow IPC file's metadata
pub fn read_file_metadata<R: Read + Seek>(reader: &mut R) -> Result<FileMetadata> {
    read_file_metadata_with_options(reader, &ReadOptions::default())
}

/// Read the Arrow IPC file's metadata, ending at [`ReadOptions::footer_offset`] when set.
pub fn read_file_metadata_with_options<R: Read + Seek>(
    reader: &mut R,
    options: &ReadOptions,
) -> Result<FileMetadata> {
    let end = match options.footer_offset {
        Some(end) => end,
        None => reader.seek(SeekFrom::End(0))?,
    };
    let footer_len = read_footer_len(reader, end, options.footer_offset.is_none())?;

    reader.seek(SeekFrom::Start(end - 10 - footer_len as u64))?;
    let mut footer = vec![];
    footer.try_reserve(footer_len)?;
    reader
        .by_ref()
        .take(footer_len as u64)
        .read_to_end(&mut footer)?;

    let metadata = deserialize_footer(&footer, end, options)?;
    tracing::debug!(
        batches = metadata.blocks.len(),
        dictionaries = metadata.dictionary_blocks().len(),
        "read file footer"
    );
    Ok(metadata)
}

/// Reads the message of `block` into `metadata_buffer`, returning its body.
fn read_block<R: Read + Seek>(
    reader: &mut R,
    block: &Block,
    metadata_buffer: &mut Vec<u8>,
) -> Result<crate::buffer::Buffer> {
    let offset: u64 = block
        .offset
        .try_into()
        .map_err(|_| Error::from(OutOfSpecKind::UnexpectedNegativeInteger))?;
    let meta_data_length: u64 = block
        .meta_data_length
        .try_into()
        .map_err(|_| Error::from(OutOfSpecKind::UnexpectedNegativeInteger))?;

    reader.seek(SeekFrom::Start(offset))?;
    read_metadata(reader, metadata_buffer)?
        .ok_or_else(|| Error::oos("IPC: a block of the file points to an end-of-stream marker"))?;
    let message = parse_message(metadata_buffer)?;
    let length = body_length(&message)?;
    if block.body_length != length as i64 {
        return Err(Error::oos(format!(
            "IPC: the block declares a body of {} bytes but its message one of {length}",
            block.body_length
        )));
    }

    reader.seek(SeekFrom::Start(offset + meta_data_length))?;
    read_body(reader, length)
}

/// Reads all dictionaries of the file. Delta dictionaries extend the one of their id;
/// replacing a dictionary is an error.
pub fn read_file_dictionaries<R: Read + Seek>(
    reader: &mut R,
    metadata: &FileMetadata,
    options: &ReadOptions,
) -> Result<Dictionaries> {
    let mut dictionaries = Default::default();
    let mut metadata_buffer = vec![];

    for block in metadata.dictionary_blocks() {
        let body = read_block(reader, block, &mut metadata_buffer)?;
        let message = parse_message(&metadata_buffer)?;
        match header(&message)? {
            MessageHeaderRef::DictionaryBatch(batch) => read_dictionary(
                batch,
                body,
                &metadata.schema.fields,
                &metadata.ipc_schema,
                &mut dictionaries,
                metadata.version,
                options,
                true,
            )?,
            _ => return Err(Error::from(OutOfSpecKind::UnexpectedMessageType)),
        }
    }
    Ok(dictionaries)
}

/// Reads the record batch at `index` of the file.
#[allow(clippy::too_many_arguments)]
pub(super) fn read_batch<R: Read + Seek>(
    reader: &mut R,
    dictionaries: &Dictionaries,
    metadata: &FileMetadata,
    projection: Option<&[usize]>,
    schema: Arc<Schema>,
    index: usize,
    options: &ReadOptions,
    metadata_buffer: &mut Vec<u8>,
) -> Result<RecordBatch> {
    let block = metadata.blocks.get(index).ok_or_else(|| {
        Error::InvalidArgumentError(format!(
            "The file has {} record batches but the batch {index} was requested",
            metadata.blocks.len()
        ))
    })?;
    let body = read_block(reader, block, metadata_buffer)?;
    let message = parse_message(metadata_buffer)?;

    match header(&message)? {
        MessageHeaderRef::RecordBatch(batch) => read_record_batch(
            batch,
            body,
            &metadata.schema.fields,
            &metadata.ipc_schema,
            projection,
            schema,
            dictionaries,
            message.version()?,
            options,
        ),
        _ => Err(Error::from(OutOfSpecKind::UnexpectedMessageType)),
    }
}
