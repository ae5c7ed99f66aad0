use std::io::Cursor;

use arrow_ipc_codec::error::{Error, Result};
use arrow_ipc_codec::io::ipc::read::{read_stream_metadata, StreamReader, StreamState};
use arrow_ipc_codec::io::ipc::write::*;
use arrow_ipc_codec::record_batch::RecordBatch;

use crate::io::ipc::common::{all_types_batch, dictionary_batch, int_batch, write_stream};

fn read_stream(bytes: Vec<u8>) -> Result<Vec<RecordBatch>> {
    let mut reader = Cursor::new(bytes);
    let metadata = read_stream_metadata(&mut reader)?;
    let reader = StreamReader::try_new(reader, metadata, None, Default::default())?;
    reader
        .map(|state| state.map(StreamState::unwrap))
        .collect()
}

fn round_trip(batches: Vec<RecordBatch>, options: WriteOptions) -> Result<()> {
    let schema = batches[0].schema().clone();
    let bytes = write_stream(&batches, &schema, options)?;
    assert_eq!(read_stream(bytes)?, batches);
    Ok(())
}

#[test]
fn all_types() -> Result<()> {
    let batch = all_types_batch()?;
    round_trip(vec![batch.clone(), batch], Default::default())
}

#[cfg(feature = "io_ipc_compression")]
#[test]
fn all_types_lz4() -> Result<()> {
    let options = WriteOptions {
        compression: Some(Compression::LZ4),
        ..Default::default()
    };
    round_trip(vec![all_types_batch()?], options)
}

#[test]
fn ends_with_end_of_stream() -> Result<()> {
    let batch = int_batch(&[Some(1), None])?;
    let bytes = write_stream(&[batch.clone()], batch.schema(), Default::default())?;
    assert_eq!(&bytes[bytes.len() - 8..], &[0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0]);
    Ok(())
}

#[test]
fn dictionary_replacement() -> Result<()> {
    let first = dictionary_batch(&[Some(0), Some(1)], &[Some("a"), Some("b")])?;
    let second = dictionary_batch(&[Some(1), None], &[Some("x"), Some("y")])?;
    round_trip(vec![first, second], Default::default())
}

#[test]
fn dictionary_deltas() -> Result<()> {
    let first = dictionary_batch(&[Some(0), Some(1)], &[Some("a"), Some("b")])?;
    let second = dictionary_batch(&[Some(2), None], &[Some("a"), Some("b"), Some("c")])?;
    let options = WriteOptions {
        emit_dictionary_deltas: true,
        ..Default::default()
    };
    round_trip(vec![first, second], options)
}

#[test]
fn write_before_start() -> Result<()> {
    let batch = int_batch(&[Some(1)])?;
    let mut writer = StreamWriter::new(vec![], Default::default());
    assert!(matches!(
        writer.write(&batch, None),
        Err(Error::InvalidArgumentError(_))
    ));
    writer.start(batch.schema(), None)?;
    assert!(writer.start(batch.schema(), None).is_err());
    Ok(())
}

#[test]
fn write_after_finish() -> Result<()> {
    let batch = int_batch(&[Some(1)])?;
    let mut writer = StreamWriter::new(vec![], Default::default());
    writer.start(batch.schema(), None)?;
    writer.finish()?;
    writer.finish()?;
    assert!(writer.write(&batch, None).is_err());
    assert!(read_stream(writer.into_inner())?.is_empty());
    Ok(())
}
