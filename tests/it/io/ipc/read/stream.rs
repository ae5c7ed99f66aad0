use std::cell::Cell;
use std::io::{Cursor, Read};
use std::rc::Rc;

use arrow_ipc_codec::datatypes::Endianness;
use arrow_ipc_codec::error::{Error, Result};
use arrow_ipc_codec::io::ipc::read::*;
use arrow_ipc_codec::io::ipc::write::StreamWriter;

use crate::io::ipc::common::{all_types_batch, int_batch, write_stream};

#[test]
fn open() -> Result<()> {
    let batch = all_types_batch()?;
    let bytes = write_stream(&[batch.clone()], batch.schema(), Default::default())?;

    let mut reader = StreamReader::open(Cursor::new(bytes), None, Default::default())?;
    assert_eq!(reader.schema().map(|x| x.as_ref()), Some(batch.schema().as_ref()));
    assert_eq!(reader.next().unwrap()?.unwrap(), batch);
    assert!(reader.next().is_none());
    assert!(reader.is_finished());
    // a finished stream stays finished
    assert!(reader.next().is_none());
    Ok(())
}

#[test]
fn projection() -> Result<()> {
    let batch = all_types_batch()?;
    let bytes = write_stream(&[batch.clone()], batch.schema(), Default::default())?;

    let mut reader = Cursor::new(bytes);
    let metadata = read_stream_metadata(&mut reader)?;
    let mut reader = StreamReader::try_new(reader, metadata, Some(vec![0, 26, 31]), Default::default())?;
    let result = reader.next().unwrap()?.unwrap();
    assert_eq!(result.num_columns(), 3);
    assert_eq!(result.columns()[0], batch.columns()[0]);
    assert_eq!(result.columns()[1], batch.columns()[26]);
    assert_eq!(result.columns()[2], batch.columns()[31]);
    Ok(())
}

#[test]
fn invalid_projection() -> Result<()> {
    let batch = int_batch(&[Some(1)])?;
    let bytes = write_stream(&[batch.clone()], batch.schema(), Default::default())?;
    let result = StreamReader::open(Cursor::new(bytes), Some(vec![1]), Default::default());
    assert!(matches!(result, Err(Error::InvalidArgumentError(_))));
    Ok(())
}

#[test]
fn waiting_without_end_of_stream() -> Result<()> {
    let batch = int_batch(&[Some(1), None])?;
    let mut writer = StreamWriter::new(vec![], Default::default());
    writer.start(batch.schema(), None)?;
    writer.write(&batch, None)?;
    let bytes = writer.into_inner();

    let mut reader = StreamReader::open(Cursor::new(bytes), None, Default::default())?;
    assert_eq!(reader.next().unwrap()?, StreamState::Some(batch));
    assert_eq!(reader.next().unwrap()?, StreamState::Waiting);
    assert_eq!(reader.next().unwrap()?, StreamState::Waiting);
    assert!(!reader.is_finished());
    Ok(())
}

#[test]
fn delayed_schema() -> Result<()> {
    let options = ReadOptions {
        delay_schema_read: true,
        ..Default::default()
    };
    let mut reader = StreamReader::open(Cursor::new(vec![]), None, options.clone())?;
    assert!(reader.schema().is_none());
    assert_eq!(reader.next().unwrap()?, StreamState::Waiting);

    let batch = int_batch(&[Some(1), None])?;
    let bytes = write_stream(&[batch.clone()], batch.schema(), Default::default())?;
    let mut reader = StreamReader::open(Cursor::new(bytes), None, options)?;
    assert!(reader.metadata().is_none());
    assert_eq!(reader.next().unwrap()?.unwrap(), batch);
    assert!(reader.metadata().is_some());
    assert!(reader.next().is_none());
    Ok(())
}

#[test]
fn missing_schema() {
    let result = StreamReader::open(Cursor::new(vec![]), None, Default::default());
    assert!(result.is_err());

    let end_of_stream = vec![0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0];
    let result = read_stream_metadata(&mut Cursor::new(end_of_stream));
    assert!(matches!(result, Err(Error::OutOfSpec(_))));
}

#[test]
fn legacy_end_of_stream() -> Result<()> {
    let batch = int_batch(&[Some(1), Some(2)])?;
    let mut bytes = write_stream(&[batch.clone()], batch.schema(), Default::default())?;
    bytes.truncate(bytes.len() - 8);
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    // a message after the end of the stream is not read
    bytes.extend_from_slice(&[1, 2, 3]);

    let mut reader = StreamReader::open(Cursor::new(bytes), None, Default::default())?;
    assert_eq!(reader.next().unwrap()?.unwrap(), batch);
    assert!(reader.next().is_none());
    assert!(reader.is_finished());
    Ok(())
}

#[test]
fn expected_schema() -> Result<()> {
    let batch = int_batch(&[Some(1)])?;
    let bytes = write_stream(&[batch.clone()], batch.schema(), Default::default())?;
    let other = all_types_batch()?;
    let options = ReadOptions {
        expected_schema: Some(other.schema().as_ref().clone()),
        ..Default::default()
    };
    let result = StreamReader::open(Cursor::new(bytes), None, options);
    assert!(matches!(result, Err(Error::SchemaMismatch(_))));
    Ok(())
}

#[test]
fn non_native_endianness() -> Result<()> {
    let other = match Endianness::native() {
        Endianness::Little => Endianness::Big,
        Endianness::Big => Endianness::Little,
    };
    let batch = all_types_batch()?;
    let schema = batch.schema().as_ref().clone().with_endianness(other);
    let bytes = write_stream(&[batch.clone(), batch.clone()], &schema, Default::default())?;

    let mut reader = Cursor::new(bytes);
    let metadata = read_stream_metadata(&mut reader)?;
    assert_eq!(metadata.schema.endianness, other);
    let reader = StreamReader::try_new(reader, metadata, None, Default::default())?;
    let batches = reader
        .map(|state| state.map(StreamState::unwrap))
        .collect::<Result<Vec<_>>>()?;
    assert_eq!(batches, vec![batch.clone(), batch]);
    Ok(())
}

#[test]
fn truncated_body() -> Result<()> {
    let batch = int_batch(&[Some(1), Some(2)])?;
    let mut bytes = write_stream(&[batch.clone()], batch.schema(), Default::default())?;
    // drop the end-of-stream marker and part of the body
    bytes.truncate(bytes.len() - 8 - 4);

    let mut reader = StreamReader::open(Cursor::new(bytes), None, Default::default())?;
    assert!(reader.next().unwrap().is_err());
    Ok(())
}

/// A reader that only exposes the first `available` bytes of `data`, like a socket
/// whose peer has not sent everything yet.
struct Partial {
    data: Vec<u8>,
    position: usize,
    available: Rc<Cell<usize>>,
}

impl Read for Partial {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let end = self.available.get().min(self.data.len());
        let length = buf.len().min(end.saturating_sub(self.position));
        buf[..length].copy_from_slice(&self.data[self.position..self.position + length]);
        self.position += length;
        Ok(length)
    }
}

#[test]
fn partial_prefix_is_kept() -> Result<()> {
    let first = int_batch(&[Some(1), None])?;
    let second = int_batch(&[Some(2), Some(3), None])?;

    let mut writer = StreamWriter::new(vec![], Default::default());
    writer.start(first.schema(), None)?;
    writer.write(&first, None)?;
    let first_end = writer.into_inner().len();
    let bytes = write_stream(&[first.clone(), second.clone()], first.schema(), Default::default())?;

    let available = Rc::new(Cell::new(first_end + 2));
    let partial = Partial {
        data: bytes.clone(),
        position: 0,
        available: available.clone(),
    };
    let mut reader = StreamReader::open(partial, None, Default::default())?;
    assert_eq!(reader.next().unwrap()?, StreamState::Some(first));
    assert_eq!(reader.next().unwrap()?, StreamState::Waiting);

    // the continuation marker arrived but only half of the length
    available.set(first_end + 6);
    assert_eq!(reader.next().unwrap()?, StreamState::Waiting);

    available.set(bytes.len());
    assert_eq!(reader.next().unwrap()?, StreamState::Some(second));
    assert!(reader.next().is_none());
    assert!(reader.is_finished());
    Ok(())
}
