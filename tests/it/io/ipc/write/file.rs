use std::io::Cursor;
use std::sync::Arc;

use arrow_format::ipc::planus::ReadAsRoot;
use arrow_format::ipc::MessageRef;

use arrow_ipc_codec::array::Array;
use arrow_ipc_codec::datatypes::{DataType, Field, Schema};
use arrow_ipc_codec::error::{Error, Result};
use arrow_ipc_codec::io::ipc::read::read_file_metadata;
use arrow_ipc_codec::io::ipc::write::*;
use arrow_ipc_codec::io::ipc::ARROW_MAGIC;
use arrow_ipc_codec::record_batch::RecordBatch;

use crate::io::ipc::common::{
    all_types_batch, dictionary_batch, int_batch, read_file, round_trip_file, write_file,
};

#[test]
fn all_types() -> Result<()> {
    round_trip_file(vec![all_types_batch()?], Default::default())
}

#[test]
fn many_batches() -> Result<()> {
    let batch = all_types_batch()?;
    round_trip_file(vec![batch.clone(), batch.clone(), batch], Default::default())
}

#[cfg(feature = "io_ipc_compression")]
#[test]
fn all_types_lz4() -> Result<()> {
    let options = WriteOptions {
        compression: Some(Compression::LZ4),
        ..Default::default()
    };
    round_trip_file(vec![all_types_batch()?], options)
}

#[cfg(feature = "io_ipc_compression")]
#[test]
fn all_types_zstd() -> Result<()> {
    let options = WriteOptions {
        compression: Some(Compression::ZSTD),
        compression_workers: 4,
        ..Default::default()
    };
    round_trip_file(vec![all_types_batch()?], options)
}

#[cfg(feature = "io_ipc_compression")]
#[test]
fn min_space_savings() -> Result<()> {
    let values = (0..1000).map(|x| Some(x % 7)).collect::<Vec<_>>();
    let options = WriteOptions {
        compression: Some(Compression::ZSTD),
        min_space_savings: Some(0.1),
        ..Default::default()
    };
    round_trip_file(vec![int_batch(&values)?, int_batch(&[Some(1)])?], options)
}

fn sliced(batch: &RecordBatch, offset: usize, length: usize) -> Result<RecordBatch> {
    let columns = batch
        .columns()
        .iter()
        .map(|column| column.as_ref().clone().sliced(offset, length).arced())
        .collect();
    RecordBatch::try_new_with_length(batch.schema().clone(), columns, length)
}

#[test]
fn sliced_batch() -> Result<()> {
    round_trip_file(vec![sliced(&all_types_batch()?, 1, 2)?], Default::default())
}

#[test]
fn empty_batch() -> Result<()> {
    round_trip_file(vec![sliced(&all_types_batch()?, 0, 0)?], Default::default())
}

#[test]
fn no_batches() -> Result<()> {
    let batch = all_types_batch()?;
    let bytes = write_file(&[], batch.schema(), Default::default())?;
    assert_eq!(&bytes[..6], &ARROW_MAGIC);
    assert_eq!(&bytes[bytes.len() - 6..], &ARROW_MAGIC);
    assert!(read_file(bytes)?.is_empty());
    Ok(())
}

#[test]
fn all_nulls() -> Result<()> {
    round_trip_file(vec![int_batch(&[None, None, None])?], Default::default())
}

#[test]
fn blocks_are_aligned() -> Result<()> {
    let batch = all_types_batch()?;
    let mut writer = FileWriter::try_new(vec![], batch.schema(), None, Default::default())?;
    writer.write(&batch, None)?;
    writer.write(&sliced(&batch, 1, 1)?, None)?;
    writer.finish()?;

    // 2 dictionaries
    assert_eq!(writer.dictionary_blocks().len(), 2);
    assert_eq!(writer.record_blocks().len(), 2);
    for block in writer.dictionary_blocks().iter().chain(writer.record_blocks()) {
        assert_eq!(block.offset % 8, 0);
        assert_eq!(block.meta_data_length % 8, 0);
        assert_eq!(block.body_length % 64, 0);
    }
    Ok(())
}

#[test]
fn custom_alignment() -> Result<()> {
    let options = WriteOptions {
        alignment: 8,
        ..Default::default()
    };
    round_trip_file(vec![all_types_batch()?], options)
}

#[test]
fn invalid_alignment() -> Result<()> {
    let batch = int_batch(&[Some(1)])?;
    let options = WriteOptions {
        alignment: 12,
        ..Default::default()
    };
    let result = FileWriter::try_new(vec![], batch.schema(), None, options);
    assert!(matches!(result, Err(Error::InvalidArgumentError(_))));
    Ok(())
}

#[test]
fn finish_is_idempotent() -> Result<()> {
    let batch = int_batch(&[Some(1), None])?;
    let mut writer = FileWriter::try_new(vec![], batch.schema(), None, Default::default())?;
    writer.write(&batch, None)?;
    writer.finish()?;
    writer.finish()?;
    assert!(writer.write(&batch, None).is_err());
    assert_eq!(read_file(writer.into_inner())?, vec![batch]);
    Ok(())
}

#[test]
fn schema_mismatch() -> Result<()> {
    let batch = int_batch(&[Some(1)])?;
    let schema = Schema::from(vec![Field::new("b", DataType::Int32, true)]);
    let mut writer = FileWriter::try_new(vec![], &schema, None, Default::default())?;
    assert!(matches!(
        writer.write(&batch, None),
        Err(Error::SchemaMismatch(_))
    ));
    Ok(())
}

#[test]
fn size_limit() -> Result<()> {
    let schema = Arc::new(Schema::from(vec![Field::new("n", DataType::Null, true)]));
    let array = Array::new_null(i32::MAX as usize + 1);
    let batch = RecordBatch::try_new(schema.clone(), vec![array.arced()])?;

    let mut writer = FileWriter::try_new(vec![], &schema, None, Default::default())?;
    assert!(matches!(
        writer.write(&batch, None),
        Err(Error::SizeLimit(_))
    ));
    Ok(())
}

#[test]
fn dictionary_replacement_is_an_error() -> Result<()> {
    let first = dictionary_batch(&[Some(0), Some(1)], &[Some("a"), Some("b")])?;
    let second = dictionary_batch(&[Some(1)], &[Some("x"), Some("y")])?;

    let mut writer = FileWriter::try_new(vec![], first.schema(), None, Default::default())?;
    writer.write(&first, None)?;
    assert!(matches!(
        writer.write(&second, None),
        Err(Error::InvalidArgumentError(_))
    ));
    // the failed batch left nothing behind
    writer.write(&first, None)?;
    writer.finish()?;
    assert_eq!(writer.dictionary_blocks().len(), 1);
    assert_eq!(read_file(writer.into_inner())?, vec![first.clone(), first]);
    Ok(())
}

#[test]
fn unchanged_dictionary_is_written_once() -> Result<()> {
    let first = dictionary_batch(&[Some(0), Some(1)], &[Some("a"), Some("b")])?;
    let second = dictionary_batch(&[None, Some(0)], &[Some("a"), Some("b")])?;

    let mut writer = FileWriter::try_new(vec![], first.schema(), None, Default::default())?;
    writer.write(&first, None)?;
    writer.write(&second, None)?;
    writer.finish()?;
    assert_eq!(writer.dictionary_blocks().len(), 1);
    assert_eq!(read_file(writer.into_inner())?, vec![first, second]);
    Ok(())
}

#[test]
fn dictionary_deltas() -> Result<()> {
    let first = dictionary_batch(&[Some(0), Some(1)], &[Some("a"), Some("b")])?;
    let second = dictionary_batch(&[Some(2), None], &[Some("a"), Some("b"), Some("c")])?;

    let options = WriteOptions {
        emit_dictionary_deltas: true,
        ..Default::default()
    };
    let mut writer = FileWriter::try_new(vec![], first.schema(), None, options)?;
    writer.write(&first, None)?;
    writer.write(&second, None)?;
    writer.finish()?;
    assert_eq!(writer.dictionary_blocks().len(), 2);
    assert_eq!(read_file(writer.into_inner())?, vec![first, second]);
    Ok(())
}

#[test]
fn footer_indexes_every_batch() -> Result<()> {
    let batches = (0..3)
        .map(|i| int_batch(&vec![Some(i); i as usize + 1]))
        .collect::<Result<Vec<_>>>()?;
    let bytes = write_file(&batches, batches[0].schema(), Default::default())?;
    let metadata = read_file_metadata(&mut Cursor::new(&bytes))?;
    assert_eq!(metadata.blocks.len(), 3);

    let mut previous = 0;
    for (block, batch) in metadata.blocks.iter().zip(batches.iter()) {
        assert!(block.offset > previous);
        previous = block.offset;

        let start = block.offset as usize;
        assert_eq!(&bytes[start..start + 4], &[0xff; 4]);
        let length = i32::from_le_bytes(bytes[start + 4..start + 8].try_into().unwrap());
        assert_eq!(length as i64 + 8, block.meta_data_length as i64);

        let meta = &bytes[start + 8..start + 8 + length as usize];
        let message = MessageRef::read_as_root(meta)?;
        assert_eq!(message.body_length()?, block.body_length);
        let record_batch = match message.header()? {
            Some(arrow_format::ipc::MessageHeaderRef::RecordBatch(record_batch)) => record_batch,
            _ => unreachable!(),
        };
        assert_eq!(record_batch.length()?, batch.num_rows() as i64);
    }
    Ok(())
}
