use std::io::Cursor;
use std::sync::Arc;

use arrow_ipc_codec::array::Array;
use arrow_ipc_codec::datatypes::{
    register_extension_type, DataType, Endianness, ExtensionType, Field, Schema,
    EXTENSION_NAME_KEY,
};
use arrow_ipc_codec::error::{Error, Result};
use arrow_ipc_codec::io::ipc::read::*;
use arrow_ipc_codec::record_batch::RecordBatch;

use crate::io::ipc::common::{all_types_batch, int_batch, read_file, write_file};

fn other_endianness() -> Endianness {
    match Endianness::native() {
        Endianness::Little => Endianness::Big,
        Endianness::Big => Endianness::Little,
    }
}

fn all_types_file() -> Result<(RecordBatch, Vec<u8>)> {
    let batch = all_types_batch()?;
    let bytes = write_file(&[batch.clone()], batch.schema(), Default::default())?;
    Ok((batch, bytes))
}

#[test]
fn metadata() -> Result<()> {
    let (batch, bytes) = all_types_file()?;
    let metadata = read_file_metadata(&mut Cursor::new(bytes))?;
    assert_eq!(&metadata.schema, batch.schema().as_ref());
    assert_eq!(metadata.blocks.len(), 1);
    assert_eq!(metadata.dictionary_blocks().len(), 2);
    assert_eq!(metadata.ipc_schema.endianness, Endianness::native());
    Ok(())
}

#[test]
fn projection() -> Result<()> {
    let (batch, bytes) = all_types_file()?;
    let mut reader = Cursor::new(bytes);
    let metadata = read_file_metadata(&mut reader)?;
    let mut reader = FileReader::try_new(reader, metadata, Some(vec![1, 3, 29]), Default::default())?;

    let result = reader.next().unwrap()?;
    assert!(reader.next().is_none());

    let fields = &reader.schema().fields;
    assert_eq!(fields.len(), 3);
    assert_eq!(fields[0].name, "bool");
    assert_eq!(fields[1].name, "u16");
    assert_eq!(fields[2].name, batch.schema().fields[29].name);
    assert_eq!(result.columns()[0], batch.columns()[1]);
    assert_eq!(result.columns()[1], batch.columns()[3]);
    assert_eq!(result.columns()[2], batch.columns()[29]);
    Ok(())
}

#[test]
fn invalid_projection() -> Result<()> {
    let (_, bytes) = all_types_file()?;
    let mut reader = Cursor::new(bytes);
    let metadata = read_file_metadata(&mut reader)?;

    let result = FileReader::try_new(reader, metadata.clone(), Some(vec![3, 1]), Default::default());
    assert!(matches!(result, Err(Error::InvalidArgumentError(_))));

    let reader = Cursor::new(vec![]);
    let result = FileReader::try_new(reader, metadata, Some(vec![1000]), Default::default());
    assert!(matches!(result, Err(Error::InvalidArgumentError(_))));
    Ok(())
}

#[test]
fn random_access() -> Result<()> {
    let batches = (0..3)
        .map(|i| int_batch(&[Some(i), None, Some(i * 10)]))
        .collect::<Result<Vec<_>>>()?;
    let bytes = write_file(&batches, batches[0].schema(), Default::default())?;

    let mut reader = Cursor::new(bytes);
    let metadata = read_file_metadata(&mut reader)?;
    let mut reader = FileReader::try_new(reader, metadata, None, Default::default())?;
    assert_eq!(reader.num_record_batches(), 3);
    assert_eq!(reader.read_record_batch(2)?, batches[2]);
    assert_eq!(reader.read_record_batch(0)?, batches[0]);
    assert!(reader.read_record_batch(3).is_err());
    Ok(())
}

#[test]
fn footer_offset() -> Result<()> {
    let (batch, mut bytes) = all_types_file()?;
    let end = bytes.len() as u64;
    bytes.extend_from_slice(b"trailing bytes of a container");

    let mut reader = Cursor::new(bytes);
    let options = ReadOptions {
        footer_offset: Some(end),
        ..Default::default()
    };
    let metadata = read_file_metadata_with_options(&mut reader, &options)?;
    let reader = FileReader::try_new(reader, metadata, None, options)?;
    assert_eq!(reader.collect::<Result<Vec<_>>>()?, vec![batch]);
    Ok(())
}

#[test]
fn trailing_bytes_without_footer_offset() -> Result<()> {
    let (_, mut bytes) = all_types_file()?;
    bytes.extend_from_slice(&[0; 16]);
    assert!(matches!(
        read_file_metadata(&mut Cursor::new(bytes)),
        Err(Error::OutOfSpec(_))
    ));
    Ok(())
}

#[test]
fn invalid_magic() -> Result<()> {
    let (_, mut bytes) = all_types_file()?;
    bytes[0] = b'B';
    assert!(matches!(
        read_file_metadata(&mut Cursor::new(bytes)),
        Err(Error::OutOfSpec(_))
    ));
    Ok(())
}

#[test]
fn too_small() {
    let bytes = b"ARROW1ARROW1".to_vec();
    assert!(matches!(
        read_file_metadata(&mut Cursor::new(bytes)),
        Err(Error::OutOfSpec(_))
    ));
}

#[test]
fn expected_schema() -> Result<()> {
    let (batch, bytes) = all_types_file()?;

    let options = ReadOptions {
        expected_schema: Some(batch.schema().as_ref().clone()),
        ..Default::default()
    };
    read_file_metadata_with_options(&mut Cursor::new(bytes.clone()), &options)?;

    let options = ReadOptions {
        expected_schema: Some(Schema::from(vec![Field::new("a", DataType::Int32, true)])),
        ..Default::default()
    };
    assert!(matches!(
        read_file_metadata_with_options(&mut Cursor::new(bytes), &options),
        Err(Error::SchemaMismatch(_))
    ));
    Ok(())
}

#[test]
fn recursion_limit() -> Result<()> {
    let mut data_type = DataType::Int32;
    let mut array = Array::from_slice(&[1i32]);
    for _ in 0..5 {
        data_type = DataType::Struct(vec![Field::new("a", data_type, false)]);
        array = Array::new_struct(data_type.clone(), vec![array.arced()], None)?;
    }
    let schema = Arc::new(Schema::from(vec![Field::new("nested", data_type, false)]));
    let batch = RecordBatch::try_new(schema.clone(), vec![array.arced()])?;
    let bytes = write_file(&[batch.clone()], &schema, Default::default())?;
    assert_eq!(read_file(bytes.clone())?, vec![batch]);

    let options = ReadOptions {
        max_recursion_depth: 3,
        ..Default::default()
    };
    assert!(matches!(
        read_file_metadata_with_options(&mut Cursor::new(bytes), &options),
        Err(Error::RecursionLimit(3))
    ));
    Ok(())
}

#[test]
fn non_native_endianness() -> Result<()> {
    let batch = all_types_batch()?;
    let schema = batch.schema().as_ref().clone().with_endianness(other_endianness());
    let bytes = write_file(&[batch.clone()], &schema, Default::default())?;

    let mut reader = Cursor::new(bytes.clone());
    let metadata = read_file_metadata(&mut reader)?;
    assert_eq!(metadata.ipc_schema.endianness, other_endianness());
    let reader = FileReader::try_new(reader, metadata, None, Default::default())?;
    assert_eq!(reader.schema().endianness, Endianness::native());
    assert_eq!(reader.collect::<Result<Vec<_>>>()?, vec![batch.clone()]);

    // the arrays are kept in the order of the file
    let mut reader = Cursor::new(bytes);
    let metadata = read_file_metadata(&mut reader)?;
    let options = ReadOptions {
        ensure_native_endian: false,
        ..Default::default()
    };
    let mut reader = FileReader::try_new(reader, metadata, Some(vec![4]), options)?;
    assert_eq!(reader.schema().endianness, other_endianness());
    let result = reader.next().unwrap()?;
    let values = result.columns()[0].values::<i64>(0);
    assert_eq!(values[0], i64::MIN.swap_bytes());
    assert_eq!(values[1], 0);
    Ok(())
}

#[derive(Debug)]
struct Uuid;

impl ExtensionType for Uuid {
    fn name(&self) -> &str {
        "tests.uuid"
    }

    fn accepts(&self, storage: &DataType, _: Option<&str>) -> bool {
        storage == &DataType::FixedSizeBinary(16)
    }
}

fn extension_batch(name: &str) -> Result<RecordBatch> {
    let data_type = DataType::Extension(
        name.to_string(),
        Box::new(DataType::FixedSizeBinary(16)),
        Some("v1".to_string()),
    );
    let storage = Array::from_fixed_size_binary(16, &[Some(&[1u8; 16][..]), None])?;
    let array = Array::new_extension(data_type.clone(), &storage)?;
    let schema = Schema::from(vec![Field::new("id", data_type, true)]);
    RecordBatch::try_new(Arc::new(schema), vec![array.arced()])
}

#[test]
fn registered_extension() -> Result<()> {
    register_extension_type(Arc::new(Uuid))?;
    let batch = extension_batch("tests.uuid")?;
    let bytes = write_file(&[batch.clone()], batch.schema(), Default::default())?;
    assert_eq!(read_file(bytes)?, vec![batch]);
    Ok(())
}

#[test]
fn unregistered_extension() -> Result<()> {
    let batch = extension_batch("tests.unregistered")?;
    let bytes = write_file(&[batch.clone()], batch.schema(), Default::default())?;

    let result = read_file(bytes)?;
    let field = &result[0].schema().fields[0];
    assert_eq!(field.data_type, DataType::FixedSizeBinary(16));
    assert_eq!(
        field.metadata.get(EXTENSION_NAME_KEY).map(|x| x.as_str()),
        Some("tests.unregistered")
    );
    Ok(())
}
