use std::io::Cursor;
use std::sync::Arc;

use arrow_ipc_codec::array::{Array, ArrayRef};
use arrow_ipc_codec::datatypes::{
    DataType, Field, IntegerType, IntervalUnit, Metadata, Schema, TimeUnit, UnionMode,
};
use arrow_ipc_codec::error::Result;
use arrow_ipc_codec::io::ipc::read::{read_file_metadata, FileReader};
use arrow_ipc_codec::io::ipc::write::{FileWriter, StreamWriter, WriteOptions};
use arrow_ipc_codec::record_batch::RecordBatch;
use arrow_ipc_codec::types::months_days_ns;

fn int_field(name: &str) -> Field {
    Field::new(name, DataType::Int32, true)
}

fn list(data_type: fn(Box<Field>) -> DataType) -> DataType {
    data_type(Box::new(int_field("item")))
}

fn values() -> ArrayRef {
    Array::from_opt(&[Some(1i32), None, Some(3), Some(4), Some(5)]).arced()
}

fn nested_columns() -> Result<Vec<(Field, ArrayRef)>> {
    let list_validity: &[bool] = &[true, false, true];

    let fsl_type = DataType::FixedSizeList(Box::new(int_field("item")), 2);
    let fsl = Array::new_fixed_size_list(
        fsl_type.clone(),
        Array::from_slice(&[1i32, 2, 3, 4, 5, 6]).arced(),
        Some(list_validity),
    )?;

    let struct_fields = vec![
        Field::new("a", DataType::Boolean, true),
        Field::new("b", DataType::Utf8, false),
    ];
    let struct_type = DataType::Struct(struct_fields);
    let struct_ = Array::new_struct(
        struct_type.clone(),
        vec![
            Array::from_bools(&[Some(true), None, Some(false)]).arced(),
            Array::from_strs(&[Some("x"), Some("y"), Some("z")]).arced(),
        ],
        Some(&[true, true, false]),
    )?;

    let entries_type = DataType::Struct(vec![
        Field::new("key", DataType::Utf8, false),
        Field::new("value", DataType::Int32, true),
    ]);
    let entries = Array::new_struct(
        entries_type.clone(),
        vec![
            Array::from_strs(&[Some("k1"), Some("k2"), Some("k3")]).arced(),
            Array::from_opt(&[Some(1i32), None, Some(3)]).arced(),
        ],
        None,
    )?;
    let map_type = DataType::Map(Box::new(Field::new("entries", entries_type, false)), false);
    let map = Array::new_map(map_type.clone(), &[0, 2, 2, 3], entries.arced(), Some(list_validity))?;

    let union_fields = vec![int_field("i"), Field::new("s", DataType::Utf8, true)];
    let sparse_type = DataType::Union(union_fields.clone(), None, UnionMode::Sparse);
    let sparse = Array::new_union(
        sparse_type.clone(),
        &[0, 1, 0],
        None,
        vec![
            Array::from_opt(&[Some(1i32), None, Some(3)]).arced(),
            Array::from_strs(&[Some("a"), Some("b"), None]).arced(),
        ],
    )?;
    let dense_type = DataType::Union(union_fields, Some(vec![5, 7]), UnionMode::Dense);
    let dense = Array::new_union(
        dense_type.clone(),
        &[7, 5, 7],
        Some(&[0, 0, 1]),
        vec![
            Array::from_opt(&[Some(10i32)]).arced(),
            Array::from_strs(&[Some("first"), None]).arced(),
        ],
    )?;

    let dictionary_type =
        DataType::Dictionary(IntegerType::Int16, Box::new(DataType::Utf8), false);
    let dictionary = Array::new_dictionary(
        dictionary_type.clone(),
        &Array::from_opt(&[Some(1i16), None, Some(0)]),
        Array::from_strs(&[Some("zero"), Some("one")]).arced(),
    )?;

    let ree_type = DataType::RunEndEncoded(
        Box::new(Field::new("run_ends", DataType::Int32, false)),
        Box::new(Field::new("values", DataType::Utf8, true)),
    );
    let ree = Array::new_run_end_encoded(
        ree_type.clone(),
        Array::from_slice(&[2i32, 3]).arced(),
        Array::from_strs(&[Some("run"), None]).arced(),
    )?;

    let list_of_dictionary_type = DataType::List(Box::new(Field::new(
        "item",
        DataType::Dictionary(IntegerType::UInt8, Box::new(DataType::Int64), true),
        true,
    )));
    let inner = Array::new_dictionary(
        DataType::Dictionary(IntegerType::UInt8, Box::new(DataType::Int64), true),
        &Array::from_slice(&[0u8, 1, 1, 0]),
        Array::from_slice(&[100i64, 200]).arced(),
    )?;
    let list_of_dictionary = Array::new_list(
        list_of_dictionary_type.clone(),
        &[0i32, 1, 1, 4],
        inner.arced(),
        None,
    )?;

    Ok(vec![
        (
            Field::new("list", list(DataType::List), true),
            Array::new_list(list(DataType::List), &[0i32, 2, 2, 5], values(), Some(list_validity))?
                .arced(),
        ),
        (
            Field::new("large_list", list(DataType::LargeList), true),
            Array::new_list(list(DataType::LargeList), &[0i64, 1, 3, 5], values(), None)?.arced(),
        ),
        (
            Field::new("list_view", list(DataType::ListView), true),
            Array::new_list_view(
                list(DataType::ListView),
                &[3i32, 0, 1],
                &[2i32, 0, 3],
                values(),
                Some(list_validity),
            )?
            .arced(),
        ),
        (
            Field::new("large_list_view", list(DataType::LargeListView), true),
            Array::new_list_view(
                list(DataType::LargeListView),
                &[0i64, 0, 2],
                &[5i64, 1, 1],
                values(),
                None,
            )?
            .arced(),
        ),
        (Field::new("fsl", fsl_type, true), fsl.arced()),
        (Field::new("struct", struct_type, true), struct_.arced()),
        (Field::new("map", map_type, true), map.arced()),
        (Field::new("sparse_union", sparse_type, true), sparse.arced()),
        (Field::new("dense_union", dense_type, true), dense.arced()),
        (Field::new("dictionary", dictionary_type, true), dictionary.arced()),
        (Field::new("ree", ree_type, true), ree.arced()),
        (
            Field::new("list_of_dictionary", list_of_dictionary_type, true),
            list_of_dictionary.arced(),
        ),
    ])
}

fn flat_columns() -> Result<Vec<(Field, ArrayRef)>> {
    let long = "a string that does not fit in a view";
    let binary: &[Option<&[u8]>] = &[Some(&b"ab"[..]), None, Some(&b""[..])];
    let views: &[Option<&[u8]>] = &[
        Some(long.as_bytes()),
        Some(&b"inline"[..]),
        Some(long.as_bytes()),
    ];

    let timestamp = DataType::Timestamp(TimeUnit::Microsecond, Some("+01:00".to_string()));
    let interval = DataType::Interval(IntervalUnit::MonthDayNano);

    Ok(vec![
        (Field::new("null", DataType::Null, true), Array::new_null(3).arced()),
        (
            Field::new("bool", DataType::Boolean, true),
            Array::from_bools(&[Some(true), None, Some(false)]).arced(),
        ),
        (
            Field::new("i8", DataType::Int8, true),
            Array::from_opt(&[Some(-1i8), None, Some(i8::MAX)]).arced(),
        ),
        (
            Field::new("u16", DataType::UInt16, false),
            Array::from_slice(&[0u16, 1, u16::MAX]).arced(),
        ),
        (
            Field::new("i64", DataType::Int64, true),
            Array::from_opt(&[Some(i64::MIN), Some(0), None]).arced(),
        ),
        (
            Field::new("f32", DataType::Float32, true),
            Array::from_opt(&[Some(f32::NAN), None, Some(1.5)]).arced(),
        ),
        (
            Field::new("f64", DataType::Float64, false),
            Array::from_slice(&[f64::MIN, -0.0, f64::INFINITY]).arced(),
        ),
        (
            Field::new("date32", DataType::Date32, true),
            Array::from_opt(&[Some(0i32), None, Some(19000)])
                .to(DataType::Date32)?
                .arced(),
        ),
        (
            Field::new("timestamp", timestamp.clone(), true),
            Array::from_opt(&[Some(1i64), Some(2), None])
                .to(timestamp)?
                .arced(),
        ),
        (
            Field::new("time64", DataType::Time64(TimeUnit::Nanosecond), true),
            Array::from_slice(&[1i64, 2, 3])
                .to(DataType::Time64(TimeUnit::Nanosecond))?
                .arced(),
        ),
        (
            Field::new("duration", DataType::Duration(TimeUnit::Second), true),
            Array::from_slice(&[-5i64, 0, 5])
                .to(DataType::Duration(TimeUnit::Second))?
                .arced(),
        ),
        (
            Field::new("decimal", DataType::Decimal(10, 2), true),
            Array::from_opt(&[Some(12345i128), None, Some(-1)])
                .to(DataType::Decimal(10, 2))?
                .arced(),
        ),
        (
            Field::new("interval", interval, true),
            Array::from_opt(&[
                Some(months_days_ns::new(1, 2, 3)),
                None,
                Some(months_days_ns::new(-1, 0, i64::MAX)),
            ])
            .arced(),
        ),
        (
            Field::new("utf8", DataType::Utf8, true),
            Array::from_strs(&[Some("hello"), None, Some("ñ")]).arced(),
        ),
        (
            Field::new("large_utf8", DataType::LargeUtf8, true),
            Array::from_large_strs(&[None, Some(""), Some("world")]).arced(),
        ),
        (
            Field::new("binary", DataType::Binary, true),
            Array::from_binary(DataType::Binary, binary)?.arced(),
        ),
        (
            Field::new("large_binary", DataType::LargeBinary, true),
            Array::from_binary(DataType::LargeBinary, binary)?.arced(),
        ),
        (
            Field::new("fixed_size_binary", DataType::FixedSizeBinary(3), true),
            Array::from_fixed_size_binary(3, &[Some(&b"abc"[..]), None, Some(&b"def"[..])])?.arced(),
        ),
        (
            Field::new("utf8_view", DataType::Utf8View, true),
            Array::from_str_views(&[Some(long), None, Some("short")]).arced(),
        ),
        (
            Field::new("binary_view", DataType::BinaryView, true),
            Array::from_views(DataType::BinaryView, views, 16)?.arced(),
        ),
    ])
}

/// A batch of 3 rows with a column of every supported type.
pub fn all_types_batch() -> Result<RecordBatch> {
    let (fields, columns): (Vec<_>, Vec<_>) = flat_columns()?
        .into_iter()
        .chain(nested_columns()?)
        .unzip();
    let mut metadata = Metadata::new();
    metadata.insert("origin".to_string(), "tests".to_string());
    let schema = Schema::from(fields).with_metadata(metadata);
    RecordBatch::try_new(Arc::new(schema), columns)
}

/// A batch with a single nullable `Int32` column.
pub fn int_batch(values: &[Option<i32>]) -> Result<RecordBatch> {
    let schema = Schema::from(vec![Field::new("a", DataType::Int32, true)]);
    RecordBatch::try_new(Arc::new(schema), vec![Array::from_opt(values).arced()])
}

/// A batch with a single column of strings dictionary-encoded with `dictionary`.
pub fn dictionary_batch(keys: &[Option<i32>], dictionary: &[Option<&str>]) -> Result<RecordBatch> {
    let data_type = DataType::Dictionary(IntegerType::Int32, Box::new(DataType::Utf8), false);
    let array = Array::new_dictionary(
        data_type.clone(),
        &Array::from_opt(keys),
        Array::from_strs(dictionary).arced(),
    )?;
    let schema = Schema::from(vec![Field::new("dictionary", data_type, true)]);
    RecordBatch::try_new(Arc::new(schema), vec![array.arced()])
}

/// Writes `batches` to an Arrow file.
pub fn write_file(batches: &[RecordBatch], schema: &Schema, options: WriteOptions) -> Result<Vec<u8>> {
    let mut writer = FileWriter::try_new(vec![], schema, None, options)?;
    for batch in batches {
        writer.write(batch, None)?;
    }
    writer.finish()?;
    Ok(writer.into_inner())
}

/// Writes `batches` to an Arrow stream.
pub fn write_stream(
    batches: &[RecordBatch],
    schema: &Schema,
    options: WriteOptions,
) -> Result<Vec<u8>> {
    let mut writer = StreamWriter::new(vec![], options);
    writer.start(schema, None)?;
    for batch in batches {
        writer.write(batch, None)?;
    }
    writer.finish()?;
    Ok(writer.into_inner())
}

/// Reads every batch of an Arrow file.
pub fn read_file(bytes: Vec<u8>) -> Result<Vec<RecordBatch>> {
    let mut reader = Cursor::new(bytes);
    let metadata = read_file_metadata(&mut reader)?;
    let reader = FileReader::try_new(reader, metadata, None, Default::default())?;
    reader.collect()
}

/// Asserts that `batches` are read back unchanged from a file written with `options`.
pub fn round_trip_file(batches: Vec<RecordBatch>, options: WriteOptions) -> Result<()> {
    let schema = batches[0].schema().clone();
    let bytes = write_file(&batches, &schema, options)?;
    let result = read_file(bytes)?;
    assert_eq!(result, batches);
    Ok(())
}
