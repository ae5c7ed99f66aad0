use arrow_format::ipc;
use arrow_format::ipc::planus::Builder;

use crate::datatypes::{
    DataType, Endianness, Field, IntegerType, IntervalUnit, Metadata, Schema, TimeUnit,
    UnionMode, EXTENSION_METADATA_KEY, EXTENSION_NAME_KEY,
};
use crate::error::{Error, Result};

use super::super::IpcField;

/// Converts a [Schema] and [IpcField]s to a flatbuffers-encoded [ipc::Message].
pub fn schema_to_bytes(schema: &Schema, ipc_fields: &[IpcField]) -> Result<Vec<u8>> {
    let schema = serialize_schema(schema, ipc_fields)?;

    let message = ipc::Message {
        version: ipc::MetadataVersion::V5,
        header: Some(ipc::MessageHeader::Schema(Box::new(schema))),
        body_length: 0,
        custom_metadata: None,
    };
    let mut builder = Builder::new();
    Ok(builder.finish(&message, None).to_vec())
}

/// Converts a [Schema] and its [IpcField]s to the flatbuffers' [ipc::Schema].
pub fn serialize_schema(schema: &Schema, ipc_fields: &[IpcField]) -> Result<ipc::Schema> {
    if schema.fields.len() != ipc_fields.len() {
        return Err(Error::InvalidArgumentError(format!(
            "The schema has {} fields but {} ipc fields were declared",
            schema.fields.len(),
            ipc_fields.len()
        )));
    }
    let endianness = match schema.endianness {
        Endianness::Little => ipc::Endianness::Little,
        Endianness::Big => ipc::Endianness::Big,
    };

    let fields = schema
        .fields
        .iter()
        .zip(ipc_fields.iter())
        .map(|(field, ipc_field)| serialize_field(field, ipc_field))
        .collect::<Result<Vec<_>>>()?;

    Ok(ipc::Schema {
        endianness,
        fields: Some(fields),
        custom_metadata: serialize_metadata(&schema.metadata, None),
        features: None,
    })
}

fn key_value(key: impl Into<String>, value: impl Into<String>) -> ipc::KeyValue {
    ipc::KeyValue {
        key: Some(key.into()),
        value: Some(value.into()),
    }
}

/// The custom metadata of a field: its own metadata (without the reserved extension keys),
/// followed by those of `extension` when set.
fn serialize_metadata(
    metadata: &Metadata,
    extension: Option<(&str, Option<&str>)>,
) -> Option<Vec<ipc::KeyValue>> {
    let mut custom_metadata = metadata
        .iter()
        .filter(|(k, _)| {
            extension.is_none()
                || (k.as_str() != EXTENSION_NAME_KEY && k.as_str() != EXTENSION_METADATA_KEY)
        })
        .map(|(k, v)| key_value(k.as_str(), v.as_str()))
        .collect::<Vec<_>>();

    if let Some((name, metadata)) = extension {
        if let Some(metadata) = metadata {
            custom_metadata.push(key_value(EXTENSION_METADATA_KEY, metadata));
        }
        custom_metadata.push(key_value(EXTENSION_NAME_KEY, name));
    }

    if custom_metadata.is_empty() {
        None
    } else {
        Some(custom_metadata)
    }
}

/// Create an IPC Field from an Arrow Field
pub(crate) fn serialize_field(field: &Field, ipc_field: &IpcField) -> Result<ipc::Field> {
    let extension = match field.data_type() {
        DataType::Extension(name, _, metadata) => Some((name.as_str(), metadata.as_deref())),
        _ => None,
    };
    let custom_metadata = serialize_metadata(&field.metadata, extension);

    let type_ = serialize_type(field.data_type())?;

    let dictionary = match field.data_type().to_logical_type() {
        DataType::Dictionary(index_type, _, is_ordered) => {
            let id = ipc_field.dictionary_id.ok_or_else(|| {
                Error::InvalidArgumentError(format!(
                    "The dictionary-encoded field \"{}\" has no dictionary id",
                    field.name
                ))
            })?;
            Some(Box::new(serialize_dictionary(index_type, id, *is_ordered)))
        }
        _ => None,
    };

    Ok(ipc::Field {
        name: Some(field.name.clone()),
        nullable: field.is_nullable,
        type_: Some(type_),
        dictionary,
        children: Some(serialize_children(field.data_type(), ipc_field)?),
        custom_metadata,
    })
}

fn serialize_time_unit(unit: &TimeUnit) -> ipc::TimeUnit {
    match unit {
        TimeUnit::Second => ipc::TimeUnit::Second,
        TimeUnit::Millisecond => ipc::TimeUnit::Millisecond,
        TimeUnit::Microsecond => ipc::TimeUnit::Microsecond,
        TimeUnit::Nanosecond => ipc::TimeUnit::Nanosecond,
    }
}

fn to_i32(value: usize, what: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| {
        Error::InvalidArgumentError(format!("The {what} {value} does not fit in an i32"))
    })
}

/// The flatbuffers' [ipc::Type] of `data_type`. Dictionaries are represented by the type
/// of their values and extensions by their storage type.
pub(crate) fn serialize_type(data_type: &DataType) -> Result<ipc::Type> {
    use DataType::*;
    Ok(match data_type {
        Null => ipc::Type::Null(Box::new(ipc::Null {})),
        Boolean => ipc::Type::Bool(Box::new(ipc::Bool {})),
        UInt8 => ipc::Type::Int(Box::new(ipc::Int {
            bit_width: 8,
            is_signed: false,
        })),
        UInt16 => ipc::Type::Int(Box::new(ipc::Int {
            bit_width: 16,
            is_signed: false,
        })),
        UInt32 => ipc::Type::Int(Box::new(ipc::Int {
            bit_width: 32,
            is_signed: false,
        })),
        UInt64 => ipc::Type::Int(Box::new(ipc::Int {
            bit_width: 64,
            is_signed: false,
        })),
        Int8 => ipc::Type::Int(Box::new(ipc::Int {
            bit_width: 8,
            is_signed: true,
        })),
        Int16 => ipc::Type::Int(Box::new(ipc::Int {
            bit_width: 16,
            is_signed: true,
        })),
        Int32 => ipc::Type::Int(Box::new(ipc::Int {
            bit_width: 32,
            is_signed: true,
        })),
        Int64 => ipc::Type::Int(Box::new(ipc::Int {
            bit_width: 64,
            is_signed: true,
        })),
        Float16 => ipc::Type::FloatingPoint(Box::new(ipc::FloatingPoint {
            precision: ipc::Precision::Half,
        })),
        Float32 => ipc::Type::FloatingPoint(Box::new(ipc::FloatingPoint {
            precision: ipc::Precision::Single,
        })),
        Float64 => ipc::Type::FloatingPoint(Box::new(ipc::FloatingPoint {
            precision: ipc::Precision::Double,
        })),
        Decimal(precision, scale) => ipc::Type::Decimal(Box::new(ipc::Decimal {
            precision: to_i32(*precision, "decimal precision")?,
            scale: to_i32(*scale, "decimal scale")?,
            bit_width: 128,
        })),
        Decimal256(precision, scale) => ipc::Type::Decimal(Box::new(ipc::Decimal {
            precision: to_i32(*precision, "decimal precision")?,
            scale: to_i32(*scale, "decimal scale")?,
            bit_width: 256,
        })),
        Binary => ipc::Type::Binary(Box::new(ipc::Binary {})),
        LargeBinary => ipc::Type::LargeBinary(Box::new(ipc::LargeBinary {})),
        Utf8 => ipc::Type::Utf8(Box::new(ipc::Utf8 {})),
        LargeUtf8 => ipc::Type::LargeUtf8(Box::new(ipc::LargeUtf8 {})),
        BinaryView => ipc::Type::BinaryView(Box::new(ipc::BinaryView {})),
        Utf8View => ipc::Type::Utf8View(Box::new(ipc::Utf8View {})),
        FixedSizeBinary(size) => ipc::Type::FixedSizeBinary(Box::new(ipc::FixedSizeBinary {
            byte_width: to_i32(*size, "fixed size")?,
        })),
        Date32 => ipc::Type::Date(Box::new(ipc::Date {
            unit: ipc::DateUnit::Day,
        })),
        Date64 => ipc::Type::Date(Box::new(ipc::Date {
            unit: ipc::DateUnit::Millisecond,
        })),
        Duration(unit) => ipc::Type::Duration(Box::new(ipc::Duration {
            unit: serialize_time_unit(unit),
        })),
        Time32(unit) => ipc::Type::Time(Box::new(ipc::Time {
            unit: serialize_time_unit(unit),
            bit_width: 32,
        })),
        Time64(unit) => ipc::Type::Time(Box::new(ipc::Time {
            unit: serialize_time_unit(unit),
            bit_width: 64,
        })),
        Timestamp(unit, tz) => ipc::Type::Timestamp(Box::new(ipc::Timestamp {
            unit: serialize_time_unit(unit),
            timezone: tz.clone(),
        })),
        Interval(unit) => ipc::Type::Interval(Box::new(ipc::Interval {
            unit: match unit {
                IntervalUnit::YearMonth => ipc::IntervalUnit::YearMonth,
                IntervalUnit::DayTime => ipc::IntervalUnit::DayTime,
                IntervalUnit::MonthDayNano => ipc::IntervalUnit::MonthDayNano,
            },
        })),
        List(_) => ipc::Type::List(Box::new(ipc::List {})),
        LargeList(_) => ipc::Type::LargeList(Box::new(ipc::LargeList {})),
        ListView(_) => ipc::Type::ListView(Box::new(ipc::ListView {})),
        LargeListView(_) => ipc::Type::LargeListView(Box::new(ipc::LargeListView {})),
        FixedSizeList(_, size) => ipc::Type::FixedSizeList(Box::new(ipc::FixedSizeList {
            list_size: to_i32(*size, "list size")?,
        })),
        Union(_, type_ids, mode) => ipc::Type::Union(Box::new(ipc::Union {
            mode: match mode {
                UnionMode::Dense => ipc::UnionMode::Dense,
                UnionMode::Sparse => ipc::UnionMode::Sparse,
            },
            type_ids: type_ids.clone(),
        })),
        Map(_, keys_sorted) => ipc::Type::Map(Box::new(ipc::Map {
            keys_sorted: *keys_sorted,
        })),
        Struct(_) => ipc::Type::Struct(Box::new(ipc::Struct {})),
        RunEndEncoded(_, _) => ipc::Type::RunEndEncoded(Box::new(ipc::RunEndEncoded {})),
        Dictionary(_, v, _) => serialize_type(v)?,
        Extension(_, v, _) => serialize_type(v)?,
    })
}

/// The children of a field of `data_type`. The children of a dictionary-encoded field are
/// those of its values, whose [`IpcField`]s are the children of `ipc_field`.
fn serialize_children(data_type: &DataType, ipc_field: &IpcField) -> Result<Vec<ipc::Field>> {
    let data_type = match data_type.to_logical_type() {
        DataType::Dictionary(_, values, _) => values.as_ref(),
        other => other,
    };
    let children = data_type.children();
    if children.len() != ipc_field.fields.len() {
        return Err(Error::InvalidArgumentError(format!(
            "A field of type {data_type:?} must have {} ipc fields but it has {}",
            children.len(),
            ipc_field.fields.len()
        )));
    }
    children
        .into_iter()
        .zip(ipc_field.fields.iter())
        .map(|(field, ipc_field)| serialize_field(field, ipc_field))
        .collect()
}

/// Create an IPC dictionary encoding
fn serialize_dictionary(
    index_type: &IntegerType,
    dict_id: i64,
    dict_is_ordered: bool,
) -> ipc::DictionaryEncoding {
    use IntegerType::*;
    let is_signed = matches!(index_type, Int8 | Int16 | Int32 | Int64);

    let bit_width = match index_type {
        Int8 | UInt8 => 8,
        Int16 | UInt16 => 16,
        Int32 | UInt32 => 32,
        Int64 | UInt64 => 64,
    };

    let index_type = ipc::Int {
        bit_width,
        is_signed,
    };

    ipc::DictionaryEncoding {
        id: dict_id,
        index_type: Some(Box::new(index_type)),
        is_ordered: dict_is_ordered,
        dictionary_kind: ipc::DictionaryKind::DenseArray,
    }
}

fn default_ipc_field(data_type: &DataType, current_id: &mut i64) -> IpcField {
    use DataType::*;
    match data_type.to_logical_type() {
        Dictionary(_, values, _) => {
            let dictionary_id = Some(*current_id);
            *current_id += 1;
            IpcField {
                fields: values
                    .children()
                    .iter()
                    .map(|field| default_ipc_field(field.data_type(), current_id))
                    .collect(),
                dictionary_id,
            }
        }
        other => IpcField {
            fields: other
                .children()
                .iter()
                .map(|field| default_ipc_field(field.data_type(), current_id))
                .collect(),
            dictionary_id: None,
        },
    }
}

/// Assigns every dictionary-encoded field of `fields` a distinct id, in depth-first order
/// starting at 0.
pub fn default_ipc_fields(fields: &[Field]) -> Vec<IpcField> {
    let mut dictionary_id = 0i64;
    fields
        .iter()
        .map(|field| default_ipc_field(field.data_type(), &mut dictionary_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dictionary_ids_are_depth_first() {
        let dictionary = DataType::Dictionary(IntegerType::Int32, Box::new(DataType::Utf8), false);
        let fields = vec![
            Field::new("a", dictionary.clone(), true),
            Field::new(
                "b",
                DataType::Struct(vec![
                    Field::new("c", DataType::Int32, true),
                    Field::new("d", dictionary, true),
                ]),
                true,
            ),
        ];
        let ipc_fields = default_ipc_fields(&fields);
        assert_eq!(ipc_fields[0].dictionary_id, Some(0));
        assert_eq!(ipc_fields[1].dictionary_id, None);
        assert_eq!(ipc_fields[1].fields[0].dictionary_id, None);
        assert_eq!(ipc_fields[1].fields[1].dictionary_id, Some(1));
    }

    #[test]
    fn extension_keys_are_written() -> Result<()> {
        let data_type = DataType::Extension(
            "a.b".to_string(),
            Box::new(DataType::Int32),
            Some("m".to_string()),
        );
        let field = serialize_field(&Field::new("x", data_type, false), &IpcField::default())?;
        let metadata = field.custom_metadata.unwrap();
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata[0].value.as_deref(), Some("m"));
        assert_eq!(metadata[1].key.as_deref(), Some(EXTENSION_NAME_KEY));
        assert!(matches!(field.type_, Some(ipc::Type::Int(_))));
        Ok(())
    }

    #[test]
    fn missing_dictionary_id() {
        let data_type = DataType::Dictionary(IntegerType::UInt8, Box::new(DataType::Utf8), false);
        let field = Field::new("x", data_type, false);
        assert!(serialize_field(&field, &IpcField::default()).is_err());
    }
}
