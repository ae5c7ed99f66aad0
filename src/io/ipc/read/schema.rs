use arrow_format::ipc::planus::ReadAsRoot;
use arrow_format::ipc::{FieldRef, FixedSizeListRef, MapRef, TimeRef, TimestampRef, UnionRef};

use crate::datatypes::{
    get_extension, get_extension_type, DataType, Endianness, Extension, Field, IntegerType,
    IntervalUnit, Metadata, Schema, TimeUnit, UnionMode, EXTENSION_METADATA_KEY,
    EXTENSION_NAME_KEY,
};
use crate::error::{Error, Result};

use super::super::{IpcField, IpcSchema};
use super::{OutOfSpecKind, StreamMetadata};

fn try_unzip_vec<A, B, I: Iterator<Item = Result<(A, B)>>>(iter: I) -> Result<(Vec<A>, Vec<B>)> {
    let mut a = vec![];
    let mut b = vec![];
    for maybe_item in iter {
        let (a_i, b_i) = maybe_item?;
        a.push(a_i);
        b.push(b_i);
    }

    Ok((a, b))
}

/// Tracks how deep in the schema a field is.
#[derive(Debug, Clone, Copy)]
struct Depth {
    current: usize,
    max: usize,
}

impl Depth {
    fn child(self) -> Result<Self> {
        if self.current >= self.max {
            return Err(Error::RecursionLimit(self.max));
        }
        Ok(Self {
            current: self.current + 1,
            ..self
        })
    }
}

fn deserialize_field(ipc_field: FieldRef, depth: Depth) -> Result<(Field, IpcField)> {
    let mut metadata = read_metadata(&ipc_field)?;

    let extension = resolve_extension(get_extension(&metadata), &ipc_field, depth)?;
    if extension.is_some() {
        metadata.remove(EXTENSION_NAME_KEY);
        metadata.remove(EXTENSION_METADATA_KEY);
    }

    let (data_type, ipc_field_) = get_data_type(ipc_field, extension, true, depth)?;

    let field = Field {
        name: ipc_field
            .name()?
            .ok_or_else(|| Error::oos("Every field in IPC must have a name"))?
            .to_string(),
        data_type,
        is_nullable: ipc_field.nullable()?,
        metadata,
    };

    Ok((field, ipc_field_))
}

/// Returns the extension declared in the metadata of `field` iff it is registered and
/// accepts the field's storage type.
fn resolve_extension(extension: Extension, field: &FieldRef, depth: Depth) -> Result<Extension> {
    let (name, metadata) = match extension {
        Some(extension) => extension,
        None => return Ok(None),
    };
    let registered = match get_extension_type(&name) {
        Some(registered) => registered,
        None => {
            tracing::trace!(
                name = name.as_str(),
                "unregistered extension type read as its storage"
            );
            return Ok(None);
        }
    };
    let (storage, _) = get_data_type(*field, None, false, depth)?;
    if registered.accepts(&storage, metadata.as_deref()) {
        Ok(Some((name, metadata)))
    } else {
        Ok(None)
    }
}

fn read_metadata(field: &FieldRef) -> Result<Metadata> {
    Ok(if let Some(list) = field.custom_metadata()? {
        let mut metadata_map = Metadata::new();
        for kv in list {
            let kv = kv?;
            if let (Some(k), Some(v)) = (kv.key()?, kv.value()?) {
                metadata_map.insert(k.to_string(), v.to_string());
            }
        }
        metadata_map
    } else {
        Metadata::default()
    })
}

fn deserialize_integer(int: arrow_format::ipc::IntRef) -> Result<IntegerType> {
    Ok(match (int.bit_width()?, int.is_signed()?) {
        (8, true) => IntegerType::Int8,
        (8, false) => IntegerType::UInt8,
        (16, true) => IntegerType::Int16,
        (16, false) => IntegerType::UInt16,
        (32, true) => IntegerType::Int32,
        (32, false) => IntegerType::UInt32,
        (64, true) => IntegerType::Int64,
        (64, false) => IntegerType::UInt64,
        _ => {
            return Err(Error::oos(
                "IPC: indexType can only be 8, 16, 32 or 64.",
            ))
        }
    })
}

fn deserialize_timeunit(time_unit: arrow_format::ipc::TimeUnit) -> TimeUnit {
    use arrow_format::ipc::TimeUnit::*;
    match time_unit {
        Second => TimeUnit::Second,
        Millisecond => TimeUnit::Millisecond,
        Microsecond => TimeUnit::Microsecond,
        Nanosecond => TimeUnit::Nanosecond,
    }
}

fn deserialize_time(time: TimeRef) -> Result<(DataType, IpcField)> {
    let unit = deserialize_timeunit(time.unit()?);

    let data_type = match (time.bit_width()?, unit) {
        (32, TimeUnit::Second) => DataType::Time32(TimeUnit::Second),
        (32, TimeUnit::Millisecond) => DataType::Time32(TimeUnit::Millisecond),
        (64, TimeUnit::Microsecond) => DataType::Time64(TimeUnit::Microsecond),
        (64, TimeUnit::Nanosecond) => DataType::Time64(TimeUnit::Nanosecond),
        (bits, precision) => {
            return Err(Error::nyi(format!(
                "Time type with bit width of {bits} and unit of {precision:?}"
            )))
        }
    };
    Ok((data_type, IpcField::default()))
}

fn deserialize_timestamp(timestamp: TimestampRef) -> Result<(DataType, IpcField)> {
    let timezone = timestamp.timezone()?.map(|tz| tz.to_string());
    let time_unit = deserialize_timeunit(timestamp.unit()?);
    Ok((DataType::Timestamp(time_unit, timezone), IpcField::default()))
}

fn deserialize_children(field: FieldRef, depth: Depth) -> Result<(Vec<Field>, IpcField)> {
    let depth = depth.child()?;
    let (fields, ipc_fields) = match field.children()? {
        Some(children) => try_unzip_vec(
            children
                .iter()
                .map(|field| deserialize_field(field?, depth)),
        )?,
        None => (vec![], vec![]),
    };
    Ok((
        fields,
        IpcField {
            fields: ipc_fields,
            dictionary_id: None,
        },
    ))
}

/// The single child of a list-like field.
fn deserialize_child(
    field: FieldRef,
    depth: Depth,
    what: &str,
) -> Result<(Box<Field>, IpcField)> {
    let (mut fields, ipc_field) = deserialize_children(field, depth)?;
    if fields.len() != 1 {
        return Err(Error::oos(format!("IPC: {what} must contain one child")));
    }
    Ok((Box::new(fields.remove(0)), ipc_field))
}

fn deserialize_union(
    union_: UnionRef,
    field: FieldRef,
    depth: Depth,
) -> Result<(DataType, IpcField)> {
    let mode = UnionMode::sparse(union_.mode()? == arrow_format::ipc::UnionMode::Sparse);
    let ids = union_.type_ids()?.map(|x| x.iter().collect());

    let (fields, ipc_field) = deserialize_children(field, depth)?;
    if fields.is_empty() {
        return Err(Error::oos("IPC: Union must contain at least one child"));
    }
    Ok((DataType::Union(fields, ids, mode), ipc_field))
}

fn deserialize_map(map: MapRef, field: FieldRef, depth: Depth) -> Result<(DataType, IpcField)> {
    let is_sorted = map.keys_sorted()?;
    let (field, ipc_field) = deserialize_child(field, depth, "Map")?;
    Ok((DataType::Map(field, is_sorted), ipc_field))
}

fn deserialize_fixed_size_list(
    list: FixedSizeListRef,
    field: FieldRef,
    depth: Depth,
) -> Result<(DataType, IpcField)> {
    let (field, ipc_field) = deserialize_child(field, depth, "FixedSizeList")?;
    let size = list
        .list_size()?
        .try_into()
        .map_err(|_| Error::from(OutOfSpecKind::UnexpectedNegativeInteger))?;
    Ok((DataType::FixedSizeList(field, size), ipc_field))
}

fn deserialize_run_end_encoded(field: FieldRef, depth: Depth) -> Result<(DataType, IpcField)> {
    let (mut fields, ipc_field) = deserialize_children(field, depth)?;
    if fields.len() != 2 {
        return Err(Error::oos(
            "IPC: RunEndEncoded must contain two children",
        ));
    }
    let values = fields.remove(1);
    let run_ends = fields.remove(0);
    if !matches!(
        run_ends.data_type(),
        DataType::Int16 | DataType::Int32 | DataType::Int64
    ) {
        return Err(Error::oos(
            "IPC: the run ends of RunEndEncoded must be Int16, Int32 or Int64",
        ));
    }
    Ok((
        DataType::RunEndEncoded(Box::new(run_ends), Box::new(values)),
        ipc_field,
    ))
}

fn to_usize(value: i32) -> Result<usize> {
    value
        .try_into()
        .map_err(|_| Error::from(OutOfSpecKind::UnexpectedNegativeInteger))
}

/// Get the Arrow data type from the flatbuffer Field table
fn get_data_type(
    field: FieldRef,
    extension: Extension,
    may_be_dictionary: bool,
    depth: Depth,
) -> Result<(DataType, IpcField)> {
    if let Some(dictionary) = field.dictionary()? {
        if may_be_dictionary {
            let int = dictionary
                .index_type()?
                .ok_or_else(|| Error::oos("indexType is mandatory in Dictionary."))?;
            let index_type = deserialize_integer(int)?;
            let (inner, mut ipc_field) = get_data_type(field, extension, false, depth)?;
            ipc_field.dictionary_id = Some(dictionary.id()?);
            return Ok((
                DataType::Dictionary(index_type, Box::new(inner), dictionary.is_ordered()?),
                ipc_field,
            ));
        }
    }

    if let Some(extension) = extension {
        let (name, metadata) = extension;
        let (data_type, fields) = get_data_type(field, None, false, depth)?;
        return Ok((DataType::Extension(name, Box::new(data_type), metadata), fields));
    }

    let type_ = field
        .type_()?
        .ok_or_else(|| Error::oos("IPC: field type is mandatory"))?;

    use arrow_format::ipc::TypeRef::*;
    Ok(match type_ {
        Null(_) => (DataType::Null, IpcField::default()),
        Bool(_) => (DataType::Boolean, IpcField::default()),
        Int(int) => {
            let data_type = deserialize_integer(int)?.into();
            (data_type, IpcField::default())
        }
        Binary(_) => (DataType::Binary, IpcField::default()),
        LargeBinary(_) => (DataType::LargeBinary, IpcField::default()),
        Utf8(_) => (DataType::Utf8, IpcField::default()),
        LargeUtf8(_) => (DataType::LargeUtf8, IpcField::default()),
        BinaryView(_) => (DataType::BinaryView, IpcField::default()),
        Utf8View(_) => (DataType::Utf8View, IpcField::default()),
        FixedSizeBinary(fixed) => (
            DataType::FixedSizeBinary(to_usize(fixed.byte_width()?)?),
            IpcField::default(),
        ),
        FloatingPoint(float) => {
            let data_type = match float.precision()? {
                arrow_format::ipc::Precision::Half => DataType::Float16,
                arrow_format::ipc::Precision::Single => DataType::Float32,
                arrow_format::ipc::Precision::Double => DataType::Float64,
            };
            (data_type, IpcField::default())
        }
        Date(date) => {
            let data_type = match date.unit()? {
                arrow_format::ipc::DateUnit::Day => DataType::Date32,
                arrow_format::ipc::DateUnit::Millisecond => DataType::Date64,
            };
            (data_type, IpcField::default())
        }
        Time(time) => deserialize_time(time)?,
        Timestamp(timestamp) => deserialize_timestamp(timestamp)?,
        Interval(interval) => {
            let data_type = match interval.unit()? {
                arrow_format::ipc::IntervalUnit::YearMonth => {
                    DataType::Interval(IntervalUnit::YearMonth)
                }
                arrow_format::ipc::IntervalUnit::DayTime => {
                    DataType::Interval(IntervalUnit::DayTime)
                }
                arrow_format::ipc::IntervalUnit::MonthDayNano => {
                    DataType::Interval(IntervalUnit::MonthDayNano)
                }
            };
            (data_type, IpcField::default())
        }
        Duration(duration) => {
            let time_unit = deserialize_timeunit(duration.unit()?);
            (DataType::Duration(time_unit), IpcField::default())
        }
        Decimal(decimal) => {
            let precision = to_usize(decimal.precision()?)?;
            let scale = to_usize(decimal.scale()?)?;

            let data_type = match decimal.bit_width()? {
                128 => DataType::Decimal(precision, scale),
                256 => DataType::Decimal256(precision, scale),
                _ => return Err(Error::from(OutOfSpecKind::InvalidDataType)),
            };

            (data_type, IpcField::default())
        }
        List(_) => {
            let (field, ipc_field) = deserialize_child(field, depth, "List")?;
            (DataType::List(field), ipc_field)
        }
        LargeList(_) => {
            let (field, ipc_field) = deserialize_child(field, depth, "LargeList")?;
            (DataType::LargeList(field), ipc_field)
        }
        ListView(_) => {
            let (field, ipc_field) = deserialize_child(field, depth, "ListView")?;
            (DataType::ListView(field), ipc_field)
        }
        LargeListView(_) => {
            let (field, ipc_field) = deserialize_child(field, depth, "LargeListView")?;
            (DataType::LargeListView(field), ipc_field)
        }
        FixedSizeList(list) => deserialize_fixed_size_list(list, field, depth)?,
        Struct(_) => {
            let (fields, ipc_field) = deserialize_children(field, depth)?;
            (DataType::Struct(fields), ipc_field)
        }
        Union(union_) => deserialize_union(union_, field, depth)?,
        Map(map) => deserialize_map(map, field, depth)?,
        RunEndEncoded(_) => deserialize_run_end_encoded(field, depth)?,
    })
}

/// Deserialize an flatbuffers-encoded Schema message into [`Schema`] and [`IpcSchema`].
pub fn deserialize_schema(message: &[u8]) -> Result<(Schema, IpcSchema)> {
    let message = arrow_format::ipc::MessageRef::read_as_root(message)
        .map_err(|err| Error::oos(format!("Unable deserialize message: {err:?}")))?;

    let schema = match message
        .header()?
        .ok_or_else(|| Error::from(OutOfSpecKind::MissingMessageHeader))?
    {
        arrow_format::ipc::MessageHeaderRef::Schema(schema) => schema,
        _ => return Err(Error::from(OutOfSpecKind::UnexpectedMessageType)),
    };

    fb_to_schema(schema, 64)
}

/// Deserialize the raw Schema table from IPC format to Schema data type
pub(super) fn fb_to_schema(
    schema: arrow_format::ipc::SchemaRef,
    max_recursion_depth: usize,
) -> Result<(Schema, IpcSchema)> {
    let depth = Depth {
        current: 0,
        max: max_recursion_depth,
    };
    let fields = schema
        .fields()?
        .ok_or_else(|| Error::from(OutOfSpecKind::MissingFields))?;
    let (fields, ipc_fields) = try_unzip_vec(
        fields
            .iter()
            .map(|field| deserialize_field(field?, depth)),
    )?;

    let endianness = match schema.endianness()? {
        arrow_format::ipc::Endianness::Little => Endianness::Little,
        arrow_format::ipc::Endianness::Big => Endianness::Big,
    };

    let mut metadata = Metadata::default();
    if let Some(md_fields) = schema.custom_metadata()? {
        for kv in md_fields {
            let kv = kv?;
            if let (Some(k), Some(v)) = (kv.key()?, kv.value()?) {
                metadata.insert(k.to_string(), v.to_string());
            }
        }
    }

    Ok((
        Schema {
            fields,
            metadata,
            endianness,
        },
        IpcSchema {
            fields: ipc_fields,
            endianness,
        },
    ))
}

pub(super) fn deserialize_stream_metadata(
    meta: &[u8],
    max_recursion_depth: usize,
) -> Result<StreamMetadata> {
    let message = arrow_format::ipc::MessageRef::read_as_root(meta)
        .map_err(|err| Error::from(OutOfSpecKind::InvalidFlatbufferMessage(err)))?;
    let version = message.version()?;
    // message header is a Schema, so read it
    let header = message
        .header()?
        .ok_or_else(|| Error::oos("Unable to read the first IPC message"))?;
    let schema = if let arrow_format::ipc::MessageHeaderRef::Schema(schema) = header {
        schema
    } else {
        return Err(Error::oos(
            "The first IPC message of the stream must be a schema",
        ));
    };
    let (schema, ipc_schema) = fb_to_schema(schema, max_recursion_depth)?;

    Ok(StreamMetadata {
        schema,
        version,
        ipc_schema,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ipc::write::{default_ipc_fields, schema_to_bytes};

    #[test]
    fn nested_round_trip() -> Result<()> {
        let dictionary = DataType::Dictionary(IntegerType::Int16, Box::new(DataType::Utf8), true);
        let schema = Schema::from(vec![
            Field::new(
                "a",
                DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".to_string())),
                true,
            ),
            Field::new(
                "b",
                DataType::Map(
                    Box::new(Field::new(
                        "entries",
                        DataType::Struct(vec![
                            Field::new("key", DataType::Utf8, false),
                            Field::new("value", dictionary, true),
                        ]),
                        false,
                    )),
                    false,
                ),
                true,
            ),
            Field::new(
                "c",
                DataType::RunEndEncoded(
                    Box::new(Field::new("run_ends", DataType::Int32, false)),
                    Box::new(Field::new("values", DataType::Decimal256(40, 2), true)),
                ),
                false,
            ),
        ]);
        let ipc_fields = default_ipc_fields(&schema.fields);
        let bytes = schema_to_bytes(&schema, &ipc_fields)?;
        let (read, ipc_schema) = deserialize_schema(&bytes)?;
        assert_eq!(read, schema);
        assert_eq!(ipc_schema.fields, ipc_fields);
        Ok(())
    }

    #[test]
    fn recursion_limit() -> Result<()> {
        let mut data_type = DataType::Int8;
        for _ in 0..5 {
            data_type = DataType::List(Box::new(Field::new("item", data_type, true)));
        }
        let schema = Schema::from(vec![Field::new("a", data_type, true)]);
        let bytes = schema_to_bytes(&schema, &default_ipc_fields(&schema.fields))?;
        let message = arrow_format::ipc::MessageRef::read_as_root(&bytes)?;
        let header = match message.header()? {
            Some(arrow_format::ipc::MessageHeaderRef::Schema(schema)) => schema,
            _ => unreachable!(),
        };
        assert!(matches!(fb_to_schema(header, 4), Err(Error::RecursionLimit(4))));
        assert!(fb_to_schema(header, 5).is_ok());
        Ok(())
    }
}
