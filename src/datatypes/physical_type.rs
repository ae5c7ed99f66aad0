/// The set of physical types: unique in-memory representations of an Arrow array.
/// A physical type has a one-to-many relationship with a [`crate::datatypes::DataType`]
/// and declares the buffers of an [`crate::array::Array`] of that type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalType {
    /// A Null with no allocation.
    Null,
    /// A boolean represented as a single bit.
    Boolean,
    /// An array where each slot has a known compile-time size.
    Primitive(PrimitiveType),
    /// Opaque binary data of variable length.
    Binary,
    /// Opaque binary data of fixed size.
    FixedSizeBinary,
    /// Opaque binary data of variable length and 64-bit offsets.
    LargeBinary,
    /// A variable-length string in Unicode with UTF-8 encoding.
    Utf8,
    /// A variable-length string in Unicode with UFT-8 encoding and 64-bit offsets.
    LargeUtf8,
    /// Opaque binary data addressed by views.
    BinaryView,
    /// A string in Unicode with UTF-8 encoding addressed by views.
    Utf8View,
    /// A list of some data type with variable length.
    List,
    /// A list of some data type with fixed length.
    FixedSizeList,
    /// A list of some data type with variable length and 64-bit offsets.
    LargeList,
    /// A list of (offset, size) slots with 32-bit offsets.
    ListView,
    /// A list of (offset, size) slots with 64-bit offsets.
    LargeListView,
    /// A nested type that contains an arbitrary number of fields.
    Struct,
    /// A nested type that represents slots of differing types.
    Union,
    /// A nested type.
    Map,
    /// A dictionary encoded array by `IntegerType`.
    Dictionary(IntegerType),
    /// Runs of values, encoded by their logical end.
    RunEndEncoded,
}

impl PhysicalType {
    /// Whether this physical type equals [`PhysicalType::Primitive`] of some type.
    pub fn eq_primitive(&self, primitive: PrimitiveType) -> bool {
        if let Self::Primitive(o) = self {
            o == &primitive
        } else {
            false
        }
    }
}

/// The set of all implemented primitive types.
/// Each primitive type has a fixed width in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    /// A signed 8-bit integer.
    Int8,
    /// A signed 16-bit integer.
    Int16,
    /// A signed 32-bit integer.
    Int32,
    /// A signed 64-bit integer.
    Int64,
    /// A signed 128-bit integer.
    Int128,
    /// A signed 256-bit integer.
    Int256,
    /// An unsigned 8-bit integer.
    UInt8,
    /// An unsigned 16-bit integer.
    UInt16,
    /// An unsigned 32-bit integer.
    UInt32,
    /// An unsigned 64-bit integer.
    UInt64,
    /// A 16-bit floating point number.
    Float16,
    /// A 32-bit floating point number.
    Float32,
    /// A 64-bit floating point number.
    Float64,
    /// Two i32 representing days and ms
    DaysMs,
    /// months_days_ns(i32, i32, i64)
    MonthDayNano,
}

impl PrimitiveType {
    /// The number of bytes of each value of this type
    pub fn byte_width(&self) -> usize {
        use PrimitiveType::*;
        match self {
            Int8 | UInt8 => 1,
            Int16 | UInt16 | Float16 => 2,
            Int32 | UInt32 | Float32 => 4,
            Int64 | UInt64 | Float64 | DaysMs => 8,
            Int128 | MonthDayNano => 16,
            Int256 => 32,
        }
    }
}

/// the set of valid indices types of a dictionary-encoded Array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegerType {
    /// A signed 8-bit integer.
    Int8,
    /// A signed 16-bit integer.
    Int16,
    /// A signed 32-bit integer.
    Int32,
    /// A signed 64-bit integer.
    Int64,
    /// An unsigned 8-bit integer.
    UInt8,
    /// An unsigned 16-bit integer.
    UInt16,
    /// An unsigned 32-bit integer.
    UInt32,
    /// An unsigned 64-bit integer.
    UInt64,
}

impl IntegerType {
    /// The [`PrimitiveType`] of the keys
    pub fn to_primitive(&self) -> PrimitiveType {
        match self {
            IntegerType::Int8 => PrimitiveType::Int8,
            IntegerType::Int16 => PrimitiveType::Int16,
            IntegerType::Int32 => PrimitiveType::Int32,
            IntegerType::Int64 => PrimitiveType::Int64,
            IntegerType::UInt8 => PrimitiveType::UInt8,
            IntegerType::UInt16 => PrimitiveType::UInt16,
            IntegerType::UInt32 => PrimitiveType::UInt32,
            IntegerType::UInt64 => PrimitiveType::UInt64,
        }
    }
}
