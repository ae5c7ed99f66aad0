//! Contains [`Array`], the columnar, possibly nested, in-memory container of values
//! consumed and produced by the IPC codec.
//!
//! An [`Array`] is a typed node: a [`DataType`], a length, a logical offset, an optional
//! validity bitmap, the buffers declared by its [`PhysicalType`] and its child arrays.
//! Buffers and children are reference-counted; slicing an [`Array`] is `O(1)` and never
//! copies them.
//!
//! The buffers of each [`PhysicalType`] (validity excluded) are:
//! * `Null`: none
//! * `Boolean`: the values' bits
//! * `Primitive` and `FixedSizeBinary`: the values
//! * `Binary`, `Utf8` and their large variants: offsets and data
//! * `BinaryView` and `Utf8View`: the views followed by any number of data buffers
//! * `List`, `LargeList` and `Map`: offsets (the values are the single child)
//! * `ListView` and `LargeListView`: offsets and sizes (the values are the single child)
//! * `FixedSizeList` and `Struct`: none (values are children)
//! * `Union`: type ids and, when dense, offsets
//! * `Dictionary`: the keys (the values are in [`Array::dictionary`])
//! * `RunEndEncoded`: none (run ends and values are the two children)
//!
//! The logical offset of an array applies to every per-slot buffer and, for struct,
//! sparse union, fixed-size list and run-end-encoded arrays, to the indexing of its children.
use std::borrow::Cow;
use std::sync::Arc;

use crate::bitmap::utils::{bytes_for, count_zeros, get_bit};
use crate::buffer::Buffer;
use crate::datatypes::{DataType, PhysicalType, UnionMode};
use crate::error::{Error, Result};
use crate::types::{NativeType, Offset};

mod concat;
mod equal;
mod from;

pub use concat::concatenate;
pub use equal::equal;
pub(crate) use equal::union_child;

/// A reference-counted [`Array`]
pub type ArrayRef = Arc<Array>;

/// The byte length of a single view of `BinaryView` and `Utf8View` arrays.
pub const VIEW_SIZE: usize = 16;
/// The maximum number of bytes a view stores inline.
pub const MAX_INLINE_VIEW_LENGTH: usize = 12;

/// A columnar array of values of a [`DataType`]. See the [module documentation](self).
#[derive(Debug, Clone)]
pub struct Array {
    data_type: DataType,
    length: usize,
    offset: usize,
    null_count: usize,
    validity: Option<Buffer>,
    buffers: Vec<Buffer>,
    children: Vec<ArrayRef>,
    dictionary: Option<ArrayRef>,
}

fn check_buffer(buffer: &Buffer, required: usize, name: &str) -> Result<()> {
    if buffer.len() < required {
        return Err(Error::InvalidArgumentError(format!(
            "The {name} buffer must have at least {required} bytes but it has {}",
            buffer.len()
        )));
    }
    Ok(())
}

fn check_count<T>(items: &[T], expected: usize, name: &str, data_type: &DataType) -> Result<()> {
    if items.len() != expected {
        return Err(Error::InvalidArgumentError(format!(
            "An array of type {data_type:?} must have {expected} {name} but it has {}",
            items.len()
        )));
    }
    Ok(())
}

/// Whether arrays of `data_type` may carry a validity bitmap.
pub(crate) fn can_have_validity(data_type: &PhysicalType) -> bool {
    !matches!(
        data_type,
        PhysicalType::Null | PhysicalType::Union | PhysicalType::RunEndEncoded
    )
}

impl Array {
    /// Returns a new [`Array`] with offset zero.
    /// # Errors
    /// This function errors iff the buffers, children or dictionary are inconsistent with
    /// the [`PhysicalType`] of `data_type` or too small for `length` slots.
    pub fn try_new(
        data_type: DataType,
        length: usize,
        validity: Option<Buffer>,
        buffers: Vec<Buffer>,
        children: Vec<ArrayRef>,
        dictionary: Option<ArrayRef>,
    ) -> Result<Self> {
        let mut array = Self {
            data_type,
            length,
            offset: 0,
            null_count: 0,
            validity,
            buffers,
            children,
            dictionary,
        };
        array.check()?;
        array.null_count = array.compute_null_count();
        Ok(array)
    }

    fn compute_null_count(&self) -> usize {
        match (&self.validity, self.physical_type()) {
            (_, PhysicalType::Null) => self.length,
            (Some(validity), _) => count_zeros(validity.as_slice(), self.offset, self.length),
            (None, _) => 0,
        }
    }

    fn check(&self) -> Result<()> {
        use PhysicalType::*;
        let physical_type = self.physical_type();
        let data_type = self.data_type.to_logical_type();
        let length = self.length;

        if let Some(validity) = &self.validity {
            if !can_have_validity(&physical_type) {
                return Err(Error::InvalidArgumentError(format!(
                    "An array of type {data_type:?} cannot have a validity bitmap"
                )));
            }
            check_buffer(validity, bytes_for(length), "validity")?;
        }

        if matches!(physical_type, Dictionary(_)) != self.dictionary.is_some() {
            return Err(Error::InvalidArgumentError(
                "Dictionary values must be present iff the array is dictionary-encoded"
                    .to_string(),
            ));
        }

        let offsets_required = |width: usize| if length == 0 { 0 } else { (length + 1) * width };

        match physical_type {
            Null | FixedSizeList | Struct | RunEndEncoded => {
                check_count(&self.buffers, 0, "buffers", data_type)?
            }
            Boolean => {
                check_count(&self.buffers, 1, "buffers", data_type)?;
                check_buffer(&self.buffers[0], bytes_for(length), "values")?;
            }
            Primitive(primitive) => {
                check_count(&self.buffers, 1, "buffers", data_type)?;
                check_buffer(&self.buffers[0], length * primitive.byte_width(), "values")?;
            }
            Dictionary(key) => {
                check_count(&self.buffers, 1, "buffers", data_type)?;
                check_buffer(
                    &self.buffers[0],
                    length * key.to_primitive().byte_width(),
                    "keys",
                )?;
            }
            FixedSizeBinary => {
                check_count(&self.buffers, 1, "buffers", data_type)?;
                if let DataType::FixedSizeBinary(size) = data_type {
                    check_buffer(&self.buffers[0], length * size, "values")?;
                }
            }
            Binary | Utf8 => {
                check_count(&self.buffers, 2, "buffers", data_type)?;
                check_buffer(&self.buffers[0], offsets_required(4), "offsets")?;
            }
            LargeBinary | LargeUtf8 => {
                check_count(&self.buffers, 2, "buffers", data_type)?;
                check_buffer(&self.buffers[0], offsets_required(8), "offsets")?;
            }
            BinaryView | Utf8View => {
                if self.buffers.is_empty() {
                    return Err(Error::InvalidArgumentError(
                        "A view array must have a views buffer".to_string(),
                    ));
                }
                check_buffer(&self.buffers[0], length * VIEW_SIZE, "views")?;
            }
            List | Map => {
                check_count(&self.buffers, 1, "buffers", data_type)?;
                check_buffer(&self.buffers[0], offsets_required(4), "offsets")?;
            }
            LargeList => {
                check_count(&self.buffers, 1, "buffers", data_type)?;
                check_buffer(&self.buffers[0], offsets_required(8), "offsets")?;
            }
            ListView | LargeListView => {
                let width = if physical_type == ListView { 4 } else { 8 };
                check_count(&self.buffers, 2, "buffers", data_type)?;
                check_buffer(&self.buffers[0], length * width, "offsets")?;
                check_buffer(&self.buffers[1], length * width, "sizes")?;
            }
            Union => {
                let is_dense = matches!(data_type, DataType::Union(_, _, UnionMode::Dense));
                check_count(&self.buffers, 1 + is_dense as usize, "buffers", data_type)?;
                check_buffer(&self.buffers[0], length, "type ids")?;
                if is_dense {
                    check_buffer(&self.buffers[1], length * 4, "offsets")?;
                }
            }
        }

        let fields = data_type.children();
        check_count(&self.children, fields.len(), "children", data_type)?;
        for (field, child) in fields.iter().zip(self.children.iter()) {
            if field.data_type() != child.data_type() {
                return Err(Error::InvalidArgumentError(format!(
                    "The child \"{}\" is declared as {:?} but its array is {:?}",
                    field.name,
                    field.data_type(),
                    child.data_type()
                )));
            }
        }
        match data_type {
            DataType::Struct(_) | DataType::Union(_, _, UnionMode::Sparse) => {
                if self.children.iter().any(|child| child.len() < length) {
                    return Err(Error::InvalidArgumentError(
                        "The children of a struct or sparse union must have at least as many slots as the array".to_string(),
                    ));
                }
            }
            DataType::FixedSizeList(_, size) => {
                if self.children[0].len() < length * size {
                    return Err(Error::InvalidArgumentError(
                        "The values of a fixed-size list must have at least `size * length` slots"
                            .to_string(),
                    ));
                }
            }
            DataType::RunEndEncoded(run_ends, _) => {
                if !matches!(
                    run_ends.data_type(),
                    DataType::Int16 | DataType::Int32 | DataType::Int64
                ) {
                    return Err(Error::InvalidArgumentError(
                        "The run ends of a run-end encoded array must be Int16, Int32 or Int64"
                            .to_string(),
                    ));
                }
                if self.children[0].null_count() > 0 {
                    return Err(Error::InvalidArgumentError(
                        "The run ends of a run-end encoded array cannot be null".to_string(),
                    ));
                }
            }
            DataType::Dictionary(_, values, _) => {
                if let Some(dictionary) = &self.dictionary {
                    if dictionary.data_type() != values.as_ref() {
                        return Err(Error::InvalidArgumentError(format!(
                            "The dictionary is declared as {values:?} but its values are {:?}",
                            dictionary.data_type()
                        )));
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Returns a new empty [`Array`] of `data_type`.
    /// # Errors
    /// Errors iff the type is nested with children that cannot be created empty.
    pub fn new_empty(data_type: DataType) -> Result<Self> {
        use PhysicalType::*;
        let logical = data_type.to_logical_type().clone();
        let buffers = match data_type.to_physical_type() {
            Null | FixedSizeList | Struct | RunEndEncoded => vec![],
            Binary | Utf8 | LargeBinary | LargeUtf8 | ListView | LargeListView => {
                vec![Buffer::new(), Buffer::new()]
            }
            Union if matches!(logical, DataType::Union(_, _, UnionMode::Dense)) => {
                vec![Buffer::new(), Buffer::new()]
            }
            _ => vec![Buffer::new()],
        };
        let children = logical
            .children()
            .into_iter()
            .map(|field| Self::new_empty(field.data_type().clone()).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        let dictionary = match &logical {
            DataType::Dictionary(_, values, _) => {
                Some(Arc::new(Self::new_empty(values.as_ref().clone())?))
            }
            _ => None,
        };
        Self::try_new(data_type, 0, None, buffers, children, dictionary)
    }

    /// The [`DataType`] of this array.
    #[inline]
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// The [`PhysicalType`] of this array.
    #[inline]
    pub fn physical_type(&self) -> PhysicalType {
        self.data_type.to_physical_type()
    }

    /// The number of slots of this array.
    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Whether this array has no slots.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The logical offset of this array into its buffers.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The number of null slots of this array.
    #[inline]
    pub fn null_count(&self) -> usize {
        self.null_count
    }

    /// The validity bitmap of this array, over all of its buffers' slots.
    #[inline]
    pub fn validity(&self) -> Option<&Buffer> {
        self.validity.as_ref()
    }

    /// The buffers of this array, validity excluded.
    #[inline]
    pub fn buffers(&self) -> &[Buffer] {
        &self.buffers
    }

    /// The child arrays of this array.
    #[inline]
    pub fn children(&self) -> &[ArrayRef] {
        &self.children
    }

    /// The values of a dictionary-encoded array.
    #[inline]
    pub fn dictionary(&self) -> Option<&ArrayRef> {
        self.dictionary.as_ref()
    }

    /// Returns whether slot `i` is valid.
    /// # Panics
    /// Panics iff `i >= self.len()`.
    #[inline]
    pub fn is_valid(&self, i: usize) -> bool {
        assert!(i < self.length);
        match (&self.validity, self.physical_type()) {
            (_, PhysicalType::Null) => false,
            (Some(validity), _) => get_bit(validity.as_slice(), self.offset + i),
            (None, _) => true,
        }
    }

    /// Returns whether slot `i` is null.
    /// # Panics
    /// Panics iff `i >= self.len()`.
    #[inline]
    pub fn is_null(&self, i: usize) -> bool {
        !self.is_valid(i)
    }

    /// Slices this [`Array`] in place.
    /// # Panics
    /// Panics iff `offset + length > self.len()`.
    pub fn slice(&mut self, offset: usize, length: usize) {
        assert!(
            offset + length <= self.len(),
            "the offset of the new array cannot exceed the existing length"
        );
        self.offset += offset;
        self.length = length;
        self.null_count = self.compute_null_count();
    }

    /// Returns a slice of this [`Array`] sharing its buffers.
    /// # Panics
    /// Panics iff `offset + length > self.len()`.
    #[must_use]
    pub fn sliced(mut self, offset: usize, length: usize) -> Self {
        self.slice(offset, length);
        self
    }

    /// Returns this array with a new [`DataType`] of the same physical layout,
    /// e.g. an `Int64` array as a `Timestamp`.
    /// # Errors
    /// Errors iff `data_type` is not compatible with the buffers and children of this array.
    pub fn to(self, data_type: DataType) -> Result<Self> {
        if data_type.to_physical_type() != self.physical_type() {
            return Err(Error::InvalidArgumentError(format!(
                "Cannot reinterpret an array of {:?} as {data_type:?}",
                self.data_type
            )));
        }
        let array = Self { data_type, ..self };
        array.check()?;
        Ok(array)
    }

    /// Wraps this array in an [`Arc`].
    #[inline]
    pub fn arced(self) -> ArrayRef {
        Arc::new(self)
    }

    /// The values of a fixed-width buffer at `index`, restricted to the slots of this array.
    pub fn values<T: NativeType>(&self, index: usize) -> Cow<'_, [T]> {
        let values = self.buffers[index].typed::<T>();
        let range = self.offset..self.offset + self.length;
        match values {
            Cow::Borrowed(values) => Cow::Borrowed(&values[range]),
            Cow::Owned(values) => Cow::Owned(values[range].to_vec()),
        }
    }

    /// The `len() + 1` offsets of this variable-length array, at buffer 0.
    pub fn offsets<O: Offset>(&self) -> Cow<'_, [O]> {
        let offsets = self.buffers[0].typed::<O>();
        if offsets.is_empty() {
            return Cow::Owned(vec![O::default()]);
        }
        let range = self.offset..self.offset + self.length + 1;
        match offsets {
            Cow::Borrowed(offsets) => Cow::Borrowed(&offsets[range]),
            Cow::Owned(offsets) => Cow::Owned(offsets[range].to_vec()),
        }
    }

    /// Returns this array with its buffers, children and dictionary replaced by ones of
    /// the same layout, e.g. the same values in another byte order.
    pub(crate) fn with_parts(
        &self,
        buffers: Vec<Buffer>,
        children: Vec<ArrayRef>,
        dictionary: Option<ArrayRef>,
    ) -> Self {
        Self {
            buffers,
            children,
            dictionary,
            ..self.clone()
        }
    }

    /// The logical end of each run of a run-end encoded array, as `usize`.
    pub(crate) fn run_ends(&self) -> Vec<usize> {
        let run_ends = &self.children[0];
        let to_usize = |x: i64| usize::try_from(x).unwrap_or(0);
        match run_ends.data_type() {
            DataType::Int16 => run_ends
                .values::<i16>(0)
                .iter()
                .map(|x| to_usize(*x as i64))
                .collect(),
            DataType::Int32 => run_ends
                .values::<i32>(0)
                .iter()
                .map(|x| to_usize(*x as i64))
                .collect(),
            _ => run_ends
                .values::<i64>(0)
                .iter()
                .map(|x| to_usize(*x))
                .collect(),
        }
    }

    /// The index of the value of the run holding slot `i` of a run-end encoded array.
    pub(crate) fn physical_index(run_ends: &[usize], logical: usize) -> usize {
        run_ends.partition_point(|end| *end <= logical)
    }

    /// The bytes of the view at slot `i` (offset not applied) of a view array.
    pub(crate) fn view_value(&self, i: usize) -> &[u8] {
        let view = &self.buffers[0].as_slice()[i * VIEW_SIZE..(i + 1) * VIEW_SIZE];
        let length = u32::from_ne_bytes([view[0], view[1], view[2], view[3]]) as usize;
        if length <= MAX_INLINE_VIEW_LENGTH {
            &view[4..4 + length]
        } else {
            let buffer_index = u32::from_ne_bytes([view[8], view[9], view[10], view[11]]) as usize;
            let offset = u32::from_ne_bytes([view[12], view[13], view[14], view[15]]) as usize;
            &self.buffers[1 + buffer_index].as_slice()[offset..offset + length]
        }
    }
}
