use crate::bitmap::MutableBitmap;
use crate::buffer::Buffer;
use crate::datatypes::{DataType, PhysicalType};
use crate::error::{Error, Result};
use crate::types::{NativeType, Offset};

use super::{Array, ArrayRef, MAX_INLINE_VIEW_LENGTH, VIEW_SIZE};

fn validity_from(validity: Option<&[bool]>) -> Option<Buffer> {
    validity.map(|validity| {
        validity
            .iter()
            .copied()
            .collect::<MutableBitmap>()
            .into_buffer()
    })
}

fn validity_from_options<T>(values: &[Option<T>]) -> Option<Buffer> {
    if values.iter().all(|x| x.is_some()) {
        None
    } else {
        Some(
            values
                .iter()
                .map(|x| x.is_some())
                .collect::<MutableBitmap>()
                .into_buffer(),
        )
    }
}

fn offsets_from<O: Offset>(lengths: impl Iterator<Item = usize>) -> Result<Vec<O>> {
    let mut offsets = vec![O::default()];
    let mut total = 0usize;
    for length in lengths {
        total += length;
        offsets.push(O::from_usize(total).ok_or(Error::Overflow)?);
    }
    Ok(offsets)
}

impl Array {
    /// Creates a new primitive [`Array`] without nulls from a slice of [`NativeType`]s.
    /// The data type is the natural type of `T`; use [`Array::to`] to change it.
    pub fn from_slice<T: NativeType>(values: &[T]) -> Self {
        Self {
            data_type: T::PRIMITIVE.into(),
            length: values.len(),
            offset: 0,
            null_count: 0,
            validity: None,
            buffers: vec![Buffer::from_values(values)],
            children: vec![],
            dictionary: None,
        }
    }

    /// Creates a new primitive [`Array`] from a slice of optional [`NativeType`]s.
    /// Null slots hold `T::default()`.
    pub fn from_opt<T: NativeType>(values: &[Option<T>]) -> Self {
        let validity = validity_from_options(values);
        let values = values
            .iter()
            .map(|x| x.unwrap_or_default())
            .collect::<Vec<_>>();
        let mut array = Self::from_slice(&values);
        array.null_count = validity
            .as_ref()
            .map(|v| crate::bitmap::utils::count_zeros(v.as_slice(), 0, array.length))
            .unwrap_or(0);
        array.validity = validity;
        array
    }

    /// Creates a new [`DataType::Boolean`] array.
    pub fn from_bools(values: &[Option<bool>]) -> Self {
        let bits = values
            .iter()
            .map(|x| x.unwrap_or_default())
            .collect::<MutableBitmap>()
            .into_buffer();
        let validity = validity_from_options(values);
        let null_count = values.iter().filter(|x| x.is_none()).count();
        Self {
            data_type: DataType::Boolean,
            length: values.len(),
            offset: 0,
            null_count,
            validity,
            buffers: vec![bits],
            children: vec![],
            dictionary: None,
        }
    }

    fn from_var<O: Offset>(data_type: DataType, values: &[Option<&[u8]>]) -> Result<Self> {
        let offsets =
            offsets_from::<O>(values.iter().map(|x| x.map(|x| x.len()).unwrap_or_default()))?;
        let data = values
            .iter()
            .flat_map(|x| x.unwrap_or_default().iter().copied())
            .collect::<Vec<_>>();
        Self::try_new(
            data_type,
            values.len(),
            validity_from_options(values),
            vec![Buffer::from_values(&offsets), data.into()],
            vec![],
            None,
        )
    }

    /// Creates a new [`DataType::Utf8`] array.
    /// # Panics
    /// Panics iff the values do not fit in 32-bit offsets
    pub fn from_strs(values: &[Option<&str>]) -> Self {
        let values = values.iter().map(|x| x.map(|x| x.as_bytes())).collect::<Vec<_>>();
        Self::from_var::<i32>(DataType::Utf8, &values).expect("values fit in 32-bit offsets")
    }

    /// Creates a new [`DataType::LargeUtf8`] array.
    /// # Panics
    /// Panics iff the values do not fit in 64-bit offsets
    pub fn from_large_strs(values: &[Option<&str>]) -> Self {
        let values = values.iter().map(|x| x.map(|x| x.as_bytes())).collect::<Vec<_>>();
        Self::from_var::<i64>(DataType::LargeUtf8, &values).expect("values fit in 64-bit offsets")
    }

    /// Creates a new [`DataType::Binary`] or [`DataType::LargeBinary`] array.
    /// # Errors
    /// Errors iff `data_type` is not binary or the values overflow its offsets.
    pub fn from_binary(data_type: DataType, values: &[Option<&[u8]>]) -> Result<Self> {
        match data_type.to_physical_type() {
            PhysicalType::Binary | PhysicalType::Utf8 => Self::from_var::<i32>(data_type, values),
            PhysicalType::LargeBinary | PhysicalType::LargeUtf8 => {
                Self::from_var::<i64>(data_type, values)
            }
            _ => Err(Error::InvalidArgumentError(format!(
                "{data_type:?} is not a variable-length binary type"
            ))),
        }
    }

    /// Creates a new [`DataType::FixedSizeBinary`] array of `size` bytes per value.
    /// Null slots are zeroed.
    pub fn from_fixed_size_binary(size: usize, values: &[Option<&[u8]>]) -> Result<Self> {
        let mut data = Vec::with_capacity(size * values.len());
        for value in values {
            match value {
                Some(value) if value.len() == size => data.extend_from_slice(value),
                Some(_) => {
                    return Err(Error::InvalidArgumentError(format!(
                        "All values of a FixedSizeBinary({size}) must have {size} bytes"
                    )))
                }
                None => data.extend(std::iter::repeat(0).take(size)),
            }
        }
        Self::try_new(
            DataType::FixedSizeBinary(size),
            values.len(),
            validity_from_options(values),
            vec![data.into()],
            vec![],
            None,
        )
    }

    /// Creates a new [`DataType::BinaryView`] or [`DataType::Utf8View`] array whose
    /// out-of-line values are split into data buffers of at most `buffer_size` bytes.
    pub fn from_views(
        data_type: DataType,
        values: &[Option<&[u8]>],
        buffer_size: usize,
    ) -> Result<Self> {
        if !matches!(
            data_type.to_physical_type(),
            PhysicalType::BinaryView | PhysicalType::Utf8View
        ) {
            return Err(Error::InvalidArgumentError(format!(
                "{data_type:?} is not a view type"
            )));
        }
        let mut views = Vec::with_capacity(values.len() * VIEW_SIZE);
        let mut buffers: Vec<Vec<u8>> = vec![];
        for value in values {
            let value = value.unwrap_or_default();
            let length = u32::try_from(value.len()).map_err(|_| Error::Overflow)?;
            let mut view = [0u8; VIEW_SIZE];
            view[..4].copy_from_slice(&length.to_ne_bytes());
            if value.len() <= MAX_INLINE_VIEW_LENGTH {
                view[4..4 + value.len()].copy_from_slice(value);
            } else {
                let needs_new = buffers
                    .last()
                    .map(|b| b.len() + value.len() > buffer_size)
                    .unwrap_or(true);
                if needs_new {
                    buffers.push(Vec::with_capacity(buffer_size.max(value.len())));
                }
                let buffer_index = buffers.len() - 1;
                let data = &mut buffers[buffer_index];
                let offset = u32::try_from(data.len()).map_err(|_| Error::Overflow)?;
                data.extend_from_slice(value);

                view[4..8].copy_from_slice(&value[..4]);
                view[8..12].copy_from_slice(&(buffer_index as u32).to_ne_bytes());
                view[12..16].copy_from_slice(&offset.to_ne_bytes());
            }
            views.extend_from_slice(&view);
        }
        let mut all = vec![Buffer::from(views)];
        all.extend(buffers.into_iter().map(Buffer::from));
        Self::try_new(
            data_type,
            values.len(),
            validity_from_options(values),
            all,
            vec![],
            None,
        )
    }

    /// Creates a new [`DataType::Utf8View`] array.
    /// # Panics
    /// Panics iff a value is longer than `u32::MAX` bytes
    pub fn from_str_views(values: &[Option<&str>]) -> Self {
        let values = values.iter().map(|x| x.map(|x| x.as_bytes())).collect::<Vec<_>>();
        Self::from_views(DataType::Utf8View, &values, 1 << 15).expect("a view type")
    }

    /// Creates a new [`DataType::Null`] array of `length` slots.
    pub fn new_null(length: usize) -> Self {
        Self {
            data_type: DataType::Null,
            length,
            offset: 0,
            null_count: length,
            validity: None,
            buffers: vec![],
            children: vec![],
            dictionary: None,
        }
    }

    /// Creates a new [`DataType::List`], [`DataType::LargeList`] or [`DataType::Map`] array.
    pub fn new_list<O: Offset>(
        data_type: DataType,
        offsets: &[O],
        values: ArrayRef,
        validity: Option<&[bool]>,
    ) -> Result<Self> {
        let length = offsets.len().saturating_sub(1);
        Self::try_new(
            data_type,
            length,
            validity_from(validity),
            vec![Buffer::from_values(offsets)],
            vec![values],
            None,
        )
    }

    /// Creates a new [`DataType::Map`] array.
    pub fn new_map(
        data_type: DataType,
        offsets: &[i32],
        entries: ArrayRef,
        validity: Option<&[bool]>,
    ) -> Result<Self> {
        Self::new_list(data_type, offsets, entries, validity)
    }

    /// Creates a new [`DataType::ListView`] or [`DataType::LargeListView`] array.
    pub fn new_list_view<O: Offset>(
        data_type: DataType,
        offsets: &[O],
        sizes: &[O],
        values: ArrayRef,
        validity: Option<&[bool]>,
    ) -> Result<Self> {
        if offsets.len() != sizes.len() {
            return Err(Error::InvalidArgumentError(
                "A list view must have as many offsets as sizes".to_string(),
            ));
        }
        Self::try_new(
            data_type,
            offsets.len(),
            validity_from(validity),
            vec![Buffer::from_values(offsets), Buffer::from_values(sizes)],
            vec![values],
            None,
        )
    }

    /// Creates a new [`DataType::FixedSizeList`] array.
    pub fn new_fixed_size_list(
        data_type: DataType,
        values: ArrayRef,
        validity: Option<&[bool]>,
    ) -> Result<Self> {
        let size = match data_type.to_logical_type() {
            DataType::FixedSizeList(_, size) => *size,
            _ => {
                return Err(Error::InvalidArgumentError(format!(
                    "{data_type:?} is not a fixed-size list"
                )))
            }
        };
        let length = if size == 0 {
            validity.map(|v| v.len()).unwrap_or(0)
        } else {
            values.len() / size
        };
        Self::try_new(
            data_type,
            length,
            validity_from(validity),
            vec![],
            vec![values],
            None,
        )
    }

    /// Creates a new [`DataType::Struct`] array whose length is the length of its first child.
    pub fn new_struct(
        data_type: DataType,
        children: Vec<ArrayRef>,
        validity: Option<&[bool]>,
    ) -> Result<Self> {
        let length = children
            .first()
            .map(|x| x.len())
            .or_else(|| validity.map(|v| v.len()))
            .unwrap_or(0);
        Self::try_new(
            data_type,
            length,
            validity_from(validity),
            vec![],
            children,
            None,
        )
    }

    /// Creates a new [`DataType::Union`] array. `offsets` must be set iff the union is dense.
    pub fn new_union(
        data_type: DataType,
        type_ids: &[i8],
        offsets: Option<&[i32]>,
        children: Vec<ArrayRef>,
    ) -> Result<Self> {
        let mut buffers = vec![Buffer::from_values(type_ids)];
        if let Some(offsets) = offsets {
            buffers.push(Buffer::from_values(offsets));
        }
        Self::try_new(data_type, type_ids.len(), None, buffers, children, None)
    }

    /// Creates a new [`DataType::Dictionary`] array from its keys and values.
    /// The validity of the keys is the validity of the array.
    pub fn new_dictionary(data_type: DataType, keys: &Array, values: ArrayRef) -> Result<Self> {
        let key_type = match data_type.to_physical_type() {
            PhysicalType::Dictionary(key_type) => key_type,
            _ => {
                return Err(Error::InvalidArgumentError(format!(
                    "{data_type:?} is not a dictionary"
                )))
            }
        };
        if keys.physical_type() != PhysicalType::Primitive(key_type.to_primitive()) {
            return Err(Error::InvalidArgumentError(
                "The keys of a dictionary must match its key type".to_string(),
            ));
        }
        let mut array = Self::try_new(
            data_type,
            keys.len(),
            keys.validity.clone(),
            keys.buffers.clone(),
            vec![],
            Some(values),
        )?;
        array.offset = keys.offset;
        array.null_count = keys.null_count;
        Ok(array)
    }

    /// Creates a new [`DataType::RunEndEncoded`] array from its run ends and values.
    /// Its length is the last run end.
    pub fn new_run_end_encoded(
        data_type: DataType,
        run_ends: ArrayRef,
        values: ArrayRef,
    ) -> Result<Self> {
        let length = match run_ends.data_type() {
            DataType::Int16 => run_ends.values::<i16>(0).last().map(|x| *x as i64),
            DataType::Int32 => run_ends.values::<i32>(0).last().map(|x| *x as i64),
            DataType::Int64 => run_ends.values::<i64>(0).last().copied(),
            _ => None,
        }
        .unwrap_or(0);
        let length = usize::try_from(length).map_err(|_| {
            Error::InvalidArgumentError("Run ends must be positive".to_string())
        })?;
        Self::try_new(data_type, length, None, vec![], vec![run_ends, values], None)
    }

    /// Creates a new [`DataType::Extension`] array over `storage`.
    pub fn new_extension(data_type: DataType, storage: &Array) -> Result<Self> {
        if data_type.to_logical_type() != storage.data_type().to_logical_type() {
            return Err(Error::InvalidArgumentError(format!(
                "An extension of {:?} cannot be stored as {:?}",
                data_type.to_logical_type(),
                storage.data_type()
            )));
        }
        Ok(Self {
            data_type,
            ..storage.clone()
        })
    }
}
