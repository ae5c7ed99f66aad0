use std::sync::Arc;

use arrow_ipc_codec::array::{concatenate, Array};
use arrow_ipc_codec::datatypes::{DataType, Field, TimeUnit};
use arrow_ipc_codec::error::Result;

#[test]
fn slice_is_logical() {
    let array = Array::from_opt(&[Some(1i64), None, Some(3), Some(4)]);
    let sliced = array.sliced(1, 2);
    assert_eq!(sliced.len(), 2);
    assert_eq!(sliced.offset(), 1);
    assert_eq!(sliced.null_count(), 1);
    assert_eq!(sliced, Array::from_opt(&[None, Some(3i64)]));
}

#[test]
fn concatenate_strings() -> Result<()> {
    let a = Array::from_strs(&[Some("a"), None]);
    let b = Array::from_strs(&[Some("bc"), Some("def")]).sliced(1, 1);
    let result = concatenate(&[&a, &b])?;
    assert_eq!(result, Array::from_strs(&[Some("a"), None, Some("def")]));
    Ok(())
}

#[test]
fn concatenate_lists() -> Result<()> {
    let data_type = DataType::List(Box::new(Field::new("item", DataType::Int32, true)));
    let a = Array::new_list(
        data_type.clone(),
        &[0i32, 2],
        Array::from_slice(&[1i32, 2]).arced(),
        None,
    )?;
    let b = Array::new_list(
        data_type.clone(),
        &[0i32, 1, 1],
        Array::from_slice(&[3i32]).arced(),
        Some(&[true, false]),
    )?;
    let result = concatenate(&[&a, &b])?;

    let expected = Array::new_list(
        data_type,
        &[0i32, 2, 3, 3],
        Array::from_slice(&[1i32, 2, 3]).arced(),
        Some(&[true, true, false]),
    )?;
    assert_eq!(result, expected);
    Ok(())
}

#[test]
fn reinterpret() -> Result<()> {
    let data_type = DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".to_string()));
    let array = Array::from_slice(&[1i64, 2]).to(data_type.clone())?;
    assert_eq!(array.data_type(), &data_type);

    assert!(Array::from_slice(&[1i32]).to(DataType::Int64).is_err());
    Ok(())
}

#[test]
fn equality_depends_on_type() -> Result<()> {
    let a = Array::from_slice(&[1i32]);
    let b = Array::from_slice(&[1i32]).to(DataType::Date32)?;
    assert!(a != b);
    Ok(())
}

#[test]
fn views_compare_by_value() -> Result<()> {
    let values = [Some("a string longer than 12 bytes"), None, Some("short")];
    let a = Array::from_str_views(&values);
    let bytes = values
        .iter()
        .map(|x| x.map(|x| x.as_bytes()))
        .collect::<Vec<_>>();
    // a different split of the data buffers
    let b = Array::from_views(DataType::Utf8View, &bytes, 16)?;
    assert_eq!(a, b);
    Ok(())
}

#[test]
fn dictionary() -> Result<()> {
    let data_type = DataType::Dictionary(
        arrow_ipc_codec::datatypes::IntegerType::Int32,
        Box::new(DataType::Utf8),
        false,
    );
    let values = Arc::new(Array::from_strs(&[Some("a"), Some("b")]));
    let a = Array::new_dictionary(
        data_type.clone(),
        &Array::from_opt(&[Some(1i32), None, Some(0)]),
        values,
    )?;
    // same logical values, different dictionary
    let values = Arc::new(Array::from_strs(&[Some("b"), Some("a")]));
    let b = Array::new_dictionary(
        data_type,
        &Array::from_opt(&[Some(0i32), None, Some(1)]),
        values,
    )?;
    assert_eq!(a, b);
    Ok(())
}
