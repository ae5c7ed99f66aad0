// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::sync::Arc;

use arrow_format::ipc;

use crate::array::{concatenate, ArrayRef};
use crate::buffer::Buffer;
use crate::datatypes::{DataType, Endianness, Field, Schema};
use crate::error::{Error, Result};
use crate::record_batch::RecordBatch;

use super::super::swap::swap_array;
use super::super::{IpcField, IpcSchema};
use super::deserialize::Body;
use super::{Dictionaries, OutOfSpecKind, ReadOptions, Version};

/// Errors unless `projection` is strictly increasing and within `fields`.
pub(super) fn check_projection(projection: &[usize], fields: &[Field]) -> Result<()> {
    if projection.windows(2).any(|x| x[0] >= x[1]) {
        return Err(Error::InvalidArgumentError(
            "The projection on IPC must be ordered and non-overlapping".to_string(),
        ));
    }
    if let Some(last) = projection.last() {
        if *last >= fields.len() {
            return Err(Error::InvalidArgumentError(format!(
                "The projection index {last} is out of bounds of the {} fields",
                fields.len()
            )));
        }
    }
    Ok(())
}

/// Whether arrays read with `ipc_schema` are converted to the native byte order.
fn swaps(ipc_schema: &IpcSchema, options: &ReadOptions) -> bool {
    options.ensure_native_endian && !ipc_schema.endianness.is_native()
}

/// The schema of the batches read from `schema` with `projection`.
pub(super) fn output_schema(
    schema: &Schema,
    ipc_schema: &IpcSchema,
    projection: Option<&[usize]>,
    options: &ReadOptions,
) -> Arc<Schema> {
    let mut schema = match projection {
        Some(projection) => schema
            .clone()
            .filter(|index, _| projection.binary_search(&index).is_ok()),
        None => schema.clone(),
    };
    if swaps(ipc_schema, options) {
        schema.endianness = Endianness::native();
    }
    Arc::new(schema)
}

/// Errors with [`Error::SchemaMismatch`] when `options` expects other fields than `schema`'s.
pub(super) fn check_expected_schema(schema: &Schema, options: &ReadOptions) -> Result<()> {
    match &options.expected_schema {
        Some(expected) if expected.fields != schema.fields => Err(Error::SchemaMismatch(format!(
            "expected the fields {:?} but read {:?}",
            expected.fields, schema.fields
        ))),
        _ => Ok(()),
    }
}

/// Creates a record batch from the metadata of a `RecordBatch` message and its body.
///
/// `fields` and `ipc_schema` describe every column of the message; only those in
/// `projection`, a strictly increasing list of indices, are read. `schema` is the
/// schema of the returned batch, see [`FileReader::schema`](super::FileReader::schema).
#[allow(clippy::too_many_arguments)]
pub fn read_record_batch(
    batch: ipc::RecordBatchRef,
    body: Buffer,
    fields: &[Field],
    ipc_schema: &IpcSchema,
    projection: Option<&[usize]>,
    schema: Arc<Schema>,
    dictionaries: &Dictionaries,
    version: Version,
    options: &ReadOptions,
) -> Result<RecordBatch> {
    if let Some(projection) = projection {
        check_projection(projection, fields)?;
    }
    if fields.len() != ipc_schema.fields.len() {
        return Err(Error::from(OutOfSpecKind::InvalidChildren));
    }
    let length = batch
        .length()?
        .try_into()
        .map_err(|_| Error::from(OutOfSpecKind::UnexpectedNegativeInteger))?;

    let mut body = Body::try_new(
        batch,
        body,
        ipc_schema.endianness,
        version,
        dictionaries,
        options.max_recursion_depth,
    )?;

    let mut projection = projection.map(|projection| projection.iter().peekable());
    let mut columns = Vec::with_capacity(fields.len());
    let iter = fields.iter().zip(ipc_schema.fields.iter()).enumerate();
    for (index, (field, ipc_field)) in iter {
        let selected = match projection.as_mut() {
            Some(projection) => projection.next_if_eq(&&index).is_some(),
            None => true,
        };
        if selected {
            columns.push(body.read(field.data_type().clone(), ipc_field, 0)?);
        } else {
            body.skip(field.data_type(), 0)?;
        }
        if projection.as_mut().map_or(false, |p| p.peek().is_none()) {
            break;
        }
    }

    let columns = if swaps(ipc_schema, options) {
        columns
            .iter()
            .map(|column| swap_array(column, ipc_schema.endianness, false).map(Arc::new))
            .collect::<Result<Vec<ArrayRef>>>()?
    } else {
        columns.into_iter().map(Arc::new).collect()
    };
    RecordBatch::try_new_with_length(schema, columns, length)
}

fn first_dictionary_field<'a>(
    id: i64,
    fields: &'a [Field],
    ipc_fields: &'a [IpcField],
) -> Option<(&'a Field, &'a IpcField)> {
    for (field, ipc_field) in fields.iter().zip(ipc_fields.iter()) {
        if ipc_field.dictionary_id == Some(id) {
            return Some((field, ipc_field));
        }
        let children = field.data_type().to_logical_type().children();
        let nested = children
            .iter()
            .zip(ipc_field.fields.iter())
            .find_map(|(child, ipc_child)| {
                first_dictionary_field(
                    id,
                    std::slice::from_ref(*child),
                    std::slice::from_ref(ipc_child),
                )
            });
        if nested.is_some() {
            return nested;
        }
        // the values of a dictionary may themselves be dictionary-encoded
        if let DataType::Dictionary(_, values, _) = field.data_type().to_logical_type() {
            let values_children = values.children();
            let nested = values_children
                .iter()
                .zip(ipc_field.fields.iter())
                .find_map(|(child, ipc_child)| {
                    first_dictionary_field(
                        id,
                        std::slice::from_ref(*child),
                        std::slice::from_ref(ipc_child),
                    )
                });
            if nested.is_some() {
                return nested;
            }
        }
    }
    None
}

/// Reads a `DictionaryBatch` message and updates `dictionaries` with its values.
///
/// A delta batch appends its values to the existing dictionary of its id; any other
/// batch sets the dictionary of its id. When `is_file`, a batch replacing an existing
/// dictionary is an error. `dictionaries` is left untouched when this function errors.
#[allow(clippy::too_many_arguments)]
pub fn read_dictionary(
    batch: ipc::DictionaryBatchRef,
    body: Buffer,
    fields: &[Field],
    ipc_schema: &IpcSchema,
    dictionaries: &mut Dictionaries,
    version: Version,
    options: &ReadOptions,
    is_file: bool,
) -> Result<()> {
    let id = batch.id()?;
    let (field, ipc_field) = first_dictionary_field(id, fields, &ipc_schema.fields)
        .ok_or_else(|| Error::from(OutOfSpecKind::InvalidId { requested_id: id }))?;

    let values_type = match field.data_type().to_logical_type() {
        DataType::Dictionary(_, values, _) => values.as_ref().clone(),
        _ => return Err(Error::from(OutOfSpecKind::InvalidIdDataType { requested_id: id })),
    };
    let values_fields = [Field::new("", values_type, true)];
    let values_ipc_schema = IpcSchema {
        fields: vec![IpcField {
            fields: ipc_field.fields.clone(),
            dictionary_id: None,
        }],
        endianness: ipc_schema.endianness,
    };
    let schema = output_schema(
        &Schema::from(values_fields.to_vec()),
        &values_ipc_schema,
        None,
        options,
    );

    let data = batch
        .data()?
        .ok_or_else(|| Error::from(OutOfSpecKind::MissingData))?;
    let values = read_record_batch(
        data,
        body,
        &values_fields,
        &values_ipc_schema,
        None,
        schema,
        dictionaries,
        version,
        options,
    )?
    .into_columns()
    .pop()
    .ok_or_else(|| Error::from(OutOfSpecKind::MissingData))?;

    let is_delta = batch.is_delta()?;
    let values = if is_delta {
        let existing = dictionaries.get(&id).ok_or_else(|| {
            Error::from(OutOfSpecKind::DeltaWithoutDictionary { requested_id: id })
        })?;
        if !ipc_schema.endianness.is_native() && !options.ensure_native_endian {
            return Err(Error::nyi(
                "delta dictionaries of a non-native byte order must be read with `ensure_native_endian`",
            ));
        }
        tracing::debug!(id, length = values.len(), "applying delta dictionary");
        Arc::new(concatenate(&[existing.as_ref(), values.as_ref()])?)
    } else {
        if is_file && dictionaries.contains_key(&id) {
            return Err(Error::from(OutOfSpecKind::DictionaryReplacement { requested_id: id }));
        }
        tracing::debug!(id, length = values.len(), "read dictionary");
        values
    };
    dictionaries.insert(id, values);
    Ok(())
}
