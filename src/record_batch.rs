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

//! A two-dimensional batch of column-oriented data with a defined
//! [schema](crate::datatypes::Schema).

use std::sync::Arc;

use crate::array::{Array, ArrayRef};
use crate::datatypes::Schema;
use crate::error::{Error, Result};

/// A two-dimensional batch of column-oriented data with a defined
/// [schema](crate::datatypes::Schema).
///
/// A `RecordBatch` is a two-dimensional dataset of a number of
/// contiguous arrays, each the same length.
/// A record batch has a schema which must match its arrays'
/// datatypes.
///
/// Record batches are the unit of work of the IPC readers and writers.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordBatch {
    schema: Arc<Schema>,
    columns: Vec<ArrayRef>,
    length: usize,
}

impl RecordBatch {
    /// Creates a `RecordBatch` from a schema and columns.
    ///
    /// Expects the following:
    ///  * the schema and column data types to have equal lengths
    ///    and match
    ///  * each array in columns to have the same length
    ///
    /// If the conditions are not met, an error is returned.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use arrow_ipc_codec::array::Array;
    /// use arrow_ipc_codec::datatypes::{Schema, Field, DataType};
    /// use arrow_ipc_codec::record_batch::RecordBatch;
    ///
    /// # fn main() -> arrow_ipc_codec::error::Result<()> {
    /// let id_array = Array::from_slice(&[1i32, 2, 3, 4, 5]);
    /// let schema = Schema::from(vec![
    ///     Field::new("id", DataType::Int32, false)
    /// ]);
    ///
    /// let batch = RecordBatch::try_new(Arc::new(schema), vec![Arc::new(id_array)])?;
    /// assert_eq!(batch.num_rows(), 5);
    /// # Ok(())
    /// # }
    /// ```
    pub fn try_new(schema: Arc<Schema>, columns: Vec<ArrayRef>) -> Result<Self> {
        let length = columns.first().map(|column| column.len()).unwrap_or(0);
        Self::try_new_with_length(schema, columns, length)
    }

    /// Creates a `RecordBatch` of `length` rows. Unlike [`RecordBatch::try_new`], this
    /// supports batches without columns.
    pub fn try_new_with_length(
        schema: Arc<Schema>,
        columns: Vec<ArrayRef>,
        length: usize,
    ) -> Result<Self> {
        if schema.fields.len() != columns.len() {
            return Err(Error::InvalidArgumentError(format!(
                "number of columns({}) must match number of fields({}) in schema",
                columns.len(),
                schema.fields.len(),
            )));
        }
        for (i, (column, field)) in columns.iter().zip(schema.fields.iter()).enumerate() {
            if column.len() != length {
                return Err(Error::InvalidArgumentError(
                    "all columns in a record batch must have the same length".to_string(),
                ));
            }
            if column.data_type() != field.data_type() {
                return Err(Error::InvalidArgumentError(format!(
                    "column types must match schema types, expected {:?} but found {:?} at column index {}",
                    field.data_type(),
                    column.data_type(),
                    i
                )));
            }
        }
        Ok(Self {
            schema,
            columns,
            length,
        })
    }

    /// Creates a new empty [`RecordBatch`].
    pub fn new_empty(schema: Arc<Schema>) -> Result<Self> {
        let columns = schema
            .fields
            .iter()
            .map(|field| Array::new_empty(field.data_type().clone()).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        Self::try_new_with_length(schema, columns, 0)
    }

    /// Returns the [`Schema`](crate::datatypes::Schema) of the record batch.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Returns the number of columns in the record batch.
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Returns the number of rows in each column.
    pub fn num_rows(&self) -> usize {
        self.length
    }

    /// Get a reference to a column's array by index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is outside of `0..num_columns`.
    pub fn column(&self, index: usize) -> &ArrayRef {
        &self.columns[index]
    }

    /// Get a reference to all columns in the record batch.
    pub fn columns(&self) -> &[ArrayRef] {
        &self.columns[..]
    }

    /// Consumes this batch, returning its columns.
    pub fn into_columns(self) -> Vec<ArrayRef> {
        self.columns
    }
}
