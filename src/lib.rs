//! Encoder and decoder of [Apache Arrow](https://arrow.apache.org/)'s IPC stream and
//! file formats.
//!
//! The in-memory model is small: an [`Array`](array::Array) is a
//! [`DataType`](datatypes::DataType), a length, an optional validity bitmap and the
//! type's buffers and children, laid out as Arrow's columnar format specifies. A
//! [`RecordBatch`](record_batch::RecordBatch) is a set of equal-length arrays under a
//! [`Schema`](datatypes::Schema).
//!
//! Batches are written to and read from IPC with the APIs in [`io::ipc`].
#![allow(clippy::len_without_is_empty)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod array;
pub mod bitmap;
pub mod buffer;
pub mod datatypes;
pub mod error;
pub mod io;
pub mod record_batch;
pub mod types;
