//! APIs to write to Arrow's IPC format.
pub(crate) mod common;
mod compress;
mod schema;
mod serialize;
mod stream;
mod writer;

pub use common::{encode_record_batch, Compression, DictionaryTracker, EncodedData, WriteOptions};
pub use schema::{default_ipc_fields, schema_to_bytes, serialize_schema};
pub use serialize::{write, Payload};
pub use stream::StreamWriter;
pub use writer::FileWriter;

pub(crate) mod common_sync;

#[cfg(feature = "io_ipc_write_async")]
mod common_async;
#[cfg(feature = "io_ipc_write_async")]
#[cfg_attr(docsrs, doc(cfg(feature = "io_ipc_write_async")))]
pub mod stream_async;

use crate::datatypes::Schema;
use crate::error::{Error, Result};
use crate::record_batch::RecordBatch;

/// Errors iff the fields of `batch` differ from those of `schema`.
fn check_schema(schema: &Schema, batch: &RecordBatch) -> Result<()> {
    if batch.schema().fields != schema.fields {
        return Err(Error::SchemaMismatch(
            "The fields of the record batch differ from the fields of the writer's schema"
                .to_string(),
        ));
    }
    Ok(())
}
