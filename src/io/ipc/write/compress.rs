use std::sync::{Arc, Mutex};

use ahash::AHashMap;
use lazy_static::lazy_static;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::buffer::Buffer;
use crate::error::{Error, Result};

use super::super::compression::compress_buffer;
use super::common::{Compression, WriteOptions};

lazy_static! {
    static ref POOLS: Mutex<AHashMap<usize, Arc<ThreadPool>>> = Mutex::new(AHashMap::new());
}

/// The pool of `workers` threads, built on first use and shared by every writer.
fn pool(workers: usize) -> Result<Arc<ThreadPool>> {
    let mut pools = POOLS
        .lock()
        .map_err(|_| Error::oos("The compression pools are poisoned"))?;
    if let Some(pool) = pools.get(&workers) {
        return Ok(pool.clone());
    }
    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("ipc-compression-{i}"))
        .build()
        .map(Arc::new)
        .map_err(Error::from_external_error)?;
    tracing::debug!(workers, "built a compression pool");
    pools.insert(workers, pool.clone());
    Ok(pool)
}

fn compress(
    buffer: Option<Buffer>,
    compression: Compression,
    min_space_savings: Option<f64>,
) -> Result<Option<Buffer>> {
    buffer
        .map(|buffer| compress_buffer(compression, buffer.as_slice(), min_space_savings))
        .transpose()
        .map(|buffer| buffer.map(Buffer::from))
}

/// Compresses every buffer of a message body. Absent buffers stay absent.
///
/// With more than one `compression_workers`, buffers are compressed concurrently
/// on a pool of that many threads; the order of the output is that of the input.
pub(super) fn compress_buffers(
    buffers: Vec<Option<Buffer>>,
    compression: Compression,
    options: &WriteOptions,
) -> Result<Vec<Option<Buffer>>> {
    let min_space_savings = options.min_space_savings;
    if options.compression_workers <= 1 || buffers.len() <= 1 {
        return buffers
            .into_iter()
            .map(|buffer| compress(buffer, compression, min_space_savings))
            .collect();
    }

    pool(options.compression_workers)?.install(|| {
        buffers
            .into_par_iter()
            .map(|buffer| compress(buffer, compression, min_space_savings))
            .collect::<Result<Vec<_>>>()
    })
}
