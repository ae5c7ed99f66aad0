mod common;
mod read;
mod write;

#[cfg(all(feature = "io_ipc_read_async", feature = "io_ipc_write_async"))]
mod read_stream_async;

#[cfg(feature = "io_ipc_write_async")]
mod write_async;
