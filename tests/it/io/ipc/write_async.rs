use std::io::Cursor;

use futures::io::Cursor as AsyncCursor;
use futures::SinkExt;

use arrow_ipc_codec::error::{Error, Result};
use arrow_ipc_codec::io::ipc::read::{StreamReader, StreamState};
use arrow_ipc_codec::io::ipc::write::stream_async::{StreamSink, WriteOptions};
use arrow_ipc_codec::record_batch::RecordBatch;

use crate::io::ipc::common::{all_types_batch, int_batch, write_stream};

async fn write(batches: Vec<RecordBatch>, options: WriteOptions) -> Result<Vec<u8>> {
    let schema = batches[0].schema().clone();
    let mut result = AsyncCursor::new(Vec::<u8>::new());
    {
        let mut sink = StreamSink::new(&mut result, &schema, None, options)?;
        for batch in batches {
            sink.feed(batch).await?;
        }
        sink.close().await?;
    }
    Ok(result.into_inner())
}

#[test]
fn write_async() -> Result<()> {
    let batch = all_types_batch()?;
    let bytes = futures::executor::block_on(write(vec![batch.clone(), batch.clone()], Default::default()))?;

    let reader = StreamReader::open(Cursor::new(bytes), None, Default::default())?;
    let batches = reader
        .map(|x| x.map(StreamState::unwrap))
        .collect::<Result<Vec<_>>>()?;
    assert_eq!(batches, vec![batch.clone(), batch]);
    Ok(())
}

#[test]
fn same_bytes_as_sync() -> Result<()> {
    let batches = vec![int_batch(&[Some(1), None])?, int_batch(&[Some(3)])?];
    let expected = write_stream(&batches, batches[0].schema(), Default::default())?;
    let bytes = futures::executor::block_on(write(batches, Default::default()))?;
    assert_eq!(bytes, expected);
    Ok(())
}

#[test]
fn schema_mismatch() -> Result<()> {
    let batch = int_batch(&[Some(1)])?;
    let other = all_types_batch()?;
    futures::executor::block_on(async move {
        let mut buffer = vec![];
        let mut sink = StreamSink::new(&mut buffer, batch.schema(), None, Default::default())?;
        assert!(matches!(sink.send(other).await, Err(Error::SchemaMismatch(_))));
        Result::<()>::Ok(())
    })
}
