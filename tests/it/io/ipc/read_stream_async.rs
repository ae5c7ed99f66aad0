use futures::io::Cursor as AsyncCursor;
use futures::{SinkExt, StreamExt, TryStreamExt};

use arrow_ipc_codec::error::Result;
use arrow_ipc_codec::io::ipc::read::stream_async::*;
use arrow_ipc_codec::io::ipc::write::stream_async::StreamSink;
use arrow_ipc_codec::io::ipc::write::StreamWriter;

use crate::io::ipc::common::{all_types_batch, dictionary_batch, int_batch, write_stream};

async fn test_round_trip() -> Result<()> {
    let data = (0..5)
        .map(|i| int_batch(&[Some(i), None, Some(i + 1)]))
        .collect::<Result<Vec<_>>>()?;
    let schema = data[0].schema().clone();

    let mut buffer = vec![];
    let mut sink = StreamSink::new(&mut buffer, &schema, None, Default::default())?;
    for batch in &data {
        sink.feed(batch.clone()).await?;
    }
    sink.close().await?;
    drop(sink);

    let mut reader = AsyncCursor::new(buffer);
    let metadata = read_stream_metadata_async(&mut reader).await?;
    assert_eq!(schema.as_ref(), &metadata.schema);
    let stream = AsyncStreamReader::new(reader, metadata);
    let out = stream.try_collect::<Vec<_>>().await?;
    assert_eq!(out, data);
    Ok(())
}

#[test]
fn round_trip() -> Result<()> {
    futures::executor::block_on(test_round_trip())
}

#[test]
fn all_types() -> Result<()> {
    let batch = all_types_batch()?;
    let bytes = write_stream(&[batch.clone()], batch.schema(), Default::default())?;
    futures::executor::block_on(async move {
        let mut reader = AsyncCursor::new(bytes);
        let metadata = read_stream_metadata_async(&mut reader).await?;
        let mut reader = AsyncStreamReader::try_new(reader, metadata, Some(vec![2, 29]), Default::default())?;
        assert_eq!(reader.schema().fields.len(), 2);

        let result = reader.next().await.unwrap()?;
        assert_eq!(result.columns()[0], batch.columns()[2]);
        assert_eq!(result.columns()[1], batch.columns()[29]);
        assert!(reader.next().await.is_none());
        Result::<()>::Ok(())
    })
}

#[test]
fn dictionary_replacement() -> Result<()> {
    let first = dictionary_batch(&[Some(0), Some(1)], &[Some("a"), Some("b")])?;
    let second = dictionary_batch(&[Some(1), None], &[Some("x"), Some("y")])?;
    let bytes = write_stream(&[first.clone(), second.clone()], first.schema(), Default::default())?;
    futures::executor::block_on(async move {
        let mut reader = AsyncCursor::new(bytes);
        let metadata = read_stream_metadata_async(&mut reader).await?;
        let out = AsyncStreamReader::new(reader, metadata)
            .try_collect::<Vec<_>>()
            .await?;
        assert_eq!(out, vec![first, second]);
        Result::<()>::Ok(())
    })
}

#[test]
fn ends_without_end_of_stream() -> Result<()> {
    let batch = int_batch(&[Some(1)])?;
    let mut writer = StreamWriter::new(vec![], Default::default());
    writer.start(batch.schema(), None)?;
    writer.write(&batch, None)?;
    let bytes = writer.into_inner();

    futures::executor::block_on(async move {
        let mut reader = AsyncCursor::new(bytes);
        let metadata = read_stream_metadata_async(&mut reader).await?;
        let out = AsyncStreamReader::new(reader, metadata)
            .try_collect::<Vec<_>>()
            .await?;
        assert_eq!(out, vec![batch]);
        Result::<()>::Ok(())
    })
}
