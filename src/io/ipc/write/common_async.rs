use futures::{AsyncWrite, AsyncWriteExt};

use crate::error::Result;

use super::super::CONTINUATION_MARKER;
use super::common::{pad_to_alignment, pad_to_8, EncodedData};

/// Write a message's IPC data and buffers, returning metadata and buffer data lengths written
pub async fn write_message<W: AsyncWrite + Unpin + Send>(
    mut writer: W,
    encoded: EncodedData,
    alignment: usize,
) -> Result<(usize, usize)> {
    let buffer = encoded.ipc_message;
    let flatbuf_size = buffer.len();
    let prefix_size = 8;
    let padding_bytes = pad_to_8(flatbuf_size + prefix_size);
    let aligned_size = flatbuf_size + prefix_size + padding_bytes;

    write_continuation(&mut writer, (aligned_size - prefix_size) as i32).await?;

    if flatbuf_size > 0 {
        writer.write_all(&buffer).await?;
    }
    writer.write_all(&[0u8; 8][..padding_bytes]).await?;

    let body_len = if !encoded.arrow_data.is_empty() {
        write_body_buffers(writer, &encoded.arrow_data, alignment).await?
    } else {
        0
    };

    Ok((aligned_size, body_len))
}

async fn write_body_buffers<W: AsyncWrite + Unpin + Send>(
    mut writer: W,
    data: &[u8],
    alignment: usize,
) -> Result<usize> {
    let len = data.len();
    let pad_len = pad_to_alignment(len, alignment);

    writer.write_all(data).await?;
    if pad_len > 0 {
        writer.write_all(&vec![0u8; pad_len][..]).await?;
    }

    Ok(len + pad_len)
}

/// Write the continuation marker followed by `total_len`.
pub async fn write_continuation<W: AsyncWrite + Unpin + Send>(
    mut writer: W,
    total_len: i32,
) -> Result<usize> {
    writer.write_all(&CONTINUATION_MARKER).await?;
    writer.write_all(&total_len.to_le_bytes()[..]).await?;
    Ok(8)
}
