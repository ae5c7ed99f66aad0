//! Body buffer compression.
//!
//! A compressed body buffer is an 8-byte little-endian `i64` prefix followed by a payload.
//! The prefix is the uncompressed length of the payload, or `-1` when the payload is stored
//! uncompressed.
use crate::buffer::Buffer;
use crate::error::{Error, Result};

use super::write::Compression;

/// The prefix of a buffer stored without compression.
const UNCOMPRESSED: i64 = -1;
const PREFIX_LENGTH: usize = 8;

fn codec_error(codec: &str, error: std::io::Error) -> Error {
    Error::Compression(format!("{codec}: {error}"))
}

#[cfg(feature = "io_ipc_compression")]
#[cfg_attr(docsrs, doc(cfg(feature = "io_ipc_compression")))]
pub fn decompress_lz4(input_buf: &[u8], output_buf: &mut [u8]) -> Result<()> {
    use std::io::Read;
    let mut decoder = lz4::Decoder::new(input_buf).map_err(|e| codec_error("lz4", e))?;
    decoder
        .read_exact(output_buf)
        .map_err(|e| codec_error("lz4", e))
}

#[cfg(feature = "io_ipc_compression")]
#[cfg_attr(docsrs, doc(cfg(feature = "io_ipc_compression")))]
pub fn decompress_zstd(input_buf: &[u8], output_buf: &mut [u8]) -> Result<()> {
    use std::io::Read;
    let mut decoder = zstd::Decoder::new(input_buf).map_err(|e| codec_error("zstd", e))?;
    decoder
        .read_exact(output_buf)
        .map_err(|e| codec_error("zstd", e))
}

#[cfg(not(feature = "io_ipc_compression"))]
pub fn decompress_lz4(_input_buf: &[u8], _output_buf: &mut [u8]) -> Result<()> {
    Err(Error::Compression("The crate was compiled without IPC compression. Use `io_ipc_compression` to read compressed IPC.".to_string()))
}

#[cfg(not(feature = "io_ipc_compression"))]
pub fn decompress_zstd(_input_buf: &[u8], _output_buf: &mut [u8]) -> Result<()> {
    Err(Error::Compression("The crate was compiled without IPC compression. Use `io_ipc_compression` to read compressed IPC.".to_string()))
}

#[cfg(feature = "io_ipc_compression")]
#[cfg_attr(docsrs, doc(cfg(feature = "io_ipc_compression")))]
pub fn compress_lz4(input_buf: &[u8], output_buf: &mut Vec<u8>) -> Result<()> {
    use std::io::Write;

    let mut encoder = lz4::EncoderBuilder::new()
        .build(output_buf)
        .map_err(|e| codec_error("lz4", e))?;
    encoder
        .write_all(input_buf)
        .map_err(|e| codec_error("lz4", e))?;
    encoder.finish().1.map_err(|e| codec_error("lz4", e))
}

#[cfg(feature = "io_ipc_compression")]
#[cfg_attr(docsrs, doc(cfg(feature = "io_ipc_compression")))]
pub fn compress_zstd(input_buf: &[u8], output_buf: &mut Vec<u8>) -> Result<()> {
    zstd::stream::copy_encode(input_buf, output_buf, 0).map_err(|e| codec_error("zstd", e))
}

#[cfg(not(feature = "io_ipc_compression"))]
pub fn compress_lz4(_input_buf: &[u8], _output_buf: &mut Vec<u8>) -> Result<()> {
    Err(Error::Compression("The crate was compiled without IPC compression. Use `io_ipc_compression` to write compressed IPC.".to_string()))
}

#[cfg(not(feature = "io_ipc_compression"))]
pub fn compress_zstd(_input_buf: &[u8], _output_buf: &mut Vec<u8>) -> Result<()> {
    Err(Error::Compression("The crate was compiled without IPC compression. Use `io_ipc_compression` to write compressed IPC.".to_string()))
}

/// Compresses `input` with `compression`, returning the prefixed payload.
///
/// When `min_space_savings` is set and the prefixed payload saves less than that fraction
/// of `input`, the raw bytes are returned behind a `-1` prefix instead.
pub fn compress_buffer(
    compression: Compression,
    input: &[u8],
    min_space_savings: Option<f64>,
) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(PREFIX_LENGTH + input.len());
    output.extend_from_slice(&(input.len() as i64).to_le_bytes());
    if input.is_empty() {
        return Ok(output);
    }

    match compression {
        Compression::LZ4 => compress_lz4(input, &mut output)?,
        Compression::ZSTD => compress_zstd(input, &mut output)?,
    }

    if let Some(min_space_savings) = min_space_savings {
        // the prefix counts against the savings
        let savings = 1.0 - output.len() as f64 / input.len() as f64;
        if savings < min_space_savings {
            tracing::trace!(
                length = input.len(),
                savings,
                "storing body buffer uncompressed"
            );
            output.clear();
            output.extend_from_slice(&UNCOMPRESSED.to_le_bytes());
            output.extend_from_slice(input);
        }
    }
    Ok(output)
}

/// Decompresses a prefixed body buffer. Buffers stored raw are returned without copying.
pub fn decompress_buffer(compression: Compression, buffer: Buffer) -> Result<Buffer> {
    if buffer.is_empty() {
        return Ok(buffer);
    }
    if buffer.len() < PREFIX_LENGTH {
        return Err(Error::Compression(format!(
            "A compressed buffer must have at least {PREFIX_LENGTH} bytes but it has {}",
            buffer.len()
        )));
    }
    let mut prefix = [0u8; PREFIX_LENGTH];
    prefix.copy_from_slice(&buffer.as_slice()[..PREFIX_LENGTH]);
    let length = i64::from_le_bytes(prefix);

    if length == UNCOMPRESSED {
        let payload_length = buffer.len() - PREFIX_LENGTH;
        return Ok(buffer.sliced(PREFIX_LENGTH, payload_length));
    }
    let length = usize::try_from(length).map_err(|_| {
        Error::Compression(format!("Invalid uncompressed length {length}"))
    })?;
    if length == 0 {
        return Ok(Buffer::new());
    }

    let mut output = vec![];
    output.try_reserve(length)?;
    output.resize(length, 0);
    let payload = &buffer.as_slice()[PREFIX_LENGTH..];
    match compression {
        Compression::LZ4 => decompress_lz4(payload, &mut output)?,
        Compression::ZSTD => decompress_zstd(payload, &mut output)?,
    }
    Ok(output.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "io_ipc_compression")]
    #[test]
    #[cfg_attr(miri, ignore)] // ZSTD uses foreign calls that miri does not support
    fn round_trip_zstd() {
        let data: Vec<u8> = (0..200u8).map(|x| x % 10).collect();
        let mut buffer = vec![];
        compress_zstd(&data, &mut buffer).unwrap();

        let mut result = vec![0; 200];
        decompress_zstd(&buffer, &mut result).unwrap();
        assert_eq!(data, result);
    }

    #[cfg(feature = "io_ipc_compression")]
    #[test]
    #[cfg_attr(miri, ignore)] // LZ4 uses foreign calls that miri does not support
    fn round_trip_lz4() {
        let data: Vec<u8> = (0..200u8).map(|x| x % 10).collect();
        let mut buffer = vec![];
        compress_lz4(&data, &mut buffer).unwrap();

        let mut result = vec![0; 200];
        decompress_lz4(&buffer, &mut result).unwrap();
        assert_eq!(data, result);
    }

    #[cfg(feature = "io_ipc_compression")]
    #[test]
    #[cfg_attr(miri, ignore)]
    fn prefixed() -> Result<()> {
        let data: Vec<u8> = (0..1000u32).map(|x| (x % 7) as u8).collect();
        for codec in [Compression::LZ4, Compression::ZSTD] {
            let compressed = compress_buffer(codec, &data, None)?;
            assert_eq!(&compressed[..8], &(data.len() as i64).to_le_bytes());
            let result = decompress_buffer(codec, compressed.into())?;
            assert_eq!(result.as_slice(), data.as_slice());
        }
        Ok(())
    }

    #[cfg(feature = "io_ipc_compression")]
    #[test]
    #[cfg_attr(miri, ignore)]
    fn incompressible_is_stored_raw() -> Result<()> {
        let data = vec![7u8, 3, 9];
        let compressed = compress_buffer(Compression::LZ4, &data, Some(0.5))?;
        assert_eq!(&compressed[..8], &(-1i64).to_le_bytes());
        assert_eq!(&compressed[8..], data.as_slice());

        let result = decompress_buffer(Compression::LZ4, compressed.into())?;
        assert_eq!(result.as_slice(), data.as_slice());
        Ok(())
    }

    #[cfg(feature = "io_ipc_compression")]
    #[test]
    #[cfg_attr(miri, ignore)]
    fn savings_include_the_prefix() -> Result<()> {
        let data: Vec<u8> = (0..4000u32).map(|x| (x % 251) as u8 ^ (x / 7) as u8).collect();
        let compressed = compress_buffer(Compression::ZSTD, &data, None)?;
        let payload = (compressed.len() - 8) as f64;
        let n = data.len() as f64;

        // saved enough when the prefix is ignored, not enough when it is counted
        let threshold = 1.0 - (payload + 4.0) / n;
        let result = compress_buffer(Compression::ZSTD, &data, Some(threshold))?;
        assert_eq!(&result[..8], &(-1i64).to_le_bytes());
        assert_eq!(&result[8..], data.as_slice());

        let threshold = 1.0 - (payload + 12.0) / n;
        let result = compress_buffer(Compression::ZSTD, &data, Some(threshold))?;
        assert_eq!(result, compressed);
        Ok(())
    }

    #[test]
    fn empty() -> Result<()> {
        let compressed = compress_buffer(Compression::ZSTD, &[], Some(0.1))?;
        assert_eq!(compressed, 0i64.to_le_bytes().to_vec());
        assert!(decompress_buffer(Compression::ZSTD, compressed.into())?.is_empty());
        assert!(decompress_buffer(Compression::ZSTD, Buffer::new())?.is_empty());
        Ok(())
    }
}
