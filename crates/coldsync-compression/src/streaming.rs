//! Streaming compression and decompression
//!
//! Every remote object is one zstd stream over its whole payload. For grouped
//! backups the payload is an uncompressed archive container, compressed as a
//! whole rather than per entry. zstd frames are self-describing, so
//! decompression needs no size hint or dictionary.
//!
//! # Memory bound
//!
//! The store client computes the payload length and checksum before sending,
//! so an upload is fully materialised in memory first. Peak memory for one
//! upload is therefore the compressed size of the object plus, for grouped
//! backups, the uncompressed archive it was built from. With `N` workers the
//! bound is roughly `N * (largest group + its compressed size)`. Choose the
//! grouping depth so that no single group exceeds the available headroom.
//!
//! Downloads do not have this constraint: flat restores stream straight from
//! the network through the decoder into the destination file.

use coldsync_types::{BufferSize, CompressionLevel, Error, Result};
use std::io::{Read, Write};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for streaming compression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StreamingConfig {
    /// zstd compression level
    pub level: CompressionLevel,
    /// Buffer size for streaming operations
    pub buffer_size: BufferSize,
}

/// zstd codec applied to whole object payloads
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamCodec {
    config: StreamingConfig,
}

impl StreamCodec {
    /// Create a codec with the given configuration
    pub fn new(config: StreamingConfig) -> Self {
        Self { config }
    }

    /// Compress everything `reader` yields into one in-memory zstd frame.
    ///
    /// Blocking; call it from a blocking worker.
    pub fn compress_reader<R: Read>(&self, mut reader: R) -> Result<Vec<u8>> {
        let mut encoder = zstd::stream::Encoder::new(Vec::new(), i32::from(self.config.level.get()))
            .map_err(|e| Error::compression(format!("Failed to create zstd encoder: {}", e)))?;

        let mut input_buffer = vec![0u8; self.config.buffer_size.get()];
        let mut total_read = 0u64;

        loop {
            let bytes_read = match reader.read(&mut input_buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::from(e)),
            };

            encoder
                .write_all(&input_buffer[..bytes_read])
                .map_err(|e| Error::compression(format!("zstd compression failed: {}", e)))?;
            total_read += bytes_read as u64;
        }

        let compressed = encoder
            .finish()
            .map_err(|e| Error::compression(format!("zstd finalization failed: {}", e)))?;

        debug!(
            "Compressed {} bytes into {} bytes",
            total_read,
            compressed.len()
        );
        Ok(compressed)
    }

    /// Compress an in-memory buffer
    pub fn compress_bytes(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.compress_reader(data)
    }

    /// Decompress data from reader to writer, returning the bytes written
    pub async fn decompress_stream<R, W>(&self, reader: R, mut writer: W) -> Result<u64>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let buffer_size = self.config.buffer_size.get();
        let mut decoder = async_compression::tokio::bufread::ZstdDecoder::new(
            BufReader::with_capacity(buffer_size, reader),
        );
        decoder.multiple_members(true);

        let mut output_buffer = vec![0u8; buffer_size];
        let mut total_written = 0u64;

        loop {
            let bytes_read = decoder
                .read(&mut output_buffer)
                .await
                .map_err(|e| Error::compression(format!("zstd decompression failed: {}", e)))?;

            if bytes_read == 0 {
                break;
            }

            writer
                .write_all(&output_buffer[..bytes_read])
                .await
                .map_err(|e| Error::Io {
                    message: format!("Failed to write output: {}", e),
                })?;
            total_written += bytes_read as u64;
        }

        writer.flush().await.map_err(|e| Error::Io {
            message: format!("Failed to flush output: {}", e),
        })?;

        debug!(
            "Streaming decompression completed, wrote {} bytes",
            total_written
        );
        Ok(total_written)
    }

    /// Decompress a whole stream into memory
    pub async fn decompress_to_vec<R: AsyncRead + Unpin>(&self, reader: R) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.decompress_stream(reader, &mut output).await?;
        Ok(output)
    }
}
