//! Error handling tests for coldsync-compression

use crate::archive::{extract_archive, ArchiveWriter};
use crate::streaming::StreamCodec;
use coldsync_types::ErrorKind;
use std::io::Cursor;

/// Random bytes are not a zstd frame
#[tokio::test]
async fn test_invalid_compression_data() {
    let codec = StreamCodec::default();
    let invalid_data = vec![0xFF; 100];

    let error = codec
        .decompress_to_vec(Cursor::new(invalid_data))
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Compression);
}

/// A damaged magic number is rejected
#[tokio::test]
async fn test_corrupted_frame_header() {
    let codec = StreamCodec::default();
    let mut corrupted = codec.compress_bytes(b"Hello, world! This is test data.").unwrap();
    corrupted[0] = corrupted[0].wrapping_add(1);

    let result = codec.decompress_to_vec(Cursor::new(corrupted)).await;
    assert!(matches!(result, Err(e) if e.kind() == ErrorKind::Compression));
}

/// A frame cut short fails instead of yielding partial output
#[tokio::test]
async fn test_truncated_compression_data() {
    let codec = StreamCodec::default();
    let data = b"Truncation test data that is long enough to matter. ".repeat(200);
    let compressed = codec.compress_bytes(&data).unwrap();
    let truncated = &compressed[..compressed.len() / 2];

    let result = codec.decompress_to_vec(Cursor::new(truncated.to_vec())).await;
    assert!(result.is_err());
}

/// Decompressed output that is not a container surfaces as an archive error
#[tokio::test]
async fn test_compressed_non_archive() {
    let codec = StreamCodec::default();
    let compressed = codec.compress_bytes(b"plain text, no zip here").unwrap();
    let payload = codec.decompress_to_vec(Cursor::new(compressed)).await.unwrap();

    let dest = tempfile::TempDir::new().unwrap();
    let error = extract_archive(payload, dest.path()).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Archive);
}

/// Appending a file that does not exist fails without poisoning the writer
#[test]
fn test_append_missing_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut writer = ArchiveWriter::new();

    let error = writer
        .append_file("missing.txt", &dir.path().join("missing.txt"))
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Io);

    writer.append_entry("present.txt", 2, &b"ok"[..]).unwrap();
    let (_, summary) = writer.finish().unwrap();
    assert_eq!(summary.entries, 1);
}
