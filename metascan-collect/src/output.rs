//! Snapshot files: JSON, optionally Zstandard-compressed.

use metascan_core::error::MetaScanError;
use metascan_core::{Result, SchemaSnapshot};
use std::path::Path;

/// Extension marking a compressed snapshot.
pub const COMPRESSED_EXTENSION: &str = "zst";

/// True when `path` names a compressed snapshot.
pub fn is_compressed(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(COMPRESSED_EXTENSION))
}

/// Writes a snapshot as pretty JSON, compressed when `compress` is set.
pub async fn save_snapshot(snapshot: &SchemaSnapshot, path: &Path, compress: bool) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot).map_err(|e| MetaScanError::Serialization {
        context: "schema snapshot".to_string(),
        source: e,
    })?;

    let bytes = if compress {
        compress_bytes(json.as_bytes())?
    } else {
        json.into_bytes()
    };

    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| MetaScanError::Io {
            context: format!("Failed to write to {}", path.display()),
            source: e,
        })
}

/// Reads a snapshot written by [`save_snapshot`]. Files ending in `.zst`
/// are decompressed first.
pub async fn load_snapshot(path: &Path) -> Result<SchemaSnapshot> {
    let bytes = tokio::fs::read(path).await.map_err(|e| MetaScanError::Io {
        context: format!("Failed to read {}", path.display()),
        source: e,
    })?;

    let json = if is_compressed(path) {
        decompress_bytes(&bytes)?
    } else {
        bytes
    };

    serde_json::from_slice(&json).map_err(|e| MetaScanError::Serialization {
        context: format!("{} is not a schema snapshot", path.display()),
        source: e,
    })
}

#[cfg(feature = "compression")]
fn compress_bytes(data: &[u8]) -> Result<Vec<u8>> {
    use std::io::Write;

    let mut encoder = zstd::Encoder::new(Vec::new(), 3)
        .map_err(|e| MetaScanError::configuration(format!("Failed to create compressor: {}", e)))?;
    encoder
        .write_all(data)
        .map_err(|e| MetaScanError::configuration(format!("Compression failed: {}", e)))?;
    encoder.finish().map_err(|e| {
        MetaScanError::configuration(format!("Compression finalization failed: {}", e))
    })
}

#[cfg(not(feature = "compression"))]
fn compress_bytes(_data: &[u8]) -> Result<Vec<u8>> {
    Err(MetaScanError::configuration(
        "Compression not available. Compile with --features compression",
    ))
}

#[cfg(feature = "compression")]
fn decompress_bytes(data: &[u8]) -> Result<Vec<u8>> {
    zstd::decode_all(data)
        .map_err(|e| MetaScanError::configuration(format!("Decompression failed: {}", e)))
}

#[cfg(not(feature = "compression"))]
fn decompress_bytes(_data: &[u8]) -> Result<Vec<u8>> {
    Err(MetaScanError::configuration(
        "Compressed snapshots need --features compression",
    ))
}
