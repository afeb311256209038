use std::io::{Error, ErrorKind, Result as IoResult};

/// Compression of persisted span blobs
pub trait VoxelCompressor: Send + Sync {
    fn compress(&self, data: &[u8]) -> IoResult<Vec<u8>>;

    fn decompress(&self, data: &[u8]) -> IoResult<Vec<u8>>;
}

/// LZ4 block compression with the uncompressed size prepended
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Compressor;

impl VoxelCompressor for Lz4Compressor {
    fn compress(&self, data: &[u8]) -> IoResult<Vec<u8>> {
        Ok(lz4_flex::compress_prepend_size(data))
    }

    fn decompress(&self, data: &[u8]) -> IoResult<Vec<u8>> {
        lz4_flex::decompress_size_prepended(data).map_err(|e| Error::new(ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lz4_restores_input() {
        let data: Vec<u8> = (0..512u32).flat_map(|i| (i % 7).to_be_bytes()).collect();
        let compressed = Lz4Compressor.compress(&data).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(Lz4Compressor.decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn test_corrupt_input_is_invalid_data() {
        let err = Lz4Compressor.decompress(&[10, 0, 0, 0, 0xff]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }
}
