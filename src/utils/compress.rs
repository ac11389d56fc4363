use anyhow::Result;

/// Compress bytes using zstd compression
///
/// # Errors
///
/// Returns an error if compression fails
pub fn compress_bytes(data: &[u8], level: i32) -> Result<Vec<u8>> {
    zstd::encode_all(data, level).map_err(Into::into)
}

/// Decompress bytes compressed with zstd
///
/// # Errors
///
/// Returns an error if the input is not a valid zstd frame
pub fn decompress_bytes(data: &[u8]) -> Result<Vec<u8>> {
    zstd::decode_all(data).map_err(Into::into)
}
