use anyhow::Result;

/// Upper bound on decoded snapshot size; corrupt length prefixes fail instead of allocating.
const DECODE_LIMIT: usize = 256 * 1024 * 1024;

/// Get the bincode configuration
fn get_config() -> impl bincode::config::Config {
    bincode::config::standard().with_limit::<DECODE_LIMIT>()
}

/// Encode a value with bincode v2.0 through its serde implementation
///
/// # Errors
///
/// Returns an error if encoding fails
pub fn serialize<T: serde::Serialize>(data: &T) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(data, get_config()).map_err(Into::into)
}

/// Decode a value previously written by [`serialize`]
///
/// # Errors
///
/// Returns an error if:
/// - The bytes are truncated or malformed
/// - Trailing bytes remain after the value
pub fn deserialize<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let (result, bytes_read) = bincode::serde::decode_from_slice(bytes, get_config())?;
    if bytes_read != bytes.len() {
        anyhow::bail!(
            "Trailing data after encoded value ({} of {} bytes consumed)",
            bytes_read,
            bytes.len()
        );
    }
    Ok(result)
}
