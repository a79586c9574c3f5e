use serde::de::DeserializeOwned;
use tracing::debug;

/// Response types a call can produce. Anything deserializable from JSON
/// qualifies; other types are rejected when the call is compiled.
pub trait Decodable: DeserializeOwned + Send + 'static {}

impl<T: DeserializeOwned + Send + 'static> Decodable for T {}

/// Structural JSON decode. Any mismatch yields `None`.
pub fn decode<T: Decodable>(bytes: &[u8]) -> Option<T> {
    decode_with_reason(bytes).ok()
}

pub(crate) fn decode_with_reason<T: Decodable>(bytes: &[u8]) -> Result<T, String> {
    serde_json::from_slice(bytes).map_err(|e| {
        debug!(
            type_name = std::any::type_name::<T>(),
            error = %e,
            "decode failed"
        );
        e.to_string()
    })
}
