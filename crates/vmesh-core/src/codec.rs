// ── Payload codec ──
//
// All store payloads are JSON. Failures map to the non-retryable
// `Serialization` variant, tagged with the record type for diagnostics.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::TopologyError;

pub(crate) fn encode<T: Serialize>(value: &T, what: &'static str) -> Result<Vec<u8>, TopologyError> {
    serde_json::to_vec(value).map_err(|source| TopologyError::Serialization { what, source })
}

pub(crate) fn decode<T: DeserializeOwned>(
    data: &[u8],
    what: &'static str,
) -> Result<T, TopologyError> {
    serde_json::from_slice(data).map_err(|source| TopologyError::Serialization { what, source })
}
