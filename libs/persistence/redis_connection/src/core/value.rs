//! Wire format of cached values: JSON bytes, whatever the backend.

use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};

#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    #[error("Serialization failed: {0}")]
    Serialization(String),
    #[error("Deserialization failed: {0}")]
    Deserialization(String),
}

pub fn encode<T: Serialize>(value: &T) -> Result<Bytes, ValueError> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| ValueError::Serialization(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ValueError> {
    serde_json::from_slice(bytes)
        .map_err(|e| ValueError::Deserialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Priority {
        id: i64,
        name: String,
        level: i32,
    }

    #[test]
    fn test_values_are_stored_as_plain_json() {
        let bytes = encode(&Priority {
            id: 1,
            name: "Low".into(),
            level: 1,
        })
        .unwrap();

        assert_eq!(&bytes[..], br#"{"id":1,"name":"Low","level":1}"#);
    }

    #[test]
    fn test_older_shape_is_a_deserialization_error() {
        let result = decode::<Priority>(br#"{"id":1,"name":"Low"}"#);

        assert!(matches!(result, Err(ValueError::Deserialization(_))));
    }
}
