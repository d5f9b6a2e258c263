// Bincode 2 helpers plus the versioned envelope used for every file the node writes.
use crate::error::{NodeError, Result};
use serde::{Deserialize, Serialize};

/// Envelope layout: magic (4) | version u16 BE (2) | payload length u64 BE (8) | payload.
const ENVELOPE_HEADER_LEN: usize = 4 + 2 + 8;

/// Serialize data using bincode 2.0 with standard configuration
pub fn serialize<T: Serialize + bincode::Encode>(data: &T) -> Result<Vec<u8>> {
    let config = bincode::config::standard();
    bincode::encode_to_vec(data, config)
        .map_err(|e| NodeError::Serialization(format!("Serialization failed: {e}")))
}

/// Deserialize data using bincode 2.0 with standard configuration
pub fn deserialize<T>(bytes: &[u8]) -> Result<T>
where
    T: for<'de> Deserialize<'de> + bincode::Decode<()>,
{
    let config = bincode::config::standard();
    let (data, read) = bincode::decode_from_slice(bytes, config)
        .map_err(|e| NodeError::Serialization(format!("Deserialization failed: {e}")))?;
    if read != bytes.len() {
        return Err(NodeError::Serialization(format!(
            "Deserialization left {} trailing bytes",
            bytes.len() - read
        )));
    }
    Ok(data)
}

/// Wrap `data` in a magic/version/length header.
pub fn seal<T: Serialize + bincode::Encode>(
    magic: &[u8; 4],
    version: u16,
    data: &T,
) -> Result<Vec<u8>> {
    let payload = serialize(data)?;
    let mut bytes = Vec::with_capacity(ENVELOPE_HEADER_LEN + payload.len());
    bytes.extend_from_slice(magic);
    bytes.extend_from_slice(&version.to_be_bytes());
    bytes.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Check the header written by [`seal`] and decode the payload.
pub fn open<T>(magic: &[u8; 4], version: u16, bytes: &[u8]) -> Result<T>
where
    T: for<'de> Deserialize<'de> + bincode::Decode<()>,
{
    if bytes.len() < ENVELOPE_HEADER_LEN {
        return Err(NodeError::Storage(format!(
            "File too short: {} bytes",
            bytes.len()
        )));
    }
    if &bytes[0..4] != magic {
        return Err(NodeError::Storage("Unrecognised file magic".to_string()));
    }

    let mut version_bytes = [0u8; 2];
    version_bytes.copy_from_slice(&bytes[4..6]);
    let found_version = u16::from_be_bytes(version_bytes);
    if found_version != version {
        return Err(NodeError::Storage(format!(
            "Unsupported format version {found_version} (expected {version})"
        )));
    }

    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&bytes[6..ENVELOPE_HEADER_LEN]);
    let declared = u64::from_be_bytes(len_bytes);
    let payload = &bytes[ENVELOPE_HEADER_LEN..];
    if payload.len() as u64 != declared {
        return Err(NodeError::Storage(format!(
            "Payload length mismatch: header says {declared}, found {}",
            payload.len()
        )));
    }

    deserialize(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    const MAGIC: &[u8; 4] = b"TEST";

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
    struct TestData {
        id: u64,
        name: String,
        values: Vec<i32>,
    }

    fn sample() -> TestData {
        TestData {
            id: 42,
            name: "test".to_string(),
            values: vec![1, 2, 3, 4, 5],
        }
    }

    #[test]
    fn test_serialize_deserialize() {
        let original = sample();
        let serialized = serialize(&original).expect("Serialization should work");
        let deserialized: TestData = deserialize(&serialized).expect("Deserialization should work");
        assert_eq!(original, deserialized);
    }

    #[test]
    fn test_deserialize_invalid_data() {
        let invalid_bytes = vec![0xFF, 0xFF, 0xFF, 0xFF];
        let result: Result<TestData> = deserialize(&invalid_bytes);
        assert!(result.is_err());
    }

    #[test]
    fn test_envelope_round_trip() {
        let sealed = seal(MAGIC, 1, &sample()).unwrap();
        assert_eq!(&sealed[0..4], MAGIC);
        let opened: TestData = open(MAGIC, 1, &sealed).unwrap();
        assert_eq!(opened, sample());
    }

    #[test]
    fn test_envelope_rejects_truncation() {
        let sealed = seal(MAGIC, 1, &sample()).unwrap();
        let truncated = &sealed[..sealed.len() - 1];
        let result: Result<TestData> = open(MAGIC, 1, truncated);
        assert!(matches!(result, Err(NodeError::Storage(_))));
    }

    #[test]
    fn test_envelope_rejects_wrong_magic_and_version() {
        let sealed = seal(MAGIC, 1, &sample()).unwrap();
        let wrong_magic: Result<TestData> = open(b"NOPE", 1, &sealed);
        assert!(matches!(wrong_magic, Err(NodeError::Storage(_))));
        let wrong_version: Result<TestData> = open(MAGIC, 2, &sealed);
        assert!(matches!(wrong_version, Err(NodeError::Storage(_))));
    }
}
