//! # Persistence Format
//!
//! Binary serialization for participant lifecycle state.
//!
//! Format: Header (5 bytes) + postcard-serialized state.
//! - 4 bytes: Magic ("STWD")
//! - 1 byte: Version
//!
//! Size and header are validated before the payload is decoded, so corrupted
//! or hostile input is rejected without allocating for it.

use crate::primitives;
use crate::state::ParticipantLifecycleState;
use crate::types::StewardError;

/// Maximum accepted snapshot size (16 MiB).
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Header length in bytes.
const HEADER_LEN: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The persistence header precedes every serialized state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a header with the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), StewardError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(StewardError::DeserializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(StewardError::DeserializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StewardError> {
        if bytes.len() < HEADER_LEN {
            return Err(StewardError::DeserializationError(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a state to bytes (header + payload).
pub fn state_to_bytes(state: &ParticipantLifecycleState) -> Result<Vec<u8>, StewardError> {
    let payload =
        postcard::to_stdvec(state).map_err(|e| StewardError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_LEN + payload.len());
    result.extend_from_slice(&PersistenceHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize a state from bytes.
pub fn state_from_bytes(bytes: &[u8]) -> Result<ParticipantLifecycleState, StewardError> {
    if bytes.len() < HEADER_LEN {
        return Err(StewardError::DeserializationError(format!(
            "Data too short: minimum {} bytes required",
            HEADER_LEN
        )));
    }
    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(StewardError::DeserializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }

    PersistenceHeader::from_bytes(bytes)?.validate()?;

    postcard::from_bytes(&bytes[HEADER_LEN..]).map_err(|e| {
        StewardError::DeserializationError(format!("Failed to decode participant state: {}", e))
    })
}

// =============================================================================
// INTEGRITY
// =============================================================================

/// Deterministic 64-bit checksum (FNV-1a) of the serialized state.
///
/// Detects accidental corruption only. Use [`state_crypto_hash`] where
/// collision resistance matters.
pub fn state_checksum(state: &ParticipantLifecycleState) -> Result<u64, StewardError> {
    Ok(bytes_checksum(&state_to_bytes(state)?))
}

/// FNV-1a over raw bytes.
#[must_use]
pub fn bytes_checksum(data: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    data.iter().fold(OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(PRIME)
    })
}

/// BLAKE3 hex digest of the serialized state (64 characters).
#[cfg(feature = "crypto-hash")]
pub fn state_crypto_hash(state: &ParticipantLifecycleState) -> Result<String, StewardError> {
    let data = state_to_bytes(state)?;
    Ok(blake3::hash(&data).to_hex().to_string())
}

// =============================================================================
// TESTS
// =============================================================================
