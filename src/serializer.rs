//! Wire codec for the on-disk shape.
//!
//! The file holds exactly one JSON object: top-level keys are the store's
//! keys, values are the stored attribute bags. No header, no versioning, no
//! checksum. Implement [`WireCodec`] to swap the encoding while keeping that
//! shape.

use serde_json::{Map, Value};

/// Converts the store's snapshot to/from bytes for persistence.
pub trait WireCodec: Send + Sync {
    /// Encode a snapshot to bytes.
    fn encode(&self, data: &Map<String, Value>) -> serde_json::Result<Vec<u8>>;

    /// Decode bytes back into a snapshot. Anything that is not a single
    /// well-formed JSON object is an error.
    fn decode(&self, bytes: &[u8]) -> serde_json::Result<Map<String, Value>>;
}

/// JSON codec with optional pretty-printing.
///
/// Pretty is the default: the file is meant to be read and diffed by humans.
#[derive(Clone, Debug)]
pub struct JsonCodec {
    pretty: bool,
}

impl JsonCodec {
    /// Indented, human-diffable JSON.
    #[must_use]
    pub fn new() -> Self {
        Self { pretty: true }
    }

    /// Single-line JSON, no extra whitespace.
    #[must_use]
    pub fn compact() -> Self {
        Self { pretty: false }
    }
}

impl Default for JsonCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl WireCodec for JsonCodec {
    fn encode(&self, data: &Map<String, Value>) -> serde_json::Result<Vec<u8>> {
        if self.pretty {
            serde_json::to_vec_pretty(data)
        } else {
            serde_json::to_vec(data)
        }
    }

    fn decode(&self, bytes: &[u8]) -> serde_json::Result<Map<String, Value>> {
        serde_json::from_slice(bytes)
    }
}
