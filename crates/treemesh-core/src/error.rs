//! Error types for the protocol layer.

/// Errors produced while encoding or decoding wire data.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("envelope decode failed: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("envelope encode failed: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("subtree text parse failed: {0}")]
    SubtreeParse(#[source] serde_json::Error),
}
