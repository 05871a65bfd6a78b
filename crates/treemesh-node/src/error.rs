//! Error types for the mesh engine.

use treemesh_core::{ChipId, CodecError, SocketToken};

use crate::handlers::TransportError;

/// Errors surfaced by the connection engine.
///
/// All of these are local to the operation that detected them; the caller
/// reports and moves on to the next event. None of them take the process
/// down and none of them evict a connection by themselves.
#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("no connection owns {0}")]
    UnknownLink(SocketToken),
    #[error("unknown message type {0}")]
    UnknownKind(u8),
    #[error("unicast message without a destination")]
    MissingDestination,
    #[error("no route to node {0}")]
    NoRoute(ChipId),
    #[error("node {0} is already connected through another link")]
    DuplicateIdentity(ChipId),
    #[error("send queue full for node {0}")]
    SendQueueFull(ChipId),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("configuration error: {0}")]
    Config(String),
}
