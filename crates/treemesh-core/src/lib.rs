//! Protocol layer for the treemesh network stack.
//!
//! Contains the wire envelope codec, the recursive subtree codec used for
//! topology announcements, and the identity newtypes shared by every other
//! crate. No I/O, no runtime — everything here is pure data.

pub mod envelope;
pub mod error;
pub mod subtree;
pub mod types;

pub use envelope::{Envelope, MessageKind};
pub use error::CodecError;
pub use subtree::SubtreeNode;
pub use types::{ChipId, NodeTime, SocketToken};
