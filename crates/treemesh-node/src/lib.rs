//! Connection and routing engine for a self-organizing tree-topology
//! mesh over point-to-point streaming sockets.
//!
//! The engine keeps a table of live peer links, drives a per-link
//! handshake/synchronization state machine from a periodic tick, routes
//! unicast and broadcast traffic across the tree, and accounts for every
//! descendant node reachable through each link. The bodies of the sync
//! algorithms, the socket layer, and the application sit behind the
//! traits in [`handlers`].

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod maintenance;
pub mod mesh;
pub mod node;
pub mod routing;
pub mod send;
pub mod table;
pub mod testing;

pub use config::MeshConfig;
pub use connection::{ConnectionRecord, SyncStatus};
pub use error::MeshError;
pub use handlers::{MeshCallbacks, SyncEngine, Transport, TransportError};
pub use mesh::Mesh;
pub use node::{MeshDriver, SocketEvent};
pub use table::{ConnId, ConnectionTable};
