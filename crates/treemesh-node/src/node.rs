//! Event-loop driver for the engine.
//!
//! The engine itself is synchronous; this loop is what serializes its
//! entry points. Socket events arrive on an mpsc channel from the
//! transport's I/O tasks, the maintenance tick comes from an interval
//! timer, and every handler runs to completion before the next event is
//! taken — the cooperative model the table relies on.

use tokio::sync::mpsc;

use treemesh_core::SocketToken;

use crate::handlers::{MeshCallbacks, SyncEngine, Transport};
use crate::mesh::Mesh;

/// One occurrence on the socket layer, reported by the transport's I/O
/// side.
#[derive(Debug)]
pub enum SocketEvent {
    /// A new link was established.
    Opened {
        socket: SocketToken,
        is_access_point_side: bool,
    },
    /// One complete frame arrived.
    Data { socket: SocketToken, bytes: Vec<u8> },
    /// A previously accepted frame finished transmitting.
    TransmitComplete { socket: SocketToken },
    /// The remote end (or the OS) closed the connection. The record is
    /// evicted by the next maintenance sweep, which sees the closed state
    /// through the transport seam.
    Closed { socket: SocketToken },
}

/// Owns a [`Mesh`] and drives it from socket events and the periodic
/// maintenance tick.
pub struct MeshDriver<T, S, C> {
    mesh: Mesh<T, S, C>,
    events: mpsc::Receiver<SocketEvent>,
}

impl<T, S, C> MeshDriver<T, S, C>
where
    T: Transport,
    S: SyncEngine,
    C: MeshCallbacks,
{
    pub fn new(mesh: Mesh<T, S, C>, events: mpsc::Receiver<SocketEvent>) -> Self {
        Self { mesh, events }
    }

    pub fn mesh(&self) -> &Mesh<T, S, C> {
        &self.mesh
    }

    pub fn mesh_mut(&mut self) -> &mut Mesh<T, S, C> {
        &mut self.mesh
    }

    /// Run until the event channel closes. Returns the engine so callers
    /// can inspect or restart it.
    pub async fn run(mut self) -> Mesh<T, S, C> {
        let tick = std::time::Duration::from_millis(self.mesh.config().tick_interval_ms);
        let mut maintenance_interval = tokio::time::interval(tick);
        // The first tick of a tokio interval fires immediately.
        maintenance_interval.tick().await;

        loop {
            tokio::select! {
                event = self.events.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => {
                            tracing::info!("event channel closed, stopping driver");
                            break;
                        }
                    }
                }
                _ = maintenance_interval.tick() => {
                    self.mesh.run_maintenance();
                }
            }
        }

        self.mesh
    }

    fn handle_event(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Opened {
                socket,
                is_access_point_side,
            } => {
                self.mesh.add_connection(socket, is_access_point_side);
            }
            SocketEvent::Data { socket, bytes } => {
                if let Err(e) = self.mesh.handle_incoming(socket, &bytes) {
                    tracing::debug!(socket = %socket, "inbound frame dropped: {e}");
                }
            }
            SocketEvent::TransmitComplete { socket } => {
                if let Err(e) = self.mesh.transmit_complete(socket) {
                    tracing::debug!(socket = %socket, "transmit completion: {e}");
                }
            }
            SocketEvent::Closed { socket } => {
                tracing::debug!(socket = %socket, "transport reported close");
            }
        }
    }
}
