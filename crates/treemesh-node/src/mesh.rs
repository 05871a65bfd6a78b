//! The connection engine: owns the table and the collaborator seams,
//! and exposes the three entry points the event loop drives — inbound
//! data, transmit completion, and the maintenance tick.
//!
//! Every entry point runs to completion before the next is invoked (the
//! driver serializes them), so the table needs no locking; it only has to
//! tolerate records disappearing between re-resolutions of a handle.

use treemesh_core::{ChipId, Envelope, SocketToken};

use crate::config::MeshSection;
use crate::connection::{ConnectionRecord, SyncStatus};
use crate::dispatch::{self, RouteAction};
use crate::error::MeshError;
use crate::handlers::{MeshCallbacks, SyncEngine, Transport};
use crate::maintenance::{plan_tick, MaintenanceAction, RecordView};
use crate::routing;
use crate::send;
use crate::table::{ConnId, ConnectionTable};

/// The routing and connection engine for one mesh node.
pub struct Mesh<T, S, C> {
    config: MeshSection,
    table: ConnectionTable,
    transport: T,
    sync: S,
    callbacks: C,
}

impl<T, S, C> Mesh<T, S, C>
where
    T: Transport,
    S: SyncEngine,
    C: MeshCallbacks,
{
    /// Build an engine with its collaborators registered.
    pub fn new(config: MeshSection, transport: T, sync: S, callbacks: C) -> Self {
        Self {
            config,
            table: ConnectionTable::new(),
            transport,
            sync,
            callbacks,
        }
    }

    pub fn table(&self) -> &ConnectionTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut ConnectionTable {
        &mut self.table
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn sync(&self) -> &S {
        &self.sync
    }

    pub fn sync_mut(&mut self) -> &mut S {
        &mut self.sync
    }

    pub fn callbacks(&self) -> &C {
        &self.callbacks
    }

    pub fn config(&self) -> &MeshSection {
        &self.config
    }

    /// The transport reported a new link. Creates its record.
    pub fn add_connection(&mut self, socket: SocketToken, is_access_point_side: bool) -> ConnId {
        let now = self.sync.current_node_time();
        let record = ConnectionRecord::new(socket, is_access_point_side, now);
        let id = self.table.insert(record);
        tracing::info!(
            conn = %id,
            socket = %socket,
            ap_side = is_access_point_side,
            "new connection"
        );
        id
    }

    /// Explicit teardown: drop the record and tell the transport to
    /// disconnect. Handles to the record stop resolving immediately.
    pub fn close_connection(&mut self, id: ConnId) {
        if let Some(record) = self.table.remove(id) {
            tracing::info!(conn = %id, chip_id = %record.chip_id, "closing connection");
            self.transport.disconnect(record.socket);
        }
    }

    /// Inbound dispatcher: classify one received frame and route it.
    ///
    /// Errors are reports, not faults — the caller logs and carries on
    /// with the next event. A valid envelope stamps the link's
    /// `last_received_at`, whatever its kind.
    pub fn handle_incoming(&mut self, socket: SocketToken, raw: &[u8]) -> Result<(), MeshError> {
        let Some(conn) = self.table.find_by_socket(socket) else {
            tracing::warn!(socket = %socket, "received from unknown connection, dropping");
            return Err(MeshError::UnknownLink(socket));
        };

        let envelope = match Envelope::decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(conn = %conn, "undecodable envelope, dropping: {e}");
                return Err(e.into());
            }
        };

        match dispatch::classify(&envelope, self.sync.own_chip_id()) {
            RouteAction::NodeSync => {
                let local = routing::encode_subtree(&self.table, Some(conn));
                let Some(record) = self.table.get_mut(conn) else {
                    return Err(MeshError::UnknownLink(socket));
                };
                let replies = self.sync.handle_node_sync(record, &envelope, local);
                if let Some(existing) = self.table.duplicate_of(conn) {
                    let chip_id = self
                        .table
                        .get(conn)
                        .map_or(ChipId::UNIDENTIFIED, |r| r.chip_id);
                    tracing::warn!(
                        conn = %conn,
                        existing = %existing,
                        chip_id = %chip_id,
                        "peer already connected through another link, closing this one"
                    );
                    self.close_connection(conn);
                    return Err(MeshError::DuplicateIdentity(chip_id));
                }
                self.enqueue_envelopes(conn, replies);
            }
            RouteAction::TimeSync => {
                let Some(record) = self.table.get_mut(conn) else {
                    return Err(MeshError::UnknownLink(socket));
                };
                let replies = self.sync.handle_time_sync(record, &envelope);
                self.enqueue_envelopes(conn, replies);
            }
            RouteAction::DeliverLocal => {
                let msg = envelope.msg.as_deref().unwrap_or_default();
                self.callbacks.on_receive(envelope.from, msg);
            }
            RouteAction::Forward(dest) => {
                // Forward the original bytes; never re-encode in transit.
                let Some(target) = self.table.find_by_chip_id(dest) else {
                    tracing::warn!(conn = %conn, dest = %dest, "no route, dropping unicast");
                    return Err(MeshError::NoRoute(dest));
                };
                self.enqueue_raw(target, raw.to_vec());
            }
            RouteAction::Flood => {
                for target in routing::flood_targets(&self.table, Some(conn)) {
                    self.enqueue_raw(target, raw.to_vec());
                }
                let msg = envelope.msg.as_deref().unwrap_or_default();
                self.callbacks.on_receive(envelope.from, msg);
            }
            RouteAction::UnknownKind(value) => {
                tracing::warn!(conn = %conn, kind = value, "unknown message type, dropping");
                return Err(MeshError::UnknownKind(value));
            }
            RouteAction::MissingDestination => {
                tracing::warn!(conn = %conn, "unicast without destination, dropping");
                return Err(MeshError::MissingDestination);
            }
        }

        let now = self.sync.current_node_time();
        if let Some(record) = self.table.get_mut(conn) {
            record.last_received_at = now;
        }
        Ok(())
    }

    /// The transport finished writing a frame on `socket`; drain the next
    /// queued frame or mark the link idle.
    pub fn transmit_complete(&mut self, socket: SocketToken) -> Result<(), MeshError> {
        let Some(conn) = self.table.find_by_socket(socket) else {
            // Known race: the record can be evicted while its last frame
            // is still in flight.
            tracing::debug!(socket = %socket, "transmit complete for unknown connection");
            return Err(MeshError::UnknownLink(socket));
        };
        let Some(record) = self.table.get_mut(conn) else {
            return Err(MeshError::UnknownLink(socket));
        };
        send::on_transmit_complete(record, &mut self.transport)
    }

    /// Maintenance sweep: one action per record, in table order.
    ///
    /// Iterates a snapshot of handles and re-resolves each, so evicting a
    /// record never disturbs the rest of the sweep.
    pub fn run_maintenance(&mut self) {
        let now = self.sync.current_node_time();
        for id in self.table.ids() {
            let Some(record) = self.table.get(id) else {
                continue;
            };
            let view = RecordView {
                now,
                last_received_at: record.last_received_at,
                transport_closed: self.transport.is_closed(record.socket),
                node_sync: record.node_sync_status,
                time_sync: record.time_sync_status,
                is_new: record.is_new,
                is_access_point_side: record.is_access_point_side,
            };

            match plan_tick(&view, self.config.node_timeout_us) {
                MaintenanceAction::Evict(reason) => {
                    tracing::info!(conn = %id, chip_id = %record.chip_id, ?reason, "evicting");
                    self.close_connection(id);
                }
                MaintenanceAction::StartNodeSync => {
                    let local = routing::encode_subtree(&self.table, Some(id));
                    let Some(record) = self.table.get_mut(id) else {
                        continue;
                    };
                    tracing::debug!(conn = %id, "starting node sync");
                    let requests = self.sync.start_node_sync(record, local);
                    record.node_sync_status = SyncStatus::InProgress;
                    self.enqueue_envelopes(id, requests);
                }
                MaintenanceAction::StartTimeSync => {
                    let Some(record) = self.table.get_mut(id) else {
                        continue;
                    };
                    tracing::debug!(conn = %id, "starting time sync");
                    let requests = self.sync.start_time_sync(record);
                    record.time_sync_status = SyncStatus::InProgress;
                    self.enqueue_envelopes(id, requests);
                }
                MaintenanceAction::AnnounceNewConnection => {
                    let Some(record) = self.table.get(id) else {
                        continue;
                    };
                    let adopted = self.sync.adoption_decision(record);
                    self.callbacks.on_new_connection(adopted);
                    if let Some(record) = self.table.get_mut(id) {
                        record.is_new = false;
                    }
                }
                MaintenanceAction::FlagResync => {
                    tracing::debug!(conn = %id, "quiet link, flagging re-sync");
                    if let Some(record) = self.table.get_mut(id) {
                        record.node_sync_status = SyncStatus::Needed;
                    }
                }
                MaintenanceAction::AwaitNodeSync
                | MaintenanceAction::AwaitTimeSync
                | MaintenanceAction::Idle => {}
            }
        }
    }

    /// Send an application message to one node. A message to our own
    /// identity loops straight back to `on_receive`.
    pub fn send_single(
        &mut self,
        dest: ChipId,
        msg: impl Into<String>,
    ) -> Result<(), MeshError> {
        let own = self.sync.own_chip_id();
        let msg = msg.into();
        if dest == own {
            self.callbacks.on_receive(own, &msg);
            return Ok(());
        }
        let Some(target) = self.table.find_by_chip_id(dest) else {
            return Err(MeshError::NoRoute(dest));
        };
        let frame = Envelope::single(own, dest, msg).encode()?;
        let limit = self.config.send_queue_limit;
        let Some(record) = self.table.get_mut(target) else {
            return Err(MeshError::NoRoute(dest));
        };
        send::enqueue_frame(record, &mut self.transport, frame, limit)
    }

    /// Flood an application message to every node in the mesh.
    pub fn send_broadcast(&mut self, msg: impl Into<String>) -> Result<(), MeshError> {
        let frame = Envelope::broadcast(self.sync.own_chip_id(), msg.into()).encode()?;
        for target in routing::flood_targets(&self.table, None) {
            self.enqueue_raw(target, frame.clone());
        }
        Ok(())
    }

    /// Reachable node count for topology reporting.
    #[must_use]
    pub fn connection_count(&self, exclude: Option<ConnId>) -> usize {
        routing::connection_count(&self.table, exclude)
    }

    fn enqueue_envelopes(&mut self, id: ConnId, envelopes: Vec<Envelope>) {
        for envelope in envelopes {
            match envelope.encode() {
                Ok(frame) => self.enqueue_raw(id, frame),
                Err(e) => tracing::warn!(conn = %id, "failed to encode envelope: {e}"),
            }
        }
    }

    /// Best-effort enqueue: a full queue or failed write is reported and
    /// the rest of the operation continues.
    fn enqueue_raw(&mut self, id: ConnId, frame: Vec<u8>) {
        let limit = self.config.send_queue_limit;
        let Some(record) = self.table.get_mut(id) else {
            return;
        };
        if let Err(e) = send::enqueue_frame(record, &mut self.transport, frame, limit) {
            tracing::debug!(conn = %id, "frame not sent: {e}");
        }
    }
}
