//! The connection table: ownership and lookup for all live links.

use std::collections::HashMap;
use std::fmt;

use treemesh_core::{subtree, ChipId, SocketToken};

use crate::connection::ConnectionRecord;

/// Stable handle to a connection record.
///
/// Handles are never reused within one table's lifetime, so a handle held
/// across an eviction simply stops resolving instead of aliasing a newer
/// link.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct ConnId(u64);

impl fmt::Debug for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnId({})", self.0)
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// All live links, in insertion order.
#[derive(Default)]
pub struct ConnectionTable {
    entries: HashMap<ConnId, ConnectionRecord>,
    order: Vec<ConnId>,
    next_id: u64,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record and hand back its handle.
    pub fn insert(&mut self, record: ConnectionRecord) -> ConnId {
        let id = ConnId(self.next_id);
        self.next_id += 1;
        self.entries.insert(id, record);
        self.order.push(id);
        id
    }

    /// Evict a record. Handles to it stop resolving immediately.
    pub fn remove(&mut self, id: ConnId) -> Option<ConnectionRecord> {
        let record = self.entries.remove(&id)?;
        self.order.retain(|other| *other != id);
        Some(record)
    }

    #[must_use]
    pub fn get(&self, id: ConnId) -> Option<&ConnectionRecord> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: ConnId) -> Option<&mut ConnectionRecord> {
        self.entries.get_mut(&id)
    }

    /// Snapshot of all handles in table order.
    ///
    /// Sweeps iterate this snapshot and re-resolve each handle, so removing
    /// records mid-sweep is safe.
    #[must_use]
    pub fn ids(&self) -> Vec<ConnId> {
        self.order.clone()
    }

    /// Records with their handles, in table order.
    pub fn iter(&self) -> impl Iterator<Item = (ConnId, &ConnectionRecord)> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).map(|record| (*id, record)))
    }

    /// Find the link a node is reachable through: the direct peer if `id`
    /// matches a record's own identity, otherwise the unique record whose
    /// subtree contains `id`.
    ///
    /// [`ChipId::UNIDENTIFIED`] never matches; an unidentified peer is not
    /// yet addressable.
    #[must_use]
    pub fn find_by_chip_id(&self, chip_id: ChipId) -> Option<ConnId> {
        if chip_id.is_unidentified() {
            return None;
        }
        self.iter()
            .find(|(_, record)| {
                record.chip_id == chip_id || subtree::contains(&record.subtree, chip_id)
            })
            .map(|(id, _)| id)
    }

    /// Reverse lookup by transport token.
    #[must_use]
    pub fn find_by_socket(&self, socket: SocketToken) -> Option<ConnId> {
        self.iter()
            .find(|(_, record)| record.socket == socket)
            .map(|(id, _)| id)
    }

    /// Another record that already carries `id`'s direct identity, if any.
    ///
    /// A nonzero identity must be unique across the table (the mesh is a
    /// tree); the dispatcher checks this after every node-sync handling and
    /// resolves a clash by closing the younger link.
    #[must_use]
    pub fn duplicate_of(&self, id: ConnId) -> Option<ConnId> {
        let chip_id = self.get(id)?.chip_id;
        if chip_id.is_unidentified() {
            return None;
        }
        self.iter()
            .find(|(other, record)| *other != id && record.chip_id == chip_id)
            .map(|(other, _)| other)
    }

    /// Number of reachable nodes: each record counts itself plus its
    /// recursive subtree, skipping one optional record.
    #[must_use]
    pub fn count_excluding(&self, exclude: Option<ConnId>) -> usize {
        self.iter()
            .filter(|(id, _)| Some(*id) != exclude)
            .map(|(_, record)| 1 + subtree::count_nodes(&record.subtree))
            .sum()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
