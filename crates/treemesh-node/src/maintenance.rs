//! Pure maintenance tick logic.
//!
//! The per-record decision chain from the periodic sweep, extracted into a
//! stateless classifier so precedence and staggering can be tested without
//! a table or a clock. The sweep in [`crate::mesh`] applies the returned
//! action; exactly one action applies per record per tick.

use treemesh_core::NodeTime;

use crate::connection::SyncStatus;

/// Why a record is being evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictReason {
    /// Nothing valid received for longer than the node timeout.
    Timeout,
    /// The transport reports the underlying connection closed.
    TransportClosed,
}

/// The single action the sweep takes for one record on one tick.
///
/// The ordering of the checks is a strict priority chain:
/// eviction > node sync > time sync > new-connection announce > re-sync
/// scheduling. Starting an exchange and waiting for its answer both
/// suppress every later step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceAction {
    Evict(EvictReason),
    /// Invoke the node-sync initiation hook and mark it in progress.
    StartNodeSync,
    /// Node sync is outstanding; leave the record alone.
    AwaitNodeSync,
    /// Invoke the time-sync initiation hook and mark it in progress.
    StartTimeSync,
    /// Time sync is outstanding; leave the record alone.
    AwaitTimeSync,
    /// Both syncs have completed for the first time; fire the
    /// new-connection notification.
    AnnounceNewConnection,
    /// The link has been quiet past its role's staleness threshold;
    /// flag node sync as needed again.
    FlagResync,
    Idle,
}

/// Snapshot of the fields the classifier needs from one record.
#[derive(Debug, Clone, Copy)]
pub struct RecordView {
    pub now: NodeTime,
    pub last_received_at: NodeTime,
    pub transport_closed: bool,
    pub node_sync: SyncStatus,
    pub time_sync: SyncStatus,
    pub is_new: bool,
    pub is_access_point_side: bool,
}

/// Staleness threshold after which a quiet link re-syncs.
///
/// The AP side re-syncs at half the node timeout, the STA side at three
/// quarters, so the two ends of a link never start simultaneously.
#[must_use]
pub fn resync_threshold(is_access_point_side: bool, node_timeout_us: u64) -> u64 {
    if is_access_point_side {
        node_timeout_us / 2
    } else {
        node_timeout_us * 3 / 4
    }
}

/// Decide what the sweep does with one record this tick.
pub fn plan_tick(view: &RecordView, node_timeout_us: u64) -> MaintenanceAction {
    let idle = view.now.since(view.last_received_at);

    if idle > node_timeout_us {
        return MaintenanceAction::Evict(EvictReason::Timeout);
    }
    if view.transport_closed {
        return MaintenanceAction::Evict(EvictReason::TransportClosed);
    }

    match view.node_sync {
        SyncStatus::Needed => return MaintenanceAction::StartNodeSync,
        SyncStatus::InProgress => return MaintenanceAction::AwaitNodeSync,
        SyncStatus::NotNeeded | SyncStatus::Complete => {}
    }

    match view.time_sync {
        SyncStatus::Needed => return MaintenanceAction::StartTimeSync,
        SyncStatus::InProgress => return MaintenanceAction::AwaitTimeSync,
        SyncStatus::NotNeeded | SyncStatus::Complete => {}
    }

    if view.is_new {
        return MaintenanceAction::AnnounceNewConnection;
    }

    // Node sync cannot be pending here; the chain above already returned
    // for Needed and InProgress.
    if idle > resync_threshold(view.is_access_point_side, node_timeout_us) {
        return MaintenanceAction::FlagResync;
    }

    MaintenanceAction::Idle
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: u64 = 3_000_000;

    fn quiet_view(idle_us: u64) -> RecordView {
        RecordView {
            now: NodeTime(10_000_000),
            last_received_at: NodeTime(10_000_000 - idle_us),
            transport_closed: false,
            node_sync: SyncStatus::Complete,
            time_sync: SyncStatus::Complete,
            is_new: false,
            is_access_point_side: true,
        }
    }

    #[test]
    fn fresh_record_is_idle() {
        assert_eq!(plan_tick(&quiet_view(0), TIMEOUT), MaintenanceAction::Idle);
    }

    #[test]
    fn timeout_eviction_is_strict() {
        // Exactly at the timeout: not evicted (strict >).
        let view = quiet_view(TIMEOUT);
        // At the timeout the AP staleness threshold has long passed.
        assert_eq!(plan_tick(&view, TIMEOUT), MaintenanceAction::FlagResync);

        let view = quiet_view(TIMEOUT + 1);
        assert_eq!(
            plan_tick(&view, TIMEOUT),
            MaintenanceAction::Evict(EvictReason::Timeout)
        );
    }

    #[test]
    fn timeout_outranks_everything() {
        let view = RecordView {
            transport_closed: true,
            node_sync: SyncStatus::Needed,
            is_new: true,
            ..quiet_view(TIMEOUT + 1)
        };
        assert_eq!(
            plan_tick(&view, TIMEOUT),
            MaintenanceAction::Evict(EvictReason::Timeout)
        );
    }

    #[test]
    fn closed_transport_outranks_sync() {
        let view = RecordView {
            transport_closed: true,
            node_sync: SyncStatus::Needed,
            ..quiet_view(0)
        };
        assert_eq!(
            plan_tick(&view, TIMEOUT),
            MaintenanceAction::Evict(EvictReason::TransportClosed)
        );
    }

    #[test]
    fn node_sync_outranks_time_sync_and_announce() {
        let view = RecordView {
            node_sync: SyncStatus::Needed,
            time_sync: SyncStatus::Needed,
            is_new: true,
            ..quiet_view(0)
        };
        assert_eq!(plan_tick(&view, TIMEOUT), MaintenanceAction::StartNodeSync);

        let view = RecordView {
            node_sync: SyncStatus::InProgress,
            ..view
        };
        assert_eq!(plan_tick(&view, TIMEOUT), MaintenanceAction::AwaitNodeSync);
    }

    #[test]
    fn time_sync_outranks_announce() {
        let view = RecordView {
            time_sync: SyncStatus::Needed,
            is_new: true,
            ..quiet_view(0)
        };
        assert_eq!(plan_tick(&view, TIMEOUT), MaintenanceAction::StartTimeSync);

        let view = RecordView {
            time_sync: SyncStatus::InProgress,
            ..view
        };
        assert_eq!(plan_tick(&view, TIMEOUT), MaintenanceAction::AwaitTimeSync);
    }

    #[test]
    fn announce_fires_once_both_syncs_settle() {
        let view = RecordView {
            is_new: true,
            ..quiet_view(0)
        };
        assert_eq!(
            plan_tick(&view, TIMEOUT),
            MaintenanceAction::AnnounceNewConnection
        );
    }

    #[test]
    fn announce_suppresses_resync_check() {
        // A new record already past the staleness threshold still announces
        // first; re-sync scheduling is the lowest priority.
        let view = RecordView {
            is_new: true,
            ..quiet_view(TIMEOUT / 2 + 1)
        };
        assert_eq!(
            plan_tick(&view, TIMEOUT),
            MaintenanceAction::AnnounceNewConnection
        );
    }

    #[test]
    fn ap_side_resyncs_before_sta_side() {
        // Same idle time, different roles: only the AP side re-syncs.
        let idle = TIMEOUT / 2 + 1;
        let ap = RecordView {
            is_access_point_side: true,
            ..quiet_view(idle)
        };
        let sta = RecordView {
            is_access_point_side: false,
            ..quiet_view(idle)
        };
        assert_eq!(plan_tick(&ap, TIMEOUT), MaintenanceAction::FlagResync);
        assert_eq!(plan_tick(&sta, TIMEOUT), MaintenanceAction::Idle);
    }

    #[test]
    fn sta_side_resyncs_past_three_quarters() {
        let idle = TIMEOUT * 3 / 4 + 1;
        let sta = RecordView {
            is_access_point_side: false,
            ..quiet_view(idle)
        };
        assert_eq!(plan_tick(&sta, TIMEOUT), MaintenanceAction::FlagResync);
    }

    #[test]
    fn resync_thresholds_are_strict() {
        let ap = RecordView {
            is_access_point_side: true,
            ..quiet_view(TIMEOUT / 2)
        };
        assert_eq!(plan_tick(&ap, TIMEOUT), MaintenanceAction::Idle);

        let sta = RecordView {
            is_access_point_side: false,
            ..quiet_view(TIMEOUT * 3 / 4)
        };
        assert_eq!(plan_tick(&sta, TIMEOUT), MaintenanceAction::Idle);
    }

    #[test]
    fn backwards_clock_does_not_evict() {
        // A time sync can move the shared clock behind a record's stamp.
        let view = RecordView {
            now: NodeTime(100),
            last_received_at: NodeTime(5_000_000),
            ..quiet_view(0)
        };
        assert_eq!(plan_tick(&view, TIMEOUT), MaintenanceAction::Idle);
    }
}
