//! Per-connection outbound pipeline with single-in-flight flow control.
//!
//! At most one transmission is outstanding per link. An enqueue on an idle
//! link transmits immediately; otherwise the frame waits in the record's
//! queue and the transport's transmit-complete callback drains it one
//! frame at a time. `send_ready` and a non-empty queue are mutually
//! exclusive outside the immediate-send window.

use crate::connection::ConnectionRecord;
use crate::error::MeshError;
use crate::handlers::Transport;

/// Queue a frame on a link, transmitting immediately if the link is idle.
///
/// Rejects the frame with [`MeshError::SendQueueFull`] once `limit` frames
/// are already waiting. A transmit failure loses the frame but leaves the
/// link usable; eviction is the maintenance sweep's business, never the
/// send path's.
pub fn enqueue_frame<T: Transport>(
    record: &mut ConnectionRecord,
    transport: &mut T,
    frame: Vec<u8>,
    limit: usize,
) -> Result<(), MeshError> {
    if record.send_ready {
        record.send_ready = false;
        if let Err(e) = transport.transmit(record.socket, &frame) {
            tracing::warn!(
                socket = %record.socket,
                chip_id = %record.chip_id,
                "transmit failed: {e}"
            );
            record.send_ready = true;
            return Err(e.into());
        }
        return Ok(());
    }

    if record.send_queue.len() >= limit {
        tracing::warn!(
            socket = %record.socket,
            chip_id = %record.chip_id,
            queued = record.send_queue.len(),
            "send queue full, rejecting frame"
        );
        return Err(MeshError::SendQueueFull(record.chip_id));
    }

    record.send_queue.push_back(frame);
    Ok(())
}

/// Transmit-complete callback: pop the in-flight frame's successor and
/// send it, or mark the link idle if nothing is waiting.
pub fn on_transmit_complete<T: Transport>(
    record: &mut ConnectionRecord,
    transport: &mut T,
) -> Result<(), MeshError> {
    let Some(frame) = record.send_queue.pop_front() else {
        record.send_ready = true;
        return Ok(());
    };

    if let Err(e) = transport.transmit(record.socket, &frame) {
        tracing::warn!(
            socket = %record.socket,
            chip_id = %record.chip_id,
            "transmit failed while draining: {e}"
        );
        // The frame is lost, not retried. Mark idle if the queue drained
        // so one failed write cannot wedge the link.
        if record.send_queue.is_empty() {
            record.send_ready = true;
        }
        return Err(e.into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;
    use treemesh_core::{NodeTime, SocketToken};

    const LIMIT: usize = 4;

    fn idle_record() -> ConnectionRecord {
        ConnectionRecord::new(SocketToken(1), false, NodeTime(0))
    }

    #[test]
    fn enqueue_on_idle_link_transmits_immediately() {
        let mut record = idle_record();
        let mut transport = MockTransport::new();

        enqueue_frame(&mut record, &mut transport, b"one".to_vec(), LIMIT).unwrap();

        assert_eq!(transport.sent_frames(SocketToken(1)), vec![b"one".to_vec()]);
        assert!(!record.is_send_ready());
        assert_eq!(record.queue_len(), 0);
    }

    #[test]
    fn second_frame_waits_for_completion() {
        let mut record = idle_record();
        let mut transport = MockTransport::new();

        enqueue_frame(&mut record, &mut transport, b"one".to_vec(), LIMIT).unwrap();
        enqueue_frame(&mut record, &mut transport, b"two".to_vec(), LIMIT).unwrap();

        // Only one outstanding transmission.
        assert_eq!(transport.sent_frames(SocketToken(1)).len(), 1);
        assert_eq!(record.queue_len(), 1);

        on_transmit_complete(&mut record, &mut transport).unwrap();
        assert_eq!(
            transport.sent_frames(SocketToken(1)),
            vec![b"one".to_vec(), b"two".to_vec()]
        );
        assert!(!record.is_send_ready());

        // Draining the last frame marks the link idle again.
        on_transmit_complete(&mut record, &mut transport).unwrap();
        assert!(record.is_send_ready());
        assert_eq!(record.queue_len(), 0);
    }

    #[test]
    fn queue_keeps_order() {
        let mut record = idle_record();
        let mut transport = MockTransport::new();

        for frame in [b"a".to_vec(), b"b".to_vec(), b"c".to_vec()] {
            enqueue_frame(&mut record, &mut transport, frame, LIMIT).unwrap();
        }
        on_transmit_complete(&mut record, &mut transport).unwrap();
        on_transmit_complete(&mut record, &mut transport).unwrap();

        assert_eq!(
            transport.sent_frames(SocketToken(1)),
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]
        );
    }

    #[test]
    fn overflow_is_rejected_not_dropped_oldest() {
        let mut record = idle_record();
        let mut transport = MockTransport::new();

        enqueue_frame(&mut record, &mut transport, b"inflight".to_vec(), LIMIT).unwrap();
        for i in 0..LIMIT {
            enqueue_frame(&mut record, &mut transport, vec![i as u8], LIMIT).unwrap();
        }

        let err = enqueue_frame(&mut record, &mut transport, b"extra".to_vec(), LIMIT);
        assert!(matches!(err, Err(MeshError::SendQueueFull(_))));
        // Accepted traffic is untouched.
        assert_eq!(record.queue_len(), LIMIT);
        assert_eq!(record.queued_frames().next().unwrap(), [0u8]);
    }

    #[test]
    fn immediate_send_failure_keeps_link_usable() {
        let mut record = idle_record();
        let mut transport = MockTransport::new();
        transport.fail_next_transmit();

        let err = enqueue_frame(&mut record, &mut transport, b"lost".to_vec(), LIMIT);
        assert!(matches!(err, Err(MeshError::Transport(_))));
        assert!(record.is_send_ready());
        assert_eq!(record.queue_len(), 0);

        // Next send goes through.
        enqueue_frame(&mut record, &mut transport, b"ok".to_vec(), LIMIT).unwrap();
        assert_eq!(transport.sent_frames(SocketToken(1)), vec![b"ok".to_vec()]);
    }

    #[test]
    fn drain_failure_on_last_frame_restores_ready() {
        let mut record = idle_record();
        let mut transport = MockTransport::new();

        enqueue_frame(&mut record, &mut transport, b"one".to_vec(), LIMIT).unwrap();
        enqueue_frame(&mut record, &mut transport, b"two".to_vec(), LIMIT).unwrap();

        transport.fail_next_transmit();
        let err = on_transmit_complete(&mut record, &mut transport);
        assert!(err.is_err());
        assert!(record.is_send_ready());
        assert_eq!(record.queue_len(), 0);
    }

    #[test]
    fn completion_on_empty_queue_marks_idle() {
        let mut record = idle_record();
        let mut transport = MockTransport::new();

        enqueue_frame(&mut record, &mut transport, b"one".to_vec(), LIMIT).unwrap();
        assert!(!record.is_send_ready());
        on_transmit_complete(&mut record, &mut transport).unwrap();
        assert!(record.is_send_ready());
    }
}
