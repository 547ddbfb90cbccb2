//! Buffered transmission over an unreliable radio link.
//!
//! Frames that fail to go out wait in a bounded FIFO queue and are prepended
//! to the next attempt, which sends the whole set as one combined payload.
//!
//! # Invariants
//!
//! - A frame leaves the queue only when an attempt that included it was
//!   acknowledged
//! - A failed combined send leaves every frame of that attempt queued,
//!   including the newest one, unless the queue is full
//! - Frames are only ever appended at the tail; oldest frames are retained
//!   and the newest is dropped, with an error, when the queue is full

use std::collections::VecDeque;

use telelock_proto::TelemetryFrame;

use crate::{
    config::TransmitConfig,
    error::TransmitError,
    radio::RadioLink,
};

/// Result of handing one frame to the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The frame, and everything queued before it, was acknowledged
    Delivered {
        /// Frames in the acknowledged payload
        frames: usize,
        /// Payload size in bytes
        bytes: usize,
    },
    /// The frame is waiting in the queue for the next attempt
    Queued {
        /// Frames now pending
        pending: usize,
        /// Why the attempt did not go through
        cause: TransmitError,
    },
}

/// Outbound retry/combine layer in front of a radio link.
pub struct TransmitBuffer<L: RadioLink> {
    link: L,
    pending: VecDeque<TelemetryFrame>,
    capacity: usize,
}

impl<L: RadioLink> TransmitBuffer<L> {
    /// Buffer in front of `link`. A zero capacity is raised to one.
    pub fn new(link: L, config: TransmitConfig) -> Self {
        let capacity = config.capacity.max(1);
        Self { link, pending: VecDeque::with_capacity(capacity), capacity }
    }

    /// Deliver `frame`, together with any pending frames, or queue it.
    ///
    /// With an inactive link the frame is queued and a re-activation is
    /// attempted; nothing is sent this round. Otherwise the pending frames
    /// and `frame` go out as one payload, oldest first.
    ///
    /// # Errors
    ///
    /// `QueueFull` when the attempt failed and the queue had no room, so
    /// `frame` was dropped. Pending frames are untouched.
    pub fn send(&mut self, frame: TelemetryFrame) -> Result<SendOutcome, TransmitError> {
        if !self.link.is_activated() {
            tracing::warn!(pending = self.pending.len(), "link not activated, buffering frame");
            let outcome = self.enqueue(frame, TransmitError::LinkNotActivated);
            self.reactivate();
            return outcome;
        }

        let payload = self.combined_payload(Some(&frame));
        let frames = self.pending.len() + 1;

        match self.link.send_receive(&payload) {
            Ok(()) => {
                self.link.save_session();
                self.pending.clear();
                tracing::info!(frames, bytes = payload.len(), "payload delivered");
                Ok(SendOutcome::Delivered { frames, bytes: payload.len() })
            },
            Err(e) => {
                tracing::warn!(code = e.code, frames, "send failed, buffering frame");
                let outcome = self.enqueue(frame, TransmitError::LinkSendFailed { code: e.code });
                self.reactivate();
                outcome
            },
        }
    }

    /// Retry only the pending frames.
    ///
    /// Returns the number of frames delivered (zero, without touching the
    /// link, when nothing is pending).
    ///
    /// # Errors
    ///
    /// `LinkNotActivated` / `LinkSendFailed`; the queue is left as it was.
    pub fn flush(&mut self) -> Result<usize, TransmitError> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        if !self.link.is_activated() {
            self.reactivate();
            return Err(TransmitError::LinkNotActivated);
        }

        let payload = self.combined_payload(None);
        match self.link.send_receive(&payload) {
            Ok(()) => {
                self.link.save_session();
                let frames = self.pending.len();
                self.pending.clear();
                tracing::info!(frames, bytes = payload.len(), "pending frames flushed");
                Ok(frames)
            },
            Err(e) => {
                tracing::warn!(code = e.code, pending = self.pending.len(), "flush failed");
                self.reactivate();
                Err(TransmitError::LinkSendFailed { code: e.code })
            },
        }
    }

    /// Pending frames, oldest first.
    pub fn pending(&self) -> impl ExactSizeIterator<Item = &TelemetryFrame> {
        self.pending.iter()
    }

    /// Maximum number of pending frames.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The radio link.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// The radio link, mutably.
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    fn enqueue(
        &mut self,
        frame: TelemetryFrame,
        cause: TransmitError,
    ) -> Result<SendOutcome, TransmitError> {
        if self.pending.len() >= self.capacity {
            tracing::error!(capacity = self.capacity, %cause, "transmit queue full, frame dropped");
            return Err(TransmitError::QueueFull { capacity: self.capacity });
        }

        self.pending.push_back(frame);
        Ok(SendOutcome::Queued { pending: self.pending.len(), cause })
    }

    fn reactivate(&mut self) {
        if self.link.load_session() {
            tracing::info!("link re-activated");
        } else {
            tracing::warn!("link re-activation failed");
        }
    }

    /// Pending frames followed by `newest`, concatenated at their full
    /// lengths.
    fn combined_payload(&self, newest: Option<&TelemetryFrame>) -> Vec<u8> {
        let total: usize = self.pending.iter().chain(newest).map(TelemetryFrame::len).sum();

        let mut payload = Vec::with_capacity(total);
        for frame in self.pending.iter().chain(newest) {
            payload.extend_from_slice(frame.as_bytes());
        }

        tracing::debug!(payload = %hex::encode_upper(&payload), "combined payload");
        payload
    }
}

#[cfg(test)]
mod tests {
    use telelock_proto::{ClearFields, EffectiveIv, IvWidth, SecureFields, SessionNonce};

    use super::*;
    use crate::{radio::SimulatedRadio, storage::MemoryStore};

    fn frame(counter: u32) -> TelemetryFrame {
        let iv = EffectiveIv::new(counter, IvWidth::Counter2, &SessionNonce::zero());
        TelemetryFrame::encode(
            &iv,
            IvWidth::Counter2,
            &ClearFields::default(),
            &SecureFields::default(),
        )
    }

    fn active_buffer() -> TransmitBuffer<SimulatedRadio<MemoryStore>> {
        let mut radio = SimulatedRadio::new(MemoryStore::new(), 0.0, 1);
        assert!(radio.load_session());
        TransmitBuffer::new(radio, TransmitConfig::default())
    }

    #[test]
    fn healthy_link_delivers_immediately() {
        let mut buffer = active_buffer();

        assert_eq!(buffer.send(frame(1)).unwrap(), SendOutcome::Delivered { frames: 1, bytes: 23 });
        assert_eq!(buffer.pending().len(), 0);
        assert_eq!(buffer.link().delivered(), &[frame(1).as_bytes().to_vec()]);
    }

    #[test]
    fn failure_queues_then_success_combines_in_order() {
        let mut buffer = active_buffer();
        buffer.link_mut().fail_next(2);

        assert!(matches!(buffer.send(frame(1)).unwrap(), SendOutcome::Queued { pending: 1, .. }));
        assert!(matches!(buffer.send(frame(2)).unwrap(), SendOutcome::Queued { pending: 2, .. }));
        assert_eq!(buffer.send(frame(3)).unwrap(), SendOutcome::Delivered { frames: 3, bytes: 69 });

        let expected: Vec<u8> =
            [frame(1), frame(2), frame(3)].iter().flat_map(|f| f.as_bytes().to_vec()).collect();
        assert_eq!(buffer.link().delivered(), &[expected]);
        assert_eq!(buffer.pending().len(), 0);
    }

    #[test]
    fn inactive_link_queues_and_reactivates() {
        let mut buffer = active_buffer();
        buffer.link_mut().deactivate();

        assert_eq!(buffer.send(frame(1)).unwrap(), SendOutcome::Queued {
            pending: 1,
            cause: TransmitError::LinkNotActivated
        });
        assert!(buffer.link().is_activated());
        assert_eq!(buffer.link().uplinks(), 0);
    }

    #[test]
    fn full_queue_drops_newest() {
        let mut buffer = active_buffer();
        buffer.link_mut().fail_next(usize::MAX);

        for counter in 1..=4 {
            buffer.send(frame(counter)).unwrap();
        }
        assert_eq!(buffer.send(frame(5)), Err(TransmitError::QueueFull { capacity: 4 }));

        let pending: Vec<_> = buffer.pending().copied().collect();
        assert_eq!(pending, vec![frame(1), frame(2), frame(3), frame(4)]);
    }

    #[test]
    fn flush_sends_only_pending() {
        let mut buffer = active_buffer();
        assert_eq!(buffer.flush(), Ok(0));
        assert_eq!(buffer.link().uplinks(), 0);

        buffer.link_mut().fail_next(1);
        buffer.send(frame(1)).unwrap();

        assert_eq!(buffer.flush(), Ok(1));
        assert_eq!(buffer.link().delivered(), &[frame(1).as_bytes().to_vec()]);
    }

    #[test]
    fn failed_flush_keeps_queue() {
        let mut buffer = active_buffer();
        buffer.link_mut().fail_next(2);
        buffer.send(frame(1)).unwrap();

        assert_eq!(buffer.flush(), Err(TransmitError::LinkSendFailed { code: -5 }));
        assert_eq!(buffer.pending().len(), 1);
    }
}
