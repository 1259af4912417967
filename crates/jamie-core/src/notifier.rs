// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! C9 Notifier: in-process publish/subscribe over two topics,
//! `packet_inserted` and `transcript_changed`, with bounded backlog and
//! drop-oldest semantics for slow subscribers.

use crate::model::Notification;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Backlog depth before the oldest event for a lagging subscriber is
/// dropped.
pub const BACKLOG_CAPACITY: usize = 1000;

#[derive(Debug, Default)]
struct Counters {
    packet_dropped: AtomicU64,
    transcript_dropped: AtomicU64,
}

/// Publishes `NewPacket` and `TranscriptChanged` notifications. The Store is
/// the sole publisher; everything else only subscribes.
#[derive(Clone)]
pub struct Notifier {
    packet_tx: broadcast::Sender<Notification>,
    transcript_tx: broadcast::Sender<Notification>,
    counters: Arc<Counters>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    #[must_use]
    pub fn new() -> Self {
        let (packet_tx, _) = broadcast::channel(BACKLOG_CAPACITY);
        let (transcript_tx, _) = broadcast::channel(BACKLOG_CAPACITY);
        Self { packet_tx, transcript_tx, counters: Arc::new(Counters::default()) }
    }

    pub fn publish_packet_inserted(&self, notification: Notification) {
        debug_assert!(matches!(notification, Notification::NewPacket { .. }));
        // `send` only errors when there are no subscribers; that is not a
        // failure for a publish/subscribe bus.
        let _ = self.packet_tx.send(notification);
    }

    pub fn publish_transcript_changed(&self, notification: Notification) {
        debug_assert!(matches!(notification, Notification::TranscriptChanged { .. }));
        let _ = self.transcript_tx.send(notification);
    }

    #[must_use]
    pub fn subscribe_packet_inserts(&self) -> PacketInsertSubscription {
        PacketInsertSubscription { rx: self.packet_tx.subscribe(), counters: self.counters.clone() }
    }

    #[must_use]
    pub fn subscribe_transcript_changes(&self) -> TranscriptChangeSubscription {
        TranscriptChangeSubscription { rx: self.transcript_tx.subscribe(), counters: self.counters.clone() }
    }

    #[must_use]
    pub fn dropped_packet_notifications(&self) -> u64 {
        self.counters.packet_dropped.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn dropped_transcript_notifications(&self) -> u64 {
        self.counters.transcript_dropped.load(Ordering::Relaxed)
    }
}

/// A lazy sequence of `NewPacket` notifications.
pub struct PacketInsertSubscription {
    rx: broadcast::Receiver<Notification>,
    counters: Arc<Counters>,
}

/// A lazy sequence of `TranscriptChanged` notifications.
pub struct TranscriptChangeSubscription {
    rx: broadcast::Receiver<Notification>,
    counters: Arc<Counters>,
}

macro_rules! impl_subscription_recv {
    ($ty:ty, $counter:ident) => {
        impl $ty {
            /// Awaits the next notification, transparently skipping past a
            /// `Lagged` gap (recording it as a drop) rather than surfacing
            /// it to the caller.
            pub async fn recv(&mut self) -> Option<Notification> {
                loop {
                    match self.rx.recv().await {
                        Ok(notification) => return Some(notification),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            self.counters.$counter.fetch_add(n, Ordering::Relaxed);
                        },
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        }
    };
}

impl_subscription_recv!(PacketInsertSubscription, packet_dropped);
impl_subscription_recv!(TranscriptChangeSubscription, transcript_dropped);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StreamId;

    #[tokio::test]
    async fn subscriber_receives_published_packet_events() {
        let notifier = Notifier::new();
        let mut sub = notifier.subscribe_packet_inserts();
        notifier.publish_packet_inserted(Notification::NewPacket {
            stream_id: StreamId::new("s1"),
            sample_idx: 960,
        });
        let received = sub.recv().await.expect("event");
        match received {
            Notification::NewPacket { sample_idx, .. } => assert_eq!(sample_idx, 960),
            Notification::TranscriptChanged { .. } => panic!("wrong topic"),
        }
    }

    #[tokio::test]
    async fn lagging_subscriber_drops_oldest_and_keeps_a_counter() {
        let notifier = Notifier::new();
        let mut sub = notifier.subscribe_packet_inserts();
        for i in 0..(BACKLOG_CAPACITY as u32 + 10) {
            notifier.publish_packet_inserted(Notification::NewPacket {
                stream_id: StreamId::new("s1"),
                sample_idx: i,
            });
        }
        // Drain; the receiver must not deadlock or error fatally.
        let mut got = 0;
        while tokio::time::timeout(std::time::Duration::from_millis(50), sub.recv()).await.is_ok() {
            got += 1;
        }
        assert!(got > 0);
        assert!(notifier.dropped_packet_notifications() > 0);
    }
}
