// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! C3 Stream Registry: resolves an `(SessionId, ssrc)` pair to its
//! `VoiceStream` and packet-ingest channel, creating both on first sight.
//!
//! The double-checked locking shape mirrors a resource cache's
//! get-or-create, generalized one step further than a plain "read, then
//! write-if-missing" map: the map itself never stores the stream state
//! directly, it stores a per-key `OnceCell` the map's own short-held lock
//! hands out. Whichever caller first reaches an empty cell runs `factory`
//! and every other concurrent caller for the same key awaits that same
//! cell instead of racing a factory call of its own — the map lock is
//! never held across the `.await` inside `factory`, so unrelated keys are
//! never blocked by one key's creation, and a given key's factory still
//! runs at most once (this is what keeps the ASR Session singleton per
//! stream: plain read-then-write-on-miss only dedupes the final cache
//! *entry*, not the factory call that spawns it).

use jamie_core::model::{SessionId, VoiceStream};
use jamie_core::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, OnceCell, RwLock};

use crate::types::RawPacket;

/// A cached stream's identity plus the channel its Packet Ingestor feeds.
#[derive(Clone)]
pub struct VoiceStreamState {
    pub stream: VoiceStream,
    pub packet_tx: mpsc::Sender<RawPacket>,
}

type Key = (SessionId, u32);
type Cell = Arc<OnceCell<VoiceStreamState>>;

/// The Stream Registry (C3): one entry per `(SessionId, ssrc)` seen since
/// process start.
#[derive(Default)]
pub struct StreamRegistry {
    cache: RwLock<HashMap<Key, Cell>>,
    speakers: RwLock<HashMap<Key, String>>,
}

impl StreamRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached state for `(session_id, ssrc)`, running `factory`
    /// to create it on a miss. `factory` is called at most once per key even
    /// under concurrent callers.
    pub async fn resolve_or_create<F, Fut>(
        &self,
        session_id: &SessionId,
        ssrc: u32,
        factory: F,
    ) -> Result<VoiceStreamState>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<VoiceStreamState>>,
    {
        let key = (session_id.clone(), ssrc);
        let cell = self.cell_for(key).await;
        cell.get_or_try_init(factory).await.map(Clone::clone)
    }

    async fn cell_for(&self, key: Key) -> Cell {
        if let Some(cell) = self.cache.read().await.get(&key) {
            return cell.clone();
        }
        let mut cache = self.cache.write().await;
        cache.entry(key).or_insert_with(|| Arc::new(OnceCell::new())).clone()
    }

    /// Records the platform-supplied speaker id for an SSRC the first time
    /// it is announced, so a later stream creation can use it.
    pub async fn record_speaker(&self, session_id: &SessionId, ssrc: u32, external_user_id: String) {
        self.speakers.write().await.insert((session_id.clone(), ssrc), external_user_id);
    }

    pub async fn speaker_for(&self, session_id: &SessionId, ssrc: u32) -> Option<String> {
        self.speakers.read().await.get(&(session_id.clone(), ssrc)).cloned()
    }

    /// Drops every cached stream belonging to `session_id`; called once the
    /// session's cancellation has already torn down its per-stream tasks.
    pub async fn evict_session(&self, session_id: &SessionId) {
        self.cache.write().await.retain(|(id, _), _| id != session_id);
        self.speakers.write().await.retain(|(id, _), _| id != session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jamie_core::model::StreamId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn voice_stream(ssrc: u32) -> VoiceStream {
        VoiceStream {
            id: StreamId::new(format!("stream-{ssrc}")),
            session_id: SessionId::new("session-1"),
            ssrc,
            speaker_external_id: String::new(),
            packet_seq_offset: 0,
            sample_idx_offset: 0,
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn concurrent_first_sights_of_the_same_ssrc_create_exactly_one_stream() {
        let registry = Arc::new(StreamRegistry::new());
        let session_id = SessionId::new("session-1");
        let factory_calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            let session_id = session_id.clone();
            let factory_calls = factory_calls.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .resolve_or_create(&session_id, 42, || async {
                        factory_calls.fetch_add(1, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        let (packet_tx, _rx) = mpsc::channel(1);
                        Ok(VoiceStreamState { stream: voice_stream(42), packet_tx })
                    })
                    .await
                    .expect("resolve_or_create")
            }));
        }

        let mut stream_ids = Vec::new();
        for handle in handles {
            stream_ids.push(handle.await.expect("task").stream.id);
        }

        assert_eq!(factory_calls.load(Ordering::SeqCst), 1);
        assert!(stream_ids.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[tokio::test]
    async fn distinct_ssrcs_create_distinct_streams() {
        let registry = StreamRegistry::new();
        let session_id = SessionId::new("session-1");

        let first = registry
            .resolve_or_create(&session_id, 1, || async {
                let (packet_tx, _rx) = mpsc::channel(1);
                Ok(VoiceStreamState { stream: voice_stream(1), packet_tx })
            })
            .await
            .expect("first");
        let second = registry
            .resolve_or_create(&session_id, 2, || async {
                let (packet_tx, _rx) = mpsc::channel(1);
                Ok(VoiceStreamState { stream: voice_stream(2), packet_tx })
            })
            .await
            .expect("second");

        assert_ne!(first.stream.id, second.stream.id);
    }
}
