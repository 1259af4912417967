// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

use jamie_core::clock::{Clock, SystemClock};
use jamie_core::model::{
    AttachesTo, Notification, PacketId, RecognitionSessionId, RecognitionState, SegmentId,
    SessionId, StreamId, VoicePacket, VoiceSession, VoiceStream, WordAlternative, WordAlternativeId,
    WordId,
};
use jamie_core::notifier::{Notifier, PacketInsertSubscription, TranscriptChangeSubscription};
use jamie_core::{JamieError, Result};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Storage call timeout: every Store method races its query against this
/// deadline and surfaces `JamieError::Timeout` past it.
const STORAGE_TIMEOUT: Duration = Duration::from_secs(10);

async fn with_timeout<F, T>(fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    tokio::time::timeout(STORAGE_TIMEOUT, fut).await.map_err(|_| JamieError::Timeout(STORAGE_TIMEOUT))?
}

/// A transcript segment together with its current (highest-version) words
/// and their chosen alternatives. Returned by `get_segment_with_words`.
#[derive(Debug, Clone)]
pub struct SegmentWithWords {
    pub id: SegmentId,
    pub recognition_session_id: RecognitionSessionId,
    pub is_final: bool,
    pub version: u32,
    pub words: Vec<WordWithAlternatives>,
}

#[derive(Debug, Clone)]
pub struct WordWithAlternatives {
    pub id: WordId,
    pub start_time: f64,
    pub duration: f64,
    pub is_end_of_sentence: bool,
    pub attaches_to: AttachesTo,
    pub alternatives: Vec<WordAlternative>,
    pub chosen: WordAlternative,
}

/// The Store (C2). Process-wide, initialised once at startup, released on
/// orderly shutdown. Serializes writes internally via the pool; the Store
/// is the sole `Notifier` publisher.
pub struct Store {
    pool: SqlitePool,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
}

impl Store {
    /// Connects to `database_url` (an sqlite connection string, e.g.
    /// `sqlite://jamie.db` or `sqlite::memory:`), creating the database
    /// file and running migrations if necessary.
    pub async fn connect(database_url: &str) -> Result<Self> {
        Self::connect_with_clock(database_url, Arc::new(SystemClock)).await
    }

    pub async fn connect_with_clock(database_url: &str, clock: Arc<dyn Clock>) -> Result<Self> {
        let options = sqlx::sqlite::SqliteConnectOptions::from_str(database_url)
            .map_err(|e| JamieError::Config(format!("invalid DATABASE_URL: {e}")))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().max_connections(5).connect_with(options).await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| JamieError::Config(format!("migration failed: {e}")))?;
        Ok(Self { pool, notifier: Notifier::new(), clock })
    }

    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub async fn create_voice_session(&self, guild_id: &str, channel_id: &str) -> Result<SessionId> {
        with_timeout(async {
            let id = SessionId::new(self.clock.fresh_id());
            let started_at = self.clock.now_ns();
            sqlx::query(
                "INSERT INTO voice_sessions (id, guild_id, channel_id, started_at, ended_at) VALUES (?, ?, ?, ?, NULL)",
            )
            .bind(id.as_str())
            .bind(guild_id)
            .bind(channel_id)
            .bind(started_at)
            .execute(&self.pool)
            .await?;
            Ok(id)
        })
        .await
    }

    /// Idempotent: sets `endedAt = now()` only if it is currently unset.
    pub async fn end_voice_session(&self, session_id: &SessionId) -> Result<()> {
        with_timeout(async {
            let ended_at = self.clock.now_ns();
            sqlx::query("UPDATE voice_sessions SET ended_at = ? WHERE id = ? AND ended_at IS NULL")
                .bind(ended_at)
                .bind(session_id.as_str())
                .execute(&self.pool)
                .await?;
            Ok(())
        })
        .await
    }

    /// Fails with `Conflict` if `(sessionId, ssrc)` already exists.
    pub async fn create_voice_stream(
        &self,
        id: &StreamId,
        session_id: &SessionId,
        ssrc: u32,
        speaker_external_id: &str,
        packet_seq_offset: u16,
        sample_idx_offset: u32,
    ) -> Result<VoiceStream> {
        with_timeout(async {
            if self.find_voice_stream_by_ssrc(session_id, ssrc).await?.is_some() {
                return Err(JamieError::Conflict(format!(
                    "voice stream already exists for session {session_id} ssrc {ssrc}"
                )));
            }
            let created_at = self.clock.now_ns();
            let result = sqlx::query(
                "INSERT INTO voice_streams (id, session_id, ssrc, speaker_external_id, packet_seq_offset, sample_idx_offset, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(id.as_str())
            .bind(session_id.as_str())
            .bind(i64::from(ssrc))
            .bind(speaker_external_id)
            .bind(i64::from(packet_seq_offset))
            .bind(i64::from(sample_idx_offset))
            .bind(created_at)
            .execute(&self.pool)
            .await;

            if let Err(sqlx::Error::Database(db_err)) = &result {
                if db_err.is_unique_violation() {
                    return Err(JamieError::Conflict(format!(
                        "voice stream already exists for session {session_id} ssrc {ssrc}"
                    )));
                }
            }
            result?;

            Ok(VoiceStream {
                id: id.clone(),
                session_id: session_id.clone(),
                ssrc,
                speaker_external_id: speaker_external_id.to_owned(),
                packet_seq_offset,
                sample_idx_offset,
                created_at,
            })
        })
        .await
    }

    pub async fn find_voice_stream_by_ssrc(
        &self,
        session_id: &SessionId,
        ssrc: u32,
    ) -> Result<Option<VoiceStream>> {
        with_timeout(async {
            let row = sqlx::query(
                "SELECT id, session_id, ssrc, speaker_external_id, packet_seq_offset, sample_idx_offset, created_at \
                 FROM voice_streams WHERE session_id = ? AND ssrc = ?",
            )
            .bind(session_id.as_str())
            .bind(i64::from(ssrc))
            .fetch_optional(&self.pool)
            .await?;

            row.map(|row| {
                Ok(VoiceStream {
                    id: StreamId::new(row.try_get::<String, _>("id")?),
                    session_id: SessionId::new(row.try_get::<String, _>("session_id")?),
                    ssrc: u32::try_from(row.try_get::<i64, _>("ssrc")?).unwrap_or(0),
                    speaker_external_id: row.try_get("speaker_external_id")?,
                    packet_seq_offset: u16::try_from(row.try_get::<i64, _>("packet_seq_offset")?)
                        .unwrap_or(0),
                    sample_idx_offset: u32::try_from(row.try_get::<i64, _>("sample_idx_offset")?)
                        .unwrap_or(0),
                    created_at: row.try_get("created_at")?,
                })
            })
            .transpose()
        })
        .await
    }

    /// Lists every `VoiceStream` recorded for `session_id`, oldest first.
    pub async fn list_voice_streams(&self, session_id: &SessionId) -> Result<Vec<VoiceStream>> {
        with_timeout(async {
            let rows = sqlx::query(
                "SELECT id, session_id, ssrc, speaker_external_id, packet_seq_offset, sample_idx_offset, created_at \
                 FROM voice_streams WHERE session_id = ? ORDER BY created_at ASC",
            )
            .bind(session_id.as_str())
            .fetch_all(&self.pool)
            .await?;

            rows.into_iter()
                .map(|row| {
                    Ok(VoiceStream {
                        id: StreamId::new(row.try_get::<String, _>("id")?),
                        session_id: SessionId::new(row.try_get::<String, _>("session_id")?),
                        ssrc: u32::try_from(row.try_get::<i64, _>("ssrc")?).unwrap_or(0),
                        speaker_external_id: row.try_get("speaker_external_id")?,
                        packet_seq_offset: u16::try_from(row.try_get::<i64, _>("packet_seq_offset")?)
                            .unwrap_or(0),
                        sample_idx_offset: u32::try_from(row.try_get::<i64, _>("sample_idx_offset")?)
                            .unwrap_or(0),
                        created_at: row.try_get("created_at")?,
                    })
                })
                .collect()
        })
        .await
    }

    /// Lists every `VoiceStream` known to the store, oldest first,
    /// regardless of which session it belongs to.
    pub async fn list_all_voice_streams(&self) -> Result<Vec<VoiceStream>> {
        with_timeout(async {
            let rows = sqlx::query(
                "SELECT id, session_id, ssrc, speaker_external_id, packet_seq_offset, sample_idx_offset, created_at \
                 FROM voice_streams ORDER BY created_at ASC",
            )
            .fetch_all(&self.pool)
            .await?;

            rows.into_iter()
                .map(|row| {
                    Ok(VoiceStream {
                        id: StreamId::new(row.try_get::<String, _>("id")?),
                        session_id: SessionId::new(row.try_get::<String, _>("session_id")?),
                        ssrc: u32::try_from(row.try_get::<i64, _>("ssrc")?).unwrap_or(0),
                        speaker_external_id: row.try_get("speaker_external_id")?,
                        packet_seq_offset: u16::try_from(row.try_get::<i64, _>("packet_seq_offset")?)
                            .unwrap_or(0),
                        sample_idx_offset: u32::try_from(row.try_get::<i64, _>("sample_idx_offset")?)
                            .unwrap_or(0),
                        created_at: row.try_get("created_at")?,
                    })
                })
                .collect()
        })
        .await
    }

    /// Fetches a single `VoiceStream` by id, regardless of session.
    pub async fn get_voice_stream(&self, id: &StreamId) -> Result<Option<VoiceStream>> {
        with_timeout(async {
            let row = sqlx::query(
                "SELECT id, session_id, ssrc, speaker_external_id, packet_seq_offset, sample_idx_offset, created_at \
                 FROM voice_streams WHERE id = ?",
            )
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

            row.map(|row| {
                Ok(VoiceStream {
                    id: StreamId::new(row.try_get::<String, _>("id")?),
                    session_id: SessionId::new(row.try_get::<String, _>("session_id")?),
                    ssrc: u32::try_from(row.try_get::<i64, _>("ssrc")?).unwrap_or(0),
                    speaker_external_id: row.try_get("speaker_external_id")?,
                    packet_seq_offset: u16::try_from(row.try_get::<i64, _>("packet_seq_offset")?)
                        .unwrap_or(0),
                    sample_idx_offset: u32::try_from(row.try_get::<i64, _>("sample_idx_offset")?)
                        .unwrap_or(0),
                    created_at: row.try_get("created_at")?,
                })
            })
            .transpose()
        })
        .await
    }

    /// Must be durable before returning; rejects `sampleIdx <
    /// stream.sampleIdxOffset`.
    pub async fn insert_voice_packet(
        &self,
        stream: &VoiceStream,
        sequence: u16,
        sample_idx: u32,
        payload: Vec<u8>,
    ) -> Result<PacketId> {
        with_timeout(async {
            if sample_idx < stream.sample_idx_offset {
                return Err(JamieError::Protocol(format!(
                    "sampleIdx {sample_idx} precedes stream offset {}",
                    stream.sample_idx_offset
                )));
            }
            let id = PacketId::new(self.clock.fresh_id());
            let received_at = self.clock.now_ns();
            sqlx::query(
                "INSERT INTO voice_packets (id, stream_id, sequence, sample_idx, payload, received_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(id.as_str())
            .bind(stream.id.as_str())
            .bind(i64::from(sequence))
            .bind(i64::from(sample_idx))
            .bind(payload)
            .bind(received_at)
            .execute(&self.pool)
            .await?;

            self.notifier.publish_packet_inserted(Notification::NewPacket {
                stream_id: stream.id.clone(),
                sample_idx,
            });
            Ok(id)
        })
        .await
    }

    /// Ascending by `sampleIdx`; half-open `[start, end)`.
    pub async fn get_packets_in_range(
        &self,
        stream_id: &StreamId,
        start_sample: u32,
        end_sample: u32,
    ) -> Result<Vec<VoicePacket>> {
        with_timeout(async {
            let rows = sqlx::query(
                "SELECT id, stream_id, sequence, sample_idx, payload, received_at \
                 FROM voice_packets WHERE stream_id = ? AND sample_idx >= ? AND sample_idx < ? \
                 ORDER BY sample_idx ASC",
            )
            .bind(stream_id.as_str())
            .bind(i64::from(start_sample))
            .bind(i64::from(end_sample))
            .fetch_all(&self.pool)
            .await?;

            rows.into_iter()
                .map(|row| {
                    Ok(VoicePacket {
                        id: PacketId::new(row.try_get::<String, _>("id")?),
                        stream_id: StreamId::new(row.try_get::<String, _>("stream_id")?),
                        sequence: u16::try_from(row.try_get::<i64, _>("sequence")?).unwrap_or(0),
                        sample_idx: u32::try_from(row.try_get::<i64, _>("sample_idx")?).unwrap_or(0),
                        payload: row.try_get("payload")?,
                        received_at: row.try_get("received_at")?,
                    })
                })
                .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
                .map_err(JamieError::from)
        })
        .await
    }

    /// The upsert protocol, applied atomically: opens a new segment
    /// when the recognition session has none or its last segment is
    /// already final, otherwise bumps the existing tail segment's version.
    /// Inserts the hypothesis's words and alternatives under that segment
    /// in the same transaction, then publishes `TranscriptChanged`.
    #[allow(clippy::too_many_arguments)]
    pub async fn apply_hypothesis(
        &self,
        recognition_session_id: &RecognitionSessionId,
        is_final: bool,
        words: &[HypothesisWord],
    ) -> Result<(SegmentId, u32)> {
        with_timeout(async {
            let mut tx = self.pool.begin().await?;

            let last = sqlx::query(
                "SELECT id, is_final, version FROM transcript_segments \
                 WHERE recognition_session_id = ? ORDER BY id DESC LIMIT 1",
            )
            .bind(recognition_session_id.as_str())
            .fetch_optional(&mut *tx)
            .await?;

            let reusable_tail = match last {
                Some(row) if row.try_get::<i64, _>("is_final")? == 0 => {
                    Some((row.try_get::<String, _>("id")?, row.try_get::<i64, _>("version")?))
                },
                _ => None,
            };
            let (segment_id, version, is_new) = match reusable_tail {
                Some((id, version)) => (id, version + 1, false),
                None => (self.clock.fresh_id(), 1, true),
            };

            let created_at = self.clock.now_ns();
            if is_new {
                sqlx::query(
                    "INSERT INTO transcript_segments (id, recognition_session_id, is_final, version, created_at) \
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(&segment_id)
                .bind(recognition_session_id.as_str())
                .bind(i64::from(is_final))
                .bind(version)
                .bind(created_at)
                .execute(&mut *tx)
                .await?;
            } else {
                sqlx::query("UPDATE transcript_segments SET is_final = ?, version = ? WHERE id = ?")
                    .bind(i64::from(is_final))
                    .bind(version)
                    .bind(&segment_id)
                    .execute(&mut *tx)
                    .await?;
            }

            for word in words {
                let word_id = self.clock.fresh_id();
                sqlx::query(
                    "INSERT INTO transcript_words (id, segment_id, start_time, duration, is_eos, attaches_to, version) \
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&word_id)
                .bind(&segment_id)
                .bind(word.start_time)
                .bind(word.duration)
                .bind(i64::from(word.is_end_of_sentence))
                .bind(match word.attaches_to {
                    AttachesTo::None => "none",
                    AttachesTo::Previous => "previous",
                })
                .bind(version)
                .execute(&mut *tx)
                .await?;

                for alt in &word.alternatives {
                    let alt_id = self.clock.fresh_id();
                    sqlx::query(
                        "INSERT INTO word_alternatives (id, word_id, content, confidence) VALUES (?, ?, ?, ?)",
                    )
                    .bind(&alt_id)
                    .bind(&word_id)
                    .bind(&alt.content)
                    .bind(f64::from(alt.confidence))
                    .execute(&mut *tx)
                    .await?;
                }
            }

            tx.commit().await?;

            let segment_id = SegmentId::new(segment_id);
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            let version_u32 = version as u32;
            self.notifier.publish_transcript_changed(Notification::TranscriptChanged {
                segment_id: segment_id.clone(),
                session_id: recognition_session_id.clone(),
                is_final,
                version: version_u32,
            });
            Ok((segment_id, version_u32))
        })
        .await
    }

    /// Fetches a segment's current (highest-version) words with chosen
    /// alternatives, per the "current view" rule: only words at the
    /// segment's own version are visible.
    pub async fn get_segment_with_words(&self, segment_id: &SegmentId) -> Result<SegmentWithWords> {
        with_timeout(async {
            let segment_row = sqlx::query(
                "SELECT id, recognition_session_id, is_final, version FROM transcript_segments WHERE id = ?",
            )
            .bind(segment_id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| JamieError::NotFound(format!("segment {segment_id}")))?;

            let version: i64 = segment_row.try_get("version")?;

            let word_rows = sqlx::query(
                "SELECT id, start_time, duration, is_eos, attaches_to FROM transcript_words \
                 WHERE segment_id = ? AND version = ? ORDER BY start_time ASC",
            )
            .bind(segment_id.as_str())
            .bind(version)
            .fetch_all(&self.pool)
            .await?;

            let mut words = Vec::with_capacity(word_rows.len());
            for row in word_rows {
                let word_id: String = row.try_get("id")?;
                let alt_rows = sqlx::query(
                    "SELECT id, word_id, content, confidence FROM word_alternatives WHERE word_id = ? ORDER BY rowid ASC",
                )
                .bind(&word_id)
                .fetch_all(&self.pool)
                .await?;

                let alternatives: Vec<WordAlternative> = alt_rows
                    .into_iter()
                    .map(|r| {
                        Ok(WordAlternative {
                            id: WordAlternativeId::new(r.try_get::<String, _>("id")?),
                            word_id: WordId::new(word_id.clone()),
                            content: r.try_get("content")?,
                            #[allow(clippy::cast_possible_truncation)]
                            confidence: r.try_get::<f64, _>("confidence")? as f32,
                        })
                    })
                    .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;

                // max_by keeps the *last* equally-maximum element; the chosen
                // alternative must tie-break to the first-inserted one instead,
                // so the comparison also orders on (reversed) index.
                let chosen = alternatives
                    .iter()
                    .enumerate()
                    .max_by(|(ia, a), (ib, b)| {
                        a.confidence
                            .partial_cmp(&b.confidence)
                            .unwrap_or(std::cmp::Ordering::Equal)
                            .then(ib.cmp(ia))
                    })
                    .map(|(_, alt)| alt.clone())
                    .ok_or_else(|| JamieError::Protocol(format!("word {word_id} has no alternatives")))?;

                words.push(WordWithAlternatives {
                    id: WordId::new(word_id),
                    start_time: row.try_get("start_time")?,
                    duration: row.try_get("duration")?,
                    is_end_of_sentence: row.try_get::<i64, _>("is_eos")? != 0,
                    attaches_to: if row.try_get::<String, _>("attaches_to")? == "previous" {
                        AttachesTo::Previous
                    } else {
                        AttachesTo::None
                    },
                    alternatives,
                    chosen,
                });
            }

            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            Ok(SegmentWithWords {
                id: segment_id.clone(),
                recognition_session_id: RecognitionSessionId::new(
                    segment_row.try_get::<String, _>("recognition_session_id")?,
                ),
                is_final: segment_row.try_get::<i64, _>("is_final")? != 0,
                version: version as u32,
                words,
            })
        })
        .await
    }

    /// Most recent segments across all sessions, most recent first.
    pub async fn get_recent_transcripts(&self, limit: u32) -> Result<Vec<SegmentWithWords>> {
        with_timeout(async {
            let rows = sqlx::query(
                "SELECT id FROM transcript_segments ORDER BY created_at DESC LIMIT ?",
            )
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

            let mut out = Vec::with_capacity(rows.len());
            for row in rows {
                let id = SegmentId::new(row.try_get::<String, _>("id")?);
                out.push(self.get_segment_with_words(&id).await?);
            }
            Ok(out)
        })
        .await
    }

    /// All segments belonging to any recognition session over `stream_id`,
    /// oldest first.
    pub async fn get_transcript_for_stream(&self, stream_id: &StreamId) -> Result<Vec<SegmentWithWords>> {
        with_timeout(async {
            let rows = sqlx::query(
                "SELECT ts.id FROM transcript_segments ts \
                 JOIN recognition_sessions rs ON rs.id = ts.recognition_session_id \
                 WHERE rs.stream_id = ? ORDER BY ts.created_at ASC",
            )
            .bind(stream_id.as_str())
            .fetch_all(&self.pool)
            .await?;

            let mut out = Vec::with_capacity(rows.len());
            for row in rows {
                let id = SegmentId::new(row.try_get::<String, _>("id")?);
                out.push(self.get_segment_with_words(&id).await?);
            }
            Ok(out)
        })
        .await
    }

    /// The recognition sessions opened over `stream_id`, most recent first.
    pub async fn get_recognition_sessions_for_stream(
        &self,
        stream_id: &StreamId,
    ) -> Result<Vec<RecognitionSessionId>> {
        with_timeout(async {
            let rows = sqlx::query(
                "SELECT id FROM recognition_sessions WHERE stream_id = ? ORDER BY id DESC",
            )
            .bind(stream_id.as_str())
            .fetch_all(&self.pool)
            .await?;

            Ok(rows
                .into_iter()
                .map(|row| row.try_get::<String, _>("id").map(RecognitionSessionId::new))
                .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?)
        })
        .await
    }

    pub async fn create_recognition_session(
        &self,
        stream_id: &StreamId,
        language: &str,
        first_sample_idx: u32,
    ) -> Result<RecognitionSessionId> {
        with_timeout(async {
            let id = RecognitionSessionId::new(self.clock.fresh_id());
            sqlx::query(
                "INSERT INTO recognition_sessions (id, stream_id, language, first_sample_idx, state) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(id.as_str())
            .bind(stream_id.as_str())
            .bind(language)
            .bind(i64::from(first_sample_idx))
            .bind(recognition_state_str(RecognitionState::Connecting))
            .execute(&self.pool)
            .await?;
            Ok(id)
        })
        .await
    }

    pub async fn set_recognition_session_state(
        &self,
        id: &RecognitionSessionId,
        state: RecognitionState,
    ) -> Result<()> {
        with_timeout(async {
            sqlx::query("UPDATE recognition_sessions SET state = ? WHERE id = ?")
                .bind(recognition_state_str(state))
                .bind(id.as_str())
                .execute(&self.pool)
                .await?;
            Ok(())
        })
        .await
    }

    #[must_use]
    pub fn subscribe_packet_inserts(&self) -> PacketInsertSubscription {
        self.notifier.subscribe_packet_inserts()
    }

    #[must_use]
    pub fn subscribe_transcript_changes(&self) -> TranscriptChangeSubscription {
        self.notifier.subscribe_transcript_changes()
    }

    /// Reads `VoiceSession` row by id, used by `endVoiceSession` callers
    /// that need to confirm lifecycle state.
    pub async fn get_voice_session(&self, id: &SessionId) -> Result<Option<VoiceSession>> {
        with_timeout(async {
            let row = sqlx::query(
                "SELECT id, guild_id, channel_id, started_at, ended_at FROM voice_sessions WHERE id = ?",
            )
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
            row.map(|row| {
                Ok(VoiceSession {
                    id: SessionId::new(row.try_get::<String, _>("id")?),
                    guild_id: row.try_get("guild_id")?,
                    channel_id: row.try_get("channel_id")?,
                    started_at: row.try_get("started_at")?,
                    ended_at: row.try_get::<Option<i64>, _>("ended_at")?,
                })
            })
            .transpose()
        })
        .await
    }
}

fn recognition_state_str(state: RecognitionState) -> &'static str {
    match state {
        RecognitionState::Idle => "idle",
        RecognitionState::Connecting => "connecting",
        RecognitionState::Open => "open",
        RecognitionState::Closing => "closing",
        RecognitionState::Closed => "closed",
        RecognitionState::Failed => "failed",
    }
}

/// One word of a `Hypothesis` as handed to `apply_hypothesis`, mirroring
/// the ASR vendor's wire shape rather than `jamie_core::model`'s
/// storage shape, since ids are assigned inside the transaction.
#[derive(Debug, Clone)]
pub struct HypothesisWord {
    pub start_time: f64,
    pub duration: f64,
    pub is_end_of_sentence: bool,
    pub attaches_to: AttachesTo,
    pub alternatives: Vec<HypothesisAlternative>,
}

#[derive(Debug, Clone)]
pub struct HypothesisAlternative {
    pub content: String,
    pub confidence: f32,
}
