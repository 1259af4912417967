// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! C7 Transcript Reducer: applies each ASR `Hypothesis` to the versioned
//! transcript model using `jamie-store`'s upsert protocol.
//!
//! It is a stateless function over the `jamie-store` API, the plain shape
//! the rest of the workspace builds component-level tests around.

use jamie_asr::{Hypothesis, HypothesisResult};
use jamie_core::model::{RecognitionSessionId, SegmentId};
use jamie_core::Result;
use jamie_store::{HypothesisAlternative, HypothesisWord, Store};

/// Applies one hypothesis to `recognition_session_id`'s transcript,
/// returning the segment it landed in and that segment's new version.
///
/// # Errors
/// Propagates any `Storage`/`Timeout` failure from the underlying upsert.
pub async fn apply_hypothesis(
    store: &Store,
    recognition_session_id: &RecognitionSessionId,
    hypothesis: &Hypothesis,
) -> Result<(SegmentId, u32)> {
    let words: Vec<HypothesisWord> = hypothesis.results.iter().map(to_store_word).collect();
    store.apply_hypothesis(recognition_session_id, hypothesis.is_final, &words).await
}

fn to_store_word(result: &HypothesisResult) -> HypothesisWord {
    HypothesisWord {
        start_time: result.start_time,
        duration: (result.end_time - result.start_time).max(0.0),
        is_end_of_sentence: result.is_end_of_sentence,
        attaches_to: result.attaches_to,
        alternatives: result
            .alternatives
            .iter()
            .map(|a| HypothesisAlternative { content: a.content.clone(), confidence: a.confidence })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jamie_asr::HypothesisAlternative as AsrAlternative;
    use jamie_core::clock::SteppedClock;
    use jamie_core::model::AttachesTo;
    use std::sync::Arc;

    async fn store_with_session() -> (Store, RecognitionSessionId) {
        let store = Store::connect_with_clock("sqlite::memory:", Arc::new(SteppedClock::new(0))).await.expect("connect");
        let session_id = store.create_voice_session("guild", "channel").await.expect("session");
        let stream_id = jamie_core::model::StreamId::new("stream-1");
        let stream = store.create_voice_stream(&stream_id, &session_id, 42, "speaker", 0, 0).await.expect("stream");
        let recognition_session_id = store.create_recognition_session(&stream.id, "en", 0).await.expect("recognition session");
        (store, recognition_session_id)
    }

    fn word(start: f64, end: f64, is_eos: bool, attaches_to: AttachesTo, content: &str, confidence: f32) -> HypothesisResult {
        HypothesisResult {
            start_time: start,
            end_time: end,
            is_end_of_sentence: is_eos,
            attaches_to,
            alternatives: vec![AsrAlternative { content: content.into(), confidence }],
        }
    }

    #[tokio::test]
    async fn partials_then_a_final_collapse_into_one_segment() {
        let (store, recognition_session_id) = store_with_session().await;

        let partial1 =
            Hypothesis { is_final: false, results: vec![word(0.0, 0.4, false, AttachesTo::None, "hel", 0.3)] };
        let partial2 =
            Hypothesis { is_final: false, results: vec![word(0.0, 0.4, false, AttachesTo::None, "hell", 0.5)] };
        let final_hyp = Hypothesis {
            is_final: true,
            results: vec![
                word(0.0, 0.4, false, AttachesTo::None, "hello", 0.9),
                word(0.4, 0.9, true, AttachesTo::None, "world", 0.95),
            ],
        };

        apply_hypothesis(&store, &recognition_session_id, &partial1).await.expect("apply partial1");
        apply_hypothesis(&store, &recognition_session_id, &partial2).await.expect("apply partial2");
        let (segment_id, version) =
            apply_hypothesis(&store, &recognition_session_id, &final_hyp).await.expect("apply final");

        assert_eq!(version, 3);
        let segment = store.get_segment_with_words(&segment_id).await.expect("segment");
        assert!(segment.is_final);
        assert_eq!(segment.version, 3);
        assert_eq!(segment.words.len(), 2);
        assert_eq!(segment.words[0].chosen.content, "hello");
        assert_eq!(segment.words[1].chosen.content, "world");
    }

    #[tokio::test]
    async fn a_final_followed_by_a_new_hypothesis_opens_a_new_segment() {
        let (store, recognition_session_id) = store_with_session().await;

        let first_final =
            Hypothesis { is_final: true, results: vec![word(0.0, 0.4, true, AttachesTo::None, "hi", 0.9)] };
        let (first_segment, _) = apply_hypothesis(&store, &recognition_session_id, &first_final).await.expect("apply first");

        let second = Hypothesis { is_final: false, results: vec![word(1.0, 1.4, false, AttachesTo::None, "there", 0.8)] };
        let (second_segment, version) = apply_hypothesis(&store, &recognition_session_id, &second).await.expect("apply second");

        assert_ne!(first_segment, second_segment);
        assert_eq!(version, 1);
    }
}
