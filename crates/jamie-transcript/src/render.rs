// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Confidence-floor rendering: applied when a segment is read back out for
//! display, never when it is written, so the Reducer never drops data.

use jamie_core::model::{AttachesTo, SegmentId};
use jamie_store::SegmentWithWords;

/// Default confidence floor below which a word is omitted from a
/// rendered view, though it remains in storage.
pub const DEFAULT_CONFIDENCE_FLOOR: f32 = 0.70;

#[derive(Debug, Clone)]
pub struct RenderedWord {
    pub content: String,
    pub confidence: f32,
    pub start_time: f64,
    pub duration: f64,
    pub is_end_of_sentence: bool,
    pub attaches_to: AttachesTo,
}

#[derive(Debug, Clone)]
pub struct RenderedSegment {
    pub id: SegmentId,
    pub is_final: bool,
    pub version: u32,
    pub words: Vec<RenderedWord>,
}

/// Renders `segment`'s current word set, dropping any word whose chosen
/// alternative falls below `confidence_floor`.
#[must_use]
pub fn render_segment(segment: &SegmentWithWords, confidence_floor: f32) -> RenderedSegment {
    let words = segment
        .words
        .iter()
        .filter(|word| word.chosen.confidence >= confidence_floor)
        .map(|word| RenderedWord {
            content: word.chosen.content.clone(),
            confidence: word.chosen.confidence,
            start_time: word.start_time,
            duration: word.duration,
            is_end_of_sentence: word.is_end_of_sentence,
            attaches_to: word.attaches_to,
        })
        .collect();

    RenderedSegment { id: segment.id.clone(), is_final: segment.is_final, version: segment.version, words }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jamie_core::model::{RecognitionSessionId, WordAlternative, WordAlternativeId, WordId};
    use jamie_store::WordWithAlternatives;

    fn word_with(content: &str, confidence: f32) -> WordWithAlternatives {
        let word_id = WordId::new("w1");
        let alt = WordAlternative {
            id: WordAlternativeId::new("a1"),
            word_id: word_id.clone(),
            content: content.into(),
            confidence,
        };
        WordWithAlternatives {
            id: word_id,
            start_time: 0.0,
            duration: 0.4,
            is_end_of_sentence: false,
            attaches_to: AttachesTo::None,
            alternatives: vec![alt.clone()],
            chosen: alt,
        }
    }

    #[test]
    fn low_confidence_words_are_omitted_by_default() {
        let segment = SegmentWithWords {
            id: SegmentId::new("s1"),
            recognition_session_id: RecognitionSessionId::new("rs1"),
            is_final: true,
            version: 1,
            words: vec![word_with("hello", 0.95), word_with("mumble", 0.2)],
        };
        let rendered = render_segment(&segment, DEFAULT_CONFIDENCE_FLOOR);
        assert_eq!(rendered.words.len(), 1);
        assert_eq!(rendered.words[0].content, "hello");
    }

    #[test]
    fn a_lower_floor_admits_more_words() {
        let segment = SegmentWithWords {
            id: SegmentId::new("s1"),
            recognition_session_id: RecognitionSessionId::new("rs1"),
            is_final: true,
            version: 1,
            words: vec![word_with("mumble", 0.2)],
        };
        let rendered = render_segment(&segment, 0.1);
        assert_eq!(rendered.words.len(), 1);
    }
}
