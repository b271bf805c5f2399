//! Caption tokenization and loss-mask construction.

use crate::tokenizer::TextEncoder;
use vistext_core::Result;

/// Token ids plus the parallel predict mask for one caption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionLabels {
    /// Token ids, BOS first and EOS last.
    pub tokens: Vec<i32>,
    /// Per-token 0/1 flags marking which tokens contribute to the loss.
    pub need_predict: Vec<i32>,
}

impl CaptionLabels {
    /// Number of tokens, special tokens included.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True when the caption holds only BOS and EOS.
    pub fn is_empty(&self) -> bool {
        self.tokens.len() == 2
    }
}

/// Build the token sequence and predict mask for a (prefix, target) pair.
///
/// Prefix and target are tokenized independently without special tokens
/// and concatenated; prefix tokens get mask 0, target tokens mask 1.
/// When the concatenation exceeds `max_text_len - 2`, the payload is
/// truncated from the left — the earliest tokens are dropped so the most
/// recent target content survives. The result is wrapped with BOS
/// (mask 0) and EOS (mask 1).
pub fn build_caption_labels(
    encoder: &dyn TextEncoder,
    prefix: &str,
    target: &str,
    max_text_len: usize,
) -> Result<CaptionLabels> {
    let prefix_ids = encoder.encode(prefix, max_text_len)?;
    let target_ids = encoder.encode(target, max_text_len)?;

    let mut need_predict = vec![0; prefix_ids.len()];
    need_predict.extend(std::iter::repeat(1).take(target_ids.len()));
    let mut payload = prefix_ids;
    payload.extend_from_slice(&target_ids);

    // Keep the suffix: target text is typically shorter and more
    // informative than a long prefix.
    let keep = max_text_len.saturating_sub(2);
    if payload.len() > keep {
        payload.drain(..payload.len() - keep);
        need_predict.drain(..need_predict.len() - keep);
    }

    let mut tokens = Vec::with_capacity(payload.len() + 2);
    tokens.push(encoder.bos_id());
    tokens.extend_from_slice(&payload);
    tokens.push(encoder.eos_id());

    let mut mask = Vec::with_capacity(need_predict.len() + 2);
    mask.push(0);
    mask.extend_from_slice(&need_predict);
    mask.push(1);

    Ok(CaptionLabels {
        tokens,
        need_predict: mask,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::TextEncoder;
    use vistext_core::Result;

    /// One id per whitespace-separated word: 100 + word length.
    pub(crate) struct StubEncoder;

    impl TextEncoder for StubEncoder {
        fn encode(&self, text: &str, max_len: usize) -> Result<Vec<i32>> {
            let mut ids: Vec<i32> = text
                .split_whitespace()
                .map(|w| 100 + w.len() as i32)
                .collect();
            ids.truncate(max_len);
            Ok(ids)
        }

        fn bos_id(&self) -> i32 {
            1
        }

        fn eos_id(&self) -> i32 {
            2
        }

        fn pad_id(&self) -> i32 {
            0
        }
    }

    #[test]
    fn empty_pair_is_bos_eos() {
        let labels = build_caption_labels(&StubEncoder, "", "", 40).unwrap();
        assert_eq!(labels.tokens, vec![1, 2]);
        assert_eq!(labels.need_predict, vec![0, 1]);
        assert!(labels.is_empty());
    }

    #[test]
    fn target_only_caption() {
        // "a cat" -> [101, 103]
        let labels = build_caption_labels(&StubEncoder, "", "a cat", 40).unwrap();
        assert_eq!(labels.tokens, vec![1, 101, 103, 2]);
        assert_eq!(labels.need_predict, vec![0, 1, 1, 1]);
    }

    #[test]
    fn prefix_tokens_are_masked_out() {
        let labels = build_caption_labels(&StubEncoder, "in the", "a cat", 40).unwrap();
        assert_eq!(labels.tokens.len(), labels.need_predict.len());
        assert_eq!(labels.need_predict, vec![0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn masks_align_and_fit_budget() {
        for (prefix, target) in [
            ("", "one two three"),
            ("p q r s t u v w", "x y"),
            ("word", ""),
        ] {
            let labels = build_caption_labels(&StubEncoder, prefix, target, 10).unwrap();
            assert_eq!(labels.tokens.len(), labels.need_predict.len());
            assert!(labels.tokens.len() <= 10);
            assert_eq!(labels.need_predict[0], 0);
            assert_eq!(*labels.need_predict.last().unwrap(), 1);
        }
    }

    #[test]
    fn truncation_keeps_payload_suffix() {
        // 6 prefix words + 3 target words = 9 payload tokens, budget 6 + 2.
        let prefix = "a bb ccc dddd eeeee ffffff";
        let target = "g hh iii";
        let labels = build_caption_labels(&StubEncoder, prefix, target, 8).unwrap();

        let full: Vec<i32> = StubEncoder
            .encode(prefix, 40)
            .unwrap()
            .into_iter()
            .chain(StubEncoder.encode(target, 40).unwrap())
            .collect();
        let expected_payload = &full[full.len() - 6..];

        assert_eq!(&labels.tokens[1..7], expected_payload);
        assert_eq!(labels.tokens.len(), 8);
        // The three target tokens survive at the end of the payload.
        assert_eq!(labels.need_predict, vec![0, 0, 0, 0, 1, 1, 1, 1]);
    }

    #[test]
    fn truncation_can_drop_all_prefix_tokens() {
        let prefix = "a b";
        let target = "c d e f g h";
        let labels = build_caption_labels(&StubEncoder, prefix, target, 6).unwrap();
        assert_eq!(labels.tokens.len(), 6);
        // Only the last four target tokens remain, all predicted.
        assert_eq!(labels.need_predict, vec![0, 1, 1, 1, 1, 1]);
    }
}
