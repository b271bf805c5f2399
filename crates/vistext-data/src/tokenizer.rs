//! Tokenizer integration.

use std::path::Path;
use vistext_core::{Result, VisTextError};

/// Text-to-ids service consumed by the label builder.
///
/// Encoding never adds special tokens; begin/end/pad ids are exposed
/// separately so the label builder controls sequence framing.
pub trait TextEncoder: Send + Sync {
    /// Encode text to token ids, truncated to at most `max_len` ids.
    fn encode(&self, text: &str, max_len: usize) -> Result<Vec<i32>>;

    /// Begin-of-sequence token id.
    fn bos_id(&self) -> i32;

    /// End-of-sequence token id.
    fn eos_id(&self) -> i32;

    /// Padding token id.
    fn pad_id(&self) -> i32;
}

/// Wrapper around the tokenizers library.
pub struct HfTextEncoder {
    inner: tokenizers::Tokenizer,
    bos_id: i32,
    eos_id: i32,
    pad_id: i32,
}

impl HfTextEncoder {
    /// Load a tokenizer from a local `tokenizer.json` file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| VisTextError::Tokenizer(e.to_string()))?;
        Self::from_inner(inner)
    }

    /// Load a tokenizer from serialized bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_bytes(bytes)
            .map_err(|e| VisTextError::Tokenizer(e.to_string()))?;
        Self::from_inner(inner)
    }

    fn from_inner(inner: tokenizers::Tokenizer) -> Result<Self> {
        let bos_id = resolve_id(&inner, &["[CLS]", "<s>", "<|begin_of_text|>", "<bos>"])
            .ok_or_else(|| {
                VisTextError::Config("tokenizer has no begin-of-sequence token".to_string())
            })?;
        let eos_id = resolve_id(&inner, &["[SEP]", "</s>", "<|end_of_text|>", "<eos>"])
            .ok_or_else(|| {
                VisTextError::Config("tokenizer has no end-of-sequence token".to_string())
            })?;
        let pad_id = resolve_id(&inner, &["[PAD]", "<pad>", "<|pad|>"]).unwrap_or(0);
        Ok(Self {
            inner,
            bos_id,
            eos_id,
            pad_id,
        })
    }

    /// Decode token ids back to text, skipping special tokens.
    pub fn decode(&self, ids: &[i32]) -> Result<String> {
        let ids: Vec<u32> = ids.iter().map(|&id| id as u32).collect();
        self.inner
            .decode(&ids, true)
            .map_err(|e| VisTextError::Tokenizer(e.to_string()))
    }

    /// Vocabulary size, special tokens included.
    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }

    /// Get the underlying tokenizer.
    pub fn inner(&self) -> &tokenizers::Tokenizer {
        &self.inner
    }
}

impl TextEncoder for HfTextEncoder {
    fn encode(&self, text: &str, max_len: usize) -> Result<Vec<i32>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| VisTextError::Tokenizer(e.to_string()))?;
        let mut ids: Vec<i32> = encoding.get_ids().iter().map(|&id| id as i32).collect();
        ids.truncate(max_len);
        Ok(ids)
    }

    fn bos_id(&self) -> i32 {
        self.bos_id
    }

    fn eos_id(&self) -> i32 {
        self.eos_id
    }

    fn pad_id(&self) -> i32 {
        self.pad_id
    }
}

/// Try each well-known token name in turn.
fn resolve_id(tokenizer: &tokenizers::Tokenizer, names: &[&str]) -> Option<i32> {
    names
        .iter()
        .find_map(|name| tokenizer.token_to_id(name))
        .map(|id| id as i32)
}
