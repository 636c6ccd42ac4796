//! Fixed-window text splitter.
//!
//! Pure: same text and config always produce the same chunk sequence, which
//! is what makes chunk identity stable across re-ingestion.

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SplitterError {
    #[error("chunk_size must be greater than zero")]
    ZeroChunkSize,

    #[error("chunk_overlap ({overlap}) must be smaller than chunk_size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    /// # Errors
    ///
    /// Returns an error if `chunk_size` is zero or `chunk_overlap` is not
    /// smaller than `chunk_size`.
    pub fn new(config: SplitterConfig) -> Result<Self, SplitterError> {
        if config.chunk_size == 0 {
            return Err(SplitterError::ZeroChunkSize);
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(SplitterError::OverlapTooLarge {
                size: config.chunk_size,
                overlap: config.chunk_overlap,
            });
        }
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> SplitterConfig {
        self.config
    }

    /// Split `text` into windows of `chunk_size` characters, each window
    /// advancing by `chunk_size - chunk_overlap`. The final window may be
    /// shorter; the sequence is minimal (splitting stops at the first window
    /// that reaches the end of input). Empty text yields no chunks.
    #[must_use]
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let size = self.config.chunk_size;
        let step = size - self.config.chunk_overlap;

        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + size).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }
        chunks
    }
}
