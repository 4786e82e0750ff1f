use crate::error::ConfigError;
use crate::models::{SourceDocument, TextChunk};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const DEFAULT_CHUNK_SIZE: usize = 1_000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

const SENTENCE_TERMINATORS: [char; 4] = ['.', '?', '!', '\n'];

/// Window parameters, all measured in chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
    /// How far back from a window's end to look for a sentence terminator.
    pub boundary_lookback: usize,
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
            boundary_lookback: chunk_size / 10 * 3 + chunk_size % 10 * 3 / 10,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(ConfigError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than chunk_size {}",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// Distance between consecutive window starts.
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan<'a> {
    pub index: u64,
    pub start: usize,
    pub end: usize,
    pub text: &'a str,
}

/// Lazy sequence of overlapping windows over a borrowed text.
///
/// Window `i` starts at `i * step`. A non-final window is shortened to end just
/// after the last sentence terminator inside its lookback region, but never
/// before the next window's start, so consecutive spans always touch or
/// overlap. Iteration ends with the first span that reaches the end of the
/// text.
pub struct ChunkSpans<'a> {
    text: &'a str,
    chars: Vec<(usize, char)>,
    config: ChunkingConfig,
    start: usize,
    index: u64,
    finished: bool,
}

impl<'a> ChunkSpans<'a> {
    pub fn new(text: &'a str, config: ChunkingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            text,
            chars: text.char_indices().collect(),
            config,
            start: 0,
            index: 0,
            finished: false,
        })
    }

    fn byte_at(&self, char_position: usize) -> usize {
        self.chars
            .get(char_position)
            .map(|(byte, _)| *byte)
            .unwrap_or(self.text.len())
    }

    fn sentence_cut(&self, nominal_end: usize) -> usize {
        let next_start = self.start.saturating_add(self.config.step());
        let floor = nominal_end
            .saturating_sub(self.config.boundary_lookback)
            .max(next_start);

        (floor..nominal_end)
            .rev()
            .find(|position| SENTENCE_TERMINATORS.contains(&self.chars[*position].1))
            .map(|position| position + 1)
            .unwrap_or(nominal_end)
    }
}

impl<'a> Iterator for ChunkSpans<'a> {
    type Item = ChunkSpan<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let total = self.chars.len();
        if self.finished || self.start >= total {
            return None;
        }

        let nominal_end = self.start.saturating_add(self.config.chunk_size).min(total);
        let end = if nominal_end < total {
            self.sentence_cut(nominal_end)
        } else {
            nominal_end
        };

        let text: &'a str = self.text;
        let span = ChunkSpan {
            index: self.index,
            start: self.start,
            end,
            text: &text[self.byte_at(self.start)..self.byte_at(end)],
        };

        if end == total {
            self.finished = true;
        }
        self.index += 1;
        self.start = self.start.saturating_add(self.config.step());

        Some(span)
    }
}

pub fn split_text(text: &str, config: ChunkingConfig) -> Result<ChunkSpans<'_>, ConfigError> {
    ChunkSpans::new(text, config)
}

/// Chunks one document's text, numbering chunks from zero.
pub fn build_chunks(
    document: &SourceDocument,
    text: &str,
    config: ChunkingConfig,
) -> Result<Vec<TextChunk>, ConfigError> {
    let chunks = split_text(text, config)?
        .map(|span| TextChunk {
            chunk_id: make_chunk_id(&document.checksum, span.index, span.text),
            source_filename: document.filename.clone(),
            source_checksum: document.checksum.clone(),
            chunk_index: span.index,
            start_offset: span.start,
            end_offset: span.end,
            text: span.text.to_string(),
        })
        .collect();

    Ok(chunks)
}

fn make_chunk_id(checksum: &str, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(checksum.as_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn reassemble(spans: &[ChunkSpan<'_>]) -> String {
        let mut output = String::new();
        let mut covered = 0;
        for span in spans {
            let skip = covered - span.start;
            output.extend(span.text.chars().skip(skip));
            covered = span.end;
        }
        output
    }

    fn sentences(count: usize) -> String {
        (0..count)
            .map(|number| format!("Sentence number {number:04} is here. "))
            .collect()
    }

    #[test]
    fn empty_text_yields_no_chunks() -> Result<(), ConfigError> {
        assert_eq!(split_text("", ChunkingConfig::default())?.count(), 0);
        Ok(())
    }

    #[test]
    fn short_text_yields_single_identical_chunk() -> Result<(), ConfigError> {
        let text = "Only one sentence. And a second one that ends early.";
        let spans = split_text(text, ChunkingConfig::default())?.collect::<Vec<_>>();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, text);
        assert_eq!((spans[0].start, spans[0].end), (0, text.chars().count()));
        Ok(())
    }

    #[test]
    fn three_thousand_chars_yield_four_chunks() -> Result<(), ConfigError> {
        let text = sentences(100);
        assert_eq!(text.chars().count(), 3_000);

        let spans = split_text(&text, ChunkingConfig::default())?.collect::<Vec<_>>();
        assert_eq!(spans.len(), 4);
        assert_eq!(
            spans.iter().map(|span| span.start).collect::<Vec<_>>(),
            vec![0, 800, 1_600, 2_400]
        );
        assert_eq!(spans[3].end, 3_000);
        assert_eq!(reassemble(&spans), text);
        Ok(())
    }

    #[test]
    fn cuts_land_after_sentence_terminators() -> Result<(), ConfigError> {
        let text = sentences(100);
        let spans = split_text(&text, ChunkingConfig::default())?.collect::<Vec<_>>();
        for span in &spans[..spans.len() - 1] {
            assert!(span.text.ends_with('.'), "chunk {} ends mid-sentence", span.index);
            assert!(span.end - span.start <= 1_000);
        }
        Ok(())
    }

    #[test]
    fn text_without_terminators_is_cut_at_window_boundary() -> Result<(), ConfigError> {
        let text = "x".repeat(25);
        let spans = split_text(&text, ChunkingConfig::new(10, 3))?.collect::<Vec<_>>();
        assert_eq!(
            spans
                .iter()
                .map(|span| (span.start, span.end))
                .collect::<Vec<_>>(),
            vec![(0, 10), (7, 17), (14, 24), (21, 25)]
        );
        assert_eq!(reassemble(&spans), text);
        Ok(())
    }

    #[test]
    fn overlap_removed_concatenation_reconstructs_input() -> Result<(), ConfigError> {
        let texts = [
            sentences(37),
            "No punctuation at all but quite a few words in a row ".repeat(9),
            "Ünïcödé façade. Ça va? Ja! Déjà vu.\nNeue Zeile ".repeat(13),
            "a.".repeat(400),
        ];
        let configs = [
            ChunkingConfig::new(50, 10),
            ChunkingConfig::new(64, 63),
            ChunkingConfig::new(100, 0),
            ChunkingConfig::default(),
        ];

        for text in &texts {
            for config in configs {
                let spans = split_text(text, config)?.collect::<Vec<_>>();
                assert_eq!(&reassemble(&spans), text, "config {config:?}");
                for (position, span) in spans.iter().enumerate() {
                    assert_eq!(span.index, position as u64);
                    assert_eq!(span.text.chars().count(), span.end - span.start);
                }
            }
        }
        Ok(())
    }

    #[test]
    fn huge_chunk_sizes_do_not_overflow() -> Result<(), ConfigError> {
        let text = "Short text. It fits in one window.";
        for config in [
            ChunkingConfig::new(usize::MAX / 2, 200),
            ChunkingConfig::new(usize::MAX, 0),
            ChunkingConfig::new(usize::MAX, usize::MAX - 1),
        ] {
            assert!(config.boundary_lookback <= config.chunk_size);
            let spans = split_text(text, config)?.collect::<Vec<_>>();
            assert_eq!(spans.len(), 1);
            assert_eq!(spans[0].text, text);
        }
        assert_eq!(ChunkingConfig::new(1_000, 200).boundary_lookback, 300);
        Ok(())
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        assert!(split_text("abc", ChunkingConfig::new(10, 10)).is_err());
        assert!(split_text("abc", ChunkingConfig::new(0, 0)).is_err());
    }

    #[test]
    fn build_chunks_carries_document_identity() -> Result<(), ConfigError> {
        let document = SourceDocument {
            filename: "manual.pdf".to_string(),
            source_path: PathBuf::from("/tmp/manual.pdf"),
            checksum: "checksum".to_string(),
        };

        let chunks = build_chunks(&document, &sentences(70), ChunkingConfig::default())?;
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|chunk| chunk.source_filename == "manual.pdf"));
        assert_eq!(
            chunks.iter().map(|chunk| chunk.chunk_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_ne!(chunks[0].chunk_id, chunks[1].chunk_id);
        Ok(())
    }
}
