//! Character-budget splitter turning extracted text into a chunk sequence.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::Result;
use crate::types::Chunk;

const PAGE_BREAK: char = '\u{000C}';

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Upper bound on chunk length, in characters.
    pub chunk_size: usize,
    /// Characters of trailing context repeated at the start of the next piece
    /// when an oversize paragraph is split.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 150,
        }
    }
}

#[derive(Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(chunking_config: ChunkingConfig) -> Self {
        Self { chunking_config }
    }

    /// Split a file, or every `.txt`/`.md` file under a directory, into one
    /// chunk sequence with ids assigned from zero.
    pub fn process_path(&self, path: &Path) -> Result<Vec<Chunk>> {
        let files = if fs::metadata(path)?.is_dir() {
            self.list_text_files(path)
        } else {
            vec![path.to_path_buf()]
        };
        let mut all_chunks = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            debug!(
                file = %file_path.display(),
                "processing file {}/{}",
                file_index + 1,
                files.len()
            );
            let content = self.read_file_content(file_path)?;
            for mut chunk in self.split_text(&content) {
                chunk.id = all_chunks.len();
                all_chunks.push(chunk);
            }
        }
        info!(
            files = files.len(),
            chunks = all_chunks.len(),
            "processed {}",
            path.display()
        );
        Ok(all_chunks)
    }

    /// Split text into chunks. Form feeds mark page boundaries; chunks never
    /// span two pages.
    pub fn split_text(&self, text: &str) -> Vec<Chunk> {
        let paged = text.contains(PAGE_BREAK);
        let mut chunks = Vec::new();
        for (page_index, page) in text.split(PAGE_BREAK).enumerate() {
            let page_no = if paged {
                u32::try_from(page_index).ok()
            } else {
                None
            };
            for piece in self.chunk_page(page) {
                chunks.push(Chunk {
                    id: chunks.len(),
                    text: piece,
                    page: page_no,
                });
            }
        }
        chunks
    }

    fn chunk_page(&self, page: &str) -> Vec<String> {
        let limit = self.chunking_config.chunk_size;
        let mut pieces = Vec::new();
        let mut buffer = String::new();
        let mut buffer_len = 0usize;
        for paragraph in page.split("\n\n") {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }
            let len = paragraph.chars().count();
            if len > limit {
                if !buffer.is_empty() {
                    pieces.push(std::mem::take(&mut buffer));
                    buffer_len = 0;
                }
                pieces.extend(self.split_paragraph_with_overlap(paragraph));
            } else if buffer.is_empty() {
                buffer.push_str(paragraph);
                buffer_len = len;
            } else if buffer_len + 2 + len <= limit {
                buffer.push_str("\n\n");
                buffer.push_str(paragraph);
                buffer_len += 2 + len;
            } else {
                pieces.push(std::mem::replace(&mut buffer, paragraph.to_string()));
                buffer_len = len;
            }
        }
        if !buffer.is_empty() {
            pieces.push(buffer);
        }
        pieces
    }

    fn split_paragraph_with_overlap(&self, paragraph: &str) -> Vec<String> {
        let limit = self.chunking_config.chunk_size;
        let overlap = self.chunking_config.chunk_overlap;
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        let mut pieces = Vec::new();
        let mut start = 0;
        while start < words.len() {
            let mut end = start;
            let mut len = 0;
            while end < words.len() {
                let add = words[end].chars().count() + usize::from(end > start);
                if end > start && len + add > limit {
                    break;
                }
                len += add;
                end += 1;
            }
            pieces.push(words[start..end].join(" "));
            if end >= words.len() {
                break;
            }
            let mut back = end;
            let mut carried = 0;
            while back > start + 1 {
                let w = words[back - 1].chars().count() + 1;
                if carried + w > overlap {
                    break;
                }
                carried += w;
                back -= 1;
            }
            start = back;
        }
        pieces
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    fn list_text_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| matches!(p.extension().and_then(|s| s.to_str()), Some("txt" | "md")))
            .collect();
        files.sort();
        files
    }
}
