//! Ingestion: split dataset files into chunks, embed them, store them.
//!
//! Dataset files are named `<device>_<issue>_<cli-command>.<ext>`; the name
//! becomes chunk metadata so answers can point back at the device and the
//! command that produced the text.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use issuespilot_core::{Chunk, Embedder, Error, VectorIndex};
use tracing::{info, warn};
use uuid::Uuid;

/// Separator-first character splitter with overlap.
///
/// Text is split on `separator`, pieces longer than `chunk_size` characters
/// are cut into `chunk_size` windows, and pieces are packed greedily into
/// chunks of at most `chunk_size` characters. Each new chunk starts with the
/// trailing pieces of the previous one, up to `chunk_overlap` characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separator: String,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            chunk_overlap: 25,
            separator: "!".into(),
        }
    }
}

impl TextSplitter {
    pub fn new(
        chunk_size: usize,
        chunk_overlap: usize,
        separator: impl Into<String>,
    ) -> Result<Self, Error> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(Error::config(format!(
                "chunk overlap ({chunk_overlap}) must be smaller than chunk size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separator: separator.into(),
        })
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let pieces: Vec<String> = if self.separator.is_empty() {
            vec![text.to_string()]
        } else {
            text.split(self.separator.as_str())
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect()
        };

        let pieces: Vec<String> = pieces
            .into_iter()
            .flat_map(|p| self.cut_long(p))
            .collect();

        self.merge(pieces)
    }

    fn cut_long(&self, piece: String) -> Vec<String> {
        if piece.chars().count() <= self.chunk_size {
            return vec![piece];
        }
        let chars: Vec<char> = piece.chars().collect();
        chars
            .chunks(self.chunk_size)
            .map(|window| window.iter().collect::<String>().trim().to_string())
            .filter(|w| !w.is_empty())
            .collect()
    }

    fn merge(&self, pieces: Vec<String>) -> Vec<String> {
        let sep_len = self.separator.chars().count();
        let mut chunks = Vec::new();
        let mut current: VecDeque<String> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = piece.chars().count();
            let joiner = if current.is_empty() { 0 } else { sep_len };

            if total + len + joiner > self.chunk_size && !current.is_empty() {
                chunks.push(self.join(&current));

                // Keep a tail of at most `chunk_overlap` characters that still
                // leaves room for the incoming piece.
                while total > self.chunk_overlap
                    || (total > 0 && total + len + sep_len > self.chunk_size)
                {
                    let Some(front) = current.pop_front() else {
                        break;
                    };
                    total -= front.chars().count();
                    if !current.is_empty() {
                        total -= sep_len;
                    }
                }
            }

            if !current.is_empty() {
                total += sep_len;
            }
            total += len;
            current.push_back(piece);
        }

        if !current.is_empty() {
            chunks.push(self.join(&current));
        }
        chunks
    }

    fn join(&self, pieces: &VecDeque<String>) -> String {
        pieces
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(&self.separator)
    }
}

/// Device, issue and command parsed from a dataset file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub device_name: String,
    pub issue_name: String,
    pub cli_command: String,
}

impl FileMetadata {
    /// Parse `<device>_<issue>_<cli-command>`; dashes in the command become spaces.
    pub fn from_path(path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?;
        let mut parts = stem.splitn(3, '_');
        let device = parts.next().filter(|s| !s.is_empty())?;
        let issue = parts.next().filter(|s| !s.is_empty())?;
        let command = parts.next().filter(|s| !s.is_empty())?;

        Some(Self {
            device_name: device.to_string(),
            issue_name: issue.to_string(),
            cli_command: command.replace('-', " "),
        })
    }
}

/// Outcome of ingesting a dataset directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub files_ingested: usize,
    pub chunks_added: usize,
    pub skipped: Vec<PathBuf>,
    /// Collection size after the last file.
    pub collection_count: usize,
}

/// Splits, embeds and stores dataset files in one collection.
pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    splitter: TextSplitter,
}

impl Ingestor {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        splitter: TextSplitter,
    ) -> Self {
        Self {
            embedder,
            index,
            splitter,
        }
    }

    /// Build the chunks for one file's text, without embeddings.
    pub fn chunk_file(&self, text: &str, meta: &FileMetadata) -> Vec<Chunk> {
        self.splitter
            .split(text)
            .into_iter()
            .enumerate()
            .map(|(i, piece)| {
                Chunk::new(Uuid::new_v4().to_string(), piece)
                    .with_metadata("chunk_number", (i + 1).to_string())
                    .with_metadata("device_name", meta.device_name.as_str())
                    .with_metadata("issue_name", meta.issue_name.as_str())
                    .with_metadata("cli_command", meta.cli_command.as_str())
            })
            .collect()
    }

    /// Ingest one file. Returns the number of chunks added.
    pub async fn ingest_file(&self, collection: &str, path: &Path) -> Result<usize, Error> {
        let Some(meta) = FileMetadata::from_path(path) else {
            return Err(Error::Internal(format!(
                "{} is not named <device>_<issue>_<command>",
                path.display()
            )));
        };

        let text = tokio::fs::read_to_string(path).await?;
        let chunks = self.chunk_file(&text, &meta);
        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self
            .embedder
            .embed(&texts)
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;
        if vectors.len() != chunks.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let chunks: Vec<Chunk> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| chunk.with_embedding(vector))
            .collect();
        let added = chunks.len();

        self.index.add(collection, chunks).await?;
        Ok(added)
    }

    /// Ingest every regular file in `dir`, in file-name order.
    pub async fn ingest_dir(&self, collection: &str, dir: &Path) -> Result<IngestReport, Error> {
        self.index.get_or_create_collection(collection).await?;

        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();

        let mut report = IngestReport::default();

        for path in files {
            if FileMetadata::from_path(&path).is_none() {
                warn!(file = %path.display(), "Skipping file: name is not <device>_<issue>_<command>");
                report.skipped.push(path);
                continue;
            }

            let added = match self.ingest_file(collection, &path).await {
                Ok(added) => added,
                Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::InvalidData => {
                    warn!(file = %path.display(), "Skipping file: not UTF-8 text");
                    report.skipped.push(path);
                    continue;
                }
                Err(e) => return Err(e),
            };

            report.files_ingested += 1;
            report.chunks_added += added;
            report.collection_count = self.index.count(collection).await?;

            info!(
                file = %path.display(),
                chunks = added,
                collection_count = report.collection_count,
                "Ingested file"
            );
        }

        Ok(report)
    }
}
