//! Caption dataset loading.

use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use vistext_core::{Result, VisTextError};

/// One raw dataset record: an image path plus its caption text.
#[derive(Debug, Clone, Deserialize)]
pub struct CaptionRecord {
    /// Path to the image file.
    pub image: PathBuf,
    /// Optional leading context text.
    #[serde(default)]
    pub prefix: String,
    /// The text to be generated.
    pub target: String,
}

/// An in-memory list of caption records.
#[derive(Debug, Clone, Default)]
pub struct CaptionDataset {
    records: Vec<CaptionRecord>,
}

impl CaptionDataset {
    /// Create a dataset from records.
    pub fn from_records(records: Vec<CaptionRecord>) -> Self {
        Self { records }
    }

    /// Load records from a JSONL file, one object per line.
    ///
    /// Blank lines are skipped; a malformed line fails the load naming
    /// its line number.
    pub fn from_jsonl<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(|e| {
            VisTextError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to open dataset file {}: {e}", path.as_ref().display()),
            ))
        })?;

        let reader = BufReader::new(file);
        let mut records = Vec::new();
        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: CaptionRecord = serde_json::from_str(&line).map_err(|e| {
                VisTextError::Serialization(format!("line {}: {e}", line_num + 1))
            })?;
            records.push(record);
        }
        Ok(Self { records })
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the dataset holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get one record by index.
    pub fn get(&self, index: usize) -> Option<&CaptionRecord> {
        self.records.get(index)
    }

    /// All records in load order.
    pub fn records(&self) -> &[CaptionRecord] {
        &self.records
    }
}
