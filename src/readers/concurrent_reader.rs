use std::fs;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{MetadataError, Result};
use crate::models::category::Category;
use crate::models::record::MetadataRecord;
use crate::readers::{BundleReader, JsonReader, TextReader};

/// Input file kinds, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Json,
    Text,
    Bundle,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "json" => Some(InputFormat::Json),
            "txt" | "cfg" | "conf" => Some(InputFormat::Text),
            "zip" => Some(InputFormat::Bundle),
            _ => None,
        }
    }
}

/// Read one input file of any supported format.
pub fn read_path(path: &Path, default_category: Option<Category>) -> Result<Vec<MetadataRecord>> {
    match InputFormat::from_path(path) {
        Some(InputFormat::Json) => JsonReader::with_default_category(default_category).read_records(path),
        Some(InputFormat::Text) => TextReader::with_default_category(default_category).read_records(path),
        Some(InputFormat::Bundle) => {
            BundleReader::with_default_category(default_category).read_records(path)
        }
        None => Err(MetadataError::InvalidFormat(format!(
            "Unsupported input file: {}",
            path.display()
        ))),
    }
}

/// Expand directories into the supported files they contain (not recursive), sorted.
pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = fs::read_dir(path)?
                .collect::<std::io::Result<Vec<_>>>()?
                .into_iter()
                .map(|entry| entry.path())
                .filter(|p| p.is_file() && InputFormat::from_path(p).is_some())
                .collect();
            found.sort();
            inputs.extend(found);
        } else {
            inputs.push(path.clone());
        }
    }
    Ok(inputs)
}

/// Reads many input files on blocking worker tasks.
pub struct ConcurrentReader {
    max_workers: usize,
    default_category: Option<Category>,
}

impl ConcurrentReader {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            default_category: None,
        }
    }

    pub fn with_default_category(mut self, default_category: Option<Category>) -> Self {
        self.default_category = default_category;
        self
    }

    /// Read every path, keeping the input order in the result.
    pub async fn read_all(&self, paths: Vec<PathBuf>) -> Result<Vec<MetadataRecord>> {
        let chunk_size = paths.len().div_ceil(self.max_workers).max(1);
        let default_category = self.default_category;

        let handles: Vec<JoinHandle<Result<Vec<MetadataRecord>>>> = paths
            .chunks(chunk_size)
            .map(|chunk| {
                let chunk = chunk.to_vec();
                tokio::task::spawn_blocking(move || {
                    let mut records = Vec::new();
                    for path in &chunk {
                        records.extend(read_path(path, default_category)?);
                    }
                    Ok(records)
                })
            })
            .collect();

        debug!("Reading {} files on {} tasks", paths.len(), handles.len());

        let mut records = Vec::new();
        for handle in handles {
            records.extend(handle.await??);
        }
        Ok(records)
    }
}
