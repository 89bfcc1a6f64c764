use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

use crate::error::Result;
use crate::models::category::Category;
use crate::models::record::MetadataRecord;
use crate::readers::json_reader::JsonReader;
use crate::readers::text_reader::TextReader;

/// Reads every JSON and text metadata file packed in a zip bundle.
pub struct BundleReader {
    default_category: Option<Category>,
}

impl BundleReader {
    pub fn new() -> Self {
        Self {
            default_category: None,
        }
    }

    pub fn with_default_category(default_category: Option<Category>) -> Self {
        Self { default_category }
    }

    pub fn read_records(&self, zip_path: &Path) -> Result<Vec<MetadataRecord>> {
        let file = File::open(zip_path)?;
        let mut archive = ZipArchive::new(file)?;
        let json_reader = JsonReader::with_default_category(self.default_category);
        let text_reader = TextReader::with_default_category(self.default_category);
        let bundle = zip_path.display().to_string();

        let mut records = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let name = entry.name().to_string();

            if entry.is_dir() {
                continue;
            }

            let kind = match entry_kind(&name) {
                Some(kind) => kind,
                None => {
                    debug!("Skipping bundle entry {}", name);
                    continue;
                }
            };

            let mut text = String::new();
            entry.read_to_string(&mut text)?;
            let source = format!("{}!{}", bundle, name);

            let entry_records = match kind {
                EntryKind::Json => json_reader.parse_records(&source, &text)?,
                EntryKind::Text => text_reader.parse_records(&source, &text)?,
            };
            records.extend(entry_records);
        }

        debug!("Read {} records from bundle {}", records.len(), bundle);
        Ok(records)
    }
}

impl Default for BundleReader {
    fn default() -> Self {
        Self::new()
    }
}

enum EntryKind {
    Json,
    Text,
}

fn entry_kind(name: &str) -> Option<EntryKind> {
    let lower = name.to_lowercase();
    if lower.ends_with(".json") {
        Some(EntryKind::Json)
    } else if lower.ends_with(".txt") || lower.ends_with(".cfg") || lower.ends_with(".conf") {
        Some(EntryKind::Text)
    } else {
        None
    }
}
