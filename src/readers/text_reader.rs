use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::debug;

use crate::error::{MetadataError, Result};
use crate::models::category::Category;
use crate::models::record::MetadataRecord;
use crate::utils::flatten::FlatMap;
use crate::utils::naming::normalize_path;

/// Reads `key = value` metadata text.
///
/// ```text
/// # station written by the field crew
/// [station]
/// archive_id = MT001
/// location.latitude = 40:30:00
///
/// [run]
/// id = MT001a
/// ```
///
/// Each `[category]` section becomes one record. Lines before the first
/// section use the default category. Values stay as text and are typed by
/// the schema during validation; an empty value means absent.
pub struct TextReader {
    default_category: Option<Category>,
}

struct Section {
    category: Option<Category>,
    line: usize,
    mapping: FlatMap,
}

impl TextReader {
    pub fn new() -> Self {
        Self {
            default_category: None,
        }
    }

    pub fn with_default_category(default_category: Option<Category>) -> Self {
        Self { default_category }
    }

    pub fn read_records(&self, path: &Path) -> Result<Vec<MetadataRecord>> {
        let file = File::open(path)?;
        self.parse_reader(&path.display().to_string(), BufReader::new(file))
    }

    pub fn parse_records(&self, source: &str, text: &str) -> Result<Vec<MetadataRecord>> {
        self.parse_reader(source, BufReader::new(text.as_bytes()))
    }

    fn parse_reader<R: Read>(&self, source: &str, reader: BufReader<R>) -> Result<Vec<MetadataRecord>> {
        let mut sections: Vec<Section> = Vec::new();
        let mut current = Section {
            category: self.default_category,
            line: 0,
            mapping: FlatMap::new(),
        };

        for (index, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            let line_number = index + 1;
            let trimmed = line.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            if let Some(header) = trimmed.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
                let category = Category::parse(header).ok_or_else(|| {
                    MetadataError::InvalidFormat(format!(
                        "{}:{}: unknown section [{}]",
                        source, line_number, header
                    ))
                })?;
                let finished = std::mem::replace(
                    &mut current,
                    Section {
                        category: Some(category),
                        line: line_number,
                        mapping: FlatMap::new(),
                    },
                );
                sections.push(finished);
                continue;
            }

            let (key, value) = parse_line(trimmed).ok_or_else(|| {
                MetadataError::InvalidFormat(format!(
                    "{}:{}: expected 'key = value', found '{}'",
                    source, line_number, trimmed
                ))
            })?;

            let key = normalize_path(key);
            if current.mapping.insert(key.clone(), value).is_some() {
                return Err(MetadataError::InvalidFormat(format!(
                    "{}:{}: '{}' is set twice",
                    source, line_number, key
                )));
            }
        }
        sections.push(current);

        let mut records = Vec::new();
        for section in sections {
            if section.mapping.is_empty() {
                continue;
            }
            let category = section.category.ok_or_else(|| {
                MetadataError::InvalidFormat(format!(
                    "{}: keys before the first [category] section and no default category",
                    source
                ))
            })?;
            let name = if section.line == 0 {
                source.to_string()
            } else {
                format!("{}:{}", source, section.line)
            };
            debug!("Read {} keys for {} from {}", section.mapping.len(), category, name);
            records.push(MetadataRecord::new(name, category, section.mapping));
        }

        Ok(records)
    }
}

impl Default for TextReader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_line(line: &str) -> Option<(&str, Value)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);

    let value = if value.is_empty() {
        Value::Null
    } else {
        Value::String(value.to_string())
    };
    Some((key, value))
}
