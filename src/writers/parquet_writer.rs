use crate::error::{MetadataError, Result};
use crate::models::summary::{SummaryLevel, SummaryRow};
use crate::utils::constants::{
    COMPRESSION_GZIP, COMPRESSION_LZ4, COMPRESSION_NONE, COMPRESSION_SNAPPY, COMPRESSION_ZSTD,
    DEFAULT_ROW_GROUP_SIZE,
};
use arrow::array::*;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use validator::Validate;

/// Writes station/run/channel summary tables to Parquet.
pub struct ParquetWriter {
    compression: Compression,
    row_group_size: usize,
}

impl ParquetWriter {
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = match compression.to_lowercase().as_str() {
            COMPRESSION_SNAPPY => Compression::SNAPPY,
            COMPRESSION_GZIP => Compression::GZIP(GzipLevel::default()),
            COMPRESSION_LZ4 => Compression::LZ4,
            COMPRESSION_ZSTD => Compression::ZSTD(ZstdLevel::default()),
            COMPRESSION_NONE => Compression::UNCOMPRESSED,
            _ => {
                return Err(MetadataError::InvalidFormat(format!(
                    "Unsupported compression: {}",
                    compression
                )))
            }
        };
        Ok(self)
    }

    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size.max(1);
        self
    }

    /// Write summary rows, validating each before anything touches disk.
    pub fn write_summary(&self, rows: &[SummaryRow], path: &Path) -> Result<()> {
        for row in rows {
            row.validate()?;
        }

        let schema = Self::summary_schema();
        let file = File::create(path)?;
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build();

        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;
        for chunk in rows.chunks(self.row_group_size) {
            let batch = Self::rows_to_batch(chunk, schema.clone())?;
            writer.write(&batch)?;
        }
        writer.close()?;

        Ok(())
    }

    pub fn summary_schema() -> Arc<Schema> {
        let fields = vec![
            Field::new("level", DataType::Utf8, false),
            Field::new("path", DataType::Utf8, false),
            Field::new("identifier", DataType::Utf8, false),
            Field::new("start", DataType::Utf8, true),
            Field::new("end", DataType::Utf8, true),
            Field::new("components", DataType::Utf8, false),
            Field::new("measurement_type", DataType::Utf8, true),
            Field::new("sample_rate", DataType::Float64, true),
            Field::new("latitude", DataType::Float64, true),
            Field::new("longitude", DataType::Float64, true),
            Field::new("elevation", DataType::Float64, true),
            Field::new("units", DataType::Utf8, true),
        ];

        Arc::new(Schema::new(fields))
    }

    fn rows_to_batch(rows: &[SummaryRow], schema: Arc<Schema>) -> Result<RecordBatch> {
        let levels: Vec<&str> = rows.iter().map(|r| r.level.as_str()).collect();
        let paths: Vec<&str> = rows.iter().map(|r| r.path.as_str()).collect();
        let identifiers: Vec<&str> = rows.iter().map(|r| r.identifier.as_str()).collect();
        let starts: Vec<Option<&str>> = rows.iter().map(|r| r.start.as_deref()).collect();
        let ends: Vec<Option<&str>> = rows.iter().map(|r| r.end.as_deref()).collect();
        let components: Vec<&str> = rows.iter().map(|r| r.components.as_str()).collect();
        let measurement_types: Vec<Option<&str>> =
            rows.iter().map(|r| r.measurement_type.as_deref()).collect();
        let sample_rates: Vec<Option<f64>> = rows.iter().map(|r| r.sample_rate).collect();
        let latitudes: Vec<Option<f64>> = rows.iter().map(|r| r.latitude).collect();
        let longitudes: Vec<Option<f64>> = rows.iter().map(|r| r.longitude).collect();
        let elevations: Vec<Option<f64>> = rows.iter().map(|r| r.elevation).collect();
        let units: Vec<Option<&str>> = rows.iter().map(|r| r.units.as_deref()).collect();

        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(levels)),
                Arc::new(StringArray::from(paths)),
                Arc::new(StringArray::from(identifiers)),
                Arc::new(StringArray::from(starts)),
                Arc::new(StringArray::from(ends)),
                Arc::new(StringArray::from(components)),
                Arc::new(StringArray::from(measurement_types)),
                Arc::new(Float64Array::from(sample_rates)),
                Arc::new(Float64Array::from(latitudes)),
                Arc::new(Float64Array::from(longitudes)),
                Arc::new(Float64Array::from(elevations)),
                Arc::new(StringArray::from(units)),
            ],
        )?;

        Ok(batch)
    }

    /// Read up to `limit` summary rows back from a file written by [`write_summary`](Self::write_summary).
    pub fn read_summary(&self, path: &Path, limit: usize) -> Result<Vec<SummaryRow>> {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

        let file = File::open(path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?
            .with_batch_size(limit.clamp(1, 8192))
            .build()?;

        let mut rows = Vec::new();
        for batch_result in reader {
            let batch = batch_result?;
            let strings = |i: usize, name: &str| -> Result<StringArray> {
                batch
                    .column(i)
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .cloned()
                    .ok_or_else(|| {
                        MetadataError::InvalidFormat(format!("Invalid {} column type", name))
                    })
            };
            let floats = |i: usize, name: &str| -> Result<Float64Array> {
                batch
                    .column(i)
                    .as_any()
                    .downcast_ref::<Float64Array>()
                    .cloned()
                    .ok_or_else(|| {
                        MetadataError::InvalidFormat(format!("Invalid {} column type", name))
                    })
            };

            let levels = strings(0, "level")?;
            let paths = strings(1, "path")?;
            let identifiers = strings(2, "identifier")?;
            let starts = strings(3, "start")?;
            let ends = strings(4, "end")?;
            let components = strings(5, "components")?;
            let measurement_types = strings(6, "measurement_type")?;
            let sample_rates = floats(7, "sample_rate")?;
            let latitudes = floats(8, "latitude")?;
            let longitudes = floats(9, "longitude")?;
            let elevations = floats(10, "elevation")?;
            let units = strings(11, "units")?;

            let optional_str = |array: &StringArray, i: usize| {
                array.is_valid(i).then(|| array.value(i).to_string())
            };
            let optional_f64 = |array: &Float64Array, i: usize| array.is_valid(i).then(|| array.value(i));

            for i in 0..batch.num_rows() {
                if rows.len() >= limit {
                    return Ok(rows);
                }
                let level = match levels.value(i) {
                    "station" => SummaryLevel::Station,
                    "run" => SummaryLevel::Run,
                    "channel" => SummaryLevel::Channel,
                    other => {
                        return Err(MetadataError::InvalidFormat(format!(
                            "Unknown summary level '{}'",
                            other
                        )))
                    }
                };

                rows.push(SummaryRow {
                    level,
                    path: paths.value(i).to_string(),
                    identifier: identifiers.value(i).to_string(),
                    start: optional_str(&starts, i),
                    end: optional_str(&ends, i),
                    components: components.value(i).to_string(),
                    measurement_type: optional_str(&measurement_types, i),
                    sample_rate: optional_f64(&sample_rates, i),
                    latitude: optional_f64(&latitudes, i),
                    longitude: optional_f64(&longitudes, i),
                    elevation: optional_f64(&elevations, i),
                    units: optional_str(&units, i),
                });
            }
        }

        Ok(rows)
    }

    /// Get file statistics
    pub fn get_file_info(&self, path: &Path) -> Result<ParquetFileInfo> {
        use parquet::file::reader::{FileReader, SerializedFileReader};

        let file = File::open(path)?;
        let reader = SerializedFileReader::new(file)?;
        let metadata = reader.metadata();

        let row_groups = metadata.num_row_groups();
        let row_group_sizes = (0..row_groups)
            .map(|i| metadata.row_group(i).num_rows())
            .collect();

        Ok(ParquetFileInfo {
            total_rows: metadata.file_metadata().num_rows(),
            row_groups,
            row_group_sizes,
            file_size: std::fs::metadata(path)?.len(),
            compression: self.compression,
        })
    }
}

impl Default for ParquetWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct ParquetFileInfo {
    pub total_rows: i64,
    pub row_groups: usize,
    pub row_group_sizes: Vec<i64>,
    pub file_size: u64,
    pub compression: Compression,
}

impl ParquetFileInfo {
    pub fn summary(&self) -> String {
        format!(
            "Rows: {}, Row groups: {}, Size: {:.2} KB, Compression: {:?}",
            self.total_rows,
            self.row_groups,
            self.file_size as f64 / 1024.0,
            self.compression
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    fn rows() -> Vec<SummaryRow> {
        vec![
            SummaryRow::new(SummaryLevel::Station, "station/MT001", "MT001")
                .with_location(Some(40.0), Some(-116.0), Some(1200.0)),
            SummaryRow::new(SummaryLevel::Run, "station/MT001/run/MT001a", "MT001a")
                .with_sample_rate(Some(256.0))
                .with_components(&["Ex".to_string(), "Hx".to_string()]),
            SummaryRow::new(SummaryLevel::Channel, "station/MT001/run/MT001a/channel/Ex", "Ex")
                .with_measurement_type(Some("electric".to_string()))
                .with_units(Some("mV/km".to_string())),
        ]
    }

    #[test]
    fn test_write_and_read_summary() -> Result<()> {
        let file = NamedTempFile::new()?;
        let writer = ParquetWriter::new().with_row_group_size(2);
        writer.write_summary(&rows(), file.path())?;

        let info = writer.get_file_info(file.path())?;
        assert_eq!(info.total_rows, 3);
        assert_eq!(info.row_groups, 2);

        let read = writer.read_summary(file.path(), 10)?;
        assert_eq!(read, rows());

        assert_eq!(writer.read_summary(file.path(), 1)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_invalid_row_is_rejected() {
        let file = NamedTempFile::new().unwrap();
        let bad = vec![SummaryRow::new(SummaryLevel::Station, "station/X", "X")
            .with_location(Some(95.0), Some(0.0), None)];
        assert!(matches!(
            ParquetWriter::new().write_summary(&bad, file.path()),
            Err(MetadataError::Validation(_))
        ));
    }

    #[test]
    fn test_compression_options() {
        assert!(ParquetWriter::new().with_compression("ZSTD").is_ok());
        assert!(ParquetWriter::new().with_compression("none").is_ok());
        assert!(ParquetWriter::new().with_compression("brotli").is_err());
    }
}
