use csv::Writer;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::schema::registry::StandardsRow;

/// Writes the flattened standards table as CSV, one row per attribute.
pub struct StandardsWriter;

impl StandardsWriter {
    pub fn write_to<W: Write>(rows: &[StandardsRow], sink: W) -> Result<()> {
        let mut writer = Writer::from_writer(sink);
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn write_file(rows: &[StandardsRow], path: &Path) -> Result<()> {
        Self::write_to(rows, File::create(path)?)
    }

    pub fn to_csv_string(rows: &[StandardsRow]) -> Result<String> {
        let mut buffer = Vec::new();
        Self::write_to(rows, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| {
            crate::error::MetadataError::InvalidFormat(format!("Standards table is not UTF-8: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::category::Category;
    use crate::schema::SchemaRegistry;

    #[test]
    fn test_standards_csv() {
        let registry = SchemaRegistry::shared().unwrap();
        let rows = registry.standards_table();
        let csv = StandardsWriter::to_csv_string(&rows).unwrap();

        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("category,attribute,type,required,units,style,allowed_values,default")
        );
        assert_eq!(csv.lines().count(), rows.len() + 1);
        assert!(csv.contains("station,location.latitude,float,true,degrees,"));

        let runs = rows.iter().filter(|r| r.category == Category::Run.to_string()).count();
        assert_eq!(runs, registry.get_descriptors(Category::Run).unwrap().len());
    }
}
