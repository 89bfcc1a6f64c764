pub mod parquet_writer;
pub mod standards_writer;

pub use parquet_writer::{ParquetFileInfo, ParquetWriter};
pub use standards_writer::StandardsWriter;
