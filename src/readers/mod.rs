pub mod bundle_reader;
pub mod concurrent_reader;
pub mod json_reader;
pub mod text_reader;

pub use bundle_reader::BundleReader;
pub use concurrent_reader::{collect_inputs, read_path, ConcurrentReader, InputFormat};
pub use json_reader::{is_archive_document, JsonReader};
pub use text_reader::TextReader;
