pub mod category;
pub mod container;
pub mod descriptor;
pub mod record;
pub mod summary;
pub mod value;

pub use category::Category;
pub use container::{ContainerState, MetadataContainer};
pub use descriptor::{AttributeDescriptor, Style};
pub use record::MetadataRecord;
pub use summary::{SummaryLevel, SummaryRow};
pub use value::{MetadataValue, ValueType};
