pub mod archive;
pub mod document;
pub mod handle;
pub mod node;

pub use archive::MetadataTree;
pub use document::{ArchiveDocument, ChannelDocument, RunDocument, StationDocument};
pub use handle::ArchiveHandle;
pub use node::{Node, NodeKind};
