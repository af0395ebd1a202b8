pub mod metadata;
pub mod model;
pub mod network;
pub mod spec;

pub use metadata::CheckpointMetadata;
pub use model::Model;
pub use network::Network;
pub use spec::{ArchitectureBuilder, ArchitectureSpec};
