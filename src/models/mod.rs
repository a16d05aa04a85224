pub mod artifact;

pub use artifact::{ArtifactRoot, DirectoryEntry, ResolvedTarget, ServerConfig, Variant};
