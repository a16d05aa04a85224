use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Which of the two servers is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Serves `.tar.gz` files directly and answers `latest` with 303.
    Archive,
    /// Only answers `latest`, with 307; everything else is forbidden.
    LatestOnly,
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variant::Archive => write!(f, "archive"),
            Variant::LatestOnly => write!(f, "latest-only"),
        }
    }
}

/// Directory every request path is resolved against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRoot(PathBuf);

impl ArtifactRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

/// One immediate child of a listed directory
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    pub name: String,
    pub modified_at: SystemTime,
}

/// Name of the entry chosen by the latest resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget(pub String);

impl ResolvedTarget {
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Process configuration assembled from the command line; `cli::Args` supplies the defaults
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    pub verbose: bool,
    pub root: ArtifactRoot,
    pub variant: Variant,
}
