pub mod artifacts;
pub mod cli;
pub mod latest;
pub mod models;
pub mod request;

use models::{ArtifactRoot, Variant};

/// Read-only state shared by every request handler
#[derive(Clone)]
pub struct AppState {
    root: ArtifactRoot,
    variant: Variant,
}

impl AppState {
    pub fn new(root: ArtifactRoot, variant: Variant) -> Self {
        Self { root, variant }
    }

    pub fn root(&self) -> &ArtifactRoot {
        &self.root
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }
}

/// Build the router for one server variant.
pub fn app(state: AppState) -> axum::Router {
    artifacts::routes().with_state(state)
}
