//! Immich destination: liveness check and single-asset upload.

mod client;
pub mod error;
pub mod types;

use async_trait::async_trait;

pub use client::ImmichClient;
pub use types::{UploadOutcome, UploadRequest};

/// Where migrated assets end up.
#[async_trait]
pub trait UploadTarget: Send + Sync {
    /// Whether the destination is reachable and authenticated.
    async fn ping(&self) -> bool;

    /// Upload one staged file. Never errors; failures are an outcome.
    async fn upload(&self, request: &UploadRequest) -> UploadOutcome;
}
