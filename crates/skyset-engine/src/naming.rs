//! Generated-name resolution
//!
//! Some target fields (e.g. a public DNS label) are synthesized rather than
//! supplied. Candidates come from a [`LabelGenerator`] and are verified for
//! global uniqueness against the control plane, bounded by
//! [`MAX_GENERATION_ATTEMPTS`].

use crate::error::{EngineError, RemoteError, Result};
use async_trait::async_trait;

/// Attempt bound before giving up with `GenerationExhausted`
pub const MAX_GENERATION_ATTEMPTS: u32 = 10;

/// Candidate source plus availability probe.
///
/// `generate_candidate` must be deterministic in `(seed, attempt)` so that
/// target resolution stays idempotent.
#[async_trait]
pub trait LabelGenerator: Send + Sync {
    fn generate_candidate(&self, seed: &str, attempt: u32) -> String;

    async fn check_available(&self, candidate: &str)
    -> std::result::Result<bool, RemoteError>;
}

/// Probe candidates in order until one is globally available.
pub async fn resolve_unique_label(generator: &dyn LabelGenerator, seed: &str) -> Result<String> {
    for attempt in 0..MAX_GENERATION_ATTEMPTS {
        let candidate = generator.generate_candidate(seed, attempt);
        match generator.check_available(&candidate).await {
            Ok(true) => {
                tracing::debug!(%candidate, attempt, "label available");
                return Ok(candidate);
            }
            Ok(false) => {
                tracing::debug!(%candidate, attempt, "label already taken");
            }
            Err(source) => {
                return Err(EngineError::RemoteRead {
                    resource: format!("availability of label '{candidate}'"),
                    source,
                });
            }
        }
    }
    Err(EngineError::GenerationExhausted {
        seed: seed.to_string(),
        attempts: MAX_GENERATION_ATTEMPTS,
    })
}
