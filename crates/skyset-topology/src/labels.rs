//! DNS label generation
//!
//! Deterministic candidates derived from the scale-set name, probed for
//! global availability through the control plane's reserved
//! `domain-name-label` lookup type (a read that answers "not found" means
//! the label is free).

use skyset_engine::{LabelGenerator, RemoteClient, RemoteError, ResourceIdentity};
use async_trait::async_trait;
use std::hash::{DefaultHasher, Hash, Hasher};

/// Reserved lookup type understood by the control plane
pub const LABEL_LOOKUP_TYPE: &str = "domain-name-label";

const LABEL_MAX_LEN: usize = 63;

/// Lowercase the seed, keep `[a-z0-9-]`, make sure it starts with a letter
/// and fits a DNS label.
fn sanitize(seed: &str) -> String {
    let mut label: String = seed
        .to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    if !label.starts_with(|c: char| c.is_ascii_alphabetic()) {
        label.insert(0, 'a');
    }
    label.truncate(LABEL_MAX_LEN);
    label
}

/// Label generator backed by a remote availability probe.
pub struct DnsLabelGenerator<'a> {
    client: &'a dyn RemoteClient,
}

impl<'a> DnsLabelGenerator<'a> {
    pub fn new(client: &'a dyn RemoteClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LabelGenerator for DnsLabelGenerator<'_> {
    fn generate_candidate(&self, seed: &str, attempt: u32) -> String {
        let base = sanitize(seed);
        if attempt == 0 {
            return base;
        }
        // Stable per (seed, attempt) so resolution stays idempotent.
        let mut hasher = DefaultHasher::new();
        (seed, attempt).hash(&mut hasher);
        let suffix = format!("-{:06x}", hasher.finish() & 0xff_ffff);
        let mut candidate = base;
        candidate.truncate(LABEL_MAX_LEN - suffix.len());
        candidate.push_str(&suffix);
        candidate
    }

    async fn check_available(&self, candidate: &str) -> Result<bool, RemoteError> {
        let probe = ResourceIdentity::new(LABEL_LOOKUP_TYPE, candidate);
        match self.client.read(&probe).await {
            Err(RemoteError::NotFound) => Ok(true),
            Ok(_) => Ok(false),
            Err(other) => Err(other),
        }
    }
}
