//! Lifecycle-state normalization.

use std::ops::Deref;
use std::sync::Arc;

use report_core::error::{ReportError, Result};
use report_core::models::{columns, LifecycleState, NormalizationPolicy, TransactionRecord};
use tracing::{debug, warn};

/// Applies the fixed lifecycle remap plus the configured policy for values
/// outside it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleNormalizer {
    policy: NormalizationPolicy,
}

impl LifecycleNormalizer {
    pub fn new(policy: NormalizationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> NormalizationPolicy {
        self.policy
    }

    /// Normalize one state.
    ///
    /// `Ordered` and `Unavailable` become `Active`. The canonical states are
    /// fixed points under every policy, which makes normalization idempotent.
    pub fn normalize_state(&self, state: &LifecycleState) -> Result<LifecycleState> {
        let remapped = remap(state);
        if LifecycleState::CANONICAL.contains(&remapped) {
            return Ok(remapped);
        }

        match self.policy {
            NormalizationPolicy::PassThrough => Ok(remapped),
            NormalizationPolicy::FallbackUnknown => Ok(LifecycleState::UnknownState),
            NormalizationPolicy::Strict => Err(ReportError::UnmappedCategory {
                field: columns::LIFECYCLE_STATE.to_string(),
                value: remapped.as_str().to_string(),
            }),
        }
    }

    /// Normalize every record. No record is dropped; order is preserved.
    pub fn normalize(&self, records: Vec<TransactionRecord>) -> Result<NormalizedRecords> {
        let mut remapped = 0usize;
        let mut unmapped = 0usize;

        let records = records
            .into_iter()
            .map(|mut record| {
                let state = self.normalize_state(&record.lifecycle_state)?;
                if state != record.lifecycle_state {
                    remapped += 1;
                }
                if !LifecycleState::CANONICAL.contains(&remap(&record.lifecycle_state)) {
                    unmapped += 1;
                }
                record.lifecycle_state = state;
                Ok(record)
            })
            .collect::<Result<Vec<_>>>()?;

        if unmapped > 0 {
            warn!(
                unmapped,
                policy = %self.policy,
                "lifecycle states outside the known set"
            );
        }
        debug!(
            records = records.len(),
            remapped,
            policy = %self.policy,
            "lifecycle states normalized"
        );

        Ok(NormalizedRecords {
            records: records.into(),
            policy: self.policy,
        })
    }
}

fn remap(state: &LifecycleState) -> LifecycleState {
    match state {
        LifecycleState::Ordered | LifecycleState::Unavailable => LifecycleState::Active,
        other => other.clone(),
    }
}

/// Convenience wrapper around [`LifecycleNormalizer::normalize`].
pub fn normalize_lifecycle_state(
    records: Vec<TransactionRecord>,
    policy: NormalizationPolicy,
) -> Result<NormalizedRecords> {
    LifecycleNormalizer::new(policy).normalize(records)
}

/// An immutable, normalized record set. Cloning shares the underlying
/// records.
#[derive(Debug, Clone)]
pub struct NormalizedRecords {
    records: Arc<[TransactionRecord]>,
    policy: NormalizationPolicy,
}

impl NormalizedRecords {
    pub fn as_slice(&self) -> &[TransactionRecord] {
        &self.records
    }

    /// Policy the records were normalized under.
    pub fn policy(&self) -> NormalizationPolicy {
        self.policy
    }
}

impl Deref for NormalizedRecords {
    type Target = [TransactionRecord];

    fn deref(&self) -> &Self::Target {
        &self.records
    }
}
