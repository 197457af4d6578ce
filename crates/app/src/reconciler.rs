//! Entity state reconciliation.
//!
//! Decides, for a batch of incoming observations, which ones are worth
//! appending to the history: first observations are kept as-is, exact
//! repeats are dropped, and partial map updates are merged over the last
//! known value.

use std::collections::HashMap;

use hearth_domain::entity::EntityState;
use hearth_domain::error::HubError;
use hearth_domain::id::EntityId;

use crate::ports::DeviceRepository;

/// Reconciles candidate states against the latest stored state of each
/// entity.
pub struct StateReconciler<'r, R> {
    repo: &'r R,
}

impl<'r, R: DeviceRepository> StateReconciler<'r, R> {
    #[must_use]
    pub fn new(repo: &'r R) -> Self {
        Self { repo }
    }

    /// Look up the latest state of every entity in `candidates` (one batched
    /// lookup) and return the states that need persisting.
    ///
    /// Entities missing from the registry are not detected here; the insert
    /// that follows rejects them.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Invalid`] when a map update targets an entity
    /// whose latest value is not a map, or a storage error from the lookup.
    #[tracing::instrument(skip_all, fields(candidates = candidates.len()))]
    pub async fn reconcile(
        &self,
        work: &mut R::Work,
        candidates: Vec<EntityState>,
    ) -> Result<Vec<EntityState>, HubError> {
        if candidates.is_empty() {
            return Ok(candidates);
        }
        let ids = distinct_ids(&candidates);
        let latest = self.repo.latest_states(work, &ids).await?;
        let keep = reconcile_against(latest, candidates)?;
        tracing::debug!(kept = keep.len(), "reconciled entity states");
        Ok(keep)
    }
}

fn distinct_ids(states: &[EntityState]) -> Vec<EntityId> {
    let mut ids: Vec<EntityId> = Vec::with_capacity(states.len());
    for state in states {
        if !ids.contains(&state.entity_id) {
            ids.push(state.entity_id.clone());
        }
    }
    ids
}

/// Pure reconciliation step, given the latest known state per entity.
///
/// Candidates are processed in input order. Once a candidate is kept it
/// becomes the latest state for its entity, so a later candidate in the same
/// batch is compared and merged against it.
///
/// # Errors
///
/// Returns [`HubError::Invalid`] when a map update meets a non-map value.
pub fn reconcile_against(
    mut latest: HashMap<EntityId, EntityState>,
    candidates: Vec<EntityState>,
) -> Result<Vec<EntityState>, HubError> {
    let mut keep = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let state = match latest.get(&candidate.entity_id) {
            None => candidate,
            Some(prior) if prior.is_equal(&candidate.value) => continue,
            Some(prior) => {
                let value = candidate.value.merged_over(&prior.value).map_err(|err| {
                    HubError::Invalid(format!("entity ({}): {}", candidate.entity_id, err.public_message()))
                })?;
                EntityState {
                    value,
                    ..candidate
                }
            }
        };
        latest.insert(state.entity_id.clone(), state.clone());
        keep.push(state);
    }
    Ok(keep)
}
