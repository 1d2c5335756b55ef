//! Lead Resolver
//!
//! Matches an inbound identity to an existing lead using separate equality
//! lookups in precedence order (external id, then phone, then email). The
//! first hit wins; leads matched by different keys are never merged.

use leadflow_core::{Lead, LeadIdentity, LeadflowError, LeadflowResult, StorageError};
use leadflow_storage::DistributionStore;

/// Look up an existing lead without writing anything.
pub async fn find_lead<S>(store: &S, identity: &LeadIdentity) -> LeadflowResult<Option<Lead>>
where
    S: DistributionStore + ?Sized,
{
    for key in identity.lookup_keys() {
        if let Some(lead) = store.find_lead(key).await? {
            tracing::debug!(lead_id = %lead.lead_id, ?key, "Matched existing lead");
            return Ok(Some(lead));
        }
    }
    Ok(None)
}

/// Return the matching lead, creating it when nothing matches.
///
/// A created lead is committed before this returns. If another caller
/// commits the same external id first, the unique constraint fires and the
/// winner's lead is returned instead.
pub async fn find_or_create_lead<S>(store: &S, identity: &LeadIdentity) -> LeadflowResult<Lead>
where
    S: DistributionStore + ?Sized,
{
    let identity = identity.clone().normalized();
    if let Some(lead) = find_lead(store, &identity).await? {
        return Ok(lead);
    }

    match store.create_lead(&identity).await {
        Ok(lead) => {
            tracing::info!(lead_id = %lead.lead_id, "Created lead");
            Ok(lead)
        }
        Err(LeadflowError::Storage(StorageError::ConstraintViolation { constraint, reason })) => {
            match find_lead(store, &identity).await? {
                Some(lead) => Ok(lead),
                None => Err(LeadflowError::Storage(StorageError::ConstraintViolation {
                    constraint,
                    reason,
                })),
            }
        }
        Err(e) => Err(e),
    }
}
