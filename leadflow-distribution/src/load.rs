//! Load Accounting
//!
//! An operator's load is the number of its contacts whose status is
//! `"active"`. Nothing here mutates state.

use leadflow_core::{LeadflowResult, OperatorId};
use leadflow_storage::DistributionStore;
use std::collections::HashMap;

/// Current active load of one operator.
pub async fn current_load<S>(store: &S, operator_id: OperatorId) -> LeadflowResult<u32>
where
    S: DistributionStore + ?Sized,
{
    store.count_active_contacts(operator_id).await
}

/// Active loads for several operators in one store round trip.
///
/// Equivalent to calling [`current_load`] per operator; every requested id
/// is present in the result.
pub async fn current_loads<S>(
    store: &S,
    operator_ids: &[OperatorId],
) -> LeadflowResult<HashMap<OperatorId, u32>>
where
    S: DistributionStore + ?Sized,
{
    if operator_ids.is_empty() {
        return Ok(HashMap::new());
    }
    store.count_active_contacts_batch(operator_ids).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadflow_core::{LeadIdentity, Operator, Source};
    use leadflow_storage::{InMemoryStore, NewContact};

    #[tokio::test]
    async fn test_batch_matches_single_lookups() {
        let store = InMemoryStore::new();
        let source = Source::new("web");
        store.insert_source(&source).await.unwrap();

        let operators: Vec<Operator> = (0..3)
            .map(|i| Operator::new(format!("op-{}", i), 5))
            .collect();
        for (i, operator) in operators.iter().enumerate() {
            store.insert_operator(operator).await.unwrap();
            for _ in 0..i {
                let lead = store.create_lead(&LeadIdentity::new()).await.unwrap();
                store
                    .create_contact(NewContact {
                        lead_id: lead.lead_id,
                        source_id: source.source_id,
                        operator_id: Some(operator.operator_id),
                        message: None,
                    })
                    .await
                    .unwrap();
            }
        }

        let ids: Vec<OperatorId> = operators.iter().map(|o| o.operator_id).collect();
        let batch = current_loads(&store, &ids).await.unwrap();
        for id in &ids {
            assert_eq!(batch[id], current_load(&store, *id).await.unwrap());
        }
        assert_eq!(batch[&ids[2]], 2);
    }

    #[tokio::test]
    async fn test_unknown_operator_has_zero_load() {
        let store = InMemoryStore::new();
        assert_eq!(current_load(&store, OperatorId::new()).await.unwrap(), 0);
        assert!(current_loads(&store, &[]).await.unwrap().is_empty());
    }
}
