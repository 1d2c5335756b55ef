//! Utilization and per-source distribution statistics.

use crate::load::{current_load, current_loads};
use leadflow_core::{
    EntityIdType, LeadflowError, LeadflowResult, OperatorId, OperatorShare, OperatorStats,
    SourceId, SourceStats, UNASSIGNED_LABEL,
};
use leadflow_storage::DistributionStore;
use std::collections::HashMap;

/// Utilization of one operator. Fails with NotFound for unknown operators.
pub async fn operator_stats<S>(store: &S, operator_id: OperatorId) -> LeadflowResult<OperatorStats>
where
    S: DistributionStore + ?Sized,
{
    let operator = store
        .get_operator(operator_id)
        .await?
        .ok_or_else(|| LeadflowError::not_found(OperatorId::ENTITY_TYPE, operator_id.as_uuid()))?;
    let load = current_load(store, operator_id).await?;
    Ok(OperatorStats::compute(
        operator.operator_id,
        operator.name,
        load,
        operator.max_load,
    ))
}

/// Utilization of every operator, in store order.
pub async fn all_operator_stats<S>(store: &S) -> LeadflowResult<Vec<OperatorStats>>
where
    S: DistributionStore + ?Sized,
{
    let operators = store.list_operators().await?;
    let ids: Vec<OperatorId> = operators.iter().map(|o| o.operator_id).collect();
    let loads = current_loads(store, &ids).await?;
    Ok(operators
        .into_iter()
        .map(|operator| {
            let load = loads.get(&operator.operator_id).copied().unwrap_or(0);
            OperatorStats::compute(operator.operator_id, operator.name, load, operator.max_load)
        })
        .collect())
}

/// How the contacts of a source are spread across operators. Unassigned
/// contacts are grouped under `operator_id = None`.
pub async fn source_stats<S>(store: &S, source_id: SourceId) -> LeadflowResult<SourceStats>
where
    S: DistributionStore + ?Sized,
{
    let source = store
        .get_source(source_id)
        .await?
        .ok_or_else(|| LeadflowError::not_found(SourceId::ENTITY_TYPE, source_id.as_uuid()))?;

    let counts = store.count_contacts_by_operator(source_id).await?;
    let names: HashMap<OperatorId, String> = store
        .list_operators()
        .await?
        .into_iter()
        .map(|o| (o.operator_id, o.name))
        .collect();

    let mut total_contacts = 0;
    let mut operator_distribution = Vec::with_capacity(counts.len());
    for (operator_id, count) in counts {
        total_contacts += count;
        let operator_name = match operator_id {
            Some(id) => names
                .get(&id)
                .cloned()
                .unwrap_or_else(|| id.to_string()),
            None => UNASSIGNED_LABEL.to_string(),
        };
        operator_distribution.push(OperatorShare {
            operator_id,
            operator_name,
            count,
        });
    }

    Ok(SourceStats {
        source_id,
        source_name: source.name,
        total_contacts,
        operator_distribution,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadflow_core::{LeadIdentity, Operator, Source};
    use leadflow_storage::{InMemoryStore, NewContact};

    async fn add_contact(store: &InMemoryStore, source_id: SourceId, operator: Option<OperatorId>) {
        let lead = store.create_lead(&LeadIdentity::new()).await.unwrap();
        store
            .create_contact(NewContact {
                lead_id: lead.lead_id,
                source_id,
                operator_id: operator,
                message: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_operator_stats_utilization() {
        let store = InMemoryStore::new();
        let source = Source::new("web");
        let operator = Operator::new("alice", 4);
        store.insert_source(&source).await.unwrap();
        store.insert_operator(&operator).await.unwrap();
        add_contact(&store, source.source_id, Some(operator.operator_id)).await;

        let stats = operator_stats(&store, operator.operator_id).await.unwrap();
        assert_eq!(stats.active_contacts_count, 1);
        assert_eq!(stats.utilization_percent, 25.0);

        let all = all_operator_stats(&store).await.unwrap();
        assert_eq!(all, vec![stats]);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let store = InMemoryStore::new();
        assert!(operator_stats(&store, OperatorId::new())
            .await
            .unwrap_err()
            .is_not_found());
        assert!(source_stats(&store, SourceId::new())
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_source_stats_groups_unassigned() {
        let store = InMemoryStore::new();
        let source = Source::new("web");
        let operator = Operator::new("alice", 4);
        store.insert_source(&source).await.unwrap();
        store.insert_operator(&operator).await.unwrap();
        add_contact(&store, source.source_id, Some(operator.operator_id)).await;
        add_contact(&store, source.source_id, None).await;
        add_contact(&store, source.source_id, None).await;

        let stats = source_stats(&store, source.source_id).await.unwrap();
        assert_eq!(stats.source_name, "web");
        assert_eq!(stats.total_contacts, 3);
        assert_eq!(stats.count_for(Some(operator.operator_id)), 1);
        assert_eq!(stats.count_for(None), 2);

        let unassigned = stats
            .operator_distribution
            .iter()
            .find(|share| share.operator_id.is_none())
            .unwrap();
        assert_eq!(unassigned.operator_name, UNASSIGNED_LABEL);
    }
}
