//! Capacity Filter
//!
//! Reduces a source's weight policy to the operators that may receive the
//! next contact: active, and strictly below their `max_load`.

use crate::load::current_loads;
use leadflow_core::{LeadflowResult, OperatorId, SourceId, WeightedOperator};
use leadflow_storage::DistributionStore;

/// Why an operator was left out of a candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    Inactive,
    AtCapacity { load: u32, max_load: u32 },
}

/// Decide whether a weighted operator with the given load is eligible.
///
/// `max_load == 0` always excludes, since a load can never be below zero.
pub fn check_eligibility(candidate: &WeightedOperator, load: u32) -> Result<(), Exclusion> {
    let operator = &candidate.operator;
    if !operator.is_active {
        return Err(Exclusion::Inactive);
    }
    if !operator.has_capacity_for(load) {
        return Err(Exclusion::AtCapacity {
            load,
            max_load: operator.max_load,
        });
    }
    Ok(())
}

/// Operators of `source_id` that can take another contact, with their weights.
///
/// An empty result means either no policy is configured for the source or
/// every configured operator is inactive or saturated. Fails with NotFound
/// when the source does not exist. Loads are a point-in-time snapshot.
pub async fn eligible_operators<S>(
    store: &S,
    source_id: SourceId,
) -> LeadflowResult<Vec<WeightedOperator>>
where
    S: DistributionStore + ?Sized,
{
    let rows = store.get_weights_for_source(source_id).await?;
    if rows.is_empty() {
        tracing::warn!(%source_id, "No operator weights configured for source");
        return Ok(Vec::new());
    }

    // Inactive operators never need a load lookup.
    let active_ids: Vec<OperatorId> = rows
        .iter()
        .filter(|row| row.operator.is_active)
        .map(|row| row.operator.operator_id)
        .collect();
    let loads = current_loads(store, &active_ids).await?;

    let eligible: Vec<WeightedOperator> = rows
        .into_iter()
        .filter(|row| {
            let load = loads.get(&row.operator.operator_id).copied().unwrap_or(0);
            match check_eligibility(row, load) {
                Ok(()) => true,
                Err(reason) => {
                    tracing::debug!(
                        %source_id,
                        operator_id = %row.operator.operator_id,
                        ?reason,
                        "Operator excluded"
                    );
                    false
                }
            }
        })
        .collect();

    tracing::debug!(
        %source_id,
        eligible = eligible.len(),
        "Computed eligible operators"
    );
    Ok(eligible)
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use leadflow_core::Operator;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Eligible exactly when active and load < max_load.
        #[test]
        fn prop_eligibility_rule(
            is_active in any::<bool>(),
            max_load in 0u32..20,
            load in 0u32..25,
            weight in 0.0f64..100.0,
        ) {
            let candidate =
                WeightedOperator::new(Operator::new("p", max_load).with_active(is_active), weight);
            let eligible = check_eligibility(&candidate, load).is_ok();
            prop_assert_eq!(eligible, is_active && load < max_load);
        }
    }
}
