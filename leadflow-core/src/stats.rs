//! Report types for utilization and per-source distribution statistics.

use crate::identity::{OperatorId, SourceId};
use serde::{Deserialize, Serialize};

/// Label used for contacts that were persisted without an operator.
pub const UNASSIGNED_LABEL: &str = "Unassigned";

/// Current utilization of one operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorStats {
    pub operator_id: OperatorId,
    pub operator_name: String,
    pub active_contacts_count: u32,
    pub max_load: u32,
    /// `active / max_load * 100`, rounded to two decimals; 0 when max_load is 0.
    pub utilization_percent: f64,
}

impl OperatorStats {
    /// Compute utilization for an operator with the given active load.
    pub fn compute(
        operator_id: OperatorId,
        operator_name: impl Into<String>,
        active_contacts_count: u32,
        max_load: u32,
    ) -> Self {
        let utilization_percent = if max_load > 0 {
            let raw = f64::from(active_contacts_count) / f64::from(max_load) * 100.0;
            (raw * 100.0).round() / 100.0
        } else {
            0.0
        };
        Self {
            operator_id,
            operator_name: operator_name.into(),
            active_contacts_count,
            max_load,
            utilization_percent,
        }
    }
}

/// Number of contacts a source routed to one operator (or to nobody).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorShare {
    pub operator_id: Option<OperatorId>,
    pub operator_name: String,
    pub count: u64,
}

/// How a source's contacts are spread across operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStats {
    pub source_id: SourceId,
    pub source_name: String,
    pub total_contacts: u64,
    pub operator_distribution: Vec<OperatorShare>,
}

impl SourceStats {
    /// Count for a given operator, or for unassigned contacts with `None`.
    pub fn count_for(&self, operator_id: Option<OperatorId>) -> u64 {
        self.operator_distribution
            .iter()
            .find(|share| share.operator_id == operator_id)
            .map(|share| share.count)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utilization_rounds_to_two_decimals() {
        let stats = OperatorStats::compute(OperatorId::new(), "alice", 1, 3);
        assert_eq!(stats.utilization_percent, 33.33);
    }

    #[test]
    fn test_utilization_zero_capacity() {
        let stats = OperatorStats::compute(OperatorId::new(), "bob", 4, 0);
        assert_eq!(stats.utilization_percent, 0.0);
    }

    #[test]
    fn test_utilization_can_exceed_hundred() {
        // Concurrent assignment may overshoot capacity transiently.
        let stats = OperatorStats::compute(OperatorId::new(), "carol", 6, 5);
        assert_eq!(stats.utilization_percent, 120.0);
    }

    #[test]
    fn test_count_for_missing_operator_is_zero() {
        let stats = SourceStats {
            source_id: SourceId::new(),
            source_name: "landing".to_string(),
            total_contacts: 2,
            operator_distribution: vec![OperatorShare {
                operator_id: None,
                operator_name: UNASSIGNED_LABEL.to_string(),
                count: 2,
            }],
        };
        assert_eq!(stats.count_for(None), 2);
        assert_eq!(stats.count_for(Some(OperatorId::new())), 0);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Utilization stays within [0, 100] while load does not exceed capacity.
        #[test]
        fn prop_utilization_bounded_under_capacity(
            (max_load, load) in (1u32..500).prop_flat_map(|max| (Just(max), 0..=max))
        ) {
            let stats = OperatorStats::compute(OperatorId::new(), "op", load, max_load);
            prop_assert!(stats.utilization_percent >= 0.0);
            prop_assert!(stats.utilization_percent <= 100.0);
        }

        /// Zero capacity always reports zero utilization.
        #[test]
        fn prop_zero_capacity_reports_zero(load in 0u32..1000) {
            let stats = OperatorStats::compute(OperatorId::new(), "op", load, 0);
            prop_assert_eq!(stats.utilization_percent, 0.0);
        }
    }
}
