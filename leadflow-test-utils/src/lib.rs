//! Leadflow Test Utilities
//!
//! Shared test infrastructure for the leadflow workspace:
//! - Proptest generators for entity types
//! - Store fixtures built with [`fixtures::ScenarioBuilder`]
//! - Seeded random sources
//! - Custom assertions for leadflow results

pub use leadflow_core::*;
pub use leadflow_storage::{DistributionStore, InMemoryStore};

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Deterministic random source for tests.
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for leadflow entity types.

    use super::*;
    use proptest::prelude::*;

    // === Entity Generators ===

    /// Selection weight: mostly positive, with exact zeros mixed in.
    pub fn arb_weight() -> impl Strategy<Value = f64> {
        prop_oneof![
            1 => Just(0.0),
            4 => 0.01f64..100.0,
        ]
    }

    /// Operator with arbitrary activity and capacity (including zero).
    pub fn arb_operator() -> impl Strategy<Value = Operator> {
        ("[a-z]{3,10}", any::<bool>(), 0u32..20).prop_map(|(name, is_active, max_load)| {
            Operator::new(name, max_load).with_active(is_active)
        })
    }

    /// Operator paired with a load that may or may not exceed its capacity.
    pub fn arb_loaded_operator() -> impl Strategy<Value = (Operator, u32)> {
        arb_operator().prop_flat_map(|operator| {
            let upper = operator.max_load + 3;
            (Just(operator), 0u32..upper)
        })
    }

    pub fn arb_phone() -> impl Strategy<Value = String> {
        "\\+1[0-9]{10}"
    }

    pub fn arb_email() -> impl Strategy<Value = String> {
        "[a-z]{1,8}@[a-z]{1,8}\\.com"
    }

    /// Identity with any subset of keys present.
    pub fn arb_identity() -> impl Strategy<Value = LeadIdentity> {
        (
            prop::option::of("[a-z0-9]{1,12}"),
            prop::option::of(arb_phone()),
            prop::option::of(arb_email()),
            prop::option::of("[A-Z][a-z]{1,10}"),
        )
            .prop_map(|(external_id, phone, email, name)| LeadIdentity {
                external_id,
                phone,
                email,
                name,
            })
    }

    /// Identity that carries at least one matching key.
    pub fn arb_keyed_identity() -> impl Strategy<Value = LeadIdentity> {
        arb_identity().prop_filter("needs a matching key", |identity| !identity.has_no_keys())
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Store fixtures for common distribution scenarios.

    use super::*;
    use leadflow_storage::NewContact;
    use std::collections::HashMap;

    struct OperatorPlan {
        operator: Operator,
        active_contacts: u32,
    }

    /// Builds an [`InMemoryStore`] with operators, one source, its weight
    /// rows and any pre-existing active load.
    pub struct ScenarioBuilder {
        source: Source,
        operators: Vec<OperatorPlan>,
        weights: Vec<(String, f64)>,
    }

    /// Handles to everything a [`ScenarioBuilder`] created.
    pub struct BuiltScenario {
        pub store: InMemoryStore,
        pub source: Source,
        pub operators: HashMap<String, Operator>,
    }

    impl BuiltScenario {
        /// Operator id by name. Panics when the name was never added.
        pub fn operator_id(&self, name: &str) -> OperatorId {
            self.operators
                .get(name)
                .map(|o| o.operator_id)
                .unwrap_or_else(|| panic!("no operator named {}", name))
        }
    }

    impl Default for ScenarioBuilder {
        fn default() -> Self {
            Self::new("web")
        }
    }

    impl ScenarioBuilder {
        pub fn new(source_name: &str) -> Self {
            Self {
                source: Source::new(source_name),
                operators: Vec::new(),
                weights: Vec::new(),
            }
        }

        /// Add an active operator.
        pub fn operator(self, name: &str, max_load: u32) -> Self {
            self.operator_with(Operator::new(name, max_load), 0)
        }

        /// Add an inactive operator.
        pub fn inactive_operator(self, name: &str, max_load: u32) -> Self {
            self.operator_with(Operator::new(name, max_load).with_active(false), 0)
        }

        /// Add an operator that already holds `active_contacts` active contacts.
        pub fn loaded_operator(self, name: &str, max_load: u32, active_contacts: u32) -> Self {
            self.operator_with(Operator::new(name, max_load), active_contacts)
        }

        pub fn operator_with(mut self, operator: Operator, active_contacts: u32) -> Self {
            self.operators.push(OperatorPlan {
                operator,
                active_contacts,
            });
            self
        }

        /// Link a previously added operator to the source.
        pub fn weight(mut self, name: &str, weight: f64) -> Self {
            self.weights.push((name.to_string(), weight));
            self
        }

        pub async fn build(self) -> LeadflowResult<BuiltScenario> {
            let store = InMemoryStore::new();
            store.insert_source(&self.source).await?;

            let mut operators = HashMap::new();
            for plan in &self.operators {
                store.insert_operator(&plan.operator).await?;
                for _ in 0..plan.active_contacts {
                    let lead = store.create_lead(&LeadIdentity::new()).await?;
                    store
                        .create_contact(NewContact {
                            lead_id: lead.lead_id,
                            source_id: self.source.source_id,
                            operator_id: Some(plan.operator.operator_id),
                            message: None,
                        })
                        .await?;
                }
                operators.insert(plan.operator.name.clone(), plan.operator.clone());
            }

            for (name, weight) in &self.weights {
                let operator: &Operator = operators.get(name).ok_or_else(|| {
                    LeadflowError::Validation(ValidationError::InvalidValue {
                        field: "weight".to_string(),
                        reason: format!("unknown operator {}", name),
                    })
                })?;
                store
                    .add_source_operator(self.source.source_id, operator.operator_id, *weight)
                    .await?;
            }

            Ok(BuiltScenario {
                store,
                source: self.source,
                operators,
            })
        }
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for leadflow-specific validation.

    use super::*;

    /// Assert that a result is a NotFound error for the given entity type.
    pub fn assert_not_found<T: std::fmt::Debug>(result: &LeadflowResult<T>, entity_type: EntityType) {
        match result {
            Err(LeadflowError::Storage(StorageError::NotFound { entity_type: et, .. })) => {
                assert_eq!(*et, entity_type, "Wrong entity type in NotFound error");
            }
            other => panic!("Expected NotFound for {:?}, got {:?}", entity_type, other),
        }
    }

    /// Assert that a result is a persistence failure (any non-NotFound storage error).
    pub fn assert_persistence_failure<T: std::fmt::Debug>(result: &LeadflowResult<T>) {
        match result {
            Err(err) if err.is_persistence_failure() => {}
            other => panic!("Expected persistence failure, got {:?}", other),
        }
    }

    /// Assert that no candidate in the list refers to the given operator.
    pub fn assert_not_eligible(candidates: &[WeightedOperator], operator_id: OperatorId) {
        assert!(
            candidates
                .iter()
                .all(|c| c.operator.operator_id != operator_id),
            "Operator {} should not be eligible",
            operator_id
        );
    }

    /// Assert that every candidate is active and below capacity given `loads`.
    pub fn assert_all_within_capacity(
        candidates: &[WeightedOperator],
        loads: &std::collections::HashMap<OperatorId, u32>,
    ) {
        for candidate in candidates {
            let load = loads.get(&candidate.operator.operator_id).copied().unwrap_or(0);
            assert!(candidate.operator.is_active, "Inactive operator is eligible");
            assert!(
                load < candidate.operator.max_load,
                "Operator {} at {}/{} is eligible",
                candidate.operator.operator_id,
                load,
                candidate.operator.max_load
            );
        }
    }
}
