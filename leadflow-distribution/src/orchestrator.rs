//! Distribution Orchestrator
//!
//! Composes the resolver, the capacity filter and the selector into one
//! decision per inbound contact. No state survives between decisions except
//! the RNG, and no lock is held across store calls.

use crate::capacity::eligible_operators;
use crate::load::current_load;
use crate::resolver::{find_lead, find_or_create_lead};
use crate::selector::select;
use leadflow_core::{
    Contact, DistributionConfig, EntityIdType, Lead, LeadIdentity, LeadflowError, LeadflowResult,
    Operator, OperatorId, SourceId, StorageError, WeightedOperator,
};
use leadflow_storage::{AssignmentCommit, DistributionStore, LeadDraft, NewContact};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

// ============================================================================
// REQUEST / RESULT TYPES
// ============================================================================

/// Outcome of a decision. `operator == None` is a normal outcome meaning no
/// operator was eligible; it is never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub lead: Lead,
    pub operator: Option<Operator>,
}

/// One inbound contact event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRequest {
    pub source_id: SourceId,
    #[serde(flatten)]
    pub identity: LeadIdentity,
    pub message: Option<String>,
}

impl ContactRequest {
    pub fn new(source_id: SourceId, identity: LeadIdentity) -> Self {
        Self {
            source_id,
            identity,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Persisted result of [`Distributor::submit_contact`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactReceipt {
    pub lead: Lead,
    pub contact: Contact,
    pub operator: Option<Operator>,
}

// ============================================================================
// DISTRIBUTOR
// ============================================================================

/// Entry point of the distribution engine.
pub struct Distributor<S: ?Sized> {
    store: Arc<S>,
    config: DistributionConfig,
    rng: Mutex<StdRng>,
}

impl<S> Distributor<S>
where
    S: DistributionStore + ?Sized,
{
    /// Create a distributor. The RNG is seeded from `config.rng_seed`, or
    /// from the operating system when no seed is configured.
    pub fn new(store: Arc<S>, config: DistributionConfig) -> LeadflowResult<Self> {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(store, config, rng)
    }

    /// Create a distributor around an explicit random source.
    pub fn with_rng(store: Arc<S>, config: DistributionConfig, rng: StdRng) -> LeadflowResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            rng: Mutex::new(rng),
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &DistributionConfig {
        &self.config
    }

    /// Active load of an operator.
    pub async fn current_load(&self, operator_id: OperatorId) -> LeadflowResult<u32> {
        current_load(self.store.as_ref(), operator_id).await
    }

    /// Operators of a source that can currently take a contact.
    pub async fn eligible_operators(
        &self,
        source_id: SourceId,
    ) -> LeadflowResult<Vec<WeightedOperator>> {
        eligible_operators(self.store.as_ref(), source_id).await
    }

    /// Decide the operator for a contact from `identity` through `source_id`.
    ///
    /// The lead is resolved and, when new, committed before returning. No
    /// contact is written; use [`Distributor::submit_contact`] for that.
    pub async fn assign(
        &self,
        source_id: SourceId,
        identity: &LeadIdentity,
    ) -> LeadflowResult<Assignment> {
        self.require_source(source_id).await?;

        let lead = find_or_create_lead(self.store.as_ref(), identity).await?;
        let candidates = self.eligible_operators(source_id).await?;
        let operator = self.choose(&candidates)?;

        tracing::info!(
            %source_id,
            lead_id = %lead.lead_id,
            candidates = candidates.len(),
            operator_id = ?operator.as_ref().map(|o| o.operator_id),
            "Assignment decided"
        );

        Ok(Assignment { lead, operator })
    }

    /// Resolve the lead, pick an operator and persist the contact.
    ///
    /// With `atomic_assignment` the lead (when new) and the contact are
    /// committed together, so a failed contact write leaves no orphan lead.
    /// Otherwise the lead is committed first and the contact second.
    pub async fn submit_contact(&self, request: ContactRequest) -> LeadflowResult<ContactReceipt> {
        let ContactRequest {
            source_id,
            identity,
            message,
        } = request;
        let identity = identity.normalized();

        self.require_source(source_id).await?;

        let (lead, contact, operator) = if self.config.atomic_assignment {
            let existing = find_lead(self.store.as_ref(), &identity).await?;
            let candidates = self.eligible_operators(source_id).await?;
            let operator = self.choose(&candidates)?;

            let draft = match existing {
                Some(lead) => LeadDraft::Existing(lead.lead_id),
                None => LeadDraft::Resolve(identity),
            };
            let (lead, contact) = self
                .store
                .commit_assignment(AssignmentCommit {
                    lead: draft,
                    source_id,
                    operator_id: operator.as_ref().map(|o| o.operator_id),
                    message,
                })
                .await?;
            (lead, contact, operator)
        } else {
            let lead = find_or_create_lead(self.store.as_ref(), &identity).await?;
            let candidates = self.eligible_operators(source_id).await?;
            let operator = self.choose(&candidates)?;

            let contact = self
                .store
                .create_contact(NewContact {
                    lead_id: lead.lead_id,
                    source_id,
                    operator_id: operator.as_ref().map(|o| o.operator_id),
                    message,
                })
                .await?;
            (lead, contact, operator)
        };

        tracing::info!(
            %source_id,
            lead_id = %lead.lead_id,
            contact_id = %contact.contact_id,
            operator_id = ?contact.operator_id,
            "Contact submitted"
        );

        Ok(ContactReceipt {
            lead,
            contact,
            operator,
        })
    }

    async fn require_source(&self, source_id: SourceId) -> LeadflowResult<()> {
        match self.store.get_source(source_id).await? {
            Some(_) => Ok(()),
            None => Err(LeadflowError::not_found(
                SourceId::ENTITY_TYPE,
                source_id.as_uuid(),
            )),
        }
    }

    fn choose(&self, candidates: &[WeightedOperator]) -> LeadflowResult<Option<Operator>> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| LeadflowError::Storage(StorageError::LockPoisoned))?;
        Ok(select(candidates, &mut *rng).map(|chosen| chosen.operator.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadflow_core::Source;
    use leadflow_storage::InMemoryStore;

    async fn setup(
        config: DistributionConfig,
    ) -> (Distributor<InMemoryStore>, Source, Operator) {
        let store = Arc::new(InMemoryStore::new());
        let source = Source::new("web");
        let operator = Operator::new("alice", 2);
        store.insert_source(&source).await.unwrap();
        store.insert_operator(&operator).await.unwrap();
        store
            .add_source_operator(source.source_id, operator.operator_id, 1.0)
            .await
            .unwrap();
        let distributor = Distributor::new(store, config.with_seed(1)).unwrap();
        (distributor, source, operator)
    }

    #[tokio::test]
    async fn test_assign_unknown_source_is_not_found_and_writes_nothing() {
        let (distributor, _, _) = setup(DistributionConfig::default()).await;
        let err = distributor
            .assign(SourceId::new(), &LeadIdentity::new().with_external_id("x1"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(distributor.store().lead_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_assign_writes_lead_but_no_contact() {
        let (distributor, source, operator) = setup(DistributionConfig::default()).await;
        let assignment = distributor
            .assign(source.source_id, &LeadIdentity::new().with_phone("555"))
            .await
            .unwrap();

        assert_eq!(
            assignment.operator.map(|o| o.operator_id),
            Some(operator.operator_id)
        );
        assert_eq!(distributor.store().lead_count().unwrap(), 1);
        assert_eq!(distributor.store().contact_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_weight_update_changes_selection() {
        let (distributor, source, alice) = setup(DistributionConfig::default()).await;
        let store = distributor.store();
        let bob = Operator::new("bob", 2);
        store.insert_operator(&bob).await.unwrap();
        store
            .add_source_operator(source.source_id, bob.operator_id, 0.0)
            .await
            .unwrap();

        for _ in 0..5 {
            let assignment = distributor
                .assign(source.source_id, &LeadIdentity::new())
                .await
                .unwrap();
            assert_eq!(assignment.operator.map(|o| o.operator_id), Some(alice.operator_id));
        }

        store
            .update_source_operator_weight(source.source_id, alice.operator_id, 0.0)
            .await
            .unwrap();
        store
            .update_source_operator_weight(source.source_id, bob.operator_id, 2.0)
            .await
            .unwrap();

        for _ in 0..5 {
            let assignment = distributor
                .assign(source.source_id, &LeadIdentity::new())
                .await
                .unwrap();
            assert_eq!(assignment.operator.map(|o| o.operator_id), Some(bob.operator_id));
        }
    }

    #[tokio::test]
    async fn test_submit_contact_fills_capacity_then_goes_unassigned() {
        let (distributor, source, operator) = setup(DistributionConfig::default()).await;

        for _ in 0..2 {
            let receipt = distributor
                .submit_contact(ContactRequest::new(source.source_id, LeadIdentity::new()))
                .await
                .unwrap();
            assert_eq!(receipt.contact.operator_id, Some(operator.operator_id));
        }

        let receipt = distributor
            .submit_contact(ContactRequest::new(source.source_id, LeadIdentity::new()))
            .await
            .unwrap();
        assert!(receipt.operator.is_none());
        assert!(receipt.contact.operator_id.is_none());
        assert_eq!(distributor.current_load(operator.operator_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_submit_contact_reuses_lead() {
        let (distributor, source, _) = setup(DistributionConfig::default()).await;
        let identity = LeadIdentity::new().with_email("a@example.com");

        let first = distributor
            .submit_contact(ContactRequest::new(source.source_id, identity.clone()))
            .await
            .unwrap();
        let second = distributor
            .submit_contact(
                ContactRequest::new(source.source_id, identity).with_message("again"),
            )
            .await
            .unwrap();

        assert_eq!(first.lead.lead_id, second.lead.lead_id);
        assert_ne!(first.contact.contact_id, second.contact.contact_id);
        assert_eq!(second.contact.message.as_deref(), Some("again"));
    }

    #[tokio::test]
    async fn test_atomic_failure_leaves_no_orphan_lead() {
        let (distributor, source, _) = setup(DistributionConfig::default()).await;
        distributor.store().set_fail_contact_writes(true);

        let err = distributor
            .submit_contact(ContactRequest::new(
                source.source_id,
                LeadIdentity::new().with_external_id("x1"),
            ))
            .await
            .unwrap_err();

        assert!(err.is_persistence_failure());
        assert_eq!(distributor.store().lead_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_two_phase_failure_keeps_committed_lead() {
        let config = DistributionConfig::default().with_atomic_assignment(false);
        let (distributor, source, _) = setup(config).await;
        distributor.store().set_fail_contact_writes(true);

        let err = distributor
            .submit_contact(ContactRequest::new(
                source.source_id,
                LeadIdentity::new().with_external_id("x1"),
            ))
            .await
            .unwrap_err();

        assert!(err.is_persistence_failure());
        assert_eq!(distributor.store().lead_count().unwrap(), 1);
        assert_eq!(distributor.store().contact_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let config = DistributionConfig {
            default_weight: -1.0,
            ..Default::default()
        };
        assert!(Distributor::new(store, config).is_err());
    }
}
