//! In-memory store implementation.
//!
//! All tables live behind one `RwLock`, so a write closure is a transaction:
//! it either applies every change or returns an error before touching
//! anything.

use crate::{
    AssignmentCommit, ContactFilter, DistributionStore, LeadDraft, NewContact, OperatorUpdate,
};
use async_trait::async_trait;
use leadflow_core::{
    Contact, ContactId, EntityIdType, EntityType, Lead, LeadId, LeadIdentity, LeadKey,
    LeadflowError, LeadflowResult, Operator, OperatorId, Source, SourceId, SourceOperatorWeight,
    StorageError, ValidationError, WeightedOperator,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct StoreState {
    operators: BTreeMap<OperatorId, Operator>,
    sources: BTreeMap<SourceId, Source>,
    weights: BTreeMap<(SourceId, OperatorId), SourceOperatorWeight>,
    leads: BTreeMap<LeadId, Lead>,
    leads_by_external_id: HashMap<String, LeadId>,
    contacts: BTreeMap<ContactId, Contact>,
}

impl StoreState {
    /// First lead carrying `key`, oldest first. Only external ids are
    /// unique; phone and email return whichever row is found first.
    fn find_lead(&self, key: LeadKey<'_>) -> Option<&Lead> {
        match key {
            LeadKey::ExternalId(external_id) => self
                .leads_by_external_id
                .get(external_id)
                .and_then(|id| self.leads.get(id)),
            _ => self.leads.values().find(|lead| key.matches(lead)),
        }
    }

    fn resolve_lead(&self, identity: &LeadIdentity) -> Option<&Lead> {
        identity
            .lookup_keys()
            .into_iter()
            .find_map(|key| self.find_lead(key))
    }

    fn insert_lead(&mut self, identity: &LeadIdentity) -> LeadflowResult<Lead> {
        if let Some(external_id) = identity.external_id.as_deref() {
            if self.leads_by_external_id.contains_key(external_id) {
                return Err(LeadflowError::Storage(StorageError::ConstraintViolation {
                    constraint: "uq_lead_external_id".to_string(),
                    reason: format!("external_id {} already exists", external_id),
                }));
            }
        }

        let lead = Lead::from_identity(identity);
        if let Some(external_id) = lead.external_id.clone() {
            self.leads_by_external_id.insert(external_id, lead.lead_id);
        }
        self.leads.insert(lead.lead_id, lead.clone());
        Ok(lead)
    }

    fn check_contact_refs(&self, contact: &NewContact) -> LeadflowResult<()> {
        if !self.leads.contains_key(&contact.lead_id) {
            return Err(not_found(contact.lead_id));
        }
        if !self.sources.contains_key(&contact.source_id) {
            return Err(not_found(contact.source_id));
        }
        if let Some(operator_id) = contact.operator_id {
            if !self.operators.contains_key(&operator_id) {
                return Err(not_found(operator_id));
            }
        }
        Ok(())
    }

    fn insert_contact(&mut self, contact: NewContact) -> Contact {
        let contact = Contact::new(
            contact.lead_id,
            contact.source_id,
            contact.operator_id,
            contact.message,
        );
        self.contacts.insert(contact.contact_id, contact.clone());
        contact
    }

    fn active_load(&self, operator_id: OperatorId) -> u32 {
        let count = self
            .contacts
            .values()
            .filter(|c| c.is_active_for(operator_id))
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

fn not_found<I: EntityIdType>(id: I) -> LeadflowError {
    LeadflowError::not_found(I::ENTITY_TYPE, id.as_uuid())
}

fn validate_weight(weight: f64) -> LeadflowResult<()> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(LeadflowError::Validation(ValidationError::InvalidValue {
            field: "weight".to_string(),
            reason: format!("weight must be a finite, non-negative number, got {}", weight),
        }));
    }
    Ok(())
}

/// Thread-safe in-memory implementation of [`DistributionStore`].
///
/// Cloning yields a handle to the same tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
    fail_contact_writes: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent contact write fail with `InsertFailed` until
    /// switched off again. Lets callers exercise persistence failures.
    pub fn set_fail_contact_writes(&self, fail: bool) {
        self.fail_contact_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored leads.
    pub fn lead_count(&self) -> LeadflowResult<usize> {
        self.read(|state| Ok(state.leads.len()))
    }

    /// Number of stored contacts.
    pub fn contact_count(&self) -> LeadflowResult<usize> {
        self.read(|state| Ok(state.contacts.len()))
    }

    fn read<T>(&self, f: impl FnOnce(&StoreState) -> LeadflowResult<T>) -> LeadflowResult<T> {
        let state = self
            .state
            .read()
            .map_err(|_| LeadflowError::Storage(StorageError::LockPoisoned))?;
        f(&state)
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut StoreState) -> LeadflowResult<T>,
    ) -> LeadflowResult<T> {
        let mut state = self
            .state
            .write()
            .map_err(|_| LeadflowError::Storage(StorageError::LockPoisoned))?;
        f(&mut state)
    }

    fn check_contact_writes(&self) -> LeadflowResult<()> {
        if self.fail_contact_writes.load(Ordering::SeqCst) {
            return Err(LeadflowError::Storage(StorageError::InsertFailed {
                entity_type: EntityType::Contact,
                reason: "contact writes are disabled".to_string(),
            }));
        }
        Ok(())
    }
}

#[async_trait]
impl DistributionStore for InMemoryStore {
    // === Load Accounting ===

    async fn count_active_contacts(&self, operator_id: OperatorId) -> LeadflowResult<u32> {
        self.read(|state| Ok(state.active_load(operator_id)))
    }

    async fn count_active_contacts_batch(
        &self,
        operator_ids: &[OperatorId],
    ) -> LeadflowResult<HashMap<OperatorId, u32>> {
        self.read(|state| {
            let mut loads: HashMap<OperatorId, u32> =
                operator_ids.iter().map(|id| (*id, 0)).collect();
            for contact in state.contacts.values().filter(|c| c.is_active()) {
                if let Some(load) = contact.operator_id.and_then(|id| loads.get_mut(&id)) {
                    *load = load.saturating_add(1);
                }
            }
            Ok(loads)
        })
    }

    // === Weight Policy ===

    async fn get_weights_for_source(
        &self,
        source_id: SourceId,
    ) -> LeadflowResult<Vec<WeightedOperator>> {
        self.read(|state| {
            if !state.sources.contains_key(&source_id) {
                return Err(not_found(source_id));
            }
            state
                .weights
                .range((source_id, OperatorId::from_uuid(uuid::Uuid::nil()))..)
                .take_while(|((sid, _), _)| *sid == source_id)
                .map(|((_, operator_id), row)| {
                    let operator = state
                        .operators
                        .get(operator_id)
                        .ok_or_else(|| not_found(*operator_id))?;
                    Ok(WeightedOperator::new(operator.clone(), row.weight))
                })
                .collect()
        })
    }

    // === Leads ===

    async fn find_lead(&self, key: LeadKey<'_>) -> LeadflowResult<Option<Lead>> {
        self.read(|state| Ok(state.find_lead(key).cloned()))
    }

    async fn create_lead(&self, identity: &LeadIdentity) -> LeadflowResult<Lead> {
        self.write(|state| state.insert_lead(identity))
    }

    async fn get_lead(&self, lead_id: LeadId) -> LeadflowResult<Option<Lead>> {
        self.read(|state| Ok(state.leads.get(&lead_id).cloned()))
    }

    async fn list_leads(&self, skip: usize, limit: usize) -> LeadflowResult<Vec<Lead>> {
        self.read(|state| {
            Ok(state
                .leads
                .values()
                .rev()
                .skip(skip)
                .take(limit)
                .cloned()
                .collect())
        })
    }

    // === Contacts ===

    async fn create_contact(&self, contact: NewContact) -> LeadflowResult<Contact> {
        self.check_contact_writes()?;
        self.write(|state| {
            state.check_contact_refs(&contact)?;
            Ok(state.insert_contact(contact))
        })
    }

    async fn commit_assignment(&self, commit: AssignmentCommit) -> LeadflowResult<(Lead, Contact)> {
        self.write(|state| {
            if !state.sources.contains_key(&commit.source_id) {
                return Err(not_found(commit.source_id));
            }
            if let Some(operator_id) = commit.operator_id {
                if !state.operators.contains_key(&operator_id) {
                    return Err(not_found(operator_id));
                }
            }

            // Resolve without inserting so a failing contact write leaves no lead behind.
            let (existing, identity) = match &commit.lead {
                LeadDraft::Existing(lead_id) => {
                    let lead = state
                        .leads
                        .get(lead_id)
                        .cloned()
                        .ok_or_else(|| not_found(*lead_id))?;
                    (Some(lead), None)
                }
                LeadDraft::Resolve(identity) => (state.resolve_lead(identity).cloned(), Some(identity)),
            };

            self.check_contact_writes()?;

            let lead = match (existing, identity) {
                (Some(lead), _) => lead,
                (None, Some(identity)) => state.insert_lead(identity)?,
                (None, None) => {
                    return Err(LeadflowError::Storage(StorageError::TransactionFailed {
                        reason: "assignment commit without a lead".to_string(),
                    }))
                }
            };

            let contact = state.insert_contact(NewContact {
                lead_id: lead.lead_id,
                source_id: commit.source_id,
                operator_id: commit.operator_id,
                message: commit.message,
            });
            Ok((lead, contact))
        })
    }

    async fn get_contact(&self, contact_id: ContactId) -> LeadflowResult<Option<Contact>> {
        self.read(|state| Ok(state.contacts.get(&contact_id).cloned()))
    }

    async fn list_contacts(&self, filter: &ContactFilter) -> LeadflowResult<Vec<Contact>> {
        self.read(|state| {
            Ok(state
                .contacts
                .values()
                .rev()
                .filter(|c| filter.matches(c))
                .skip(filter.skip)
                .take(filter.limit)
                .cloned()
                .collect())
        })
    }

    async fn update_contact_status(
        &self,
        contact_id: ContactId,
        status: &str,
    ) -> LeadflowResult<Contact> {
        self.write(|state| {
            let contact = state
                .contacts
                .get_mut(&contact_id)
                .ok_or_else(|| not_found(contact_id))?;
            contact.status = status.to_string();
            Ok(contact.clone())
        })
    }

    async fn count_contacts_by_operator(
        &self,
        source_id: SourceId,
    ) -> LeadflowResult<Vec<(Option<OperatorId>, u64)>> {
        self.read(|state| {
            let mut counts: BTreeMap<Option<OperatorId>, u64> = BTreeMap::new();
            for contact in state.contacts.values().filter(|c| c.source_id == source_id) {
                *counts.entry(contact.operator_id).or_insert(0) += 1;
            }
            Ok(counts.into_iter().collect())
        })
    }

    // === Operators & Sources ===

    async fn insert_operator(&self, operator: &Operator) -> LeadflowResult<()> {
        self.write(|state| {
            if state.operators.contains_key(&operator.operator_id) {
                return Err(LeadflowError::Storage(StorageError::InsertFailed {
                    entity_type: EntityType::Operator,
                    reason: "already exists".to_string(),
                }));
            }
            state.operators.insert(operator.operator_id, operator.clone());
            Ok(())
        })
    }

    async fn get_operator(&self, operator_id: OperatorId) -> LeadflowResult<Option<Operator>> {
        self.read(|state| Ok(state.operators.get(&operator_id).cloned()))
    }

    async fn list_operators(&self) -> LeadflowResult<Vec<Operator>> {
        self.read(|state| Ok(state.operators.values().cloned().collect()))
    }

    async fn update_operator(
        &self,
        operator_id: OperatorId,
        update: OperatorUpdate,
    ) -> LeadflowResult<Operator> {
        self.write(|state| {
            let operator = state
                .operators
                .get_mut(&operator_id)
                .ok_or_else(|| not_found(operator_id))?;

            if let Some(name) = update.name {
                operator.name = name;
            }
            if let Some(is_active) = update.is_active {
                operator.is_active = is_active;
            }
            if let Some(max_load) = update.max_load {
                operator.max_load = max_load;
            }
            Ok(operator.clone())
        })
    }

    async fn delete_operator(&self, operator_id: OperatorId) -> LeadflowResult<()> {
        self.write(|state| {
            if state.operators.remove(&operator_id).is_none() {
                return Err(not_found(operator_id));
            }
            state.weights.retain(|(_, oid), _| *oid != operator_id);
            for contact in state.contacts.values_mut() {
                if contact.operator_id == Some(operator_id) {
                    contact.operator_id = None;
                }
            }
            Ok(())
        })
    }

    async fn insert_source(&self, source: &Source) -> LeadflowResult<()> {
        self.write(|state| {
            if state.sources.contains_key(&source.source_id) {
                return Err(LeadflowError::Storage(StorageError::InsertFailed {
                    entity_type: EntityType::Source,
                    reason: "already exists".to_string(),
                }));
            }
            if state.sources.values().any(|s| s.name == source.name) {
                return Err(LeadflowError::Storage(StorageError::ConstraintViolation {
                    constraint: "uq_source_name".to_string(),
                    reason: format!("source name {} already exists", source.name),
                }));
            }
            state.sources.insert(source.source_id, source.clone());
            Ok(())
        })
    }

    async fn get_source(&self, source_id: SourceId) -> LeadflowResult<Option<Source>> {
        self.read(|state| Ok(state.sources.get(&source_id).cloned()))
    }

    async fn list_sources(&self) -> LeadflowResult<Vec<Source>> {
        self.read(|state| Ok(state.sources.values().cloned().collect()))
    }

    async fn add_source_operator(
        &self,
        source_id: SourceId,
        operator_id: OperatorId,
        weight: f64,
    ) -> LeadflowResult<SourceOperatorWeight> {
        validate_weight(weight)?;
        self.write(|state| {
            if !state.sources.contains_key(&source_id) {
                return Err(not_found(source_id));
            }
            if !state.operators.contains_key(&operator_id) {
                return Err(not_found(operator_id));
            }
            if state.weights.contains_key(&(source_id, operator_id)) {
                return Err(LeadflowError::Storage(StorageError::ConstraintViolation {
                    constraint: "uq_source_operator".to_string(),
                    reason: format!(
                        "operator {} is already linked to source {}",
                        operator_id, source_id
                    ),
                }));
            }
            let row = SourceOperatorWeight {
                source_id,
                operator_id,
                weight,
            };
            state.weights.insert((source_id, operator_id), row.clone());
            Ok(row)
        })
    }

    async fn update_source_operator_weight(
        &self,
        source_id: SourceId,
        operator_id: OperatorId,
        weight: f64,
    ) -> LeadflowResult<SourceOperatorWeight> {
        validate_weight(weight)?;
        self.write(|state| {
            let row = state
                .weights
                .get_mut(&(source_id, operator_id))
                .ok_or_else(|| {
                    LeadflowError::Storage(StorageError::NotFound {
                        entity_type: EntityType::SourceOperatorWeight,
                        id: operator_id.as_uuid(),
                    })
                })?;
            row.weight = weight;
            Ok(row.clone())
        })
    }

    async fn remove_source_operator(
        &self,
        source_id: SourceId,
        operator_id: OperatorId,
    ) -> LeadflowResult<()> {
        self.write(|state| {
            state
                .weights
                .remove(&(source_id, operator_id))
                .map(|_| ())
                .ok_or_else(|| {
                    LeadflowError::Storage(StorageError::NotFound {
                        entity_type: EntityType::SourceOperatorWeight,
                        id: operator_id.as_uuid(),
                    })
                })
        })
    }
}
