//! Leadflow Storage - Storage Trait and In-Memory Implementation
//!
//! Defines the persistence collaborator the distribution engine consumes:
//! active-load counts, per-source weight rows, lead lookups and durable
//! lead/contact creation. [`InMemoryStore`] is a thread-safe, transactional
//! implementation for tests, simulations and embedders.

pub mod memory;

pub use memory::InMemoryStore;

use ::async_trait::async_trait;
use leadflow_core::{
    Contact, ContactId, Lead, LeadId, LeadIdentity, LeadKey, LeadflowResult, Operator, OperatorId,
    Source, SourceId, SourceOperatorWeight, WeightedOperator,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// WRITE PAYLOADS
// ============================================================================

/// Partial update for an operator. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatorUpdate {
    pub name: Option<String>,
    pub is_active: Option<bool>,
    pub max_load: Option<u32>,
}

/// Contact row to insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewContact {
    pub lead_id: LeadId,
    pub source_id: SourceId,
    pub operator_id: Option<OperatorId>,
    pub message: Option<String>,
}

/// How the lead of an assignment is obtained when it is committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LeadDraft {
    /// The lead already exists.
    Existing(LeadId),
    /// Find-or-create from the identity inside the commit transaction.
    Resolve(LeadIdentity),
}

/// Lead + contact written as a single transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentCommit {
    pub lead: LeadDraft,
    pub source_id: SourceId,
    pub operator_id: Option<OperatorId>,
    pub message: Option<String>,
}

/// Filters and pagination for contact listings. Results are newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactFilter {
    pub lead_id: Option<LeadId>,
    pub source_id: Option<SourceId>,
    pub operator_id: Option<OperatorId>,
    pub skip: usize,
    pub limit: usize,
}

impl Default for ContactFilter {
    fn default() -> Self {
        Self {
            lead_id: None,
            source_id: None,
            operator_id: None,
            skip: 0,
            limit: 100,
        }
    }
}

impl ContactFilter {
    /// Whether a contact passes the id filters (pagination not applied).
    pub fn matches(&self, contact: &Contact) -> bool {
        self.lead_id.map_or(true, |id| contact.lead_id == id)
            && self.source_id.map_or(true, |id| contact.source_id == id)
            && self.operator_id.map_or(true, |id| contact.operator_id == Some(id))
    }
}

// ============================================================================
// STORAGE TRAIT
// ============================================================================

/// Persistence collaborator for the distribution engine.
///
/// Reads are point-in-time snapshots; no lock is held across calls, so a
/// decision built from several reads is advisory under concurrency.
#[async_trait]
pub trait DistributionStore: Send + Sync {
    // ========================================================================
    // LOAD ACCOUNTING
    // ========================================================================

    /// Number of contacts assigned to the operator whose status is "active".
    async fn count_active_contacts(&self, operator_id: OperatorId) -> LeadflowResult<u32>;

    /// Active contact counts for several operators in one pass. Every
    /// requested id is present in the result, with 0 when it has no load.
    async fn count_active_contacts_batch(
        &self,
        operator_ids: &[OperatorId],
    ) -> LeadflowResult<HashMap<OperatorId, u32>>;

    // ========================================================================
    // WEIGHT POLICY
    // ========================================================================

    /// All weight rows of a source joined with their operators, ordered by
    /// operator id. Fails with NotFound when the source does not exist.
    async fn get_weights_for_source(
        &self,
        source_id: SourceId,
    ) -> LeadflowResult<Vec<WeightedOperator>>;

    // ========================================================================
    // LEADS
    // ========================================================================

    /// First lead carrying the given key, if any.
    async fn find_lead(&self, key: LeadKey<'_>) -> LeadflowResult<Option<Lead>>;

    /// Lead lookup by external id.
    async fn find_lead_by_external_id(&self, external_id: &str) -> LeadflowResult<Option<Lead>> {
        self.find_lead(LeadKey::ExternalId(external_id)).await
    }

    /// Lead lookup by phone.
    async fn find_lead_by_phone(&self, phone: &str) -> LeadflowResult<Option<Lead>> {
        self.find_lead(LeadKey::Phone(phone)).await
    }

    /// Lead lookup by email.
    async fn find_lead_by_email(&self, email: &str) -> LeadflowResult<Option<Lead>> {
        self.find_lead(LeadKey::Email(email)).await
    }

    /// Durably create a lead; visible to every caller once this returns.
    async fn create_lead(&self, identity: &LeadIdentity) -> LeadflowResult<Lead>;

    async fn get_lead(&self, lead_id: LeadId) -> LeadflowResult<Option<Lead>>;

    /// Leads, newest first.
    async fn list_leads(&self, skip: usize, limit: usize) -> LeadflowResult<Vec<Lead>>;

    // ========================================================================
    // CONTACTS
    // ========================================================================

    /// Durably create an active contact.
    async fn create_contact(&self, contact: NewContact) -> LeadflowResult<Contact>;

    /// Find-or-create the lead and create the contact in one transaction.
    /// Either both become visible or neither does.
    async fn commit_assignment(&self, commit: AssignmentCommit) -> LeadflowResult<(Lead, Contact)>;

    async fn get_contact(&self, contact_id: ContactId) -> LeadflowResult<Option<Contact>>;

    /// Contacts matching the filter, newest first.
    async fn list_contacts(&self, filter: &ContactFilter) -> LeadflowResult<Vec<Contact>>;

    /// A lead together with all of its contacts, newest first.
    async fn lead_with_contacts(
        &self,
        lead_id: LeadId,
    ) -> LeadflowResult<Option<(Lead, Vec<Contact>)>> {
        let Some(lead) = self.get_lead(lead_id).await? else {
            return Ok(None);
        };
        let filter = ContactFilter {
            lead_id: Some(lead_id),
            limit: usize::MAX,
            ..Default::default()
        };
        let contacts = self.list_contacts(&filter).await?;
        Ok(Some((lead, contacts)))
    }

    /// Overwrite a contact's status. Fails with NotFound for unknown ids.
    async fn update_contact_status(
        &self,
        contact_id: ContactId,
        status: &str,
    ) -> LeadflowResult<Contact>;

    /// Contact counts of a source grouped by operator (`None` = unassigned).
    async fn count_contacts_by_operator(
        &self,
        source_id: SourceId,
    ) -> LeadflowResult<Vec<(Option<OperatorId>, u64)>>;

    // ========================================================================
    // OPERATORS & SOURCES (administrative)
    // ========================================================================

    async fn insert_operator(&self, operator: &Operator) -> LeadflowResult<()>;

    async fn get_operator(&self, operator_id: OperatorId) -> LeadflowResult<Option<Operator>>;

    async fn list_operators(&self) -> LeadflowResult<Vec<Operator>>;

    async fn update_operator(
        &self,
        operator_id: OperatorId,
        update: OperatorUpdate,
    ) -> LeadflowResult<Operator>;

    /// Delete an operator, its weight rows, and unassign its contacts.
    async fn delete_operator(&self, operator_id: OperatorId) -> LeadflowResult<()>;

    /// Insert a source. Source names are unique.
    async fn insert_source(&self, source: &Source) -> LeadflowResult<()>;

    async fn get_source(&self, source_id: SourceId) -> LeadflowResult<Option<Source>>;

    async fn list_sources(&self) -> LeadflowResult<Vec<Source>>;

    /// Link an operator to a source. Rejects unknown ids, duplicate links
    /// and weights that are negative or not finite.
    async fn add_source_operator(
        &self,
        source_id: SourceId,
        operator_id: OperatorId,
        weight: f64,
    ) -> LeadflowResult<SourceOperatorWeight>;

    async fn update_source_operator_weight(
        &self,
        source_id: SourceId,
        operator_id: OperatorId,
        weight: f64,
    ) -> LeadflowResult<SourceOperatorWeight>;

    async fn remove_source_operator(
        &self,
        source_id: SourceId,
        operator_id: OperatorId,
    ) -> LeadflowResult<()>;
}
