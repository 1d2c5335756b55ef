//! Entity structs shared by the store and the distribution engine.
//!
//! These are plain data: the engine reads them as a snapshot for the
//! duration of one decision and never mutates operators, sources or weights.

use crate::identity::{ContactId, LeadId, OperatorId, SourceId, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Contact status that counts towards an operator's active load.
pub const ACTIVE_STATUS: &str = "active";

/// Capacity given to operators created without an explicit `max_load`.
pub const DEFAULT_MAX_LOAD: u32 = 10;

/// Weight given to a source/operator link created without an explicit weight.
pub const DEFAULT_WEIGHT: f64 = 1.0;

// ============================================================================
// OPERATOR
// ============================================================================

/// An agent who handles assigned contacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    pub operator_id: OperatorId,
    pub name: String,
    pub is_active: bool,
    /// Maximum number of concurrently active contacts. Zero means the
    /// operator is never eligible.
    pub max_load: u32,
    pub created_at: Timestamp,
}

impl Operator {
    /// Create a new active operator.
    pub fn new(name: impl Into<String>, max_load: u32) -> Self {
        Self {
            operator_id: OperatorId::new(),
            name: name.into(),
            is_active: true,
            max_load,
            created_at: Utc::now(),
        }
    }

    /// Set the active flag.
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Whether one more contact fits given the current active load.
    ///
    /// `load >= max_load` means the operator is saturated, so a zero
    /// capacity operator never has room.
    pub fn has_capacity_for(&self, current_load: u32) -> bool {
        current_load < self.max_load
    }
}

// ============================================================================
// SOURCE
// ============================================================================

/// An acquisition channel with its own operator weighting policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub source_id: SourceId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: Timestamp,
}

impl Source {
    /// Create a new source.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            source_id: SourceId::new(),
            name: name.into(),
            description: None,
            created_at: Utc::now(),
        }
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Weight row linking a source to an operator.
///
/// At most one row exists per (source, operator) pair. The weight is a
/// relative probability mass, not a percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceOperatorWeight {
    pub source_id: SourceId,
    pub operator_id: OperatorId,
    pub weight: f64,
}

/// A weight row joined with its operator, as consumed by the capacity filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedOperator {
    pub operator: Operator,
    pub weight: f64,
}

impl WeightedOperator {
    pub fn new(operator: Operator, weight: f64) -> Self {
        Self { operator, weight }
    }
}

// ============================================================================
// LEAD
// ============================================================================

/// Inbound identity tuple used to match or create a lead.
///
/// Any subset of the keys may be present. Empty strings are treated as
/// absent, so they never participate in a lookup. Whitespace is kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadIdentity {
    pub external_id: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl LeadIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = non_empty(external_id.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = non_empty(phone.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = non_empty(email.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = non_empty(name.into());
        self
    }

    /// Drop empty keys that may have arrived through deserialization.
    pub fn normalized(self) -> Self {
        Self {
            external_id: self.external_id.and_then(non_empty),
            phone: self.phone.and_then(non_empty),
            email: self.email.and_then(non_empty),
            name: self.name.and_then(non_empty),
        }
    }

    /// True when none of the matching keys is present.
    pub fn has_no_keys(&self) -> bool {
        self.external_id.is_none() && self.phone.is_none() && self.email.is_none()
    }

    /// Present keys in lookup precedence order: external id, phone, email.
    ///
    /// Each key is looked up on its own and the first hit wins; there is no
    /// merging of leads matched by different keys.
    pub fn lookup_keys(&self) -> Vec<LeadKey<'_>> {
        let mut keys = Vec::with_capacity(3);
        if let Some(external_id) = self.external_id.as_deref() {
            keys.push(LeadKey::ExternalId(external_id));
        }
        if let Some(phone) = self.phone.as_deref() {
            keys.push(LeadKey::Phone(phone));
        }
        if let Some(email) = self.email.as_deref() {
            keys.push(LeadKey::Email(email));
        }
        keys
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// One matching key of a lead identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeadKey<'a> {
    ExternalId(&'a str),
    Phone(&'a str),
    Email(&'a str),
}

impl LeadKey<'_> {
    /// Whether `lead` carries this key.
    pub fn matches(&self, lead: &Lead) -> bool {
        match self {
            LeadKey::ExternalId(value) => lead.external_id.as_deref() == Some(*value),
            LeadKey::Phone(value) => lead.phone.as_deref() == Some(*value),
            LeadKey::Email(value) => lead.email.as_deref() == Some(*value),
        }
    }
}

/// A deduplicated contact-seeking person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub lead_id: LeadId,
    /// Unique across leads when present.
    pub external_id: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub created_at: Timestamp,
}

impl Lead {
    /// Build a fresh lead carrying whatever keys the identity supplied.
    pub fn from_identity(identity: &LeadIdentity) -> Self {
        Self {
            lead_id: LeadId::new(),
            external_id: identity.external_id.clone(),
            phone: identity.phone.clone(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// CONTACT
// ============================================================================

/// One inbound event from a lead through a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub contact_id: ContactId,
    pub lead_id: LeadId,
    pub source_id: SourceId,
    /// `None` means the contact was persisted unassigned.
    pub operator_id: Option<OperatorId>,
    /// Free-form status; only `"active"` counts towards load.
    pub status: String,
    pub message: Option<String>,
    pub created_at: Timestamp,
}

impl Contact {
    /// Create an active contact.
    pub fn new(
        lead_id: LeadId,
        source_id: SourceId,
        operator_id: Option<OperatorId>,
        message: Option<String>,
    ) -> Self {
        Self {
            contact_id: ContactId::new(),
            lead_id,
            source_id,
            operator_id,
            status: ACTIVE_STATUS.to_string(),
            message,
            created_at: Utc::now(),
        }
    }

    /// Whether this contact counts towards its operator's load.
    pub fn is_active(&self) -> bool {
        self.status == ACTIVE_STATUS
    }

    /// Whether this contact is active and assigned to `operator_id`.
    pub fn is_active_for(&self, operator_id: OperatorId) -> bool {
        self.operator_id == Some(operator_id) && self.is_active()
    }
}
