//! Leadflow Core - Entity Types
//!
//! Pure data structures shared by the store and the distribution engine.
//! This crate contains ONLY data types - no I/O and no selection logic.

pub mod config;
pub mod entities;
pub mod error;
pub mod identity;
pub mod stats;

pub use config::DistributionConfig;
pub use entities::{
    Contact, Lead, LeadIdentity, LeadKey, Operator, Source, SourceOperatorWeight, WeightedOperator,
    ACTIVE_STATUS, DEFAULT_MAX_LOAD, DEFAULT_WEIGHT,
};
pub use error::{ConfigError, LeadflowError, LeadflowResult, StorageError, ValidationError};
pub use identity::{
    ContactId, EntityIdType, EntityType, LeadId, OperatorId, SourceId, Timestamp,
};
pub use stats::{OperatorShare, OperatorStats, SourceStats, UNASSIGNED_LABEL};
