//! Identity types for leadflow entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Entity type discriminator used in error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Operator,
    Source,
    SourceOperatorWeight,
    Lead,
    Contact,
}

/// Common behaviour of the strongly-typed entity identifiers.
pub trait EntityIdType: Copy + Eq + std::hash::Hash + fmt::Display {
    /// Entity this identifier refers to.
    const ENTITY_TYPE: EntityType;

    /// Wrap an existing UUID.
    fn from_uuid(uuid: Uuid) -> Self;

    /// Borrow the underlying UUID.
    fn as_uuid(&self) -> Uuid;
}

macro_rules! define_entity_id {
    ($(#[$meta:meta])* $name:ident => $entity:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new timestamp-sortable (UUIDv7) identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl EntityIdType for $name {
            const ENTITY_TYPE: EntityType = EntityType::$entity;

            fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_entity_id!(
    /// Identifier of an operator (an agent who handles contacts).
    OperatorId => Operator
);
define_entity_id!(
    /// Identifier of an acquisition source.
    SourceId => Source
);
define_entity_id!(
    /// Identifier of a deduplicated lead.
    LeadId => Lead
);
define_entity_id!(
    /// Identifier of one inbound contact event.
    ContactId => Contact
);
