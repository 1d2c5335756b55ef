//! Leadflow Distribution - Capacity-Aware Weighted Lead Distribution
//!
//! Decides which operator receives an inbound contact:
//!
//! 1. [`resolver`] matches the contact to a lead (external id > phone > email)
//!    or creates one.
//! 2. [`capacity`] keeps the source's operators that are active and below
//!    their `max_load`, using [`load`] for active-contact counts.
//! 3. [`selector`] draws one of them with probability proportional to its
//!    weight, from an injected random source.
//!
//! [`orchestrator::Distributor`] composes these steps. Finding no eligible
//! operator is a normal outcome: the contact is stored unassigned.

pub mod admin;
pub mod capacity;
pub mod load;
pub mod orchestrator;
pub mod resolver;
pub mod scenario;
pub mod selector;
pub mod stats;
pub mod telemetry;

pub use capacity::{check_eligibility, eligible_operators, Exclusion};
pub use load::{current_load, current_loads};
pub use orchestrator::{Assignment, ContactReceipt, ContactRequest, Distributor};
pub use resolver::{find_lead, find_or_create_lead};
pub use scenario::{Scenario, SimulationReport};
pub use selector::{select, select_index, Weighted};
pub use stats::{all_operator_stats, operator_stats, source_stats};
pub use telemetry::{init_tracing, TelemetryConfig};
