//! Simulation scenarios loaded from TOML.
//!
//! A scenario describes operators, sources with their weight policies, any
//! pre-existing active load, and the distribution config. Running it feeds
//! contacts through a [`Distributor`] backed by an [`InMemoryStore`].

use crate::admin::{create_operator, create_source, link_operator};
use crate::orchestrator::{ContactRequest, Distributor};
use crate::stats::{all_operator_stats, source_stats};
use leadflow_core::{
    ConfigError, DistributionConfig, LeadIdentity, LeadflowError, LeadflowResult, Operator,
    OperatorStats, Source, SourceStats, ValidationError,
};
use leadflow_storage::{DistributionStore, InMemoryStore, NewContact};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Number of contacts submitted when neither the scenario nor the caller
/// sets one.
pub const DEFAULT_CONTACTS: usize = 100;

/// Source holding the contacts that make up operators' initial load. It is
/// not part of the scenario's sources and is left out of the report.
pub const PRELOAD_SOURCE_NAME: &str = "__preload__";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorSpec {
    pub name: String,
    pub max_load: Option<u32>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Active contacts the operator already holds before the run.
    #[serde(default)]
    pub active_contacts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightSpec {
    pub operator: String,
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub weights: Vec<WeightSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: DistributionConfig,
    pub contacts: Option<usize>,
    /// When set, contact `i` reuses external id `lead-{i % distinct_leads}`,
    /// so repeat contacts resolve to existing leads.
    pub distinct_leads: Option<usize>,
    #[serde(default)]
    pub operators: Vec<OperatorSpec>,
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
}

fn default_true() -> bool {
    true
}

/// Per-source and per-operator results of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub contacts_submitted: usize,
    pub sources: Vec<SourceStats>,
    pub operators: Vec<OperatorStats>,
}

impl Scenario {
    pub fn from_toml_str(raw: &str) -> LeadflowResult<Self> {
        let scenario: Scenario = toml::from_str(raw).map_err(|e| {
            LeadflowError::Config(ConfigError::InvalidValue {
                field: "scenario".to_string(),
                value: "<toml>".to_string(),
                reason: e.to_string(),
            })
        })?;
        scenario.config.validate()?;
        Ok(scenario)
    }

    pub fn load(path: &Path) -> LeadflowResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            LeadflowError::Config(ConfigError::InvalidValue {
                field: "scenario".to_string(),
                value: path.display().to_string(),
                reason: e.to_string(),
            })
        })?;
        Self::from_toml_str(&raw)
    }

    /// Create the scenario's operators, sources, weights and initial load.
    ///
    /// The returned sources are the scenario's own; the holding source for
    /// preloaded contacts is not among them.
    pub async fn install<S>(&self, store: &S) -> LeadflowResult<(Vec<Source>, Vec<Operator>)>
    where
        S: DistributionStore + ?Sized,
    {
        let mut operators = Vec::with_capacity(self.operators.len());
        let mut by_name: HashMap<&str, Operator> = HashMap::new();
        for spec in &self.operators {
            let mut operator = create_operator(store, &self.config, &spec.name, spec.max_load).await?;
            if !spec.is_active {
                operator = store
                    .update_operator(
                        operator.operator_id,
                        leadflow_storage::OperatorUpdate {
                            is_active: Some(false),
                            ..Default::default()
                        },
                    )
                    .await?;
            }
            by_name.insert(spec.name.as_str(), operator.clone());
            operators.push(operator);
        }

        let mut sources = Vec::with_capacity(self.sources.len());
        for spec in &self.sources {
            let source = create_source(store, &spec.name, spec.description.as_deref()).await?;
            for weight in &spec.weights {
                let operator = by_name.get(weight.operator.as_str()).ok_or_else(|| {
                    LeadflowError::Validation(ValidationError::InvalidValue {
                        field: "weights.operator".to_string(),
                        reason: format!(
                            "source {} references unknown operator {}",
                            spec.name, weight.operator
                        ),
                    })
                })?;
                link_operator(
                    store,
                    &self.config,
                    source.source_id,
                    operator.operator_id,
                    weight.weight,
                )
                .await?;
            }
            sources.push(source);
        }

        let preload: Vec<(&OperatorSpec, &Operator)> = self
            .operators
            .iter()
            .zip(operators.iter())
            .filter(|(spec, _)| spec.active_contacts > 0)
            .collect();
        if !preload.is_empty() {
            // Preloaded contacts live on their own source so they never show
            // up in the statistics of the scenario's sources.
            let holding = create_source(store, PRELOAD_SOURCE_NAME, None).await?;
            for (spec, operator) in preload {
                for _ in 0..spec.active_contacts {
                    let lead = store.create_lead(&LeadIdentity::new()).await?;
                    store
                        .create_contact(NewContact {
                            lead_id: lead.lead_id,
                            source_id: holding.source_id,
                            operator_id: Some(operator.operator_id),
                            message: None,
                        })
                        .await?;
                }
            }
        }

        Ok((sources, operators))
    }

    /// Install into a fresh in-memory store and submit contacts round-robin
    /// across the sources.
    pub async fn run(&self, contacts: Option<usize>) -> LeadflowResult<SimulationReport> {
        let store = Arc::new(InMemoryStore::new());
        let (sources, _) = self.install(store.as_ref()).await?;
        let distributor = Distributor::new(Arc::clone(&store), self.config.clone())?;

        let contacts = contacts.or(self.contacts).unwrap_or(DEFAULT_CONTACTS);
        if !sources.is_empty() {
            for i in 0..contacts {
                let source = &sources[i % sources.len()];
                let lead_number = self.distinct_leads.filter(|n| *n > 0).map_or(i, |n| i % n);
                let identity = LeadIdentity::new().with_external_id(format!("lead-{}", lead_number));
                distributor
                    .submit_contact(ContactRequest::new(source.source_id, identity))
                    .await?;
            }
        } else {
            tracing::warn!("Scenario has no sources; nothing to submit");
        }

        let mut source_reports = Vec::with_capacity(sources.len());
        for source in &sources {
            source_reports.push(source_stats(store.as_ref(), source.source_id).await?);
        }

        Ok(SimulationReport {
            contacts_submitted: if sources.is_empty() { 0 } else { contacts },
            sources: source_reports,
            operators: all_operator_stats(store.as_ref()).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
contacts = 40

[config]
rng_seed = 3

[[operators]]
name = "alice"
max_load = 100

[[operators]]
name = "bob"
max_load = 100

[[operators]]
name = "carol"
max_load = 3
active_contacts = 3

[[operators]]
name = "dave"
is_active = false

[[sources]]
name = "web"
weights = [
    { operator = "alice", weight = 1.0 },
    { operator = "bob", weight = 0.0 },
    { operator = "carol", weight = 5.0 },
    { operator = "dave", weight = 5.0 },
]

[[sources]]
name = "empty"
"#;

    #[test]
    fn test_parse_scenario() {
        let scenario = Scenario::from_toml_str(SCENARIO).unwrap();
        assert_eq!(scenario.contacts, Some(40));
        assert_eq!(scenario.config.rng_seed, Some(3));
        assert_eq!(scenario.operators.len(), 4);
        assert!(!scenario.operators[3].is_active);
        assert_eq!(scenario.sources[0].weights.len(), 4);
        assert!(scenario.sources[1].weights.is_empty());
    }

    #[test]
    fn test_parse_error_is_config_error() {
        let err = Scenario::from_toml_str("operators = 3").unwrap_err();
        assert!(matches!(err, LeadflowError::Config(_)));
    }

    #[tokio::test]
    async fn test_run_respects_weights_and_capacity() {
        let scenario = Scenario::from_toml_str(SCENARIO).unwrap();
        let report = scenario.run(None).await.unwrap();

        assert_eq!(report.contacts_submitted, 40);
        let web = &report.sources[0];
        let empty = &report.sources[1];

        // carol is saturated and dave inactive, so alice takes every web
        // contact; bob has zero weight.
        assert_eq!(report.sources.len(), 2);
        assert_eq!(web.total_contacts, 20);
        let by_name: HashMap<&str, u64> = web
            .operator_distribution
            .iter()
            .map(|share| (share.operator_name.as_str(), share.count))
            .collect();
        assert_eq!(by_name.get("alice"), Some(&20));
        assert_eq!(by_name.get("carol"), None);
        assert_eq!(by_name.get("bob"), None);
        assert_eq!(by_name.get("dave"), None);

        assert_eq!(empty.total_contacts, 20);
        assert_eq!(empty.count_for(None), 20);

        let carol = report
            .operators
            .iter()
            .find(|stats| stats.operator_name == "carol")
            .unwrap();
        assert_eq!(carol.active_contacts_count, 3);
    }

    #[tokio::test]
    async fn test_preloaded_contacts_stay_out_of_source_reports() {
        let raw = r#"
contacts = 10

[[operators]]
name = "alice"
max_load = 100

[[operators]]
name = "carol"
max_load = 5
active_contacts = 5

[[sources]]
name = "web"
weights = [{ operator = "alice", weight = 1.0 }]
"#;
        let scenario = Scenario::from_toml_str(raw).unwrap();
        let report = scenario.run(None).await.unwrap();

        assert_eq!(report.sources.len(), 1);
        let web = &report.sources[0];
        assert_eq!(web.source_name, "web");
        assert_eq!(web.total_contacts, 10);
        assert_eq!(web.operator_distribution.len(), 1);
        assert_eq!(web.operator_distribution[0].operator_name, "alice");
        assert_eq!(web.operator_distribution[0].count, 10);

        let carol = report
            .operators
            .iter()
            .find(|stats| stats.operator_name == "carol")
            .unwrap();
        assert_eq!(carol.active_contacts_count, 5);
        assert_eq!(carol.utilization_percent, 100.0);
    }

    #[tokio::test]
    async fn test_unknown_operator_in_weights_is_rejected() {
        let raw = r#"
[[sources]]
name = "web"
weights = [{ operator = "ghost" }]
"#;
        let scenario = Scenario::from_toml_str(raw).unwrap();
        let err = scenario.run(Some(1)).await.unwrap_err();
        assert!(matches!(err, LeadflowError::Validation(_)));
    }
}
