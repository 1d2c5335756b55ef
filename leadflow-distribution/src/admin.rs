//! Administrative helpers that fill in configured defaults.
//!
//! Operators and weight rows are otherwise managed directly through the
//! store; these helpers only apply `default_max_load` and `default_weight`
//! and reject empty names.

use leadflow_core::{
    DistributionConfig, LeadflowResult, Operator, OperatorId, Source, SourceId,
    SourceOperatorWeight, ValidationError,
};
use leadflow_storage::DistributionStore;

/// Create an active operator, using the configured capacity when none is given.
pub async fn create_operator<S>(
    store: &S,
    config: &DistributionConfig,
    name: &str,
    max_load: Option<u32>,
) -> LeadflowResult<Operator>
where
    S: DistributionStore + ?Sized,
{
    require_name(name)?;
    let operator = Operator::new(name, max_load.unwrap_or(config.default_max_load));
    store.insert_operator(&operator).await?;
    Ok(operator)
}

/// Create a source.
pub async fn create_source<S>(
    store: &S,
    name: &str,
    description: Option<&str>,
) -> LeadflowResult<Source>
where
    S: DistributionStore + ?Sized,
{
    require_name(name)?;
    let mut source = Source::new(name);
    if let Some(description) = description {
        source = source.with_description(description);
    }
    store.insert_source(&source).await?;
    Ok(source)
}

/// Link an operator to a source, using the configured weight when none is given.
pub async fn link_operator<S>(
    store: &S,
    config: &DistributionConfig,
    source_id: SourceId,
    operator_id: OperatorId,
    weight: Option<f64>,
) -> LeadflowResult<SourceOperatorWeight>
where
    S: DistributionStore + ?Sized,
{
    store
        .add_source_operator(source_id, operator_id, weight.unwrap_or(config.default_weight))
        .await
}

fn require_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "name".to_string(),
        });
    }
    Ok(())
}
