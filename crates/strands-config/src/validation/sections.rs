//! Per-section validators: model, agent, retry.

use crate::schema::{ProviderKind, StrandsConfig};

use super::helpers::{validate_not_blank, validate_range, validate_range_f64};

pub(crate) fn validate_model(errors: &mut Vec<String>, config: &StrandsConfig) {
    let model = &config.model;
    validate_not_blank(errors, "model.model_id", &model.model_id);
    if model.provider == ProviderKind::Bedrock {
        validate_not_blank(errors, "model.region", &model.region);
    }
    validate_range(errors, "model.max_tokens", model.max_tokens.into(), 1, 65_536);
    validate_range_f64(errors, "model.temperature", model.temperature, 0.0, 1.0);
}

pub(crate) fn validate_agent(errors: &mut Vec<String>, config: &StrandsConfig) {
    validate_range(
        errors,
        "agent.max_tool_rounds",
        config.agent.max_tool_rounds.into(),
        1,
        64,
    );

    let mut seen = std::collections::HashSet::new();
    for name in &config.agent.tools {
        if !seen.insert(name.as_str()) {
            errors.push(format!("agent.tools lists '{name}' more than once"));
        }
    }
}

pub(crate) fn validate_retry(errors: &mut Vec<String>, config: &StrandsConfig) {
    let retry = &config.retry;
    validate_range(errors, "retry.max_attempts", retry.max_attempts.into(), 1, 10);
    validate_range(errors, "retry.base_delay_ms", retry.base_delay_ms, 0, 60_000);
    validate_range(
        errors,
        "retry.request_timeout_secs",
        retry.request_timeout_secs,
        1,
        900,
    );
    if retry.max_delay_ms < retry.base_delay_ms {
        errors.push(format!(
            "retry.max_delay_ms = {} is below retry.base_delay_ms = {}",
            retry.max_delay_ms, retry.base_delay_ms
        ));
    }
}
