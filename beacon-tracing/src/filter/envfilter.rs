// std
use std::collections::BTreeMap;
// crates
use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;
// internal

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvFilterConfig {
    /// Target (crate or module path) to level, e.g. `beacon_ledger: trace`.
    /// See the `EnvFilter` directive syntax.
    pub filters: BTreeMap<String, String>,
}

impl EnvFilterConfig {
    pub fn directives(&self) -> String {
        self.filters
            .iter()
            .map(|(target, level)| format!("{target}={level}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

pub fn create_envfilter_layer(config: &EnvFilterConfig) -> Result<EnvFilter, ParseError> {
    EnvFilter::try_new(config.directives())
}
