// Feature flag collaborator
//
// The host owns the flag store; the executor only asks whether a flag is on.

use async_trait::async_trait;
use std::collections::HashSet;

#[async_trait]
pub trait FeatureFlags: Send + Sync {
    async fn is_enabled(&self, flag_id: i64) -> bool;
}

/// Fixed set of enabled flag ids
#[derive(Debug, Clone, Default)]
pub struct StaticFlags {
    enabled: HashSet<i64>,
}

impl StaticFlags {
    pub fn new(enabled: impl IntoIterator<Item = i64>) -> Self {
        Self {
            enabled: enabled.into_iter().collect(),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn enable(mut self, flag_id: i64) -> Self {
        self.enabled.insert(flag_id);
        self
    }
}

#[async_trait]
impl FeatureFlags for StaticFlags {
    async fn is_enabled(&self, flag_id: i64) -> bool {
        self.enabled.contains(&flag_id)
    }
}
