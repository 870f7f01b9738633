//! DataSource trait: external systems that derive one representation from
//! another.
//!
//! The command pipeline calls a data source after a configuration-like
//! representation changes (for example, re-reading table schemas once a
//! cluster URL and credentials are known). Calls are best effort: the
//! engine logs a failure and moves on.

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait DataSource: Send + Sync {
    /// A human-readable name (e.g., "kusto").
    fn name(&self) -> &str;

    /// Produce fresh text for the derived representation from the parsed
    /// configuration object.
    async fn refresh(&self, config: &serde_json::Map<String, serde_json::Value>) -> Result<String>;
}
