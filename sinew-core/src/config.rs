//! Runtime configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::reactive::SchedulerKind;

/// Default cap on changes processed by one flush.
pub const DEFAULT_MAX_FLUSH_CHANGES: usize = 10_000;

/// Settings for a [`Runtime`](crate::reactive::Runtime).
///
/// Missing fields take their defaults:
///
/// ```
/// use sinew_core::{RuntimeConfig, SchedulerKind};
///
/// let config = RuntimeConfig::from_json(r#"{ "scheduler": "tokio_local" }"#).unwrap();
/// assert_eq!(config.scheduler, SchedulerKind::TokioLocal);
/// assert_eq!(config.max_flush_changes, 10_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Changes one flush may process before it gives up. Writes made by hook
    /// callbacks during a flush count too, so this bounds feedback loops.
    pub max_flush_changes: usize,

    /// How flushes are deferred.
    pub scheduler: SchedulerKind,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_flush_changes: DEFAULT_MAX_FLUSH_CHANGES,
            scheduler: SchedulerKind::default(),
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_flush_changes == 0 {
            return Err(Error::Config("max_flush_changes must be positive".into()));
        }
        Ok(())
    }
}
