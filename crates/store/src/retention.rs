use std::time::Duration;

use chrono::{DateTime, Utc};
use tracelens_core::error::{EngineError, Result};

use crate::Store;

impl Store {
    /// Drops spans and logs older than `ttl` and rebuilds the indexes.
    /// Pruning may leave logs pointing at evicted spans/traces; those weak
    /// references stay queryable and resolve to "unknown".
    pub fn run_retention(&self, ttl: Duration) -> Result<usize> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(ttl)
                .map_err(|e| EngineError::Internal(format!("ttl conversion failed: {e}")))?;
        Ok(self.prune_older_than(cutoff))
    }

    /// Removes spans whose `end_time` and logs whose `timestamp` precede
    /// `cutoff`. Returns the number of records dropped.
    pub fn prune_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let mut inner = self.write();
        let before = inner.spans.len() + inner.logs.len();

        inner.spans.retain(|s| s.end_time >= cutoff);
        inner.logs.retain(|l| l.timestamp >= cutoff);
        inner.rebuild_indexes();

        let pruned = before - (inner.spans.len() + inner.logs.len());
        if pruned > 0 {
            tracing::debug!(pruned, "retention pass dropped old records");
        }
        pruned
    }
}
