use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::{EngineError, Result};

/// Cooperative cancellation for scanning queries: a deadline, a caller-held
/// abort flag, or both. Scans check it periodically and abort with
/// `Cancelled` instead of returning a partial result as if it were complete.
#[derive(Debug, Clone)]
pub struct Cancel {
    deadline: Option<Instant>,
    flag: Arc<AtomicBool>,
}

impl Cancel {
    pub fn never() -> Self {
        Self {
            deadline: None,
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn after(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle the caller keeps to abort the query from another thread/task.
    pub fn handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.flag))
    }

    pub fn check(&self) -> Result<()> {
        if self.flag.load(Ordering::Relaxed) {
            return Err(EngineError::Cancelled("query aborted by caller".to_string()));
        }
        if let Some(deadline) = self.deadline
            && Instant::now() >= deadline
        {
            return Err(EngineError::Cancelled("query deadline exceeded".to_string()));
        }
        Ok(())
    }

    /// Per-scan ticker: checks the flag/deadline once every `interval`
    /// records so tight loops do not pay an Instant::now per record.
    pub fn ticker(&self, interval: u32) -> CancelTicker<'_> {
        CancelTicker {
            cancel: self,
            interval: interval.max(1),
            count: 0,
        }
    }
}

impl Default for Cancel {
    fn default() -> Self {
        Self::never()
    }
}

#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

pub struct CancelTicker<'a> {
    cancel: &'a Cancel,
    interval: u32,
    count: u32,
}

impl CancelTicker<'_> {
    pub fn tick(&mut self) -> Result<()> {
        self.count += 1;
        if self.count >= self.interval {
            self.count = 0;
            self.cancel.check()?;
        }
        Ok(())
    }
}
