//! Runtime knobs for a traversal.

use std::time::Duration;

use crate::error::{HierarchyError, Result};

/// Largest page size accepted by the Resource Manager list endpoints.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Default page size for list calls.
pub const DEFAULT_PAGE_SIZE: u32 = 300;

/// Upper bound on one API request, from connect to the last body byte.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Upper bound on establishing a connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Order of `children` and `resources` inside each node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChildOrder {
    /// Keep the order the listing API reported.
    #[default]
    Listing,
    /// Sort children by folder id and resources by project id.
    ById,
}

/// Settings for the tree builder.
#[derive(Debug, Clone, Default)]
pub struct TraversalConfig {
    /// Maximum adapter calls in flight across the whole run. `None` is unbounded.
    pub max_concurrency: Option<usize>,
    pub child_order: ChildOrder,
}

impl TraversalConfig {
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit);
        self
    }

    pub fn with_child_order(mut self, order: ChildOrder) -> Self {
        self.child_order = order;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == Some(0) {
            return Err(HierarchyError::InvalidConfig(
                "max concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Retry schedule for transient adapter failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Never retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Backoff before retry number `attempt` (1-based): `base * 2^(attempt-1)`, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

pub fn validate_page_size(page_size: u32) -> Result<u32> {
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(HierarchyError::InvalidConfig(format!(
            "page size must be between 1 and {}, got {}",
            MAX_PAGE_SIZE, page_size
        )));
    }
    Ok(page_size)
}
