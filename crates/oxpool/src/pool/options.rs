/// Pool configuration.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Name used in log output.
    pub label: String,
    /// Upper bound on idle resources kept per descriptor. A return into a
    /// full bucket releases the resource instead. `None` keeps everything.
    pub max_free_per_descriptor: Option<usize>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            label: "pool".to_string(),
            max_free_per_descriptor: None,
        }
    }
}

impl PoolOptions {
    pub fn labeled(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }
}

/// Snapshot of pool bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Idle resources across all buckets.
    pub free: usize,
    /// Resources currently leased out.
    pub reserved: usize,
    /// Non-empty free buckets.
    pub buckets: usize,
    /// Factory calls that succeeded over the pool's lifetime.
    pub created: u64,
    /// Release callback invocations over the pool's lifetime.
    pub released: u64,
}
