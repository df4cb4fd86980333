use std::time::Duration;

/// Engine tuning knobs.
///
/// Every field has a sensible default; [`EngineConfig::from_env`] lets
/// deployments override them without recompiling. Values are read once at
/// construction, not live.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Per-node wall-clock budget. A handler that exceeds it is treated as a
    /// failed node, not a hung run.
    pub node_timeout: Duration,
    /// Number of concurrent blocking SDK calls allowed on the shared pool.
    pub blocking_pool_size: usize,
    /// How deep sub-workflow nesting may go before the invoking node errors.
    pub max_sub_workflow_depth: u32,
    /// Upper bound on node invocations per run. Published graphs are
    /// cycle-free, so this only trips on unvalidated drafts.
    pub max_steps: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            node_timeout: Duration::from_secs(30),
            blocking_pool_size: 8,
            max_sub_workflow_depth: 4,
            max_steps: 256,
        }
    }
}

impl EngineConfig {
    /// Build a config from the environment, falling back to defaults.
    ///
    /// Reads `.env` via dotenvy first, then the process environment:
    /// `FLOWLOOM_NODE_TIMEOUT_SECS`, `FLOWLOOM_BLOCKING_POOL_SIZE`,
    /// `FLOWLOOM_MAX_SUBWORKFLOW_DEPTH`, `FLOWLOOM_MAX_STEPS`.
    /// Unparseable values fall back to the default for that knob.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        Self {
            node_timeout: env_parse("FLOWLOOM_NODE_TIMEOUT_SECS")
                .map_or(defaults.node_timeout, Duration::from_secs),
            blocking_pool_size: env_parse("FLOWLOOM_BLOCKING_POOL_SIZE")
                .unwrap_or(defaults.blocking_pool_size),
            max_sub_workflow_depth: env_parse("FLOWLOOM_MAX_SUBWORKFLOW_DEPTH")
                .unwrap_or(defaults.max_sub_workflow_depth),
            max_steps: env_parse("FLOWLOOM_MAX_STEPS").unwrap_or(defaults.max_steps),
        }
    }

    #[must_use]
    pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_blocking_pool_size(mut self, size: usize) -> Self {
        self.blocking_pool_size = size.max(1);
        self
    }

    #[must_use]
    pub fn with_max_sub_workflow_depth(mut self, depth: u32) -> Self {
        self.max_sub_workflow_depth = depth;
        self
    }

    #[must_use]
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|raw| raw.parse().ok())
}
