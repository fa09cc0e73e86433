use serde::{Deserialize, Serialize};

const fn default_workers() -> usize {
    4
}

/// Run-level scheduling settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    /// Tables processed concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}
