use std::path::PathBuf;
use std::time::Duration;

use cds_model::PageConfig;

/// Default request body limit: 16 MiB.
pub const DEFAULT_BODY_LIMIT: usize = 16 * 1024 * 1024;

/// Settings of the HTTP surface, resolved by the binary from its config file.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Server-wide page sizing, used when neither entity nor service declare one.
    pub page_defaults: PageConfig,
    /// Directory served as router fallback; `None` disables static assets.
    pub static_dir: Option<PathBuf>,
    pub request_timeout: Duration,
    pub body_limit: usize,
    pub cors_enabled: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            page_defaults: PageConfig::default(),
            static_dir: None,
            request_timeout: Duration::from_secs(30),
            body_limit: DEFAULT_BODY_LIMIT,
            cors_enabled: false,
        }
    }
}

impl ServiceSettings {
    pub fn with_page_defaults(mut self, page_defaults: PageConfig) -> Self {
        self.page_defaults = page_defaults;
        self
    }

    pub fn with_static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
