// Application state module
// Shared, read-only state handed to every connection task

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use super::types::Config;
use crate::icon::{HttpFetcher, IconRouter};

/// Application state
pub struct AppState {
    pub config: Config,
    /// One router and one upstream connection pool per process
    pub icons: IconRouter<HttpFetcher>,

    // Cached config values for fast access without locks
    pub cached_access_log: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let fetcher = HttpFetcher::new(&config.upstream.user_agent)?;
        Ok(Self {
            config: config.clone(),
            icons: IconRouter::new(fetcher, &config.upstream.cdn_root),
            cached_access_log: Arc::new(AtomicBool::new(config.logging.access_log)),
        })
    }
}
