use std::sync::Arc;

use crate::{config::RelayConfig, metrics::RelayMetrics, upstream::ChatUpstream};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub upstream: Arc<dyn ChatUpstream>,
    pub metrics: Arc<RelayMetrics>,
}

impl AppState {
    pub fn new<U>(config: RelayConfig, upstream: Arc<U>) -> Self
    where
        U: ChatUpstream + 'static,
    {
        let upstream: Arc<dyn ChatUpstream> = upstream;
        Self {
            config: Arc::new(config),
            upstream,
            metrics: Arc::new(RelayMetrics::new()),
        }
    }
}
