//! Gateway 应用状态

use reqwest::Client;
use std::sync::Arc;

use crate::config::Config;
use crate::trace::{Observer, TracingObserver};
use crate::utils::get_shared_client;

/// Gateway 应用状态
///
/// 启动时构造一次，之后只读；请求之间不共享可变状态
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    observer: Arc<dyn Observer>,
    client: Client,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    pub fn with_observer(config: Config, observer: Arc<dyn Observer>) -> Self {
        Self {
            config: Arc::new(config),
            observer,
            client: get_shared_client().clone(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn observer(&self) -> Arc<dyn Observer> {
        Arc::clone(&self.observer)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}
