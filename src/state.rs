use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::engine::coordinator::AssignmentCoordinator;
use crate::notify::mobile_push::MobilePushChannel;
use crate::notify::web_push::WebPushChannel;
use crate::notify::{NotificationDispatcher, PushChannel};
use crate::observability::metrics::Metrics;
use crate::realtime::SessionRegistry;
use crate::routing::RouteService;
use crate::store::{DataStore, MemoryStore};

pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub sessions: Arc<SessionRegistry>,
    pub coordinator: Arc<AssignmentCoordinator>,
    pub routes: Arc<RouteService>,
    pub metrics: Metrics,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let timeout = config.provider_timeout();
        let channels: Vec<Arc<dyn PushChannel>> = vec![
            Arc::new(WebPushChannel::from_config(config.web_push.as_ref(), timeout)),
            Arc::new(MobilePushChannel::from_config(config.mobile_push.as_ref(), timeout)),
        ];
        let metrics = Metrics::new();
        let routes = Arc::new(RouteService::from_config(&config.routing, timeout, metrics.clone()));

        Self::assemble(config, Arc::new(MemoryStore::new()), channels, routes, metrics)
    }

    /// Wires the services around caller-supplied collaborators.
    pub fn with_parts(
        config: Config,
        store: Arc<MemoryStore>,
        channels: Vec<Arc<dyn PushChannel>>,
        routes: RouteService,
        metrics: Metrics,
    ) -> Self {
        Self::assemble(config, store, channels, Arc::new(routes), metrics)
    }

    fn assemble(
        config: Config,
        store: Arc<MemoryStore>,
        channels: Vec<Arc<dyn PushChannel>>,
        routes: Arc<RouteService>,
        metrics: Metrics,
    ) -> Self {
        let data: Arc<dyn DataStore> = store.clone();
        let sessions = Arc::new(SessionRegistry::new(data.clone(), metrics.clone()));
        let notifier = Arc::new(NotificationDispatcher::new(
            data.clone(),
            sessions.clone(),
            channels,
            config.push_retry_attempts,
            config.provider_timeout(),
            metrics.clone(),
        ));
        let coordinator = Arc::new(AssignmentCoordinator::new(
            data,
            sessions.clone(),
            notifier,
            routes.clone(),
            config.offer.clone(),
            metrics.clone(),
        ));

        Self {
            store,
            sessions,
            coordinator,
            routes,
            metrics,
            config,
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.config.heartbeat_interval_secs.max(1))
    }

    pub fn offer_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.config.offer_sweep_interval_secs.max(1))
    }
}
