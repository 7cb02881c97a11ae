use std::sync::Arc;

use naiade_core::{
    Authenticator, Config, JobQueue, PhotoDispatcher, SanitizedConfig, TaskScheduler, TaskStore,
};

use crate::api::WsBroadcaster;

/// Shared application state
pub struct AppState {
    config: Config,
    photo_auth: Arc<dyn Authenticator>,
    ticket_auth: Arc<dyn Authenticator>,
    tasks: Arc<dyn TaskStore>,
    queue: Arc<dyn JobQueue>,
    scheduler: Arc<dyn TaskScheduler>,
    dispatcher: Arc<PhotoDispatcher>,
    broadcaster: WsBroadcaster,
}

/// Everything [`AppState`] holds besides the configuration.
pub struct AppServices {
    pub photo_auth: Arc<dyn Authenticator>,
    pub ticket_auth: Arc<dyn Authenticator>,
    pub tasks: Arc<dyn TaskStore>,
    pub queue: Arc<dyn JobQueue>,
    pub scheduler: Arc<dyn TaskScheduler>,
    pub dispatcher: Arc<PhotoDispatcher>,
    pub broadcaster: WsBroadcaster,
}

impl AppState {
    pub fn new(config: Config, services: AppServices) -> Self {
        Self {
            config,
            photo_auth: services.photo_auth,
            ticket_auth: services.ticket_auth,
            tasks: services.tasks,
            queue: services.queue,
            scheduler: services.scheduler,
            dispatcher: services.dispatcher,
            broadcaster: services.broadcaster,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    /// Checks single-photo requests, over HTTP and WebSocket.
    pub fn photo_auth(&self) -> &dyn Authenticator {
        self.photo_auth.as_ref()
    }

    pub fn ticket_auth(&self) -> &dyn Authenticator {
        self.ticket_auth.as_ref()
    }

    pub fn tasks(&self) -> &dyn TaskStore {
        self.tasks.as_ref()
    }

    pub fn queue(&self) -> &dyn JobQueue {
        self.queue.as_ref()
    }

    pub fn scheduler(&self) -> &dyn TaskScheduler {
        self.scheduler.as_ref()
    }

    pub fn dispatcher(&self) -> &PhotoDispatcher {
        &self.dispatcher
    }

    pub fn broadcaster(&self) -> &WsBroadcaster {
        &self.broadcaster
    }
}
