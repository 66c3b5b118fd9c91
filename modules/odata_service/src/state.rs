use std::sync::Arc;

use cds_auth::{select_strategies, AuthConfig, AuthError, AuthStrategy, Authenticator, Environment, Selection};
use cds_model::{Model, Service};
use indexmap::IndexMap;

use crate::actions::ActionRegistry;
use crate::config::ServiceSettings;
use crate::executor::QueryExecutor;

/// One service of the model as it is exposed over HTTP.
#[derive(Debug, Clone)]
pub struct MountedService {
    pub name: String,
    pub authenticator: Authenticator,
    /// The service or one of its entities declares access restrictions.
    pub restricted: bool,
    /// `@requires` roles checked after authentication.
    pub requires: Vec<String>,
}

/// Shared, read-only request state.
pub struct AppState {
    pub model: Arc<Model>,
    pub settings: ServiceSettings,
    pub executor: Arc<dyn QueryExecutor>,
    pub actions: ActionRegistry,
    services: IndexMap<String, MountedService>,
}

impl AppState {
    /// Mount every service of `model` without authentication.
    pub fn new(model: Arc<Model>, settings: ServiceSettings, executor: Arc<dyn QueryExecutor>) -> Self {
        let services = model
            .services()
            .map(|s| {
                let mounted = MountedService {
                    name: s.name.clone(),
                    authenticator: Selection::Unauthenticated.into_authenticator(),
                    restricted: model.is_restricted(&s.name),
                    requires: s.requires(),
                };
                (s.name.clone(), mounted)
            })
            .collect();
        Self {
            model,
            settings,
            executor,
            actions: ActionRegistry::default(),
            services,
        }
    }

    /// Select authentication strategies for every mounted service. A broken
    /// `auth` section fails here, before the server accepts requests.
    pub fn with_auth(
        mut self,
        config: &AuthConfig,
        env: Environment,
        custom: Option<Arc<dyn AuthStrategy>>,
    ) -> Result<Self, AuthError> {
        for mounted in self.services.values_mut() {
            let restricted = mounted.restricted;
            let selection = select_strategies(config, restricted, env, custom.clone())?;
            tracing::info!(
                service = %mounted.name,
                restricted,
                strategies = ?selection.names(),
                "mounted service"
            );
            mounted.authenticator = selection.into_authenticator();
        }
        Ok(self)
    }

    pub fn with_actions(mut self, actions: ActionRegistry) -> Self {
        self.actions = actions;
        self
    }

    pub fn mounted(&self, name: &str) -> Option<&MountedService> {
        self.services.get(name)
    }

    pub fn mounted_services(&self) -> impl Iterator<Item = &MountedService> {
        self.services.values()
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.model.service(name)
    }
}
