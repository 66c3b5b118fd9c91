use cds_model::{Entity, Model, PageConfig, Service};

/// Everything a translator may consult besides the request itself.
///
/// Environment-dependent settings are passed in explicitly; translators never
/// read process-wide state.
#[derive(Clone, Copy, Debug)]
pub struct TranslationContext<'a> {
    pub model: &'a Model,
    pub entity: &'a Entity,
    pub service: Option<&'a Service>,
    /// Global page sizing from the server configuration.
    pub defaults: PageConfig,
}

impl<'a> TranslationContext<'a> {
    pub fn new(model: &'a Model, entity: &'a Entity) -> Self {
        Self {
            model,
            entity,
            service: None,
            defaults: PageConfig::default(),
        }
    }

    pub fn with_service(mut self, service: &'a Service) -> Self {
        self.service = Some(service);
        self
    }

    pub fn with_defaults(mut self, defaults: PageConfig) -> Self {
        self.defaults = defaults;
        self
    }

    /// Effective page sizing: entity annotations, then service annotations,
    /// then global settings. Parameterized entities are never paged by the
    /// server.
    pub fn page_config(&self) -> PageConfig {
        if self.entity.is_parameterized() {
            return PageConfig::default();
        }
        let service = self.service.map(Service::page_config).unwrap_or_default();
        self.entity.page_config().or(service).or(self.defaults)
    }
}
