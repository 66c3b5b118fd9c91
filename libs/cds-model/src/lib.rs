//! Entity reflection for the OData layer.
//!
//! The model is read from a compiled CSN document (JSON). Only what the
//! query translators and the HTTP surface need is kept: services, entities,
//! their elements, keys, relationships and annotations.

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value as Json;
use thiserror::Error;

mod entity;

pub use entity::{
    is_draft_column, Annotations, Cardinality, CdsType, DefaultOrder, Element, ElementType,
    Entity, PageConfig, DRAFT_COLUMNS,
};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSN document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("definition '{name}' is invalid: {reason}")]
    InvalidDefinition { name: String, reason: String },

    #[error("element '{element}' targets unknown entity '{target}'")]
    UnknownTarget { element: String, target: String },
}

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Clone, Debug, PartialEq)]
pub struct Service {
    pub name: String,
    pub annotations: Annotations,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotations: Annotations::default(),
        }
    }

    pub fn with_annotations(mut self, annotations: Annotations) -> Self {
        self.annotations = annotations;
        self
    }

    /// Roles listed in `@requires` (string or list form).
    pub fn requires(&self) -> Vec<String> {
        requires_of(&self.annotations)
    }

    pub fn page_config(&self) -> PageConfig {
        PageConfig::from_annotations(&self.annotations)
    }
}

fn requires_of(a: &Annotations) -> Vec<String> {
    match a.get("requires") {
        Some(Json::String(s)) => vec![s.clone()],
        Some(Json::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// True when the annotations grant access to anything less than "any caller".
fn restricts(a: &Annotations) -> bool {
    a.has("restrict") || requires_of(a).iter().any(|r| r != "any")
}

#[derive(Deserialize)]
struct RawCsn {
    #[serde(default)]
    definitions: IndexMap<String, RawDefinition>,
}

#[derive(Deserialize)]
struct RawDefinition {
    kind: String,
    #[serde(default)]
    elements: IndexMap<String, RawElement>,
    #[serde(default)]
    params: IndexMap<String, Json>,
    #[serde(flatten)]
    rest: IndexMap<String, Json>,
}

#[derive(Deserialize)]
struct RawElement {
    #[serde(rename = "type")]
    ty: Option<String>,
    #[serde(default)]
    key: bool,
    target: Option<String>,
    cardinality: Option<RawCardinality>,
    elements: Option<IndexMap<String, RawElement>>,
    #[serde(flatten)]
    rest: IndexMap<String, Json>,
}

#[derive(Deserialize)]
struct RawCardinality {
    max: Option<Json>,
}

fn annotations_of(rest: IndexMap<String, Json>) -> Annotations {
    Annotations(rest.into_iter().filter(|(k, _)| k.starts_with('@')).collect())
}

fn build_element(name: &str, raw: RawElement) -> ModelResult<(Element, Vec<Element>)> {
    let annotations = annotations_of(raw.rest);
    let cardinality = match raw.cardinality.and_then(|c| c.max) {
        Some(Json::String(s)) if s == "*" => Cardinality::Many,
        Some(Json::Number(n)) if n.as_u64().is_some_and(|n| n > 1) => Cardinality::Many,
        _ => Cardinality::One,
    };

    let mut flattened = Vec::new();
    let ty = match (raw.ty.as_deref(), raw.elements) {
        (Some("cds.Association"), _) => ElementType::Association,
        (Some("cds.Composition"), _) => ElementType::Composition,
        (_, Some(subs)) => {
            let mut names = Vec::with_capacity(subs.len());
            for (sub_name, sub) in subs {
                let flat_name = format!("{}_{}", name, sub_name);
                let (mut flat, nested) = build_element(&flat_name, sub)?;
                flat.key = false;
                flattened.push(flat);
                flattened.extend(nested);
                names.push(sub_name);
            }
            ElementType::Structured(names)
        }
        (Some(t), None) => ElementType::Primitive(CdsType::from_name(t)),
        (None, None) => {
            return Err(ModelError::InvalidDefinition {
                name: name.to_string(),
                reason: "element has neither a type nor sub-elements".into(),
            })
        }
    };

    if matches!(ty, ElementType::Association | ElementType::Composition) && raw.target.is_none()
    {
        return Err(ModelError::InvalidDefinition {
            name: name.to_string(),
            reason: "relationship without target".into(),
        });
    }

    let element = Element {
        name: name.to_string(),
        ty,
        key: raw.key,
        target: raw.target,
        cardinality,
        annotations,
    };
    Ok((element, flattened))
}

fn add_draft_columns(entity: &mut Entity) {
    let boolean = |name: &str| Element::primitive(name, CdsType::Boolean);
    if !entity.elements.contains_key("IsActiveEntity") {
        let e = boolean("IsActiveEntity").key();
        entity.elements.insert(e.name.clone(), e);
    }
    for name in ["HasActiveEntity", "HasDraftEntity"] {
        if !entity.elements.contains_key(name) {
            entity.elements.insert(name.to_string(), boolean(name));
        }
    }
}

/// Services and entities of one compiled model.
#[derive(Clone, Debug, Default)]
pub struct Model {
    services: IndexMap<String, Service>,
    entities: IndexMap<String, Entity>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service(mut self, service: Service) -> Self {
        self.services.insert(service.name.clone(), service);
        self
    }

    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    pub fn load(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> ModelResult<Self> {
        let csn: RawCsn = serde_json::from_str(raw)?;
        let mut model = Model::new();

        for (name, def) in csn.definitions {
            match def.kind.as_str() {
                "service" => {
                    model.services.insert(
                        name.clone(),
                        Service::new(name).with_annotations(annotations_of(def.rest)),
                    );
                }
                "entity" | "view" => {
                    let mut entity = Entity::new(name.clone())
                        .with_annotations(annotations_of(def.rest));
                    entity.params = def.params.into_keys().collect();
                    for (el_name, raw_el) in def.elements {
                        let (element, flattened) = build_element(&el_name, raw_el)?;
                        entity.elements.insert(el_name, element);
                        for flat in flattened {
                            entity.elements.insert(flat.name.clone(), flat);
                        }
                    }
                    if entity.is_draft_enabled() {
                        add_draft_columns(&mut entity);
                    }
                    model.entities.insert(name, entity);
                }
                other => {
                    tracing::trace!(definition = %name, kind = other, "skipping definition");
                }
            }
        }

        model.validate()?;
        tracing::debug!(
            services = model.services.len(),
            entities = model.entities.len(),
            "model loaded"
        );
        Ok(model)
    }

    fn validate(&self) -> ModelResult<()> {
        for entity in self.entities.values() {
            for element in entity.elements.values() {
                if let Some(target) = &element.target {
                    if !self.entities.contains_key(target) {
                        return Err(ModelError::UnknownTarget {
                            element: format!("{}.{}", entity.name, element.name),
                            target: target.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn services(&self) -> impl Iterator<Item = &Service> {
        self.services.values()
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(name)
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    /// Entity set `set` exposed by `service`.
    pub fn entity_in(&self, service: &str, set: &str) -> Option<&Entity> {
        self.entities.get(&format!("{}.{}", service, set))
    }

    pub fn service_entities<'a>(&'a self, service: &'a str) -> impl Iterator<Item = &'a Entity> {
        self.entities
            .values()
            .filter(move |e| e.namespace() == Some(service))
    }

    /// Target entity of a relationship element.
    pub fn target_of(&self, element: &Element) -> Option<&Entity> {
        element.target.as_deref().and_then(|t| self.entity(t))
    }

    /// True when the service or any of its entities restricts access beyond
    /// "any caller".
    pub fn is_restricted(&self, service: &str) -> bool {
        self.service(service)
            .is_some_and(|s| restricts(&s.annotations))
            || self
                .service_entities(service)
                .any(|e| restricts(&e.annotations))
    }
}
