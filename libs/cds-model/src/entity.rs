use indexmap::IndexMap;
use serde_json::Value as Json;

/// Synthetic columns maintained by the draft feature. Never used for
/// implicit ordering.
pub const DRAFT_COLUMNS: &[&str] = &[
    "IsActiveEntity",
    "HasActiveEntity",
    "HasDraftEntity",
    "DraftAdministrativeData",
    "DraftAdministrativeData_DraftUUID",
];

pub fn is_draft_column(name: &str) -> bool {
    DRAFT_COLUMNS.contains(&name)
}

/// `@`-prefixed annotations of a definition or element, keyed with the `@`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Annotations(pub(crate) IndexMap<String, Json>);

impl Annotations {
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Json)>,
        K: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| {
                    let k = k.into();
                    if k.starts_with('@') {
                        (k, v)
                    } else {
                        (format!("@{}", k), v)
                    }
                })
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&Json> {
        let name = name.strip_prefix('@').unwrap_or(name);
        self.0.get(&format!("@{}", name))
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn flag(&self, name: &str) -> bool {
        matches!(self.get(name), Some(Json::Bool(true)))
    }

    pub fn u64(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(Json::as_u64)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Json)> {
        self.0.iter()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CdsType {
    String,
    LargeString,
    Integer,
    Integer64,
    Decimal,
    Double,
    Boolean,
    Uuid,
    Date,
    Time,
    DateTime,
    Timestamp,
    Binary,
    LargeBinary,
    Other(String),
}

impl CdsType {
    pub fn from_name(name: &str) -> Self {
        match name.strip_prefix("cds.").unwrap_or(name) {
            "String" => CdsType::String,
            "LargeString" => CdsType::LargeString,
            "Integer" | "Int16" | "Int32" | "UInt8" => CdsType::Integer,
            "Integer64" | "Int64" => CdsType::Integer64,
            "Decimal" | "DecimalFloat" => CdsType::Decimal,
            "Double" => CdsType::Double,
            "Boolean" => CdsType::Boolean,
            "UUID" => CdsType::Uuid,
            "Date" => CdsType::Date,
            "Time" => CdsType::Time,
            "DateTime" => CdsType::DateTime,
            "Timestamp" => CdsType::Timestamp,
            "Binary" => CdsType::Binary,
            "LargeBinary" => CdsType::LargeBinary,
            _ => CdsType::Other(name.to_string()),
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, CdsType::Binary | CdsType::LargeBinary)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ElementType {
    Primitive(CdsType),
    Association,
    Composition,
    /// Inline structured type; holds its sub-element names. The entity also
    /// declares the flattened `parent_child` elements.
    Structured(Vec<String>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Cardinality {
    #[default]
    One,
    Many,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    pub name: String,
    pub ty: ElementType,
    pub key: bool,
    /// Target entity of an association or composition.
    pub target: Option<String>,
    pub cardinality: Cardinality,
    pub annotations: Annotations,
}

impl Element {
    pub fn primitive(name: impl Into<String>, ty: CdsType) -> Self {
        Self {
            name: name.into(),
            ty: ElementType::Primitive(ty),
            key: false,
            target: None,
            cardinality: Cardinality::One,
            annotations: Annotations::default(),
        }
    }

    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }

    pub fn is_relationship(&self) -> bool {
        matches!(self.ty, ElementType::Association | ElementType::Composition)
    }

    pub fn is_composition(&self) -> bool {
        matches!(self.ty, ElementType::Composition)
    }

    pub fn is_association(&self) -> bool {
        matches!(self.ty, ElementType::Association)
    }

    pub fn is_structured(&self) -> bool {
        matches!(self.ty, ElementType::Structured(_))
    }

    pub fn is_to_one(&self) -> bool {
        self.is_relationship() && self.cardinality == Cardinality::One
    }

    pub fn is_to_many(&self) -> bool {
        self.is_relationship() && self.cardinality == Cardinality::Many
    }

    pub fn is_binary(&self) -> bool {
        matches!(&self.ty, ElementType::Primitive(t) if t.is_binary())
    }

    /// Concurrency-control token (`@odata.etag`).
    pub fn is_etag(&self) -> bool {
        self.annotations.flag("odata.etag")
    }
}

/// Server-side page sizing; `None` means unlimited.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageConfig {
    pub default_page_size: Option<u64>,
    pub max_page_size: Option<u64>,
}

impl PageConfig {
    pub fn new(default_page_size: Option<u64>, max_page_size: Option<u64>) -> Self {
        Self {
            default_page_size,
            max_page_size,
        }
    }

    /// Fill unset values from `fallback`.
    pub fn or(self, fallback: PageConfig) -> PageConfig {
        PageConfig {
            default_page_size: self.default_page_size.or(fallback.default_page_size),
            max_page_size: self.max_page_size.or(fallback.max_page_size),
        }
    }

    pub(crate) fn from_annotations(a: &Annotations) -> Self {
        let mut cfg = PageConfig {
            default_page_size: a.u64("cds.query.limit.default"),
            max_page_size: a.u64("cds.query.limit.max"),
        };
        match a.get("cds.query.limit") {
            Some(Json::Object(obj)) => {
                cfg.default_page_size = cfg
                    .default_page_size
                    .or_else(|| obj.get("default").and_then(Json::as_u64));
                cfg.max_page_size = cfg
                    .max_page_size
                    .or_else(|| obj.get("max").and_then(Json::as_u64));
            }
            Some(v) => {
                cfg.default_page_size = cfg.default_page_size.or_else(|| v.as_u64());
            }
            None => {}
        }
        cfg
    }
}

/// One entry of a declared default order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DefaultOrder {
    pub column: String,
    pub desc: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    /// Fully qualified name, e.g. `CatalogService.Books`.
    pub name: String,
    pub elements: IndexMap<String, Element>,
    pub annotations: Annotations,
    /// Declared parameters of a parameterized view.
    pub params: Vec<String>,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            elements: IndexMap::new(),
            annotations: Annotations::default(),
            params: Vec::new(),
        }
    }

    pub fn with_element(mut self, element: Element) -> Self {
        self.elements.insert(element.name.clone(), element);
        self
    }

    pub fn with_annotations(mut self, annotations: Annotations) -> Self {
        self.annotations = annotations;
        self
    }

    /// Name without its service namespace: `Books` for `CatalogService.Books`.
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.name.rsplit_once('.').map(|(ns, _)| ns)
    }

    pub fn element(&self, name: &str) -> Option<&Element> {
        self.elements.get(name)
    }

    /// Primary-key elements in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &Element> {
        self.elements
            .values()
            .filter(|e| e.key && !e.is_relationship())
    }

    pub fn key_names(&self) -> Vec<&str> {
        self.keys().map(|e| e.name.as_str()).collect()
    }

    pub fn etag_elements(&self) -> impl Iterator<Item = &Element> {
        self.elements.values().filter(|e| e.is_etag())
    }

    pub fn is_parameterized(&self) -> bool {
        !self.params.is_empty()
    }

    pub fn is_draft_enabled(&self) -> bool {
        self.annotations.flag("odata.draft.enabled")
    }

    pub fn page_config(&self) -> PageConfig {
        PageConfig::from_annotations(&self.annotations)
    }

    /// Declared default order (`@cds.default.order` or `@odata.default.order`).
    pub fn default_order(&self) -> Vec<DefaultOrder> {
        let raw = self
            .annotations
            .get("cds.default.order")
            .or_else(|| self.annotations.get("odata.default.order"));
        let Some(Json::Array(items)) = raw else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| {
                let by = item.get("by")?;
                let column = match by {
                    Json::String(s) => s.clone(),
                    Json::Object(o) => o.get("=")?.as_str()?.to_string(),
                    _ => return None,
                };
                let desc = item.get("desc").and_then(Json::as_bool).unwrap_or(false);
                Some(DefaultOrder { column, desc })
            })
            .collect()
    }
}
