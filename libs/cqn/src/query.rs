use serde::{Deserialize, Serialize};

use crate::token::Token;
use crate::value::DataValue;

/// Target of a query: a fully qualified entity name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(rename = "ref")]
    pub path: Vec<String>,
}

impl EntityRef {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            path: vec![entity.into()],
        }
    }

    pub fn name(&self) -> &str {
        self.path.first().map(String::as_str).unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Column {
    Ref {
        #[serde(rename = "ref")]
        path: Vec<String>,
    },
    Func {
        func: String,
        #[serde(default)]
        args: Vec<Token>,
        #[serde(rename = "as", default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
    },
}

impl Column {
    pub fn name(name: impl Into<String>) -> Self {
        Column::Ref {
            path: vec![name.into()],
        }
    }

    /// `count(*) as $count`
    pub fn count() -> Self {
        Column::Func {
            func: "count".into(),
            args: vec![Token::reference(["*"])],
            alias: Some(COUNT_ALIAS.into()),
        }
    }

    /// Single-segment column name; `None` for paths and functions.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Column::Ref { path } if path.len() == 1 => Some(path[0].as_str()),
            _ => None,
        }
    }
}

pub const COUNT_ALIAS: &str = "$count";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sort {
    #[default]
    Asc,
    Desc,
}

/// One order term: an expression (usually a `{ref}`) plus direction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    #[serde(flatten)]
    pub expr: Token,
    #[serde(default)]
    pub sort: Sort,
}

impl OrderBy {
    pub fn new(expr: Token, sort: Sort) -> Self {
        Self { expr, sort }
    }

    pub fn column(name: impl Into<String>, sort: Sort) -> Self {
        Self::new(Token::reference([name.into()]), sort)
    }

    /// Column name when the term is a single-segment reference.
    pub fn as_column(&self) -> Option<&str> {
        match self.expr.ref_path() {
            Some([single]) => Some(single.as_str()),
            _ => None,
        }
    }
}

/// Page window. `rows: None` means no row limit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u64>,
    #[serde(default)]
    pub offset: u64,
}

impl Limit {
    pub fn new(rows: Option<u64>, offset: u64) -> Self {
        Self { rows, offset }
    }

    pub fn is_unbounded(&self) -> bool {
        self.rows.is_none() && self.offset == 0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Select {
    pub from: EntityRef,
    /// `None` selects all columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<Column>>,
    #[serde(rename = "where", default, skip_serializing_if = "Vec::is_empty")]
    pub where_: Vec<Token>,
    #[serde(rename = "orderBy", default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<Limit>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub one: bool,
}

impl Select {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            from: EntityRef::new(entity),
            columns: None,
            where_: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            one: false,
        }
    }

    pub fn with_columns(mut self, columns: Option<Vec<Column>>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_where(mut self, tokens: Vec<Token>) -> Self {
        self.where_ = tokens;
        self
    }

    pub fn with_order_by(mut self, order_by: Vec<OrderBy>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn with_limit(mut self, limit: Limit) -> Self {
        self.limit = (!limit.is_unbounded()).then_some(limit);
        self
    }

    pub fn one(mut self) -> Self {
        self.one = true;
        self
    }

    /// Same source and filter, counting rows instead of reading them.
    pub fn to_count(&self) -> Select {
        Select::new(self.from.name())
            .with_columns(Some(vec![Column::count()]))
            .with_where(self.where_.clone())
    }

    pub fn is_count(&self) -> bool {
        matches!(self.columns.as_deref(), Some([Column::Func { alias: Some(a), .. }]) if a == COUNT_ALIAS)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Insert {
    pub into: EntityRef,
    pub entries: Vec<DataValue>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub entity: EntityRef,
    pub data: DataValue,
    #[serde(rename = "where", default, skip_serializing_if = "Vec::is_empty")]
    pub where_: Vec<Token>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Delete {
    pub from: EntityRef,
    #[serde(rename = "where", default, skip_serializing_if = "Vec::is_empty")]
    pub where_: Vec<Token>,
}

/// A uniform query object, serialized with its verb as the root key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Query {
    #[serde(rename = "SELECT")]
    Select(Select),
    #[serde(rename = "INSERT")]
    Insert(Insert),
    #[serde(rename = "UPDATE")]
    Update(Update),
    #[serde(rename = "DELETE")]
    Delete(Delete),
}

impl Query {
    pub fn kind(&self) -> &'static str {
        match self {
            Query::Select(_) => "SELECT",
            Query::Insert(_) => "INSERT",
            Query::Update(_) => "UPDATE",
            Query::Delete(_) => "DELETE",
        }
    }

    pub fn entity(&self) -> &str {
        match self {
            Query::Select(q) => q.from.name(),
            Query::Insert(q) => q.into.name(),
            Query::Update(q) => q.entity.name(),
            Query::Delete(q) => q.from.name(),
        }
    }

    pub fn as_select(&self) -> Option<&Select> {
        match self {
            Query::Select(q) => Some(q),
            _ => None,
        }
    }
}

impl From<Select> for Query {
    fn from(q: Select) -> Self {
        Query::Select(q)
    }
}

impl From<Insert> for Query {
    fn from(q: Insert) -> Self {
        Query::Insert(q)
    }
}

impl From<Update> for Query {
    fn from(q: Update) -> Self {
        Query::Update(q)
    }
}

impl From<Delete> for Query {
    fn from(q: Delete) -> Self {
        Query::Delete(q)
    }
}
