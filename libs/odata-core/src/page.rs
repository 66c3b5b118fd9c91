use serde::{Deserialize, Serialize};

/// OData v4 collection response body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(rename = "@odata.context", skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(rename = "@odata.count", skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink", skip_serializing_if = "Option::is_none")]
    pub next_link: Option<String>,
}

impl<T> Page<T> {
    /// Create a page holding only items
    pub fn new(value: Vec<T>) -> Self {
        Self {
            context: None,
            count: None,
            value,
            next_link: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_count(mut self, count: Option<u64>) -> Self {
        self.count = count;
        self
    }

    pub fn with_next_link(mut self, link: Option<String>) -> Self {
        self.next_link = link;
        self
    }

    /// Map items while preserving the page annotations
    pub fn map_items<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            context: self.context,
            count: self.count,
            value: self.value.into_iter().map(f).collect(),
            next_link: self.next_link,
        }
    }
}
