use crate::ast::Value;
use crate::parse::{parse_literal, split_top_level};
use crate::{Error, Result};

/// Key predicate of a single-entity address.
#[derive(Clone, Debug, PartialEq)]
pub enum KeyPredicate {
    /// `Books(1)`: only valid for entities with a single (non-draft) key.
    Single(Value),
    /// `Books(ID=1,IsActiveEntity=true)`
    Named(Vec<(String, Value)>),
}

/// Resource path below the service root.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourcePath {
    pub entity_set: String,
    pub keys: Option<KeyPredicate>,
    /// Bound action or function segment, possibly namespace-qualified.
    pub operation: Option<String>,
    /// Trailing `/$count` segment.
    pub count: bool,
}

impl ResourcePath {
    pub fn entity_set(name: impl Into<String>) -> Self {
        Self {
            entity_set: name.into(),
            ..Default::default()
        }
    }

    pub fn with_keys(mut self, keys: KeyPredicate) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn with_operation(mut self, op: impl Into<String>) -> Self {
        self.operation = Some(op.into());
        self
    }

    pub fn is_collection(&self) -> bool {
        self.keys.is_none()
    }

    /// Operation name without its namespace qualifier.
    pub fn operation_name(&self) -> Option<&str> {
        self.operation
            .as_deref()
            .map(|op| op.rsplit('.').next().unwrap_or(op))
    }
}

/// Parse the content between the parentheses of a key predicate.
pub fn parse_key_predicate(inner: &str) -> Result<KeyPredicate> {
    let parts = split_top_level(inner, ',').map_err(|e| Error::InvalidKey(e.to_string()))?;
    let parts: Vec<&str> = parts.into_iter().map(str::trim).collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(Error::InvalidKey(inner.to_string()));
    }

    if let [single] = parts.as_slice() {
        if split_top_level(single, '=')
            .map_err(|e| Error::InvalidKey(e.to_string()))?
            .len()
            == 1
        {
            return parse_literal(single)
                .map(KeyPredicate::Single)
                .map_err(|_| Error::InvalidKey(inner.to_string()));
        }
    }

    let mut named = Vec::with_capacity(parts.len());
    for part in parts {
        let (name, value) = part
            .split_once('=')
            .ok_or_else(|| Error::InvalidKey(inner.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidKey(inner.to_string()));
        }
        if named.iter().any(|(n, _): &(String, Value)| n == name) {
            return Err(Error::InvalidKey(format!("duplicate key '{}'", name)));
        }
        let value = parse_literal(value).map_err(|_| Error::InvalidKey(inner.to_string()))?;
        named.push((name.to_string(), value));
    }
    Ok(KeyPredicate::Named(named))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

/// Parse `EntitySet[(keys)][/operation | /$count]`.
pub fn parse_resource_path(raw: &str) -> Result<ResourcePath> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Err(Error::InvalidPath("empty resource path".into()));
    }

    let segments = split_top_level(trimmed, '/').map_err(|e| Error::InvalidPath(e.to_string()))?;
    let (head, tail) = match segments.as_slice() {
        [head] => (*head, None),
        [head, tail] => (*head, Some(*tail)),
        _ => {
            return Err(Error::InvalidPath(format!(
                "navigation paths are not supported: {}",
                trimmed
            )))
        }
    };

    let mut path = match head.split_once('(') {
        Some((name, rest)) => {
            let inner = rest
                .strip_suffix(')')
                .ok_or_else(|| Error::InvalidPath(head.to_string()))?;
            if !is_identifier(name) {
                return Err(Error::InvalidPath(head.to_string()));
            }
            ResourcePath::entity_set(name).with_keys(parse_key_predicate(inner)?)
        }
        None => {
            if !is_identifier(head) {
                return Err(Error::InvalidPath(head.to_string()));
            }
            ResourcePath::entity_set(head)
        }
    };

    match tail {
        None => {}
        Some("$count") if path.keys.is_none() => path.count = true,
        Some("$count") => {
            return Err(Error::InvalidPath(
                "$count is only valid on collections".into(),
            ))
        }
        Some(op) if is_identifier(op) => path.operation = Some(op.to_string()),
        Some(other) => return Err(Error::InvalidPath(other.to_string())),
    }
    Ok(path)
}
