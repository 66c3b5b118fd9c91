use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value as Json};

/// Entity payload value. Same shape as JSON, plus raw bytes for binary
/// elements after inbound decoding.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum DataValue {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Binary(Vec<u8>),
    Array(Vec<DataValue>),
    Object(IndexMap<String, DataValue>),
}

impl DataValue {
    pub fn object() -> Self {
        DataValue::Object(IndexMap::new())
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, DataValue>> {
        match self {
            DataValue::Object(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut IndexMap<String, DataValue>> {
        match self {
            DataValue::Object(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<DataValue>> {
        match self {
            DataValue::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            DataValue::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    /// Member lookup on objects; `None` for every other variant.
    pub fn get(&self, key: &str) -> Option<&DataValue> {
        self.as_object().and_then(|m| m.get(key))
    }

    /// Plain JSON; bytes are rendered as base64.
    pub fn to_json(&self) -> Json {
        match self {
            DataValue::Null => Json::Null,
            DataValue::Bool(b) => Json::Bool(*b),
            DataValue::Number(n) => Json::Number(n.clone()),
            DataValue::String(s) => Json::String(s.clone()),
            DataValue::Binary(b) => Json::String(STANDARD.encode(b)),
            DataValue::Array(items) => Json::Array(items.iter().map(DataValue::to_json).collect()),
            DataValue::Object(m) => Json::Object(
                m.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<Json> for DataValue {
    fn from(v: Json) -> Self {
        match v {
            Json::Null => DataValue::Null,
            Json::Bool(b) => DataValue::Bool(b),
            Json::Number(n) => DataValue::Number(n),
            Json::String(s) => DataValue::String(s),
            Json::Array(items) => DataValue::Array(items.into_iter().map(Into::into).collect()),
            Json::Object(m) => {
                DataValue::Object(m.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<DataValue> for Json {
    fn from(v: DataValue) -> Self {
        match v {
            DataValue::Null => Json::Null,
            DataValue::Bool(b) => Json::Bool(b),
            DataValue::Number(n) => Json::Number(n),
            DataValue::String(s) => Json::String(s),
            DataValue::Binary(b) => Json::String(STANDARD.encode(b)),
            DataValue::Array(items) => Json::Array(items.into_iter().map(Into::into).collect()),
            DataValue::Object(m) => {
                Json::Object(m.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for DataValue {
    fn from(s: &str) -> Self {
        DataValue::String(s.to_string())
    }
}

impl From<bool> for DataValue {
    fn from(b: bool) -> Self {
        DataValue::Bool(b)
    }
}

impl From<i64> for DataValue {
    fn from(n: i64) -> Self {
        DataValue::Number(n.into())
    }
}

impl From<Vec<u8>> for DataValue {
    fn from(b: Vec<u8>) -> Self {
        DataValue::Binary(b)
    }
}

impl Serialize for DataValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DataValue::Null => serializer.serialize_unit(),
            DataValue::Bool(b) => serializer.serialize_bool(*b),
            DataValue::Number(n) => n.serialize(serializer),
            DataValue::String(s) => serializer.serialize_str(s),
            DataValue::Binary(b) => serializer.serialize_str(&STANDARD.encode(b)),
            DataValue::Array(items) => items.serialize(serializer),
            DataValue::Object(m) => m.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for DataValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Json::deserialize(deserializer).map(DataValue::from)
    }
}
