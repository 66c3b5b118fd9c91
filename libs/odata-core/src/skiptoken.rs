use serde::{Deserialize, Serialize};

use crate::Error;

/// Opaque `$skiptoken`: the number of rows already delivered by previous
/// server-driven pages. Clients only ever echo it back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SkipToken {
    pub offset: u64,
}

#[derive(Serialize, Deserialize)]
struct Wire {
    v: u8,
    o: u64,
}

impl SkipToken {
    pub const VERSION: u8 = 1;

    pub fn new(offset: u64) -> Self {
        Self { offset }
    }

    pub fn encode(&self) -> String {
        let wire = Wire {
            v: Self::VERSION,
            o: self.offset,
        };
        // Serializing two integers cannot fail.
        let json = serde_json::to_vec(&wire).unwrap_or_default();
        base64_url::encode(&json)
    }

    pub fn decode(token: &str) -> Result<Self, Error> {
        let bytes = base64_url::decode(token.trim()).map_err(|_| Error::SkipTokenInvalidBase64)?;
        let wire: Wire = serde_json::from_slice(&bytes).map_err(|_| Error::SkipTokenInvalidJson)?;
        if wire.v != Self::VERSION {
            return Err(Error::SkipTokenInvalidVersion);
        }
        Ok(Self { offset: wire.o })
    }
}

pub mod base64_url {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    pub fn encode(bytes: &[u8]) -> String {
        URL_SAFE_NO_PAD.encode(bytes)
    }

    pub fn decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
        URL_SAFE_NO_PAD.decode(s)
    }
}
