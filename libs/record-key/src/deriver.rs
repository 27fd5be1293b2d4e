use bytes::Bytes;
use serde_json::Value;

use crate::{canonicalize_to_string, extract_identifier};

/// Result of key derivation.
///
/// `key` is empty exactly when `id_text` is `None`. `id_text` is the UTF-8
/// text of the same canonical bytes and is only meant for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DerivedKey {
    pub id_text: Option<String>,
    pub key: Bytes,
}

impl DerivedKey {
    fn from_canonical(text: String) -> Self {
        let key = Bytes::from(text.clone().into_bytes());
        Self { id_text: Some(text), key }
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

/// Derives storage row keys from documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyDeriver;

impl KeyDeriver {
    pub fn new() -> Self {
        Self
    }

    /// Key of a document that already is the identifier-bearing value.
    pub fn derive_key(&self, doc: &Value) -> DerivedKey {
        DerivedKey::from_canonical(canonicalize_to_string(doc))
    }

    /// Key of a full message body: `message._id`, normalized and
    /// canonicalized. Empty when the body has no usable identifier.
    pub fn derive_key_from_message_body(&self, doc: &Value) -> DerivedKey {
        match extract_identifier(doc) {
            Some(id) => self.derive_key(&id),
            None => DerivedKey::default(),
        }
    }
}

/// Row key source used by the batch processor. `KeyDeriver` is the
/// production implementation.
pub trait KeyDerivation: Send + Sync {
    fn derive_key_from_message_body(&self, doc: &Value) -> DerivedKey;
}

impl KeyDerivation for KeyDeriver {
    fn derive_key_from_message_body(&self, doc: &Value) -> DerivedKey {
        KeyDeriver::derive_key_from_message_body(self, doc)
    }
}
