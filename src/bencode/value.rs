use std::collections::BTreeMap;

/// A decoded bencode value. Byte strings are raw bytes and need not be
/// UTF-8; dictionary keys are kept in raw byte order, the order in which
/// they must be encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BencodeValue {
    Integer(i64),
    String(Vec<u8>),
    List(Vec<BencodeValue>),
    Dict(BTreeMap<Vec<u8>, BencodeValue>),
}

impl BencodeValue {
    pub fn bytes(value: impl AsRef<[u8]>) -> Self {
        Self::String(value.as_ref().to_vec())
    }

    /// Dictionary from `(key, value)` pairs given in any order
    pub fn dict<K: AsRef<[u8]>>(entries: impl IntoIterator<Item = (K, BencodeValue)>) -> Self {
        Self::Dict(
            entries
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_vec(), v))
                .collect(),
        )
    }

    pub fn as_integer(&self) -> Option<i64> {
        if let Self::Integer(n) = self {
            Some(*n)
        } else {
            None
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        if let Self::String(raw) = self {
            Some(raw)
        } else {
            None
        }
    }

    /// The byte string, if it is valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(self.as_bytes()?).ok()
    }

    pub fn as_list(&self) -> Option<&[BencodeValue]> {
        if let Self::List(items) = self {
            Some(items)
        } else {
            None
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<Vec<u8>, BencodeValue>> {
        if let Self::Dict(entries) = self {
            Some(entries)
        } else {
            None
        }
    }

    /// Look up `key` when this value is a dictionary
    pub fn dict_get(&self, key: &[u8]) -> Option<&BencodeValue> {
        self.as_dict()?.get(key)
    }

    pub fn dict_get_str(&self, key: &[u8]) -> Option<&str> {
        self.dict_get(key).and_then(Self::as_str)
    }

    pub fn dict_get_int(&self, key: &[u8]) -> Option<i64> {
        self.dict_get(key).and_then(Self::as_integer)
    }
}
