//! Self-describing binary envelope for structured values (metadata payloads,
//! `(fkey, position)` feature tuples). Fixed to MessagePack for the lifetime
//! of an index directory — mixing envelope formats within one index is not
//! supported.
use serde::{de::DeserializeOwned, Serialize};

use crate::error::IndexError;

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, IndexError> { Ok(rmp_serde::to_vec(value)?) }

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, IndexError> { Ok(rmp_serde::from_slice(bytes)?) }

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    enum Scalar {
        Int(i64),
        Float(f64),
        Text(String),
        List(Vec<Scalar>),
    }

    #[test]
    fn round_trips_heterogeneous_metadata() {
        let mut map = BTreeMap::new();
        map.insert("title".to_string(), Scalar::Text("hello".into()));
        map.insert("score".to_string(), Scalar::Float(1.5));
        map.insert("tags".to_string(), Scalar::List(vec![Scalar::Int(1), Scalar::Int(2)]));
        let bytes = encode(&map).unwrap();
        let back: BTreeMap<String, Scalar> = decode(&bytes).unwrap();
        assert_eq!(map, back);
    }
}
