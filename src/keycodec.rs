//! User key ⇄ storage byte encoding.
use serde::{Deserialize, Serialize};

use crate::error::IndexError;

const INT_TAG: u8 = 0x00;
const TEXT_TAG: u8 = 0x01;
/// Flips the sign bit so two's-complement ordering becomes unsigned
/// lexicographic ordering of the big-endian encoding.
const SIGN_FLIP: u64 = 0x8000_0000_0000_0000;

/// An index entry's internal key, supplied by the caller or autoincremented.
/// Integer and text keys may coexist in one index, but callers are warned
/// (see [`Index`](crate::index::Index) docs) not to mix the two modes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Int(i64),
    Text(String),
}

impl Key {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Key::Int(n) => Some(*n),
            Key::Text(_) => None,
        }
    }
}

impl From<i64> for Key {
    fn from(n: i64) -> Self { Key::Int(n) }
}

impl From<String> for Key {
    fn from(s: String) -> Self { Key::Text(s) }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self { Key::Text(s.to_string()) }
}

/// Encodes/decodes [`Key`] to the canonical storage byte form: a one-byte
/// tag followed by the payload. The tag ensures every integer key sorts
/// before every text key; within integer keys the big-endian, sign-flipped
/// encoding preserves numeric order, which is what [`next_key`] relies on.
pub struct KeyCodec;

impl KeyCodec {
    pub fn encode(key: &Key) -> Vec<u8> {
        match key {
            Key::Int(n) => {
                let mut out = Vec::with_capacity(9);
                out.push(INT_TAG);
                out.extend_from_slice(&((*n as u64) ^ SIGN_FLIP).to_be_bytes());
                out
            }
            Key::Text(s) => {
                let mut out = Vec::with_capacity(1 + s.len());
                out.push(TEXT_TAG);
                out.extend_from_slice(s.as_bytes());
                out
            }
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Key, IndexError> {
        match bytes.first() {
            Some(&INT_TAG) => {
                let body: [u8; 8] =
                    bytes.get(1..9).and_then(|b| b.try_into().ok()).ok_or_else(|| IndexError::MalformedCode("short integer key".into()))?;
                let n = (u64::from_be_bytes(body) ^ SIGN_FLIP) as i64;
                Ok(Key::Int(n))
            }
            Some(&TEXT_TAG) => {
                let s = std::str::from_utf8(&bytes[1..]).map_err(|e| IndexError::MalformedCode(e.to_string()))?;
                Ok(Key::Text(s.to_string()))
            }
            _ => Err(IndexError::MalformedCode("unrecognized key tag".into())),
        }
    }

    /// The byte prefix shared by every integer-tagged key, used to restrict
    /// the autoincrement scan to integer keys only.
    pub fn int_prefix() -> [u8; 1] { [INT_TAG] }
}
